//! Randomized request payloads and query filters.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use trackme_common::{Contract, NewClient, Stage, FALLBACK_TIMESTAMP};
use uuid::Uuid;

/// Query string as `(key, value)` pairs.
pub type Query = Vec<(&'static str, String)>;

pub const STANDARD_PASSWORD: &str = "TestPass123!";
pub const PRIVILEGED_PASSWORD: &str = "AdminPass123!";

const SOURCES: [&str; 4] = ["web", "mobile", "referral", "ads"];
const CHANNELS: [&str; 3] = ["organic", "paid", "direct"];
const APP_STATES: [&str; 3] = ["not_installed", "installed", "active"];
const CONTRACT_STATUSES: [&str; 3] = ["active", "pending", "expired"];
const PAYMENT_FREQUENCIES: [&str; 3] = ["monthly", "quarterly", "annual"];
const AUTOPAYMENT_STATES: [&str; 3] = ["enabled", "disabled", "pending"];

/// Filter shapes for `GET /clients`.
pub const CLIENT_FILTERS: [&[(&str, &str)]; 5] = [
    &[],
    &[("is_active", "true"), ("limit", "50")],
    &[("stage", "active"), ("limit", "20")],
    &[("source", "web"), ("channel", "organic")],
    &[("app", "installed"), ("limit", "30"), ("offset", "10")],
];

/// Filter shapes for `GET /metrics`.
pub const METRIC_FILTERS: [&[(&str, &str)]; 5] = [
    &[],
    &[("type", "clients"), ("interval", "day")],
    &[("type", "revenue"), ("interval", "week")],
    &[("type", "active_users"), ("interval", "month")],
    &[("interval", "day")],
];

/// Payload for `POST /auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub name: String,
    pub password: &'a str,
    pub role: &'a str,
}

/// Payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Eight random hex digits.
pub fn short_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    Uuid::from_bytes(rng.gen()).simple().to_string()[..8].to_string()
}

/// A fresh synthetic account email, e.g. `user_1a2b3c4d@test.com`.
pub fn account_email<R: Rng + ?Sized>(rng: &mut R, namespace: &str) -> String {
    format!("{}_{}@test.com", namespace, short_id(rng))
}

pub fn display_name<R: Rng + ?Sized>(rng: &mut R, prefix: &str) -> String {
    format!("{} {}", prefix, rng.gen_range(1000..=9999))
}

pub fn random_stage<R: Rng + ?Sized>(rng: &mut R) -> Stage {
    Stage::ALL[rng.gen_range(0..Stage::ALL.len())]
}

/// Pick one of `filters` and own its values.
pub fn pick_filter<R: Rng + ?Sized>(rng: &mut R, filters: &[&[(&'static str, &str)]]) -> Query {
    filters
        .choose(rng)
        .map(|filter| filter.iter().map(|(k, v)| (*k, v.to_string())).collect())
        .unwrap_or_default()
}

/// Pagination for `GET /users`.
pub fn user_page<R: Rng + ?Sized>(rng: &mut R) -> Query {
    vec![
        ("limit", rng.gen_range(10..=50).to_string()),
        ("offset", rng.gen_range(0..=20).to_string()),
    ]
}

/// A fully randomized client with one contract.
pub fn random_client<R: Rng + ?Sized>(rng: &mut R) -> NewClient {
    NewClient {
        name: format!("Client {}", short_id(rng)),
        email: format!("client_{}@example.com", short_id(rng)),
        stage: random_stage(rng),
        source: pick(rng, &SOURCES),
        channel: pick(rng, &CHANNELS),
        app: pick(rng, &APP_STATES),
        is_active: true,
        last_login: FALLBACK_TIMESTAMP.to_string(),
        contracts: vec![random_contract(rng)],
    }
}

/// The simpler client created by privileged actors: fixed labels, no contracts.
pub fn privileged_client<R: Rng + ?Sized>(rng: &mut R) -> NewClient {
    NewClient {
        name: format!("Admin Client {}", &short_id(rng)[..6]),
        email: format!("admin_client_{}@example.com", short_id(rng)),
        stage: random_stage(rng),
        source: "web".to_string(),
        channel: "direct".to_string(),
        app: "installed".to_string(),
        is_active: true,
        last_login: FALLBACK_TIMESTAMP.to_string(),
        contracts: Vec::new(),
    }
}

fn random_contract<R: Rng + ?Sized>(rng: &mut R) -> Contract {
    Contract {
        id: None,
        name: format!("Contract {}", rng.gen_range(1000..=9999)),
        number: format!("CNT-{}", rng.gen_range(10000..=99999)),
        amount: rng.gen_range(1000..=50000) as f64 + 0.99,
        status: pick(rng, &CONTRACT_STATUSES),
        payment_frequency: pick(rng, &PAYMENT_FREQUENCIES),
        autopayment: pick(rng, &AUTOPAYMENT_STATES),
        conclusion_date: "2024-01-01T00:00:00Z".to_string(),
        expiration_date: "2025-01-01T00:00:00Z".to_string(),
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, options: &[&str]) -> String {
    options.choose(rng).copied().unwrap_or_default().to_string()
}
