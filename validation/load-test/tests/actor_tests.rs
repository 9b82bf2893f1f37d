//! Actor behaviour against the in-process mock API.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use test_utils::{MockApi, API_PREFIX};
use tokio::sync::watch;
use trackme_common::is_canonical;
use trackme_load::actors::{drive, PrivilegedTask, StandardTask};
use trackme_load::generator::{account_email, PRIVILEGED_PASSWORD, STANDARD_PASSWORD};
use trackme_load::{
    Actor, ActorContext, ApiClient, PrivilegedActor, Recorder, StandardActor, WaitTime,
};

const SEED: u64 = 11;

fn context(api: &MockApi) -> ActorContext {
    let client = ApiClient::new(&api.base_url(), API_PREFIX, Duration::from_secs(5), 4).unwrap();
    ActorContext::new(0, client, Recorder::new(), StdRng::seed_from_u64(SEED))
}

fn no_wait() -> WaitTime {
    WaitTime::between(Duration::ZERO, Duration::ZERO)
}

/// The email an actor seeded with `SEED` will generate first.
fn expected_email(namespace: &str) -> String {
    account_email(&mut StdRng::seed_from_u64(SEED), namespace)
}

async fn failures_for(ctx: &ActorContext, name: &str) -> u64 {
    let metrics = ctx.recorder.metrics();
    let registry = metrics.lock().await;
    registry
        .results("t".to_string(), 1, Duration::from_secs(1))
        .endpoint(name)
        .map(|e| e.failures)
        .unwrap_or(0)
}

async fn started_standard(api: &MockApi) -> (StandardActor, ActorContext) {
    let mut ctx = context(api);
    let mut actor = StandardActor::new(no_wait());
    actor.on_start(&mut ctx).await;
    assert!(actor.session().is_authenticated());
    (actor, ctx)
}

#[tokio::test]
async fn test_fresh_registration_stores_token() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    assert_eq!(actor.session().email, expected_email("user"));
    assert_eq!(api.account_role(&actor.session().email).as_deref(), Some("user"));
    assert!(actor.session().user_id().is_some());
    assert!(api.requests_to("POST", "/auth/login").is_empty());

    actor.run(StandardTask::ListClients, &mut ctx).await;
    let lists = api.requests_to("GET", "/clients");
    assert_eq!(lists.len(), 1);
    let expected = format!("Bearer {}", actor.session().token().unwrap());
    assert_eq!(lists[0].authorization.as_deref(), Some(expected.as_str()));
    assert_eq!(failures_for(&ctx, "/clients [LIST]").await, 0);
}

#[tokio::test]
async fn test_conflict_falls_back_to_login() {
    let api = MockApi::start().await;
    api.add_account(&expected_email("user"), STANDARD_PASSWORD, "user");

    let (actor, ctx) = started_standard(&api).await;

    assert_eq!(api.requests_to("POST", "/auth/register").len(), 1);
    assert_eq!(api.requests_to("POST", "/auth/login").len(), 1);
    assert!(actor.session().token().is_some());
    assert_eq!(failures_for(&ctx, "/auth/register").await, 0);
    assert_eq!(failures_for(&ctx, "/auth/login").await, 0);
}

#[tokio::test]
async fn test_failed_registration_leaves_actor_idle() {
    let api = MockApi::start().await;
    api.respond_once("POST", "/auth/register", 500);

    let mut ctx = context(&api);
    let mut actor = StandardActor::new(no_wait());
    actor.on_start(&mut ctx).await;
    assert!(!actor.session().is_authenticated());
    assert_eq!(failures_for(&ctx, "/auth/register").await, 1);

    let before = api.requests().len();
    actor.run(StandardTask::ListClients, &mut ctx).await;
    actor.run(StandardTask::CreateClient, &mut ctx).await;
    assert_eq!(api.requests().len(), before);
}

#[tokio::test]
async fn test_unauthorized_clears_token() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    api.revoke_tokens();
    actor.run(StandardTask::ListClients, &mut ctx).await;
    assert!(!actor.session().is_authenticated());
    assert_eq!(failures_for(&ctx, "/clients [LIST]").await, 1);

    // No token, no request
    let before = api.requests().len();
    actor.run(StandardTask::GetMetrics, &mut ctx).await;
    actor.run(StandardTask::ListUsers, &mut ctx).await;
    assert_eq!(api.requests().len(), before);
}

#[tokio::test]
async fn test_create_unauthorized_clears_token() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    api.respond_once("POST", "/clients", 401);
    actor.run(StandardTask::CreateClient, &mut ctx).await;
    assert!(!actor.session().is_authenticated());
    assert!(actor.session().records().is_empty());
    assert_eq!(failures_for(&ctx, "/clients [CREATE]").await, 1);
}

#[tokio::test]
async fn test_reads_unauthorized_clear_token() {
    let api = MockApi::start().await;
    let cases = [
        (StandardTask::GetMetrics, "/metrics", "/metrics [GET]"),
        (StandardTask::ListUsers, "/users", "/users [LIST]"),
        (StandardTask::GetCurrentUser, "", "/users/{id} [GET]"),
    ];

    for (task, path, name) in cases {
        let (mut actor, mut ctx) = started_standard(&api).await;
        let path = if path.is_empty() {
            format!("/users/{}", actor.session().user_id().unwrap())
        } else {
            path.to_string()
        };

        api.respond_once("GET", &path, 401);
        actor.run(task, &mut ctx).await;
        assert!(!actor.session().is_authenticated(), "{} kept the token", name);
        assert_eq!(failures_for(&ctx, name).await, 1, "{}", name);
    }
}

#[tokio::test]
async fn test_truncated_body_is_failure() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    api.break_body_once("GET", "/clients");
    actor.run(StandardTask::ListClients, &mut ctx).await;
    assert_eq!(failures_for(&ctx, "/clients [LIST]").await, 1);
    // Not a 401
    assert!(actor.session().is_authenticated());
}

#[tokio::test]
async fn test_login_transport_failure_after_conflict() {
    let api = MockApi::start().await;
    api.add_account(&expected_email("user"), STANDARD_PASSWORD, "user");
    api.break_body_once("POST", "/auth/login");

    let mut ctx = context(&api);
    let mut actor = StandardActor::new(no_wait());
    actor.on_start(&mut ctx).await;

    assert!(!actor.session().is_authenticated());
    assert_eq!(api.requests_to("POST", "/auth/login").len(), 1);
    assert_eq!(failures_for(&ctx, "/auth/register").await, 0);
    assert_eq!(failures_for(&ctx, "/auth/login").await, 1);

    let before = api.requests().len();
    actor.run(StandardTask::GetMetrics, &mut ctx).await;
    assert_eq!(api.requests().len(), before);
}

#[tokio::test]
async fn test_create_remembers_normalized_record() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    assert_eq!(failures_for(&ctx, "/clients [CREATE]").await, 0);

    let records = actor.session().records();
    assert_eq!(records.len(), 1);
    assert_eq!(api.client_ids(), vec![records[0].id.clone()]);
    assert!(records[0].stage.is_some());
    assert!(is_canonical(&records[0].last_login));
    let contract = &records[0].contracts[0];
    assert!(contract.id.is_some());
    assert!(is_canonical(&contract.conclusion_date));
    assert!(!contract.autopayment.is_empty());
}

#[tokio::test]
async fn test_update_resubmits_plain_labels() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    actor.run(StandardTask::UpdateClientStage, &mut ctx).await;

    let puts = api.requests_to("PUT", "/clients/");
    assert_eq!(puts.len(), 1);
    let body = puts[0].body.as_ref().unwrap();
    assert!(body["app"].is_string());
    assert!(body["stage"].is_string());
    assert!(is_canonical(body["last_login"].as_str().unwrap()));
    let contract = &body["contracts"][0];
    assert!(contract["autopayment"].is_string());
    assert!(is_canonical(contract["conclusion_date"].as_str().unwrap()));
    assert!(is_canonical(contract["expiration_date"].as_str().unwrap()));

    assert_eq!(failures_for(&ctx, "/clients/{id}/stage [UPDATE]").await, 0);
}

#[tokio::test]
async fn test_update_not_found_forgets_record() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    let id = actor.session().records()[0].id.clone();
    assert!(api.remove_client(&id));

    actor.run(StandardTask::UpdateClientStage, &mut ctx).await;
    assert!(actor.session().records().is_empty());
    assert_eq!(failures_for(&ctx, "/clients/{id}/stage [UPDATE]").await, 1);

    // Nothing left to update
    actor.run(StandardTask::UpdateClientStage, &mut ctx).await;
    assert_eq!(api.requests_to("PUT", "/clients/").len(), 1);
}

#[tokio::test]
async fn test_update_unauthorized_keeps_token() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    let id = actor.session().records()[0].id.clone();

    api.respond_once("PUT", &format!("/clients/{}/stage", id), 401);
    actor.run(StandardTask::UpdateClientStage, &mut ctx).await;
    assert!(actor.session().is_authenticated());
    assert_eq!(actor.session().records().len(), 1);
    assert_eq!(failures_for(&ctx, "/clients/{id}/stage [UPDATE]").await, 1);
}

#[tokio::test]
async fn test_delete_keeps_last_record() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    actor.run(StandardTask::DeleteClient, &mut ctx).await;
    assert!(api.requests_to("DELETE", "/clients/").is_empty());
    assert_eq!(actor.session().records().len(), 1);

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    actor.run(StandardTask::DeleteClient, &mut ctx).await;
    assert_eq!(api.requests_to("DELETE", "/clients/").len(), 1);
    assert_eq!(actor.session().records().len(), 1);
    assert_eq!(api.client_ids().len(), 1);
    assert_eq!(failures_for(&ctx, "/clients/{id} [DELETE]").await, 0);
}

#[tokio::test]
async fn test_delete_not_found_drops_record() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::CreateClient, &mut ctx).await;
    actor.run(StandardTask::CreateClient, &mut ctx).await;
    let newest = actor.session().records()[1].id.clone();

    api.respond_once("DELETE", &format!("/clients/{}", newest), 404);
    actor.run(StandardTask::DeleteClient, &mut ctx).await;
    assert_eq!(failures_for(&ctx, "/clients/{id} [DELETE]").await, 1);
    let records = actor.session().records();
    assert_eq!(records.len(), 1);
    assert_ne!(records[0].id, newest);

    // One record left, so no further delete
    actor.run(StandardTask::DeleteClient, &mut ctx).await;
    assert_eq!(api.requests_to("DELETE", "/clients/").len(), 1);
}

#[tokio::test]
async fn test_get_current_user_uses_session_id() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::GetCurrentUser, &mut ctx).await;
    let user_id = actor.session().user_id().unwrap().to_string();
    let gets = api.requests_to("GET", "/users/");
    assert_eq!(gets.len(), 1);
    assert_eq!(gets[0].path, format!("/users/{}", user_id));
    assert_eq!(failures_for(&ctx, "/users/{id} [GET]").await, 0);
}

#[tokio::test]
async fn test_list_users_is_paginated() {
    let api = MockApi::start().await;
    let (mut actor, mut ctx) = started_standard(&api).await;

    actor.run(StandardTask::ListUsers, &mut ctx).await;
    let lists = api.requests_to("GET", "/users");
    assert_eq!(lists.len(), 1);
    let query = lists[0].query.clone().unwrap();
    assert!(query.contains("limit="));
    assert!(query.contains("offset="));
}

#[tokio::test]
async fn test_privileged_registers_as_admin() {
    let api = MockApi::start().await;
    let mut ctx = context(&api);
    let mut actor = PrivilegedActor::new(no_wait());
    actor.on_start(&mut ctx).await;

    assert_eq!(actor.session().email, expected_email("admin"));
    assert_eq!(api.account_role(&actor.session().email).as_deref(), Some("admin"));

    actor.run(PrivilegedTask::ListClients, &mut ctx).await;
    actor.run(PrivilegedTask::CheckMetrics, &mut ctx).await;
    actor.run(PrivilegedTask::ManageUsers, &mut ctx).await;

    let query = api.requests_to("GET", "/clients")[0].query.clone().unwrap();
    assert!(query.contains("limit=100"));
    assert!(query.contains("is_active=true"));
    let query = api.requests_to("GET", "/metrics")[0].query.clone().unwrap();
    assert_eq!(query, "interval=day");
    assert_eq!(failures_for(&ctx, "/clients [ADMIN LIST]").await, 0);
}

#[tokio::test]
async fn test_privileged_create_is_not_remembered() {
    let api = MockApi::start().await;
    let mut ctx = context(&api);
    let mut actor = PrivilegedActor::new(no_wait());
    actor.on_start(&mut ctx).await;

    actor.run(PrivilegedTask::CreateClient, &mut ctx).await;
    assert_eq!(api.client_ids().len(), 1);
    assert!(actor.session().records().is_empty());
    assert_eq!(failures_for(&ctx, "/clients [ADMIN CREATE]").await, 0);
}

#[tokio::test]
async fn test_privileged_conflict_logs_in() {
    let api = MockApi::start().await;
    api.add_account(&expected_email("admin"), PRIVILEGED_PASSWORD, "admin");

    let mut ctx = context(&api);
    let mut actor = PrivilegedActor::new(no_wait());
    actor.on_start(&mut ctx).await;

    assert!(actor.session().is_authenticated());
    assert_eq!(api.requests_to("POST", "/auth/login").len(), 1);
    // Default accounting counts the 409 as a failure
    assert_eq!(failures_for(&ctx, "/auth/register [ADMIN]").await, 1);
}

#[tokio::test]
async fn test_privileged_keeps_token_on_unauthorized() {
    let api = MockApi::start().await;
    let mut ctx = context(&api);
    let mut actor = PrivilegedActor::new(no_wait());
    actor.on_start(&mut ctx).await;

    api.revoke_tokens();
    actor.run(PrivilegedTask::ListClients, &mut ctx).await;
    assert!(actor.session().is_authenticated());
    assert_eq!(failures_for(&ctx, "/clients [ADMIN LIST]").await, 1);

    actor.run(PrivilegedTask::CreateClient, &mut ctx).await;
    assert_eq!(api.requests_to("POST", "/clients").len(), 1);
    assert!(actor.session().records().is_empty());
}

#[tokio::test]
async fn test_drive_stops_on_signal() {
    let api = MockApi::start().await;
    let (stop_tx, stop_rx) = watch::channel(false);
    let actor = StandardActor::new(WaitTime::between(
        Duration::from_millis(5),
        Duration::from_millis(10),
    ));
    let handle = tokio::spawn(drive(actor, context(&api), stop_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("actor did not stop")
        .unwrap();

    assert_eq!(api.requests_to("POST", "/auth/register").len(), 1);
    assert!(api.requests().len() > 1);
}
