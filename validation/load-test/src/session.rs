//! Per-actor session state.

use rand::Rng;
use trackme_common::ClientRecord;

/// Everything an actor remembers between tasks.
///
/// Owned by exactly one actor; never shared.
#[derive(Debug, Default)]
pub struct Session {
    pub email: String,
    pub password: String,
    token: Option<String>,
    user_id: Option<String>,
    records: Vec<ClientRecord>,
}

impl Session {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Store credentials from a register or login response.
    pub fn authenticate(&mut self, token: &str, user_id: Option<&str>) {
        self.token = Some(token.to_string());
        self.user_id = user_id.map(str::to_string);
    }

    /// Drop the token after the server rejected it.
    pub fn invalidate_token(&mut self) {
        self.token = None;
    }

    pub fn records(&self) -> &[ClientRecord] {
        &self.records
    }

    pub fn remember(&mut self, record: ClientRecord) {
        self.records.push(record);
    }

    /// Forget every record with `id`. Returns how many were removed.
    pub fn forget(&mut self, id: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        before - self.records.len()
    }

    /// Index of a random record, if any.
    pub fn pick_record<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.records.is_empty() {
            None
        } else {
            Some(rng.gen_range(0..self.records.len()))
        }
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut ClientRecord> {
        self.records.get_mut(index)
    }

    /// Pop the newest record, but only while at least one would remain.
    pub fn take_spare_record(&mut self) -> Option<ClientRecord> {
        if self.records.len() < 2 {
            return None;
        }
        self.records.pop()
    }
}
