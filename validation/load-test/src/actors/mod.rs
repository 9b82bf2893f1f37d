//! Simulated users.
//!
//! An actor owns its [`Session`](crate::session::Session) and a weighted
//! [`TaskSet`]. The runner calls [`Actor::on_start`] once, then repeatedly
//! picks a task, runs it and pauses for [`Actor::wait_time`].

mod privileged;
mod standard;

pub use privileged::{PrivilegedActor, PrivilegedTask};
pub use standard::{StandardActor, StandardTask};

use std::fmt;

use async_trait::async_trait;
use rand::rngs::StdRng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};
use trackme_common::{AuthData, ClientRecord, Envelope, FetchedClient};

use crate::api::{ApiClient, ApiResponse};
use crate::error::TaskFailure;
use crate::recorder::Recorder;
use crate::session::Session;
use crate::tasks::{TaskSet, WaitTime};

/// Actor class, used for spawning and for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Standard,
    Privileged,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::Standard => f.write_str("standard"),
            ActorKind::Privileged => f.write_str("privileged"),
        }
    }
}

/// What an actor needs from the harness.
pub struct ActorContext {
    pub id: usize,
    pub client: ApiClient,
    pub recorder: Recorder,
    pub rng: StdRng,
}

impl ActorContext {
    pub fn new(id: usize, client: ApiClient, recorder: Recorder, rng: StdRng) -> Self {
        Self {
            id,
            client,
            recorder,
            rng,
        }
    }

    /// Report one request outcome under `name`.
    pub async fn record(
        &self,
        name: &str,
        response: &ApiResponse,
        outcome: &Result<(), TaskFailure>,
    ) {
        self.recorder.record(self.id, name, response, outcome).await;
    }
}

#[async_trait]
pub trait Actor: Send {
    type Task: Copy + Send + Sync + fmt::Debug;

    fn kind(&self) -> ActorKind;

    fn tasks(&self) -> &TaskSet<Self::Task>;

    fn wait_time(&self) -> WaitTime;

    fn session(&self) -> &Session;

    /// Register (or log in) before the task loop starts.
    async fn on_start(&mut self, ctx: &mut ActorContext);

    /// Execute one task. Never fails; outcomes go to the recorder.
    async fn run(&mut self, task: Self::Task, ctx: &mut ActorContext);
}

/// Drive `actor` until `stop` flips to `true`.
///
/// The stop signal is only observed between tasks, so an in-flight request
/// always completes.
pub async fn drive<A: Actor>(mut actor: A, mut ctx: ActorContext, mut stop: watch::Receiver<bool>) {
    info!(actor = ctx.id, kind = %actor.kind(), "Actor starting");
    actor.on_start(&mut ctx).await;

    let mut iterations = 0u64;
    loop {
        if *stop.borrow() {
            break;
        }

        if let Some(task) = actor.tasks().pick(&mut ctx.rng) {
            actor.run(task, &mut ctx).await;
            iterations += 1;
        }

        let pause = actor.wait_time().sample(&mut ctx.rng);
        tokio::select! {
            _ = sleep(pause) => {}
            changed = stop.changed() => {
                // Sender gone means the run is over too
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    debug!(actor = ctx.id, kind = %actor.kind(), iterations, "Actor stopped");
}

/// Token and user id from a register/login response.
pub(crate) fn read_credentials(
    response: &ApiResponse,
) -> Result<(String, Option<String>), TaskFailure> {
    let auth = response.json::<Envelope<AuthData>>()?.into_data()?;
    let token = auth.token().ok_or(TaskFailure::MissingToken)?.to_string();
    Ok((token, auth.user_id().map(str::to_string)))
}

/// The client in a create response; the envelope is optional.
pub(crate) fn read_client(response: &ApiResponse) -> Result<ClientRecord, TaskFailure> {
    let data = match response.json::<Value>()? {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    };
    let fetched: FetchedClient = serde_json::from_value(data)?;
    Ok(ClientRecord::from_fetched(fetched)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string(),
            latency_us: 0,
            transport_error: None,
        }
    }

    #[test]
    fn test_read_credentials() {
        let r = response(201, json!({"data": {"token": "t", "user": {"id": "u"}}}));
        assert_eq!(
            read_credentials(&r).unwrap(),
            ("t".to_string(), Some("u".to_string()))
        );

        let r = response(201, json!({"data": {"user": {"id": "u"}}}));
        assert_eq!(read_credentials(&r), Err(TaskFailure::MissingToken));

        let r = response(201, json!({"message": "ok"}));
        assert!(matches!(read_credentials(&r), Err(TaskFailure::Incomplete(_))));

        let mut r = response(201, json!({}));
        r.body = "<html>".to_string();
        assert!(matches!(read_credentials(&r), Err(TaskFailure::MalformedBody(_))));
    }

    #[test]
    fn test_read_client_with_and_without_envelope() {
        let wrapped = response(201, json!({"data": {"id": "c-1", "current_stage": "completed"}}));
        assert_eq!(read_client(&wrapped).unwrap().id, "c-1");

        let bare = response(201, json!({"id": "c-2", "app": {"status": "active"}}));
        let record = read_client(&bare).unwrap();
        assert_eq!(record.id, "c-2");
        assert_eq!(record.app, "active");

        let no_id = response(201, json!({"data": {"name": "x"}}));
        assert_eq!(
            read_client(&no_id),
            Err(TaskFailure::Incomplete(trackme_common::ModelError::MissingField("id")))
        );
    }
}
