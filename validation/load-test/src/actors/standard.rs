//! The ordinary end user.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use super::{read_client, read_credentials, Actor, ActorContext, ActorKind};
use crate::api::ApiResponse;
use crate::error::TaskFailure;
use crate::generator::{
    account_email, display_name, pick_filter, random_client, random_stage, user_page,
    LoginRequest, RegisterRequest, CLIENT_FILTERS, METRIC_FILTERS, STANDARD_PASSWORD,
};
use crate::session::Session;
use crate::tasks::{NamedTask, TaskSet, WaitTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardTask {
    ListClients,
    CreateClient,
    UpdateClientStage,
    GetMetrics,
    ListUsers,
    GetCurrentUser,
    DeleteClient,
}

impl StandardTask {
    pub const WEIGHTS: [(StandardTask, u32); 7] = [
        (StandardTask::ListClients, 10),
        (StandardTask::CreateClient, 6),
        (StandardTask::UpdateClientStage, 4),
        (StandardTask::GetMetrics, 8),
        (StandardTask::ListUsers, 5),
        (StandardTask::GetCurrentUser, 2),
        (StandardTask::DeleteClient, 1),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StandardTask::ListClients => "list_clients",
            StandardTask::CreateClient => "create_client",
            StandardTask::UpdateClientStage => "update_client_stage",
            StandardTask::GetMetrics => "get_metrics",
            StandardTask::ListUsers => "list_users",
            StandardTask::GetCurrentUser => "get_current_user",
            StandardTask::DeleteClient => "delete_client",
        }
    }
}

impl NamedTask for StandardTask {
    fn name(&self) -> &'static str {
        self.as_str()
    }
}

/// Registers once, then lists, creates, restages and deletes its own clients.
///
/// Classifies every response itself: a 401 clears the token, a 404 on update
/// forgets the client.
pub struct StandardActor {
    session: Session,
    tasks: TaskSet<StandardTask>,
    wait: WaitTime,
}

impl StandardActor {
    pub fn new(wait: WaitTime) -> Self {
        Self {
            session: Session::default(),
            tasks: TaskSet::new(&StandardTask::WEIGHTS),
            wait,
        }
    }

    /// Replace the default task weights.
    pub fn with_tasks(mut self, tasks: TaskSet<StandardTask>) -> Self {
        self.tasks = tasks;
        self
    }

    async fn register(&mut self, ctx: &mut ActorContext) {
        let response = {
            let request = RegisterRequest {
                email: &self.session.email,
                name: display_name(&mut ctx.rng, "Test User"),
                password: &self.session.password,
                role: "user",
            };
            ctx.client.post("/auth/register", &request, None).await
        };

        let outcome = match response.status {
            201 => self.accept_credentials(&response),
            // Already registered
            409 => Ok(()),
            _ => Err(TaskFailure::from_response(&response)),
        };
        ctx.record("/auth/register", &response, &outcome).await;

        if response.status == 409 {
            info!(actor = ctx.id, email = %self.session.email, "Account exists, logging in");
            self.login(ctx).await;
        }
    }

    async fn login(&mut self, ctx: &mut ActorContext) {
        let response = {
            let request = LoginRequest {
                email: &self.session.email,
                password: &self.session.password,
            };
            ctx.client.post("/auth/login", &request, None).await
        };

        let outcome = match response.status {
            200 => self.accept_credentials(&response),
            _ => Err(TaskFailure::from_response(&response)),
        };
        ctx.record("/auth/login", &response, &outcome).await;
    }

    fn accept_credentials(&mut self, response: &ApiResponse) -> Result<(), TaskFailure> {
        let (token, user_id) = read_credentials(response)?;
        self.session.authenticate(&token, user_id.as_deref());
        Ok(())
    }

    /// The token to send, or `None` after logging the skip.
    fn token_for(&self, ctx: &ActorContext, task: StandardTask) -> Option<String> {
        let token = self.session.token().map(str::to_string);
        if token.is_none() {
            warn!(actor = ctx.id, task = task.as_str(), "Skipped - no token available");
        }
        token
    }

    /// Classification shared by the read-only tasks.
    fn check_read(&mut self, response: &ApiResponse) -> Result<(), TaskFailure> {
        match response.status {
            200 => Ok(()),
            401 => {
                self.session.invalidate_token();
                Err(TaskFailure::Unauthorized)
            }
            _ => Err(TaskFailure::from_response(response)),
        }
    }

    async fn list_clients(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::ListClients) else {
            return;
        };
        let query = pick_filter(&mut ctx.rng, &CLIENT_FILTERS);

        let response = ctx.client.get("/clients", &query, Some(&token)).await;
        let outcome = self.check_read(&response);
        ctx.record("/clients [LIST]", &response, &outcome).await;
    }

    async fn create_client(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::CreateClient) else {
            return;
        };
        let payload = random_client(&mut ctx.rng);

        let response = ctx.client.post("/clients", &payload, Some(&token)).await;
        let outcome = match response.status {
            201 => read_client(&response).map(|record| self.session.remember(record)),
            401 => {
                self.session.invalidate_token();
                Err(TaskFailure::Unauthorized)
            }
            _ => Err(TaskFailure::from_response(&response)),
        };
        ctx.record("/clients [CREATE]", &response, &outcome).await;
    }

    async fn update_client_stage(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::UpdateClientStage) else {
            return;
        };
        let Some(index) = self.session.pick_record(&mut ctx.rng) else {
            debug!(actor = ctx.id, task = "update_client_stage", "Skipped - no clients available");
            return;
        };

        let stage = random_stage(&mut ctx.rng);
        let is_active = ctx.rng.gen_bool(0.5);
        let Some(record) = self.session.record_mut(index) else {
            return;
        };
        record.restage(stage, is_active);
        let payload = record.clone();

        let path = format!("/clients/{}/stage", payload.id);
        let response = ctx.client.put(&path, &payload, Some(&token)).await;
        let outcome = match response.status {
            200 | 201 => Ok(()),
            404 => {
                self.session.forget(&payload.id);
                Err(TaskFailure::NotFound(payload.id.clone()))
            }
            _ => Err(TaskFailure::from_response(&response)),
        };
        ctx.record("/clients/{id}/stage [UPDATE]", &response, &outcome)
            .await;
    }

    async fn get_metrics(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::GetMetrics) else {
            return;
        };
        let query = pick_filter(&mut ctx.rng, &METRIC_FILTERS);

        let response = ctx.client.get("/metrics", &query, Some(&token)).await;
        let outcome = self.check_read(&response);
        ctx.record("/metrics [GET]", &response, &outcome).await;
    }

    async fn list_users(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::ListUsers) else {
            return;
        };
        let query = user_page(&mut ctx.rng);

        let response = ctx.client.get("/users", &query, Some(&token)).await;
        let outcome = self.check_read(&response);
        ctx.record("/users [LIST]", &response, &outcome).await;
    }

    async fn get_current_user(&mut self, ctx: &mut ActorContext) {
        let (Some(token), Some(user_id)) = (self.session.token(), self.session.user_id()) else {
            warn!(
                actor = ctx.id,
                task = StandardTask::GetCurrentUser.as_str(),
                "Skipped - no token or user id available"
            );
            return;
        };
        let token = token.to_string();
        let path = format!("/users/{}", user_id);

        let response = ctx.client.get(&path, &[], Some(&token)).await;
        let outcome = self.check_read(&response);
        ctx.record("/users/{id} [GET]", &response, &outcome).await;
    }

    async fn delete_client(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token_for(ctx, StandardTask::DeleteClient) else {
            return;
        };
        // Removed up front; a 404 needs no repair
        let Some(record) = self.session.take_spare_record() else {
            debug!(actor = ctx.id, task = "delete_client", "Skipped - not enough clients");
            return;
        };

        let path = format!("/clients/{}", record.id);
        let response = ctx.client.delete(&path, Some(&token)).await;
        let outcome = match response.status {
            204 => Ok(()),
            404 => Err(TaskFailure::NotFound(record.id)),
            _ => Err(TaskFailure::from_response(&response)),
        };
        ctx.record("/clients/{id} [DELETE]", &response, &outcome).await;
    }
}

#[async_trait]
impl Actor for StandardActor {
    type Task = StandardTask;

    fn kind(&self) -> ActorKind {
        ActorKind::Standard
    }

    fn tasks(&self) -> &TaskSet<StandardTask> {
        &self.tasks
    }

    fn wait_time(&self) -> WaitTime {
        self.wait
    }

    fn session(&self) -> &Session {
        &self.session
    }

    async fn on_start(&mut self, ctx: &mut ActorContext) {
        self.session = Session::new(account_email(&mut ctx.rng, "user"), STANDARD_PASSWORD);
        self.register(ctx).await;
    }

    async fn run(&mut self, task: StandardTask, ctx: &mut ActorContext) {
        match task {
            StandardTask::ListClients => self.list_clients(ctx).await,
            StandardTask::CreateClient => self.create_client(ctx).await,
            StandardTask::UpdateClientStage => self.update_client_stage(ctx).await,
            StandardTask::GetMetrics => self.get_metrics(ctx).await,
            StandardTask::ListUsers => self.list_users(ctx).await,
            StandardTask::GetCurrentUser => self.get_current_user(ctx).await,
            StandardTask::DeleteClient => self.delete_client(ctx).await,
        }
    }
}
