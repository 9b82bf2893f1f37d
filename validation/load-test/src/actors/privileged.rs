//! The administrator profile: heavier reads, simpler writes, default accounting.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{read_credentials, Actor, ActorContext, ActorKind};
use crate::api::ApiResponse;
use crate::error::TaskFailure;
use crate::generator::{
    account_email, display_name, privileged_client, LoginRequest, RegisterRequest,
    PRIVILEGED_PASSWORD,
};
use crate::session::Session;
use crate::tasks::{NamedTask, TaskSet, WaitTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegedTask {
    ListClients,
    CreateClient,
    CheckMetrics,
    ManageUsers,
}

impl PrivilegedTask {
    pub const WEIGHTS: [(PrivilegedTask, u32); 4] = [
        (PrivilegedTask::ListClients, 15),
        (PrivilegedTask::CreateClient, 8),
        (PrivilegedTask::CheckMetrics, 10),
        (PrivilegedTask::ManageUsers, 5),
    ];
}

impl NamedTask for PrivilegedTask {
    fn name(&self) -> &'static str {
        match self {
            PrivilegedTask::ListClients => "list_clients",
            PrivilegedTask::CreateClient => "create_client",
            PrivilegedTask::CheckMetrics => "check_metrics",
            PrivilegedTask::ManageUsers => "manage_users",
        }
    }
}

pub struct PrivilegedActor {
    session: Session,
    tasks: TaskSet<PrivilegedTask>,
    wait: WaitTime,
}

impl PrivilegedActor {
    pub fn new(wait: WaitTime) -> Self {
        Self {
            session: Session::default(),
            tasks: TaskSet::new(&PrivilegedTask::WEIGHTS),
            wait,
        }
    }

    /// Replace the default task weights.
    pub fn with_tasks(mut self, tasks: TaskSet<PrivilegedTask>) -> Self {
        self.tasks = tasks;
        self
    }

    async fn register(&mut self, ctx: &mut ActorContext) {
        let response = {
            let request = RegisterRequest {
                email: &self.session.email,
                name: display_name(&mut ctx.rng, "Admin User"),
                password: &self.session.password,
                role: "admin",
            };
            ctx.client.post("/auth/register", &request, None).await
        };

        let outcome = match response.status {
            201 => self.accept_credentials(&response),
            _ => TaskFailure::check_default(&response),
        };
        ctx.record("/auth/register [ADMIN]", &response, &outcome)
            .await;

        if response.status == 409 {
            info!(actor = ctx.id, email = %self.session.email, "Admin account exists, logging in");
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
            _ => TaskFailure::check_default(&response),
        };
        ctx.record("/auth/login [ADMIN]", &response, &outcome).await;
    }

    fn accept_credentials(&mut self, response: &ApiResponse) -> Result<(), TaskFailure> {
        let (token, user_id) = read_credentials(response)?;
        self.session.authenticate(&token, user_id.as_deref());
        Ok(())
    }

    fn token(&self, ctx: &ActorContext, task: PrivilegedTask) -> Option<String> {
        let token = self.session.token().map(str::to_string);
        if token.is_none() {
            debug!(actor = ctx.id, task = task.name(), "Skipped - not authenticated");
        }
        token
    }

    async fn list_clients(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token(ctx, PrivilegedTask::ListClients) else {
            return;
        };
        let query = [("limit", "100".to_string()), ("is_active", "true".to_string())];

        let response = ctx.client.get("/clients", &query, Some(&token)).await;
        let outcome = TaskFailure::check_default(&response);
        ctx.record("/clients [ADMIN LIST]", &response, &outcome).await;
    }

    async fn create_client(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token(ctx, PrivilegedTask::CreateClient) else {
            return;
        };
        let payload = privileged_client(&mut ctx.rng);

        let response = ctx.client.post("/clients", &payload, Some(&token)).await;
        // Created clients are never revisited
        let outcome = TaskFailure::check_default(&response);
        ctx.record("/clients [ADMIN CREATE]", &response, &outcome)
            .await;
    }

    async fn check_metrics(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token(ctx, PrivilegedTask::CheckMetrics) else {
            return;
        };
        let query = [("interval", "day".to_string())];

        let response = ctx.client.get("/metrics", &query, Some(&token)).await;
        let outcome = TaskFailure::check_default(&response);
        ctx.record("/metrics [ADMIN]", &response, &outcome).await;
    }

    async fn manage_users(&mut self, ctx: &mut ActorContext) {
        let Some(token) = self.token(ctx, PrivilegedTask::ManageUsers) else {
            return;
        };
        let query = [("limit", "100".to_string())];

        let response = ctx.client.get("/users", &query, Some(&token)).await;
        let outcome = TaskFailure::check_default(&response);
        ctx.record("/users [ADMIN LIST]", &response, &outcome).await;
    }
}

#[async_trait]
impl Actor for PrivilegedActor {
    type Task = PrivilegedTask;

    fn kind(&self) -> ActorKind {
        ActorKind::Privileged
    }

    fn tasks(&self) -> &TaskSet<PrivilegedTask> {
        &self.tasks
    }

    fn wait_time(&self) -> WaitTime {
        self.wait
    }

    fn session(&self) -> &Session {
        &self.session
    }

    async fn on_start(&mut self, ctx: &mut ActorContext) {
        self.session = Session::new(account_email(&mut ctx.rng, "admin"), PRIVILEGED_PASSWORD);
        self.register(ctx).await;
    }

    async fn run(&mut self, task: PrivilegedTask, ctx: &mut ActorContext) {
        match task {
            PrivilegedTask::ListClients => self.list_clients(ctx).await,
            PrivilegedTask::CreateClient => self.create_client(ctx).await,
            PrivilegedTask::CheckMetrics => self.check_metrics(ctx).await,
            PrivilegedTask::ManageUsers => self.manage_users(ctx).await,
        }
    }
}
