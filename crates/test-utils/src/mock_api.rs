//! In-process mock of the TrackMe REST API.
//!
//! Serves the `/api/v1` routes the load-test actors call, keeps accounts and
//! clients in memory, and records every request it receives. Tests can script
//! one-off status codes with [`MockApi::respond_once`].

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use trackme_common::Stage;

use crate::fixtures::{auth_envelope, server_client};

/// Path prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

type Shared = Arc<Mutex<MockState>>;

/// A request as received by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path relative to [`API_PREFIX`].
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    name: String,
    email: String,
    password: String,
    role: String,
}

#[derive(Debug)]
struct Scripted {
    method: String,
    path: String,
    reply: ScriptedReply,
}

#[derive(Debug, Clone, Copy)]
enum ScriptedReply {
    Status(u16),
    /// 200 headers, then the body stream fails partway.
    BrokenBody,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    clients: HashMap<String, Value>,
    scripted: VecDeque<Scripted>,
    requests: Vec<RecordedRequest>,
}

/// A running mock server; shut down on drop.
pub struct MockApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockApi {
    /// Bind to an ephemeral local port and start serving.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new().fallback(dispatch).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock API");
        let addr = listener.local_addr().expect("Mock API has no local address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Host URL without the API prefix, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer the next `method path` request with `status` instead of the normal handler.
    pub fn respond_once(&self, method: &str, path: &str, status: u16) {
        self.script(method, path, ScriptedReply::Status(status));
    }

    /// Cut the connection while sending the body of the next `method path` response.
    pub fn break_body_once(&self, method: &str, path: &str) {
        self.script(method, path, ScriptedReply::BrokenBody);
    }

    fn script(&self, method: &str, path: &str, reply: ScriptedReply) {
        self.lock().scripted.push_back(Scripted {
            method: method.to_uppercase(),
            path: path.to_string(),
            reply,
        });
    }

    /// Create an account directly, as if registered earlier.
    pub fn add_account(&self, email: &str, password: &str, role: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                id: id.clone(),
                name: "Existing User".to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: role.to_string(),
            },
        );
        id
    }

    /// Role of the account registered under `email`.
    pub fn account_role(&self, email: &str) -> Option<String> {
        self.lock().accounts.get(email).map(|a| a.role.clone())
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Delete a client behind the actors' backs.
    pub fn remove_client(&self, id: &str) -> bool {
        self.lock().clients.remove(id).is_some()
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.lock().clients.keys().cloned().collect()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Requests matching `method` whose path starts with `path_prefix`.
    pub fn requests_to(&self, method: &str, path_prefix: &str) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method) && r.path.starts_with(path_prefix))
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("Mock API state poisoned")
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn dispatch(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Option<Value> = serde_json::from_slice(&body).ok();

    let mut state = state.lock().expect("Mock API state poisoned");
    state.requests.push(RecordedRequest {
        method: method.as_str().to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: authorization.clone(),
        body: body.clone(),
    });

    match state.take_scripted(method.as_str(), &path) {
        Some(ScriptedReply::Status(status)) => {
            return reply(status, json!({"message": "scripted response"}))
        }
        Some(ScriptedReply::BrokenBody) => return broken_body(),
        None => {}
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let body = body.unwrap_or(Value::Null);

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["auth", "register"]) => return state.register(&body),
        ("POST", ["auth", "login"]) => return state.login(&body),
        _ => {}
    }

    if !state.is_authorized(authorization.as_deref()) {
        return reply(401, json!({"message": "unauthorized"}));
    }

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["clients"]) => {
            let clients: Vec<Value> = state.clients.values().cloned().collect();
            reply(200, json!({"data": clients}))
        }
        ("POST", ["clients"]) => state.create_client(&body),
        ("PUT", ["clients", id, "stage"]) => state.update_stage(id, &body),
        ("DELETE", ["clients", id]) => match state.clients.remove(*id) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => reply(404, json!({"message": "client not found"})),
        },
        ("GET", ["metrics"]) => reply(200, json!({"data": []})),
        ("GET", ["users"]) => {
            let users: Vec<Value> = state.accounts.values().map(account_json).collect();
            reply(200, json!({"data": users}))
        }
        ("GET", ["users", id]) => match state.accounts.values().find(|a| a.id == *id) {
            Some(account) => reply(200, json!({"data": account_json(account)})),
            None => reply(404, json!({"message": "user not found"})),
        },
        _ => reply(404, json!({"message": "no such route"})),
    }
}

impl MockState {
    fn take_scripted(&mut self, method: &str, path: &str) -> Option<ScriptedReply> {
        let pos = self
            .scripted
            .iter()
            .position(|s| s.method == method && s.path == path)?;
        self.scripted.remove(pos).map(|s| s.reply)
    }

    fn is_authorized(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|token| self.tokens.contains_key(token))
            .unwrap_or(false)
    }

    fn issue_token(&mut self, user_id: &str) -> String {
        let token = format!("token-{}", uuid::Uuid::new_v4().simple());
        self.tokens.insert(token.clone(), user_id.to_string());
        token
    }

    fn register(&mut self, body: &Value) -> Response {
        let (Some(email), Some(password)) = (body["email"].as_str(), body["password"].as_str())
        else {
            return reply(400, json!({"message": "email: cannot be blank"}));
        };
        if self.accounts.contains_key(email) {
            return reply(409, json!({"message": "user already exists"}));
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: body["name"].as_str().unwrap_or_default().to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: body["role"].as_str().unwrap_or("user").to_string(),
        };
        let token = self.issue_token(&account.id);
        let envelope = auth_envelope(&token, &account.id, &account.email, &account.role);
        self.accounts.insert(email.to_string(), account);
        reply(201, envelope)
    }

    fn login(&mut self, body: &Value) -> Response {
        let account = body["email"]
            .as_str()
            .and_then(|email| self.accounts.get(email))
            .filter(|a| body["password"].as_str() == Some(a.password.as_str()))
            .cloned();
        match account {
            Some(account) => {
                let token = self.issue_token(&account.id);
                reply(
                    200,
                    auth_envelope(&token, &account.id, &account.email, &account.role),
                )
            }
            None => reply(401, json!({"message": "invalid credentials"})),
        }
    }

    fn create_client(&mut self, body: &Value) -> Response {
        if let Err(message) = validate_client(body) {
            return reply(400, json!({"message": message}));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let client = server_client(&id, body);
        self.clients.insert(id, client.clone());
        reply(201, json!({"data": client}))
    }

    fn update_stage(&mut self, id: &str, body: &Value) -> Response {
        if let Err(message) = validate_client(body) {
            return reply(400, json!({"message": message}));
        }
        if !self.clients.contains_key(id) {
            return reply(404, json!({"message": "client not found"}));
        }
        let client = server_client(id, body);
        self.clients.insert(id.to_string(), client.clone());
        reply(200, json!({"data": client}))
    }
}

/// Reject payloads the real server could not bind.
fn validate_client(body: &Value) -> Result<(), String> {
    let stage = body["stage"].as_str().ok_or("stage: cannot be blank")?;
    stage
        .parse::<Stage>()
        .map_err(|_| format!("stage: unknown value {}", stage))?;
    if body["email"].as_str().map_or(true, str::is_empty) {
        return Err("email: cannot be blank".to_string());
    }
    if !body["app"].is_null() && !body["app"].is_string() {
        return Err("app: expected string".to_string());
    }
    if let Some(contracts) = body["contracts"].as_array() {
        for contract in contracts {
            if !contract["autopayment"].is_string() {
                return Err("autopayment: expected string".to_string());
            }
        }
    }
    Ok(())
}

fn account_json(account: &Account) -> Value {
    json!({
        "id": account.id,
        "name": account.name,
        "email": account.email,
        "role": account.role,
    })
}

fn broken_body() -> Response {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"{\"data\": [")),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "scripted disconnect",
        )),
    ];
    let body = Body::from_stream(futures::stream::iter(chunks));
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn reply(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}
