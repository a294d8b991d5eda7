//! A fake ZO service bound to a random local port.
//!
//! It keeps roles in memory, records every call it serves and decrypts every ingested
//! `log` field with the same keyset the harness encrypts with.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use data_encoding::BASE64;
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use zo_api_e2e::api::response::ServiceStatus;
use zo_api_e2e::config::{
    BASE_URL_ENV, CIPHER_KEY_TYPE_ENV, ROOT_USER_EMAIL_ENV, ROOT_USER_PASSWORD_ENV,
};
use zo_api_e2e::security::keyset::Keyset;
use zo_api_e2e::{CipherVariant, FieldEncryptor, HarnessConfig, Session};

/// How GET of a role that does not exist is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRole {
    #[default]
    NotFound,
    /// `200 []`
    EmptyOk,
    /// `200` with the role still named, as a lagging read replica would answer.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct FakeOptions {
    pub credentials: Option<(String, String)>,
    pub variant: CipherVariant,
    pub missing_role: MissingRole,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRole {
    pub updates: u32,
    pub token_rotations: u32,
}

#[derive(Debug, Clone)]
pub struct IngestedBatch {
    pub org: String,
    pub stream: String,
    pub records: Vec<Value>,
    pub decrypted: Vec<Option<String>>,
}

struct FakeState {
    authorization: Option<String>,
    missing_role: MissingRole,
    encryptor: FieldEncryptor,
    roles: Mutex<BTreeMap<(String, String), FakeRole>>,
    ingested: Mutex<Vec<IngestedBatch>>,
    calls: Mutex<Vec<String>>,
}

type SharedState = Arc<FakeState>;

impl FakeState {
    fn record(&self, call: String) {
        info!("fake zo: {}", call);
        self.calls.lock().unwrap().push(call);
    }
}

pub struct FakeZo {
    base_url: String,
    options: FakeOptions,
    state: SharedState,
    server: JoinHandle<()>,
}

impl FakeZo {
    pub async fn start() -> FakeZo {
        FakeZo::start_with(FakeOptions::default()).await
    }

    pub async fn start_with(options: FakeOptions) -> FakeZo {
        let authorization = options
            .credentials
            .as_ref()
            .map(|(user, password)| format!("Basic {}", BASE64.encode(format!("{user}:{password}").as_bytes())));

        let state = Arc::new(FakeState {
            authorization,
            missing_role: options.missing_role,
            encryptor: FieldEncryptor::new(&Keyset::embedded().unwrap(), options.variant).unwrap(),
            roles: Mutex::new(BTreeMap::new()),
            ingested: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = app(state.clone());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeZo {
            base_url: format!("http://{addr}/"),
            options,
            state,
            server,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Harness configuration pointing at this fake, with its credentials and variant.
    pub fn config(&self) -> HarnessConfig {
        self.config_with(&[])
    }

    pub fn config_with(&self, overrides: &[(&str, &str)]) -> HarnessConfig {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert(BASE_URL_ENV.into(), self.base_url.clone());
        vars.insert(CIPHER_KEY_TYPE_ENV.into(), self.options.variant.to_string());
        if let Some((user, password)) = &self.options.credentials {
            vars.insert(ROOT_USER_EMAIL_ENV.into(), user.clone());
            vars.insert(ROOT_USER_PASSWORD_ENV.into(), password.clone());
        }
        for (name, value) in overrides {
            vars.insert(name.to_string(), value.to_string());
        }

        HarnessConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    pub fn session(&self) -> Session {
        Session::open(&self.config()).unwrap()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.state
            .roles
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.role_names().iter().any(|role| role == name)
    }

    pub fn role(&self, org: &str, name: &str) -> Option<FakeRole> {
        self.state
            .roles
            .lock()
            .unwrap()
            .get(&(org.to_string(), name.to_string()))
            .cloned()
    }

    pub fn seed_role(&self, org: &str, name: &str) {
        self.state
            .roles
            .lock()
            .unwrap()
            .insert((org.to_string(), name.to_string()), FakeRole::default());
    }

    /// Every call served so far, as `"<METHOD> <what>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn ingested(&self) -> Vec<IngestedBatch> {
        self.state.ingested.lock().unwrap().clone()
    }
}

impl Drop for FakeZo {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn app(state: SharedState) -> Router {
    Router::new()
        .route("/api/{org}/roles", get(list_roles).post(create_role))
        .route(
            "/api/{org}/roles/{name}",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route(
            "/api/{org}/roles/{name}/permissions/{category}",
            get(role_permissions),
        )
        .route("/api/{org}/{stream}/_json", post(ingest_json))
        .layer(from_fn_with_state(state.clone(), require_basic_auth))
        .with_state(state)
}

fn reply(code: StatusCode, message: impl Into<String>) -> Response {
    (code, Json(ServiceStatus::of(code, message))).into_response()
}

async fn require_basic_auth(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.authorization {
        let given = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok());

        if given != Some(expected.as_str()) {
            state.record(format!("{} unauthorized", request.method()));
            return reply(StatusCode::UNAUTHORIZED, "Unauthorized Access");
        }
    }

    next.run(request).await
}

fn valid_role_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn list_roles(State(state): State<SharedState>, Path(org): Path<String>) -> Response {
    state.record("GET roles".into());

    let roles: Vec<Value> = state
        .roles
        .lock()
        .unwrap()
        .keys()
        .filter(|(role_org, _)| *role_org == org)
        .map(|(_, name)| json!({ "name": name }))
        .collect();

    (StatusCode::OK, Json(roles)).into_response()
}

async fn create_role(
    State(state): State<SharedState>,
    Path(org): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let Some(name) = payload.get("name").and_then(Value::as_str) else {
        state.record("POST role without name".into());
        return reply(StatusCode::BAD_REQUEST, "Role name is required");
    };
    state.record(format!("POST {name}"));

    if !valid_role_name(name) {
        return reply(StatusCode::BAD_REQUEST, "Invalid role name");
    }

    let mut roles = state.roles.lock().unwrap();
    let key = (org, name.to_string());
    if roles.contains_key(&key) {
        return reply(StatusCode::CONFLICT, "Role already exists");
    }
    roles.insert(key, FakeRole::default());

    reply(StatusCode::OK, "Role created successfully")
}

async fn get_role(
    State(state): State<SharedState>,
    Path((org, name)): Path<(String, String)>,
) -> Response {
    state.record(format!("GET {name}"));

    match state.roles.lock().unwrap().get(&(org, name.clone())) {
        Some(role) => (
            StatusCode::OK,
            Json(json!({
                "name": name,
                "updates": role.updates,
                "token_rotations": role.token_rotations,
            })),
        )
            .into_response(),
        None => match state.missing_role {
            MissingRole::NotFound => reply(StatusCode::NOT_FOUND, "Role not found"),
            MissingRole::EmptyOk => (StatusCode::OK, Json(Vec::<Value>::new())).into_response(),
            MissingRole::Stale => (StatusCode::OK, Json(json!({ "name": name }))).into_response(),
        },
    }
}

async fn update_role(
    State(state): State<SharedState>,
    Path((org, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Json(_payload): Json<Value>,
) -> Response {
    let rotate = query.get("rotateToken").map(String::as_str) == Some("true");
    state.record(format!("PUT {name}{}", if rotate { " rotateToken" } else { "" }));

    match state.roles.lock().unwrap().get_mut(&(org, name)) {
        Some(role) if rotate => {
            role.token_rotations += 1;
            reply(StatusCode::OK, "Token rotated")
        }
        Some(role) => {
            role.updates += 1;
            reply(StatusCode::OK, "Role updated successfully")
        }
        None => reply(StatusCode::NOT_FOUND, "Role not found"),
    }
}

async fn delete_role(
    State(state): State<SharedState>,
    Path((org, name)): Path<(String, String)>,
) -> Response {
    state.record(format!("DELETE {name}"));

    match state.roles.lock().unwrap().remove(&(org, name)) {
        Some(_) => reply(StatusCode::OK, "Role deleted"),
        None => reply(StatusCode::NOT_FOUND, "Role not found"),
    }
}

async fn role_permissions(
    State(state): State<SharedState>,
    Path((org, name, category)): Path<(String, String, String)>,
) -> Response {
    state.record(format!("GET {name} permissions {category}"));

    if state.roles.lock().unwrap().contains_key(&(org, name)) {
        (StatusCode::OK, Json(Vec::<Value>::new())).into_response()
    } else {
        reply(StatusCode::NOT_FOUND, "Role not found")
    }
}

async fn ingest_json(
    State(state): State<SharedState>,
    Path((org, stream)): Path<(String, String)>,
    Json(records): Json<Vec<Value>>,
) -> Response {
    state.record(format!("POST {stream} _json"));

    let decrypted: Vec<Option<String>> = records
        .iter()
        .map(|record| {
            record
                .get("log")
                .and_then(Value::as_str)
                .and_then(|log| state.encryptor.decrypt_field(log).ok())
        })
        .collect();

    let failed = records
        .iter()
        .zip(&decrypted)
        .filter(|(record, log)| record.get("log").is_some_and(Value::is_string) && log.is_none())
        .count();
    let successful = records.len() - failed;

    state.ingested.lock().unwrap().push(IngestedBatch {
        org,
        stream: stream.clone(),
        records,
        decrypted,
    });

    let mut status = json!({ "name": stream, "successful": successful, "failed": failed });
    if failed > 0 {
        status["error"] = "log field could not be decrypted".into();
    }

    (StatusCode::OK, Json(json!({ "code": 200, "status": [status] }))).into_response()
}
