use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Json, Path, Request, State},
    http::{header, HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::AssemblyError;
use crate::inventory::AssemblyService;
use crate::session::{PersistenceType, SessionStore};

const MESSAGE_REGISTRY: &str = "Base.1.13.0";
const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");
const SESSIONS_URI: &str = "/redfish/v1/SessionService/Sessions";

/// Failure of an HTTP request, rendered as a Redfish error body.
#[derive(Debug)]
pub enum ServerError {
    Assembly(AssemblyError),
    NoValidSession,
}

impl From<AssemblyError> for ServerError {
    fn from(err: AssemblyError) -> Self {
        Self::Assembly(err)
    }
}

fn error_body(message_id: &str, message: String, args: Vec<String>) -> Value {
    let code = format!("{}.{}", MESSAGE_REGISTRY, message_id);
    json!({
        "error": {
            "code": code,
            "message": message,
            "@Message.ExtendedInfo": [{
                "@odata.type": "#Message.v1_1_1.Message",
                "MessageId": code,
                "Message": message,
                "MessageArgs": args,
            }]
        }
    })
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::NoValidSession => (
                StatusCode::UNAUTHORIZED,
                Json(error_body(
                    "NoValidSession",
                    "There is no valid session established with the implementation.".to_string(),
                    Vec::new(),
                )),
            )
                .into_response(),
            ServerError::Assembly(err) => {
                let status = match err {
                    AssemblyError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
                    AssemblyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_REQUEST,
                };
                let message = if err.is_client_error() {
                    err.to_string()
                } else {
                    error!("Request failed: {}", err);
                    "The request failed due to an internal service error.".to_string()
                };
                (status, Json(error_body(err.message_id(), message, err.message_args()))).into_response()
            }
        }
    }
}

/// The one account allowed to open sessions.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    fn accepts(&self, username: &str, password: &str) -> bool {
        matches!(&self.password, Some(expected) if self.username == username && expected == password)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssemblyService>,
    pub sessions: Arc<SessionStore>,
    pub credentials: Arc<Credentials>,
}

pub fn router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route(
            "/redfish/v1/Chassis/{chassis_id}/Assembly",
            get(get_assembly).patch(patch_assembly),
        )
        .route("/redfish/v1/SessionService/Sessions/{session_id}", delete(delete_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(authenticated)
        .route(SESSIONS_URI, post(create_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Assembly service listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn require_session(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(&AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let session = match token {
        Some(token) => state.sessions.login_by_token(&token).await,
        None => None,
    };
    if session.is_none() {
        warn!("Rejected unauthenticated {} {}", request.method(), request.uri());
        return ServerError::NoValidSession.into_response();
    }
    next.run(request).await
}

async fn get_assembly(
    State(state): State<AppState>,
    Path(chassis_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let collection = state.service.get_assemblies(&chassis_id).await?;
    Ok(Json(collection))
}

/// The body is parsed by the service, after the chassis is resolved, so an
/// unknown chassis answers 404 whatever the body holds.
async fn patch_assembly(
    State(state): State<AppState>,
    Path(chassis_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    let body: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    state.service.patch_assemblies(&chassis_id, &body).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LoginRequest {
    user_name: String,
    password: String,
}

async fn create_session(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServerError> {
    if !state.credentials.accepts(&login.user_name, &login.password) {
        warn!("Login failed for {}", login.user_name);
        return Err(ServerError::NoValidSession);
    }

    let session = state
        .sessions
        .generate(&login.user_name, None, PersistenceType::Timeout)
        .await;
    persist_sessions(&state).await;

    let location = format!("{}/{}", SESSIONS_URI, session.unique_id);
    let body = json!({
        "@odata.id": location,
        "@odata.type": "#Session.v1_5_0.Session",
        "Id": session.unique_id,
        "Name": "User Session",
        "UserName": session.username,
    });
    Ok((
        StatusCode::CREATED,
        [(AUTH_TOKEN_HEADER, session.session_token), (header::LOCATION, location)],
        Json(body),
    ))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if !state.sessions.remove(&session_id).await {
        return Err(AssemblyError::ResourceNotFound {
            kind: "Session",
            id: session_id,
        }
        .into());
    }
    persist_sessions(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn persist_sessions(state: &AppState) {
    if let Err(e) = state.sessions.persist().await {
        warn!("Failed to persist sessions: {:#}", e);
    }
}
