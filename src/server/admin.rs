//! JSON admin surface: agent listing, enable toggles and settings updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::agent::{Agent, Registry, RegistryMode, SettingDescriptor};
use crate::registration::RegistrationState;
use crate::{AppError, Result};

/// Agent row of the listing.
#[derive(Debug, Serialize)]
pub struct AgentSummary {
    /// Agent name.
    pub name: String,
    /// Agent description.
    pub description: String,
    /// Enabled flag.
    pub enabled: bool,
    /// Whether the handshake has run for the current host.
    pub announced: bool,
}

impl From<&Agent> for AgentSummary {
    fn from(agent: &Agent) -> Self {
        Self {
            name: agent.name().to_owned(),
            description: agent.description().to_owned(),
            enabled: agent.is_enabled(),
            announced: agent.state() == RegistrationState::Announced,
        }
    }
}

/// Full view of one agent.
#[derive(Debug, Serialize)]
pub struct AgentDetail {
    /// Summary fields.
    #[serde(flatten)]
    pub summary: AgentSummary,
    /// Rendered settings schema.
    pub schema: Vec<SettingDescriptor>,
    /// Current settings values.
    pub settings: BTreeMap<String, Value>,
    /// Settings snapshot version.
    pub settings_version: u64,
    /// Local event names bound for the host.
    pub events: Vec<String>,
    /// Declared job ids.
    pub jobs: Vec<String>,
}

/// Bridge status.
#[derive(Debug, Serialize)]
pub struct Status {
    /// Crate name.
    pub name: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Discovery mode.
    pub mode: RegistryMode,
    /// Whether a host is connected.
    pub connected: bool,
    /// Session id of the connected host.
    pub sid: Option<String>,
    /// Last workspace descriptor from the host.
    pub graph: Option<Value>,
    /// Requests awaiting a host reply.
    pub pending_requests: usize,
    /// Every agent.
    pub agents: Vec<AgentSummary>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Schema(_) | AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::NotConnected(_) | AppError::Disconnected(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Admin routes over `registry`.
pub fn router() -> Router<Arc<Registry>> {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/agent", get(list_agents))
        .route("/agent/", get(list_agents))
        .route("/agent/{name}", get(agent_detail))
        .route("/agent/{name}/enable/toggle", post(toggle_agent))
        .route("/agent/{name}/setting", post(update_setting))
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(registry): State<Arc<Registry>>) -> Json<Status> {
    let transport = registry.transport();
    Json(Status {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mode: registry.mode(),
        connected: transport.is_connected(),
        sid: transport.sid(),
        graph: registry.graph(),
        pending_requests: transport.pending_requests(),
        agents: summaries(&registry),
    })
}

async fn list_agents(State(registry): State<Arc<Registry>>) -> Json<Vec<AgentSummary>> {
    Json(summaries(&registry))
}

fn summaries(registry: &Registry) -> Vec<AgentSummary> {
    registry
        .agents()
        .iter()
        .map(|agent| AgentSummary::from(agent.as_ref()))
        .collect()
}

async fn agent_detail(
    State(registry): State<Arc<Registry>>,
    Path(name): Path<String>,
) -> Result<Json<AgentDetail>> {
    let agent = find(&registry, &name)?;
    let settings = agent.settings();
    Ok(Json(AgentDetail {
        summary: AgentSummary::from(agent.as_ref()),
        schema: agent.rendered_schema()?,
        settings: settings.values().clone(),
        settings_version: settings.version(),
        events: agent.event_names(),
        jobs: agent.job_ids(),
    }))
}

async fn toggle_agent(
    State(registry): State<Arc<Registry>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let enabled = registry.toggle(&name).await?;
    Ok(Json(json!({ "name": name, "enabled": enabled })))
}

async fn update_setting(
    State(registry): State<Arc<Registry>>,
    Path(name): Path<String>,
    Form(pairs): Form<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let settings = registry.update_settings(&name, &pairs).await?;
    Ok(Json(json!({
        "name": name,
        "version": settings.version(),
        "settings": settings.values(),
    })))
}

fn find(registry: &Registry, name: &str) -> Result<Arc<Agent>> {
    registry
        .agent(name)
        .ok_or_else(|| AppError::NotFound(format!("agent {name:?} not found")))
}
