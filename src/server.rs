use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::assignment::engine::assign_property_batch;
use crate::assignment::{AssignmentSummary, TicketRef};
use crate::audit::sink::{AuditSink, LogSink, StoreSink, WebhookSink};
use crate::audit::writer::{spawn_writer, AuditHandle};
use crate::audit::AuditLogEntry;
use crate::config::Config;
use crate::dictionary::builtin::builtin;
use crate::dictionary::{DictionarySummary, SkillGroup};
use crate::gateway::http::HttpReasoningGateway;
use crate::gateway::ReasoningGateway;
use crate::resolver::{ResolvePolicy, Resolver, ResolverOptions, ResolvedClassification};
use crate::roster::WorkerSkillEntry;
use crate::store::TriageStore;

#[derive(Clone)]
struct ApiState {
    config: Config,
    db_path: PathBuf,
    resolver: Arc<Resolver>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct ClassifyRequest {
    text: String,
    #[serde(default)]
    force_escalation: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TicketInput {
    ticket_id: String,
    skill_group: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AssignRequest {
    property_id: String,
    #[serde(default)]
    tickets: Vec<TicketInput>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkersQuery {
    property: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UpsertWorkerRequest {
    worker_id: String,
    property_id: String,
    skills: Vec<String>,
    #[serde(default = "default_true")]
    is_available: bool,
    #[serde(default)]
    is_checked_in: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct PresenceRequest {
    worker_id: String,
    property_id: String,
    checked_in: Option<bool>,
    available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct AuditQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct RosterResponse {
    workers: Vec<WorkerSkillEntry>,
}

#[derive(Debug, Serialize)]
struct PresenceResponse {
    rows_updated: usize,
}

#[derive(Debug, Serialize)]
struct AuditResponse {
    entries: Vec<AuditLogEntry>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let db_path = config.resolved_db_path();
    let sinks = build_audit_sinks(&config, &db_path)?;
    let (audit, _writer) = spawn_writer(sinks);
    let resolver = Arc::new(build_resolver(&config, audit)?);

    let state = ApiState {
        config,
        db_path,
        resolver,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/classify", post(classify))
        .route("/v1/assign", post(assign))
        .route("/v1/workers", get(list_workers).post(upsert_worker))
        .route("/v1/workers/presence", post(presence))
        .route("/v1/dictionary", get(dictionary))
        .route("/v1/audit", get(audit_log))
        .route("/v1/config", get(show_config))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_audit_sinks(config: &Config, db_path: &Path) -> Result<Vec<Box<dyn AuditSink>>> {
    let mut sinks: Vec<Box<dyn AuditSink>> = Vec::new();
    if config.audit.enable_log {
        sinks.push(Box::new(LogSink));
    }
    if config.audit.persist {
        sinks.push(Box::new(StoreSink::new(TriageStore::open(db_path)?)));
    }
    if !config.audit.webhook.trim().is_empty() {
        sinks.push(Box::new(WebhookSink::new(config.audit.webhook.clone())?));
    }
    Ok(sinks)
}

pub fn build_resolver(config: &Config, audit: AuditHandle) -> Result<Resolver> {
    let gateway: Option<Arc<dyn ReasoningGateway>> = if config.gateway.is_configured() {
        Some(Arc::new(HttpReasoningGateway::new(
            config.gateway.endpoint.clone(),
            config.gateway.api_key_opt(),
            config.gateway.timeout(),
            config.gateway.connect_timeout(),
        )?))
    } else {
        None
    };
    let options = ResolverOptions {
        thresholds: config.thresholds(),
        escalation_candidates: config.classifier.escalation_candidates,
    };
    Ok(Resolver::new(
        Arc::new(builtin().clone()),
        gateway,
        options,
        audit,
    ))
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn dictionary() -> Json<ApiResponse<DictionarySummary>> {
    ok(builtin().summarize())
}

async fn classify(
    State(state): State<ApiState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<ResolvedClassification> {
    let policy = ResolvePolicy {
        force_escalation: request.force_escalation || state.config.classifier.force_escalation,
    };
    let decision = state.resolver.resolve(&request.text, &policy).await;
    Ok(ok(decision))
}

async fn assign(
    State(state): State<ApiState>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<AssignmentSummary> {
    if request.property_id.trim().is_empty() {
        return Err(ApiError::bad_request("property_id is required"));
    }
    if request.tickets.is_empty() {
        return Err(ApiError::bad_request("at least one ticket is required"));
    }
    let tickets = parse_tickets(&request.tickets)?;
    let store = open_store(&state)?;
    let summary =
        assign_property_batch(&store, &request.property_id, &tickets).map_err(ApiError::internal)?;
    Ok(ok(summary))
}

async fn list_workers(
    State(state): State<ApiState>,
    Query(query): Query<WorkersQuery>,
) -> ApiResult<RosterResponse> {
    if query.property.trim().is_empty() {
        return Err(ApiError::bad_request("property query parameter is required"));
    }
    let store = open_store(&state)?;
    let workers = store
        .list_workers(&query.property)
        .map_err(ApiError::internal)?;
    Ok(ok(RosterResponse { workers }))
}

async fn upsert_worker(
    State(state): State<ApiState>,
    Json(request): Json<UpsertWorkerRequest>,
) -> ApiResult<RosterResponse> {
    if request.worker_id.trim().is_empty() || request.property_id.trim().is_empty() {
        return Err(ApiError::bad_request("worker_id and property_id are required"));
    }
    let skills = parse_skills(&request.skills)?;
    let store = open_store(&state)?;
    for group in &skills {
        let entry = WorkerSkillEntry {
            worker_id: request.worker_id.clone(),
            property_id: request.property_id.clone(),
            skill_group: *group,
            is_available: request.is_available,
            is_checked_in: request.is_checked_in,
            last_assigned_at: None,
        };
        store.upsert_worker(&entry).map_err(ApiError::internal)?;
    }
    let workers = store
        .list_workers(&request.property_id)
        .map_err(ApiError::internal)?;
    Ok(ok(RosterResponse { workers }))
}

async fn presence(
    State(state): State<ApiState>,
    Json(request): Json<PresenceRequest>,
) -> ApiResult<PresenceResponse> {
    let store = open_store(&state)?;
    let rows_updated = store
        .set_presence(
            &request.worker_id,
            &request.property_id,
            request.checked_in,
            request.available,
        )
        .map_err(ApiError::internal)?;
    if rows_updated == 0 {
        return Err(ApiError::not_found(format!(
            "no roster rows for worker {} at property {}",
            request.worker_id, request.property_id
        )));
    }
    Ok(ok(PresenceResponse { rows_updated }))
}

async fn audit_log(
    State(state): State<ApiState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<AuditResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 500);
    let store = open_store(&state)?;
    let entries = store.recent_decisions(limit).map_err(ApiError::internal)?;
    Ok(ok(AuditResponse { entries }))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn default_true() -> bool {
    true
}

fn open_store(state: &ApiState) -> std::result::Result<TriageStore, ApiError> {
    TriageStore::open(&state.db_path).map_err(ApiError::internal)
}

fn parse_tickets(inputs: &[TicketInput]) -> std::result::Result<Vec<TicketRef>, ApiError> {
    let mut tickets = Vec::new();
    for input in inputs {
        let skill_group = SkillGroup::from_str(&input.skill_group)
            .map_err(|error| ApiError::bad_request(error.to_string()))?;
        tickets.push(TicketRef {
            ticket_id: input.ticket_id.clone(),
            skill_group,
        });
    }
    Ok(tickets)
}

fn parse_skills(raw: &[String]) -> std::result::Result<Vec<SkillGroup>, ApiError> {
    let mut parsed = Vec::new();
    for skill in raw {
        parsed.push(
            SkillGroup::from_str(skill).map_err(|error| ApiError::bad_request(error.to_string()))?,
        );
    }
    if parsed.is_empty() {
        return Err(ApiError::bad_request("at least one skill group is required"));
    }
    parsed.sort();
    parsed.dedup();
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::{parse_skills, parse_tickets, TicketInput};
    use crate::dictionary::SkillGroup;

    #[test]
    fn parses_ticket_skill_groups() {
        let tickets = parse_tickets(&[
            TicketInput {
                ticket_id: "T-1".to_string(),
                skill_group: "plumbing".to_string(),
            },
            TicketInput {
                ticket_id: "T-2".to_string(),
                skill_group: "tech".to_string(),
            },
        ])
        .expect("failed to parse tickets");
        assert_eq!(tickets[0].skill_group, SkillGroup::Plumbing);
        assert_eq!(tickets[1].skill_group, SkillGroup::Technical);
    }

    #[test]
    fn rejects_unknown_skill_group() {
        let result = parse_tickets(&[TicketInput {
            ticket_id: "T-1".to_string(),
            skill_group: "janitorial".to_string(),
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn dedupes_skill_list() {
        let skills = parse_skills(&[
            "plumbing".to_string(),
            "plumber".to_string(),
            "vendor".to_string(),
        ])
        .expect("failed to parse skills");
        assert_eq!(skills.len(), 2);
    }
}
