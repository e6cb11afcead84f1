/*!
 * API REST FAULTLINE - Surface HTTP du moteur de diagnostic
 *
 * RÔLE :
 * Expose topologie, scénarios et analyse de cause racine aux outils
 * d'exploitation (dashboard, CLI, scripts de supervision).
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, middleware x-api-key sur toutes les routes sauf /health
 * - /analyze = classement seul (synchrone), /diagnose = classement + verdicts
 *   (IA comprise), /simulate = scénario => alarmes => diagnostic
 * - Alarmes validées à la frontière (équipement inconnu / message vide écartés)
 *
 * SÉCURITÉ :
 * - FAULTLINE_API_KEY absente => toute route protégée répond 401
 */

use crate::analyzer::validate_alarms;
use crate::health::KernelHealth;
use crate::models::{Alarm, Candidate, RawAlarm};
use crate::scenarios::ScenarioCatalog;
use crate::service::{Diagnoser, Diagnosis};
use crate::topology::{NetworkNode, TopologySummary};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub diagnoser: Diagnoser,
    pub catalog: Arc<ScenarioCatalog>,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(diagnoser: Diagnoser, api_key: Option<String>) -> Self {
        Self {
            diagnoser,
            catalog: Arc::new(ScenarioCatalog::default()),
            api_key: api_key.map(Arc::from),
        }
    }
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        warn!("[http] FAULTLINE_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("[http] rejected request to {} (bad api key)", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/topology", get(get_topology))
        .route("/topology/{id}", get(get_node))
        .route("/scenarios", get(list_scenarios))
        .route("/alarms/generate", post(generate_alarms))
        .route("/analyze", post(analyze))
        .route("/diagnose", post(diagnose))
        .route("/simulate", post(simulate))
        .route("/diagnoses/recent", get(recent_diagnoses))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

#[derive(Debug, Deserialize)]
struct ScenarioRequest {
    scenario: String,
}

#[derive(Debug, Deserialize)]
struct AlarmBatch {
    #[serde(default)]
    alarms: Vec<RawAlarm>,
}

#[derive(Serialize)]
struct TopologyView<'a> {
    summary: TopologySummary,
    nodes: Vec<&'a NetworkNode>,
}

#[derive(Serialize)]
struct NodeView {
    #[serde(flatten)]
    node: NetworkNode,
    children: Vec<String>,
    ancestors: Vec<String>,
    redundancy_peers: Vec<String>,
}

#[derive(Serialize)]
struct SimulationView {
    scenario: String,
    alarms: Vec<Alarm>,
    diagnosis: Diagnosis,
}

async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    let d = &app.diagnoser;
    Json(d.health().get_health(d.topology().len(), d.ai_enabled()))
}

async fn get_topology(State(app): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let topology = app.diagnoser.topology();
    let view = TopologyView {
        summary: topology.summary(),
        nodes: topology.iter().collect(),
    };
    serde_json::to_value(view).map(Json).map_err(|e| {
        warn!("[http] cannot serialize topology: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn get_node(State(app): State<AppState>, Path(id): Path<String>) -> Result<Json<NodeView>, StatusCode> {
    let topology = app.diagnoser.topology();
    let node = topology.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let ids = |nodes: Vec<&NetworkNode>| nodes.into_iter().map(|n| n.id.clone()).collect::<Vec<_>>();
    Ok(Json(NodeView {
        node: node.clone(),
        children: ids(topology.children_of(&id)),
        ancestors: ids(topology.ancestors_of(&id)),
        redundancy_peers: ids(topology.redundancy_peers_of(&id)),
    }))
}

async fn list_scenarios() -> Json<Vec<String>> {
    Json(ScenarioCatalog::labels())
}

async fn generate_alarms(State(app): State<AppState>, Json(req): Json<ScenarioRequest>) -> Json<Vec<Alarm>> {
    Json(app.catalog.generate(app.diagnoser.topology(), &req.scenario))
}

async fn analyze(State(app): State<AppState>, Json(batch): Json<AlarmBatch>) -> Json<Vec<Candidate>> {
    let alarms = validate_alarms(batch.alarms, app.diagnoser.topology());
    Json(app.diagnoser.analyze(&alarms))
}

async fn diagnose(State(app): State<AppState>, Json(batch): Json<AlarmBatch>) -> Json<Diagnosis> {
    let alarms = validate_alarms(batch.alarms, app.diagnoser.topology());
    Json(app.diagnoser.diagnose(&alarms).await)
}

async fn simulate(State(app): State<AppState>, Json(req): Json<ScenarioRequest>) -> Json<SimulationView> {
    let alarms = app.catalog.generate(app.diagnoser.topology(), &req.scenario);
    let diagnosis = app.diagnoser.diagnose(&alarms).await;
    Json(SimulationView {
        scenario: req.scenario,
        alarms,
        diagnosis,
    })
}

async fn recent_diagnoses(State(app): State<AppState>) -> Json<Vec<Diagnosis>> {
    Json(app.diagnoser.recent().snapshot())
}
