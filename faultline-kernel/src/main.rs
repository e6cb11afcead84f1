/*!
 * FAULTLINE KERNEL - Point d'entrée du serveur de diagnostic
 *
 * RÔLE : Bootstrap : config, topologie, oracle IA (construit une seule fois),
 * publication MQTT optionnelle, API HTTP.
 */

use anyhow::Context;
use faultline_kernel::config::{env_secret, load_config, KernelConfig, AI_KEY_ENV, HTTP_KEY_ENV};
use faultline_kernel::config_store::DirConfigStore;
use faultline_kernel::health::HealthTracker;
use faultline_kernel::http::{build_router, AppState};
use faultline_kernel::judge::HybridJudge;
use faultline_kernel::mqtt::MqttEventSink;
use faultline_kernel::oracle::{AiDelegate, GeminiOracle};
use faultline_kernel::sanitizer::DefaultSanitizer;
use faultline_kernel::service::Diagnoser;
use faultline_kernel::topology::Topology;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn build_judge(cfg: &KernelConfig) -> anyhow::Result<HybridJudge> {
    let api_key = env_secret(AI_KEY_ENV);
    if !cfg.ai.is_enabled(api_key.is_some()) {
        warn!("[kernel] AI delegation disabled (no {} or ai.enabled=false)", AI_KEY_ENV);
        return Ok(HybridJudge::rules_only());
    }
    let Some(api_key) = api_key else {
        return Ok(HybridJudge::rules_only());
    };

    let timeout = Duration::from_secs(cfg.ai.timeout_secs.max(1));
    let mut oracle = GeminiOracle::new(api_key)
        .context("building Gemini oracle")?
        .with_model(cfg.ai.model.clone())
        .with_temperature(cfg.ai.temperature)
        .with_request_timeout(timeout);
    if let Some(endpoint) = &cfg.ai.endpoint {
        oracle = oracle.with_endpoint(endpoint.clone());
    }

    let delegate = AiDelegate::new(Arc::new(oracle), Arc::new(DefaultSanitizer))
        .with_config_store(Arc::new(DirConfigStore::new(cfg.configs.dir.clone())))
        .with_retry(cfg.ai.retry.clone())
        .with_timeout(timeout);
    info!("[kernel] AI delegation enabled ({})", cfg.ai.model);
    Ok(HybridJudge::new(Some(delegate)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Ok si .env n'existe pas
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("faultline_kernel=info")),
        )
        .init();

    let cfg = load_config().await;

    let topology = Topology::load(&cfg.topology.path)
        .await
        .with_context(|| format!("loading topology from {}", cfg.topology.path.display()))?;
    info!("[kernel] topology loaded: {} nodes", topology.len());

    let health = HealthTracker::new();
    let judge = build_judge(&cfg)?;
    let mut diagnoser = Diagnoser::new(Arc::new(topology), judge).with_health(health.clone());
    if let Some(mqtt) = &cfg.mqtt {
        diagnoser = diagnoser.with_sink(Arc::new(MqttEventSink::spawn(mqtt, health.clone())));
    }

    let api_key = env_secret(HTTP_KEY_ENV);
    if api_key.is_none() {
        warn!("[kernel] {} not set - every route except /health will answer 401", HTTP_KEY_ENV);
    }
    let app = build_router(AppState::new(diagnoser, api_key));

    let listener = TcpListener::bind(cfg.http.bind.as_str())
        .await
        .with_context(|| format!("binding {}", cfg.http.bind))?;
    info!("[kernel] listening on http://{}", cfg.http.bind);
    axum::serve(listener, app).await.context("HTTP server stopped")?;
    Ok(())
}
