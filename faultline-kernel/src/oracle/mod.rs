/*!
 * ORACLE - Délégation IA pour les équipements sans règle de sûreté
 *
 * RÔLE :
 * Interroge un oracle externe (LLM) pour obtenir un jugement
 * {status, reason, impact_type} quand aucune règle déterministe ne tranche.
 *
 * FONCTIONNEMENT :
 * - Oracle trait = un seul appel `complete(prompt)`, implémenté par GeminiOracle
 *   en production et par des oracles scriptés dans le devkit
 * - AiDelegate = timeout par tentative + retries exponentiels sur les erreurs
 *   transitoires uniquement ; deadline / permanent / malformé => échec immédiat
 * - Toute entrée passe par le Sanitizer avant d'être mise dans le prompt
 *
 * L'appelant (HybridJudge) convertit tout échec en WARNING/UNKNOWN
 * "manual analysis required", jamais en erreur propagée.
 */

pub mod gemini;

use crate::config_store::ConfigStore;
use crate::models::{HealthStatus, ImpactType, SafetyJudgment};
use crate::sanitizer::Sanitizer;
use crate::topology::NetworkNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use gemini::GeminiOracle;

pub const CONFIG_EXCERPT_MAX_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    #[error("Permanent failure: {0}")]
    Permanent(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Oracle not configured: {0}")]
    NotConfigured(String),
}

impl OracleError {
    /// Seules ces classes justifient un nouvel essai
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::ServiceUnavailable(_) | OracleError::Transport(_))
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier_percent: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            max_backoff_ms: 8000,
            backoff_multiplier_percent: 200,
        }
    }
}

impl RetryPolicy {
    /// Attente après l'échec n° `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_backoff_ms;
        for _ in 1..attempt {
            delay = delay.saturating_mul(self.backoff_multiplier_percent as u64) / 100;
            if delay >= self.max_backoff_ms {
                break;
            }
        }
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

/// Gabarit avec variables `{nom}` obligatoires
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub template: &'static str,
    pub required: &'static [&'static str],
}

impl PromptTemplate {
    /// Une seule passe sur le gabarit : les valeurs insérées ne sont jamais relues
    pub fn render(&self, vars: &[(&str, String)]) -> Result<String, OracleError> {
        let lookup = |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.as_str());
        if let Some(missing) = self.required.iter().find(|name| lookup(name).is_none()) {
            return Err(OracleError::Permanent(format!("missing template variable: {}", missing)));
        }

        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let placeholder = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| self.required.contains(name));
            match placeholder.and_then(lookup) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[placeholder.map_or(0, str::len) + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

pub const JUDGMENT_TEMPLATE: PromptTemplate = PromptTemplate {
    template: r#"You are a network operations engineer assessing the health of one device.
No deterministic safety rule matched, so your estimate is needed.

Device:
- ID: {device_id}
- Type: {device_type}
- Layer: {layer}
- Redundancy group: {redundancy_group}
- Metadata: {metadata}

Active alarms:
{alarms}

Configuration excerpt:
{config}

Rules:
1. A single failure inside an HA pair or with spare PSU is WARNING, service continues
2. Loss of service is CRITICAL
3. If unsure, answer WARNING with impact_type UNKNOWN

Output Format (JSON only):
{"status": "NORMAL|WARNING|CRITICAL", "reason": "brief explanation", "impact_type": "NONE|DEGRADED|REDUNDANCY_LOST|OUTAGE|UNKNOWN"}
"#,
    required: &["device_id", "device_type", "layer", "redundancy_group", "metadata", "alarms", "config"],
};

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

fn str_field<'v>(value: &'v Value, key: &str) -> Result<&'v str, OracleError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::MalformedResponse(format!("missing string field '{}'", key)))
}

/// Valide les trois clés obligatoires ; un jugement IA n'est jamais définitif
pub fn parse_judgment(text: &str) -> Result<SafetyJudgment, OracleError> {
    let body = strip_code_fences(text);
    let value: Value =
        serde_json::from_str(body).map_err(|e| OracleError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    let raw_status = str_field(&value, "status")?;
    let status = HealthStatus::parse(raw_status)
        .ok_or_else(|| OracleError::MalformedResponse(format!("unknown status '{}'", raw_status)))?;
    let raw_impact = str_field(&value, "impact_type")?;
    let impact_type = ImpactType::parse(raw_impact)
        .ok_or_else(|| OracleError::MalformedResponse(format!("unknown impact_type '{}'", raw_impact)))?;
    let reason = str_field(&value, "reason")?.to_string();

    Ok(SafetyJudgment {
        status,
        impact_type,
        reason,
        is_definitive: false,
    })
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Oracle + politique d'appel ; construit une fois au démarrage
#[derive(Clone)]
pub struct AiDelegate {
    oracle: Arc<dyn Oracle>,
    sanitizer: Arc<dyn Sanitizer>,
    configs: Option<Arc<dyn ConfigStore>>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl AiDelegate {
    pub fn new(oracle: Arc<dyn Oracle>, sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self {
            oracle,
            sanitizer,
            configs: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_config_store(mut self, configs: Arc<dyn ConfigStore>) -> Self {
        self.configs = Some(configs);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub async fn build_prompt(&self, device: &NetworkNode, alarms: &[&str]) -> Result<String, OracleError> {
        let alarm_lines = alarms
            .iter()
            .map(|a| format!("- {}", self.sanitizer.sanitize(a)))
            .collect::<Vec<_>>()
            .join("\n");
        let config = match &self.configs {
            Some(store) => match store.read_config(&device.id).await {
                Some(text) => self.sanitizer.sanitize(truncate_chars(&text, CONFIG_EXCERPT_MAX_CHARS)),
                None => "(not found)".to_string(),
            },
            None => "(not available)".to_string(),
        };
        let metadata = serde_json::to_string(&device.metadata).unwrap_or_else(|_| "{}".to_string());

        JUDGMENT_TEMPLATE.render(&[
            ("device_id", device.id.clone()),
            ("device_type", device.node_type.to_string()),
            ("layer", device.layer.to_string()),
            ("redundancy_group", device.redundancy_group.clone().unwrap_or_else(|| "none".to_string())),
            ("metadata", self.sanitizer.sanitize(&metadata)),
            ("alarms", alarm_lines),
            ("config", config),
        ])
    }

    /// Timeout par tentative ; seul le transitoire est retenté
    pub async fn complete_with_retry(&self, prompt: &str) -> Result<String, OracleError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.oracle.complete(prompt)).await {
                Ok(inner) => inner,
                Err(_) => Err(OracleError::DeadlineExceeded(self.timeout)),
            };
            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let wait = self.retry.backoff_for(attempt);
                    warn!(
                        "[oracle] {} attempt {}/{} failed: {} (retry in {:?})",
                        self.oracle.name(),
                        attempt,
                        max_attempts,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn consult(&self, device: &NetworkNode, alarms: &[&str]) -> Result<SafetyJudgment, OracleError> {
        let prompt = self.build_prompt(device, alarms).await?;
        let text = self.complete_with_retry(&prompt).await?;
        let judgment = parse_judgment(&text)?;
        debug!("[oracle] {} -> {:?}/{:?}", device.id, judgment.status, judgment.impact_type);
        Ok(judgment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::DefaultSanitizer;
    use crate::topology::NodeType;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        replies: Mutex<Vec<Result<String, OracleError>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, OracleError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self { replies: Mutex::new(replies), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl Oracle for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());
            self.replies
                .lock()
                .pop()
                .unwrap_or_else(|| Err(OracleError::Permanent("script exhausted".into())))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, initial_backoff_ms: 1, max_backoff_ms: 2, backoff_multiplier_percent: 200 }
    }

    fn delegate(oracle: Arc<Scripted>) -> AiDelegate {
        AiDelegate::new(oracle, Arc::new(DefaultSanitizer)).with_retry(fast_retry())
    }

    fn device() -> NetworkNode {
        NetworkNode::new("CORE_SW", NodeType::Switch, 3).with_metadata("mgmt_ip", "203.0.113.9")
    }

    #[test]
    fn test_parse_judgment_accepts_fences_and_synonyms() {
        let j = parse_judgment("```json\n{\"status\": \"yellow\", \"reason\": \"flap\", \"impact_type\": \"degraded\"}\n```").unwrap();
        assert_eq!(j.status, HealthStatus::Warning);
        assert_eq!(j.impact_type, ImpactType::Degraded);
        assert!(!j.is_definitive);
    }

    #[test]
    fn test_parse_judgment_rejects_bad_shapes() {
        assert!(parse_judgment("not json").is_err());
        assert!(parse_judgment(r#"{"status": "WARNING", "reason": "x"}"#).is_err());
        assert!(parse_judgment(r#"{"status": "PURPLE", "reason": "x", "impact_type": "NONE"}"#).is_err());
        assert!(parse_judgment(r#"{"status": "NORMAL", "reason": "x", "impact_type": "MEH"}"#).is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_for(6), Duration::from_millis(8000));
    }

    #[test]
    fn test_template_requires_variables() {
        let t = PromptTemplate { template: "{a} and {b}", required: &["a", "b"] };
        assert_eq!(t.render(&[("a", "1".into()), ("b", "2".into())]).unwrap(), "1 and 2");
        assert!(t.render(&[("a", "1".into())]).is_err());
    }

    #[test]
    fn test_inserted_values_are_not_rendered_again() {
        let t = PromptTemplate { template: "{a} | {b} | {json}", required: &["a", "b"] };
        let out = t.render(&[("a", "msg {b} {".into()), ("b", "2".into())]).unwrap();
        assert_eq!(out, "msg {b} { | 2 | {json}");
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let oracle = Scripted::new(vec![
            Err(OracleError::ServiceUnavailable("503".into())),
            Ok(r#"{"status": "NORMAL", "reason": "ok", "impact_type": "NONE"}"#.into()),
        ]);
        let j = delegate(oracle.clone()).consult(&device(), &["BGP Flapping"]).await.unwrap();
        assert_eq!(j.status, HealthStatus::Normal);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let oracle = Scripted::new(vec![Err(OracleError::Permanent("400".into()))]);
        let err = delegate(oracle.clone()).consult(&device(), &["x"]).await.unwrap_err();
        assert_eq!(err, OracleError::Permanent("400".into()));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let oracle = Scripted::new((0..5).map(|_| Err(OracleError::Transport("reset".into()))).collect());
        let err = delegate(oracle.clone()).consult(&device(), &["x"]).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_prompt_is_sanitized() {
        let oracle = Scripted::new(vec![Ok(r#"{"status": "WARNING", "reason": "r", "impact_type": "UNKNOWN"}"#.into())]);
        delegate(oracle.clone())
            .consult(&device(), &["peer 198.51.100.4 down"])
            .await
            .unwrap();
        let prompts = oracle.prompts.lock();
        assert!(!prompts[0].contains("198.51.100.4"));
        assert!(!prompts[0].contains("203.0.113.9"));
        assert!(prompts[0].contains("CORE_SW"));
    }
}
