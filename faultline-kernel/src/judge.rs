/*!
 * HYBRID JUDGE - Verdict de santé par équipement
 *
 * 1. Safety Rule Engine (déterministe, prioritaire)
 * 2. délégation IA si configurée ; échec => WARNING/UNKNOWN "manual analysis required"
 * 3. sinon défaut non définitif "Insufficient information..."
 *
 * Les entrées PSU / HA viennent de la topologie : psu_count des métadonnées,
 * membres HA en panne = membres du groupe ayant au moins une alarme du lot.
 */

use crate::models::{Alarm, DeviceJudgment, JudgmentSource, SafetyJudgment};
use crate::oracle::AiDelegate;
use crate::safety::{RedundancyState, SafetyContext, SafetyRuleEngine};
use crate::topology::{NetworkNode, Topology};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Consultations IA simultanées par lot
pub const DEFAULT_ORACLE_CONCURRENCY: usize = 4;

/// Contexte de sûreté d'un équipement au vu du lot d'alarmes complet
pub fn safety_context(topology: &Topology, device: &NetworkNode, batch: &[Alarm]) -> SafetyContext {
    let redundancy = device.redundancy_group.as_deref().map(|group| {
        let alarmed: HashSet<&str> = batch.iter().map(|a| a.device_id.as_str()).collect();
        let members = topology.redundancy_group_members(group);
        RedundancyState {
            group: group.to_string(),
            total_members: members.len(),
            failed_members: members.iter().filter(|m| alarmed.contains(m.id.as_str())).count(),
        }
    });
    SafetyContext {
        psu_count: device.psu_count(),
        redundancy,
    }
}

#[derive(Clone)]
pub struct HybridJudge {
    rules: SafetyRuleEngine,
    delegate: Option<AiDelegate>,
    concurrency: usize,
}

impl Default for HybridJudge {
    fn default() -> Self {
        Self::rules_only()
    }
}

impl HybridJudge {
    pub fn new(delegate: Option<AiDelegate>) -> Self {
        Self {
            rules: SafetyRuleEngine::new(),
            delegate,
            concurrency: DEFAULT_ORACLE_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn rules_only() -> Self {
        Self::new(None)
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    pub async fn decide(&self, device: &NetworkNode, alarms: &[&str], ctx: &SafetyContext) -> DeviceJudgment {
        if let Some(judgment) = self.rules.evaluate(alarms, ctx) {
            debug!("[judge] {} safety rule: {}", device.id, judgment.reason);
            return DeviceJudgment {
                device_id: device.id.clone(),
                source: JudgmentSource::SafetyRule,
                judgment,
            };
        }

        let Some(delegate) = &self.delegate else {
            return DeviceJudgment {
                device_id: device.id.clone(),
                source: JudgmentSource::Default,
                judgment: SafetyJudgment::insufficient_information(),
            };
        };

        match delegate.consult(device, alarms).await {
            Ok(judgment) => DeviceJudgment {
                device_id: device.id.clone(),
                source: JudgmentSource::Oracle,
                judgment,
            },
            Err(e) => {
                warn!("[judge] {} oracle {} failed: {} (manual analysis required)", device.id, delegate.oracle_name(), e);
                DeviceJudgment {
                    device_id: device.id.clone(),
                    source: JudgmentSource::OracleFallback,
                    judgment: SafetyJudgment::manual_analysis_required(),
                }
            }
        }
    }

    /// Un verdict par équipement connu et alarmé, ordre de première apparition
    pub async fn judge_batch(&self, topology: &Topology, batch: &[Alarm]) -> Vec<DeviceJudgment> {
        let mut by_device: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for alarm in batch {
            if topology.contains(&alarm.device_id) {
                by_device.entry(alarm.device_id.as_str()).or_default().push(alarm.message.as_str());
            }
        }

        let work: Vec<(&NetworkNode, Vec<&str>, SafetyContext)> = by_device
            .into_iter()
            .filter_map(|(device_id, messages)| {
                let device = topology.get(device_id)?;
                Some((device, messages, safety_context(topology, device, batch)))
            })
            .collect();

        // buffered : au plus `concurrency` oracles en vol, ordre d'entrée conservé
        // futures paresseux construits d'avance (évite l'erreur de lifetime HRTB de axum::Handler)
        let pending: Vec<_> = work.iter().map(|(device, messages, ctx)| self.decide(device, messages, ctx)).collect();
        stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthStatus, ImpactType};
    use crate::oracle::{Oracle, OracleError, RetryPolicy};
    use crate::sanitizer::DefaultSanitizer;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Down;

    #[async_trait]
    impl Oracle for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            Err(OracleError::ServiceUnavailable("503".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Oracle for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".into())
        }
    }

    #[derive(Default)]
    struct Tracking {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Oracle for Tracking {
        fn name(&self) -> &str {
            "tracking"
        }
        async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"{"status": "WARNING", "impact_type": "DEGRADED", "reason": "ok"}"#.into())
        }
    }

    fn topo() -> Topology {
        Topology::from_value(json!({
            "R1": {"type": "ROUTER", "layer": 1, "metadata": {"psu_count": 2}},
            "FW_A": {"type": "FIREWALL", "layer": 2, "parent_id": "R1", "redundancy_group": "FW_HA"},
            "FW_B": {"type": "FIREWALL", "layer": 2, "parent_id": "R1", "redundancy_group": "FW_HA"}
        }))
        .unwrap()
    }

    fn delegate(oracle: Arc<dyn Oracle>) -> AiDelegate {
        AiDelegate::new(oracle, Arc::new(DefaultSanitizer))
            .with_retry(RetryPolicy { max_attempts: 2, initial_backoff_ms: 1, max_backoff_ms: 1, backoff_multiplier_percent: 100 })
            .with_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_context_from_topology() {
        let t = topo();
        let batch = vec![Alarm::warning("FW_A", "Heartbeat Loss")];
        let ctx = safety_context(&t, t.get("FW_A").unwrap(), &batch);
        let ha = ctx.redundancy.unwrap();
        assert_eq!((ha.total_members, ha.failed_members), (2, 1));
        assert_eq!(safety_context(&t, t.get("R1").unwrap(), &batch).psu_count, 2);
    }

    #[tokio::test]
    async fn test_rules_win_over_oracle() {
        let t = topo();
        let judge = HybridJudge::new(Some(delegate(Arc::new(Down))));
        let batch = vec![Alarm::warning("R1", "Power Supply 1 Failed")];
        let out = judge.judge_batch(&t, &batch).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, JudgmentSource::SafetyRule);
        assert_eq!(out[0].judgment.impact_type, ImpactType::RedundancyLost);
    }

    #[tokio::test]
    async fn test_ha_partial_failure_is_warning() {
        let t = topo();
        let batch = vec![Alarm::warning("FW_A", "Heartbeat Loss")];
        let out = HybridJudge::rules_only().judge_batch(&t, &batch).await;
        assert_eq!(out[0].judgment.status, HealthStatus::Warning);
        assert_eq!(out[0].judgment.impact_type, ImpactType::RedundancyLost);
    }

    #[tokio::test]
    async fn test_unreachable_oracle_falls_back() {
        let t = topo();
        let judge = HybridJudge::new(Some(delegate(Arc::new(Down))));
        let out = judge.judge_batch(&t, &[Alarm::warning("R1", "BGP Flapping")]).await;
        assert_eq!(out[0].source, JudgmentSource::OracleFallback);
        assert_eq!(out[0].judgment, SafetyJudgment::manual_analysis_required());
        assert!(!out[0].judgment.is_definitive);
    }

    #[tokio::test]
    async fn test_slow_oracle_hits_deadline() {
        let t = topo();
        let judge = HybridJudge::new(Some(delegate(Arc::new(Slow))));
        let started = std::time::Instant::now();
        let out = judge.judge_batch(&t, &[Alarm::warning("R1", "BGP Flapping")]).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(out[0].judgment.impact_type, ImpactType::Unknown);
    }

    #[tokio::test]
    async fn test_no_delegate_gives_default() {
        let t = topo();
        let out = HybridJudge::rules_only().judge_batch(&t, &[Alarm::warning("R1", "BGP Flapping")]).await;
        assert_eq!(out[0].source, JudgmentSource::Default);
        assert_eq!(out[0].judgment, SafetyJudgment::insufficient_information());
    }

    #[tokio::test]
    async fn test_oracle_consultations_are_bounded_and_ordered() {
        let ids: Vec<String> = (1..=6).map(|i| format!("SW_{}", i)).collect();
        let mut nodes = serde_json::Map::new();
        for id in &ids {
            nodes.insert(id.clone(), json!({"type": "SWITCH", "layer": 4}));
        }
        let t = Topology::from_value(serde_json::Value::Object(nodes)).unwrap();
        let oracle = Arc::new(Tracking::default());
        let delegate = AiDelegate::new(oracle.clone(), Arc::new(DefaultSanitizer)).with_timeout(Duration::from_secs(2));
        let judge = HybridJudge::new(Some(delegate)).with_concurrency(3);

        let batch: Vec<Alarm> = ids.iter().rev().map(|id| Alarm::warning(id.as_str(), "BGP Flapping")).collect();
        let out = judge.judge_batch(&t, &batch).await;

        let order: Vec<&str> = out.iter().map(|j| j.device_id.as_str()).collect();
        let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
        assert_eq!(order, expected);
        assert!(out.iter().all(|j| j.source == JudgmentSource::Oracle));
        let peak = oracle.peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= 3, "peak {}", peak);
    }
}
