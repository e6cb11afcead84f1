/*!
 * SERVICE - Diagnostic complet : classement + verdicts + publication
 *
 * RÔLE :
 * Assemble l'inférence synchrone (RootCauseAnalyzer) et les verdicts
 * par équipement (HybridJudge, seule étape asynchrone) en un `Diagnosis`
 * horodaté, puis le publie vers l'EventSink configuré.
 *
 * La topologie est partagée en lecture seule (Arc) : plusieurs diagnostics
 * peuvent tourner en parallèle sans verrou.
 */

use crate::analyzer::RootCauseAnalyzer;
use crate::health::HealthTracker;
use crate::judge::HybridJudge;
use crate::models::{Alarm, Candidate, DeviceJudgment, JudgmentSource};
use crate::mqtt::EventSink;
use crate::state::RecentDiagnoses;
use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub analysis_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub alarm_count: usize,
    pub scope_health: ScopeHealth,
    pub candidates: Vec<Candidate>,
    pub judgments: Vec<DeviceJudgment>,
}

impl Diagnosis {
    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn fallback_count(&self) -> usize {
        self.judgments
            .iter()
            .filter(|j| j.source == JudgmentSource::OracleFallback)
            .count()
    }
}

/// Santé grossière d'un périmètre d'après le volume d'alarmes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeHealth {
    Good,
    Watch,
    Degraded,
    Down,
}

impl ScopeHealth {
    pub fn from_alarm_count(count: usize) -> Self {
        match count {
            0 => ScopeHealth::Good,
            1..=4 => ScopeHealth::Watch,
            5..=14 => ScopeHealth::Degraded,
            _ => ScopeHealth::Down,
        }
    }
}

#[derive(Clone)]
pub struct Diagnoser {
    topology: Arc<Topology>,
    judge: HybridJudge,
    sink: Option<Arc<dyn EventSink>>,
    health: HealthTracker,
    recent: RecentDiagnoses,
}

impl Diagnoser {
    pub fn new(topology: Arc<Topology>, judge: HybridJudge) -> Self {
        Self {
            topology,
            judge,
            sink: None,
            health: HealthTracker::new(),
            recent: RecentDiagnoses::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_health(mut self, health: HealthTracker) -> Self {
        self.health = health;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn recent(&self) -> &RecentDiagnoses {
        &self.recent
    }

    pub fn ai_enabled(&self) -> bool {
        self.judge.has_delegate()
    }

    /// Classement seul, sans IA ni publication
    pub fn analyze(&self, alarms: &[Alarm]) -> Vec<Candidate> {
        self.health.record_analysis();
        RootCauseAnalyzer::new(&self.topology).analyze(alarms)
    }

    pub async fn diagnose(&self, alarms: &[Alarm]) -> Diagnosis {
        let candidates = RootCauseAnalyzer::new(&self.topology).analyze(alarms);
        let judgments = self.judge.judge_batch(&self.topology, alarms).await;

        let diagnosis = Diagnosis {
            analysis_id: Uuid::new_v4(),
            generated_at: OffsetDateTime::now_utc(),
            alarm_count: alarms.len(),
            scope_health: ScopeHealth::from_alarm_count(alarms.len()),
            candidates,
            judgments,
        };

        self.health.record_analysis();
        self.health.record_ai_fallbacks(diagnosis.fallback_count() as u64);
        if let Some(top) = diagnosis.top_candidate() {
            info!(
                "[service] diagnosis {} : top {} ({}, {:.2}), {} judgments",
                diagnosis.analysis_id,
                top.id,
                top.category,
                top.probability,
                diagnosis.judgments.len()
            );
        }
        if let Some(sink) = &self.sink {
            sink.publish(&diagnosis);
        }
        self.recent.push(diagnosis.clone());
        diagnosis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diagnoser() -> Diagnoser {
        let topology = Topology::from_value(json!({
            "R1": {"type": "ROUTER", "layer": 1},
            "SW": {"type": "SWITCH", "layer": 3, "parent_id": "R1"}
        }))
        .unwrap();
        Diagnoser::new(Arc::new(topology), HybridJudge::rules_only())
    }

    #[test]
    fn test_scope_health_thresholds() {
        assert_eq!(ScopeHealth::from_alarm_count(0), ScopeHealth::Good);
        assert_eq!(ScopeHealth::from_alarm_count(4), ScopeHealth::Watch);
        assert_eq!(ScopeHealth::from_alarm_count(5), ScopeHealth::Degraded);
        assert_eq!(ScopeHealth::from_alarm_count(15), ScopeHealth::Down);
    }

    #[tokio::test]
    async fn test_diagnose_builds_full_report() {
        let d = diagnoser();
        let report = d.diagnose(&[Alarm::warning("R1", "Fan Fail")]).await;
        assert_eq!(report.candidates[0].id, "R1");
        assert_eq!(report.judgments.len(), 1);
        assert_eq!(report.judgments[0].source, JudgmentSource::SafetyRule);
        assert_eq!(d.health().analyses_run(), 1);
        assert_eq!(d.recent().latest().map(|r| r.analysis_id), Some(report.analysis_id));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["generated_at"].as_str().unwrap().contains('T'));
        assert_eq!(json["scope_health"], "WATCH");
        assert_eq!(json["judgments"][0]["source"], "SAFETY_RULE");
    }

    #[tokio::test]
    async fn test_empty_batch_is_nominal() {
        let report = diagnoser().diagnose(&[]).await;
        assert!(report.candidates[0].is_normal_state());
        assert!(report.judgments.is_empty());
        assert_eq!(report.scope_health, ScopeHealth::Good);
    }
}
