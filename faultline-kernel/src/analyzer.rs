/*!
 * ANALYZER - Point d'entrée synchrone de l'inférence de cause racine
 *
 * RÔLE : alarmes => candidats classés.
 * FONCTIONNEMENT :
 *   1. alarmes sur équipements inconnus écartées
 *   2. regroupement par équipement (ordre de première apparition)
 *   3. Signature Matcher par équipement
 *   4. Silent-Failure Detector (escalade / synthèse des parents)
 *   5. Ranker (fusion, tri stable, sentinelle)
 * Ne renvoie jamais d'erreur ni de liste vide. Lecture seule sur la
 * topologie : plusieurs analyses peuvent partager la même référence.
 */

use crate::models::{Alarm, Candidate, RawAlarm, Severity};
use crate::ranker;
use crate::signatures::SignatureMatcher;
use crate::silent::SilentFailureDetector;
use crate::topology::Topology;
use indexmap::IndexMap;
use tracing::{info, warn};

/// Validation à la frontière : id inconnu ou message vide => alarme écartée
pub fn validate_alarms(raw: Vec<RawAlarm>, topology: &Topology) -> Vec<Alarm> {
    let mut alarms = Vec::with_capacity(raw.len());
    for item in raw {
        let device_id = item.device_id.unwrap_or_default();
        let message = item.message.unwrap_or_default();
        if device_id.trim().is_empty() || !topology.contains(&device_id) {
            warn!("[analyzer] dropping alarm for unknown device '{}'", device_id);
            continue;
        }
        if message.trim().is_empty() {
            warn!("[analyzer] dropping alarm with empty message for {}", device_id);
            continue;
        }
        let severity = item
            .severity
            .as_deref()
            .map(Severity::parse_lenient)
            .unwrap_or(Severity::Warning);
        alarms.push(Alarm::new(device_id, message, severity));
    }
    alarms
}

#[derive(Debug, Clone)]
pub struct RootCauseAnalyzer<'t> {
    topology: &'t Topology,
    matcher: SignatureMatcher,
    silent: SilentFailureDetector,
}

impl<'t> RootCauseAnalyzer<'t> {
    pub fn new(topology: &'t Topology) -> Self {
        Self {
            topology,
            matcher: SignatureMatcher::default(),
            silent: SilentFailureDetector::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: SignatureMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn topology(&self) -> &'t Topology {
        self.topology
    }

    /// Alarmes regroupées par équipement connu, ordre de première apparition
    pub fn group_by_device<'a>(&self, alarms: &'a [Alarm]) -> IndexMap<&'a str, Vec<&'a Alarm>> {
        let mut grouped: IndexMap<&'a str, Vec<&'a Alarm>> = IndexMap::new();
        for alarm in alarms {
            if !self.topology.contains(&alarm.device_id) {
                warn!("[analyzer] alarm on unknown device {} excluded", alarm.device_id);
                continue;
            }
            grouped.entry(alarm.device_id.as_str()).or_default().push(alarm);
        }
        grouped
    }

    pub fn analyze(&self, alarms: &[Alarm]) -> Vec<Candidate> {
        let grouped = self.group_by_device(alarms);
        let known: Vec<Alarm> = grouped.values().flatten().map(|a| (*a).clone()).collect();

        let mut candidates: Vec<Candidate> = grouped
            .iter()
            .filter_map(|(device_id, device_alarms)| self.matcher.classify(device_id, device_alarms))
            .collect();
        self.silent.apply(&known, self.topology, &mut candidates);

        let ranked = ranker::rank(candidates);
        if let Some(top) = ranked.first() {
            info!(
                "[analyzer] {} alarms / {} devices -> {} candidates (top {} {:.2})",
                alarms.len(),
                grouped.len(),
                ranked.len(),
                top.id,
                top.probability
            );
        }
        ranked
    }
}

/// Raccourci sans état
pub fn analyze(alarms: &[Alarm], topology: &Topology) -> Vec<Candidate> {
    RootCauseAnalyzer::new(topology).analyze(alarms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topo() -> Topology {
        Topology::from_value(json!({
            "R1": {"type": "ROUTER", "layer": 1},
            "SW": {"type": "SWITCH", "layer": 4, "parent_id": "R1"},
            "AP1": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "SW"},
            "AP2": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "SW"},
            "AP3": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "SW"}
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_alarms_give_sentinel() {
        let t = topo();
        let ranked = analyze(&[], &t);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "System");
        assert_eq!(ranked[0].probability, 0.0);
    }

    #[test]
    fn test_unknown_devices_are_excluded() {
        let t = topo();
        let ranked = analyze(&[Alarm::critical("GHOST", "Interface Down")], &t);
        assert!(ranked[0].is_normal_state());
    }

    #[test]
    fn test_silent_parent_ranks_first() {
        let t = topo();
        let alarms = vec![
            Alarm::critical("AP1", "Connection Lost"),
            Alarm::critical("AP2", "Connection Lost"),
        ];
        let ranked = analyze(&alarms, &t);
        assert_eq!(ranked[0].id, "SW");
        assert_eq!(ranked[0].category, "Network/Silent");
        assert_eq!(ranked[0].probability, 0.98);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let t = topo();
        let alarms = vec![
            Alarm::warning("R1", "BGP Flapping"),
            Alarm::critical("AP3", "Connection Lost"),
            Alarm::critical("AP1", "Connection Lost"),
        ];
        assert_eq!(analyze(&alarms, &t), analyze(&alarms, &t));
    }

    #[test]
    fn test_validate_alarms_boundary() {
        let t = topo();
        let raw: Vec<RawAlarm> = serde_json::from_value(json!([
            {"device_id": "R1", "message": "Fan Fail", "severity": "major"},
            {"device_id": "NOPE", "message": "x"},
            {"device_id": "SW", "message": "  "},
            {"message": "orphan"},
            {"device_id": "AP1", "message": "Connection Lost", "severity": "critical"}
        ]))
        .unwrap();
        let alarms = validate_alarms(raw, &t);
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0].severity, Severity::Warning);
        assert_eq!(alarms[1].severity, Severity::Critical);
    }
}
