/*!
 * SILENT FAILURE - Inférence d'une panne parent muette depuis ses enfants
 *
 * Pour chaque alarme d'injoignabilité ("connection lost", "interface down"),
 * on remonte au parent et on compte les enfants tombés. Au-delà du seuil :
 * - parent déjà candidat => probabilité 1.0 + marqueur dans le libellé
 * - parent sans candidat => nouveau candidat Network/Silent à 0.98
 * Le seuil de 2 sépare une déconnexion isolée d'une panne amont.
 */

use crate::models::{Alarm, Candidate};
use crate::topology::Topology;
use indexmap::{IndexMap, IndexSet};
use tracing::info;

pub const SILENT_FAILURE_THRESHOLD: usize = 2;
pub const SILENT_FAILURE_PROBABILITY: f64 = 0.98;
pub const SILENT_CATEGORY: &str = "Network/Silent";
pub const CASCADING_CHILDREN_MARKER: &str = " (cascading children lost)";

const UNREACHABILITY_MARKERS: &[&str] = &["connection lost", "interface down"];

pub fn is_unreachability(message: &str) -> bool {
    let lower = message.to_lowercase();
    UNREACHABILITY_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Debug, Clone)]
pub struct SilentFailureDetector {
    threshold: usize,
}

impl Default for SilentFailureDetector {
    fn default() -> Self {
        Self { threshold: SILENT_FAILURE_THRESHOLD }
    }
}

impl SilentFailureDetector {
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// parent_id -> enfants distincts injoignables, dans l'ordre de découverte
    pub fn down_children<'t>(&self, alarms: &[Alarm], topology: &'t Topology) -> IndexMap<&'t str, IndexSet<&'t str>> {
        let mut counts: IndexMap<&'t str, IndexSet<&'t str>> = IndexMap::new();
        for alarm in alarms.iter().filter(|a| is_unreachability(&a.message)) {
            let Some(child) = topology.get(&alarm.device_id) else { continue };
            let Some(parent) = topology.parent_of(&child.id) else { continue };
            counts.entry(parent.id.as_str()).or_default().insert(child.id.as_str());
        }
        counts
    }

    /// Escalade ou synthèse des candidats parents ; modifie la liste en place
    pub fn apply(&self, alarms: &[Alarm], topology: &Topology, candidates: &mut Vec<Candidate>) {
        for (parent_id, children) in self.down_children(alarms, topology) {
            let count = children.len();
            if count < self.threshold {
                continue;
            }
            let impact = format!("Downstream impact: {} devices lost", count);
            if let Some(existing) = candidates.iter_mut().find(|c| c.id == parent_id) {
                existing.probability = 1.0;
                existing.label.push_str(CASCADING_CHILDREN_MARKER);
                existing.evidence.push(impact);
                info!("[silent] escalated {} ({} children down)", parent_id, count);
            } else {
                candidates.push(Candidate {
                    id: parent_id.to_string(),
                    category: SILENT_CATEGORY.to_string(),
                    label: "Silent failure (downstream devices lost)".to_string(),
                    probability: SILENT_FAILURE_PROBABILITY,
                    reason: format!(
                        "no alarm on {} but {} children unreachable: {}",
                        parent_id,
                        count,
                        children.iter().copied().collect::<Vec<_>>().join(", ")
                    ),
                    evidence: vec![impact],
                });
                info!("[silent] inferred silent failure on {} ({} children down)", parent_id, count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topo() -> Topology {
        Topology::from_value(json!({
            "SW": {"type": "SWITCH", "layer": 4},
            "AP1": {"type": "ACCESS_POINT", "parent_id": "SW"},
            "AP2": {"type": "ACCESS_POINT", "parent_id": "SW"},
            "AP3": {"type": "ACCESS_POINT", "parent_id": "SW"}
        }))
        .unwrap()
    }

    #[test]
    fn test_two_children_synthesize_parent() {
        let alarms = vec![Alarm::critical("AP1", "Connection Lost"), Alarm::critical("AP2", "Connection Lost")];
        let mut candidates = Vec::new();
        SilentFailureDetector::default().apply(&alarms, &topo(), &mut candidates);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "SW");
        assert_eq!(candidates[0].category, SILENT_CATEGORY);
        assert_eq!(candidates[0].probability, SILENT_FAILURE_PROBABILITY);
        assert_eq!(candidates[0].evidence, vec!["Downstream impact: 2 devices lost".to_string()]);
    }

    #[test]
    fn test_single_child_is_isolated() {
        let alarms = vec![Alarm::critical("AP1", "Connection Lost")];
        let mut candidates = Vec::new();
        SilentFailureDetector::default().apply(&alarms, &topo(), &mut candidates);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_repeated_alarms_from_one_child_count_once() {
        let alarms = vec![Alarm::critical("AP1", "Connection Lost"), Alarm::critical("AP1", "Interface Down")];
        let topology = topo();
        let counts = SilentFailureDetector::default().down_children(&alarms, &topology);
        assert_eq!(counts.get("SW").map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_existing_parent_is_escalated() {
        let alarms = vec![
            Alarm::warning("SW", "Fan Fail"),
            Alarm::critical("AP1", "Connection Lost"),
            Alarm::critical("AP3", "connection lost"),
        ];
        let mut candidates = vec![Candidate {
            id: "SW".into(),
            category: "Hardware/Fan".into(),
            label: "Cooling fan failure".into(),
            probability: 0.72,
            reason: String::new(),
            evidence: vec!["Fan Fail".into()],
        }];
        SilentFailureDetector::default().apply(&alarms, &topo(), &mut candidates);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].probability, 1.0);
        assert!(candidates[0].label.ends_with(CASCADING_CHILDREN_MARKER));
    }

    #[test]
    fn test_unreachable_message_is_not_counted() {
        let alarms = vec![Alarm::warning("AP1", "Unreachable"), Alarm::warning("AP2", "Unreachable")];
        let mut candidates = Vec::new();
        SilentFailureDetector::default().apply(&alarms, &topo(), &mut candidates);
        assert!(candidates.is_empty());
    }
}
