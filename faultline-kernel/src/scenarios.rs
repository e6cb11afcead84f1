/*!
 * SCENARIOS - Libellé de scénario => alarmes synthétiques
 *
 * RÔLE : Table déclarative (clés => cible + gabarit d'alarme), résolue par
 * une seule fonction de dispatch. Fonction pure de la topologie et du
 * libellé ; première règle qui matche gagne.
 *
 * FONCTIONNEMENT :
 * - règles globales (skip, WAN全回線断, FW片系障害, L2SWサイレント障害...)
 * - sinon libellé ciblé "[WAN]/[FW]/[L2SW] <type de panne>"
 * - rien ne matche ou cible absente => aucune alarme
 *
 * Cible = premier nœud trouvé dans l'ordre du document (find_first),
 * pas le "meilleur" candidat.
 */

use crate::cascade::{simulate_cascade, DEFAULT_ROOT_MESSAGE};
use crate::models::{Alarm, Severity};
use crate::topology::{NodeQuery, NodeType, Topology};
use tracing::debug;

pub const DUAL_POWER_LOSS_MESSAGE: &str = "Power Supply: Dual Loss (Device Down)";
pub const SILENT_CHILDREN_LIMIT: usize = 4;

/// Requêtes essayées dans l'ordre ; la première qui trouve un nœud gagne
#[derive(Debug, Clone)]
pub struct TargetSelector(pub Vec<NodeQuery>);

impl TargetSelector {
    pub fn first_of(node_type: NodeType) -> Self {
        Self(vec![NodeQuery::any().of_type(node_type)])
    }

    pub fn resolve<'t>(&self, topology: &'t Topology) -> Option<&'t str> {
        self.0.iter().find_map(|q| topology.find_first(q))
    }
}

#[derive(Debug, Clone)]
pub enum ScenarioAction {
    /// Libellé neutre (normal, live, séparateur)
    Skip,
    /// Panne totale propagée aux descendants
    Cascade { target: TargetSelector, message: &'static str },
    /// Alarmes fixes sur une seule cible
    Fixed { target: TargetSelector, alarms: Vec<(&'static str, Severity)> },
    /// Enfants directs (sinon APs) injoignables, parent muet
    SilentChildren { target: TargetSelector },
    /// Une alarme par cible trouvée, cibles indépendantes
    Scatter(Vec<(TargetSelector, &'static str, Severity)>),
}

#[derive(Debug, Clone)]
pub struct ScenarioRule {
    pub keys: &'static [&'static str],
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Alarm(&'static str, Severity),
    /// Pare-feu => alarme unique ; sinon cascade
    DualPowerLoss,
}

#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    rules: Vec<ScenarioRule>,
    scopes: Vec<(&'static str, TargetSelector)>,
    faults: Vec<(&'static str, FaultKind)>,
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        let l2_target = TargetSelector(vec![
            NodeQuery::any().of_type(NodeType::Switch).on_layer(4).with_keyword("L2"),
            NodeQuery::any().with_keyword("L2_SW"),
            NodeQuery::any().of_type(NodeType::Switch),
        ]);
        let rules = vec![
            ScenarioRule { keys: &["---", "正常", "Live", "[Live]"], action: ScenarioAction::Skip },
            ScenarioRule {
                keys: &["WAN全回線断"],
                action: ScenarioAction::Cascade {
                    target: TargetSelector::first_of(NodeType::Router),
                    message: DEFAULT_ROOT_MESSAGE,
                },
            },
            ScenarioRule {
                keys: &["FW片系障害"],
                action: ScenarioAction::Fixed {
                    target: TargetSelector::first_of(NodeType::Firewall),
                    alarms: vec![("Heartbeat Loss", Severity::Warning)],
                },
            },
            ScenarioRule { keys: &["L2SWサイレント障害"], action: ScenarioAction::SilentChildren { target: l2_target } },
            ScenarioRule {
                keys: &["複合障害"],
                action: ScenarioAction::Fixed {
                    target: TargetSelector::first_of(NodeType::Router),
                    alarms: vec![("Power Supply 1 Failed", Severity::Critical), ("Fan Fail", Severity::Warning)],
                },
            },
            ScenarioRule {
                keys: &["同時多発"],
                action: ScenarioAction::Scatter(vec![
                    (TargetSelector::first_of(NodeType::Firewall), "Heartbeat Loss", Severity::Warning),
                    (TargetSelector::first_of(NodeType::AccessPoint), "Connection Lost", Severity::Critical),
                ]),
            },
        ];
        let scopes = vec![
            ("[WAN]", TargetSelector::first_of(NodeType::Router)),
            ("[FW]", TargetSelector::first_of(NodeType::Firewall)),
            ("[L2SW]", TargetSelector(vec![NodeQuery::any().of_type(NodeType::Switch).on_layer(4)])),
        ];
        let faults = vec![
            ("電源障害：片系", FaultKind::Alarm("Power Supply 1 Failed", Severity::Warning)),
            ("電源障害：両系", FaultKind::DualPowerLoss),
            ("BGP", FaultKind::Alarm("BGP Flapping", Severity::Warning)),
            ("FAN", FaultKind::Alarm("Fan Fail", Severity::Warning)),
            ("メモリ", FaultKind::Alarm("Memory High", Severity::Warning)),
        ];
        Self { rules, scopes, faults }
    }
}

impl ScenarioCatalog {
    /// Libellés canoniques exposés par GET /scenarios
    pub fn labels() -> Vec<String> {
        let mut labels: Vec<String> = [
            "正常稼働",
            "WAN全回線断",
            "FW片系障害",
            "L2SWサイレント障害",
            "複合障害：電源＆FAN",
            "同時多発：FW & AP",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for scope in ["[WAN]", "[FW]", "[L2SW]"] {
            for fault in ["電源障害：片系", "電源障害：両系", "BGPルートフラッピング", "FAN故障", "メモリリーク"] {
                labels.push(format!("{} {}", scope, fault));
            }
        }
        labels
    }

    pub fn generate(&self, topology: &Topology, label: &str) -> Vec<Alarm> {
        if let Some(rule) = self.rules.iter().find(|r| r.keys.iter().any(|k| label.contains(k))) {
            debug!("[scenarios] '{}' -> rule {:?}", label, rule.keys);
            return run_action(&rule.action, topology);
        }
        self.generate_scoped(topology, label)
    }

    fn generate_scoped(&self, topology: &Topology, label: &str) -> Vec<Alarm> {
        let Some((_, selector)) = self.scopes.iter().find(|(scope, _)| label.contains(scope)) else {
            return Vec::new();
        };
        let Some(target) = selector.resolve(topology) else {
            return Vec::new();
        };
        match self.faults.iter().find(|(key, _)| label.contains(key)) {
            Some((_, FaultKind::Alarm(message, severity))) => vec![Alarm::new(target, *message, *severity)],
            Some((_, FaultKind::DualPowerLoss)) if target.contains("FW") => {
                vec![Alarm::critical(target, DUAL_POWER_LOSS_MESSAGE)]
            }
            Some((_, FaultKind::DualPowerLoss)) => simulate_cascade(target, topology, DUAL_POWER_LOSS_MESSAGE),
            None => Vec::new(),
        }
    }
}

fn run_action(action: &ScenarioAction, topology: &Topology) -> Vec<Alarm> {
    match action {
        ScenarioAction::Skip => Vec::new(),
        ScenarioAction::Cascade { target, message } => target
            .resolve(topology)
            .map(|root| simulate_cascade(root, topology, message))
            .unwrap_or_default(),
        ScenarioAction::Fixed { target, alarms } => match target.resolve(topology) {
            Some(id) => alarms.iter().map(|(msg, sev)| Alarm::new(id, *msg, *sev)).collect(),
            None => Vec::new(),
        },
        ScenarioAction::SilentChildren { target } => {
            let Some(id) = target.resolve(topology) else {
                return Vec::new();
            };
            let mut lost: Vec<&str> = topology.children_of(id).into_iter().map(|n| n.id.as_str()).collect();
            if lost.is_empty() {
                lost = topology
                    .iter()
                    .filter(|n| n.node_type == NodeType::AccessPoint)
                    .map(|n| n.id.as_str())
                    .collect();
            }
            if lost.is_empty() {
                return vec![Alarm::warning(id, "Silent Degradation Suspected")];
            }
            lost.into_iter()
                .take(SILENT_CHILDREN_LIMIT)
                .map(|child| Alarm::critical(child, "Connection Lost"))
                .collect()
        }
        ScenarioAction::Scatter(items) => items
            .iter()
            .filter_map(|(target, msg, sev)| target.resolve(topology).map(|id| Alarm::new(id, *msg, *sev)))
            .collect(),
    }
}

/// Raccourci sur le catalogue intégré
pub fn generate_alarms(topology: &Topology, label: &str) -> Vec<Alarm> {
    ScenarioCatalog::default().generate(topology, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topo() -> Topology {
        Topology::from_value(json!({
            "WAN_ROUTER_01": {"type": "ROUTER", "layer": 1},
            "FW_01_PRIMARY": {"type": "FIREWALL", "layer": 2, "parent_id": "WAN_ROUTER_01", "redundancy_group": "FW_HA"},
            "FW_01_SECONDARY": {"type": "FIREWALL", "layer": 2, "parent_id": "WAN_ROUTER_01", "redundancy_group": "FW_HA"},
            "CORE_SW_01": {"type": "SWITCH", "layer": 3, "parent_id": "FW_01_PRIMARY"},
            "L2_SW_01": {"type": "SWITCH", "layer": 4, "parent_id": "CORE_SW_01"},
            "AP_01": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"},
            "AP_02": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"},
            "AP_03": {"type": "ACCESS_POINT", "layer": 5, "parent_id": "L2_SW_01"}
        }))
        .unwrap()
    }

    #[test]
    fn test_skip_labels() {
        let t = topo();
        for label in ["正常稼働", "---", "[Live] Cisco実機診断", "something else"] {
            assert!(generate_alarms(&t, label).is_empty(), "{}", label);
        }
    }

    #[test]
    fn test_wan_total_loss_cascades() {
        let alarms = generate_alarms(&topo(), "WAN全回線断");
        assert_eq!(alarms.len(), 8);
        assert_eq!(alarms[0].device_id, "WAN_ROUTER_01");
        assert_eq!(alarms[0].message, "Interface Down");
    }

    #[test]
    fn test_fw_single_side() {
        let alarms = generate_alarms(&topo(), "FW片系障害");
        assert_eq!(alarms, vec![Alarm::warning("FW_01_PRIMARY", "Heartbeat Loss")]);
    }

    #[test]
    fn test_l2_silent_failure_children() {
        let alarms = generate_alarms(&topo(), "L2SWサイレント障害");
        let ids: Vec<&str> = alarms.iter().map(|a| a.device_id.as_str()).collect();
        assert_eq!(ids, vec!["AP_01", "AP_02", "AP_03"]);
        assert!(alarms.iter().all(|a| a.severity == Severity::Critical && a.message == "Connection Lost"));
    }

    #[test]
    fn test_l2_silent_without_children_degrades() {
        let t = Topology::from_value(json!({"L2_SW_09": {"type": "SWITCH", "layer": 4}})).unwrap();
        let alarms = generate_alarms(&t, "L2SWサイレント障害");
        assert_eq!(alarms, vec![Alarm::warning("L2_SW_09", "Silent Degradation Suspected")]);
    }

    #[test]
    fn test_compound_and_simultaneous() {
        let t = topo();
        assert_eq!(generate_alarms(&t, "複合障害：電源＆FAN").len(), 2);
        let multi = generate_alarms(&t, "同時多発：FW & AP");
        assert_eq!(multi[0].device_id, "FW_01_PRIMARY");
        assert_eq!(multi[1].device_id, "AP_01");
    }

    #[test]
    fn test_scoped_faults() {
        let t = topo();
        assert_eq!(
            generate_alarms(&t, "[WAN] BGPルートフラッピング"),
            vec![Alarm::warning("WAN_ROUTER_01", "BGP Flapping")]
        );
        assert_eq!(
            generate_alarms(&t, "[FW] 電源障害：両系"),
            vec![Alarm::critical("FW_01_PRIMARY", DUAL_POWER_LOSS_MESSAGE)]
        );
        let l2 = generate_alarms(&t, "[L2SW] 電源障害：両系");
        assert_eq!(l2.len(), 4);
        assert_eq!(l2[0].message, DUAL_POWER_LOSS_MESSAGE);
        assert_eq!(generate_alarms(&t, "[L2SW] メモリリーク")[0].message, "Memory High");
    }

    #[test]
    fn test_every_listed_label_is_handled() {
        let t = topo();
        for label in ScenarioCatalog::labels().iter().skip(1) {
            assert!(!generate_alarms(&t, label).is_empty(), "{}", label);
        }
    }
}
