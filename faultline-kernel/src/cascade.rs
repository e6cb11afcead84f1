/*!
 * CASCADE - Simulation d'une panne totale propagée vers tous les descendants
 *
 * Parcours en largeur depuis la racine : une alarme CRITICAL pour la racine,
 * puis une alarme WARNING "Unreachable" par descendant atteignable.
 * L'ensemble `visited` est consulté avant chaque mise en file : chaque
 * équipement apparaît au plus une fois, et le parcours termine même sur
 * des données malformées.
 */

use crate::models::{Alarm, Severity};
use crate::topology::Topology;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

pub const DEFAULT_ROOT_MESSAGE: &str = "Interface Down";
pub const UNREACHABLE_MESSAGE: &str = "Unreachable";

pub fn simulate_cascade(root_id: &str, topology: &Topology, root_message: &str) -> Vec<Alarm> {
    if !topology.contains(root_id) {
        warn!("[cascade] root {} not in topology, nothing to simulate", root_id);
        return Vec::new();
    }

    let mut alarms = vec![Alarm::new(root_id, root_message, Severity::Critical)];
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    visited.insert(root_id);
    queue.push_back(root_id);

    while let Some(current) = queue.pop_front() {
        for child in topology.children_of(current) {
            if visited.insert(child.id.as_str()) {
                alarms.push(Alarm::new(child.id.as_str(), UNREACHABLE_MESSAGE, Severity::Warning));
                queue.push_back(child.id.as_str());
            }
        }
    }

    debug!("[cascade] {} -> {} alarms", root_id, alarms.len());
    alarms
}
