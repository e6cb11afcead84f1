/*!
# Faultline DevKit - Fixtures et doublures pour tester le moteur de diagnostic

Bibliothèque facilitant les tests du kernel avec:
- Topologies de démonstration (réseau WAN/FW HA/L2/AP)
- Oracle IA scripté (réponses, pannes, lenteur)
- Sink d'événements enregistrant les diagnostics publiés
- Constructeurs d'alarmes et harness d'intégration
*/

pub mod alarms;
pub mod fixtures;
pub mod oracle_stub;
pub mod sink_stub;
pub mod test_utils;

pub use alarms::AlarmBatch;
pub use fixtures::{demo_topology, star_topology};
pub use oracle_stub::FakeOracle;
pub use sink_stub::RecordingSink;
pub use test_utils::TestHarness;
