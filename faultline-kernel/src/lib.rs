/*!
 * FAULTLINE KERNEL - Simulation de pannes réseau et inférence de cause racine
 *
 * Pipeline synchrone : Cascade Simulator → Signature Matcher → Safety Rules
 * → Silent-Failure Detector → Ranker, sur une topologie en lecture seule.
 * Seule la délégation IA (oracle) est asynchrone, bornée et toujours
 * remplacée par un repli non définitif en cas d'échec.
 */

pub mod analyzer;
pub mod cascade;
pub mod config;
pub mod config_store;
pub mod health;
pub mod http;
pub mod judge;
pub mod models;
pub mod mqtt;
pub mod oracle;
pub mod ranker;
pub mod safety;
pub mod sanitizer;
pub mod scenarios;
pub mod service;
pub mod signatures;
pub mod silent;
pub mod state;
pub mod topology;

pub use analyzer::{analyze, validate_alarms, RootCauseAnalyzer};
pub use cascade::simulate_cascade;
pub use judge::HybridJudge;
pub use models::{Alarm, Candidate, DeviceJudgment, HealthStatus, ImpactType, SafetyJudgment, Severity};
pub use oracle::{AiDelegate, Oracle, OracleError};
pub use scenarios::{generate_alarms, ScenarioCatalog};
pub use service::{Diagnoser, Diagnosis};
pub use topology::{NetworkNode, NodeType, Topology, TopologyError};
