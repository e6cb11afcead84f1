/*!
Test Harness pour le moteur de diagnostic

Facilite l'écriture de tests d'intégration avec :
- topologie de démonstration chargée d'office
- oracle simulé branché sur la délégation IA (retries rapides)
- sink d'enregistrement à la place du broker MQTT
*/

use crate::fixtures::demo_topology;
use crate::oracle_stub::FakeOracle;
use crate::sink_stub::RecordingSink;
use anyhow::Result;
use faultline_kernel::judge::HybridJudge;
use faultline_kernel::models::{Alarm, Candidate};
use faultline_kernel::oracle::{AiDelegate, RetryPolicy};
use faultline_kernel::sanitizer::DefaultSanitizer;
use faultline_kernel::scenarios::ScenarioCatalog;
use faultline_kernel::service::{Diagnoser, Diagnosis};
use faultline_kernel::topology::Topology;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Retries en millisecondes pour garder les tests rapides
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 4,
        backoff_multiplier_percent: 200,
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("faultline_kernel=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

pub struct TestHarness {
    pub topology: Arc<Topology>,
    pub sink: RecordingSink,
    pub oracle: Option<Arc<FakeOracle>>,
    pub oracle_timeout: Duration,
    catalog: ScenarioCatalog,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            topology: Arc::new(demo_topology()),
            sink: RecordingSink::new(),
            oracle: None,
            oracle_timeout: Duration::from_secs(2),
            catalog: ScenarioCatalog::default(),
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = Arc::new(topology);
        self
    }

    pub fn with_oracle(mut self, oracle: FakeOracle) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn oracle_calls(&self) -> usize {
        self.oracle.as_ref().map(|o| o.calls()).unwrap_or(0)
    }

    /// Nouveau Diagnoser à chaque appel, branché sur le même sink
    pub fn diagnoser(&self) -> Diagnoser {
        let judge = match &self.oracle {
            Some(oracle) => {
                let delegate = AiDelegate::new(oracle.clone(), Arc::new(DefaultSanitizer))
                    .with_retry(fast_retry())
                    .with_timeout(self.oracle_timeout);
                HybridJudge::new(Some(delegate))
            }
            None => HybridJudge::rules_only(),
        };
        Diagnoser::new(self.topology.clone(), judge).with_sink(Arc::new(self.sink.clone()))
    }

    pub fn scenario(&self, label: &str) -> Vec<Alarm> {
        self.catalog.generate(&self.topology, label)
    }

    pub fn analyze(&self, alarms: &[Alarm]) -> Vec<Candidate> {
        faultline_kernel::analyze(alarms, &self.topology)
    }

    pub async fn diagnose(&self, alarms: &[Alarm]) -> Diagnosis {
        self.diagnoser().diagnose(alarms).await
    }

    pub async fn simulate(&self, label: &str) -> (Vec<Alarm>, Diagnosis) {
        let alarms = self.scenario(label);
        let diagnosis = self.diagnose(&alarms).await;
        (alarms, diagnosis)
    }

    /// Écrit `content` dans un répertoire temporaire ; garder le TempDir vivant
    pub fn write_file(name: &str, content: &str) -> Result<(TempDir, PathBuf)> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        std::fs::write(&path, content)?;
        Ok((dir, path))
    }
}
