/*!
Constructeurs d'alarmes pour les tests
*/

use faultline_kernel::models::{Alarm, Severity};

/// `[(device, message)]` => alarmes WARNING
pub fn warnings(pairs: &[(&str, &str)]) -> Vec<Alarm> {
    pairs.iter().map(|(d, m)| Alarm::warning(*d, *m)).collect()
}

/// Une alarme CRITICAL "Connection Lost" par équipement
pub fn connection_lost(devices: &[&str]) -> Vec<Alarm> {
    devices.iter().map(|d| Alarm::critical(*d, "Connection Lost")).collect()
}

#[derive(Debug, Default, Clone)]
pub struct AlarmBatch {
    alarms: Vec<Alarm>,
}

impl AlarmBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn critical(mut self, device: &str, message: &str) -> Self {
        self.alarms.push(Alarm::new(device, message, Severity::Critical));
        self
    }

    pub fn warning(mut self, device: &str, message: &str) -> Self {
        self.alarms.push(Alarm::new(device, message, Severity::Warning));
        self
    }

    pub fn info(mut self, device: &str, message: &str) -> Self {
        self.alarms.push(Alarm::new(device, message, Severity::Info));
        self
    }

    pub fn extend(mut self, alarms: impl IntoIterator<Item = Alarm>) -> Self {
        self.alarms.extend(alarms);
        self
    }

    pub fn build(self) -> Vec<Alarm> {
        self.alarms
    }
}
