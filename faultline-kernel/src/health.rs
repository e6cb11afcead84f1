use crate::state::{new_state, Shared};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub topology_nodes: usize,
    pub analyses_run: u64,
    pub ai_fallbacks: u64,
    pub ai_enabled: bool,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    analyses_run: Arc<AtomicU64>,
    ai_fallbacks: Arc<AtomicU64>,
    mqtt_status: Shared<String>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            analyses_run: Arc::new(AtomicU64::new(0)),
            ai_fallbacks: Arc::new(AtomicU64::new(0)),
            mqtt_status: new_state("disabled".to_string()),
        }
    }

    pub fn record_analysis(&self) {
        self.analyses_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ai_fallbacks(&self, count: u64) {
        if count > 0 {
            self.ai_fallbacks.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn analyses_run(&self) -> u64 {
        self.analyses_run.load(Ordering::Relaxed)
    }

    pub fn ai_fallbacks(&self) -> u64 {
        self.ai_fallbacks.load(Ordering::Relaxed)
    }

    pub fn set_mqtt_status(&self, status: &str) {
        *self.mqtt_status.lock() = status.to_string();
    }

    pub fn get_health(&self, topology_nodes: usize, ai_enabled: bool) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            topology_nodes,
            analyses_run: self.analyses_run(),
            ai_fallbacks: self.ai_fallbacks(),
            ai_enabled,
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|l| l.starts_with("VmRSS:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let health = HealthTracker::new();
        health.record_analysis();
        health.record_analysis();
        health.record_ai_fallbacks(0);
        health.record_ai_fallbacks(3);
        let clone = health.clone();
        clone.set_mqtt_status("connected");

        let snapshot = health.get_health(12, true);
        assert_eq!(snapshot.analyses_run, 2);
        assert_eq!(snapshot.ai_fallbacks, 3);
        assert_eq!(snapshot.topology_nodes, 12);
        assert_eq!(snapshot.mqtt_status, "connected");
    }
}
