/*!
EventSink d'enregistrement pour tests sans broker MQTT

Garde chaque diagnostic publié avec le topic qu'aurait utilisé le
MqttEventSink.
*/

use faultline_kernel::mqtt::{EventSink, DIAGNOSIS_TOPIC};
use faultline_kernel::service::Diagnosis;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
    pub diagnosis: Diagnosis,
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    published: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<RecordedEvent> {
        self.published.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn last(&self) -> Option<RecordedEvent> {
        self.published.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, diagnosis: &Diagnosis) {
        let payload = serde_json::to_value(diagnosis).unwrap_or_default();
        tracing::info!("[devkit] recorded {} on {}", diagnosis.analysis_id, DIAGNOSIS_TOPIC);
        self.published.lock().push(RecordedEvent {
            topic: DIAGNOSIS_TOPIC.to_string(),
            payload,
            diagnosis: diagnosis.clone(),
        });
    }
}
