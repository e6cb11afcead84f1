use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::service::Diagnosis;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

pub const DIAGNOSIS_TOPIC: &str = "faultline/rca/diagnosis@v1";
const QUEUE_DEPTH: usize = 64;

/// Destination des diagnostics ; `publish` ne doit jamais bloquer l'analyse
pub trait EventSink: Send + Sync {
    fn publish(&self, diagnosis: &Diagnosis);
}

/// Publication MQTT depuis une task dédiée, alimentée par un canal borné
pub struct MqttEventSink {
    tx: mpsc::Sender<String>,
}

impl MqttEventSink {
    pub fn spawn(conf: &MqttConf, health: HealthTracker) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(QUEUE_DEPTH);
        let mut opts = MqttOptions::new("faultline-kernel", &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        health.set_mqtt_status("connecting");
        info!("[mqtt] publishing diagnoses to {}:{} on {}", conf.host, conf.port, DIAGNOSIS_TOPIC);

        task::spawn(async move {
            loop {
                tokio::select! {
                    msg = rx.recv() => match msg {
                        Some(payload) => {
                            // try_publish : ne pas bloquer la boucle qui poll l'eventloop
                            if let Err(e) = client.try_publish(DIAGNOSIS_TOPIC, QoS::AtLeastOnce, false, payload) {
                                warn!("[mqtt] publish failed: {:?}", e);
                            }
                        }
                        None => break,
                    },
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => health.set_mqtt_status("connected"),
                        Ok(_) => {}
                        Err(e) => {
                            warn!("[mqtt] connection error: {:?}", e);
                            health.set_mqtt_status("reconnecting");
                            tokio::time::sleep(Duration::from_secs(2)).await;
                        }
                    }
                }
            }
            debug!("[mqtt] publisher stopped");
        });

        Self { tx }
    }
}

impl EventSink for MqttEventSink {
    fn publish(&self, diagnosis: &Diagnosis) {
        match serde_json::to_string(diagnosis) {
            Ok(payload) => {
                if let Err(e) = self.tx.try_send(payload) {
                    warn!("[mqtt] diagnosis {} dropped: {}", diagnosis.analysis_id, e);
                }
            }
            Err(e) => warn!("[mqtt] cannot serialize diagnosis: {}", e),
        }
    }
}
