use crate::oracle::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "FAULTLINE_KERNEL_CONFIG";
pub const AI_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const HTTP_KEY_ENV: &str = "FAULTLINE_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub http: HttpConf,
    pub topology: TopologyConf,
    pub configs: ConfigsConf,
    pub ai: AiConf,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TopologyConf {
    pub path: PathBuf,
}

impl Default for TopologyConf {
    fn default() -> Self {
        Self { path: PathBuf::from("topology.json") }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigsConf {
    pub dir: PathBuf,
}

impl Default for ConfigsConf {
    fn default() -> Self {
        Self { dir: PathBuf::from("./configs") }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AiConf {
    /// None => activé si GOOGLE_API_KEY est présent
    pub enabled: Option<bool>,
    pub model: String,
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for AiConf {
    fn default() -> Self {
        Self {
            enabled: None,
            model: crate::oracle::gemini::DEFAULT_MODEL.into(),
            endpoint: None,
            temperature: 0.0,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl AiConf {
    pub fn is_enabled(&self, api_key_present: bool) -> bool {
        self.enabled.unwrap_or(api_key_present) && api_key_present
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

/// Fichier vide => défauts ; YAML invalide => erreur
pub async fn read_config(path: &Path) -> Result<KernelConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    Ok(serde_yaml::from_str(&txt)?)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "kernel.yaml".into());
    let path = Path::new(&path);
    if !path.exists() {
        info!("[config] no {}, using defaults", path.display());
        return KernelConfig::default();
    }
    read_config(path).await.unwrap_or_else(|e| {
        warn!("[config] invalid {}: {} (using defaults)", path.display(), e);
        KernelConfig::default()
    })
}

/// Variable d'environnement non vide
pub fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
