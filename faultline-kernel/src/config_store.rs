/*!
 * CONFIG STORE - Lecture des configurations d'équipement pour l'IA
 *
 * Consommé uniquement par la délégation IA, jamais par les règles
 * déterministes. Introuvable => None.
 */

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const CONFIG_EXTENSIONS: &[&str] = &["txt", "cfg", "conf"];

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn read_config(&self, device_id: &str) -> Option<String>;
}

/// `<dir>/<device_id>.{txt,cfg,conf}`
#[derive(Debug, Clone)]
pub struct DirConfigStore {
    dir: PathBuf,
}

impl DirConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn is_safe_id(device_id: &str) -> bool {
        !device_id.is_empty()
            && !device_id.contains(['/', '\\'])
            && !device_id.contains("..")
    }
}

#[async_trait]
impl ConfigStore for DirConfigStore {
    async fn read_config(&self, device_id: &str) -> Option<String> {
        if !Self::is_safe_id(device_id) {
            warn!("[configs] refusing suspicious device id '{}'", device_id);
            return None;
        }
        for ext in CONFIG_EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", device_id, ext));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    debug!("[configs] loaded {}", path.display());
                    return Some(text);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("[configs] cannot read {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("R1.cfg"), "hostname R1\n").unwrap();
        let store = DirConfigStore::new(dir.path());
        assert_eq!(store.read_config("R1").await.as_deref(), Some("hostname R1\n"));
        assert!(store.read_config("R2").await.is_none());
    }

    #[tokio::test]
    async fn test_path_traversal_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "secret").unwrap();
        let store = DirConfigStore::new(dir.path().join("sub"));
        assert!(store.read_config("../x").await.is_none());
        assert!(store.read_config("").await.is_none());
    }
}
