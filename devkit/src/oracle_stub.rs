/*!
Oracle IA simulé

Rejoue une liste de réponses scriptées dans l'ordre, enregistre chaque
prompt reçu et peut simuler un backend lent. Script épuisé => erreur
permanente.
*/

use async_trait::async_trait;
use faultline_kernel::oracle::{Oracle, OracleError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct FakeOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeOracle {
    pub fn scripted(replies: Vec<Result<String, OracleError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Toujours la même réponse JSON valide
    pub fn answering(status: &str, impact_type: &str, reason: &str) -> Self {
        let body = serde_json::json!({"status": status, "impact_type": impact_type, "reason": reason}).to_string();
        Self::scripted((0..64).map(|_| Ok(body.clone())).collect())
    }

    /// Backend injoignable (503 en boucle)
    pub fn unavailable() -> Self {
        Self::scripted((0..64).map(|_| Err(OracleError::ServiceUnavailable("503".into()))).collect())
    }

    pub fn malformed(text: &str) -> Self {
        Self::scripted((0..64).map(|_| Ok(text.to_string())).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Permanent("script exhausted".into())))
    }
}
