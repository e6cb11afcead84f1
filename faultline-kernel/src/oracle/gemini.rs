/*!
 * GEMINI - Oracle de production sur l'API generateContent
 *
 * Client HTTP construit à la première utilisation (OnceLock, sûr en
 * concurrence), puis partagé par tous les appels. Les statuts HTTP sont
 * traduits en classes d'OracleError pour la politique de retry.
 */

use super::{Oracle, OracleError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiOracle {
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    request_timeout: Duration,
    client: OnceLock<reqwest::Client>,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(OracleError::NotConfigured("GOOGLE_API_KEY is empty".into()));
        }
        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(30),
            client: OnceLock::new(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            reqwest::Client::builder()
                .timeout(self.request_timeout)
                .build()
                .unwrap_or_else(|e| {
                    warn!("[oracle] custom HTTP client failed ({}), using defaults", e);
                    reqwest::Client::new()
                })
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Statut HTTP => classe d'erreur ; 504 est une deadline, pas un transitoire
pub fn classify_status(status: StatusCode, body: &str) -> OracleError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>());
    match status {
        StatusCode::GATEWAY_TIMEOUT => OracleError::DeadlineExceeded(Duration::ZERO),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => OracleError::ServiceUnavailable(detail),
        s if s.is_server_error() => OracleError::ServiceUnavailable(detail),
        _ => OracleError::Permanent(detail),
    }
}

fn classify_transport(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::DeadlineExceeded(Duration::ZERO)
    } else {
        OracleError::Transport(err.to_string())
    }
}

/// Premier texte non vide de la première candidate
pub fn extract_text(body: &str) -> Result<String, OracleError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::MalformedResponse(format!("unexpected response body: {}", e)))?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.text.filter(|t| !t.trim().is_empty())))
        .ok_or_else(|| OracleError::MalformedResponse("response has no text".into()))
}

#[async_trait]
impl Oracle for GeminiOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let request = GenerateRequest {
            contents: vec![Content { parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client()
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        debug!("[oracle] {} answered {} bytes", self.model, body.len());
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, ""),
            OracleError::DeadlineExceeded(_)
        ));
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST, "bad"), OracleError::Permanent(_)));
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"status\":\"NORMAL\"}"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), r#"{"status":"NORMAL"}"#);
        assert!(extract_text(r#"{"candidates":[]}"#).is_err());
        assert!(extract_text("<html>").is_err());
    }

    #[test]
    fn test_empty_key_is_refused() {
        assert!(matches!(GeminiOracle::new("  "), Err(OracleError::NotConfigured(_))));
        let oracle = GeminiOracle::new("k").unwrap().with_endpoint("http://localhost:9/v1/");
        assert_eq!(oracle.url(), "http://localhost:9/v1/models/gemini-1.5-flash:generateContent");
    }
}
