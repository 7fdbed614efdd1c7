// Judge Provider Service
// Implements the Gemini generateContent call used as the external judge model

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::config_store::{JudgeConfig, ProxyConfig};
use crate::models::ImageInput;

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Substrings that mark a provider failure as temporary unavailability.
const TRANSIENT_MARKERS: [&str; 6] = [
    "503",
    "unavailable",
    "429",
    "resource_exhausted",
    "too many requests",
    "overloaded",
];

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

impl ProviderError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || has_transient_marker(&e.to_string())
            }
            ProviderError::ApiError { status, message } => {
                matches!(status, 429 | 503) || has_transient_marker(message)
            }
            ProviderError::MissingContent
            | ProviderError::JsonError(_)
            | ProviderError::MissingApiKey => false,
        }
    }
}

pub fn has_transient_marker(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// External generative model consulted as an untrusted judge.
#[async_trait]
pub trait JudgeModel: Send + Sync {
    fn name(&self) -> String;

    async fn ask(&self, prompt: &str, image: Option<&ImageInput>) -> Result<ChatResult, ProviderError>;
}

// ============ Gemini wire format ============

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

/// Build the shared HTTP client, routed through the configured proxy when enabled.
pub fn build_http_client(
    proxy: Option<&ProxyConfig>,
    timeout_secs: u64,
) -> Result<Client, ProviderError> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));
    if let Some(url) = proxy.and_then(|p| p.active_url()) {
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }
    Ok(builder.build()?)
}

impl GeminiClient {
    pub fn new(client: Client, model: &str, api_key: Option<String>) -> Self {
        let base_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string());
        Self {
            client,
            base_url,
            model: model.to_string(),
            api_key,
        }
    }

    pub fn from_config(
        config: &JudgeConfig,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, ProviderError> {
        let client = build_http_client(proxy, config.request_timeout_secs)?;
        let mut gemini = Self::new(client, &config.model, get_api_key(&config.provider));
        if let Some(ref url) = config.base_url {
            gemini.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(gemini)
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(prompt: &str, image: Option<&ImageInput>) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        if let Some(img) = image {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: img.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&img.bytes),
                },
            });
        }
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        }
    }
}

#[async_trait]
impl JudgeModel for GeminiClient {
    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn ask(&self, prompt: &str, image: Option<&ImageInput>) -> Result<ChatResult, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let request = Self::build_request(prompt, image);

        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = extract_text(data).ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

fn extract_text(data: GenerateResponse) -> Option<String> {
    let parts = data
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys = match provider {
        "gemini" => vec!["GEMINI_API_KEY", "TRUTHLENS_GEMINI_API_KEY"],
        "classifier" => vec!["HF_API_TOKEN", "TRUTHLENS_CLASSIFIER_TOKEN"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key(provider) {
            return Some(key);
        }
    }

    None
}
