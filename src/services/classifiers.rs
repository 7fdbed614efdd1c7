// Local Classifier Signals
// Text sequence classifier and image/prompt similarity classifier behind an
// inference endpoint. Softmax and prompt averaging happen here.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::config_store::{ClassifierConfig, ProxyConfig};
use super::providers::{build_http_client, ProviderError};
use crate::models::ImageInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptFraming {
    Real,
    Synthetic,
}

/// Reference prompts scored against every image, in request order.
pub const IMAGE_PROMPTS: [(&str, PromptFraming); 4] = [
    ("a real photograph of a person", PromptFraming::Real),
    ("an AI-generated image of a person", PromptFraming::Synthetic),
    ("a computer-generated landscape", PromptFraming::Synthetic),
    ("a real photo taken by a camera", PromptFraming::Real),
];

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Classifier error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),
    #[error("Nothing to classify")]
    EmptyInput,
}

impl From<ProviderError> for ClassifierError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::HttpError(inner) => ClassifierError::HttpError(inner),
            other => ClassifierError::MalformedResponse(other.to_string()),
        }
    }
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Probability that the text is machine-generated.
    async fn classify_text(&self, text: &str) -> Result<f64, ClassifierError>;
}

#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Probability that the image is machine-generated.
    async fn classify_image(&self, image: &ImageInput) -> Result<f64, ClassifierError>;
}

pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Validated softmax over the four prompt logits, in `IMAGE_PROMPTS` order.
pub fn prompt_probabilities(logits: &[f64]) -> Result<Vec<f64>, ClassifierError> {
    if logits.len() != IMAGE_PROMPTS.len() {
        return Err(ClassifierError::MalformedResponse(format!(
            "expected {} logits, got {}",
            IMAGE_PROMPTS.len(),
            logits.len()
        )));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(ClassifierError::MalformedResponse("non-finite logit".to_string()));
    }
    Ok(softmax(logits))
}

/// Mean probability mass on the synthetic-framed prompts.
pub fn synthetic_mass(probs: &[f64]) -> f64 {
    let synthetic: Vec<f64> = probs
        .iter()
        .zip(IMAGE_PROMPTS.iter())
        .filter(|(_, (_, framing))| *framing == PromptFraming::Synthetic)
        .map(|(p, _)| *p)
        .collect();
    if synthetic.is_empty() {
        return 0.0;
    }
    (synthetic.iter().sum::<f64>() / synthetic.len() as f64).clamp(0.0, 1.0)
}

pub fn ai_likelihood_from_logits(logits: &[f64]) -> Result<f64, ClassifierError> {
    prompt_probabilities(logits).map(|probs| synthetic_mass(&probs))
}

/// Keep the first `max_tokens` whitespace tokens.
pub fn clip_to_tokens(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============ HTTP text classifier ============

#[derive(Debug, Serialize)]
struct TextClassifyRequest<'a> {
    inputs: &'a str,
    parameters: TextClassifyParameters,
}

#[derive(Debug, Serialize)]
struct TextClassifyParameters {
    truncation: bool,
    max_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextClassifyResponse {
    Batched(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl TextClassifyResponse {
    fn into_scores(self) -> Vec<LabelScore> {
        match self {
            TextClassifyResponse::Batched(mut b) => {
                if b.is_empty() {
                    Vec::new()
                } else {
                    b.swap_remove(0)
                }
            }
            TextClassifyResponse::Flat(f) => f,
        }
    }
}

/// Score of `ai_label` (case-insensitive) in a label/score list.
pub fn ai_probability_from_labels(
    scores: &[LabelScore],
    ai_label: &str,
) -> Result<f64, ClassifierError> {
    scores
        .iter()
        .find(|s| s.label.eq_ignore_ascii_case(ai_label))
        .map(|s| s.score.clamp(0.0, 1.0))
        .ok_or_else(|| {
            ClassifierError::MalformedResponse(format!("label '{}' not in response", ai_label))
        })
}

pub struct HttpTextClassifier {
    client: Client,
    endpoint: String,
    ai_label: String,
    max_tokens: usize,
    api_token: Option<String>,
}

impl HttpTextClassifier {
    pub fn new(client: Client, config: &ClassifierConfig, api_token: Option<String>) -> Self {
        Self {
            client,
            endpoint: config.text_endpoint.clone(),
            ai_label: config.text_ai_label.clone(),
            max_tokens: config.text_max_tokens,
            api_token,
        }
    }
}

#[async_trait]
impl TextClassifier for HttpTextClassifier {
    async fn classify_text(&self, text: &str) -> Result<f64, ClassifierError> {
        let clipped = clip_to_tokens(text, self.max_tokens);
        if clipped.is_empty() {
            return Err(ClassifierError::EmptyInput);
        }

        let request = TextClassifyRequest {
            inputs: &clipped,
            parameters: TextClassifyParameters {
                truncation: true,
                max_length: self.max_tokens,
            },
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref token) = self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: TextClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
        let scores = parsed.into_scores();
        debug!("[CLASSIFIER] text labels: {:?}", scores);
        ai_probability_from_labels(&scores, &self.ai_label)
    }
}

// ============ HTTP image/prompt similarity classifier ============

#[derive(Debug, Serialize)]
struct SimilarityRequest<'a> {
    image: String,
    mime_type: &'a str,
    prompts: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SimilarityResponse {
    logits_per_image: Vec<f64>,
}

pub struct HttpImageClassifier {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpImageClassifier {
    pub fn new(client: Client, config: &ClassifierConfig, api_token: Option<String>) -> Self {
        Self {
            client,
            endpoint: config.image_endpoint.clone(),
            api_token,
        }
    }
}

#[async_trait]
impl ImageClassifier for HttpImageClassifier {
    async fn classify_image(&self, image: &ImageInput) -> Result<f64, ClassifierError> {
        if image.bytes.is_empty() {
            return Err(ClassifierError::EmptyInput);
        }

        let request = SimilarityRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            mime_type: &image.mime_type,
            prompts: IMAGE_PROMPTS.iter().map(|(p, _)| *p).collect(),
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref token) = self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SimilarityResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

        let probs = prompt_probabilities(&parsed.logits_per_image)?;
        for ((prompt, _), p) in IMAGE_PROMPTS.iter().zip(probs.iter()) {
            debug!("[CLASSIFIER] {:45} -> {:.2}%", prompt, p * 100.0);
        }
        Ok(synthetic_mass(&probs))
    }
}

/// Build both HTTP classifiers sharing one client.
pub fn http_classifiers(
    config: &ClassifierConfig,
    proxy: Option<&ProxyConfig>,
    api_token: Option<String>,
) -> Result<(HttpTextClassifier, HttpImageClassifier), ClassifierError> {
    let client = build_http_client(proxy, config.request_timeout_secs)?;
    Ok((
        HttpTextClassifier::new(client.clone(), config, api_token.clone()),
        HttpImageClassifier::new(client, config, api_token),
    ))
}
