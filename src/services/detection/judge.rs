// Judge Client
// Asks the external judge model for a probability, with bounded retry on
// transient failure and degradation to a neutral score. Never fails the caller.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use super::retry::{RetryFailure, RetryPolicy};
use crate::models::{ImageInput, ScoreSample, SignalSource};
use crate::services::providers::{JudgeModel, ProviderError};

const TEXT_SCORE_PROMPT: &str =
    "Respond with a number between 0 and 1 representing how likely this text is AI-generated:\n";

const IMAGE_SCORE_PROMPT: &str = "Rate from 0 to 1 how likely this image is AI-generated or a deepfake. \
Respond with only a number.";

/// What the judge is asked to look at.
#[derive(Debug, Clone, Copy)]
pub enum JudgeContent<'a> {
    Text(&'a str),
    Image(&'a ImageInput),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JudgeFailure {
    /// The model answered, but no probability in [0, 1] could be read from it.
    Unparseable(String),
    /// Transient failures used up the whole retry budget.
    Unavailable(String),
    /// A non-transient failure (auth, bad request, missing key).
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JudgeVerdict {
    Scored { score: f64, attempts: usize },
    Degraded { failure: JudgeFailure, attempts: usize },
}

impl JudgeVerdict {
    pub fn attempts(&self) -> usize {
        match self {
            JudgeVerdict::Scored { attempts, .. } | JudgeVerdict::Degraded { attempts, .. } => *attempts,
        }
    }

    pub fn into_sample(self) -> ScoreSample {
        match self {
            JudgeVerdict::Scored { score, .. } => ScoreSample::new(SignalSource::Judge, score),
            JudgeVerdict::Degraded { .. } => ScoreSample::neutral(SignalSource::Judge),
        }
    }
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?").unwrap())
}

/// First number in the response that lies in [0, 1]. Sign and exponent are
/// part of the token, so "-0.3" is out of range rather than 0.3.
pub fn parse_probability(text: &str) -> Option<f64> {
    number_re()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .find(|v| (0.0..=1.0).contains(v))
}

#[derive(Clone)]
pub struct JudgeClient {
    model: Arc<dyn JudgeModel>,
    policy: RetryPolicy,
}

impl JudgeClient {
    pub fn new(model: Arc<dyn JudgeModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn model_name(&self) -> String {
        self.model.name()
    }

    /// Ask for a bare probability, retrying transient failures.
    pub async fn assess(&self, content: JudgeContent<'_>) -> JudgeVerdict {
        let (prompt, image) = match content {
            JudgeContent::Text(text) => (format!("{}{}", TEXT_SCORE_PROMPT, text), None),
            JudgeContent::Image(img) => (IMAGE_SCORE_PROMPT.to_string(), Some(img)),
        };
        let model = self.model.clone();
        let label = format!("judge {}", self.model.name());

        let outcome = self
            .policy
            .run(&label, |_| {
                let model = model.clone();
                let prompt = prompt.clone();
                async move { model.ask(&prompt, image).await }
            })
            .await;

        let attempts = outcome.attempts;
        match outcome.result {
            Ok(chat) => match parse_probability(chat.content.trim()) {
                Some(score) => {
                    info!(
                        "[JUDGE] score={:.3} attempts={} latency_ms={}",
                        score, attempts, chat.latency_ms
                    );
                    JudgeVerdict::Scored { score, attempts }
                }
                None => {
                    warn!(
                        "[JUDGE] unparseable response {:?}; using neutral fallback",
                        truncate_for_log(&chat.content)
                    );
                    JudgeVerdict::Degraded {
                        failure: JudgeFailure::Unparseable(chat.content),
                        attempts,
                    }
                }
            },
            Err(RetryFailure::Exhausted(e)) => {
                warn!("[JUDGE] service unavailable after retries; using neutral fallback: {}", e);
                JudgeVerdict::Degraded {
                    failure: JudgeFailure::Unavailable(e.to_string()),
                    attempts,
                }
            }
            Err(RetryFailure::Permanent(e)) => {
                warn!("[JUDGE] request rejected; using neutral fallback: {}", e);
                JudgeVerdict::Degraded {
                    failure: JudgeFailure::Rejected(e.to_string()),
                    attempts,
                }
            }
        }
    }

    /// Judge signal as a sample; neutral 0.5 (marked fallback) when degraded.
    pub async fn judge(&self, content: JudgeContent<'_>) -> ScoreSample {
        self.assess(content).await.into_sample()
    }

    /// One free-text call with no retry. `None` on failure or empty output.
    pub async fn write_prose(&self, prompt: &str, image: Option<&ImageInput>) -> Option<String> {
        match self.model.ask(prompt, image).await {
            Ok(chat) => {
                let text = chat.content.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                warn!("[JUDGE] reasoning generation failed: {}", describe(&e));
                None
            }
        }
    }
}

fn describe(e: &ProviderError) -> String {
    if e.is_transient() {
        format!("{} (transient)", e)
    } else {
        e.to_string()
    }
}

fn truncate_for_log(s: &str) -> String {
    s.chars().take(80).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::providers::ChatResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Judge model that replays a script of responses and records prompts.
    pub(crate) struct ScriptedJudge {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        pub(crate) prompts: Mutex<Vec<(String, bool)>>,
        fallback: Option<String>,
    }

    impl ScriptedJudge {
        pub(crate) fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
                fallback: None,
            }
        }

        /// Answer every call not covered by the script with `answer`.
        pub(crate) fn always(answer: &str) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
                fallback: Some(answer.to_string()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl JudgeModel for ScriptedJudge {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn ask(&self, prompt: &str, image: Option<&ImageInput>) -> Result<ChatResult, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), image.is_some()));
            let next = self.script.lock().unwrap().pop_front();
            let reply = match next {
                Some(r) => r,
                None => match self.fallback {
                    Some(ref a) => Ok(a.clone()),
                    None => Err(ProviderError::MissingContent),
                },
            };
            reply.map(|content| ChatResult {
                content,
                latency_ms: 1,
            })
        }
    }

    pub(crate) fn unavailable() -> ProviderError {
        ProviderError::ApiError {
            status: 503,
            message: "UNAVAILABLE".to_string(),
        }
    }

    pub(crate) fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_unit(Duration::from_millis(1))
    }

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.82"), Some(0.82));
        assert_eq!(parse_probability("Score: 0.7\nbecause..."), Some(0.7));
        assert_eq!(parse_probability("1"), Some(1.0));
        assert_eq!(parse_probability("I'd say 85 percent, so .85"), Some(0.85));
        assert_eq!(parse_probability("no idea"), None);
        assert_eq!(parse_probability("42"), None);
        assert_eq!(parse_probability("-0.3"), None);
        assert_eq!(parse_probability("1e-3"), Some(0.001));
        assert_eq!(parse_probability("+0.4"), Some(0.4));
        assert_eq!(parse_probability("about 2.5e-1"), Some(0.25));
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let script = || {
            vec![
                Err(unavailable()),
                Err(unavailable()),
                Ok("0.8".to_string()),
            ]
        };

        let model = Arc::new(ScriptedJudge::new(script()));
        let client = JudgeClient::new(model.clone(), fast_policy());
        let started = std::time::Instant::now();
        let verdict = client.assess(JudgeContent::Text("hello")).await;
        assert_eq!(verdict, JudgeVerdict::Scored { score: 0.8, attempts: 3 });
        assert_eq!(model.calls(), 3);
        // Two backoffs of at least 2 units each.
        assert!(started.elapsed() >= Duration::from_millis(4));

        // The backoffs themselves, observed through the shared policy.
        let model = Arc::new(ScriptedJudge::new(script()));
        let outcome = fast_policy()
            .run("judge test", |_| {
                let m = model.clone();
                async move { m.ask("x", None).await }
            })
            .await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.backoffs.len(), 2);
        for b in &outcome.backoffs {
            assert!(*b >= Duration::from_millis(2) && *b <= Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_non_transient_failure_returns_neutral_immediately() {
        let model = Arc::new(ScriptedJudge::new(vec![
            Err(ProviderError::ApiError {
                status: 400,
                message: "API key not valid".to_string(),
            }),
            Ok("0.9".to_string()),
        ]));
        let client = JudgeClient::new(model.clone(), fast_policy());
        let verdict = client.assess(JudgeContent::Text("hello")).await;
        assert_eq!(verdict.attempts(), 1);
        assert!(matches!(
            verdict,
            JudgeVerdict::Degraded { failure: JudgeFailure::Rejected(_), .. }
        ));
        let sample = verdict.into_sample();
        assert_eq!(sample.value, 0.5);
        assert!(sample.fallback);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_neutral() {
        let model = Arc::new(ScriptedJudge::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok("0.9".to_string()),
        ]));
        let client = JudgeClient::new(model.clone(), fast_policy());
        let sample = client.judge(JudgeContent::Text("hello")).await;
        assert_eq!(sample.value, 0.5);
        assert!(sample.fallback);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_not_retried() {
        let model = Arc::new(ScriptedJudge::new(vec![Ok("definitely AI".to_string())]));
        let client = JudgeClient::new(model.clone(), fast_policy());
        let verdict = client.assess(JudgeContent::Text("hello")).await;
        assert!(matches!(
            verdict,
            JudgeVerdict::Degraded { failure: JudgeFailure::Unparseable(_), attempts: 1 }
        ));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_image_prompt_carries_image() {
        let model = Arc::new(ScriptedJudge::always("0.3"));
        let client = JudgeClient::new(model.clone(), fast_policy());
        let img = ImageInput {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".to_string(),
            origin: "mem".to_string(),
        };
        let sample = client.judge(JudgeContent::Image(&img)).await;
        assert_eq!(sample.value, 0.3);
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].0.starts_with("Rate from 0 to 1"));
        assert!(prompts[0].1);
    }

    #[tokio::test]
    async fn test_write_prose_single_attempt() {
        let model = Arc::new(ScriptedJudge::new(vec![Err(unavailable())]));
        let client = JudgeClient::new(model.clone(), fast_policy());
        assert_eq!(client.write_prose("explain", None).await, None);
        assert_eq!(model.calls(), 1);

        let model = Arc::new(ScriptedJudge::always("  Looks generated.  "));
        let client = JudgeClient::new(model, fast_policy());
        assert_eq!(
            client.write_prose("explain", None).await.as_deref(),
            Some("Looks generated.")
        );
    }
}
