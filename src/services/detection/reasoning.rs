// Reasoning Synthesizer
// Judge-written prose in front of a deterministic component summary.
// The summary alone is returned whenever the judge cannot write the prose.

use crate::models::{ComponentScores, ImageInput, Modality, SignalSource};
use super::aggregation::VideoDigest;
use super::fusion::{is_ai, weights_for};
use super::judge::JudgeClient;

pub const SUMMARY_SEPARATOR: &str = "\n\nComponent summary: ";

const TEXT_REASONING_PROMPT: &str = "Write a short (2-3 sentence) plain-language explanation of whether the following text \
is AI-generated or human-written and why. Mention concrete signals (style, repetition, phrasing, \
or other features) that support the conclusion. Be factual and non-judgmental.\n\nText:\n";

const IMAGE_REASONING_PROMPT: &str = "Write a short (1-3 sentence) plain-language explanation of whether the following image \
is AI-generated or likely real, and list concrete visual signals that support the conclusion.\n\n";

fn component_label(modality: Modality, source: SignalSource) -> &'static str {
    match (modality, source) {
        (Modality::Text, SignalSource::Classifier) => "Text classifier",
        (Modality::Image, SignalSource::Classifier) => "CLIP-derived AI likelihood",
        (_, SignalSource::Judge) => "Judge model",
        (_, SignalSource::Heuristic) => "Heuristic signals",
        (_, SignalSource::Classifier) => "Classifier",
        (_, SignalSource::FrameAggregate) => "Frame average",
    }
}

fn percent(v: f64) -> f64 {
    v * 100.0
}

/// One line per weighted component, then the verdict line.
pub fn fallback_summary(modality: Modality, components: &ComponentScores, final_score: f64) -> String {
    let mut lines: Vec<String> = weights_for(modality)
        .iter()
        .map(|(source, weight)| {
            let sample = components.get(source);
            let value = sample.map(|s| s.value).unwrap_or(0.0);
            let note = if sample.map_or(false, |s| s.fallback) {
                ", neutral default"
            } else {
                ""
            };
            format!(
                "{}: {:.2}% (weight {:.0}%{}).",
                component_label(modality, *source),
                percent(value),
                percent(*weight),
                note
            )
        })
        .collect();
    lines.push(format!(
        "Combined final score: {:.2}% - {}.",
        percent(final_score),
        modality.verdict_label(is_ai(final_score))
    ));
    lines.join("\n")
}

pub fn video_fallback_summary(digest: &VideoDigest) -> String {
    format!(
        "Analyzed {} frames. {} frames ({:.1}%) show strong AI indicators. \
Average AI-likelihood across frames: {:.2}%. Examples: {}",
        digest.total,
        digest.high_scoring,
        digest.high_scoring_pct(),
        percent(digest.average),
        digest.example_lines().join("; ")
    )
}

pub fn text_reasoning_prompt(text: &str) -> String {
    format!("{}{}\n\nAnswer:", TEXT_REASONING_PROMPT, text)
}

pub fn video_reasoning_prompt(digest: &VideoDigest) -> String {
    let mut prompt = String::from(
        "You are given per-frame AI-likelihood scores and short notes extracted from a video. \n",
    );
    prompt.push_str(&format!(
        "Total frames: {}. Average score: {:.2}%.\n",
        digest.total,
        percent(digest.average)
    ));
    prompt.push_str("Per-frame top examples:\n");
    for line in digest.example_lines() {
        prompt.push_str(&line);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nWrite a concise (2-3 sentence) explanation of whether the video is likely AI-generated \
or a deepfake, using the frame evidence. Mention the most important signals.",
    );
    prompt
}

pub fn compose(prose: Option<String>, fallback: String) -> String {
    match prose {
        Some(p) => format!("{}{}{}", p, SUMMARY_SEPARATOR, fallback),
        None => fallback,
    }
}

/// Writes explanations with a single judge call each; never retries.
#[derive(Clone)]
pub struct ReasoningSynthesizer {
    judge: JudgeClient,
}

impl ReasoningSynthesizer {
    pub fn new(judge: JudgeClient) -> Self {
        Self { judge }
    }

    pub async fn explain_text(&self, text: &str, components: &ComponentScores, final_score: f64) -> String {
        let fallback = fallback_summary(Modality::Text, components, final_score);
        let prose = self.judge.write_prose(&text_reasoning_prompt(text), None).await;
        compose(prose, fallback)
    }

    pub async fn explain_image(
        &self,
        image: &ImageInput,
        components: &ComponentScores,
        final_score: f64,
    ) -> String {
        let fallback = fallback_summary(Modality::Image, components, final_score);
        let prose = self.judge.write_prose(IMAGE_REASONING_PROMPT, Some(image)).await;
        compose(prose, fallback)
    }

    /// Video prose is written from the digest only; frames are never re-sent.
    pub async fn explain_video(&self, digest: &VideoDigest) -> String {
        let fallback = video_fallback_summary(digest);
        let prose = self.judge.write_prose(&video_reasoning_prompt(digest), None).await;
        compose(prose, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::aggregation::DigestEntry;
    use super::super::judge::tests::{fast_policy, unavailable, ScriptedJudge};
    use crate::models::ScoreSample;
    use std::sync::Arc;

    fn text_components() -> ComponentScores {
        let mut c = ComponentScores::new();
        c.insert(SignalSource::Classifier, ScoreSample::new(SignalSource::Classifier, 0.9));
        c.insert(SignalSource::Judge, ScoreSample::new(SignalSource::Judge, 0.1));
        c.insert(SignalSource::Heuristic, ScoreSample::new(SignalSource::Heuristic, 0.0));
        c
    }

    fn digest() -> VideoDigest {
        VideoDigest {
            total: 3,
            high_scoring: 2,
            average: 0.6333,
            top: vec![
                DigestEntry { frame_number: 3, score: 0.9, note: "smooth skin".to_string() },
                DigestEntry { frame_number: 2, score: 0.8, note: "warped hands".to_string() },
                DigestEntry { frame_number: 1, score: 0.2, note: "grainy".to_string() },
            ],
        }
    }

    #[test]
    fn test_text_fallback_is_three_components_and_verdict() {
        let summary = fallback_summary(Modality::Text, &text_components(), 0.565);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Text classifier: 90.00% (weight 60%).",
                "Judge model: 10.00% (weight 25%).",
                "Heuristic signals: 0.00% (weight 15%).",
                "Combined final score: 56.50% - likely AI-generated.",
            ]
        );
    }

    #[test]
    fn test_image_fallback_uses_real_label_and_notes_neutral_judge() {
        let mut c = ComponentScores::new();
        c.insert(SignalSource::Classifier, ScoreSample::new(SignalSource::Classifier, 0.2));
        c.insert(SignalSource::Judge, ScoreSample::neutral(SignalSource::Judge));
        let summary = fallback_summary(Modality::Image, &c, 0.41);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Judge model: 50.00% (weight 70%, neutral default).");
        assert_eq!(lines[2], "Combined final score: 41.00% - likely real.");
    }

    #[test]
    fn test_text_verdict_human() {
        let summary = fallback_summary(Modality::Text, &text_components(), 0.5);
        assert!(summary.ends_with("Combined final score: 50.00% - appears human-written."));
    }

    #[test]
    fn test_video_summary_and_prompt() {
        let d = digest();
        let summary = video_fallback_summary(&d);
        assert!(summary.starts_with("Analyzed 3 frames. 2 frames (66.7%) show strong AI indicators."));
        assert!(summary.contains("Average AI-likelihood across frames: 63.33%."));
        assert!(summary.ends_with("frame 3: 90.0% - smooth skin; frame 2: 80.0% - warped hands; frame 1: 20.0% - grainy"));

        let prompt = video_reasoning_prompt(&d);
        assert!(prompt.contains("Total frames: 3. Average score: 63.33%."));
        assert!(prompt.contains("frame 2: 80.0% - warped hands\n"));
    }

    #[tokio::test]
    async fn test_prose_is_prepended_to_summary() {
        let model = Arc::new(ScriptedJudge::always("Uniform phrasing throughout."));
        let synth = ReasoningSynthesizer::new(JudgeClient::new(model.clone(), fast_policy()));
        let reasoning = synth.explain_text("some text", &text_components(), 0.565).await;
        assert!(reasoning.starts_with("Uniform phrasing throughout.\n\nComponent summary: Text classifier: 90.00%"));
        assert!(model.prompts.lock().unwrap()[0].0.contains("Text:\nsome text"));
    }

    #[tokio::test]
    async fn test_judge_failure_leaves_summary_only() {
        let model = Arc::new(ScriptedJudge::new(vec![Err(unavailable())]));
        let synth = ReasoningSynthesizer::new(JudgeClient::new(model.clone(), fast_policy()));
        let reasoning = synth.explain_video(&digest()).await;
        assert_eq!(reasoning, video_fallback_summary(&digest()));
        assert_eq!(model.calls(), 1);
        assert!(!model.prompts.lock().unwrap()[0].1);
    }
}
