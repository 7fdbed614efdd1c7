// TruthLens Data Models
// Typed results shared by the detection core, the web layer and the CLI

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::detection::fusion::is_ai;

// ============ Signals ============

/// Where a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Classifier,
    Judge,
    Heuristic,
    FrameAggregate,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Judge => "judge",
            Self::Heuristic => "heuristic",
            Self::FrameAggregate => "frame_aggregate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
}

impl Modality {
    /// Verdict label used in summaries when the score is at or below the threshold.
    pub fn negative_label(&self) -> &'static str {
        match self {
            Self::Text => "appears human-written",
            Self::Image | Self::Video => "likely real",
        }
    }

    pub fn verdict_label(&self, ai: bool) -> &'static str {
        if ai {
            "likely AI-generated"
        } else {
            self.negative_label()
        }
    }
}

/// A single probability estimate from one provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSample {
    pub value: f64,
    pub source: SignalSource,
    /// True when the value is the neutral default standing in for an unavailable signal.
    #[serde(default)]
    pub fallback: bool,
}

impl ScoreSample {
    pub const NEUTRAL: f64 = 0.5;

    /// Build a sample, clipping the value into [0, 1]. NaN collapses to 0.
    pub fn new(source: SignalSource, value: f64) -> Self {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        Self {
            value,
            source,
            fallback: false,
        }
    }

    pub fn neutral(source: SignalSource) -> Self {
        Self {
            value: Self::NEUTRAL,
            source,
            fallback: true,
        }
    }
}

pub type ComponentScores = BTreeMap<SignalSource, ScoreSample>;

// ============ Detection Result ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub modality: Modality,
    pub final_score: f64,
    pub component_scores: ComponentScores,
    pub reasoning: String,
    pub is_ai: bool,
    /// Set when the input could not be analyzed; the scores are then a zero placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn new(
        modality: Modality,
        final_score: f64,
        component_scores: ComponentScores,
        reasoning: String,
    ) -> Self {
        Self {
            modality,
            final_score,
            component_scores,
            reasoning,
            is_ai: is_ai(final_score),
            error: None,
        }
    }

    /// Zero-confidence result for an input that could not be analyzed.
    pub fn placeholder(modality: Modality, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            modality,
            final_score: 0.0,
            component_scores: ComponentScores::new(),
            reasoning: message.clone(),
            is_ai: false,
            error: Some(message),
        }
    }

    pub fn component(&self, source: SignalSource) -> Option<&ScoreSample> {
        self.component_scores.get(&source)
    }

    pub fn component_value(&self, source: SignalSource) -> f64 {
        self.component(source).map(|s| s.value).unwrap_or(0.0)
    }

    pub fn verdict_label(&self) -> &'static str {
        self.modality.verdict_label(self.is_ai)
    }
}

// ============ Video ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDetail {
    /// 0-based position in extraction order.
    pub frame_index: usize,
    pub result: DetectionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetection {
    pub result: DetectionResult,
    pub frames: Vec<FrameDetail>,
    pub frames_extracted: usize,
    pub high_scoring_frames: usize,
}

impl VideoDetection {
    /// Terminal result when no frame could be extracted or analyzed.
    pub fn empty(message: impl Into<String>, frames_extracted: usize) -> Self {
        Self {
            result: DetectionResult::placeholder(Modality::Video, message),
            frames: Vec::new(),
            frames_extracted,
            high_scoring_frames: 0,
        }
    }
}

// ============ Media Input ============

/// Raw image bytes with the detected MIME type.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Path or URL the bytes were read from (for logging only).
    pub origin: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_sample_clips_into_unit_range() {
        assert_eq!(ScoreSample::new(SignalSource::Judge, 1.7).value, 1.0);
        assert_eq!(ScoreSample::new(SignalSource::Judge, -0.2).value, 0.0);
        assert_eq!(ScoreSample::new(SignalSource::Judge, f64::NAN).value, 0.0);
        assert!(!ScoreSample::new(SignalSource::Judge, 0.3).fallback);
    }

    #[test]
    fn test_neutral_sample_is_marked_fallback() {
        let s = ScoreSample::neutral(SignalSource::Judge);
        assert_eq!(s.value, 0.5);
        assert!(s.fallback);
    }

    #[test]
    fn test_result_boundary_is_not_ai() {
        let r = DetectionResult::new(Modality::Image, 0.5, ComponentScores::new(), String::new());
        assert!(!r.is_ai);
        assert_eq!(r.verdict_label(), "likely real");
    }

    #[test]
    fn test_placeholder_is_zero_confidence() {
        let r = DetectionResult::placeholder(Modality::Text, "empty input");
        assert_eq!(r.final_score, 0.0);
        assert!(!r.is_ai);
        assert_eq!(r.error.as_deref(), Some("empty input"));
        assert_eq!(r.reasoning, "empty input");
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let mut scores = ComponentScores::new();
        scores.insert(SignalSource::Judge, ScoreSample::new(SignalSource::Judge, 0.9));
        let r = DetectionResult::new(Modality::Text, 0.9, scores, "ok".to_string());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["finalScore"], 0.9);
        assert_eq!(json["isAi"], true);
        assert_eq!(json["componentScores"]["judge"]["value"], 0.9);
        assert!(json.get("error").is_none());
    }
}
