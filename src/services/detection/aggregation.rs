// Aggregation Logic
// Aggregates per-frame image results into the video verdict and its digest

use crate::models::{FrameDetail, SignalSource};
use super::fusion::{fuse_frames, is_ai};

/// Frames quoted in the digest.
pub const DIGEST_TOP_FRAMES: usize = 3;
/// Per-frame note length in the digest, in characters.
pub const DIGEST_NOTE_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAggregate {
    pub final_score: f64,
    /// Mean judge score over frames where the judge actually answered.
    pub judge_mean: Option<f64>,
    pub high_scoring: usize,
    pub total: usize,
}

/// Mean of frame finals, plus the judge summary and the count of frames over 0.5.
pub fn aggregate_frames(frames: &[FrameDetail]) -> VideoAggregate {
    let finals: Vec<f64> = frames.iter().map(|f| f.result.final_score).collect();

    let judged: Vec<f64> = frames
        .iter()
        .filter_map(|f| f.result.component(SignalSource::Judge))
        .filter(|s| !s.fallback)
        .map(|s| s.value)
        .collect();
    let judge_mean = if judged.is_empty() {
        None
    } else {
        Some(judged.iter().sum::<f64>() / judged.len() as f64)
    };

    VideoAggregate {
        final_score: fuse_frames(&finals),
        judge_mean,
        high_scoring: finals.iter().filter(|s| is_ai(**s)).count(),
        total: finals.len(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    /// 1-based, as shown to readers.
    pub frame_number: usize,
    pub score: f64,
    pub note: String,
}

/// Compact summary of a video's frames; the only thing the judge sees
/// when explaining a video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDigest {
    pub total: usize,
    pub high_scoring: usize,
    pub average: f64,
    pub top: Vec<DigestEntry>,
}

impl VideoDigest {
    pub fn high_scoring_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.high_scoring as f64 / self.total as f64 * 100.0
        }
    }

    /// `frame N: S% - note` lines for the top frames.
    pub fn example_lines(&self) -> Vec<String> {
        self.top
            .iter()
            .map(|e| format!("frame {}: {:.1}% - {}", e.frame_number, e.score * 100.0, e.note))
            .collect()
    }
}

pub fn build_digest(frames: &[FrameDetail], aggregate: &VideoAggregate) -> VideoDigest {
    let mut ranked: Vec<&FrameDetail> = frames.iter().collect();
    // Stable sort keeps extraction order among equal scores.
    ranked.sort_by(|a, b| {
        b.result
            .final_score
            .partial_cmp(&a.result.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top = ranked
        .into_iter()
        .take(DIGEST_TOP_FRAMES)
        .map(|f| DigestEntry {
            frame_number: f.frame_index + 1,
            score: f.result.final_score,
            note: f.result.reasoning.chars().take(DIGEST_NOTE_CHARS).collect(),
        })
        .collect();

    VideoDigest {
        total: aggregate.total,
        high_scoring: aggregate.high_scoring,
        average: aggregate.final_score,
        top,
    }
}
