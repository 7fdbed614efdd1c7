// Fusion Engine
// Fixed per-modality weights combining signal samples into one final score.
// Inputs are trusted to already lie in [0, 1]; nothing is re-clipped here.

use crate::models::{Modality, ScoreSample, SignalSource};

/// Strict threshold: a final score of exactly 0.5 is not classified as AI.
pub const AI_THRESHOLD: f64 = 0.5;

pub const TEXT_WEIGHTS: [(SignalSource, f64); 3] = [
    (SignalSource::Classifier, 0.60),
    (SignalSource::Judge, 0.25),
    (SignalSource::Heuristic, 0.15),
];

pub const IMAGE_WEIGHTS: [(SignalSource, f64); 2] = [
    (SignalSource::Classifier, 0.30),
    (SignalSource::Judge, 0.70),
];

pub fn is_ai(final_score: f64) -> bool {
    final_score > AI_THRESHOLD
}

/// Component weights for a modality. Video has none: it averages frame finals.
pub fn weights_for(modality: Modality) -> &'static [(SignalSource, f64)] {
    match modality {
        Modality::Text => &TEXT_WEIGHTS,
        Modality::Image => &IMAGE_WEIGHTS,
        Modality::Video => &[],
    }
}

pub fn fuse_text(classifier: &ScoreSample, judge: &ScoreSample, heuristic: &ScoreSample) -> f64 {
    TEXT_WEIGHTS[0].1 * classifier.value
        + TEXT_WEIGHTS[1].1 * judge.value
        + TEXT_WEIGHTS[2].1 * heuristic.value
}

pub fn fuse_image(classifier: &ScoreSample, judge: &ScoreSample) -> f64 {
    IMAGE_WEIGHTS[0].1 * classifier.value + IMAGE_WEIGHTS[1].1 * judge.value
}

/// Unweighted mean of per-frame final scores; 0.0 for no frames.
pub fn fuse_frames(frame_scores: &[f64]) -> f64 {
    if frame_scores.is_empty() {
        return 0.0;
    }
    frame_scores.iter().sum::<f64>() / frame_scores.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: SignalSource, v: f64) -> ScoreSample {
        ScoreSample::new(source, v)
    }

    #[test]
    fn test_weights_sum_to_one() {
        for modality in [Modality::Text, Modality::Image] {
            let total: f64 = weights_for(modality).iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-12, "{:?}", modality);
        }
    }

    #[test]
    fn test_text_fusion_example() {
        let score = fuse_text(
            &sample(SignalSource::Classifier, 0.9),
            &sample(SignalSource::Judge, 0.1),
            &sample(SignalSource::Heuristic, 0.0),
        );
        assert!((score - 0.565).abs() < 1e-12);
        assert!(is_ai(score));
    }

    #[test]
    fn test_image_fusion() {
        let score = fuse_image(
            &sample(SignalSource::Classifier, 0.2),
            &sample(SignalSource::Judge, 0.9),
        );
        assert!((score - 0.69).abs() < 1e-12);
    }

    #[test]
    fn test_fused_score_stays_in_unit_range() {
        let grid = [0.0, 0.13, 0.5, 0.77, 1.0];
        for &c in &grid {
            for &j in &grid {
                for &h in &grid {
                    let t = fuse_text(
                        &sample(SignalSource::Classifier, c),
                        &sample(SignalSource::Judge, j),
                        &sample(SignalSource::Heuristic, h),
                    );
                    assert!((0.0..=1.0 + 1e-12).contains(&t));
                }
                let i = fuse_image(&sample(SignalSource::Classifier, c), &sample(SignalSource::Judge, j));
                assert!((0.0..=1.0 + 1e-12).contains(&i));
            }
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_ai(0.5));
        assert!(is_ai(0.5000001));
        assert!(!is_ai(0.0));
    }

    #[test]
    fn test_frame_mean() {
        let score = fuse_frames(&[0.2, 0.8, 0.9]);
        assert!((score - 0.6333333333).abs() < 1e-9);
        assert!(is_ai(score));
        assert_eq!(fuse_frames(&[]), 0.0);
    }
}
