// Detection Module
// Multi-signal detection core organized into specialized submodules:
// - retry: bounded retry policy shared by every judge call site
// - judge: judge model scoring with neutral fallback
// - fusion: fixed per-modality weights and the AI threshold
// - reasoning: judge prose plus a deterministic component summary
// - aggregation: per-frame aggregation and the video digest
// - pipeline: text, image and video entry points

pub mod retry;
pub mod judge;
pub mod fusion;
pub mod reasoning;
pub mod aggregation;
pub mod pipeline;

// Re-export commonly used items
pub use retry::{RetryFailure, RetryOutcome, RetryPolicy, Retryable};
pub use judge::{parse_probability, JudgeClient, JudgeContent, JudgeFailure, JudgeVerdict};
pub use fusion::{fuse_frames, fuse_image, fuse_text, is_ai, weights_for, AI_THRESHOLD};
pub use reasoning::{compose, fallback_summary, video_fallback_summary, ReasoningSynthesizer};
pub use aggregation::{aggregate_frames, build_digest, VideoAggregate, VideoDigest};
pub use pipeline::{DetectError, Detector, VideoSettings};
