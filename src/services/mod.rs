// TruthLens Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod classifiers;
pub mod media;
pub mod frames;
pub mod article_extractor;
pub mod detection;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;

pub use classifiers::{ClassifierError, HttpImageClassifier, HttpTextClassifier, ImageClassifier, TextClassifier};
pub use media::{is_url, load_image, read_image_file, MediaError};
pub use frames::{ExtractedFrames, FfmpegFrameExtractor, FrameError, FrameExtractor};
pub use article_extractor::extract_text_from_url;

// Re-export detection entry points
pub use detection::{DetectError, Detector, JudgeClient, RetryPolicy, VideoSettings};
