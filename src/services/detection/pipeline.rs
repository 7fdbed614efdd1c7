// Detection Pipeline
// Runs the signal providers for one input, fuses them and attaches reasoning.
// Video runs the image pipeline over sampled frames and aggregates.

use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{
    ComponentScores, DetectionResult, FrameDetail, ImageInput, Modality, ScoreSample,
    SignalSource, VideoDetection,
};
use crate::services::article_extractor::extract_text_from_url;
use crate::services::classifiers::{http_classifiers, ClassifierError, ImageClassifier, TextClassifier};
use crate::services::config_store::{AppConfig, VideoConfig};
use crate::services::frames::{FfmpegFrameExtractor, FrameError, FrameExtractor};
use crate::services::media::{is_url, load_image, read_image_file, MediaError};
use crate::services::providers::{build_http_client, get_api_key, GeminiClient, ProviderError};
use crate::services::text_processor::{analyze_text_features, heuristic_score};

use super::aggregation::{aggregate_frames, build_digest};
use super::fusion::{fuse_image, fuse_text};
use super::judge::{JudgeClient, JudgeContent};
use super::reasoning::ReasoningSynthesizer;
use super::retry::RetryPolicy;

pub const NO_FRAMES_MESSAGE: &str = "Could not extract frames from video.";
pub const NO_FRAME_RESULTS_MESSAGE: &str = "Could not analyze any extracted frames.";
const FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("No text to analyze")]
    EmptyText,
    #[error("Could not extract text from {0}")]
    NoArticleText(String),
    #[error("Classifier failed: {0}")]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Frames(#[from] FrameError),
    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy)]
pub struct VideoSettings {
    pub frame_stride: usize,
    pub max_frames: usize,
    /// Frames analyzed at once; 1 is sequential.
    pub frame_concurrency: usize,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            frame_stride: 30,
            max_frames: 15,
            frame_concurrency: 1,
        }
    }
}

impl From<&VideoConfig> for VideoSettings {
    fn from(config: &VideoConfig) -> Self {
        Self {
            frame_stride: config.frame_stride.max(1),
            max_frames: config.max_frames,
            frame_concurrency: config.frame_concurrency.max(1),
        }
    }
}

/// Shared, read-only detection entry point. Cheap to clone.
#[derive(Clone)]
pub struct Detector {
    text_classifier: Arc<dyn TextClassifier>,
    image_classifier: Arc<dyn ImageClassifier>,
    judge: JudgeClient,
    reasoning: ReasoningSynthesizer,
    frames: Arc<dyn FrameExtractor>,
    video: VideoSettings,
    http: Client,
}

impl Detector {
    pub fn new(
        text_classifier: Arc<dyn TextClassifier>,
        image_classifier: Arc<dyn ImageClassifier>,
        judge: JudgeClient,
        frames: Arc<dyn FrameExtractor>,
        video: VideoSettings,
        http: Client,
    ) -> Self {
        Self {
            text_classifier,
            image_classifier,
            reasoning: ReasoningSynthesizer::new(judge.clone()),
            judge,
            frames,
            video,
            http,
        }
    }

    /// Wire the HTTP classifiers, the Gemini judge and ffmpeg from config.
    pub fn from_config(config: &AppConfig) -> Result<Self, DetectError> {
        let proxy = config.proxy.as_ref();
        let gemini = GeminiClient::from_config(&config.judge, proxy)?;
        let judge = JudgeClient::new(Arc::new(gemini), RetryPolicy::from_config(&config.retry));
        let (text, image) =
            http_classifiers(&config.classifiers, proxy, get_api_key("classifier"))?;
        let extractor = FfmpegFrameExtractor::new(
            config.video.ffmpeg_path.clone(),
            config.video.scratch_dir.clone(),
        );
        let http = build_http_client(proxy, FETCH_TIMEOUT_SECS)?;

        info!(
            "[DETECT] detector ready: judge={} text_endpoint={} image_endpoint={}",
            judge.model_name(),
            config.classifiers.text_endpoint,
            config.classifiers.image_endpoint
        );

        Ok(Self::new(
            Arc::new(text),
            Arc::new(image),
            judge,
            Arc::new(extractor),
            VideoSettings::from(&config.video),
            http,
        ))
    }

    // ============ Text ============

    /// Analyze raw text. Never fails; input problems yield a placeholder with `error` set.
    pub async fn analyze_text(&self, text: &str) -> DetectionResult {
        match self.try_analyze_text(text).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[DETECT] text analysis failed: {}", e);
                DetectionResult::placeholder(Modality::Text, format!("Error analyzing text: {}", e))
            }
        }
    }

    /// Analyze text, or the paragraph text of the page when the input is a URL.
    pub async fn analyze_text_source(&self, input: &str) -> DetectionResult {
        let input = input.trim();
        if !is_url(input) {
            return self.analyze_text(input).await;
        }
        match extract_text_from_url(&self.http, input).await {
            Some(text) if !text.trim().is_empty() => self.analyze_text(&text).await,
            _ => {
                let e = DetectError::NoArticleText(input.to_string());
                warn!("[DETECT] {}", e);
                DetectionResult::placeholder(Modality::Text, e.to_string())
            }
        }
    }

    pub async fn try_analyze_text(&self, text: &str) -> Result<DetectionResult, DetectError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DetectError::EmptyText);
        }
        let started = Instant::now();

        let (classifier, judge) = tokio::join!(
            self.text_classifier.classify_text(text),
            self.judge.judge(JudgeContent::Text(text))
        );
        let classifier = ScoreSample::new(SignalSource::Classifier, classifier?);
        let features = analyze_text_features(text);
        let heuristic = ScoreSample::new(SignalSource::Heuristic, heuristic_score(&features));

        let final_score = fuse_text(&classifier, &judge, &heuristic);
        let components = ComponentScores::from([
            (SignalSource::Classifier, classifier),
            (SignalSource::Judge, judge),
            (SignalSource::Heuristic, heuristic),
        ]);
        let reasoning = self.reasoning.explain_text(text, &components, final_score).await;

        info!(
            "[DETECT] text: words={} classifier={:.3} judge={:.3}{} heuristic={:.3} final={:.3} elapsed_ms={}",
            features.word_count,
            classifier.value,
            judge.value,
            if judge.fallback { " (fallback)" } else { "" },
            heuristic.value,
            final_score,
            started.elapsed().as_millis()
        );
        Ok(DetectionResult::new(Modality::Text, final_score, components, reasoning))
    }

    // ============ Image ============

    pub async fn analyze_image(&self, image: &ImageInput) -> DetectionResult {
        match self.try_analyze_image(image).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[DETECT] image analysis failed for {}: {}", image.origin, e);
                DetectionResult::placeholder(Modality::Image, format!("Error analyzing image: {}", e))
            }
        }
    }

    /// Load from a local path or http(s) URL, then analyze.
    pub async fn analyze_image_source(&self, source: &str) -> DetectionResult {
        match load_image(&self.http, source).await {
            Ok(image) => self.analyze_image(&image).await,
            Err(e) => {
                warn!("[DETECT] could not load image {}: {}", source, e);
                DetectionResult::placeholder(Modality::Image, format!("Error analyzing image: {}", e))
            }
        }
    }

    pub async fn try_analyze_image(&self, image: &ImageInput) -> Result<DetectionResult, DetectError> {
        let (classifier, judge) = tokio::join!(
            self.image_classifier.classify_image(image),
            self.judge.judge(JudgeContent::Image(image))
        );
        let classifier = ScoreSample::new(SignalSource::Classifier, classifier?);

        let final_score = fuse_image(&classifier, &judge);
        let components = ComponentScores::from([
            (SignalSource::Classifier, classifier),
            (SignalSource::Judge, judge),
        ]);
        let reasoning = self.reasoning.explain_image(image, &components, final_score).await;

        info!(
            "[DETECT] image {}: classifier={:.3} judge={:.3}{} final={:.3}",
            image.origin,
            classifier.value,
            judge.value,
            if judge.fallback { " (fallback)" } else { "" },
            final_score
        );
        Ok(DetectionResult::new(Modality::Image, final_score, components, reasoning))
    }

    async fn analyze_frame(&self, path: &Path) -> Result<DetectionResult, DetectError> {
        let image = read_image_file(path).await?;
        self.try_analyze_image(&image).await
    }

    // ============ Video ============

    /// Sample frames, run the image pipeline on each and average the finals.
    /// Frame files are removed before this returns, on every path.
    pub async fn analyze_video(&self, video: &Path) -> VideoDetection {
        let started = Instant::now();
        let extracted = match self
            .frames
            .extract_frames(video, self.video.frame_stride, self.video.max_frames)
            .await
        {
            Ok(frames) => frames,
            Err(e) => {
                warn!("[DETECT] frame extraction failed for {}: {}", video.display(), e);
                return VideoDetection::empty(format!("{} {}", NO_FRAMES_MESSAGE, e), 0);
            }
        };

        if extracted.is_empty() {
            warn!("[DETECT] no frames extracted from {}", video.display());
            return VideoDetection::empty(NO_FRAMES_MESSAGE, 0);
        }

        let frames_extracted = extracted.len();
        let paths = extracted.frames().to_vec();
        let frames = if self.video.frame_concurrency > 1 {
            self.analyze_frames_concurrently(paths).await
        } else {
            self.analyze_frames_sequentially(&paths).await
        };

        if let Err(e) = extracted.close() {
            warn!("[DETECT] failed to remove frame directory: {}", e);
        }

        if frames.is_empty() {
            return VideoDetection::empty(NO_FRAME_RESULTS_MESSAGE, frames_extracted);
        }

        let aggregate = aggregate_frames(&frames);
        let digest = build_digest(&frames, &aggregate);
        let reasoning = self.reasoning.explain_video(&digest).await;

        let judge = match aggregate.judge_mean {
            Some(mean) => ScoreSample::new(SignalSource::Judge, mean),
            None => ScoreSample::neutral(SignalSource::Judge),
        };
        let components = ComponentScores::from([
            (
                SignalSource::FrameAggregate,
                ScoreSample::new(SignalSource::FrameAggregate, aggregate.final_score),
            ),
            (SignalSource::Judge, judge),
        ]);

        info!(
            "[DETECT] video {}: frames={}/{} high={} final={:.3} elapsed_ms={}",
            video.display(),
            aggregate.total,
            frames_extracted,
            aggregate.high_scoring,
            aggregate.final_score,
            started.elapsed().as_millis()
        );

        VideoDetection {
            result: DetectionResult::new(Modality::Video, aggregate.final_score, components, reasoning),
            frames,
            frames_extracted,
            high_scoring_frames: aggregate.high_scoring,
        }
    }

    async fn analyze_frames_sequentially(&self, paths: &[PathBuf]) -> Vec<FrameDetail> {
        let mut frames = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            info!("[DETECT] analyzing frame {}/{}", index + 1, paths.len());
            match self.analyze_frame(path).await {
                Ok(result) => frames.push(FrameDetail { frame_index: index, result }),
                Err(e) => warn!("[DETECT] frame {} skipped: {}", index, e),
            }
        }
        frames
    }

    async fn analyze_frames_concurrently(&self, paths: Vec<PathBuf>) -> Vec<FrameDetail> {
        let total = paths.len();
        let semaphore = Arc::new(Semaphore::new(self.video.frame_concurrency));
        let mut join_set: JoinSet<(usize, Result<DetectionResult, DetectError>)> = JoinSet::new();

        for (index, path) in paths.into_iter().enumerate() {
            let detector = self.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, detector.analyze_frame(&path).await)
            });
        }

        let mut frames = Vec::with_capacity(total);
        let mut done = 0;
        while let Some(res) = join_set.join_next().await {
            done += 1;
            match res {
                Ok((index, Ok(result))) => frames.push(FrameDetail { frame_index: index, result }),
                Ok((index, Err(e))) => warn!("[DETECT] frame {} skipped: {}", index, e),
                Err(e) => warn!("[DETECT] frame task failed: {}", e),
            }
            info!("[DETECT] frame progress: {}/{}", done, total);
        }

        // Extraction order, regardless of completion order.
        frames.sort_by_key(|f| f.frame_index);
        frames
    }
}
