// Video Frame Extraction
// Samples every Nth decoded frame into a scoped temporary directory via ffmpeg.
// The directory (and every frame in it) is removed when `ExtractedFrames` drops.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Video not found: {0}")]
    NotFound(String),
    #[error("Decoder failed: {0}")]
    Decoder(String),
}

/// Transient frame files owned by a temporary directory.
#[derive(Debug)]
pub struct ExtractedFrames {
    dir: TempDir,
    frames: Vec<PathBuf>,
}

impl ExtractedFrames {
    pub fn new(dir: TempDir, frames: Vec<PathBuf>) -> Self {
        Self { dir, frames }
    }

    /// Collect `frame_<n>.jpg` files already written into `dir`, ordered by `n`.
    pub fn collect(dir: TempDir, max_frames: usize) -> Result<Self, FrameError> {
        let mut indexed: Vec<(usize, PathBuf)> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| frame_number(&p).map(|n| (n, p)))
            .collect();
        indexed.sort_by_key(|(n, _)| *n);
        let frames = indexed
            .into_iter()
            .take(max_frames)
            .map(|(_, p)| p)
            .collect();
        Ok(Self { dir, frames })
    }

    pub fn frames(&self) -> &[PathBuf] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Remove the frame directory now, reporting any error.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// `n` from a `frame_<n>.jpg` file name.
fn frame_number(path: &Path) -> Option<usize> {
    path.file_name()?
        .to_str()?
        .strip_prefix("frame_")?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Keep every `stride`-th decoded frame, at most `max_frames`, in decode order.
    /// A decode failure part-way through yields the frames written so far.
    async fn extract_frames(
        &self,
        video: &Path,
        stride: usize,
        max_frames: usize,
    ) -> Result<ExtractedFrames, FrameError>;
}

pub struct FfmpegFrameExtractor {
    ffmpeg_path: PathBuf,
    scratch_dir: Option<PathBuf>,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            scratch_dir,
        }
    }

    fn make_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("truthlens_frames_");
        match self.scratch_dir {
            Some(ref parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }
}

fn select_filter(stride: usize) -> String {
    format!("select=not(mod(n\\,{}))", stride.max(1))
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frames(
        &self,
        video: &Path,
        stride: usize,
        max_frames: usize,
    ) -> Result<ExtractedFrames, FrameError> {
        if !video.is_file() {
            return Err(FrameError::NotFound(video.display().to_string()));
        }

        let dir = self.make_dir()?;
        let pattern = dir.path().join("frame_%03d.jpg");

        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error", "-nostdin", "-i"])
            .arg(video)
            .arg("-vf")
            .arg(select_filter(stride))
            .args(["-vsync", "vfr"])
            .arg("-frames:v")
            .arg(max_frames.to_string())
            .arg(&pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let frames = ExtractedFrames::collect(dir, max_frames)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first_line = stderr.lines().next().unwrap_or("").to_string();
            if frames.is_empty() {
                return Err(FrameError::Decoder(first_line));
            }
            warn!(
                "[FRAMES] decoder stopped early after {} frames: {}",
                frames.len(),
                first_line
            );
        }

        info!(
            "[FRAMES] extracted {} frames (stride={}, cap={}) from {}",
            frames.len(),
            stride,
            max_frames,
            video.display()
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filter() {
        assert_eq!(select_filter(30), "select=not(mod(n\\,30))");
        assert_eq!(select_filter(0), "select=not(mod(n\\,1))");
    }

    #[test]
    fn test_collect_orders_and_caps_frames() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_003.jpg", "frame_001.jpg", "frame_002.jpg", "other.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let frames = ExtractedFrames::collect(dir, 2).unwrap();
        let names: Vec<_> = frames
            .frames()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_001.jpg", "frame_002.jpg"]);
    }

    #[test]
    fn test_collect_orders_by_frame_number() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_1000.jpg", "frame_101.jpg", "frame_999.jpg", "frame_x.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let frames = ExtractedFrames::collect(dir, 2000).unwrap();
        let names: Vec<_> = frames
            .frames()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_101.jpg", "frame_999.jpg", "frame_1000.jpg"]);
    }

    #[test]
    fn test_drop_removes_frame_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("frame_001.jpg"), b"x").unwrap();
        let frames = ExtractedFrames::collect(dir, 15).unwrap();
        let path = frames.frames()[0].parent().unwrap().to_path_buf();
        assert!(path.exists());
        drop(frames);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let extractor = FfmpegFrameExtractor::new("ffmpeg", None);
        let err = extractor
            .extract_frames(Path::new("/no/such/video.mp4"), 30, 15)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::NotFound(_)));
    }
}
