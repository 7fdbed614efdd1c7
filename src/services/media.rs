// Media Input Loading
// Reads image bytes from a local path or URL and checks they are an image

use reqwest::Client;
use std::path::Path;
use thiserror::Error;

use crate::models::ImageInput;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Image download returned HTTP {0}")]
    FetchStatus(u16),
    #[error("Not a readable image: {0}")]
    NotAnImage(String),
}

pub fn is_url(input: &str) -> bool {
    let lower = input.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl ImageInput {
    /// Wrap raw bytes, rejecting anything whose magic bytes are not an image.
    pub fn from_bytes(bytes: Vec<u8>, origin: impl Into<String>) -> Result<Self, MediaError> {
        let origin = origin.into();
        let kind = infer::get(&bytes)
            .filter(|k| k.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| MediaError::NotAnImage(origin.clone()))?;
        Ok(Self {
            mime_type: kind.mime_type().to_string(),
            bytes,
            origin,
        })
    }
}

pub async fn read_image_file(path: &Path) -> Result<ImageInput, MediaError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| MediaError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ImageInput::from_bytes(bytes, path.display().to_string())
}

/// Load an image from a local path or an http(s) URL.
pub async fn load_image(client: &Client, source: &str) -> Result<ImageInput, MediaError> {
    let source = source.trim();
    if !is_url(source) {
        return read_image_file(Path::new(source)).await;
    }

    let response = client.get(source).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::FetchStatus(status.as_u16()));
    }
    let bytes = response.bytes().await?.to_vec();
    ImageInput::from_bytes(bytes, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a.jpg"));
        assert!(is_url(" HTTP://x"));
        assert!(!is_url("/tmp/a.jpg"));
        assert!(!is_url("httpfile.jpg"));
    }

    #[test]
    fn test_from_bytes_detects_png() {
        let img = ImageInput::from_bytes(PNG_HEADER.to_vec(), "mem").unwrap();
        assert_eq!(img.mime_type, "image/png");
    }

    #[test]
    fn test_from_bytes_rejects_text() {
        let err = ImageInput::from_bytes(b"hello world".to_vec(), "notes.txt").unwrap_err();
        assert!(matches!(err, MediaError::NotAnImage(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = load_image(&Client::new(), "/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, MediaError::Io { .. }));
    }
}
