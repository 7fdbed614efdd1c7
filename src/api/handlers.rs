// Request handlers for the web front end.
// Analysis failures are rendered into the page; only malformed requests get a 4xx.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::pages;
use super::AppState;
use crate::models::{DetectionResult, ImageInput, Modality};

#[derive(Debug, Deserialize)]
pub struct TextForm {
    #[serde(default)]
    pub text_input: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "truthlens".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /
pub async fn index() -> Html<String> {
    Html(pages::index_page())
}

/// POST /analyze_text
pub async fn analyze_text(State(state): State<AppState>, Form(form): Form<TextForm>) -> Html<String> {
    info!("[API] analyze_text chars={}", form.text_input.chars().count());
    let result = state.detector.analyze_text_source(&form.text_input).await;
    Html(pages::text_result_page(&form.text_input, &result))
}

/// POST /analyze_image
pub async fn analyze_image(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart, "image_file").await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(message) => return bad_request(&message),
    };
    let saved = match save_upload(&state.upload_dir, &upload).await {
        Ok(saved) => saved,
        Err(e) => return bad_request(&format!("Could not store upload: {}", e)),
    };

    let origin = saved.path.display().to_string();
    let result = match ImageInput::from_bytes(upload.bytes, origin) {
        Ok(image) => state.detector.analyze_image(&image).await,
        Err(e) => {
            warn!("[API] rejected image upload {}: {}", upload.file_name, e);
            DetectionResult::placeholder(Modality::Image, format!("Error analyzing image: {}", e))
        }
    };
    Html(pages::image_result_page(&saved.url, &result)).into_response()
}

/// POST /analyze_video
pub async fn analyze_video(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart, "video_file").await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(message) => return bad_request(&message),
    };
    let saved = match save_upload(&state.upload_dir, &upload).await {
        Ok(saved) => saved,
        Err(e) => return bad_request(&format!("Could not store upload: {}", e)),
    };

    let video = state.detector.analyze_video(&saved.path).await;
    Html(pages::video_result_page(&saved.url, &video)).into_response()
}

fn bad_request(message: &str) -> Response {
    warn!("[API] bad request: {}", message);
    (StatusCode::BAD_REQUEST, Html(pages::error_page(message))).into_response()
}

pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct SavedUpload {
    pub path: PathBuf,
    /// Path under which the router serves the file back.
    pub url: String,
}

/// First non-empty file in `field_name`; `None` when the form carried no file.
async fn read_upload(mut multipart: Multipart, field_name: &str) -> Result<Option<Upload>, String> {
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        if field.name() != Some(field_name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| e.to_string())?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload {
            file_name,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// Keep the client's extension only if it is short and alphanumeric.
pub fn safe_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
}

/// Store under a fresh uuid name; the client's file name never reaches the filesystem.
async fn save_upload(dir: &Path, upload: &Upload) -> std::io::Result<SavedUpload> {
    tokio::fs::create_dir_all(dir).await?;
    let name = match safe_extension(&upload.file_name) {
        Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
        None => uuid::Uuid::new_v4().to_string(),
    };
    let path = dir.join(&name);
    tokio::fs::write(&path, &upload.bytes).await?;
    info!(
        "[API] saved upload {:?} ({} bytes) as {}",
        upload.file_name,
        upload.bytes.len(),
        path.display()
    );
    Ok(SavedUpload {
        path,
        url: format!("/uploads/{}", name),
    })
}
