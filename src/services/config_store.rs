// Configuration Storage Service
// Handles config file read/write, version backup and environment overrides

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub classifiers: ClassifierConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to route all traffic through, if enabled.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https.as_deref().or(self.http.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeConfig {
    #[serde(default = "default_judge_provider")]
    pub provider: String,
    #[serde(default = "default_judge_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: default_judge_provider(),
            model: default_judge_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    #[serde(default = "default_text_endpoint")]
    pub text_endpoint: String,
    /// Label the text classifier uses for machine-generated text.
    #[serde(default = "default_ai_label")]
    pub text_ai_label: String,
    #[serde(default = "default_max_tokens")]
    pub text_max_tokens: usize,
    #[serde(default = "default_image_endpoint")]
    pub image_endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            text_endpoint: default_text_endpoint(),
            text_ai_label: default_ai_label(),
            text_max_tokens: default_max_tokens(),
            image_endpoint: default_image_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_backoff_min")]
    pub backoff_min_secs: f64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_min_secs: default_backoff_min(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    #[serde(default = "default_frame_stride")]
    pub frame_stride: usize,
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// 1 keeps per-frame analysis strictly sequential.
    #[serde(default = "default_frame_concurrency")]
    pub frame_concurrency: usize,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Parent directory for transient frame files; system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_stride: default_frame_stride(),
            max_frames: default_max_frames(),
            frame_concurrency: default_frame_concurrency(),
            ffmpeg_path: default_ffmpeg_path(),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

fn default_judge_provider() -> String { "gemini".to_string() }
fn default_judge_model() -> String { "gemini-2.5-flash".to_string() }
fn default_request_timeout() -> u64 { 80 }
fn default_text_endpoint() -> String { "http://127.0.0.1:8008/text-classification".to_string() }
fn default_ai_label() -> String { "Fake".to_string() }
fn default_max_tokens() -> usize { 512 }
fn default_image_endpoint() -> String { "http://127.0.0.1:8008/clip-similarity".to_string() }
fn default_max_attempts() -> usize { 3 }
fn default_backoff_min() -> f64 { 2.0 }
fn default_backoff_max() -> f64 { 5.0 }
fn default_frame_stride() -> usize { 30 }
fn default_max_frames() -> usize { 15 }
fn default_frame_concurrency() -> usize { 1 }
fn default_ffmpeg_path() -> String { "ffmpeg".to_string() }
fn default_bind() -> String { "127.0.0.1:5000".to_string() }
fn default_upload_dir() -> PathBuf { PathBuf::from("static/uploads") }
fn default_max_upload() -> usize { 200 * 1024 * 1024 }

impl AppConfig {
    /// Apply `TRUTHLENS_*` / `GEMINI_API_URL` environment overrides on top of the file config.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("GEMINI_API_URL") {
            self.judge.base_url = Some(v);
        }
        if let Some(v) = env_value("TRUTHLENS_JUDGE_MODEL") {
            self.judge.model = v;
        }
        if let Some(v) = env_value("TRUTHLENS_TEXT_CLASSIFIER_URL") {
            self.classifiers.text_endpoint = v;
        }
        if let Some(v) = env_value("TRUTHLENS_IMAGE_CLASSIFIER_URL") {
            self.classifiers.image_endpoint = v;
        }
        if let Some(v) = env_value("TRUTHLENS_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = env_value("TRUTHLENS_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = env_value("TRUTHLENS_FFMPEG") {
            self.video.ffmpeg_path = v;
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        if let Some(dir) = env_value("TRUTHLENS_CONFIG_DIR") {
            return Some(PathBuf::from(dir));
        }
        dirs::config_dir().map(|p| p.join("truthlens"))
    }

    pub fn config_file(&self) -> &PathBuf {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &PathBuf, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Backup names embed the timestamp, so name order is age order.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config.api_keys.get(provider).cloned())
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}

/// Load the config from the default location (or defaults) and apply env overrides.
pub fn load_app_config() -> AppConfig {
    let mut config = match ConfigStore::default_config_dir() {
        Some(dir) => ConfigStore::new(dir).load().unwrap_or_else(|e| {
            tracing::warn!("[CONFIG] {}; using defaults", e);
            AppConfig::default()
        }),
        None => AppConfig::default(),
    };
    config.apply_env_overrides();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.judge.model, "gemini-2.5-flash");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_min_secs, 2.0);
        assert_eq!(config.retry.backoff_max_secs, 5.0);
        assert_eq!(config.video.frame_stride, 30);
        assert_eq!(config.video.max_frames, 15);
        assert_eq!(config.classifiers.text_max_tokens, 512);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"version":"1.0.0","video":{"maxFrames":4}}"#).unwrap();
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!(parsed.video.max_frames, 4);
        assert_eq!(parsed.video.frame_stride, 30);
        assert_eq!(parsed.judge.provider, "gemini");
    }

    #[test]
    fn test_proxy_active_url() {
        let mut proxy = ProxyConfig {
            enabled: false,
            http: Some("http://proxy:8080".to_string()),
            https: None,
        };
        assert_eq!(proxy.active_url(), None);
        proxy.enabled = true;
        assert_eq!(proxy.active_url(), Some("http://proxy:8080"));
    }

    #[test]
    fn test_api_key_roundtrip_with_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        store.set_api_key("gemini", "k1").unwrap();
        store.set_api_key("gemini", "k2").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap().as_deref(), Some("k2"));
        assert!(dir.path().join("backups").is_dir());

        store.delete_api_key("gemini").unwrap();
        assert_eq!(store.get_api_key("gemini").unwrap(), None);
    }
}
