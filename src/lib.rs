pub mod models;
pub mod services;
pub mod api;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime};
use tracing::info;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

use services::config_store::load_app_config;
use services::detection::Detector;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "truthlens_";
const LOGS_KEPT: usize = 30;

fn startup_elapsed_ms() -> u128 {
    PROCESS_START
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Session logging for the server: one `truthlens_<timestamp>.log` per run,
/// plus a colored console copy in debug builds.
///
/// `TRUTHLENS_DISABLE_FILE_LOG` keeps everything on the console,
/// `TRUTHLENS_LOG_DIR` moves the log directory and
/// `TRUTHLENS_DISABLE_LOG_CLEANUP` keeps every past session file.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env_flag("TRUTHLENS_DISABLE_FILE_LOG") {
        init_console_only_logging(env_filter);
        info!("[LOG] file logging disabled; console only");
        return;
    }

    let logs_dir = logs_dir();
    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Cannot create log dir {}: {}", logs_dir.display(), e);
        init_console_only_logging(env_filter);
        info!("[LOG] log dir not writable; console only");
        return;
    }

    let session_file = format!("{}{}.log", LOG_PREFIX, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(rolling::never(&logs_dir, &session_file));
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);
    #[cfg(debug_assertions)]
    registry
        .with(fmt::layer().with_writer(std::io::stdout).with_target(true))
        .init();
    #[cfg(not(debug_assertions))]
    registry.init();

    info!(
        "[LOG] truthlens {} session log {}",
        env!("CARGO_PKG_VERSION"),
        logs_dir.join(&session_file).display()
    );

    if !env_flag("TRUTHLENS_DISABLE_LOG_CLEANUP") {
        std::thread::spawn(move || cleanup_old_logs(&logs_dir, LOGS_KEPT));
    }
}

/// `TRUTHLENS_LOG_DIR` if set, else `./logs` in debug builds and the
/// per-user data dir in release builds.
fn logs_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TRUTHLENS_LOG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if cfg!(debug_assertions) {
        return PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("logs");
    }
    dirs::data_local_dir()
        .map(|d| d.join("truthlens").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Delete the oldest session files (by mtime) beyond `keep`. Other files are left alone.
fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let Ok(read_dir) = fs::read_dir(logs_dir) else {
        return;
    };
    let mut sessions: Vec<(SystemTime, PathBuf)> = read_dir
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(LOG_PREFIX) && name.ends_with(".log")
        })
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, e.path())
        })
        .collect();

    if sessions.len() <= keep {
        return;
    }
    sessions.sort_by_key(|(modified, _)| *modified);
    let excess = sessions.len() - keep;
    for (_, path) in sessions.into_iter().take(excess) {
        let _ = fs::remove_file(path);
    }
}

/// Console-only subscriber for the CLI and for file-less runs. Release builds
/// write to stderr so `--json` output on stdout stays parseable.
pub fn init_console_only_logging(env_filter: EnvFilter) {
    let registry = tracing_subscriber::registry().with(env_filter);
    #[cfg(debug_assertions)]
    registry
        .with(fmt::layer().with_writer(std::io::stdout).with_target(true))
        .init();
    #[cfg(not(debug_assertions))]
    registry
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false).with_target(true))
        .init();
}

/// Load config, build the detector and serve the web front end.
pub async fn run() -> anyhow::Result<()> {
    PROCESS_START.get_or_init(Instant::now);

    let logging_t0 = Instant::now();
    init_logging();
    info!(startup_ms = startup_elapsed_ms(), logging_ms = logging_t0.elapsed().as_millis(), "logging.initialized");

    let config = load_app_config();
    let detector = Detector::from_config(&config)?;
    info!(startup_ms = startup_elapsed_ms(), bind = %config.server.bind, "detector.ready");

    let result = api::serve(&config.server, detector).await;
    info!("[LOG] truthlens stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_logs() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("{}2024010{}_000000.log", LOG_PREFIX, i));
            fs::write(&path, b"x").unwrap();
            let mtime = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000 + i);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        }
        fs::write(dir.path().join("other.log"), b"x").unwrap();

        cleanup_old_logs(dir.path(), 2);

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "other.log".to_string(),
                format!("{}20240103_000000.log", LOG_PREFIX),
                format!("{}20240104_000000.log", LOG_PREFIX),
            ]
        );
    }
}
