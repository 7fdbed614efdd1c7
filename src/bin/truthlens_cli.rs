//! truthlens-cli - run the detector from the terminal
//!
//! Prints component scores, the final score, the verdict and the reasoning,
//! or the serialized result with `--json`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use truthlens_lib::init_console_only_logging;
use truthlens_lib::models::{DetectionResult, VideoDetection};
use truthlens_lib::services::config_store::{load_app_config, ConfigStore};
use truthlens_lib::services::detection::Detector;

#[derive(Parser, Debug)]
#[command(name = "truthlens-cli", version, about = "Estimate whether text, images or video are AI-generated")]
struct Args {
    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze raw text, or the article text at an http(s) URL
    Text {
        input: String,
    },

    /// Analyze a local image file or an image URL
    Image {
        source: String,
    },

    /// Analyze a local video file by sampling frames
    Video {
        path: PathBuf,
    },

    /// Manage stored API keys
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Store an API key for a provider (gemini, classifier)
    SetKey { provider: String, key: String },
    /// Remove a stored API key
    DeleteKey { provider: String },
    /// Show the effective configuration (keys masked)
    Show,
}

fn config_store() -> Result<ConfigStore> {
    let dir = ConfigStore::default_config_dir().ok_or_else(|| anyhow!("No config directory available"))?;
    Ok(ConfigStore::new(dir))
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn run_config(action: ConfigAction) -> Result<()> {
    let store = config_store()?;
    match action {
        ConfigAction::SetKey { provider, key } => {
            store.set_api_key(&provider, key.trim()).map_err(|e| anyhow!(e))?;
            println!("Stored {} key in {}", provider, store.config_file().display());
        }
        ConfigAction::DeleteKey { provider } => {
            store.delete_api_key(&provider).map_err(|e| anyhow!(e))?;
            println!("Deleted {} key", provider);
        }
        ConfigAction::Show => {
            let mut config = load_app_config();
            for key in config.api_keys.values_mut() {
                *key = mask_key(key);
            }
            println!("# {}", store.config_file().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(result: &DetectionResult) {
    if let Some(ref err) = result.error {
        println!("[!] {}", err);
    }
    for (source, sample) in &result.component_scores {
        println!(
            "{:<16} {:>7.2}%{}",
            source.as_str(),
            sample.value * 100.0,
            if sample.fallback { "  (neutral default)" } else { "" }
        );
    }
    println!("{:<16} {:>7.2}%", "final", result.final_score * 100.0);
    println!("Verdict: {}", result.verdict_label());
    if !result.reasoning.is_empty() {
        println!("\n{}", result.reasoning);
    }
}

fn print_video(video: &VideoDetection) {
    for frame in &video.frames {
        println!(
            "frame {:>3}: {:>6.2}%",
            frame.frame_index + 1,
            frame.result.final_score * 100.0
        );
    }
    if !video.frames.is_empty() {
        println!(
            "{} of {} frames over threshold\n",
            video.high_scoring_frames, video.frames_extracted
        );
    }
    print_result(&video.result);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    init_console_only_logging(filter);

    let command = match args.command {
        Command::Config { action } => return run_config(action),
        other => other,
    };

    let config = load_app_config();
    let detector = Detector::from_config(&config).context("Failed to set up detector")?;

    match command {
        Command::Text { input } => {
            let result = detector.analyze_text_source(&input).await;
            if args.json { print_json(&result)? } else { print_result(&result) }
        }
        Command::Image { source } => {
            let result = detector.analyze_image_source(&source).await;
            if args.json { print_json(&result)? } else { print_result(&result) }
        }
        Command::Video { path } => {
            let video = detector.analyze_video(&path).await;
            if args.json { print_json(&video)? } else { print_video(&video) }
        }
        Command::Config { .. } => {}
    }
    Ok(())
}
