// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! vidsage: Video Q&A through a hosted multimodal model
//!
//! Runs the web UI by default; `ask` answers a single question from the
//! command line through the same pipeline.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use vidsage::config::{AppConfig, Credential};
use vidsage::download::UrlFetcher;
use vidsage::gemini::GeminiClient;
use vidsage::pipeline::Pipeline;
use vidsage::stager::Stager;
use vidsage::{Result, VidsageError};

/// vidsage CLI - ask questions about videos
#[derive(Parser, Debug)]
#[command(name = "vidsage")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Ask a hosted multimodal model questions about short videos", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "vidsage.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web UI
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question about a local video file or a video URL
    Ask {
        /// Video file to analyze
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        video: Option<PathBuf>,

        /// Video URL to download and analyze instead of a file
        #[arg(long)]
        url: Option<String>,

        /// Question about the video
        #[arg(short = 'Q', long)]
        question: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check provider reachability and model availability
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "vidsage.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        None => run_serve(config, None, None).await,
        Some(Commands::Ask { video, url, question, json }) => {
            run_ask(config, video, url, &question, json).await
        }
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
    }
}

/// Build the client and request pipeline; fails before any network use
/// when the credential is missing
fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let credential = Credential::from_env(&config.provider.api_key_env)?;
    let client = Arc::new(GeminiClient::new(config, credential)?);

    let staging_dir = config.staging_dir();
    std::fs::create_dir_all(&staging_dir)?;

    Ok(Pipeline::new(
        Stager::from_config(config),
        UrlFetcher::new(&config.download),
        client,
    ))
}

async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    // Apply CLI overrides
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    let pipeline = build_pipeline(&config)?;
    info!("vidsage v{} - model {}", env!("CARGO_PKG_VERSION"), config.provider.model);
    info!("Staging uploads in {:?}", config.staging_dir());

    vidsage::web::start_server(config, pipeline).await
}

async fn run_ask(
    config: AppConfig,
    video: Option<PathBuf>,
    url: Option<String>,
    question: &str,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(&config)?;

    let report = match (video, url) {
        (Some(path), _) => pipeline.analyze_path(&path, question).await?,
        (None, Some(url)) => pipeline.analyze_url(&url, question).await?,
        (None, None) => {
            return Err(VidsageError::Validation(
                "Provide a video file or --url".to_string(),
            ))
        }
    };

    if !report.cleaned_up {
        warn!("Staged copy of {} could not be deleted", report.video_name);
    }

    let answer = report.outcome?;
    if json {
        let value = serde_json::json!({
            "answer": answer,
            "model": report.model,
            "video": report.video_name,
            "elapsed_ms": (report.finished_at - report.started_at).num_milliseconds(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", answer);
    }
    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    let credential = Credential::from_env(&config.provider.api_key_env)?;
    let client = GeminiClient::new(&config, credential)?;

    println!("Provider: {}", config.provider.base_url);
    let models = client.list_models().await?;
    println!("Reachable, {} models available", models.len());

    if models.iter().any(|m| m == &config.provider.model) {
        println!("Model '{}': available", config.provider.model);
    } else {
        println!("Model '{}': NOT available", config.provider.model);
        let gemini: Vec<&str> = models
            .iter()
            .map(String::as_str)
            .filter(|m| m.starts_with("gemini"))
            .collect();
        if !gemini.is_empty() {
            println!("Gemini models: {}", gemini.join(", "));
        }
    }

    let ytdlp = std::process::Command::new(&config.download.ytdlp_path)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    println!(
        "URL downloads: {}",
        match (config.download.enabled, ytdlp) {
            (false, _) => "disabled",
            (true, true) => "enabled",
            (true, false) => "enabled, but yt-dlp was not found",
        }
    );

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(VidsageError::Config(format!(
                    "{:?} already exists (use --force to overwrite)",
                    output
                )));
            }
            AppConfig::default().save(&output)?;
            println!("Wrote default configuration to {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("{:?} is valid", path);
        }
    }
    Ok(())
}
