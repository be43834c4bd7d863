//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod preview;
mod run;
mod shell;
mod status;
mod video;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use ocrflow::client::{ExtractionMethod, FrameExtraction};
use ocrflow::models::{ContentType, PreprocessingConfig, RecognitionConfig};
use ocrflow::workflow::{Action, StopHandle, TaskReleaser};
use ocrflow::Config;

#[derive(Parser)]
#[command(name = "ocrflow")]
#[command(about = "Drive document recognition: preprocessing, batched OCR and video frames")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Recognition backend URL (overrides the config file)
    #[arg(long, global = true, env = "OCRFLOW_SERVER")]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Preprocessing choice for a source.
#[derive(Args, Debug, Clone, Default)]
pub struct PreprocessArgs {
    /// Recognize the raw pages without preprocessing
    #[arg(long, conflicts_with_all = ["auto_rotate", "enhance", "remove_shadows", "binarize", "remove_background"])]
    skip: bool,
    /// Straighten rotated pages
    #[arg(long)]
    auto_rotate: bool,
    /// Enhance contrast and sharpness
    #[arg(long)]
    enhance: bool,
    /// Remove shadows
    #[arg(long)]
    remove_shadows: bool,
    /// Convert to black and white
    #[arg(long)]
    binarize: bool,
    /// Remove the background
    #[arg(long)]
    remove_background: bool,
}

impl PreprocessArgs {
    /// Skip unless at least one option was given.
    pub fn action(&self) -> Action {
        let config = PreprocessingConfig {
            auto_rotate: self.auto_rotate,
            enhance: self.enhance,
            remove_shadows: self.remove_shadows,
            binarize: self.binarize,
            remove_background: self.remove_background,
        };
        if self.skip || !config.any_enabled() {
            Action::Skip
        } else {
            Action::Preprocess(config)
        }
    }
}

/// Recognition settings overriding the configured defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct RecognitionArgs {
    /// Content type: Document or Scene
    #[arg(long)]
    content_type: Option<String>,
    /// Subcategory of the content type (e.g. Academic, Table, Street)
    #[arg(long)]
    subcategory: Option<String>,
    /// Complexity: Tiny, Small, Medium, Large or Gundam
    #[arg(long)]
    complexity: Option<String>,
}

impl RecognitionArgs {
    /// Apply the overrides to `base`. Returns None when nothing was given.
    pub fn resolve(&self, base: &RecognitionConfig) -> anyhow::Result<Option<RecognitionConfig>> {
        if self.content_type.is_none() && self.subcategory.is_none() && self.complexity.is_none() {
            return Ok(None);
        }
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| base.content_type.as_str().to_string());
        let subcategory = match (&self.subcategory, &self.content_type) {
            (Some(sub), _) => sub.clone(),
            // a new content type starts from its first subcategory
            (None, Some(_)) => ContentType::from_str(&content_type)
                .and_then(|ct| ct.subcategories().first().copied())
                .unwrap_or_default()
                .to_string(),
            (None, None) => base.subcategory.clone(),
        };
        let complexity = self
            .complexity
            .clone()
            .unwrap_or_else(|| base.complexity.as_str().to_string());

        RecognitionConfig::parse(&content_type, &subcategory, &complexity)
            .map(Some)
            .map_err(|e| anyhow::anyhow!(e))
    }
}

/// Frame extraction settings.
#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    /// fixed_count, fixed_interval or scene_change
    #[arg(long, default_value = "fixed_count")]
    method: String,
    /// Number of frames for fixed_count
    #[arg(long, default_value_t = 1000)]
    frames: u32,
    /// Seconds between frames for fixed_interval
    #[arg(long, default_value_t = 5.0)]
    interval: f64,
    /// Scene change sensitivity between 0 and 1
    #[arg(long, default_value_t = 0.5)]
    sensitivity: f64,
    /// Image format of extracted frames
    #[arg(long, default_value = "jpg")]
    format: String,
}

impl ExtractionArgs {
    pub fn settings(&self) -> anyhow::Result<FrameExtraction> {
        let method = ExtractionMethod::from_str(&self.method)
            .ok_or_else(|| anyhow::anyhow!("Unknown extraction method: {}", self.method))?;
        Ok(FrameExtraction {
            method,
            total_frames: self.frames,
            interval: self.interval,
            sensitivity: self.sensitivity,
            format: self.format.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize an image or PDF
    Run {
        /// PNG, JPEG or PDF file
        file: PathBuf,
        #[command(flatten)]
        preprocess: PreprocessArgs,
        #[command(flatten)]
        recognition: RecognitionArgs,
        /// Pages per batch (1-50)
        #[arg(short, long)]
        batch_size: Option<i64>,
        /// Recognize only this page
        #[arg(short, long)]
        page: Option<u32>,
        /// Wait for Enter between batches
        #[arg(long)]
        step: bool,
        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract frames from a video and recognize them
    Video {
        /// Video file (mp4, avi, mov, mkv, webm)
        file: PathBuf,
        #[command(flatten)]
        extraction: ExtractionArgs,
        /// Frames to keep, e.g. 1,3,10-20 (default: all)
        #[arg(long)]
        select: Option<String>,
        /// Save the selected frames as an archive
        #[arg(long)]
        archive: Option<PathBuf>,
        /// Only extract (and archive) frames
        #[arg(long)]
        no_ocr: bool,
        #[command(flatten)]
        preprocess: PreprocessArgs,
        #[command(flatten)]
        recognition: RecognitionArgs,
        /// Pages per batch (1-50)
        #[arg(short, long)]
        batch_size: Option<i64>,
        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render one page of an image or PDF
    Preview {
        /// PNG, JPEG or PDF file
        file: PathBuf,
        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Where to write the image
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        preprocess: PreprocessArgs,
    },

    /// Interactive session driven by typed actions
    Shell,

    /// Show backend health
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

/// Exit status after a forced interrupt.
const INTERRUPTED: i32 = 130;
/// How long a forced interrupt waits for task releases.
const ABANDON_GRACE: Duration = Duration::from_secs(2);

/// React to the `presses`-th Ctrl-C. Returns the exit status once the
/// process should end.
async fn on_interrupt(presses: u32, stop: &StopHandle, releaser: &TaskReleaser) -> Option<i32> {
    if presses <= 1 {
        eprintln!("Stopping after the current batch... (Ctrl-C again to quit)");
        stop.request();
        return None;
    }
    let released = releaser.abandon(ABANDON_GRACE).await;
    eprintln!("Interrupted; released {} backend task(s)", released);
    Some(INTERRUPTED)
}

/// First Ctrl-C requests a cooperative stop, the second exits.
fn stop_on_ctrl_c(stop: StopHandle, releaser: TaskReleaser) {
    tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            if let Some(code) = on_interrupt(presses, &stop, &releaser).await {
                std::process::exit(code);
            }
        }
    });
}

async fn load_config(path: Option<PathBuf>, server: Option<String>) -> anyhow::Result<Config> {
    let config = Config::resolve(path.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(match server {
        Some(url) => config.with_server_url(&url),
        None => config,
    })
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config, cli.server).await?;

    match cli.command {
        Commands::Run {
            file,
            preprocess,
            recognition,
            batch_size,
            page,
            step,
            output,
        } => {
            run::cmd_run(
                config,
                run::RunOptions {
                    file,
                    preprocess,
                    recognition,
                    batch_size,
                    page,
                    step,
                    output,
                },
            )
            .await
        }
        Commands::Video {
            file,
            extraction,
            select,
            archive,
            no_ocr,
            preprocess,
            recognition,
            batch_size,
            output,
        } => {
            video::cmd_video(
                config,
                video::VideoOptions {
                    file,
                    extraction,
                    select,
                    archive,
                    no_ocr,
                    preprocess,
                    recognition,
                    batch_size,
                    output,
                },
            )
            .await
        }
        Commands::Preview {
            file,
            page,
            output,
            preprocess,
        } => preview::cmd_preview(config, &file, page, &output, &preprocess).await,
        Commands::Shell => shell::cmd_shell(config).await,
        Commands::Status { json } => status::cmd_status(&config, json).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&config),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "ocrflow",
            "--server",
            "http://ocr:5001",
            "run",
            "scan.pdf",
            "--enhance",
            "--batch-size",
            "4",
            "--content-type",
            "Scene",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://ocr:5001"));
        let Commands::Run {
            preprocess,
            recognition,
            batch_size,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(batch_size, Some(4));
        assert!(matches!(preprocess.action(), Action::Preprocess(c) if c.enhance));

        let resolved = recognition
            .resolve(&RecognitionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.subcategory, "Street");
    }

    #[tokio::test]
    async fn test_second_interrupt_exits() {
        let client =
            ocrflow::HttpRecognitionClient::new("http://127.0.0.1:9", Duration::from_secs(1))
                .unwrap();
        let releaser = TaskReleaser::new(std::sync::Arc::new(client));
        let stop = StopHandle::default();

        assert_eq!(on_interrupt(1, &stop, &releaser).await, None);
        assert!(stop.is_requested());
        assert_eq!(on_interrupt(2, &stop, &releaser).await, Some(INTERRUPTED));
    }

    #[test]
    fn test_skip_conflicts_with_options() {
        assert!(Cli::try_parse_from(["ocrflow", "run", "a.png", "--skip", "--binarize"]).is_err());
        assert_eq!(PreprocessArgs::default().action(), Action::Skip);
    }

    #[test]
    fn test_extraction_args() {
        let cli = Cli::try_parse_from([
            "ocrflow",
            "video",
            "clip.mp4",
            "--method",
            "scene_change",
            "--sensitivity",
            "0.3",
        ])
        .unwrap();
        let Commands::Video { extraction, .. } = cli.command else {
            panic!("expected video");
        };
        let settings = extraction.settings().unwrap();
        assert_eq!(settings.method, ExtractionMethod::SceneChange);
        assert_eq!(settings.sensitivity, 0.3);
        assert_eq!(settings.total_frames, 1000);
    }
}
