//! Configuration management for ocrflow using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{RecognitionConfig, DEFAULT_BATCH_SIZE};

/// Backend address used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5001";

/// What to do when the backend reports a different number of items than expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Log a warning and continue with what the backend reported.
    #[default]
    Warn,
    /// Abort the operation without committing any state.
    Fail,
}

impl MismatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }
}

/// ocrflow configuration, loaded from `ocrflow.{toml,yaml,json}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the recognition backend.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Per-request timeout in seconds. OCR of a large batch can take minutes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Pages per OCR batch (clamped to 1..=50).
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// Request the next batch without waiting for `continue`.
    #[serde(default)]
    pub auto_continue: bool,
    /// Handling of item count mismatches reported by the backend.
    #[serde(default)]
    pub count_mismatch: MismatchPolicy,
    /// Seconds a user-visible notice stays active.
    #[serde(default = "default_notice_ttl")]
    pub notice_ttl_secs: u64,
    /// Directory for exported results (defaults to the current directory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<String>,
    /// Default recognition settings.
    #[serde(default)]
    pub recognition: RecognitionConfig,
    /// File the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
fn default_request_timeout() -> u64 {
    600
}
fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE as i64
}
fn default_notice_ttl() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout(),
            batch_size: default_batch_size(),
            auto_continue: false,
            count_mismatch: MismatchPolicy::default(),
            notice_ttl_secs: default_notice_ttl(),
            export_dir: None,
            recognition: RecognitionConfig::default(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load("ocrflow").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        if !config.recognition.is_valid() {
            return Err(format!(
                "Invalid recognition settings: {}",
                config.recognition
            ));
        }

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load from an explicit path, or discover one.
    pub async fn resolve(explicit: Option<&Path>) -> Result<Self, String> {
        match explicit {
            Some(path) => Self::load_from_path(path).await,
            None => Ok(Self::load().await),
        }
    }

    pub fn with_server_url(mut self, url: &str) -> Self {
        self.server_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_auto_continue(mut self, auto: bool) -> Self {
        self.auto_continue = auto;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_secs)
    }

    /// Directory exports are written to, with `~` expanded.
    pub fn export_dir(&self) -> PathBuf {
        match self.export_dir {
            Some(ref dir) => PathBuf::from(shellexpand::tilde(dir).as_ref()),
            None => PathBuf::from("."),
        }
    }
}
