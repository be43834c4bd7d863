//! Preprocessing options and the artifacts they produce.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Image preprocessing options understood by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    #[serde(default)]
    pub auto_rotate: bool,
    #[serde(default)]
    pub enhance: bool,
    #[serde(default)]
    pub remove_shadows: bool,
    #[serde(default)]
    pub binarize: bool,
    #[serde(default, rename = "remove_bg")]
    pub remove_background: bool,
}

impl PreprocessingConfig {
    /// Option names as accepted by `set_option`.
    pub const OPTION_NAMES: &'static [&'static str] = &[
        "auto-rotate",
        "enhance",
        "remove-shadows",
        "binarize",
        "remove-background",
    ];

    pub fn any_enabled(&self) -> bool {
        self.auto_rotate
            || self.enhance
            || self.remove_shadows
            || self.binarize
            || self.remove_background
    }

    /// Enable an option by name. Returns false for unknown names.
    pub fn set_option(&mut self, name: &str) -> bool {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "auto-rotate" | "rotate" => self.auto_rotate = true,
            "enhance" => self.enhance = true,
            "remove-shadows" | "shadows" => self.remove_shadows = true,
            "binarize" => self.binarize = true,
            "remove-background" | "remove-bg" | "background" => self.remove_background = true,
            _ => return false,
        }
        true
    }

    /// Names of the enabled options.
    pub fn enabled(&self) -> Vec<&'static str> {
        let flags = [
            self.auto_rotate,
            self.enhance,
            self.remove_shadows,
            self.binarize,
            self.remove_background,
        ];
        Self::OPTION_NAMES
            .iter()
            .zip(flags)
            .filter_map(|(name, on)| on.then_some(*name))
            .collect()
    }
}

/// A preprocessed derivative of one page or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingArtifact {
    /// 1-based page or frame ordinal.
    pub index: u32,
    /// Path of the processed image on the backend.
    pub processed_path: String,
    pub processed_thumbnail: Option<String>,
}

/// Which preprocessing choice was made for the current source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreprocessingDecision {
    #[default]
    Pending,
    Skipped,
    Executed,
}

/// Whether preprocessing applies to the current source, and its artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessingState {
    pub decision: PreprocessingDecision,
    /// Backend task holding the uploaded and processed items.
    pub task_id: Option<String>,
    pub artifacts: BTreeMap<u32, ProcessingArtifact>,
}

impl PreprocessingState {
    pub fn applied(&self) -> bool {
        self.decision == PreprocessingDecision::Executed
    }

    pub fn skipped() -> Self {
        Self {
            decision: PreprocessingDecision::Skipped,
            task_id: None,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn executed(task_id: String, artifacts: BTreeMap<u32, ProcessingArtifact>) -> Self {
        Self {
            decision: PreprocessingDecision::Executed,
            task_id: Some(task_id),
            artifacts,
        }
    }

    /// Artifact to use for `index`, if preprocessing applies and produced one.
    pub fn artifact(&self, index: u32) -> Option<&ProcessingArtifact> {
        if self.applied() {
            self.artifacts.get(&index)
        } else {
            None
        }
    }

    /// Index to processed path map for every available artifact.
    pub fn processed_paths(&self) -> BTreeMap<u32, String> {
        if !self.applied() {
            return BTreeMap::new();
        }
        self.artifacts
            .iter()
            .map(|(index, artifact)| (*index, artifact.processed_path.clone()))
            .collect()
    }
}
