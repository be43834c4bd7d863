//! Request and response shapes of the recognition backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{DocumentTask, RecognitionConfig};
use crate::utils::server_file_route;

/// Placeholder task reference for frame batches with no backend task.
pub const FRAME_SET_PLACEHOLDER_TASK: &str = "video_frames";

/// Response of document initialization.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInit {
    pub task_id: String,
    pub total_pages: u32,
    #[serde(default)]
    pub thumbnails: Vec<String>,
}

impl From<DocumentInit> for DocumentTask {
    fn from(init: DocumentInit) -> Self {
        DocumentTask {
            task_id: init.task_id,
            total_pages: init.total_pages,
            thumbnails: init.thumbnails,
        }
    }
}

/// A PDF page rasterized to a standalone image.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedPage {
    pub filename: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

impl ExtractedPage {
    /// Route to fetch the image from, if the backend told us where it is.
    pub fn route(&self) -> Option<String> {
        self.file_url
            .clone()
            .or_else(|| self.file_path.as_deref().map(server_file_route))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExtractedPages {
    #[serde(default)]
    pub images: Vec<ExtractedPage>,
}

/// One file as stored by the preprocessing upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedItem {
    pub filename: String,
    #[serde(default)]
    pub raw_path: Option<String>,
}

/// Result of uploading items for preprocessing.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub task_id: String,
    /// Number of files the backend accepted.
    #[serde(rename = "total_images")]
    pub accepted_count: u32,
    #[serde(rename = "images", default)]
    pub items: Vec<UploadedItem>,
}

/// Per-item preprocessing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Preprocessing outcome for one uploaded item.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemOutcome {
    pub filename: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub processed_path: Option<String>,
    #[serde(default, rename = "processed_thumb_b64")]
    pub processed_thumbnail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemOutcomes {
    #[serde(default)]
    pub results: Vec<ItemOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PagePreview {
    pub image: String,
}

/// Metadata the backend reports for an uploaded video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub total_frames: u64,
    #[serde(default)]
    pub resolution: String,
}

/// Result of uploading a video.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoUpload {
    pub task_id: String,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
}

/// How frames are sampled from a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    #[default]
    FixedCount,
    FixedInterval,
    SceneChange,
}

impl ExtractionMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fixed_count" | "count" => Some(Self::FixedCount),
            "fixed_interval" | "interval" => Some(Self::FixedInterval),
            "scene_change" | "scene" => Some(Self::SceneChange),
            _ => None,
        }
    }
}

/// Frame extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameExtraction {
    pub method: ExtractionMethod,
    /// Number of frames for `FixedCount`.
    pub total_frames: u32,
    /// Seconds between frames for `FixedInterval`.
    pub interval: f64,
    /// Scene change threshold in 0.0..=1.0 for `SceneChange`.
    pub sensitivity: f64,
    pub format: String,
}

impl Default for FrameExtraction {
    fn default() -> Self {
        Self {
            method: ExtractionMethod::FixedCount,
            total_frames: 1000,
            interval: 5.0,
            sensitivity: 0.5,
            format: "jpg".to_string(),
        }
    }
}

/// A frame extracted from a video. `index` is 1-based.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedFrame {
    pub index: u32,
    pub path: String,
    #[serde(default, rename = "thumb_b64")]
    pub thumbnail: Option<String>,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExtractedFrames {
    #[serde(default)]
    pub frames: Vec<ExtractedFrame>,
}

/// Which OCR batch endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTarget {
    /// Pages of an initialized PDF task.
    Document,
    /// Frames addressed by uploaded path.
    Frames,
}

/// One OCR batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest {
    pub task_id: String,
    pub batch_index: u32,
    pub batch_size: u32,
    /// Page or frame number to image path on the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_images: Option<BTreeMap<u32, String>>,
    #[serde(flatten)]
    pub recognition: Option<RecognitionConfig>,
}

/// Text recognized for one page or frame in a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub page: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to one OCR batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<BatchItem>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_batch_index: Option<u32>,
    #[serde(rename = "processed_pages", default)]
    pub processed_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RecognizedText {
    #[serde(default)]
    pub text: String,
}

/// Backend health report.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerHealth {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_healthy: bool,
    #[serde(default)]
    pub active_tasks: u32,
    #[serde(default)]
    pub preprocess_tasks: u32,
    #[serde(default)]
    pub video_tasks: u32,
}
