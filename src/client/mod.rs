//! Client for the recognition backend.
//!
//! `RecognitionService` is the seam the workflow talks to; `HttpRecognitionClient`
//! implements it over HTTP with reqwest.

mod http;
mod response;
mod types;

use async_trait::async_trait;

use crate::models::{DocumentTask, InputFile, PreprocessingConfig, RecognitionConfig};

pub use http::HttpRecognitionClient;
pub use response::{decode_envelope, decode_plain, status_error, ServiceError};
pub use types::{
    BatchItem, BatchRequest, BatchResponse, BatchTarget, DocumentInit, ExtractedFrame,
    ExtractedPage, ExtractionMethod, FrameExtraction, ItemOutcome, ItemStatus, ServerHealth,
    UploadReceipt, UploadedItem, VideoInfo, VideoUpload, FRAME_SET_PLACEHOLDER_TASK,
};

/// Operations offered by the recognition backend.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Upload a PDF and create its rasterization task.
    async fn init_document(
        &self,
        file: &InputFile,
        recognition: &RecognitionConfig,
    ) -> Result<DocumentTask, ServiceError>;

    /// Render one page of a document task. Returns a `data:` URI.
    async fn preview_page(&self, task_id: &str, page: u32) -> Result<String, ServiceError>;

    /// Rasterize every page of a document task into standalone images.
    async fn extract_pages(&self, task_id: &str) -> Result<Vec<ExtractedPage>, ServiceError>;

    /// Release a backend task.
    async fn cancel_task(&self, task_id: &str) -> Result<(), ServiceError>;

    /// Upload files for preprocessing.
    async fn upload_items(&self, files: &[InputFile]) -> Result<UploadReceipt, ServiceError>;

    /// Run preprocessing over an upload task.
    async fn run_preprocessing(
        &self,
        task_id: &str,
        config: &PreprocessingConfig,
    ) -> Result<Vec<ItemOutcome>, ServiceError>;

    /// Archive of a preprocessing task's outputs.
    async fn download_preprocessed(&self, task_id: &str) -> Result<Vec<u8>, ServiceError>;

    /// Upload a video for frame extraction.
    async fn upload_video(&self, file: &InputFile) -> Result<VideoUpload, ServiceError>;

    /// Extract frames from an uploaded video.
    async fn extract_frames(
        &self,
        task_id: &str,
        settings: &FrameExtraction,
    ) -> Result<Vec<ExtractedFrame>, ServiceError>;

    /// Archive of the selected frames of a video task.
    async fn download_frames(&self, task_id: &str, indices: &[u32]) -> Result<Vec<u8>, ServiceError>;

    /// Recognize one batch of pages or frames.
    async fn run_batch(
        &self,
        target: BatchTarget,
        request: &BatchRequest,
    ) -> Result<BatchResponse, ServiceError>;

    /// Recognize a single image.
    async fn recognize_image(
        &self,
        file: &InputFile,
        recognition: &RecognitionConfig,
    ) -> Result<String, ServiceError>;

    /// Fetch a file the backend produced, by path or route.
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, ServiceError>;

    /// Backend health report.
    async fn health(&self) -> Result<ServerHealth, ServiceError>;
}
