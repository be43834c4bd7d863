//! Scripted in-memory backend for workflow tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{
    BatchItem, BatchRequest, BatchResponse, BatchTarget, ExtractedFrame, ExtractedPage,
    FrameExtraction, ItemOutcome, ItemStatus, RecognitionService, ServerHealth, ServiceError,
    UploadReceipt, UploadedItem, VideoUpload,
};
use super::batch::StopHandle;
use crate::models::{DocumentTask, InputFile, PreprocessingConfig, RecognitionConfig};

pub const PDF_TASK: &str = "pdf-task";
pub const PREP_TASK: &str = "prep-task";
pub const VIDEO_TASK: &str = "video-task";

/// Behavior knobs and a log of every call made.
#[derive(Debug, Default)]
pub struct Script {
    pub pdf_pages: u32,
    pub video_frames: u32,
    /// Uploaded filenames whose preprocessing fails.
    pub failing_items: BTreeSet<String>,
    /// Override for the accepted count reported by uploads.
    pub accepted_override: Option<u32>,
    pub fail_upload: bool,
    pub fail_process: bool,
    pub fail_batch_index: Option<u32>,
    pub fail_cancel: bool,
    /// Cancel calls never return.
    pub hang_cancel: bool,
    /// Always report more work, pointing at this batch index.
    pub next_index_override: Option<u32>,
    /// Request a stop while the batch with this index is in flight.
    pub stop_during_batch: Option<(u32, StopHandle)>,
    /// Filenames of the last preprocessing upload.
    uploaded: Vec<String>,

    pub inits: u32,
    pub cancels: Vec<String>,
    pub uploads: Vec<Vec<String>>,
    pub batches: Vec<(BatchTarget, BatchRequest)>,
    pub recognized: Vec<InputFile>,
    pub fetched: Vec<String>,
    pub process_calls: u32,
}

#[derive(Debug, Default)]
pub struct ScriptedService {
    pub script: Mutex<Script>,
}

impl ScriptedService {
    pub fn with_pdf_pages(pages: u32) -> Self {
        let service = Self::default();
        service.script.lock().unwrap().pdf_pages = pages;
        service
    }

    pub fn with_video_frames(frames: u32) -> Self {
        let service = Self::default();
        service.script.lock().unwrap().video_frames = frames;
        service
    }

    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&Script) -> T) -> T {
        f(&self.script.lock().unwrap())
    }

    /// (batch_index, batch_size) of every batch request, in order.
    pub fn batch_windows(&self) -> Vec<(u32, u32)> {
        self.read(|s| {
            s.batches
                .iter()
                .map(|(_, r)| (r.batch_index, r.batch_size))
                .collect()
        })
    }
}

/// Let background releases run before asserting on cancels.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn rejected(message: &str) -> ServiceError {
    ServiceError::Status {
        status: 500,
        message: message.to_string(),
    }
}

fn window(batch_index: u32, batch_size: u32, total: u32) -> (u32, u32) {
    let start = batch_index.saturating_mul(batch_size).min(total);
    let end = start.saturating_add(batch_size).min(total);
    (start, end)
}

#[async_trait]
impl RecognitionService for ScriptedService {
    async fn init_document(
        &self,
        _file: &InputFile,
        _recognition: &RecognitionConfig,
    ) -> Result<DocumentTask, ServiceError> {
        let mut s = self.script.lock().unwrap();
        s.inits += 1;
        Ok(DocumentTask {
            task_id: PDF_TASK.to_string(),
            total_pages: s.pdf_pages,
            thumbnails: vec![String::new(); s.pdf_pages as usize],
        })
    }

    async fn preview_page(&self, _task_id: &str, _page: u32) -> Result<String, ServiceError> {
        // "page"
        Ok("data:image/png;base64,cGFnZQ==".to_string())
    }

    async fn extract_pages(&self, task_id: &str) -> Result<Vec<ExtractedPage>, ServiceError> {
        let s = self.script.lock().unwrap();
        Ok((1..=s.pdf_pages)
            .map(|n| ExtractedPage {
                filename: format!("page_{}.png", n),
                file_url: Some(format!("/api/files/pdf_extract_{}/page_{}.png", task_id, n)),
                file_path: None,
                page_number: Some(n),
            })
            .collect())
    }

    async fn cancel_task(&self, task_id: &str) -> Result<(), ServiceError> {
        let hang = {
            let mut s = self.script.lock().unwrap();
            s.cancels.push(task_id.to_string());
            if s.fail_cancel {
                return Err(rejected("Task not found"));
            }
            s.hang_cancel
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn upload_items(&self, files: &[InputFile]) -> Result<UploadReceipt, ServiceError> {
        let mut s = self.script.lock().unwrap();
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        s.uploads.push(names.clone());
        if s.fail_upload {
            return Err(rejected("No valid image files"));
        }
        s.uploaded = names.clone();
        Ok(UploadReceipt {
            task_id: PREP_TASK.to_string(),
            accepted_count: s.accepted_override.unwrap_or(names.len() as u32),
            items: names
                .into_iter()
                .map(|name| UploadedItem {
                    raw_path: Some(format!("/srv/uploads/preprocess_{}/raw/{}", PREP_TASK, name)),
                    filename: name,
                })
                .collect(),
        })
    }

    async fn run_preprocessing(
        &self,
        _task_id: &str,
        _config: &PreprocessingConfig,
    ) -> Result<Vec<ItemOutcome>, ServiceError> {
        let mut s = self.script.lock().unwrap();
        s.process_calls += 1;
        if s.fail_process {
            return Err(ServiceError::Connection("connection reset".to_string()));
        }
        Ok(s.uploaded
            .iter()
            .map(|name| {
                if s.failing_items.contains(name) {
                    ItemOutcome {
                        filename: name.clone(),
                        status: ItemStatus::Failed,
                        processed_path: None,
                        processed_thumbnail: None,
                        error: Some("cannot identify image file".to_string()),
                    }
                } else {
                    ItemOutcome {
                        filename: name.clone(),
                        status: ItemStatus::Completed,
                        processed_path: Some(format!(
                            "/srv/uploads/preprocess_{}/processed/{}",
                            PREP_TASK, name
                        )),
                        processed_thumbnail: Some("data:image/png;base64,AA==".to_string()),
                        error: None,
                    }
                }
            })
            .collect())
    }

    async fn download_preprocessed(&self, _task_id: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(b"PK-processed".to_vec())
    }

    async fn upload_video(&self, _file: &InputFile) -> Result<VideoUpload, ServiceError> {
        Ok(VideoUpload {
            task_id: VIDEO_TASK.to_string(),
            video_info: None,
        })
    }

    async fn extract_frames(
        &self,
        task_id: &str,
        _settings: &FrameExtraction,
    ) -> Result<Vec<ExtractedFrame>, ServiceError> {
        let s = self.script.lock().unwrap();
        Ok((1..=s.video_frames)
            .map(|n| ExtractedFrame {
                index: n,
                path: format!("/srv/uploads/video_{}/frames/frame_{:06}.jpg", task_id, n - 1),
                thumbnail: None,
                selected: true,
            })
            .collect())
    }

    async fn download_frames(&self, _task_id: &str, indices: &[u32]) -> Result<Vec<u8>, ServiceError> {
        Ok(format!("PK-frames-{}", indices.len()).into_bytes())
    }

    async fn run_batch(
        &self,
        target: BatchTarget,
        request: &BatchRequest,
    ) -> Result<BatchResponse, ServiceError> {
        let mut s = self.script.lock().unwrap();
        s.batches.push((target, request.clone()));
        if let Some((index, handle)) = &s.stop_during_batch {
            if *index == request.batch_index {
                handle.request();
            }
        }
        if s.fail_batch_index == Some(request.batch_index) {
            s.fail_batch_index = None;
            return Err(rejected("Model not ready. Please check server status."));
        }

        let numbers: Vec<u32> = match target {
            BatchTarget::Document => (1..=s.pdf_pages).collect(),
            BatchTarget::Frames => request
                .processed_images
                .as_ref()
                .map(|m| m.keys().copied().collect())
                .unwrap_or_default(),
        };
        let total = numbers.len() as u32;
        let (start, end) = window(request.batch_index, request.batch_size, total);
        let empty = BTreeMap::new();
        let paths = request.processed_images.as_ref().unwrap_or(&empty);

        let results = numbers[start as usize..end as usize]
            .iter()
            .map(|n| BatchItem {
                page: *n,
                text: match paths.get(n) {
                    Some(path) => format!("text of {} from {}", n, path),
                    None => format!("text of {}", n),
                },
                error: None,
            })
            .collect();

        let has_more = end < total || s.next_index_override.is_some();
        let next_batch_index = match s.next_index_override {
            Some(next) => Some(next),
            None => has_more.then_some(request.batch_index + 1),
        };
        Ok(BatchResponse {
            results,
            has_more,
            next_batch_index,
            processed_count: end,
        })
    }

    async fn recognize_image(
        &self,
        file: &InputFile,
        _recognition: &RecognitionConfig,
    ) -> Result<String, ServiceError> {
        let mut s = self.script.lock().unwrap();
        s.recognized.push(file.clone());
        Ok(format!("text of {}", file.name))
    }

    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        let mut s = self.script.lock().unwrap();
        s.fetched.push(path.to_string());
        Ok(format!("bytes of {}", path).into_bytes())
    }

    async fn health(&self) -> Result<ServerHealth, ServiceError> {
        Ok(ServerHealth {
            status: "healthy".to_string(),
            model_loaded: true,
            model_healthy: true,
            active_tasks: 0,
            preprocess_tasks: 0,
            video_tasks: 0,
        })
    }
}
