//! Video frame extraction and selection.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::WorkflowError;
use super::session::Session;
use crate::client::{ExtractedFrame, FrameExtraction, RecognitionService, VideoUpload};
use crate::models::InputFile;
use crate::utils::{classify_mime, ArtifactNaming, InputCategory, VIDEO_EXTENSIONS};

/// Video tab state.
#[derive(Debug, Clone, Default)]
pub struct VideoWorkspace {
    pub video: Option<InputFile>,
    pub upload: Option<VideoUpload>,
    pub frames: Vec<ExtractedFrame>,
}

impl VideoWorkspace {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn task_id(&self) -> Option<&str> {
        self.upload.as_ref().map(|u| u.task_id.as_str())
    }

    pub fn selected_indices(&self) -> Vec<u32> {
        self.frames
            .iter()
            .filter(|f| f.selected)
            .map(|f| f.index)
            .collect()
    }

    /// Flip one frame's selection. Returns the new state, or None if no such frame.
    pub fn toggle(&mut self, index: u32) -> Option<bool> {
        let frame = self.frames.iter_mut().find(|f| f.index == index)?;
        frame.selected = !frame.selected;
        Some(frame.selected)
    }

    pub fn select_all(&mut self, selected: bool) {
        for frame in &mut self.frames {
            frame.selected = selected;
        }
    }

    /// Select exactly `indices`. Unknown indices are returned.
    pub fn select_only(&mut self, indices: &[u32]) -> Vec<u32> {
        for frame in &mut self.frames {
            frame.selected = indices.contains(&frame.index);
        }
        indices
            .iter()
            .copied()
            .filter(|i| !self.frames.iter().any(|f| f.index == *i))
            .collect()
    }
}

fn is_video(file: &InputFile) -> bool {
    if classify_mime(&file.mime_type) == InputCategory::Video {
        return true;
    }
    Path::new(&file.name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Talks to the backend's video endpoints.
pub struct FrameCollector {
    service: Arc<dyn RecognitionService>,
}

impl FrameCollector {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self { service }
    }

    /// Upload a video, replacing any previous one.
    pub async fn load_video(
        &self,
        session: &mut Session,
        file: InputFile,
    ) -> Result<VideoUpload, WorkflowError> {
        if !is_video(&file) {
            return Err(WorkflowError::UnsupportedType {
                name: file.name,
                mime: file.mime_type,
            });
        }

        let upload = self
            .service
            .upload_video(&file)
            .await
            .map_err(WorkflowError::Upload)?;
        info!("Uploaded video {} as task {}", file.name, upload.task_id);

        session.video = VideoWorkspace {
            video: Some(file),
            upload: Some(upload.clone()),
            frames: Vec::new(),
        };
        Ok(upload)
    }

    /// Extract frames from the uploaded video. All frames start selected.
    pub async fn extract(
        &self,
        session: &mut Session,
        settings: &FrameExtraction,
    ) -> Result<usize, WorkflowError> {
        if settings.total_frames == 0 || settings.interval <= 0.0 {
            return Err(WorkflowError::NotApplicable(
                "Frame count and interval must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&settings.sensitivity) {
            return Err(WorkflowError::NotApplicable(
                "Scene sensitivity must be between 0 and 1".to_string(),
            ));
        }
        let task_id = session
            .video
            .task_id()
            .ok_or_else(|| WorkflowError::NotApplicable("Load a video first".to_string()))?
            .to_string();

        let mut frames = self.service.extract_frames(&task_id, settings).await?;
        for frame in &mut frames {
            frame.selected = true;
        }
        info!("Extracted {} frames from task {}", frames.len(), task_id);
        let count = frames.len();
        session.video.frames = frames;
        Ok(count)
    }

    /// Archive of the selected frames.
    pub async fn download(&self, session: &Session) -> Result<Vec<u8>, WorkflowError> {
        let task_id = session
            .video
            .task_id()
            .ok_or_else(|| WorkflowError::NotApplicable("Load a video first".to_string()))?;
        let selected = session.video.selected_indices();
        if selected.is_empty() {
            return Err(WorkflowError::NotApplicable("No frames selected".to_string()));
        }
        Ok(self.service.download_frames(task_id, &selected).await?)
    }

    /// Fetch the selected frames' images for OCR.
    pub async fn collect_selected(&self, session: &Session) -> Result<Vec<InputFile>, WorkflowError> {
        let selected: Vec<&ExtractedFrame> =
            session.video.frames.iter().filter(|f| f.selected).collect();
        if selected.is_empty() {
            return Err(WorkflowError::NotApplicable("No frames selected".to_string()));
        }

        let mut files = Vec::with_capacity(selected.len());
        for frame in selected {
            match self.service.fetch_file(&frame.path).await {
                Ok(bytes) => files.push(InputFile::new(
                    ArtifactNaming::Frame.file_name(frame.index),
                    "image/jpeg",
                    bytes,
                )),
                Err(e) => warn!("Failed to fetch frame {}: {}", frame.index, e),
            }
        }
        if files.is_empty() {
            return Err(WorkflowError::NotApplicable(
                "None of the selected frames could be fetched".to_string(),
            ));
        }
        Ok(files)
    }
}
