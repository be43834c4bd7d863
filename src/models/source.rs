//! Input sources: still images, PDF documents and frame sets.

use std::collections::BTreeMap;
use std::path::Path;

use crate::utils::{detect_mime, ArtifactNaming};

/// A file held in memory, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build a file whose MIME type is detected from its content and name.
    pub fn detect(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = detect_mime(&bytes, &name);
        Self::new(name, mime_type, bytes)
    }

    /// Read a file from disk.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::detect(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Classification of the active source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Pdf,
    FrameSet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::FrameSet => "frame set",
        }
    }

    /// Filename pattern the backend uses for this kind's items.
    pub fn naming(&self) -> ArtifactNaming {
        match self {
            Self::Image | Self::Pdf => ArtifactNaming::Page,
            Self::FrameSet => ArtifactNaming::Frame,
        }
    }
}

/// Server-side rasterization task for a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTask {
    pub task_id: String,
    pub total_pages: u32,
    /// Inline `data:` thumbnails, one per page.
    pub thumbnails: Vec<String>,
}

/// One frame of a frame set. `index` is 1-based and contiguous within the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    pub file: InputFile,
}

/// Frames uploaded to the backend, keyed by frame index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameUpload {
    pub task_id: String,
    pub raw_paths: BTreeMap<u32, String>,
}

/// The single active input of a session.
#[derive(Debug, Clone)]
pub enum Source {
    SingleImage {
        file: InputFile,
        /// Preprocessed replacement fetched back from the backend.
        processed: Option<InputFile>,
    },
    PdfDocument {
        file: InputFile,
        /// Created lazily when OCR or preprocessing first needs it.
        task: Option<DocumentTask>,
    },
    FrameSet {
        frames: Vec<Frame>,
        upload: Option<FrameUpload>,
    },
}

impl Source {
    pub fn image(file: InputFile) -> Self {
        Self::SingleImage {
            file,
            processed: None,
        }
    }

    pub fn pdf(file: InputFile) -> Self {
        Self::PdfDocument { file, task: None }
    }

    /// Build a frame set, numbering frames 1..=n in the given order.
    pub fn frames(files: Vec<InputFile>) -> Self {
        let frames = files
            .into_iter()
            .zip(1u32..)
            .map(|(file, index)| Frame { index, file })
            .collect();
        Self::FrameSet {
            frames,
            upload: None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::SingleImage { .. } => SourceKind::Image,
            Self::PdfDocument { .. } => SourceKind::Pdf,
            Self::FrameSet { .. } => SourceKind::FrameSet,
        }
    }

    /// Number of addressable pages or frames. Zero for a PDF not yet initialized.
    pub fn total_count(&self) -> u32 {
        match self {
            Self::SingleImage { .. } => 1,
            Self::PdfDocument { task, .. } => task.as_ref().map_or(0, |t| t.total_pages),
            Self::FrameSet { frames, .. } => frames.len() as u32,
        }
    }

    /// Identifier of the backend task tied to this source, if any.
    pub fn server_task(&self) -> Option<&str> {
        match self {
            Self::SingleImage { .. } => None,
            Self::PdfDocument { task, .. } => task.as_ref().map(|t| t.task_id.as_str()),
            Self::FrameSet { upload, .. } => upload.as_ref().map(|u| u.task_id.as_str()),
        }
    }

    /// Detach the PDF rasterization task, returning its id.
    pub fn release_task(&mut self) -> Option<String> {
        match self {
            Self::PdfDocument { task, .. } => task.take().map(|t| t.task_id),
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::SingleImage { file, .. } | Self::PdfDocument { file, .. } => file.name.clone(),
            Self::FrameSet { frames, .. } => format!("{} frames", frames.len()),
        }
    }
}
