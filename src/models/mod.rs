//! Data models for ocrflow.

mod batch;
mod preprocessing;
mod recognition;
mod result;
mod source;

pub use batch::{
    clamp_batch_size, BatchCursor, Progress, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
pub use preprocessing::{
    PreprocessingConfig, PreprocessingDecision, PreprocessingState, ProcessingArtifact,
};
pub use recognition::{Complexity, ContentType, RecognitionConfig};
pub use result::OcrResult;
pub use source::{DocumentTask, Frame, FrameUpload, InputFile, Source, SourceKind};
