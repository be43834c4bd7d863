//! ocrflow - workflow controller for a multi-modal document recognition backend.
//!
//! A session holds one input source (a still image, a multi-page PDF or a set of
//! video frames), optionally runs server-side preprocessing over its pages, and
//! then drives the backend's OCR engine over the pages in resumable batches.

pub mod client;
pub mod config;
pub mod models;
pub mod utils;
pub mod workflow;

pub use client::{HttpRecognitionClient, RecognitionService, ServiceError};
pub use config::Config;
pub use workflow::{Orchestrator, Session, WorkflowError};
