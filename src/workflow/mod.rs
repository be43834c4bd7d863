//! Session workflow: source selection, preprocessing, batched OCR and tabs.

mod batch;
mod error;
mod events;
mod notice;
mod orchestrator;
mod preprocess;
mod registry;
mod release;
mod results;
mod session;
mod tabs;
#[cfg(test)]
mod testing;
mod video;

pub use batch::{transition, BatchExecutor, BatchSignal, BatchState, PagePreview, StopHandle};
pub use error::WorkflowError;
pub use events::WorkflowEvent;
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use orchestrator::{parse_indices, Action, Orchestrator, Outcome, StatusReport, ACTION_WORDS};
pub use preprocess::{reconcile_outcomes, PreprocessingCoordinator, PreprocessingSummary, Reconciled};
pub use registry::SourceRegistry;
pub use release::TaskReleaser;
pub use results::{ResultAggregator, ResultFlags};
pub use session::Session;
pub use tabs::{invalidation, Invalidation, OcrPanel, Tab, TabChange, TabContextManager};
pub use video::{FrameCollector, VideoWorkspace};
