//! Batched OCR execution.
//!
//! The executor walks the active source in windows of `batch_size` pages,
//! one request at a time. Between batches it either waits for `continue` or,
//! with auto-continue enabled, moves straight on. A stop request is honoured
//! before the next request is issued; a request already in flight completes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::WorkflowError;
use super::events::WorkflowEvent;
use super::preprocess::check_count;
use super::release::TaskReleaser;
use super::session::Session;
use crate::client::{
    BatchRequest, BatchTarget, RecognitionService, ServiceError, FRAME_SET_PLACEHOLDER_TASK,
};
use crate::config::MismatchPolicy;
use crate::models::{BatchCursor, FrameUpload, InputFile, Progress, Source, SourceKind};
use crate::utils::{decode_data_uri, parse_ordinal, ArtifactNaming};

/// Executor lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    AwaitingContinue,
    Stopped,
    Finished,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingContinue => "awaiting continue",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
        }
    }

    /// A run ended and a new `start` begins from scratch.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Finished)
    }
}

/// Inputs to the executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSignal {
    Start,
    Continue,
    Stop,
    BatchSucceeded { has_more: bool, auto_continue: bool },
    BatchFailed,
    Reset,
}

impl BatchSignal {
    fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Continue => "continue",
            Self::Stop => "stop",
            Self::BatchSucceeded { .. } | Self::BatchFailed => "complete a batch",
            Self::Reset => "reset",
        }
    }
}

/// Next executor state, or an error if `signal` is not valid in `state`.
pub fn transition(state: BatchState, signal: BatchSignal) -> Result<BatchState, WorkflowError> {
    use BatchSignal as S;
    use BatchState::*;

    let next = match (state, signal) {
        (_, S::Reset) => Idle,
        (Idle, S::Start) => Running,
        (AwaitingContinue | Stopped, S::Continue) => Running,
        (Running | AwaitingContinue, S::Stop) => Stopped,
        (Running, S::BatchSucceeded { has_more: false, .. }) => Finished,
        (Running, S::BatchSucceeded { auto_continue: true, .. }) => Running,
        (Running, S::BatchSucceeded { .. }) => AwaitingContinue,
        (Running, S::BatchFailed) => Stopped,
        (state, signal) => {
            return Err(WorkflowError::InvalidTransition {
                action: signal.action(),
                state: state.as_str(),
            })
        }
    };
    Ok(next)
}

/// Cooperative stop flag shared with signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Image shown for one page or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePreview {
    pub page: u32,
    pub bytes: Vec<u8>,
    /// The image is the preprocessed artifact rather than the raw page.
    pub from_artifact: bool,
}

/// Drives OCR over the session's source.
pub struct BatchExecutor {
    service: Arc<dyn RecognitionService>,
    releaser: TaskReleaser,
    stop: StopHandle,
    auto_continue: bool,
    policy: MismatchPolicy,
    events: Option<mpsc::Sender<WorkflowEvent>>,
}

impl BatchExecutor {
    pub fn new(service: Arc<dyn RecognitionService>, policy: MismatchPolicy) -> Self {
        Self {
            releaser: TaskReleaser::new(service.clone()),
            service,
            stop: StopHandle::default(),
            auto_continue: false,
            policy,
            events: None,
        }
    }

    pub fn with_auto_continue(mut self, auto: bool) -> Self {
        self.auto_continue = auto;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<WorkflowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_releaser(mut self, releaser: TaskReleaser) -> Self {
        self.releaser = releaser;
        self
    }

    pub fn auto_continue(&self) -> bool {
        self.auto_continue
    }

    pub fn set_auto_continue(&mut self, auto: bool) {
        self.auto_continue = auto;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }

    fn apply(session: &mut Session, signal: BatchSignal) -> Result<BatchState, WorkflowError> {
        let next = transition(session.batch_state, signal)?;
        debug!(
            "Batch state {} -> {}",
            session.batch_state.as_str(),
            next.as_str()
        );
        session.batch_state = next;
        Ok(next)
    }

    /// Change the batch size. Only allowed while no run is in progress.
    pub fn set_batch_size(&self, session: &mut Session, requested: i64) -> Result<u32, WorkflowError> {
        if !matches!(session.batch_state, BatchState::Idle | BatchState::Finished) {
            return Err(WorkflowError::InvalidTransition {
                action: "change the batch size",
                state: session.batch_state.as_str(),
            });
        }
        if session.cursor.set_batch_size(requested) {
            let size = session.cursor.batch_size();
            warn!("Batch size {} out of range, using {}", requested, size);
            session
                .notices
                .warn(format!("Batch size must be between 1 and 50; using {}", size));
        }
        Ok(session.cursor.batch_size())
    }

    /// Return to `Idle` with an empty result set.
    pub fn reset(&self, session: &mut Session) {
        session.batch_state = BatchState::Idle;
        session.cursor.rewind();
        session.results.reset();
        session.progress = Progress::new(session.total_count());
        self.stop.clear();
    }

    /// Begin a fresh run from the first batch.
    pub async fn start(&self, session: &mut Session) -> Result<BatchState, WorkflowError> {
        if session.source().is_none() {
            return Err(WorkflowError::NoSource);
        }
        if session.batch_state.is_terminal() {
            self.reset(session);
        }
        Self::apply(session, BatchSignal::Start)?;

        session.results.reset();
        session.cursor.rewind();
        session.progress = Progress::new(session.total_count());
        self.stop.clear();

        info!(
            "Session {}: OCR over {} item(s), batch size {}",
            session.id(),
            session.progress.total,
            session.cursor.batch_size()
        );
        self.emit(WorkflowEvent::Started {
            total: session.progress.total,
        })
        .await;

        self.drive(session).await
    }

    /// Resume from the cursor after a pause, stop or failure.
    pub async fn resume(&self, session: &mut Session) -> Result<BatchState, WorkflowError> {
        Self::apply(session, BatchSignal::Continue)?;
        self.stop.clear();
        self.drive(session).await
    }

    /// Stop before the next batch.
    pub async fn stop(&self, session: &mut Session) -> Result<BatchState, WorkflowError> {
        let state = Self::apply(session, BatchSignal::Stop)?;
        self.stop.request();
        self.emit(WorkflowEvent::Stopped { reason: None }).await;
        Ok(state)
    }

    async fn drive(&self, session: &mut Session) -> Result<BatchState, WorkflowError> {
        loop {
            if self.stop.is_requested() {
                info!("Stop requested; halting before batch {}", session.cursor.batch_index);
                let state = Self::apply(session, BatchSignal::Stop)?;
                self.emit(WorkflowEvent::Stopped { reason: None }).await;
                return Ok(state);
            }

            let has_more = match self.run_batch(session).await {
                Ok(has_more) => has_more,
                Err(e) => {
                    warn!("Batch {} failed: {}", session.cursor.batch_index, e);
                    Self::apply(session, BatchSignal::BatchFailed)?;
                    let message = e.user_message();
                    session.results.record_error(message.clone());
                    self.emit(WorkflowEvent::Stopped {
                        reason: Some(message),
                    })
                    .await;
                    return Err(e);
                }
            };

            let state = Self::apply(
                session,
                BatchSignal::BatchSucceeded {
                    has_more,
                    auto_continue: self.auto_continue,
                },
            )?;
            match state {
                BatchState::Finished => {
                    self.finish(session).await;
                    return Ok(state);
                }
                BatchState::AwaitingContinue => {
                    self.emit(WorkflowEvent::AwaitingContinue {
                        processed: session.progress.processed,
                        total: session.progress.total,
                    })
                    .await;
                    return Ok(state);
                }
                _ => {}
            }
        }
    }

    async fn finish(&self, session: &mut Session) {
        session.results.mark_complete();
        let Progress { processed, total } = session.progress;
        info!("Session {}: OCR finished, {}/{}", session.id(), processed, total);

        if let Some(task) = session.source_mut().and_then(Source::release_task) {
            self.releaser.release(task);
        }
        self.emit(WorkflowEvent::Finished { processed, total }).await;
    }

    /// Run the batch under the cursor. Returns whether more work remains.
    async fn run_batch(&self, session: &mut Session) -> Result<bool, WorkflowError> {
        let total = session.total_count();
        let batch_index = session.cursor.batch_index;
        let (first, last) = session.cursor.window(total);
        if first > last {
            return Ok(false);
        }
        self.emit(WorkflowEvent::BatchStarted {
            batch_index,
            first,
            last,
        })
        .await;

        if let Some(Source::SingleImage { file, processed }) = session.source() {
            let file = match processed {
                Some(processed) if session.preprocessing.applied() => processed,
                _ => file,
            };
            let text = self
                .service
                .recognize_image(file, &session.recognition)
                .await?;
            self.record(session, 1, text, None).await;
            session.progress.record(1);
            self.emit(WorkflowEvent::BatchCompleted {
                processed: session.progress.processed,
                total,
                has_more: false,
            })
            .await;
            return Ok(false);
        }

        let (target, request) = self.build_request(session).await?;
        debug!(
            "Batch {} covers {}..={} ({} mapped paths)",
            batch_index,
            first,
            last,
            request.processed_images.as_ref().map_or(0, BTreeMap::len)
        );
        let response = self.service.run_batch(target, &request).await?;
        check_count(
            self.policy,
            &mut session.notices,
            "batch results",
            last - first + 1,
            response.results.len() as u32,
        )?;

        for item in response.results {
            self.record(session, item.page, item.text, item.error).await;
        }
        let processed = if response.processed_count > 0 {
            response.processed_count
        } else {
            last
        };
        session.progress.record(processed);

        let batches = session.cursor.batch_count(total);
        let following = batch_index.saturating_add(1);
        let has_more = response.has_more && following < batches;
        if response.has_more && !has_more {
            warn!(
                "Backend reported more work after the last of {} batches; finishing",
                batches
            );
        }
        if has_more {
            session.cursor.batch_index = match response.next_batch_index {
                Some(next) if next > batch_index && next < batches => next,
                other => {
                    if other.is_some() {
                        warn!("Ignoring out-of-range next batch index {:?}", other);
                    }
                    following
                }
            };
        }
        self.emit(WorkflowEvent::BatchCompleted {
            processed: session.progress.processed,
            total,
            has_more,
        })
        .await;
        Ok(has_more)
    }

    async fn record(&self, session: &mut Session, number: u32, text: String, error: Option<String>) {
        let chars = text.chars().count();
        let failed = error.is_some();
        if session.results.append(number, text, error) {
            self.emit(WorkflowEvent::PageRecognized {
                number,
                chars,
                failed,
            })
            .await;
        } else {
            debug!("Result for {} already recorded", number);
        }
    }

    async fn build_request(&self, session: &mut Session) -> Result<(BatchTarget, BatchRequest), WorkflowError> {
        let batch_index = session.cursor.batch_index;
        let batch_size = session.cursor.batch_size();

        match session.kind() {
            Some(SourceKind::Pdf) => {
                let task_id = session
                    .source()
                    .and_then(Source::server_task)
                    .ok_or_else(|| {
                        WorkflowError::NotApplicable(
                            "The document has not been initialized".to_string(),
                        )
                    })?
                    .to_string();
                let paths = session.preprocessing.processed_paths();
                Ok((
                    BatchTarget::Document,
                    BatchRequest {
                        task_id,
                        batch_index,
                        batch_size,
                        processed_images: (!paths.is_empty()).then_some(paths),
                        recognition: None,
                    },
                ))
            }
            Some(SourceKind::FrameSet) => {
                let upload = self.ensure_frame_upload(session).await?;
                let mut paths = upload.raw_paths;
                paths.extend(session.preprocessing.processed_paths());
                let task_id = if upload.task_id.is_empty() {
                    FRAME_SET_PLACEHOLDER_TASK.to_string()
                } else {
                    upload.task_id
                };
                Ok((
                    BatchTarget::Frames,
                    BatchRequest {
                        task_id,
                        batch_index,
                        batch_size,
                        processed_images: Some(paths),
                        recognition: Some(session.recognition.clone()),
                    },
                ))
            }
            Some(SourceKind::Image) => Err(WorkflowError::NotApplicable(
                "Still images are recognized in a single request".to_string(),
            )),
            None => Err(WorkflowError::NoSource),
        }
    }

    /// Upload a frame set that was never preprocessed, once.
    async fn ensure_frame_upload(&self, session: &mut Session) -> Result<FrameUpload, WorkflowError> {
        let frames = match session.source() {
            Some(Source::FrameSet {
                upload: Some(upload),
                ..
            }) => return Ok(upload.clone()),
            Some(Source::FrameSet { frames, .. }) => frames.clone(),
            _ => return Err(WorkflowError::NotApplicable("The source is not a frame set".to_string())),
        };

        let files: Vec<InputFile> = frames
            .into_iter()
            .map(|frame| InputFile {
                name: ArtifactNaming::Frame.file_name(frame.index),
                ..frame.file
            })
            .collect();
        info!("Uploading {} frames for OCR", files.len());

        let receipt = self
            .service
            .upload_items(&files)
            .await
            .map_err(WorkflowError::Upload)?;
        check_count(
            self.policy,
            &mut session.notices,
            "accepted uploads",
            files.len() as u32,
            receipt.accepted_count,
        )?;

        let raw_paths = receipt
            .items
            .iter()
            .filter_map(|item| {
                let index = parse_ordinal(ArtifactNaming::Frame, &item.filename)?;
                Some((index, item.raw_path.clone()?))
            })
            .collect();
        let upload = FrameUpload {
            task_id: receipt.task_id,
            raw_paths,
        };
        if let Some(Source::FrameSet { upload: slot, .. }) = session.source_mut() {
            *slot = Some(upload.clone());
        }
        Ok(upload)
    }

    /// Recognize one page as a batch of size 1.
    pub async fn run_single(&self, session: &mut Session, page: u32) -> Result<(), WorkflowError> {
        if matches!(session.batch_state, BatchState::Running) {
            return Err(WorkflowError::InvalidTransition {
                action: "recognize a single page",
                state: session.batch_state.as_str(),
            });
        }
        let total = session.total_count();
        if page == 0 || page > total {
            return Err(WorkflowError::PageOutOfRange { page, total });
        }

        self.reset(session);
        Self::apply(session, BatchSignal::Start)?;
        let saved = session.cursor;
        session.cursor = BatchCursor::new(1);
        session.cursor.batch_index = page - 1;

        info!("Session {}: single-page OCR of {}", session.id(), page);
        let outcome = self.run_batch(session).await;

        session.cursor = saved;
        session.cursor.rewind();
        session.batch_state = BatchState::Idle;
        session.progress = Progress::new(total);
        match outcome {
            Ok(_) => {
                session.progress.record(session.results.len() as u32);
                Ok(())
            }
            Err(e) => {
                session.results.record_error(e.user_message());
                Err(e)
            }
        }
    }

    /// Image for one page: the preprocessed artifact when there is one,
    /// otherwise the raw page.
    pub async fn preview_page(&self, session: &Session, page: u32) -> Result<PagePreview, WorkflowError> {
        let total = session.total_count();
        if page == 0 || page > total {
            return Err(WorkflowError::PageOutOfRange { page, total });
        }

        if let Some(Source::SingleImage { file, processed }) = session.source() {
            return Ok(match processed {
                Some(processed) if session.preprocessing.applied() => PagePreview {
                    page,
                    bytes: processed.bytes.clone(),
                    from_artifact: true,
                },
                _ => PagePreview {
                    page,
                    bytes: file.bytes.clone(),
                    from_artifact: false,
                },
            });
        }

        if let Some(artifact) = session.preprocessing.artifact(page) {
            let bytes = self.service.fetch_file(&artifact.processed_path).await?;
            return Ok(PagePreview {
                page,
                bytes,
                from_artifact: true,
            });
        }

        let bytes = match session.source() {
            Some(Source::PdfDocument { task: Some(task), .. }) => {
                let uri = self.service.preview_page(&task.task_id, page).await?;
                decode_data_uri(&uri).map_err(|e| {
                    WorkflowError::Service(ServiceError::Malformed(format!(
                        "page preview is not valid base64: {}",
                        e
                    )))
                })?
            }
            Some(Source::FrameSet { frames, .. }) => frames
                .iter()
                .find(|f| f.index == page)
                .map(|f| f.file.bytes.clone())
                .ok_or(WorkflowError::PageOutOfRange { page, total })?,
            _ => {
                return Err(WorkflowError::NotApplicable(
                    "The document has not been initialized".to_string(),
                ))
            }
        };
        Ok(PagePreview {
            page,
            bytes,
            from_artifact: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PreprocessingState;
    use crate::workflow::registry::SourceRegistry;
    use crate::workflow::testing::{settle, ScriptedService, PDF_TASK, PREP_TASK};

    async fn pdf_session(service: &Arc<ScriptedService>, batch_size: u32) -> Session {
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();
        session.cursor = BatchCursor::new(batch_size);
        registry
            .ingest(&mut session, InputFile::new("doc.pdf", "application/pdf", vec![]))
            .await
            .unwrap();
        registry.ensure_document_task(&mut session).await.unwrap();
        session.preprocessing = PreprocessingState::skipped();
        session
    }

    fn numbers(session: &Session) -> Vec<u32> {
        session.results.items().iter().map(|r| r.number).collect()
    }

    #[test]
    fn test_transition_table() {
        use BatchSignal as S;
        use BatchState::*;

        assert_eq!(transition(Idle, S::Start).unwrap(), Running);
        assert_eq!(transition(AwaitingContinue, S::Continue).unwrap(), Running);
        assert_eq!(transition(Stopped, S::Continue).unwrap(), Running);
        assert_eq!(transition(Running, S::Stop).unwrap(), Stopped);
        assert_eq!(transition(AwaitingContinue, S::Stop).unwrap(), Stopped);
        assert_eq!(
            transition(Running, S::BatchSucceeded { has_more: true, auto_continue: false }).unwrap(),
            AwaitingContinue
        );
        assert_eq!(
            transition(Running, S::BatchSucceeded { has_more: true, auto_continue: true }).unwrap(),
            Running
        );
        assert_eq!(
            transition(Running, S::BatchSucceeded { has_more: false, auto_continue: true }).unwrap(),
            Finished
        );
        assert_eq!(transition(Running, S::BatchFailed).unwrap(), Stopped);
        assert_eq!(transition(Finished, S::Reset).unwrap(), Idle);

        assert!(transition(Running, S::Start).is_err());
        assert!(transition(Idle, S::Continue).is_err());
        assert!(transition(Finished, S::Continue).is_err());
        assert!(transition(Idle, S::Stop).is_err());
        assert!(transition(Finished, S::Stop).is_err());
    }

    #[tokio::test]
    async fn test_five_pages_in_three_batches() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::AwaitingContinue);
        assert_eq!(session.progress.processed, 2);
        assert_eq!(executor.resume(&mut session).await.unwrap(), BatchState::AwaitingContinue);
        assert_eq!(executor.resume(&mut session).await.unwrap(), BatchState::Finished);

        assert_eq!(service.batch_windows(), vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(numbers(&session), vec![1, 2, 3, 4, 5]);
        assert_eq!(session.progress, Progress { processed: 5, total: 5 });
        assert!(session.results.flags().complete);
        // the task is released once the run finishes
        settle().await;
        assert_eq!(service.read(|s| s.cancels.clone()), vec![PDF_TASK.to_string()]);
        assert!(session.source().and_then(Source::server_task).is_none());
    }

    #[tokio::test]
    async fn test_batches_cover_every_page_once() {
        for (total, size) in [(1, 1), (7, 3), (50, 50), (51, 50), (10, 1)] {
            let service = Arc::new(ScriptedService::with_pdf_pages(total));
            let (tx, mut rx) = mpsc::channel(512);
            let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn)
                .with_auto_continue(true)
                .with_events(tx);
            let mut session = pdf_session(&service, size).await;

            let state = executor.start(&mut session).await.unwrap();
            assert_eq!(state, BatchState::Finished, "{} pages by {}", total, size);
            drop(executor);

            let batches = total.div_ceil(size);
            let expected: Vec<(u32, u32)> = (0..batches).map(|i| (i, size)).collect();
            assert_eq!(service.batch_windows(), expected, "{} pages by {}", total, size);

            let mut windows = Vec::new();
            while let Some(event) = rx.recv().await {
                if let WorkflowEvent::BatchStarted { first, last, .. } = event {
                    windows.push((first, last));
                }
            }
            assert_eq!(windows.len() as u32, batches);
            let mut next = 1;
            for (first, last) in windows {
                assert_eq!(first, next, "{} pages by {}", total, size);
                assert!(last >= first && last - first < size);
                next = last + 1;
            }
            assert_eq!(next, total + 1);

            assert_eq!(session.progress, Progress { processed: total, total });
            assert_eq!(numbers(&session), (1..=total).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_out_of_range_next_index_is_not_followed() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        service.edit(|s| s.next_index_override = Some(u32::MAX));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::AwaitingContinue);
        assert_eq!(session.cursor.batch_index, 1);
        assert_eq!(executor.resume(&mut session).await.unwrap(), BatchState::AwaitingContinue);
        assert_eq!(session.cursor.batch_index, 2);
        // the backend still claims more work, but every page is covered
        assert_eq!(executor.resume(&mut session).await.unwrap(), BatchState::Finished);

        assert_eq!(service.batch_windows(), vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(numbers(&session), vec![1, 2, 3, 4, 5]);
        assert_eq!(session.progress, Progress { processed: 5, total: 5 });
    }

    #[tokio::test]
    async fn test_stop_then_continue_does_not_repeat_pages() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        executor.start(&mut session).await.unwrap();
        assert_eq!(executor.stop(&mut session).await.unwrap(), BatchState::Stopped);
        assert!(executor.stop(&mut session).await.is_err());

        executor.resume(&mut session).await.unwrap();
        executor.resume(&mut session).await.unwrap();

        assert_eq!(service.batch_windows(), vec![(0, 2), (1, 2), (2, 2)]);
        assert_eq!(numbers(&session), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_failed_batch_stops_and_can_be_retried() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        service.edit(|s| s.fail_batch_index = Some(1));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        executor.start(&mut session).await.unwrap();
        let err = executor.resume(&mut session).await.unwrap_err();
        assert!(err.user_message().contains("Model not ready"));
        assert_eq!(session.batch_state, BatchState::Stopped);
        assert_eq!(session.cursor.batch_index, 1);
        assert_eq!(numbers(&session), vec![1, 2]);
        assert!(session.results.flags().error.is_some());

        executor.resume(&mut session).await.unwrap();
        assert_eq!(numbers(&session), vec![1, 2, 3, 4]);
        assert_eq!(service.batch_windows(), vec![(0, 2), (1, 2), (1, 2)]);
    }

    #[tokio::test]
    async fn test_auto_continue_runs_to_completion() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let (tx, mut rx) = mpsc::channel(100);
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn)
            .with_auto_continue(true)
            .with_events(tx);
        let mut session = pdf_session(&service, 2).await;

        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::Finished);
        assert_eq!(service.batch_windows().len(), 3);
        drop(executor);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.first(), Some(&WorkflowEvent::Started { total: 5 }));
        assert_eq!(
            events.last(),
            Some(&WorkflowEvent::Finished {
                processed: 5,
                total: 5
            })
        );
        let recognized = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::PageRecognized { .. }))
            .count();
        assert_eq!(recognized, 5);
    }

    #[tokio::test]
    async fn test_stop_during_auto_continue_lets_batch_finish() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let executor =
            BatchExecutor::new(service.clone(), MismatchPolicy::Warn).with_auto_continue(true);
        service.edit(|s| s.stop_during_batch = Some((1, executor.stop_handle())));
        let mut session = pdf_session(&service, 2).await;

        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::Stopped);
        assert_eq!(numbers(&session), vec![1, 2, 3, 4]);

        service.edit(|s| s.stop_during_batch = None);
        assert_eq!(executor.resume(&mut session).await.unwrap(), BatchState::Finished);
        assert_eq!(service.batch_windows(), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_start_after_finish_begins_again() {
        let service = Arc::new(ScriptedService::with_pdf_pages(1));
        let registry = SourceRegistry::new(service.clone());
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        executor.start(&mut session).await.unwrap();
        assert_eq!(session.batch_state, BatchState::Finished);

        registry.ensure_document_task(&mut session).await.unwrap();
        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::Finished);
        assert_eq!(numbers(&session), vec![1]);
        assert_eq!(service.read(|s| s.inits), 2);
    }

    #[tokio::test]
    async fn test_processed_paths_sent_only_when_applied() {
        let service = Arc::new(ScriptedService::with_pdf_pages(2));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        executor.start(&mut session).await.unwrap();
        let (target, request) = service.read(|s| s.batches[0].clone());
        assert_eq!(target, BatchTarget::Document);
        assert!(request.processed_images.is_none());
        assert!(request.recognition.is_none());
    }

    #[tokio::test]
    async fn test_frame_set_is_uploaded_once() {
        let service = Arc::new(ScriptedService::default());
        let registry = SourceRegistry::new(service.clone());
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = Session::default();
        let frames = (0..3)
            .map(|i| InputFile::new(format!("f{}.jpg", i), "image/jpeg", vec![i]))
            .collect();
        registry.ingest_frames(&mut session, frames).await.unwrap();
        session.preprocessing = PreprocessingState::skipped();

        executor.start(&mut session).await.unwrap();
        executor.resume(&mut session).await.unwrap();

        assert_eq!(service.read(|s| s.uploads.len()), 1);
        let (target, request) = service.read(|s| s.batches[1].clone());
        assert_eq!(target, BatchTarget::Frames);
        assert_eq!(request.task_id, PREP_TASK);
        assert_eq!(request.processed_images.as_ref().map(BTreeMap::len), Some(3));
        assert!(request.recognition.is_some());
        assert_eq!(
            session.results.items()[0].text,
            format!("text of 1 from /srv/uploads/preprocess_{}/raw/frame_1.jpg", PREP_TASK)
        );
        assert_eq!(numbers(&session), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_single_image_uses_original_when_skipped() {
        let service = Arc::new(ScriptedService::default());
        let registry = SourceRegistry::new(service.clone());
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = Session::default();
        let original = InputFile::new("scan.png", "image/png", vec![0x89, b'P']);
        registry.ingest(&mut session, original.clone()).await.unwrap();
        session.preprocessing = PreprocessingState::skipped();

        assert_eq!(executor.start(&mut session).await.unwrap(), BatchState::Finished);
        assert_eq!(service.read(|s| s.recognized.clone()), vec![original]);
        assert_eq!(session.results.items()[0].text, "text of scan.png");
        assert!(service.read(|s| s.batches.is_empty() && s.cancels.is_empty()));
    }

    #[tokio::test]
    async fn test_single_page_mode() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        assert!(matches!(
            executor.run_single(&mut session, 6).await,
            Err(WorkflowError::PageOutOfRange { page: 6, total: 5 })
        ));

        executor.run_single(&mut session, 4).await.unwrap();
        assert_eq!(service.batch_windows(), vec![(3, 1)]);
        assert_eq!(numbers(&session), vec![4]);
        assert_eq!(session.batch_state, BatchState::Idle);
        assert_eq!(session.cursor.batch_size(), 2);
        assert_eq!(session.cursor.batch_index, 0);
        assert!(service.read(|s| s.cancels.is_empty()));
    }

    #[tokio::test]
    async fn test_batch_size_changes_only_when_idle() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;

        assert_eq!(executor.set_batch_size(&mut session, 80).unwrap(), 50);
        assert_eq!(session.notices.take_undelivered().len(), 1);
        assert_eq!(executor.set_batch_size(&mut session, 2).unwrap(), 2);

        executor.start(&mut session).await.unwrap();
        assert!(executor.set_batch_size(&mut session, 3).is_err());
    }

    #[tokio::test]
    async fn test_preview_prefers_artifact() {
        let service = Arc::new(ScriptedService::with_pdf_pages(3));
        let executor = BatchExecutor::new(service.clone(), MismatchPolicy::Warn);
        let mut session = pdf_session(&service, 2).await;
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            1,
            crate::models::ProcessingArtifact {
                index: 1,
                processed_path: "/srv/p/processed/page_1.png".to_string(),
                processed_thumbnail: None,
            },
        );
        session.preprocessing = PreprocessingState::executed("p".to_string(), artifacts);

        let first = executor.preview_page(&session, 1).await.unwrap();
        assert!(first.from_artifact);
        assert_eq!(first.bytes, b"bytes of /srv/p/processed/page_1.png".to_vec());

        let second = executor.preview_page(&session, 2).await.unwrap();
        assert!(!second.from_artifact);
        assert_eq!(second.bytes, b"page".to_vec());

        assert!(executor.preview_page(&session, 4).await.is_err());
    }
}
