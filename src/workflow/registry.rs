//! The single active input source.

use std::sync::Arc;

use tracing::info;

use super::error::WorkflowError;
use super::release::TaskReleaser;
use super::session::Session;
use crate::client::RecognitionService;
use crate::models::{DocumentTask, InputFile, Progress, Source, SourceKind};
use crate::utils::{classify_mime, InputCategory};

/// Installs and tears down the session's source.
pub struct SourceRegistry {
    service: Arc<dyn RecognitionService>,
    releaser: TaskReleaser,
}

impl SourceRegistry {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            releaser: TaskReleaser::new(service.clone()),
            service,
        }
    }

    pub fn with_releaser(mut self, releaser: TaskReleaser) -> Self {
        self.releaser = releaser;
        self
    }

    /// Replace the source with a user-selected file.
    ///
    /// Only PNG, JPEG and PDF are accepted; anything else leaves the session
    /// untouched.
    pub async fn ingest(
        &self,
        session: &mut Session,
        file: InputFile,
    ) -> Result<SourceKind, WorkflowError> {
        let source = Self::admit(file)?;
        Ok(self.install(session, source))
    }

    /// Turn a user-selected file into a source without touching any session.
    pub fn admit(file: InputFile) -> Result<Source, WorkflowError> {
        match classify_mime(&file.mime_type) {
            InputCategory::Image => Ok(Source::image(file)),
            InputCategory::Pdf => Ok(Source::pdf(file)),
            InputCategory::Video | InputCategory::Unsupported => {
                Err(WorkflowError::UnsupportedType {
                    name: file.name,
                    mime: file.mime_type,
                })
            }
        }
    }

    /// Replace the source with frames taken from a video. Any image type is accepted.
    pub async fn ingest_frames(
        &self,
        session: &mut Session,
        frames: Vec<InputFile>,
    ) -> Result<SourceKind, WorkflowError> {
        if frames.is_empty() {
            return Err(WorkflowError::NotApplicable(
                "No frames to send to OCR".to_string(),
            ));
        }
        Ok(self.install(session, Source::frames(frames)))
    }

    /// Classification of the current source.
    pub fn classify(session: &Session) -> Option<SourceKind> {
        session.kind()
    }

    /// Drop the current source and everything derived from it.
    pub async fn clear(&self, session: &mut Session) {
        if let Some(task) = session.teardown() {
            self.releaser.release(task);
        }
    }

    /// Make `source` the active source, tearing down the previous one.
    pub fn install(&self, session: &mut Session, source: Source) -> SourceKind {
        let kind = source.kind();
        info!(
            "Session {}: ingesting {} ({})",
            session.id(),
            source.display_name(),
            kind.as_str()
        );
        let previous = session.teardown();
        session.install_source(source);
        if let Some(task) = previous {
            self.releaser.release(task);
        }
        kind
    }

    /// Make sure a PDF source has a rasterization task, creating it if needed.
    pub async fn ensure_document_task(
        &self,
        session: &mut Session,
    ) -> Result<DocumentTask, WorkflowError> {
        let recognition = session.recognition.clone();
        let Some(Source::PdfDocument { file, task }) = session.source_mut() else {
            return Err(WorkflowError::NotApplicable(
                "The current source is not a PDF".to_string(),
            ));
        };

        if let Some(existing) = task {
            return Ok(existing.clone());
        }

        let created = self.service.init_document(file, &recognition).await?;
        info!(
            "Initialized document task {} ({} pages)",
            created.task_id, created.total_pages
        );
        self.releaser.track(&created.task_id);
        *task = Some(created.clone());
        session.progress = Progress::new(created.total_pages);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreprocessingState, ProcessingArtifact};
    use crate::workflow::testing::{settle, ScriptedService, PDF_TASK};

    fn png(name: &str) -> InputFile {
        InputFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn pdf(name: &str) -> InputFile {
        InputFile::new(name, "application/pdf", b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn test_ingest_rejects_unsupported_types() {
        let service = Arc::new(ScriptedService::default());
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();
        registry.ingest(&mut session, png("a.png")).await.unwrap();

        let err = registry
            .ingest(&mut session, InputFile::new("a.gif", "image/gif", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnsupportedType { .. }));
        // previous source survives a rejected ingest
        assert_eq!(SourceRegistry::classify(&session), Some(SourceKind::Image));

        let err = registry
            .ingest(&mut session, InputFile::new("clip.mp4", "video/mp4", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn test_ingest_resets_preprocessing_and_cancels_previous_task() {
        let service = Arc::new(ScriptedService::with_pdf_pages(4));
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();

        registry.ingest(&mut session, pdf("a.pdf")).await.unwrap();
        registry.ensure_document_task(&mut session).await.unwrap();
        let mut artifacts = std::collections::BTreeMap::new();
        artifacts.insert(
            1,
            ProcessingArtifact {
                index: 1,
                processed_path: "/p/page_1.png".to_string(),
                processed_thumbnail: None,
            },
        );
        session.preprocessing = PreprocessingState::executed("prep".to_string(), artifacts);
        session.results.append(1, "old", None);
        session.cursor.batch_index = 1;

        let kind = registry.ingest(&mut session, png("b.png")).await.unwrap();
        assert_eq!(kind, SourceKind::Image);
        assert!(!session.preprocessing.applied());
        assert!(session.preprocessing.artifacts.is_empty());
        assert!(session.results.is_empty());
        assert_eq!(session.cursor.batch_index, 0);
        settle().await;
        assert_eq!(service.read(|s| s.cancels.clone()), vec![PDF_TASK.to_string()]);
    }

    #[tokio::test]
    async fn test_hung_cancel_does_not_block_new_source_or_clear() {
        let service = Arc::new(ScriptedService::with_pdf_pages(2));
        service.edit(|s| s.hang_cancel = true);
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();
        let limit = std::time::Duration::from_secs(2);

        registry.ingest(&mut session, pdf("a.pdf")).await.unwrap();
        registry.ensure_document_task(&mut session).await.unwrap();
        let kind = tokio::time::timeout(limit, registry.ingest(&mut session, png("b.png")))
            .await
            .expect("ingest finishes while the cancel hangs")
            .unwrap();
        assert_eq!(kind, SourceKind::Image);

        registry.ingest(&mut session, pdf("c.pdf")).await.unwrap();
        registry.ensure_document_task(&mut session).await.unwrap();
        tokio::time::timeout(limit, registry.clear(&mut session))
            .await
            .expect("clear finishes while the cancel hangs");
        assert!(session.source().is_none());

        settle().await;
        assert_eq!(service.read(|s| s.cancels.len()), 2);
    }

    #[tokio::test]
    async fn test_cancel_failure_is_not_surfaced() {
        let service = Arc::new(ScriptedService::with_pdf_pages(2));
        service.edit(|s| s.fail_cancel = true);
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();

        registry.ingest(&mut session, pdf("a.pdf")).await.unwrap();
        registry.ensure_document_task(&mut session).await.unwrap();
        registry.clear(&mut session).await;

        assert!(session.source().is_none());
        settle().await;
        assert_eq!(service.read(|s| s.cancels.len()), 1);
    }

    #[tokio::test]
    async fn test_document_task_is_created_once() {
        let service = Arc::new(ScriptedService::with_pdf_pages(5));
        let registry = SourceRegistry::new(service.clone());
        let mut session = Session::default();
        registry.ingest(&mut session, pdf("a.pdf")).await.unwrap();
        assert_eq!(session.total_count(), 0);

        let task = registry.ensure_document_task(&mut session).await.unwrap();
        assert_eq!(task.total_pages, 5);
        registry.ensure_document_task(&mut session).await.unwrap();

        assert_eq!(service.read(|s| s.inits), 1);
        assert_eq!(session.total_count(), 5);
        assert_eq!(session.progress.total, 5);
    }

    #[tokio::test]
    async fn test_ingest_frames() {
        let service = Arc::new(ScriptedService::default());
        let registry = SourceRegistry::new(service);
        let mut session = Session::default();

        assert!(registry.ingest_frames(&mut session, vec![]).await.is_err());
        let kind = registry
            .ingest_frames(
                &mut session,
                vec![InputFile::new("x.webp", "image/webp", vec![1])],
            )
            .await
            .unwrap();
        assert_eq!(kind, SourceKind::FrameSet);
        assert_eq!(session.total_count(), 1);
    }
}
