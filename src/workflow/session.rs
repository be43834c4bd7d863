//! Session state for one workflow run.

use uuid::Uuid;

use super::batch::BatchState;
use super::notice::NoticeBoard;
use super::results::ResultAggregator;
use super::video::VideoWorkspace;
use crate::models::{
    BatchCursor, InputFile, PreprocessingState, Progress, RecognitionConfig, Source, SourceKind,
};
use crate::utils::ArtifactNaming;

/// Everything the workflow knows about the current run.
///
/// Owned by the orchestrator and lent to each component for the duration of
/// one operation.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    source: Option<Source>,
    /// Set while a PDF's pages are handed to the Preprocess tab.
    pdf_preprocessing: bool,
    pub preprocessing: PreprocessingState,
    /// Raw page images owned by the Preprocess tab.
    pub staged_pages: Vec<InputFile>,
    pub cursor: BatchCursor,
    pub batch_state: BatchState,
    pub progress: Progress,
    pub results: ResultAggregator,
    pub recognition: RecognitionConfig,
    pub video: VideoWorkspace,
    pub notices: NoticeBoard,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(BatchCursor::default(), RecognitionConfig::default(), NoticeBoard::default())
    }
}

impl Session {
    pub fn new(cursor: BatchCursor, recognition: RecognitionConfig, notices: NoticeBoard) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: None,
            pdf_preprocessing: false,
            preprocessing: PreprocessingState::default(),
            staged_pages: Vec::new(),
            cursor,
            batch_state: BatchState::Idle,
            progress: Progress::default(),
            results: ResultAggregator::default(),
            recognition,
            video: VideoWorkspace::default(),
            notices,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub(crate) fn source_mut(&mut self) -> Option<&mut Source> {
        self.source.as_mut()
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.source.as_ref().map(Source::kind)
    }

    /// Filename scheme of the current source's items.
    pub fn naming(&self) -> ArtifactNaming {
        self.kind().map_or(ArtifactNaming::Page, |k| k.naming())
    }

    pub fn total_count(&self) -> u32 {
        self.source.as_ref().map_or(0, Source::total_count)
    }

    /// A PDF's pages are in the Preprocess tab and its task must survive.
    pub fn is_pdf_mid_preprocessing(&self) -> bool {
        self.pdf_preprocessing
            && matches!(
                self.source,
                Some(Source::PdfDocument { task: Some(_), .. })
            )
    }

    pub(crate) fn set_pdf_preprocessing(&mut self, active: bool) {
        self.pdf_preprocessing = active;
    }

    pub(crate) fn install_source(&mut self, source: Source) {
        self.progress = Progress::new(source.total_count());
        self.source = Some(source);
    }

    /// Drop the source and everything derived from it.
    ///
    /// Returns the backend task that should be released, if any.
    pub(crate) fn teardown(&mut self) -> Option<String> {
        let task = self
            .source
            .take()
            .filter(|s| s.kind() == SourceKind::Pdf)
            .and_then(|s| s.server_task().map(str::to_string));

        self.pdf_preprocessing = false;
        self.preprocessing = PreprocessingState::default();
        self.cursor.rewind();
        self.batch_state = BatchState::Idle;
        self.progress = Progress::default();
        self.results.reset();
        task
    }

    /// Forget preprocessing that only applies to a still image.
    pub(crate) fn clear_image_preprocessing(&mut self) {
        if let Some(Source::SingleImage { processed, .. }) = self.source.as_mut() {
            *processed = None;
            self.preprocessing = PreprocessingState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentTask, PreprocessingDecision};

    fn pdf_with_task() -> Source {
        Source::PdfDocument {
            file: InputFile::new("doc.pdf", "application/pdf", vec![]),
            task: Some(DocumentTask {
                task_id: "pdf-1".to_string(),
                total_pages: 3,
                thumbnails: vec![],
            }),
        }
    }

    #[test]
    fn test_teardown_returns_pdf_task_and_resets() {
        let mut session = Session::default();
        session.install_source(pdf_with_task());
        session.set_pdf_preprocessing(true);
        session.cursor.batch_index = 2;
        session.results.append(1, "text", None);
        session.preprocessing = PreprocessingState::skipped();
        session.staged_pages.push(InputFile::new("page_1.png", "image/png", vec![]));

        assert_eq!(session.progress.total, 3);
        assert!(session.is_pdf_mid_preprocessing());

        assert_eq!(session.teardown().as_deref(), Some("pdf-1"));
        assert!(session.source().is_none());
        assert!(!session.is_pdf_mid_preprocessing());
        assert_eq!(session.cursor.batch_index, 0);
        assert!(session.results.is_empty());
        assert_eq!(session.preprocessing.decision, PreprocessingDecision::Pending);
        assert_eq!(session.staged_pages.len(), 1);
    }

    #[test]
    fn test_pdf_flag_needs_a_task() {
        let mut session = Session::default();
        session.install_source(Source::pdf(InputFile::new("doc.pdf", "application/pdf", vec![])));
        session.set_pdf_preprocessing(true);
        assert!(!session.is_pdf_mid_preprocessing());
    }

    #[test]
    fn test_clear_image_preprocessing_only_touches_images() {
        let mut session = Session::default();
        session.install_source(pdf_with_task());
        session.preprocessing = PreprocessingState::skipped();
        session.clear_image_preprocessing();
        assert_eq!(session.preprocessing.decision, PreprocessingDecision::Skipped);

        let image = InputFile::new("a.png", "image/png", vec![1]);
        session.install_source(Source::SingleImage {
            file: image.clone(),
            processed: Some(image),
        });
        session.clear_image_preprocessing();
        assert!(matches!(
            session.source(),
            Some(Source::SingleImage { processed: None, .. })
        ));
        assert_eq!(session.preprocessing.decision, PreprocessingDecision::Pending);
    }
}
