//! Tab modes and what each switch invalidates.

use std::sync::Arc;

use tracing::{debug, info};

use super::release::TaskReleaser;
use super::session::Session;
use crate::client::RecognitionService;
use crate::models::{PreprocessingDecision, SourceKind};

/// Workspace mode selected by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Ocr,
    Preprocess,
    Video,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Preprocess => "preprocess",
            Self::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ocr" => Some(Self::Ocr),
            "preprocess" | "preprocessing" => Some(Self::Preprocess),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// State dropped by a tab switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Loaded video, its upload and extracted frames.
    pub video: bool,
    /// Source, task, preprocessing state, cursor and results.
    pub source: bool,
    /// Release the backend task of the dropped source.
    pub cancel_task: bool,
    /// Preprocessed replacement of a still image.
    pub image_preprocessing: bool,
}

/// Invalidation matrix for a switch from `from` to `to`.
pub fn invalidation(from: Tab, to: Tab, pdf_mid_preprocessing: bool) -> Invalidation {
    if from == to {
        return Invalidation::default();
    }
    match to {
        Tab::Ocr => Invalidation {
            video: true,
            ..Default::default()
        },
        Tab::Video => Invalidation {
            source: true,
            cancel_task: true,
            ..Default::default()
        },
        Tab::Preprocess if pdf_mid_preprocessing => Invalidation {
            image_preprocessing: true,
            ..Default::default()
        },
        Tab::Preprocess => Invalidation {
            video: true,
            source: true,
            cancel_task: true,
            ..Default::default()
        },
    }
}

/// What the OCR tab shows for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrPanel {
    /// No source: configuration and option panels are hidden.
    Empty,
    /// Source loaded, preprocessing not yet decided.
    ChoosePreprocessing { kind: SourceKind },
    /// Ready for OCR, on raw or preprocessed data.
    Ready { kind: SourceKind, preprocessed: bool },
}

impl OcrPanel {
    pub fn for_session(session: &Session) -> Self {
        match session.kind() {
            None => Self::Empty,
            Some(kind) => match session.preprocessing.decision {
                PreprocessingDecision::Pending => Self::ChoosePreprocessing { kind },
                decision => Self::Ready {
                    kind,
                    preprocessed: decision == PreprocessingDecision::Executed,
                },
            },
        }
    }
}

/// Result of a tab switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabChange {
    pub from: Tab,
    pub to: Tab,
    pub invalidated: Invalidation,
    /// Panel to display when the OCR tab was entered.
    pub panel: Option<OcrPanel>,
}

/// Tracks the current tab and applies the invalidation matrix.
pub struct TabContextManager {
    releaser: TaskReleaser,
    current: Tab,
}

impl TabContextManager {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            releaser: TaskReleaser::new(service),
            current: Tab::default(),
        }
    }

    pub fn with_releaser(mut self, releaser: TaskReleaser) -> Self {
        self.releaser = releaser;
        self
    }

    pub fn current(&self) -> Tab {
        self.current
    }

    pub async fn switch(&mut self, session: &mut Session, to: Tab) -> TabChange {
        let from = self.current;
        let invalidated = invalidation(from, to, session.is_pdf_mid_preprocessing());
        debug!("Tab {} -> {}: {:?}", from.as_str(), to.as_str(), invalidated);

        if invalidated.source {
            if let Some(task) = session.teardown() {
                if invalidated.cancel_task {
                    self.releaser.release(task);
                }
            }
        }
        if invalidated.video {
            session.video.clear();
        }
        if invalidated.image_preprocessing {
            session.clear_image_preprocessing();
        }

        self.current = to;
        if from != to {
            info!("Switched to the {} tab", to.as_str());
        }
        TabChange {
            from,
            to,
            invalidated,
            panel: (to == Tab::Ocr).then(|| OcrPanel::for_session(session)),
        }
    }
}
