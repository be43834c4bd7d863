//! Server-side preprocessing of pages and frames.
//!
//! Items are uploaded as one set, processed with a configuration, and the
//! per-item results are mapped back onto page/frame indices. Nothing is
//! written to the session until both steps have succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::WorkflowError;
use super::notice::NoticeBoard;
use super::session::Session;
use crate::client::{ItemOutcome, ItemStatus, RecognitionService};
use crate::config::MismatchPolicy;
use crate::models::{
    DocumentTask, FrameUpload, InputFile, PreprocessingConfig, PreprocessingDecision,
    PreprocessingState, ProcessingArtifact, Source, SourceKind,
};
use crate::utils::{parse_ordinal, ArtifactNaming};

/// Apply the count-mismatch policy.
pub(crate) fn check_count(
    policy: MismatchPolicy,
    notices: &mut NoticeBoard,
    what: &'static str,
    expected: u32,
    actual: u32,
) -> Result<(), WorkflowError> {
    if expected == actual {
        return Ok(());
    }
    match policy {
        MismatchPolicy::Warn => {
            warn!("{}: expected {}, backend reported {}", what, expected, actual);
            notices.warn(format!("{}: expected {}, got {}", what, expected, actual));
            Ok(())
        }
        MismatchPolicy::Fail => Err(WorkflowError::CountMismatch {
            what,
            expected,
            actual,
        }),
    }
}

/// Artifacts recovered from preprocessing results.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub artifacts: BTreeMap<u32, ProcessingArtifact>,
    /// Filenames left unprocessed, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Map completed items onto indices in `1..=total`.
pub fn reconcile_outcomes(outcomes: &[ItemOutcome], naming: ArtifactNaming, total: u32) -> Reconciled {
    let mut reconciled = Reconciled::default();

    for outcome in outcomes {
        let mut skip = |reason: String| {
            warn!("Preprocessing result {} skipped: {}", outcome.filename, reason);
            reconciled.skipped.push((outcome.filename.clone(), reason));
        };

        if outcome.status != ItemStatus::Completed {
            skip(outcome.error.clone().unwrap_or_else(|| "not completed".to_string()));
            continue;
        }
        let Some(path) = outcome.processed_path.clone() else {
            skip("no processed path".to_string());
            continue;
        };
        let Some(index) = parse_ordinal(naming, &outcome.filename) else {
            skip("filename carries no ordinal".to_string());
            continue;
        };
        if index == 0 || index > total {
            skip(format!("index {} outside 1..={}", index, total));
            continue;
        }
        if reconciled.artifacts.contains_key(&index) {
            skip(format!("duplicate index {}", index));
            continue;
        }

        reconciled.artifacts.insert(
            index,
            ProcessingArtifact {
                index,
                processed_path: path,
                processed_thumbnail: outcome.processed_thumbnail.clone(),
            },
        );
    }

    reconciled
}

/// Summary of a preprocessing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessingSummary {
    pub task_id: String,
    pub submitted: u32,
    pub accepted: u32,
    pub processed: u32,
    pub skipped: Vec<(String, String)>,
}

/// Runs the upload/process protocol and records its artifacts.
pub struct PreprocessingCoordinator {
    service: Arc<dyn RecognitionService>,
    policy: MismatchPolicy,
}

impl PreprocessingCoordinator {
    pub fn new(service: Arc<dyn RecognitionService>, policy: MismatchPolicy) -> Self {
        Self { service, policy }
    }

    /// Fails unless a source is loaded and preprocessing is still undecided.
    pub(crate) fn ensure_undecided(session: &Session) -> Result<(), WorkflowError> {
        if session.source().is_none() {
            return Err(WorkflowError::NoSource);
        }
        match session.preprocessing.decision {
            PreprocessingDecision::Pending => Ok(()),
            PreprocessingDecision::Skipped => Err(WorkflowError::PreprocessingDecided("skipped")),
            PreprocessingDecision::Executed => Err(WorkflowError::PreprocessingDecided("executed")),
        }
    }

    /// Use raw source data for every index.
    pub fn skip(&self, session: &mut Session) -> Result<(), WorkflowError> {
        Self::ensure_undecided(session)?;
        session.preprocessing = PreprocessingState::skipped();
        info!("Session {}: preprocessing skipped", session.id());
        Ok(())
    }

    /// Rasterize a PDF's pages and stage them for preprocessing.
    pub async fn stage_document_pages(
        &self,
        session: &mut Session,
        task: &DocumentTask,
    ) -> Result<usize, WorkflowError> {
        let pages = self.service.extract_pages(&task.task_id).await?;
        check_count(
            self.policy,
            &mut session.notices,
            "extracted pages",
            task.total_pages,
            pages.len() as u32,
        )?;

        let mut staged = Vec::with_capacity(pages.len());
        for page in pages {
            let Some(route) = page.route() else {
                warn!("Extracted page {} has no location", page.filename);
                continue;
            };
            match self.service.fetch_file(&route).await {
                Ok(bytes) => staged.push(InputFile::detect(page.filename, bytes)),
                Err(e) => warn!("Failed to fetch extracted page {}: {}", page.filename, e),
            }
        }

        if staged.is_empty() {
            return Err(WorkflowError::NotApplicable(
                "None of the extracted pages could be fetched".to_string(),
            ));
        }
        staged.sort_by_key(|f| parse_ordinal(ArtifactNaming::Page, &f.name).unwrap_or(u32::MAX));

        let count = staged.len();
        session.staged_pages = staged;
        session.set_pdf_preprocessing(true);
        info!("Staged {} pages of task {} for preprocessing", count, task.task_id);
        Ok(count)
    }

    /// Upload the source's items, process them and record the artifacts.
    pub async fn execute(
        &self,
        session: &mut Session,
        config: &PreprocessingConfig,
    ) -> Result<PreprocessingSummary, WorkflowError> {
        if !config.any_enabled() {
            return Err(WorkflowError::NoOptionSelected);
        }
        let source = session.source().ok_or(WorkflowError::NoSource)?;
        Self::ensure_undecided(session)?;

        let kind = source.kind();
        let naming = kind.naming();
        let total = source.total_count();
        let items: Vec<InputFile> = match source {
            Source::SingleImage { file, .. } => vec![file.clone()],
            Source::PdfDocument { .. } => {
                if !session.is_pdf_mid_preprocessing() || session.staged_pages.is_empty() {
                    return Err(WorkflowError::NotApplicable(
                        "Extract the PDF pages before preprocessing".to_string(),
                    ));
                }
                session.staged_pages.clone()
            }
            Source::FrameSet { frames, .. } => frames
                .iter()
                .map(|frame| InputFile {
                    name: naming.file_name(frame.index),
                    ..frame.file.clone()
                })
                .collect(),
        };
        let submitted = items.len() as u32;

        info!(
            "Preprocessing {} item(s) with {}",
            submitted,
            config.enabled().join(", ")
        );

        let receipt = self
            .service
            .upload_items(&items)
            .await
            .map_err(WorkflowError::Upload)?;
        check_count(
            self.policy,
            &mut session.notices,
            "accepted uploads",
            submitted,
            receipt.accepted_count,
        )?;

        let outcomes = self
            .service
            .run_preprocessing(&receipt.task_id, config)
            .await?;
        check_count(
            self.policy,
            &mut session.notices,
            "preprocessing results",
            receipt.accepted_count,
            outcomes.len() as u32,
        )?;

        let mut processed_image = None;
        let reconciled = if kind == SourceKind::Image {
            let mut reconciled = Reconciled::default();
            match outcomes.first() {
                Some(ItemOutcome {
                    status: ItemStatus::Completed,
                    processed_path: Some(path),
                    processed_thumbnail,
                    ..
                }) => {
                    let bytes = self.service.fetch_file(path).await?;
                    processed_image = Some(InputFile::detect(items[0].name.clone(), bytes));
                    reconciled.artifacts.insert(
                        1,
                        ProcessingArtifact {
                            index: 1,
                            processed_path: path.clone(),
                            processed_thumbnail: processed_thumbnail.clone(),
                        },
                    );
                }
                Some(other) => reconciled.skipped.push((
                    other.filename.clone(),
                    other.error.clone().unwrap_or_else(|| "not completed".to_string()),
                )),
                None => {}
            }
            reconciled
        } else {
            reconcile_outcomes(&outcomes, naming, total)
        };

        let frame_upload = (kind == SourceKind::FrameSet).then(|| FrameUpload {
            task_id: receipt.task_id.clone(),
            raw_paths: receipt
                .items
                .iter()
                .filter_map(|item| {
                    let index = parse_ordinal(naming, &item.filename)?;
                    Some((index, item.raw_path.clone()?))
                })
                .collect(),
        });

        // Commit
        match session.source_mut() {
            Some(Source::SingleImage { processed, .. }) => *processed = processed_image,
            Some(Source::FrameSet { upload, .. }) => *upload = frame_upload,
            _ => {}
        }
        let processed = reconciled.artifacts.len() as u32;
        session.preprocessing =
            PreprocessingState::executed(receipt.task_id.clone(), reconciled.artifacts);

        if !reconciled.skipped.is_empty() {
            session.notices.warn(format!(
                "{} item(s) were not preprocessed and will use the original image",
                reconciled.skipped.len()
            ));
        }
        info!(
            "Preprocessing task {}: {}/{} items processed",
            receipt.task_id, processed, submitted
        );

        Ok(PreprocessingSummary {
            task_id: receipt.task_id,
            submitted,
            accepted: receipt.accepted_count,
            processed,
            skipped: reconciled.skipped,
        })
    }

    /// Archive of the processed items.
    pub async fn download(&self, session: &Session) -> Result<Vec<u8>, WorkflowError> {
        let task_id = session
            .preprocessing
            .task_id
            .as_deref()
            .ok_or_else(|| WorkflowError::NotApplicable("Nothing has been preprocessed".to_string()))?;
        Ok(self.service.download_preprocessed(task_id).await?)
    }
}
