//! User actions and the orchestrator that dispatches them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::batch::{BatchExecutor, BatchState, PagePreview, StopHandle};
use super::error::WorkflowError;
use super::events::WorkflowEvent;
use super::notice::NoticeBoard;
use super::preprocess::{PreprocessingCoordinator, PreprocessingSummary};
use super::registry::SourceRegistry;
use super::release::TaskReleaser;
use super::session::Session;
use super::tabs::{Tab, TabChange, TabContextManager};
use super::video::FrameCollector;
use crate::client::{
    ExtractionMethod, FrameExtraction, HttpRecognitionClient, RecognitionService, ServerHealth,
    ServiceError, VideoUpload,
};
use crate::config::Config;
use crate::models::{
    clamp_batch_size, BatchCursor, InputFile, PreprocessingConfig, PreprocessingDecision,
    Progress, RecognitionConfig, SourceKind,
};

/// How long closing waits for task releases to reach the backend.
const RELEASE_GRACE: Duration = Duration::from_secs(5);

/// A user action, as typed in the interactive shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Open(PathBuf),
    Clear,
    Skip,
    Preprocess(PreprocessingConfig),
    PreparePdf,
    Start,
    Continue,
    Stop,
    SinglePage(u32),
    Preview { page: u32, output: Option<PathBuf> },
    Tab(Tab),
    BatchSize(i64),
    AutoContinue(bool),
    Recognition(RecognitionConfig),
    LoadVideo(PathBuf),
    ExtractFrames(FrameExtraction),
    Select(Vec<u32>),
    SelectAll(bool),
    Toggle(u32),
    SendFrames,
    SaveFrames(PathBuf),
    SavePreprocessed(PathBuf),
    Export(Option<PathBuf>),
    Status,
    Health,
}

/// Action words understood by `Action::from_str`.
pub const ACTION_WORDS: &[(&str, &str)] = &[
    ("open <file>", "load a PNG, JPEG or PDF"),
    ("clear", "drop the current source"),
    ("skip", "run OCR on the raw pages"),
    ("preprocess <option>...", "preprocess with auto-rotate, enhance, remove-shadows, binarize, remove-background"),
    ("prepare", "extract a PDF's pages into the Preprocess tab"),
    ("start", "start OCR from the first batch"),
    ("continue", "request the next batch"),
    ("stop", "stop before the next batch"),
    ("page <n>", "recognize a single page"),
    ("preview <n> [file]", "show or save one page"),
    ("tab <ocr|preprocess|video>", "switch tabs"),
    ("batch-size <n>", "pages per batch (1-50)"),
    ("auto <on|off>", "continue batches automatically"),
    ("recognition <type> <subcategory> <complexity>", "recognition settings"),
    ("video <file>", "upload a video"),
    ("frames [method] [value]", "extract frames (fixed_count N, fixed_interval SECS, scene_change S)"),
    ("select <all|none|1,2,5>", "choose frames"),
    ("toggle <n>", "flip one frame's selection"),
    ("send-frames", "run OCR on the selected frames"),
    ("save-frames <file>", "download the selected frames"),
    ("save-preprocessed <file>", "download the preprocessed images"),
    ("export [file]", "write the results to a text file"),
    ("status", "show the session state"),
    ("health", "show backend health"),
];

fn parse_number<T: FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("Missing {}", what))?;
    word.parse()
        .map_err(|_| format!("Invalid {}: {}", what, word))
}

fn parse_toggle(word: Option<&str>) -> Result<bool, String> {
    match word.map(str::to_lowercase).as_deref() {
        Some("on" | "true" | "yes") => Ok(true),
        Some("off" | "false" | "no") => Ok(false),
        _ => Err("Expected on or off".to_string()),
    }
}

/// Parse a frame list such as `1,3,5` or `2-4`.
pub fn parse_indices(list: &str) -> Result<Vec<u32>, String> {
    let mut indices = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = parse_number(Some(lo), "frame index")?;
                let hi: u32 = parse_number(Some(hi), "frame index")?;
                indices.extend(lo..=hi);
            }
            None => indices.push(parse_number(Some(part), "frame index")?),
        }
    }
    Ok(indices)
}

impl FromStr for Action {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or_else(|| "Empty command".to_string())?;
        let rest: Vec<&str> = words.collect();
        let arg = rest.first().copied();
        let path = |what: &str| -> Result<PathBuf, String> {
            if rest.is_empty() {
                Err(format!("Missing {}", what))
            } else {
                Ok(PathBuf::from(rest.join(" ")))
            }
        };

        let action = match command.to_lowercase().as_str() {
            "open" => Self::Open(path("file")?),
            "clear" => Self::Clear,
            "skip" => Self::Skip,
            "preprocess" => {
                let mut config = PreprocessingConfig::default();
                for option in &rest {
                    if !config.set_option(option) {
                        return Err(format!("Unknown preprocessing option: {}", option));
                    }
                }
                Self::Preprocess(config)
            }
            "prepare" => Self::PreparePdf,
            "start" => Self::Start,
            "continue" => Self::Continue,
            "stop" => Self::Stop,
            "page" => Self::SinglePage(parse_number(arg, "page number")?),
            "preview" => Self::Preview {
                page: parse_number(arg, "page number")?,
                output: rest.get(1).map(PathBuf::from),
            },
            "tab" => Self::Tab(
                arg.and_then(Tab::from_str)
                    .ok_or_else(|| "Expected ocr, preprocess or video".to_string())?,
            ),
            "batch-size" => Self::BatchSize(parse_number(arg, "batch size")?),
            "auto" => Self::AutoContinue(parse_toggle(arg)?),
            "recognition" => match rest.as_slice() {
                [content_type, subcategory, complexity] => Self::Recognition(
                    RecognitionConfig::parse(content_type, subcategory, complexity)?,
                ),
                _ => return Err("Expected <type> <subcategory> <complexity>".to_string()),
            },
            "video" => Self::LoadVideo(path("video file")?),
            "frames" => {
                let mut settings = FrameExtraction::default();
                if let Some(method) = arg {
                    settings.method = ExtractionMethod::from_str(method)
                        .ok_or_else(|| format!("Unknown extraction method: {}", method))?;
                    if let Some(value) = rest.get(1).copied() {
                        match settings.method {
                            ExtractionMethod::FixedCount => {
                                settings.total_frames = parse_number(Some(value), "frame count")?
                            }
                            ExtractionMethod::FixedInterval => {
                                settings.interval = parse_number(Some(value), "interval")?
                            }
                            ExtractionMethod::SceneChange => {
                                settings.sensitivity = parse_number(Some(value), "sensitivity")?
                            }
                        }
                    }
                }
                Self::ExtractFrames(settings)
            }
            "select" => match arg {
                Some("all") => Self::SelectAll(true),
                Some("none") => Self::SelectAll(false),
                Some(_) => Self::Select(parse_indices(&rest.concat())?),
                None => return Err("Expected all, none or a frame list".to_string()),
            },
            "toggle" => Self::Toggle(parse_number(arg, "frame index")?),
            "send-frames" => Self::SendFrames,
            "save-frames" => Self::SaveFrames(path("output file")?),
            "save-preprocessed" => Self::SavePreprocessed(path("output file")?),
            "export" => Self::Export(arg.map(|_| PathBuf::from(rest.join(" ")))),
            "status" => Self::Status,
            "health" => Self::Health,
            other => return Err(format!("Unknown command: {}", other)),
        };
        Ok(action)
    }
}

/// Snapshot of the session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub tab: Tab,
    pub source: Option<String>,
    pub kind: Option<SourceKind>,
    pub task_id: Option<String>,
    pub batch_state: BatchState,
    pub batch_index: u32,
    pub batch_size: u32,
    pub progress: Progress,
    pub preprocessing: PreprocessingDecision,
    pub artifacts: usize,
    pub results: usize,
    pub frames: usize,
    pub selected_frames: usize,
}

/// What an action produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    Ingested { kind: SourceKind, name: String },
    Cleared,
    PreprocessingSkipped,
    Preprocessed(PreprocessingSummary),
    PagesStaged(usize),
    Batch(BatchState),
    PageRecognized(u32),
    Preview(PagePreview),
    TabChanged(TabChange),
    BatchSize(u32),
    AutoContinue(bool),
    Recognition(RecognitionConfig),
    VideoLoaded(VideoUpload),
    FramesExtracted(usize),
    Selection(Vec<u32>),
    Saved { path: PathBuf, bytes: usize },
    Exported(PathBuf),
    Status(StatusReport),
    Health(ServerHealth),
}

/// Owns the session and routes actions to the workflow components.
pub struct Orchestrator {
    config: Config,
    service: Arc<dyn RecognitionService>,
    session: Session,
    registry: SourceRegistry,
    preprocessing: PreprocessingCoordinator,
    executor: BatchExecutor,
    tabs: TabContextManager,
    frames: FrameCollector,
    releaser: TaskReleaser,
}

impl Orchestrator {
    pub fn new(config: Config, service: Arc<dyn RecognitionService>) -> Self {
        let (batch_size, clamped) = clamp_batch_size(config.batch_size);
        let mut notices = NoticeBoard::new(config.notice_ttl());
        if clamped {
            warn!(
                "Configured batch size {} out of range, using {}",
                config.batch_size, batch_size
            );
            notices.warn(format!("Batch size must be between 1 and 50; using {}", batch_size));
        }
        let session = Session::new(
            BatchCursor::new(batch_size),
            config.recognition.clone(),
            notices,
        );

        let releaser = TaskReleaser::new(service.clone());
        Self {
            registry: SourceRegistry::new(service.clone()).with_releaser(releaser.clone()),
            preprocessing: PreprocessingCoordinator::new(service.clone(), config.count_mismatch),
            executor: BatchExecutor::new(service.clone(), config.count_mismatch)
                .with_auto_continue(config.auto_continue)
                .with_releaser(releaser.clone()),
            tabs: TabContextManager::new(service.clone()).with_releaser(releaser.clone()),
            frames: FrameCollector::new(service.clone()),
            releaser,
            service,
            session,
            config,
        }
    }

    /// Build an orchestrator talking to the configured backend over HTTP.
    pub fn connect(config: Config) -> Result<Self, ServiceError> {
        let client = HttpRecognitionClient::new(&config.server_url, config.request_timeout())?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn with_events(mut self, events: mpsc::Sender<WorkflowEvent>) -> Self {
        self.executor = self.executor.with_events(events);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn tab(&self) -> Tab {
        self.tabs.current()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.executor.stop_handle()
    }

    /// Handle for releasing backend tasks from outside the session, e.g. on interrupt.
    pub fn releaser(&self) -> TaskReleaser {
        self.releaser.clone()
    }

    /// Drop the source and wait briefly for outstanding task releases.
    pub async fn close(mut self) {
        self.registry.clear(&mut self.session).await;
        self.releaser.drain(RELEASE_GRACE).await;
    }

    /// Run one action. Failures are also posted as notices.
    pub async fn dispatch(&mut self, action: Action) -> Result<Outcome, WorkflowError> {
        let result = match action {
            Action::Open(path) => self.open(&path).await,
            Action::Clear => self.clear().await,
            Action::Skip => self.skip().await,
            Action::Preprocess(config) => self.preprocess(&config).await,
            Action::PreparePdf => self.prepare_pdf_preprocessing().await.map(Outcome::PagesStaged),
            Action::Start => self.start().await.map(Outcome::Batch),
            Action::Continue => self.resume().await.map(Outcome::Batch),
            Action::Stop => self.stop().await.map(Outcome::Batch),
            Action::SinglePage(page) => self.single_page(page).await,
            Action::Preview { page, output } => self.preview(page, output.as_deref()).await,
            Action::Tab(tab) => Ok(Outcome::TabChanged(self.switch_tab(tab).await)),
            Action::BatchSize(size) => self.set_batch_size(size).map(Outcome::BatchSize),
            Action::AutoContinue(auto) => {
                self.executor.set_auto_continue(auto);
                Ok(Outcome::AutoContinue(auto))
            }
            Action::Recognition(recognition) => self.set_recognition(recognition),
            Action::LoadVideo(path) => self.load_video(&path).await,
            Action::ExtractFrames(settings) => self.extract_frames(&settings).await,
            Action::Select(indices) => self.select_frames(&indices),
            Action::SelectAll(selected) => {
                self.session.video.select_all(selected);
                Ok(Outcome::Selection(self.session.video.selected_indices()))
            }
            Action::Toggle(index) => self.toggle_frame(index),
            Action::SendFrames => self.send_frames().await,
            Action::SaveFrames(path) => self.save_frames(&path).await,
            Action::SavePreprocessed(path) => self.save_preprocessed(&path).await,
            Action::Export(path) => self.export(path.as_deref()).await.map(Outcome::Exported),
            Action::Status => Ok(Outcome::Status(self.status())),
            Action::Health => self.health().await,
        };

        if let Err(ref e) = result {
            self.session.notices.error(e.user_message());
        }
        result
    }

    pub async fn open(&mut self, path: &Path) -> Result<Outcome, WorkflowError> {
        let file = InputFile::read(path).await?;
        self.open_file(file).await
    }

    pub async fn open_file(&mut self, file: InputFile) -> Result<Outcome, WorkflowError> {
        let name = file.name.clone();
        let source = SourceRegistry::admit(file)?;
        if self.tabs.current() != Tab::Ocr {
            self.tabs.switch(&mut self.session, Tab::Ocr).await;
        }
        let kind = self.registry.install(&mut self.session, source);
        Ok(Outcome::Ingested { kind, name })
    }

    pub async fn clear(&mut self) -> Result<Outcome, WorkflowError> {
        self.registry.clear(&mut self.session).await;
        Ok(Outcome::Cleared)
    }

    pub async fn skip(&mut self) -> Result<Outcome, WorkflowError> {
        if self.session.kind() == Some(SourceKind::Pdf) {
            self.registry.ensure_document_task(&mut self.session).await?;
        }
        self.preprocessing.skip(&mut self.session)?;
        Ok(Outcome::PreprocessingSkipped)
    }

    /// Hand a PDF's pages to the Preprocess tab, keeping its task alive.
    pub async fn prepare_pdf_preprocessing(&mut self) -> Result<usize, WorkflowError> {
        if self.session.kind() != Some(SourceKind::Pdf) {
            return Err(WorkflowError::NotApplicable(
                "Only PDF pages are extracted for preprocessing".to_string(),
            ));
        }
        let task = self.registry.ensure_document_task(&mut self.session).await?;
        let staged = self
            .preprocessing
            .stage_document_pages(&mut self.session, &task)
            .await?;
        self.tabs.switch(&mut self.session, Tab::Preprocess).await;
        Ok(staged)
    }

    /// Preprocess the current source and return to the OCR tab.
    pub async fn preprocess(&mut self, config: &PreprocessingConfig) -> Result<Outcome, WorkflowError> {
        if !config.any_enabled() {
            return Err(WorkflowError::NoOptionSelected);
        }
        PreprocessingCoordinator::ensure_undecided(&self.session)?;
        if self.session.kind() == Some(SourceKind::Pdf) && !self.session.is_pdf_mid_preprocessing() {
            self.prepare_pdf_preprocessing().await?;
        }
        let summary = self.preprocessing.execute(&mut self.session, config).await?;
        if self.tabs.current() != Tab::Ocr {
            self.tabs.switch(&mut self.session, Tab::Ocr).await;
        }
        Ok(Outcome::Preprocessed(summary))
    }

    async fn ensure_ready(&mut self) -> Result<(), WorkflowError> {
        if self.session.source().is_none() {
            return Err(WorkflowError::NoSource);
        }
        if self.session.kind() == Some(SourceKind::Pdf) {
            self.registry.ensure_document_task(&mut self.session).await?;
        }
        Ok(())
    }

    pub async fn start(&mut self) -> Result<BatchState, WorkflowError> {
        self.ensure_ready().await?;
        self.executor.start(&mut self.session).await
    }

    pub async fn resume(&mut self) -> Result<BatchState, WorkflowError> {
        self.executor.resume(&mut self.session).await
    }

    pub async fn stop(&mut self) -> Result<BatchState, WorkflowError> {
        self.executor.stop(&mut self.session).await
    }

    pub async fn single_page(&mut self, page: u32) -> Result<Outcome, WorkflowError> {
        self.ensure_ready().await?;
        self.executor.run_single(&mut self.session, page).await?;
        Ok(Outcome::PageRecognized(page))
    }

    pub async fn preview(&mut self, page: u32, output: Option<&Path>) -> Result<Outcome, WorkflowError> {
        self.ensure_ready().await?;
        let preview = self.executor.preview_page(&self.session, page).await?;
        if let Some(path) = output {
            tokio::fs::write(path, &preview.bytes).await?;
            info!("Wrote preview of page {} to {}", page, path.display());
        }
        Ok(Outcome::Preview(preview))
    }

    pub async fn switch_tab(&mut self, tab: Tab) -> TabChange {
        self.tabs.switch(&mut self.session, tab).await
    }

    pub fn set_batch_size(&mut self, size: i64) -> Result<u32, WorkflowError> {
        self.executor.set_batch_size(&mut self.session, size)
    }

    pub fn set_recognition(&mut self, recognition: RecognitionConfig) -> Result<Outcome, WorkflowError> {
        if !recognition.is_valid() {
            return Err(WorkflowError::InvalidRecognition(recognition.to_string()));
        }
        self.session.recognition = recognition.clone();
        Ok(Outcome::Recognition(recognition))
    }

    pub async fn load_video(&mut self, path: &Path) -> Result<Outcome, WorkflowError> {
        let file = InputFile::read(path).await?;
        if self.tabs.current() != Tab::Video {
            self.tabs.switch(&mut self.session, Tab::Video).await;
        }
        let upload = self.frames.load_video(&mut self.session, file).await?;
        Ok(Outcome::VideoLoaded(upload))
    }

    pub async fn extract_frames(&mut self, settings: &FrameExtraction) -> Result<Outcome, WorkflowError> {
        let count = self.frames.extract(&mut self.session, settings).await?;
        Ok(Outcome::FramesExtracted(count))
    }

    fn select_frames(&mut self, indices: &[u32]) -> Result<Outcome, WorkflowError> {
        let unknown = self.session.video.select_only(indices);
        if !unknown.is_empty() {
            self.session
                .notices
                .warn(format!("Ignoring unknown frames: {:?}", unknown));
        }
        Ok(Outcome::Selection(self.session.video.selected_indices()))
    }

    fn toggle_frame(&mut self, index: u32) -> Result<Outcome, WorkflowError> {
        self.session
            .video
            .toggle(index)
            .ok_or_else(|| WorkflowError::NotApplicable(format!("No frame {}", index)))?;
        Ok(Outcome::Selection(self.session.video.selected_indices()))
    }

    /// Install the selected frames as the OCR source and enter the OCR tab.
    pub async fn send_frames(&mut self) -> Result<Outcome, WorkflowError> {
        let files = self.frames.collect_selected(&self.session).await?;
        let kind = self.registry.ingest_frames(&mut self.session, files).await?;
        let name = self
            .session
            .source()
            .map(|s| s.display_name())
            .unwrap_or_default();
        self.tabs.switch(&mut self.session, Tab::Ocr).await;
        Ok(Outcome::Ingested { kind, name })
    }

    pub async fn save_frames(&mut self, path: &Path) -> Result<Outcome, WorkflowError> {
        let archive = self.frames.download(&self.session).await?;
        Self::write_blob(path, &archive).await
    }

    pub async fn save_preprocessed(&mut self, path: &Path) -> Result<Outcome, WorkflowError> {
        let archive = self.preprocessing.download(&self.session).await?;
        Self::write_blob(path, &archive).await
    }

    async fn write_blob(path: &Path, bytes: &[u8]) -> Result<Outcome, WorkflowError> {
        tokio::fs::write(path, bytes).await?;
        info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(Outcome::Saved {
            path: path.to_path_buf(),
            bytes: bytes.len(),
        })
    }

    /// Default export file name for the current time.
    pub fn export_file_name() -> String {
        format!(
            "OCR_results_{}.txt",
            chrono::Local::now().format("%Y-%m-%dT%H-%M-%S")
        )
    }

    /// Write the accumulated text to `path`, or a timestamped file in the export directory.
    pub async fn export(&mut self, path: Option<&Path>) -> Result<PathBuf, WorkflowError> {
        if self.session.results.is_empty() {
            return Err(WorkflowError::NotApplicable("No results to export".to_string()));
        }
        let text = self.session.results.export(self.session.naming());
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let dir = self.config.export_dir();
                tokio::fs::create_dir_all(&dir).await?;
                dir.join(Self::export_file_name())
            }
        };
        tokio::fs::write(&path, text).await?;
        info!("Exported {} result(s) to {}", self.session.results.len(), path.display());
        Ok(path)
    }

    pub fn status(&self) -> StatusReport {
        let session = &self.session;
        StatusReport {
            tab: self.tabs.current(),
            source: session.source().map(|s| s.display_name()),
            kind: session.kind(),
            task_id: session
                .source()
                .and_then(|s| s.server_task())
                .map(str::to_string),
            batch_state: session.batch_state,
            batch_index: session.cursor.batch_index,
            batch_size: session.cursor.batch_size(),
            progress: session.progress,
            preprocessing: session.preprocessing.decision,
            artifacts: session.preprocessing.artifacts.len(),
            results: session.results.len(),
            frames: session.video.frames.len(),
            selected_frames: session.video.selected_indices().len(),
        }
    }

    pub async fn health(&self) -> Result<Outcome, WorkflowError> {
        Ok(Outcome::Health(self.service.health().await?))
    }
}
