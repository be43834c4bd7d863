//! Extract frames from a video and recognize them.

use std::path::PathBuf;

use ocrflow::workflow::{parse_indices, Action, Orchestrator};
use ocrflow::Config;

use super::run::{apply_settings, connect, finish, run_batches};
use super::{ExtractionArgs, PreprocessArgs, RecognitionArgs};
use crate::cli::helpers::{print_notices, print_outcome};

pub struct VideoOptions {
    pub file: PathBuf,
    pub extraction: ExtractionArgs,
    pub select: Option<String>,
    pub archive: Option<PathBuf>,
    pub no_ocr: bool,
    pub preprocess: PreprocessArgs,
    pub recognition: RecognitionArgs,
    pub batch_size: Option<i64>,
    pub output: Option<PathBuf>,
}

async fn execute(orchestrator: &mut Orchestrator, options: &VideoOptions) -> anyhow::Result<()> {
    apply_settings(orchestrator, &options.recognition, options.batch_size).await?;
    let settings = options.extraction.settings()?;

    let steps = [
        Some(Action::LoadVideo(options.file.clone())),
        Some(Action::ExtractFrames(settings)),
        options
            .select
            .as_deref()
            .map(parse_indices)
            .transpose()
            .map_err(|e| anyhow::anyhow!(e))?
            .map(Action::Select),
        options.archive.clone().map(Action::SaveFrames),
    ];
    for action in steps.into_iter().flatten() {
        let outcome = orchestrator.dispatch(action).await?;
        print_outcome(&outcome);
        print_notices(orchestrator.session_mut());
    }

    if options.no_ocr {
        return Ok(());
    }

    let sent = orchestrator.dispatch(Action::SendFrames).await?;
    print_outcome(&sent);
    let prepared = orchestrator.dispatch(options.preprocess.action()).await?;
    print_outcome(&prepared);
    print_notices(orchestrator.session_mut());

    run_batches(orchestrator, false).await
}

pub async fn cmd_video(config: Config, options: VideoOptions) -> anyhow::Result<()> {
    let (mut orchestrator, event_handler) = connect(config, true)?;
    let outcome = execute(&mut orchestrator, &options).await;
    if !options.no_ocr {
        return finish(orchestrator, event_handler, options.output, outcome).await;
    }

    print_notices(orchestrator.session_mut());
    orchestrator.close().await;
    let _ = event_handler.await;
    outcome
}
