//! Recognize an image or PDF.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ocrflow::workflow::{Action, BatchState, Orchestrator, WorkflowEvent};
use ocrflow::Config;

use super::{stop_on_ctrl_c, PreprocessArgs, RecognitionArgs};
use crate::cli::helpers::{print_notices, print_outcome};
use crate::cli::progress::spawn_event_handler;

pub struct RunOptions {
    pub file: PathBuf,
    pub preprocess: PreprocessArgs,
    pub recognition: RecognitionArgs,
    pub batch_size: Option<i64>,
    pub page: Option<u32>,
    pub step: bool,
    pub output: Option<PathBuf>,
}

/// Orchestrator wired to a progress renderer and Ctrl-C.
pub(super) fn connect(
    config: Config,
    auto_continue: bool,
) -> anyhow::Result<(Orchestrator, JoinHandle<()>)> {
    let (event_tx, event_rx) = mpsc::channel::<WorkflowEvent>(100);
    let event_handler = spawn_event_handler(event_rx);
    let orchestrator = Orchestrator::connect(config.with_auto_continue(auto_continue))?
        .with_events(event_tx);
    stop_on_ctrl_c(orchestrator.stop_handle(), orchestrator.releaser());
    Ok((orchestrator, event_handler))
}

/// Apply recognition and batch size overrides.
pub(super) async fn apply_settings(
    orchestrator: &mut Orchestrator,
    recognition: &RecognitionArgs,
    batch_size: Option<i64>,
) -> anyhow::Result<()> {
    if let Some(config) = recognition.resolve(&orchestrator.session().recognition)? {
        orchestrator.set_recognition(config)?;
    }
    if let Some(size) = batch_size {
        orchestrator.set_batch_size(size)?;
        print_notices(orchestrator.session_mut());
    }
    Ok(())
}

async fn wait_for_enter() -> anyhow::Result<()> {
    eprint!("Press Enter for the next batch...");
    std::io::stderr().flush()?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}

/// Start OCR and keep requesting batches until the run ends.
pub(super) async fn run_batches(orchestrator: &mut Orchestrator, step: bool) -> anyhow::Result<()> {
    let stop = orchestrator.stop_handle();
    let mut state = orchestrator.start().await?;
    while state == BatchState::AwaitingContinue {
        if step {
            wait_for_enter().await?;
        }
        if stop.is_requested() {
            orchestrator.stop().await?;
            break;
        }
        state = orchestrator.resume().await?;
    }
    Ok(())
}

/// Close the event stream, then report results and the run outcome.
pub(super) async fn finish(
    mut orchestrator: Orchestrator,
    event_handler: JoinHandle<()>,
    output: Option<PathBuf>,
    outcome: anyhow::Result<()>,
) -> anyhow::Result<()> {
    let export = match output {
        Some(path) if !orchestrator.session().results.is_empty() => {
            Some(orchestrator.dispatch(Action::Export(Some(path))).await)
        }
        _ => None,
    };
    print_notices(orchestrator.session_mut());

    let session_results = (export.is_none()).then(|| {
        let session = orchestrator.session();
        (!session.results.is_empty()).then(|| session.results.export(session.naming()))
    });

    // Release the document task before exiting.
    orchestrator.close().await;
    let _ = event_handler.await;

    match export {
        Some(Ok(exported)) => print_outcome(&exported),
        Some(Err(e)) => return Err(e.into()),
        None => match session_results.flatten() {
            Some(text) => println!("{}", text),
            None if outcome.is_ok() => println!("No text recognized"),
            None => {}
        },
    }
    outcome
}

async fn execute(orchestrator: &mut Orchestrator, options: &RunOptions) -> anyhow::Result<()> {
    apply_settings(orchestrator, &options.recognition, options.batch_size).await?;

    let loaded = orchestrator
        .dispatch(Action::Open(options.file.clone()))
        .await?;
    print_outcome(&loaded);
    let prepared = orchestrator.dispatch(options.preprocess.action()).await?;
    print_outcome(&prepared);
    print_notices(orchestrator.session_mut());

    match options.page {
        Some(page) => {
            orchestrator.single_page(page).await?;
            Ok(())
        }
        None => run_batches(orchestrator, options.step).await,
    }
}

pub async fn cmd_run(config: Config, options: RunOptions) -> anyhow::Result<()> {
    let (mut orchestrator, event_handler) = connect(config, !options.step)?;
    let outcome = execute(&mut orchestrator, &options).await;
    finish(orchestrator, event_handler, options.output, outcome).await
}
