//! Progress rendering for OCR runs.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ocrflow::workflow::WorkflowEvent;

use super::icons::{arrow, error, success, warning};

fn bar(total: u32) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    progress
}

/// Render workflow events until the sending side is dropped.
pub fn spawn_event_handler(mut events: mpsc::Receiver<WorkflowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut progress: Option<ProgressBar> = None;
        let mut failed = 0u32;

        while let Some(event) = events.recv().await {
            match event {
                WorkflowEvent::Started { total } => {
                    println!("{} Running OCR on {} item(s)", arrow(), total);
                    failed = 0;
                    let pb = bar(total);
                    pb.set_message("Waiting for the first batch...");
                    if let Some(old) = progress.replace(pb) {
                        old.finish_and_clear();
                    }
                }
                WorkflowEvent::BatchStarted { first, last, .. } => {
                    if let Some(ref pb) = progress {
                        pb.set_message(format!("Recognizing {}-{}", first, last));
                    }
                }
                WorkflowEvent::PageRecognized { failed: true, .. } => failed += 1,
                WorkflowEvent::PageRecognized { .. } => {}
                WorkflowEvent::BatchCompleted {
                    processed, total, ..
                } => {
                    if let Some(ref pb) = progress {
                        pb.set_length(total as u64);
                        pb.set_position(processed as u64);
                    }
                }
                WorkflowEvent::AwaitingContinue { processed, total } => {
                    let line = format!(
                        "{} {}/{} processed, waiting for continue",
                        warning(),
                        processed,
                        total
                    );
                    match progress {
                        Some(ref pb) => pb.suspend(|| println!("{}", line)),
                        None => println!("{}", line),
                    }
                }
                WorkflowEvent::Finished { processed, total } => {
                    if let Some(pb) = progress.take() {
                        pb.finish_and_clear();
                    }
                    println!("{} OCR complete: {}/{} processed", success(), processed, total);
                    if failed > 0 {
                        println!("  {} {} item(s) reported errors", warning(), failed);
                    }
                }
                WorkflowEvent::Stopped { reason } => {
                    if let Some(pb) = progress.take() {
                        pb.abandon();
                    }
                    match reason {
                        Some(reason) => println!("{} Stopped: {}", error(), reason),
                        None => println!("{} Stopped", warning()),
                    }
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
    })
}
