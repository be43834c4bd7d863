//! Shared output helpers for CLI commands.

use console::style;

use ocrflow::workflow::{NoticeLevel, OcrPanel, Outcome, Session, StatusReport};

use super::icons::{arrow, error, success, warning};

/// Print notices raised since the last call.
pub fn print_notices(session: &mut Session) {
    for notice in session.notices.take_undelivered() {
        let icon = match notice.level {
            NoticeLevel::Info => arrow(),
            NoticeLevel::Warning => warning(),
            NoticeLevel::Error => error(),
        };
        eprintln!("{} {}", icon, notice.message);
    }
}

/// Print the accumulated OCR text to stdout.
pub fn print_results(session: &Session) {
    if session.results.is_empty() {
        println!("{} No results", warning());
        return;
    }
    println!("{}", session.results.export(session.naming()));
}

fn describe_panel(panel: OcrPanel) -> String {
    match panel {
        OcrPanel::Empty => "no source loaded".to_string(),
        OcrPanel::ChoosePreprocessing { kind } => {
            format!("{} loaded, choose skip or preprocess", kind.as_str())
        }
        OcrPanel::Ready { kind, preprocessed } => format!(
            "{} ready for OCR ({})",
            kind.as_str(),
            if preprocessed { "preprocessed" } else { "raw" }
        ),
    }
}

pub fn print_status(report: &StatusReport) {
    println!("{}", style("Session").bold());
    println!("  Tab:            {}", report.tab.as_str());
    println!(
        "  Source:         {}",
        match (&report.source, report.kind) {
            (Some(name), Some(kind)) => format!("{} ({})", name, kind.as_str()),
            _ => "-".to_string(),
        }
    );
    println!(
        "  Task:           {}",
        report.task_id.as_deref().unwrap_or("-")
    );
    println!("  Preprocessing:  {:?} ({} artifacts)", report.preprocessing, report.artifacts);
    println!(
        "  OCR:            {} (batch {} of size {})",
        report.batch_state.as_str(),
        report.batch_index,
        report.batch_size
    );
    println!(
        "  Progress:       {}/{} ({} results)",
        report.progress.processed, report.progress.total, report.results
    );
    if report.frames > 0 {
        println!(
            "  Frames:         {} extracted, {} selected",
            report.frames, report.selected_frames
        );
    }
}

/// Print a one-line summary of an action's outcome.
pub fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Ingested { kind, name } => {
            println!("{} Loaded {} ({})", success(), name, kind.as_str())
        }
        Outcome::Cleared => println!("{} Source cleared", success()),
        Outcome::PreprocessingSkipped => println!("{} Preprocessing skipped", success()),
        Outcome::Preprocessed(summary) => {
            println!(
                "{} Preprocessed {}/{} item(s) (task {})",
                success(),
                summary.processed,
                summary.submitted,
                summary.task_id
            );
            for (name, reason) in &summary.skipped {
                println!("  {} {}: {}", warning(), name, reason);
            }
        }
        Outcome::PagesStaged(count) => {
            println!("{} {} page(s) ready for preprocessing", success(), count)
        }
        Outcome::Batch(state) => println!("{} OCR {}", arrow(), state.as_str()),
        Outcome::PageRecognized(page) => println!("{} Page {} recognized", success(), page),
        Outcome::Preview(preview) => println!(
            "{} Page {}: {} bytes{}",
            success(),
            preview.page,
            preview.bytes.len(),
            if preview.from_artifact { " (preprocessed)" } else { "" }
        ),
        Outcome::TabChanged(change) => {
            println!("{} {} tab", arrow(), change.to.as_str());
            if let Some(panel) = change.panel {
                println!("  {}", describe_panel(panel));
            }
        }
        Outcome::BatchSize(size) => println!("{} Batch size {}", success(), size),
        Outcome::AutoContinue(auto) => println!(
            "{} Auto-continue {}",
            success(),
            if *auto { "on" } else { "off" }
        ),
        Outcome::Recognition(config) => println!("{} Recognition {}", success(), config),
        Outcome::VideoLoaded(upload) => match upload.video_info {
            Some(ref info) => println!(
                "{} Uploaded {} ({:.1}s, {:.1} fps, {} frames, {})",
                success(),
                info.filename,
                info.duration,
                info.fps,
                info.total_frames,
                info.resolution
            ),
            None => println!("{} Uploaded video (task {})", success(), upload.task_id),
        },
        Outcome::FramesExtracted(count) => println!("{} Extracted {} frames", success(), count),
        Outcome::Selection(indices) => {
            println!("{} {} frame(s) selected", success(), indices.len())
        }
        Outcome::Saved { path, bytes } => {
            println!("{} Wrote {} bytes to {}", success(), bytes, path.display())
        }
        Outcome::Exported(path) => println!("{} Results saved to {}", success(), path.display()),
        Outcome::Status(report) => print_status(report),
        Outcome::Health(health) => {
            let icon = if health.model_loaded && health.model_healthy {
                success()
            } else {
                warning()
            };
            println!("{} Backend {}", icon, health.status);
            println!(
                "  Model loaded: {}, healthy: {}",
                health.model_loaded, health.model_healthy
            );
            println!(
                "  Tasks: {} document, {} preprocessing, {} video",
                health.active_tasks, health.preprocess_tasks, health.video_tasks
            );
        }
    }
}
