//! Progress events emitted while batches run.

/// Event emitted by the batch executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// A run started over `total` pages or frames.
    Started { total: u32 },
    /// A batch request covering `first..=last` was issued.
    BatchStarted { batch_index: u32, first: u32, last: u32 },
    /// Text arrived for one page or frame.
    PageRecognized { number: u32, chars: usize, failed: bool },
    /// A batch completed.
    BatchCompleted { processed: u32, total: u32, has_more: bool },
    /// More work remains and the executor waits for `continue`.
    AwaitingContinue { processed: u32, total: u32 },
    /// All pages or frames were processed.
    Finished { processed: u32, total: u32 },
    /// The run stopped, on request or after a failure.
    Stopped { reason: Option<String> },
}
