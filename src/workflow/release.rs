//! Background release of backend tasks.
//!
//! Cancelling a task is best effort: the call runs on its own tokio task so a
//! slow or unreachable backend never holds up source changes, tab switches or
//! the end of a run. Callers that are about to exit can [`TaskReleaser::drain`]
//! the outstanding calls with a bounded wait.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::RecognitionService;

#[derive(Default)]
struct Ledger {
    /// Tasks created on the backend and not yet released.
    live: BTreeSet<String>,
    pending: Vec<JoinHandle<()>>,
}

/// Cancels backend tasks without blocking the caller.
#[derive(Clone)]
pub struct TaskReleaser {
    service: Arc<dyn RecognitionService>,
    ledger: Arc<Mutex<Ledger>>,
}

impl TaskReleaser {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            service,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        let mut ledger = match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut ledger)
    }

    /// Remember a task so an interrupted run can still release it.
    pub fn track(&self, task_id: &str) {
        self.with_ledger(|l| l.live.insert(task_id.to_string()));
    }

    /// Tasks created and not yet released.
    pub fn live(&self) -> Vec<String> {
        self.with_ledger(|l| l.live.iter().cloned().collect())
    }

    /// Cancel a task in the background. Failures are only logged.
    pub fn release(&self, task_id: String) {
        let service = self.service.clone();
        self.with_ledger(|l| {
            l.live.remove(&task_id);
            l.pending.retain(|h| !h.is_finished());
            l.pending.push(tokio::spawn(async move {
                match service.cancel_task(&task_id).await {
                    Ok(()) => debug!("Released task {}", task_id),
                    Err(e) => debug!("Ignoring failure to release task {}: {}", task_id, e),
                }
            }));
        });
    }

    /// Release every tracked task. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let live: Vec<String> =
            self.with_ledger(|l| std::mem::take(&mut l.live).into_iter().collect());
        let count = live.len();
        for task in live {
            self.release(task);
        }
        count
    }

    /// Wait up to `limit` for outstanding releases. Returns whether all completed.
    pub async fn drain(&self, limit: Duration) -> bool {
        let pending: Vec<JoinHandle<()>> = self.with_ledger(|l| l.pending.drain(..).collect());
        if pending.is_empty() {
            return true;
        }
        let count = pending.len();
        let wait = async move {
            for handle in pending {
                let _ = handle.await;
            }
        };
        match tokio::time::timeout(limit, wait).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Gave up waiting for {} task release(s) after {:?}", count, limit);
                false
            }
        }
    }

    /// Release everything still tracked and wait briefly for the calls to land.
    pub async fn abandon(&self, limit: Duration) -> usize {
        let released = self.release_all();
        self.drain(limit).await;
        released
    }
}
