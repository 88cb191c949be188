//! One-shot job scheduler.
//!
//! Runs agent callbacks at a point in time. Each job is an independent
//! cancellable task, so a waiting or running job never blocks request/reply
//! traffic. Jobs are keyed by id: scheduling an id that is already known
//! (waiting or already fired) is a no-op, which keeps repeated `ready`
//! cycles from duplicating work.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::proxy::Handler;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// At a wall-clock instant; instants in the past fire immediately.
    At(DateTime<Utc>),
    /// After a delay measured from the moment the job is scheduled.
    After(Duration),
}

impl Trigger {
    fn delay(self) -> Duration {
        match self {
            Self::At(when) => (when - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            Self::After(delay) => delay,
        }
    }
}

/// A callback bound to a trigger.
#[derive(Clone)]
pub struct ScheduledJob {
    /// Unique job id, conventionally `<agent>:<name>`.
    pub id: String,
    /// When to run.
    pub trigger: Trigger,
    /// Callback; receives no arguments.
    pub handler: Handler,
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

struct JobSlot {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of all scheduled job tasks.
pub struct Scheduler {
    root: CancellationToken,
    jobs: Mutex<HashMap<String, JobSlot>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `job` unless its id is already known.
    ///
    /// Returns `true` when a new task was started.
    pub fn add_job(&self, job: &ScheduledJob) -> bool {
        if self.root.is_cancelled() {
            debug!(job_id = %job.id, "scheduler is shut down, ignoring job");
            return false;
        }

        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            debug!(job_id = %job.id, "job already scheduled");
            return false;
        }

        let cancel = self.root.child_token();
        let delay = job.trigger.delay();
        let task_cancel = cancel.clone();
        let handler = job.handler.clone();
        let id = job.id.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = task_cancel.cancelled() => {
                    debug!(job_id = %id, "job cancelled before firing");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            info!(job_id = %id, "running scheduled job");
            tokio::select! {
                () = task_cancel.cancelled() => {
                    debug!(job_id = %id, "job cancelled while running");
                }
                outcome = handler(Vec::new()) => {
                    if let Err(err) = outcome {
                        error!(job_id = %id, %err, "scheduled job failed");
                    }
                }
            }
        });

        jobs.insert(job.id.clone(), JobSlot { cancel, handle });
        debug!(job_id = %job.id, ?delay, "job scheduled");
        true
    }

    /// Cancel and forget job `id`. Returns whether it was known.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().remove(id) {
            Some(slot) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether job `id` is known (waiting or fired).
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of known jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no job is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every job and wait for the tasks to end.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let slots: Vec<JobSlot> = self.lock().drain().map(|(_, slot)| slot).collect();
        let count = slots.len();
        for slot in slots {
            let _ = slot.handle.await;
        }
        info!(jobs = count, "scheduler stopped");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobSlot>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
