use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::bucket::{ResultBucket, TaskResult};
use crate::{Error, Result};

/// Fan-out/fan-in executor with at most `workers` tasks in flight.
///
/// `submit` waits for a free slot before spawning, so a batch never fans out beyond the
/// limit. No retries, no cancellation: every submitted task produces exactly one
/// [`TaskResult`], a panicking task included.
#[derive(Debug)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<TaskResult>,
    pending: HashMap<Id, Pending>,
    results: ResultBucket,
}

#[derive(Debug)]
struct Pending {
    category: Arc<str>,
    started: Instant,
}

impl TaskPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidWorkers);
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
            pending: HashMap::new(),
            results: ResultBucket::new(),
        })
    }

    /// Runs `task` under `category`. The task resolves to its success flag; its wall-clock
    /// duration is measured from the moment it starts running.
    pub async fn submit<F>(&mut self, category: impl Into<Arc<str>>, task: F) -> Result<()>
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::SchedulerClosed)?;

        // Collect whatever already finished so the pending map stays small.
        while let Some(done) = self.tasks.try_join_next_with_id() {
            self.collect(done);
        }

        let started = Instant::now();
        let handle = self.tasks.spawn(async move {
            let success = task.await;
            drop(permit);
            TaskResult::new(success, started.elapsed())
        });
        self.pending.insert(
            handle.id(),
            Pending {
                category: category.into(),
                started,
            },
        );
        Ok(())
    }

    /// Blocks until every submitted task has reported.
    pub async fn wait(mut self) -> ResultBucket {
        while let Some(done) = self.tasks.join_next_with_id().await {
            self.collect(done);
        }
        self.results
    }

    fn collect(&mut self, done: std::result::Result<(Id, TaskResult), tokio::task::JoinError>) {
        let (id, result) = match done {
            Ok((id, result)) => (id, Some(result)),
            Err(err) => {
                warn!(error = %err, "task did not complete; recording it as failed");
                (err.id(), None)
            }
        };
        let Some(pending) = self.pending.remove(&id) else {
            return;
        };
        let result = result.unwrap_or_else(|| TaskResult::failed(pending.started.elapsed()));
        self.results.push(&pending.category, result);
    }
}

/// Logs submission progress every `ceil(total / 10)` items.
#[derive(Debug, Clone)]
pub struct ProgressMarker {
    label: &'static str,
    total: usize,
    every: usize,
}

impl ProgressMarker {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            every: total.div_ceil(10).max(1),
        }
    }

    /// `submitted` is the 1-based count of items handed to the scheduler so far.
    pub fn submitted(&self, submitted: usize) -> bool {
        if submitted % self.every != 0 {
            return false;
        }
        info!(
            submitted,
            total = self.total,
            "submitted {submitted}/{} {}",
            self.total,
            self.label
        );
        true
    }
}
