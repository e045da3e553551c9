//! State of one harvest run: what was queued, what settled, and whether the
//! run is still going.

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    abort::AbortFlag,
    batch::{BatchEngine, BatchObserver, BatchSummary, ItemOutcome},
    error::{HarvestError, Result},
    keys::KeyPool,
    types::{ResultRecord, WorkItem},
    workers::{Harvested, Worker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Aborted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub succeeded: usize,
    pub failed: usize,
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// Remaining time at the average rate so far; `None` until something settled.
    pub eta: Option<Duration>,
}

type Reporter = Box<dyn Fn(&RunStats) + Send + Sync>;

struct Inner {
    id: Uuid,
    phase: RunPhase,
    items: Arc<Vec<WorkItem>>,
    results: Vec<ResultRecord>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Owns a run's work list and results and enforces one run at a time.
pub struct RunState {
    keys: Arc<KeyPool>,
    abort: AbortFlag,
    inner: Mutex<Inner>,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    reporter: Option<Reporter>,
}

impl RunState {
    pub fn new(keys: Arc<KeyPool>) -> Self {
        Self {
            keys,
            abort: AbortFlag::new(),
            inner: Mutex::new(Inner {
                id: Uuid::nil(),
                phase: RunPhase::Idle,
                items: Arc::default(),
                results: Vec::new(),
                started_at: None,
                finished_at: None,
            }),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            reporter: None,
        }
    }

    /// Called with fresh stats after every settled item.
    pub fn with_reporter(mut self, reporter: impl Fn(&RunStats) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle that stops dispatch of further items when set.
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn phase(&self) -> RunPhase {
        self.lock().phase
    }

    fn items(&self) -> Arc<Vec<WorkItem>> {
        Arc::clone(&self.lock().items)
    }

    /// Start a new run over `items`, clearing everything left from the last one.
    pub fn begin(&self, items: Vec<WorkItem>) -> Result<Uuid> {
        let mut inner = self.lock();
        if inner.phase == RunPhase::Running {
            return Err(HarvestError::RunInProgress);
        }
        let id = Uuid::new_v4();
        *inner = Inner {
            id,
            phase: RunPhase::Running,
            items: Arc::new(items),
            results: Vec::new(),
            started_at: Some(Instant::now()),
            finished_at: None,
        };
        self.succeeded.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.abort.reset();
        self.keys.reset();
        info!(run = %id, total = inner.items.len(), "[run] started");
        Ok(id)
    }

    pub fn finish(&self, summary: &BatchSummary) -> RunPhase {
        let mut inner = self.lock();
        inner.phase = if summary.aborted {
            RunPhase::Aborted
        } else {
            RunPhase::Completed
        };
        inner.finished_at = Some(Instant::now());
        info!(
            run = %inner.id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            processed = summary.processed,
            total = summary.total,
            aborted = summary.aborted,
            "[run] finished"
        );
        inner.phase
    }

    /// Mark the run failed, e.g. when its results could not be saved.
    pub fn fail(&self, err: &(impl std::fmt::Display + ?Sized)) {
        let mut inner = self.lock();
        inner.phase = RunPhase::Failed;
        inner.finished_at = Some(Instant::now());
        error!(run = %inner.id, error = %err, "[run] failed");
    }

    pub fn stats(&self) -> RunStats {
        let inner = self.lock();
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let processed = succeeded + failed;
        let total = inner.items.len();
        let elapsed = match (inner.started_at, inner.finished_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };
        RunStats {
            succeeded,
            failed,
            processed,
            total,
            elapsed,
            eta: estimate_remaining(elapsed, processed, total),
        }
    }

    /// Snapshot of the records so far, in settle order.
    pub fn results(&self) -> Vec<ResultRecord> {
        self.lock().results.clone()
    }

    /// Begin a run over `items`, drive it through `engine`, and record how it ended.
    pub async fn harvest<W>(
        &self,
        engine: &BatchEngine,
        worker: &W,
        items: Vec<WorkItem>,
    ) -> Result<BatchSummary>
    where
        W: Worker<WorkItem, Output = Harvested>,
    {
        self.begin(items)?;
        let items = self.items();
        let summary = engine.run(items.as_slice(), worker, self, &self.abort).await;
        self.finish(&summary);
        Ok(summary)
    }
}

fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Option<Duration> {
    if processed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(processed) as u32;
    Some(elapsed / processed as u32 * remaining)
}

impl BatchObserver<WorkItem, Harvested> for RunState {
    fn on_settled(&self, _index: usize, item: &WorkItem, outcome: &ItemOutcome<Harvested>) {
        let record = match outcome {
            ItemOutcome::Succeeded(harvested) => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                info!(
                    id = %item.id,
                    chars = harvested.transcript.chars().count(),
                    comments = harvested.comments.len(),
                    cached = harvested.from_cache,
                    "[ok] {}",
                    item.title
                );
                ResultRecord::success(item, harvested.transcript.clone(), harvested.comments.clone())
            }
            ItemOutcome::Failed(err) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(id = %item.id, error = %err, "[fail] {}", item.title);
                ResultRecord::failure(item, err.to_string())
            }
        };
        self.lock().results.push(record);
    }

    fn on_progress(&self, _processed: usize, _total: usize) {
        if let Some(report) = &self.reporter {
            report(&self.stats());
        }
    }
}
