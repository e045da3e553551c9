//! Bounded-concurrency batch runner.
//!
//! A single task keeps up to `concurrency` worker futures in a
//! [`FuturesUnordered`] and refills it as they settle. Every dispatched item
//! settles exactly once, as a success, a worker failure or a timeout.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use crate::{
    abort::AbortFlag,
    error::{HarvestError, ItemError, Result},
    workers::Worker,
};

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 20;
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(60);

/// Clamp a user-supplied concurrency into the accepted range.
pub fn clamp_concurrency(n: usize) -> usize {
    n.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<O> {
    Succeeded(O),
    Failed(ItemError),
}

impl<O> ItemOutcome<O> {
    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub processed: usize,
    pub total: usize,
    /// Set when the abort flag was raised before the run drained, even if
    /// every item had already been dispatched.
    pub aborted: bool,
}

/// Notified on the driving task each time an item settles.
pub trait BatchObserver<T, O> {
    fn on_settled(&self, _index: usize, _item: &T, _outcome: &ItemOutcome<O>) {}

    fn on_progress(&self, _processed: usize, _total: usize) {}
}

impl<T, O> BatchObserver<T, O> for () {}

impl<T, O, F> BatchObserver<T, O> for F
where
    F: Fn(usize, usize),
{
    fn on_progress(&self, processed: usize, total: usize) {
        self(processed, total)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchEngine {
    concurrency: usize,
    item_timeout: Duration,
}

impl BatchEngine {
    pub fn new(concurrency: usize, item_timeout: Duration) -> Result<Self> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(HarvestError::InvalidConcurrency {
                value: concurrency,
                min: MIN_CONCURRENCY,
                max: MAX_CONCURRENCY,
            });
        }
        Ok(Self {
            concurrency,
            item_timeout,
        })
    }

    /// Process `items` in order of dispatch, never more than `concurrency` at
    /// once. Setting `abort` stops new dispatches; items already in flight
    /// still settle and are counted.
    pub async fn run<T, W, O>(
        &self,
        items: &[T],
        worker: &W,
        observer: &O,
        abort: &AbortFlag,
    ) -> BatchSummary
    where
        W: Worker<T>,
        O: BatchObserver<T, W::Output>,
    {
        let total = items.len();
        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        if total == 0 {
            return summary;
        }

        let timeout = self.item_timeout;
        let mut in_flight = FuturesUnordered::new();
        let mut cursor = 0;

        loop {
            while cursor < total && in_flight.len() < self.concurrency && !abort.is_aborted() {
                let index = cursor;
                cursor += 1;
                let item = &items[index];
                debug!(index, "[run] dispatch");
                in_flight.push(async move {
                    // Timing out drops the worker future, which cancels its
                    // in-flight request instead of leaving it running detached.
                    let outcome = match tokio::time::timeout(timeout, worker.process(item)).await {
                        Ok(Ok(output)) => ItemOutcome::Succeeded(output),
                        Ok(Err(e)) => ItemOutcome::Failed(ItemError::Worker(format!("{e:#}"))),
                        Err(_) => ItemOutcome::Failed(ItemError::Timeout(timeout)),
                    };
                    (index, outcome)
                });
            }

            let Some((index, outcome)) = in_flight.next().await else {
                break;
            };

            summary.processed += 1;
            if outcome.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            observer.on_settled(index, &items[index], &outcome);
            observer.on_progress(summary.processed, total);
        }

        summary.aborted = abort.is_aborted();
        summary
    }
}
