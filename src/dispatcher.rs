//! Batch dispatch onto the slot pool.
//!
//! One call to [`Dispatcher::dispatch`] forms one batch: every item is
//! submitted up front, then the future resolves when every ticket has
//! resolved. Completion order is whatever the slots produce. Dropping the
//! future abandons the batch without touching the invocations themselves.

use crate::error::Result;
use crate::invocation::InvocationContext;
use crate::pool::SlotPool;
use crate::types::{BatchReport, Event, Outcome, WorkItem};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;

/// Submits batches of work items to a [`SlotPool`]
#[derive(Clone)]
pub(crate) struct Dispatcher {
    pool: Arc<SlotPool>,
    ctx: Arc<InvocationContext>,
}

impl Dispatcher {
    pub(crate) fn new(pool: Arc<SlotPool>, ctx: Arc<InvocationContext>) -> Self {
        Self { pool, ctx }
    }

    /// Submit every item and wait for the whole batch
    ///
    /// Returns immediately for an empty batch. Fails only if the pool has
    /// already been torn down, before anything is awaited.
    pub(crate) async fn dispatch(&self, items: Vec<WorkItem>) -> Result<BatchReport> {
        let mut report = BatchReport {
            submitted: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            return Ok(report);
        }

        let _ = self.ctx.events.send(Event::BatchStarted { items: items.len() });
        tracing::debug!(
            items = items.len(),
            slots = self.pool.capacity(),
            "dispatching batch"
        );

        let mut batch = FuturesUnordered::new();
        for item in items {
            let ctx = self.ctx.clone();
            let job_item = item.clone();
            let ticket = self.pool.submit(move || ctx.invoke(job_item))?;
            batch.push(ticket.map(move |result| (item, result)));
        }

        while let Some((item, result)) = batch.next().await {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(error) => {
                    self.ctx.record_local_failure(item, &error.to_string());
                    report.record(Outcome::LocalFailure);
                }
            }
        }

        tracing::debug!(
            succeeded = report.succeeded,
            rejected = report.rejected,
            failed = report.failed,
            "batch complete"
        );
        Ok(report)
    }
}
