//! Shutdown coordinator.
//!
//! ```text
//! Running ──batch complete──▶ Draining ──┐
//!    │                                   ├──▶ Terminated
//!    └──────interrupt──────▶ Interrupted ┘
//! ```
//!
//! Both paths close the completion gate, then flush the success records and
//! close the raw log. Draining then
//! joins the (idle) slots and waits out the grace delay. Interrupted tears the
//! pool down without waiting and returns immediately; anything still running
//! in a slot is abandoned.

use crate::aggregator::ResultAggregator;
use crate::error::{Error, Result};
use crate::invocation::CompletionGate;
use crate::output::OutputSink;
use crate::pool::SlotPool;
use crate::types::{Event, ShutdownState, WorkItem};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Drives a run from `Running` to `Terminated` exactly once
pub struct ShutdownCoordinator {
    state: AtomicU8,
    aggregator: ResultAggregator,
    sink: Arc<OutputSink>,
    pool: Arc<SlotPool>,
    events: broadcast::Sender<Event>,
    gate: Arc<CompletionGate>,
    grace_delay: Duration,
}

impl ShutdownCoordinator {
    pub(crate) fn new(
        aggregator: ResultAggregator,
        sink: Arc<OutputSink>,
        pool: Arc<SlotPool>,
        events: broadcast::Sender<Event>,
        gate: Arc<CompletionGate>,
        grace_delay: Duration,
    ) -> Self {
        Self {
            state: AtomicU8::new(ShutdownState::Running.to_u8()),
            aggregator,
            sink,
            pool,
            events,
            gate,
            grace_delay,
        }
    }

    /// Current state
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Normal completion path
    ///
    /// Returns the records that were flushed.
    pub async fn drain(&self) -> Result<Vec<WorkItem>> {
        self.transition(ShutdownState::Running, ShutdownState::Draining)?;
        self.gate.close();
        let _ = self.events.send(Event::Draining);

        let flushed = self.flush();

        let pool = self.pool.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || pool.shutdown()).await {
            tracing::warn!(error = %e, "worker pool teardown task failed");
        }

        tokio::time::sleep(self.grace_delay).await;
        self.terminate(ShutdownState::Draining, flushed)
    }

    /// Interrupt path
    ///
    /// Never waits on an execution slot: flushes what has been recorded so
    /// far, detaches the pool and returns.
    pub fn interrupt(&self) -> Result<Vec<WorkItem>> {
        tracing::warn!("interrupt received; abandoning in-flight work");
        self.transition(ShutdownState::Running, ShutdownState::Interrupted)?;
        // Results still being recorded finish first; later ones are dropped unseen
        self.gate.close();
        let _ = self.events.send(Event::Interrupted);

        let flushed = self.flush();

        let abandoned = self.pool.shutdown_now();
        if abandoned > 0 {
            tracing::debug!(abandoned, "in-flight invocations abandoned");
        }

        self.terminate(ShutdownState::Interrupted, flushed)
    }

    fn flush(&self) -> Result<Vec<WorkItem>> {
        let records = self.aggregator.snapshot();
        tracing::info!(
            output_dir = %self.sink.output_dir().display(),
            results = records.len(),
            "writing successful results"
        );

        let written = self.sink.write_results(&records);
        let closed = self.sink.close_raw_log();
        written?;
        closed?;
        Ok(records)
    }

    fn terminate(
        &self,
        from: ShutdownState,
        flushed: Result<Vec<WorkItem>>,
    ) -> Result<Vec<WorkItem>> {
        self.transition(from, ShutdownState::Terminated)?;
        let records = flushed?;
        let _ = self.events.send(Event::Terminated {
            successes: records.len(),
        });
        Ok(records)
    }

    fn transition(&self, from: ShutdownState, to: ShutdownState) -> Result<()> {
        self.state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| Error::InvalidTransition {
                from: ShutdownState::from_u8(actual),
                to,
            })
    }
}
