//! What one execution slot does for one work item.
//!
//! Pace, call the probe once, record any observed response in the raw log,
//! classify, then aggregate and log. Nothing raised here leaves the function.

use crate::aggregator::ResultAggregator;
use crate::output::{OutputSink, RawLogRecord};
use crate::probe::{CallSettings, Probe, SuccessPredicate};
use crate::types::{Event, Outcome, WorkItem};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio::sync::broadcast;

/// Admits invocation results until the run stops observing them
///
/// Every invocation records its result (raw log, aggregation, logging,
/// events) while holding the gate open. Closing waits only for results that
/// are already being recorded, never for a call still in flight; anything
/// that returns afterwards is discarded unseen.
#[derive(Debug, Default)]
pub(crate) struct CompletionGate {
    closed: RwLock<bool>,
}

impl CompletionGate {
    pub(crate) fn is_closed(&self) -> bool {
        *self.read()
    }

    /// Hold the gate open while the guard lives; `None` once closed
    pub(crate) fn enter(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let guard = self.read();
        if *guard { None } else { Some(guard) }
    }

    pub(crate) fn close(&self) {
        *self.closed.write().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn read(&self) -> RwLockReadGuard<'_, bool> {
        self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything an invocation needs, shared by all slots of one run
pub(crate) struct InvocationContext {
    pub(crate) probe: Arc<dyn Probe>,
    pub(crate) predicate: Arc<dyn SuccessPredicate>,
    pub(crate) aggregator: ResultAggregator,
    pub(crate) sink: Arc<OutputSink>,
    pub(crate) events: broadcast::Sender<Event>,
    pub(crate) gate: Arc<CompletionGate>,
    pub(crate) settings: CallSettings,
    pub(crate) pacing_delay: Duration,
}

impl InvocationContext {
    /// Run the full invocation contract for `item` on the current thread
    ///
    /// Blocking. Must only be called from an execution slot. Returns
    /// [`Outcome::Abandoned`] without any side effect once the run has
    /// stopped observing results.
    pub(crate) fn invoke(&self, item: WorkItem) -> Outcome {
        if !self.pacing_delay.is_zero() {
            std::thread::sleep(self.pacing_delay);
        }
        if self.gate.is_closed() {
            return Outcome::Abandoned;
        }

        let result = self.probe.execute(&item, &self.settings);

        let Some(_open) = self.gate.enter() else {
            return Outcome::Abandoned;
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                self.record_local_failure(item, &error.to_string());
                return Outcome::LocalFailure;
            }
        };

        if let Err(error) = self.sink.write_raw(&RawLogRecord::new(&item, &response)) {
            tracing::debug!(item = %item, error = %error, "failed to write raw log record");
        }

        if self.predicate.is_success(&response) {
            tracing::info!(item = %item, status = response.status, "[ + ] valid result");
            self.aggregator.append(item.clone());
            let _ = self.events.send(Event::ItemSucceeded { item });
            Outcome::Success
        } else {
            tracing::info!(item = %item, status = response.status, "[ - ] invalid result");
            let _ = self.events.send(Event::ItemRejected { item });
            Outcome::NonSuccess
        }
    }

    /// Log and publish a contained failure
    ///
    /// Also used by the dispatcher when a slot reports a panic.
    pub(crate) fn record_local_failure(&self, item: WorkItem, error: &str) {
        tracing::debug!(item = %item, error, "local failure");
        let _ = self.events.send(Event::ItemFailed {
            item,
            error: error.to_string(),
        });
    }
}
