//! The run instance.
//!
//! A [`Runner`] owns every piece of state for one run (pool, aggregator,
//! output files, event channel, shutdown coordinator). It is built at run
//! start and consumed by [`Runner::run`], so teardown happens exactly once.

use crate::aggregator::ResultAggregator;
use crate::config::ExecutionConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::invocation::{CompletionGate, InvocationContext};
use crate::output::OutputSink;
use crate::pool::SlotPool;
use crate::probe::{CallSettings, Probe, SuccessPredicate};
use crate::shutdown::ShutdownCoordinator;
use crate::types::{Event, ExitPath, RunSummary, ShutdownState, WorkItem};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// One run of the bounded worker-pool core
pub struct Runner {
    config: Arc<ExecutionConfig>,
    aggregator: ResultAggregator,
    events: broadcast::Sender<Event>,
    dispatcher: Dispatcher,
    coordinator: ShutdownCoordinator,
    interrupt: CancellationToken,
}

impl Runner {
    /// Validate the config, open the output files and start the execution slots
    pub fn new<P, S>(config: ExecutionConfig, probe: P, predicate: S) -> Result<Self>
    where
        P: Probe,
        S: SuccessPredicate,
    {
        config.validate()?;
        let config = Arc::new(config);

        let sink = Arc::new(OutputSink::open(&config.output)?);
        let pool = Arc::new(SlotPool::new(config.concurrency_limit)?);
        let aggregator = ResultAggregator::new();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let gate = Arc::new(CompletionGate::default());

        let ctx = Arc::new(InvocationContext {
            probe: Arc::new(probe),
            predicate: Arc::new(predicate),
            aggregator: aggregator.clone(),
            sink: sink.clone(),
            events: events.clone(),
            gate: gate.clone(),
            settings: CallSettings {
                timeout: config.timeout,
                proxy: config.proxy.clone(),
            },
            pacing_delay: config.pacing_delay,
        });

        let dispatcher = Dispatcher::new(pool.clone(), ctx);
        let coordinator = ShutdownCoordinator::new(
            aggregator.clone(),
            sink,
            pool,
            events.clone(),
            gate,
            config.grace_delay,
        );

        Ok(Self {
            config,
            aggregator,
            events,
            dispatcher,
            coordinator,
            interrupt: CancellationToken::new(),
        })
    }

    /// Configuration this run was built with
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Token that, once cancelled, sends the run down the interrupt path
    ///
    /// Signal listeners (see [`crate::run_with_signals`]) cancel it; tests
    /// and embedders may cancel it directly.
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// Current shutdown state
    pub fn state(&self) -> ShutdownState {
        self.coordinator.state()
    }

    /// Number of success records so far
    pub fn successes(&self) -> usize {
        self.aggregator.len()
    }

    /// Dispatch `items` as one batch and run until it completes or is interrupted
    ///
    /// On interrupt the in-flight batch is dropped without waiting for any
    /// execution slot; the summary holds exactly the successes recorded
    /// before the interrupt was observed.
    pub async fn run(self, items: Vec<WorkItem>) -> Result<RunSummary> {
        let started = Instant::now();
        let submitted = items.len();

        let (exit, batch) = tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => (ExitPath::Interrupted, None),
            report = self.dispatcher.dispatch(items) => (ExitPath::Drained, Some(report?)),
        };

        let successes = match exit {
            ExitPath::Drained => self.coordinator.drain().await?,
            ExitPath::Interrupted => self.coordinator.interrupt()?,
        };

        Ok(RunSummary {
            exit,
            submitted,
            successes,
            batch,
            elapsed: started.elapsed(),
        })
    }
}
