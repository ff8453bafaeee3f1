//! # probe-runner
//!
//! Bounded worker-pool core for running a large number of independent,
//! blocking, network-bound operations, collecting the successful ones and
//! shutting down promptly on interrupt.
//!
//! ## Design Philosophy
//!
//! probe-runner is designed to be:
//! - **Bounded** - At most `concurrency_limit` invocations ever run at once
//! - **Contained** - A failing or panicking invocation never affects its siblings
//! - **Fast to stop** - An interrupt flushes results and exits without waiting
//!   on invocations stuck inside a network call
//! - **Pluggable** - The worker function and success predicate are supplied by
//!   the caller through the [`Probe`] and [`SuccessPredicate`] traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use probe_runner::{ExecutionConfig, HeaderPresent, HttpProbe, Runner, WorkItem, run_with_signals};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExecutionConfig::default();
//!     let probe = HttpProbe::new(config.http.clone());
//!     let predicate = HeaderPresent::new(config.http.target_header.clone());
//!
//!     let runner = Runner::new(config, probe, predicate)?;
//!     let items = vec![WorkItem::from("a"), WorkItem::from("b")];
//!
//!     let summary = run_with_signals(runner, items).await?;
//!     println!("{} successes", summary.successes.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Success record aggregation
pub mod aggregator;
/// Configuration types
pub mod config;
mod dispatcher;
/// Error types
pub mod error;
/// Reference HTTP probe
pub mod http;
/// Work item sources
pub mod input;
/// Per-item invocation contract
mod invocation;
/// Raw log and results file
pub mod output;
/// Bounded execution slot pool
pub mod pool;
/// Worker function and success predicate traits
pub mod probe;
/// Run instance
pub mod runner;
/// Shutdown state machine
pub mod shutdown;
/// Tracing setup
pub mod telemetry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use aggregator::ResultAggregator;
pub use config::{ExecutionConfig, HttpConfig, OutputConfig};
pub use error::{Error, ProbeError, Result};
pub use http::{HeaderPresent, HttpProbe};
pub use input::ItemSource;
pub use pool::{SlotPool, SlotTicket};
pub use probe::{CallSettings, Probe, StatusIs, SuccessPredicate};
pub use runner::Runner;
pub use shutdown::ShutdownCoordinator;
pub use telemetry::init_tracing;
pub use types::{
    BatchReport, Event, ExitPath, Outcome, ProbeResponse, RunSummary, ShutdownState, WorkItem,
};

use tokio_util::sync::CancellationToken;

/// Run a batch with SIGINT/SIGTERM routed to the interrupt path.
///
/// A background task waits for a termination signal and cancels the runner's
/// interrupt token; the runner then flushes and detaches its pool without
/// waiting for in-flight invocations. The listener is stopped once the run
/// terminates. If no signal source can be registered the run proceeds
/// without interrupt support.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_signals(runner: Runner, items: Vec<WorkItem>) -> Result<RunSummary> {
    let listener = tokio::spawn(forward_signal(wait_for_signal(), runner.interrupt_token()));

    let result = runner.run(items).await;
    listener.abort();
    result
}

/// Cancel `interrupt` once `signal` reports a received signal
async fn forward_signal<F>(signal: F, interrupt: CancellationToken)
where
    F: Future<Output = bool>,
{
    if signal.await {
        interrupt.cancel();
    } else {
        tracing::warn!("No signal handler available; interrupts are disabled for this run");
    }
}

/// Wait for a termination signal. Returns `false` if none could be registered.
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
            true
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
                true
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_fallback().await
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                true
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_fallback().await
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    ctrl_c_fallback().await
}

async fn ctrl_c_fallback() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            false
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn received_signal_cancels_the_run() {
        let token = CancellationToken::new();
        forward_signal(async { true }, token.clone()).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn missing_signal_source_leaves_the_run_alone() {
        let token = CancellationToken::new();
        forward_signal(async { false }, token.clone()).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn run_completes_when_listener_cannot_register() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutionConfig {
            concurrency_limit: 1,
            pacing_delay: Duration::ZERO,
            grace_delay: Duration::ZERO,
            output: OutputConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };
        let runner = Runner::new(
            config,
            |_: &WorkItem, _: &CallSettings| -> std::result::Result<ProbeResponse, ProbeError> {
                std::thread::sleep(Duration::from_millis(20));
                Ok(ProbeResponse::new(200))
            },
            StatusIs(200),
        )
        .unwrap();
        let token = runner.interrupt_token();
        tokio::spawn(forward_signal(async { false }, token));

        let summary = runner.run(vec![WorkItem::from("a")]).await.unwrap();
        assert_eq!(summary.exit, ExitPath::Drained);
        assert_eq!(summary.successes, vec![WorkItem::from("a")]);
    }
}
