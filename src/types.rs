//! Core types for probe-runner

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque identifier of one unit of work
///
/// Items are immutable once read from their source and are consumed exactly
/// once by one worker invocation. No structure is assumed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    /// Create a new WorkItem
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the item and return the identifier
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for WorkItem {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WorkItem {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for WorkItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload returned by a worker function that reached the network
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Status code reported by the remote end
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: BTreeMap<String, String>,
}

impl ProbeResponse {
    /// Create a response with a status and no headers
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Classification of one finished invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The success predicate accepted the response
    Success,
    /// A response was observed but rejected (or never produced)
    NonSuccess,
    /// The invocation raised and the fault was contained
    LocalFailure,
    /// The run terminated before the result could be recorded; nothing about
    /// it is observed
    Abandoned,
}

/// Tally of one completed batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Invocations submitted
    pub submitted: usize,
    /// Invocations classified as success
    pub succeeded: usize,
    /// Invocations classified as non-success
    pub rejected: usize,
    /// Invocations that hit a local failure (including slot panics)
    pub failed: usize,
}

impl BatchReport {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::NonSuccess => self.rejected += 1,
            Outcome::LocalFailure => self.failed += 1,
            Outcome::Abandoned => {}
        }
    }

    /// Invocations that returned, in any classification
    pub fn completed(&self) -> usize {
        self.succeeded + self.rejected + self.failed
    }
}

/// Shutdown coordinator state
///
/// `Running -> {Draining, Interrupted} -> Terminated`. `Terminated` is final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownState {
    /// Batch in flight
    Running,
    /// Normal completion path
    Draining,
    /// Signal-driven path; in-flight invocations are abandoned
    Interrupted,
    /// Reached from either path, never left
    Terminated,
}

impl ShutdownState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ShutdownState::Running => 0,
            ShutdownState::Draining => 1,
            ShutdownState::Interrupted => 2,
            ShutdownState::Terminated => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            2 => ShutdownState::Interrupted,
            _ => ShutdownState::Terminated,
        }
    }
}

impl std::fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShutdownState::Running => "running",
            ShutdownState::Draining => "draining",
            ShutdownState::Interrupted => "interrupted",
            ShutdownState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPath {
    /// Every invocation in the batch returned
    Drained,
    /// An external interrupt abandoned the batch
    Interrupted,
}

/// Events emitted during a run
///
/// Delivered over a broadcast channel; slow subscribers may miss events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A batch was formed and submitted
    BatchStarted {
        /// Number of items in the batch
        items: usize,
    },
    /// An item satisfied the success predicate
    ItemSucceeded {
        /// The item
        item: WorkItem,
    },
    /// An item produced a response that was rejected, or no response
    ItemRejected {
        /// The item
        item: WorkItem,
    },
    /// An item hit a local failure
    ItemFailed {
        /// The item
        item: WorkItem,
        /// Error message
        error: String,
    },
    /// Normal shutdown path entered
    Draining,
    /// Interrupt path entered
    Interrupted,
    /// Results flushed and run finished
    Terminated {
        /// Number of success records flushed
        successes: usize,
    },
}

/// Summary returned once a run reaches `Terminated`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Which shutdown path was taken
    pub exit: ExitPath,
    /// Items whose invocations were submitted
    pub submitted: usize,
    /// Successful items in append order
    pub successes: Vec<WorkItem>,
    /// Per-classification tallies; `None` when the batch was interrupted
    pub batch: Option<BatchReport>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the run was cut short by an interrupt
    pub fn was_interrupted(&self) -> bool {
        self.exit == ExitPath::Interrupted
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = ProbeResponse::new(200).with_header("Target_Header", "1");
        assert_eq!(response.header("target_header"), Some("1"));
        assert_eq!(response.header("TARGET_HEADER"), Some("1"));
        assert_eq!(response.header("other"), None);
    }

    #[test]
    fn shutdown_state_u8_encoding_is_stable() {
        for state in [
            ShutdownState::Running,
            ShutdownState::Draining,
            ShutdownState::Interrupted,
            ShutdownState::Terminated,
        ] {
            assert_eq!(ShutdownState::from_u8(state.to_u8()), state);
        }
        assert_eq!(
            ShutdownState::from_u8(200),
            ShutdownState::Terminated,
            "unknown values collapse to the terminal state"
        );
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = Event::ItemSucceeded {
            item: WorkItem::from("b"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "item_succeeded");
        assert_eq!(json["item"], "b");
    }

    #[test]
    fn work_item_displays_raw_identifier() {
        let item = WorkItem::new("user@example.com");
        assert_eq!(item.to_string(), "user@example.com");
        assert_eq!(item.as_str(), "user@example.com");
        assert_eq!(item.into_inner(), "user@example.com");
    }
}
