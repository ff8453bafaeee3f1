//! Seams for caller-supplied behaviour: the blocking worker function and the
//! success predicate applied to its response.

use crate::error::ProbeError;
use crate::types::{ProbeResponse, WorkItem};
use std::time::Duration;

/// Per-call settings handed to every [`Probe::execute`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSettings {
    /// The call must complete or fail within this duration
    pub timeout: Duration,
    /// Optional outbound proxy URI
    pub proxy: Option<String>,
}

/// Blocking worker function
///
/// Called on an execution slot, never on the async control flow, so it may
/// block for up to `settings.timeout`. Failures are reported as
/// [`ProbeError`] and stay inside the invocation.
pub trait Probe: Send + Sync + 'static {
    /// Perform exactly one blocking operation for `item`
    fn execute(
        &self,
        item: &WorkItem,
        settings: &CallSettings,
    ) -> Result<ProbeResponse, ProbeError>;
}

impl<F> Probe for F
where
    F: Fn(&WorkItem, &CallSettings) -> Result<ProbeResponse, ProbeError> + Send + Sync + 'static,
{
    fn execute(
        &self,
        item: &WorkItem,
        settings: &CallSettings,
    ) -> Result<ProbeResponse, ProbeError> {
        self(item, settings)
    }
}

/// Pure decision over a worker response
pub trait SuccessPredicate: Send + Sync + 'static {
    /// Whether `response` marks its item as a success
    fn is_success(&self, response: &ProbeResponse) -> bool;
}

impl<F> SuccessPredicate for F
where
    F: Fn(&ProbeResponse) -> bool + Send + Sync + 'static,
{
    fn is_success(&self, response: &ProbeResponse) -> bool {
        self(response)
    }
}

/// Accepts any response with the given status code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusIs(pub u16);

impl SuccessPredicate for StatusIs {
    fn is_success(&self, response: &ProbeResponse) -> bool {
        response.status == self.0
    }
}
