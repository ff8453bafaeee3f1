//! Scripted probes that behave per item without touching the network

use probe_runner::{CallSettings, Probe, ProbeError, ProbeResponse, WorkItem};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Header the scripted success responses carry
pub const MARKER_HEADER: &str = "target_header";

/// What the probe does for a given item
#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// 200 with the marker header
    Succeed,
    /// 200 without the marker header
    Reject,
    /// Local failure (no response observed)
    Fail,
    /// Panic inside the worker function
    Panic,
    /// Park far longer than any test waits
    Hang,
}

/// Counters shared between the probe and the test body
#[derive(Debug, Default)]
pub struct ProbeStats {
    pub started: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub hanging: AtomicUsize,
}

impl ProbeStats {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn hanging(&self) -> usize {
        self.hanging.load(Ordering::SeqCst)
    }
}

/// Probe whose outcome is looked up per item
pub struct ScriptedProbe {
    script: HashMap<String, Behavior>,
    fallback: Behavior,
    work: Duration,
    stats: Arc<ProbeStats>,
}

impl ScriptedProbe {
    pub fn new(fallback: Behavior) -> Self {
        Self {
            script: HashMap::new(),
            fallback,
            work: Duration::ZERO,
            stats: Arc::new(ProbeStats::default()),
        }
    }

    pub fn with(mut self, item: &str, behavior: Behavior) -> Self {
        self.script.insert(item.to_string(), behavior);
        self
    }

    /// Simulated call duration for non-hanging behaviors
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn stats(&self) -> Arc<ProbeStats> {
        self.stats.clone()
    }

    fn behavior(&self, item: &WorkItem) -> Behavior {
        self.script
            .get(item.as_str())
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl Probe for ScriptedProbe {
    fn execute(
        &self,
        item: &WorkItem,
        _settings: &CallSettings,
    ) -> Result<ProbeResponse, ProbeError> {
        self.stats.started.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.stats.active);

        let behavior = self.behavior(item);
        if matches!(behavior, Behavior::Hang) {
            self.stats.hanging.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_secs(30));
        } else if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }

        match behavior {
            Behavior::Succeed | Behavior::Hang => {
                Ok(ProbeResponse::new(200).with_header(MARKER_HEADER, "1"))
            }
            Behavior::Reject => Ok(ProbeResponse::new(200)),
            Behavior::Fail => Err(ProbeError::Other(format!("scripted failure for {item}"))),
            Behavior::Panic => panic!("scripted panic for {item}"),
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
