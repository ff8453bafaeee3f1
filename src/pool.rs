//! Bounded pool of blocking execution slots.
//!
//! Each slot is a named OS thread pulling boxed jobs from one shared
//! unbounded queue, so submission never blocks the control flow while the
//! work itself may block for as long as the worker function needs. The pool
//! size is fixed at construction.
//!
//! Two teardown modes exist:
//! - [`SlotPool::shutdown`] closes the queue and joins every slot.
//! - [`SlotPool::shutdown_now`] closes the queue, drops any job that has not
//!   started yet and detaches the slots without joining them. It returns
//!   immediately even if every slot is stuck inside a network call.

use crate::error::{Error, ProbeError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Slot occupancy counters shared between the pool handle and its threads
#[derive(Debug, Default)]
struct Occupancy {
    busy: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicU64,
}

impl Occupancy {
    fn enter(self: &Arc<Self>) -> OccupancyGuard {
        let now = self.busy.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        OccupancyGuard {
            occupancy: self.clone(),
        }
    }
}

struct OccupancyGuard {
    occupancy: Arc<Occupancy>,
}

impl Drop for OccupancyGuard {
    fn drop(&mut self) {
        self.occupancy.busy.fetch_sub(1, Ordering::SeqCst);
        self.occupancy.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fixed-capacity pool of blocking execution slots
pub struct SlotPool {
    capacity: usize,
    sender: Mutex<Option<Sender<Job>>>,
    slots: Mutex<Vec<JoinHandle<()>>>,
    abandoned: Arc<AtomicBool>,
    occupancy: Arc<Occupancy>,
}

impl SlotPool {
    /// Spawn `capacity` execution slots
    ///
    /// Fails with [`Error::Config`] on a zero capacity and with
    /// [`Error::SlotSpawn`] if the OS refuses a thread. Slots that were
    /// already started are detached in that case.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config(
                "concurrency_limit",
                "worker pool needs at least one execution slot",
            ));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let abandoned = Arc::new(AtomicBool::new(false));
        let mut slots = Vec::with_capacity(capacity);

        for slot in 0..capacity {
            let receiver = receiver.clone();
            let abandoned = abandoned.clone();
            let handle = thread::Builder::new()
                .name(format!("probe-slot-{slot}"))
                .spawn(move || run_slot(slot, receiver, abandoned))
                .map_err(|source| Error::SlotSpawn { slot, source })?;
            slots.push(handle);
        }

        tracing::debug!(capacity, "worker pool started");

        Ok(Self {
            capacity,
            sender: Mutex::new(Some(sender)),
            slots: Mutex::new(slots),
            abandoned,
            occupancy: Arc::new(Occupancy::default()),
        })
    }

    /// Number of execution slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently running a job
    pub fn busy(&self) -> usize {
        self.occupancy.busy.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously busy slots observed so far
    pub fn peak_busy(&self) -> usize {
        self.occupancy.peak.load(Ordering::SeqCst)
    }

    /// Jobs that finished running (including ones that panicked)
    pub fn completed(&self) -> u64 {
        self.occupancy.completed.load(Ordering::Relaxed)
    }

    /// Whether either teardown has run
    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Queue a blocking job and return a ticket that resolves when it finishes
    ///
    /// Never blocks. A panic inside `job` is caught in the slot and reported
    /// as [`ProbeError::Panicked`]; the slot keeps serving.
    pub fn submit<F, T>(&self, job: F) -> Result<SlotTicket<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let occupancy = self.occupancy.clone();

        let wrapped: Job = Box::new(move || {
            let result = {
                let _guard = occupancy.enter();
                std::panic::catch_unwind(AssertUnwindSafe(job))
                    .map_err(|payload| ProbeError::Panicked(panic_message(payload.as_ref())))
            };
            // Receiver may be gone if the batch was abandoned.
            let _ = tx.send(result);
        });

        let sender = lock(&self.sender);
        match sender.as_ref() {
            Some(sender) => sender.send(wrapped).map_err(|_| Error::PoolClosed)?,
            None => return Err(Error::PoolClosed),
        }

        Ok(SlotTicket { rx })
    }

    /// Close the queue and wait for every slot to exit
    ///
    /// Jobs already queued still run. Blocks the calling thread; call it from
    /// `spawn_blocking` inside async code.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());

        let handles = std::mem::take(&mut *lock(&self.slots));
        for (slot, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::warn!(slot, "execution slot exited abnormally");
            }
        }

        tracing::debug!(completed = self.completed(), "worker pool drained");
    }

    /// Close the queue and detach every slot without waiting
    ///
    /// Jobs not yet started are dropped and their tickets resolve to
    /// [`ProbeError::Abandoned`]. Jobs occupying a slot keep running until
    /// they return or the process exits; their results are never observed.
    /// Returns the number of slots that were busy at teardown.
    pub fn shutdown_now(&self) -> usize {
        self.abandoned.store(true, Ordering::SeqCst);
        drop(lock(&self.sender).take());

        let detached = std::mem::take(&mut *lock(&self.slots));
        let busy = self.busy();
        tracing::debug!(
            detached = detached.len(),
            busy,
            "worker pool torn down without waiting"
        );
        drop(detached);
        busy
    }
}

impl Drop for SlotPool {
    fn drop(&mut self) {
        // Never join here; a dropped pool behaves like a closed queue.
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

impl std::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity)
            .field("busy", &self.busy())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Completion handle for one submitted job
///
/// Resolves to the job's return value, or to a [`ProbeError`] if it panicked
/// or was abandoned by [`SlotPool::shutdown_now`].
#[must_use = "a ticket does nothing unless awaited"]
pub struct SlotTicket<T> {
    rx: oneshot::Receiver<std::result::Result<T, ProbeError>>,
}

impl<T> Future for SlotTicket<T> {
    type Output = std::result::Result<T, ProbeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Abandoned),
        })
    }
}

fn run_slot(slot: usize, receiver: Receiver<Job>, abandoned: Arc<AtomicBool>) {
    tracing::trace!(slot, "execution slot started");
    for job in receiver.iter() {
        if abandoned.load(Ordering::SeqCst) {
            drop(job);
            continue;
        }
        job();
    }
    tracing::trace!(slot, "execution slot exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
