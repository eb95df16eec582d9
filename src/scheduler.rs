//! Timer capability injected into sessions
//!
//! Debounced handlers never reach for a global timer. They get a
//! `Scheduler` through the session options:
//! - `TokioScheduler`: real timers on a tokio runtime
//! - `ManualScheduler`: virtual clock advanced explicitly (tests, CLI)
//!
//! Tokio timers fire on a runtime worker, not on the thread that armed them.
//! Inside a runtime that is the caller's own executor; outside one, every
//! scheduler shares a single process-wide `b3nd-timer` thread. Sessions
//! serialize their passes, so a deferred write-back never interleaves with a
//! pass started elsewhere. Hosts that need delivery on their own thread
//! inject a `ManualScheduler` and drive it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{B3ndError, Result};

/// Timer runtime shared by every scheduler created outside a runtime
static TIMER_RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn timer_runtime() -> Result<&'static Runtime> {
    TIMER_RUNTIME.get_or_try_init(|| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("b3nd-timer")
            .enable_time()
            .build()
            .map_err(|e| B3ndError::Scheduler {
                reason: format!("failed to build timer runtime: {e}"),
            })?;
        debug!("started shared timer runtime");
        Ok(runtime)
    })
}

pub type TimerId = u64;

/// Deferred work; owns everything it touches
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a pending task; no-op when it already ran
    fn cancel(&self, id: TimerId);
}

// ═══════════════════════════════════════════
// TOKIO
// ═══════════════════════════════════════════

/// Timers as sleeping tokio tasks
pub struct TokioScheduler {
    handle: Handle,
    timers: Arc<DashMap<TimerId, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Use the current runtime, or the shared process-wide timer runtime
    pub fn new() -> Result<Self> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => timer_runtime()?.handle().clone(),
        };
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            timers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);

        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers.remove(&id);
            task();
        });

        self.timers.insert(id, join);
        // a zero-delay task may already have run and missed its own removal
        self.timers.remove_if(&id, |_, join| join.is_finished());
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some((_, join)) = self.timers.remove(&id) {
            join.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}

// ═══════════════════════════════════════════
// MANUAL
// ═══════════════════════════════════════════

struct PendingTask {
    id: TimerId,
    due: Duration,
    task: Task,
}

/// Virtual-clock scheduler; tasks run only inside `advance`
#[derive(Default)]
pub struct ManualScheduler {
    now: Mutex<Duration>,
    pending: Mutex<Vec<PendingTask>>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn now(&self) -> Duration {
        *self.now.lock()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Move the clock forward and run every task that became due, in due
    /// order. Returns how many ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut now = self.now.lock();
            *now += by;
            *now
        };

        let mut ran = 0;
        loop {
            // pop outside the run so tasks can schedule more work
            let next = {
                let mut pending = self.pending.lock();
                let earliest = pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.id))
                    .map(|(i, _)| i);
                earliest.map(|i| pending.remove(i))
            };
            let Some(next) = next else {
                break;
            };
            (next.task)();
            ran += 1;
        }
        ran
    }

    /// Run everything still pending regardless of due time
    pub fn flush(&self) -> usize {
        let latest = self
            .pending
            .lock()
            .iter()
            .map(|p| p.due)
            .max()
            .unwrap_or_default();
        let now = self.now();
        self.advance(latest.saturating_sub(now))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let due = self.now() + delay;
        self.pending.lock().push(PendingTask { id, due, task });
        id
    }

    fn cancel(&self, id: TimerId) {
        self.pending.lock().retain(|p| p.id != id);
    }
}

// ═══════════════════════════════════════════
// DEBOUNCE
// ═══════════════════════════════════════════

/// Trailing-edge debounce: every trigger replaces the pending task
pub struct Debouncer {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    pending: Mutex<Option<TimerId>>,
}

impl Debouncer {
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self {
            scheduler,
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn trigger(&self, task: Task) {
        let mut pending = self.pending.lock();
        if let Some(id) = pending.take() {
            self.scheduler.cancel(id);
        }
        *pending = Some(self.scheduler.schedule(self.delay, task));
    }
}
