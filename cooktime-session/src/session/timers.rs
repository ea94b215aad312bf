//! Timer facility
//!
//! One-shot timers behind a small trait so the session state machine can be
//! driven by real Tokio sleeps in production and by hand in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};

/// Callback run when a timer expires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Schedules one-shot callbacks
pub trait TimerFacility: Send + Sync {
    /// Run `callback` once after `delay`
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle>;

    /// Cancel a timer; unknown or already-fired handles are ignored
    fn cancel(&self, handle: TimerHandle);
}

/// Timers backed by spawned Tokio tasks
#[derive(Default)]
pub struct TokioTimers {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TokioTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers not yet fired or cancelled
    pub fn active(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl TimerFacility for TokioTimers {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Timer(format!("No Tokio runtime to schedule on: {}", e)))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, t| !t.is_finished());
        tasks.insert(id, task);

        Ok(TimerHandle(id))
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = tasks.remove(&handle.0) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

struct ManualTimer {
    delay: Duration,
    callback: TimerCallback,
}

/// Timers that only fire when told to
///
/// Keeps every scheduled callback with its delay; [`ManualTimers::fire_due`]
/// runs the ones whose delay is within the given elapsed time.
#[derive(Default)]
pub struct ManualTimers {
    next_id: AtomicU64,
    timers: Mutex<Vec<(u64, ManualTimer)>>,
    /// Schedule calls to accept before failing (None = never fail)
    fail_after: Mutex<Option<usize>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` more schedule calls, then fail every further one
    pub fn failing_after(n: usize) -> Self {
        let timers = Self::default();
        *timers.fail_after.lock().unwrap_or_else(PoisonError::into_inner) = Some(n);
        timers
    }

    /// Delays of pending timers in schedule order
    pub fn pending_delays(&self) -> Vec<Duration> {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.iter().map(|(_, t)| t.delay).collect()
    }

    pub fn pending(&self) -> usize {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Fire every pending timer whose delay is at most `elapsed`, shortest first
    pub fn fire_due(&self, elapsed: Duration) -> usize {
        let due = {
            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            let (mut due, keep): (Vec<_>, Vec<_>) =
                timers.drain(..).partition(|(_, t)| t.delay <= elapsed);
            *timers = keep;
            due.sort_by_key(|(id, t)| (t.delay, *id));
            due
        };

        let count = due.len();
        // Callbacks run outside the lock so they may schedule again
        for (_, timer) in due {
            (timer.callback)();
        }
        count
    }

    /// Fire every pending timer
    pub fn fire_all(&self) -> usize {
        self.fire_due(Duration::MAX)
    }
}

impl TimerFacility for ManualTimers {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle> {
        {
            let mut fail_after = self.fail_after.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = fail_after.as_mut() {
                if *remaining == 0 {
                    return Err(Error::Timer("timer facility unavailable".to_string()));
                }
                *remaining -= 1;
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Manual timer {} scheduled in {:?}", id, delay);
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, ManualTimer { delay, callback }));
        Ok(TimerHandle(id))
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != handle.0);
    }
}
