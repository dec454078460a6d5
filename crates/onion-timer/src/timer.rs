// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The interval timer and the worker loop driving it.
//!
//! Each running [`IntervalTimer`] owns exactly one worker thread. The worker
//! cycles through four phases:
//!
//! 1. **Waiting** on a condition variable until the next deadline or a stop request.
//! 2. **Firing**: the handler and repeat flag are snapshotted under the lock, the
//!    lock is released, and the handler runs.
//! 3. **Re-arming**: the deadline advances by whole periods until it is in the
//!    future again. Missed ticks are skipped, never queued.
//! 4. **Terminated**: the worker marks itself exited and returns.

use crate::callback::{SharedHandler, TimeoutHandler};
use crate::config::TimerConfig;
use crate::error::{TimerError, TimerResult};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Bookkeeping for the current (or most recently stopped) worker thread.
struct WorkerSlot {
    /// Distinguishes this worker from any earlier one of the same timer.
    generation: u64,
    thread: ThreadId,
    /// Taken by whichever external `stop` call joins the thread.
    handle: Option<JoinHandle<()>>,
    cancelled: bool,
    exited: bool,
}

struct TimerState {
    period: Duration,
    handler: Option<SharedHandler>,
    repeat: bool,
    thread_name: String,
    start_time: Option<Instant>,
    next_deadline: Option<Instant>,
    worker: Option<WorkerSlot>,
    next_generation: u64,
    last_panic: Option<String>,
}

impl TimerState {
    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.exited)
    }

    fn on_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker
            .as_ref()
            .is_some_and(|w| !w.exited && w.thread == current)
    }

    /// Whether the worker of `generation` must leave its loop.
    fn should_exit(&self, generation: u64) -> bool {
        match &self.worker {
            Some(w) => w.generation != generation || w.cancelled,
            None => true,
        }
    }

    fn mark_exited(&mut self, generation: u64) {
        if let Some(worker) = self.worker.as_mut() {
            if worker.generation == generation {
                worker.exited = true;
            }
        }
    }

    /// True while the worker of `generation` is still inside its loop.
    fn worker_alive(&self, generation: u64) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.generation == generation && !w.exited)
    }
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

impl Shared {
    /// Locks the state. No user code runs under this lock, so a poisoned
    /// mutex still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A timer that invokes a handler on a dedicated thread after a period elapses,
/// once or repeatedly.
///
/// All operations take `&self`. Wrap the timer in an [`Arc`] when a handler
/// needs to reach its own timer, preferably through a [`Weak`](std::sync::Weak)
/// to avoid a reference cycle:
///
/// ```no_run
/// use onion_timer::IntervalTimer;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let timer = Arc::new(IntervalTimer::new());
/// let weak = Arc::downgrade(&timer);
/// timer.set_period(Duration::from_millis(500));
/// timer.set_repeat(false);
/// timer.set_handler(move || {
///     if let Some(timer) = weak.upgrade() {
///         timer.stop();
///     }
/// });
/// timer.start();
/// ```
///
/// Dropping the timer stops it and waits for the worker thread to exit.
pub struct IntervalTimer {
    shared: Arc<Shared>,
}

impl IntervalTimer {
    /// Creates a stopped timer with no handler, a zero period and `repeat` enabled.
    ///
    /// The period must be set before the timer can start.
    pub fn new() -> Self {
        Self::from_parts(Duration::ZERO, None, true, TimerConfig::default().thread_name)
    }

    /// Creates a stopped timer with its full configuration.
    pub fn with_handler<H>(period: Duration, handler: H, repeat: bool) -> Self
    where
        H: TimeoutHandler + 'static,
    {
        Self::from_parts(
            period,
            Some(Arc::new(handler)),
            repeat,
            TimerConfig::default().thread_name,
        )
    }

    /// Creates a stopped timer from a configuration record. No handler is set.
    pub fn from_config(config: &TimerConfig) -> Self {
        Self::from_parts(
            config.period(),
            None,
            config.repeat,
            config.thread_name.clone(),
        )
    }

    fn from_parts(
        period: Duration,
        handler: Option<SharedHandler>,
        repeat: bool,
        thread_name: String,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TimerState {
                    period,
                    handler,
                    repeat,
                    thread_name,
                    start_time: None,
                    next_deadline: None,
                    worker: None,
                    next_generation: 0,
                    last_panic: None,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Starts the timer. Does nothing if it is already running.
    ///
    /// # Panics
    ///
    /// Panics if the period is zero: starting such a timer is a configuration bug.
    /// Use [`try_start`](Self::try_start) to get an error instead.
    pub fn start(&self) {
        let mut state = self.shared.lock();
        if state.period.is_zero() {
            drop(state);
            panic!("timer period must be greater than zero");
        }

        if let Err(e) = self.start_locked(&mut state) {
            log::error!("Failed to start timer: {e}");
        }
    }

    /// Starts the timer, reporting a zero period or a spawn failure as an error.
    ///
    /// Returns `Ok(())` without doing anything if the timer is already running.
    pub fn try_start(&self) -> TimerResult<()> {
        let mut state = self.shared.lock();
        self.start_locked(&mut state)
    }

    /// Checks the period and spawns a worker within the caller's critical section.
    fn start_locked(&self, state: &mut TimerState) -> TimerResult<()> {
        if state.period.is_zero() {
            return Err(TimerError::ZeroPeriod);
        }
        if state.is_running() {
            return Ok(());
        }

        // A worker that stopped itself has left its loop but was never joined.
        if let Some(stale) = state.worker.take().and_then(|w| w.handle) {
            if stale.join().is_err() {
                log::error!("Previous timer worker thread panicked.");
            }
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(state.thread_name.clone())
            .spawn(move || run_worker(shared, generation))?;

        state.worker = Some(WorkerSlot {
            generation,
            thread: handle.thread().id(),
            handle: Some(handle),
            cancelled: false,
            exited: false,
        });
        state.start_time = None;
        state.next_deadline = None;
        state.last_panic = None;

        Ok(())
    }

    /// Stops the timer. Does nothing if it is not running.
    ///
    /// From any thread other than the worker, this blocks until the worker has
    /// exited, so the handler will not be invoked again once it returns. A
    /// handler currently executing always runs to completion.
    ///
    /// Called from the timer's own handler, this only requests the stop and
    /// returns immediately; the worker exits once the handler returns.
    pub fn stop(&self) {
        self.stop_locked(self.shared.lock());
    }

    /// Cancels the current worker under the given guard, then waits for it to
    /// exit unless called from the worker itself.
    fn stop_locked(&self, mut state: MutexGuard<'_, TimerState>) {
        let current = thread::current().id();

        let Some(worker) = state.worker.as_mut() else {
            return;
        };
        let generation = worker.generation;
        worker.cancelled = true;

        if worker.thread == current {
            log::debug!("Timer stop requested from its own handler.");
            drop(state);
            self.shared.wakeup.notify_all();
            return;
        }

        let handle = worker.handle.take();
        drop(state);
        self.shared.wakeup.notify_all();

        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    log::error!("Timer worker thread panicked.");
                }
            }
            None => {
                // Another caller is joining this worker; wait for it to leave its loop.
                let state = self.shared.lock();
                let _state = self
                    .shared
                    .wakeup
                    .wait_while(state, |s| s.worker_alive(generation))
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        let mut state = self.shared.lock();
        if state
            .worker
            .as_ref()
            .is_some_and(|w| w.generation == generation && w.handle.is_none())
        {
            state.worker = None;
        }
    }

    /// Stops then starts the timer, with a freshly computed deadline.
    ///
    /// Called from the timer's own handler, this behaves like [`stop`](Self::stop):
    /// the worker cannot wait for itself, so the timer ends after the handler returns.
    ///
    /// # Panics
    ///
    /// Panics if the period is zero, like [`start`](Self::start).
    pub fn restart(&self) {
        if self.shared.lock().on_worker_thread() {
            log::warn!(
                "Timer restart requested from its own handler; the timer stops instead."
            );
        }
        self.stop();
        self.start();
    }

    /// Replaces the handler. The next firing uses the new one.
    pub fn set_handler<H>(&self, handler: H)
    where
        H: TimeoutHandler + 'static,
    {
        // The previous handler may own the timer, so it is dropped after unlocking.
        let previous = self.shared.lock().handler.replace(Arc::new(handler));
        drop(previous);
    }

    /// Removes the handler. The timer keeps running and fires into nothing.
    pub fn clear_handler(&self) {
        let previous = self.shared.lock().handler.take();
        drop(previous);
    }

    /// Sets the period.
    ///
    /// If the timer is running it is stopped and started again, so the new period
    /// applies right away instead of after the pending deadline. A zero period is
    /// stored but leaves the timer stopped.
    pub fn set_period(&self, period: Duration) {
        let mut state = self.shared.lock();
        // Storing the period and cancelling the running worker happen together, so
        // any worker started from here on is armed with the new period.
        state.period = period;
        if !state.is_running() {
            return;
        }

        if state.on_worker_thread() {
            log::warn!(
                "Timer period changed from its own handler; the timer stops after this firing."
            );
            self.stop_locked(state);
            return;
        }

        self.stop_locked(state);
        if let Err(e) = self.try_start() {
            log::warn!("Timer not restarted after period change: {e}");
        }
    }

    /// Sets whether the timer re-arms after firing.
    ///
    /// Read at the next firing: it neither revives a finished one-shot nor cuts
    /// short the wait in progress.
    pub fn set_repeat(&self, repeat: bool) {
        self.shared.lock().repeat = repeat;
    }

    /// Whether a worker thread is currently active.
    pub fn is_running(&self) -> bool {
        self.shared.lock().is_running()
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.shared.lock().period
    }

    /// The configured repeat flag.
    pub fn repeat(&self) -> bool {
        self.shared.lock().repeat
    }

    /// Time left until the next firing.
    ///
    /// Zero when the timer is stopped or when the deadline has passed but the
    /// worker has not processed it yet. [`Duration::MAX`] when the deadline lies
    /// beyond what [`Instant`] can represent, so the worker waits until stopped.
    pub fn remaining_time(&self) -> Duration {
        let state = self.shared.lock();
        if !state.is_running() {
            return Duration::ZERO;
        }
        match (state.next_deadline, state.start_time) {
            (Some(deadline), _) => deadline.saturating_duration_since(Instant::now()),
            (None, Some(_)) => Duration::MAX,
            // Worker spawned but has not armed its first deadline yet.
            (None, None) => state.period,
        }
    }

    /// The instant the current (or last) run began, once its worker has armed.
    pub fn started_at(&self) -> Option<Instant> {
        self.shared.lock().start_time
    }

    /// The message of the handler panic that stopped the last run, if any.
    ///
    /// Cleared when the timer starts again.
    pub fn last_panic(&self) -> Option<String> {
        self.shared.lock().last_panic.clone()
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("IntervalTimer")
            .field("period", &state.period)
            .field("repeat", &state.repeat)
            .field("running", &state.is_running())
            .finish_non_exhaustive()
    }
}

fn run_worker(shared: Arc<Shared>, generation: u64) {
    let mut state = shared.lock();

    let start_time = Instant::now();
    state.start_time = Some(start_time);
    state.next_deadline = start_time.checked_add(state.period);
    log::info!(
        "Timer worker started (period {:?}, repeat {}).",
        state.period,
        state.repeat
    );

    loop {
        // Waiting
        loop {
            if state.should_exit(generation) {
                finish(&shared, state, generation);
                return;
            }

            let now = Instant::now();
            let next_deadline = state.next_deadline;
            state = match next_deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => {
                    shared
                        .wakeup
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                // Deadline beyond what `Instant` can represent.
                None => shared
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }

        // Firing
        let handler = state.handler.clone();
        let repeat = state.repeat;
        drop(state);

        if let Some(handler) = handler {
            log::trace!("Timer elapsed, invoking handler.");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.on_timeout()));
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                log::error!("Timer handler panicked, stopping timer: {message}");
                let mut state = shared.lock();
                state.last_panic = Some(message);
                finish(&shared, state, generation);
                return;
            }
        }

        if !repeat {
            finish(&shared, shared.lock(), generation);
            return;
        }

        // Re-arming
        state = shared.lock();
        if state.period.is_zero() {
            log::warn!("Timer period is zero, stopping instead of re-arming.");
            finish(&shared, state, generation);
            return;
        }
        if let Some(deadline) = state.next_deadline {
            let (next, skipped) = next_aligned_deadline(deadline, state.period, Instant::now());
            if skipped > 0 {
                log::debug!("Timer fell behind, skipping {skipped} missed tick(s).");
            }
            state.next_deadline = next;
        }
    }
}

fn finish(shared: &Shared, mut state: MutexGuard<'_, TimerState>, generation: u64) {
    state.mark_exited(generation);
    drop(state);
    shared.wakeup.notify_all();
    log::info!("Timer worker stopped.");
}

/// Advances `deadline` by whole periods until it lies strictly after `now`.
/// `period` must be non-zero.
///
/// Returns the new deadline (`None` if it overflows `Instant`) and the number of
/// ticks skipped past the one that just fired.
fn next_aligned_deadline(
    deadline: Instant,
    period: Duration,
    now: Instant,
) -> (Option<Instant>, u128) {
    if now < deadline {
        return (Some(deadline), 0);
    }

    let step = period.as_nanos();
    let behind = now.duration_since(deadline).as_nanos();
    let ticks = behind / step + 1;

    let next = u64::try_from(step * ticks)
        .ok()
        .and_then(|nanos| deadline.checked_add(Duration::from_nanos(nanos)));

    (next, ticks - 1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
