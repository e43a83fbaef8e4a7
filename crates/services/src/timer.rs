//! One-second countdown used to bound an attempt.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Interval between decrements.
pub const TICK: Duration = Duration::from_secs(1);

type TickCallback = Box<dyn FnMut(u32) + Send>;
type ExpireCallback = Box<dyn FnMut() + Send>;

/// Observable countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    pub remaining_secs: u32,
    pub running: bool,
}

#[derive(Default)]
struct Inner {
    state: TimerState,
    generation: u64,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    on_tick: Mutex<Option<TickCallback>>,
    on_expire: Mutex<Option<ExpireCallback>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking callback must not wedge the countdown.
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Shared {
    fn fire_tick(&self, remaining: u32) {
        if let Some(cb) = lock(&self.on_tick).as_mut() {
            cb(remaining);
        }
    }

    fn fire_expire(&self) {
        if let Some(cb) = lock(&self.on_expire).as_mut() {
            cb();
        }
    }

    /// Decrement once for `generation`; `None` when that countdown is no longer live.
    fn step(&self, generation: u64) -> Option<u32> {
        let mut inner = lock(&self.inner);
        if inner.generation != generation || !inner.state.running {
            return None;
        }
        inner.state.remaining_secs = inner.state.remaining_secs.saturating_sub(1);
        if inner.state.remaining_secs == 0 {
            inner.state.running = false;
        }
        Some(inner.state.remaining_secs)
    }

    /// Claim an immediate expiry for a countdown started at zero.
    fn claim_zero_start(&self, generation: u64) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != generation || !inner.state.running {
            return false;
        }
        inner.state.running = false;
        true
    }
}

async fn run(shared: Arc<Shared>, generation: u64, start_secs: u32) {
    if start_secs == 0 {
        if shared.claim_zero_start(generation) {
            info!("countdown started at zero; expiring immediately");
            shared.fire_expire();
        }
        return;
    }

    loop {
        // Each tick is scheduled only after the previous update completed.
        tokio::time::sleep(TICK).await;
        let Some(remaining) = shared.step(generation) else {
            return;
        };
        shared.fire_tick(remaining);
        if remaining == 0 {
            info!("countdown expired");
            shared.fire_expire();
            return;
        }
    }
}

/// Countdown timer with replaceable tick and expiry callbacks.
///
/// Callbacks are stored in single-slot cells and looked up on every tick, so
/// registering a new callback affects an already running countdown. The
/// expiry callback runs at most once per `start`. `start` must be called from
/// within a tokio runtime.
#[derive(Default)]
pub struct CountdownTimer {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the callback invoked with the remaining seconds after each tick.
    pub fn on_tick(&self, callback: impl FnMut(u32) + Send + 'static) {
        *lock(&self.shared.on_tick) = Some(Box::new(callback));
    }

    /// Replace the callback invoked when the countdown reaches zero.
    pub fn on_expire(&self, callback: impl FnMut() + Send + 'static) {
        *lock(&self.shared.on_expire) = Some(Box::new(callback));
    }

    /// Start counting down from `total_secs`, replacing any running countdown.
    pub fn start(&mut self, total_secs: u32) {
        let generation = {
            let mut inner = lock(&self.shared.inner);
            inner.generation = inner.generation.wrapping_add(1);
            inner.state = TimerState {
                remaining_secs: total_secs,
                running: true,
            };
            inner.generation
        };
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(total_secs, "countdown started");
        self.task = Some(tokio::spawn(run(
            Arc::clone(&self.shared),
            generation,
            total_secs,
        )));
    }

    /// Halt the countdown; no further ticks or expiry until the next `start`.
    pub fn stop(&mut self) {
        let was_running = {
            let mut inner = lock(&self.shared.inner);
            inner.generation = inner.generation.wrapping_add(1);
            std::mem::replace(&mut inner.state.running, false)
        };
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if was_running {
            debug!(remaining = self.remaining(), "countdown stopped");
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        lock(&self.shared.inner).state
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.state().remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().running
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counters(timer: &CountdownTimer) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        let ticks = Arc::new(AtomicU32::new(0));
        let expiries = Arc::new(AtomicU32::new(0));
        let t = Arc::clone(&ticks);
        timer.on_tick(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        });
        let e = Arc::clone(&expiries);
        timer.on_expire(move || {
            e.fetch_add(1, Ordering::SeqCst);
        });
        (ticks, expiries)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_exactly_total_ticks_then_expires_once() {
        let mut timer = CountdownTimer::new();
        let (ticks, expiries) = counters(&timer);

        timer.start(600);
        tokio::time::sleep(Duration::from_secs(599) + Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 599);
        assert_eq!(expiries.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 600);
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), TimerState { remaining_secs: 0, running: false });
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking_permanently() {
        let mut timer = CountdownTimer::new();
        let (ticks, expiries) = counters(&timer);

        timer.start(600);
        tokio::time::sleep(Duration::from_millis(300_500)).await;
        timer.stop();
        assert_eq!(timer.remaining(), 300);

        tokio::time::sleep(Duration::from_secs(1_000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 300);
        assert_eq!(expiries.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining(), 300);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_pending_countdown() {
        let mut timer = CountdownTimer::new();
        let (ticks, expiries) = counters(&timer);

        timer.start(5);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        timer.start(3);
        assert_eq!(timer.remaining(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2 + 3);
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_start_expires_immediately() {
        let mut timer = CountdownTimer::new();
        let (ticks, expiries) = counters(&timer);

        timer.start(0);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(expiries.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_callback_is_used_by_running_timer() {
        let mut timer = CountdownTimer::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&first);
        timer.on_expire(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        timer.start(2);
        tokio::time::sleep(Duration::from_millis(500)).await;

        let s = Arc::clone(&second);
        timer.on_expire(move || {
            s.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_never_increases_while_running() {
        let mut timer = CountdownTimer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        timer.on_tick(move |r| s.lock().unwrap().push(r));

        timer.start(4);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1, 0]);
    }
}
