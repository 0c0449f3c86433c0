//! Mixer trigger: a re-armable "frame ready" signal with a bounded wait.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant};

pub struct TriggerScheduler {
    signal: Signal<CriticalSectionRawMutex, ()>,
    armed: AtomicBool,
    /// Set by the co-processor when it has queued a mixer run of its own.
    scheduled: AtomicBool,
    triggers: AtomicU32,
    timeouts: AtomicU32,
}

impl TriggerScheduler {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
            armed: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            triggers: AtomicU32::new(0),
            timeouts: AtomicU32::new(0),
        }
    }

    /// Clears any stale trigger and arms detection.
    pub fn start(&self) {
        self.clear_trigger();
        self.enable_trigger();
    }

    /// Hardware side. Consuming the armed state means at most one release
    /// per arming, whatever the interrupt rate.
    pub fn trigger_from_isr(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            self.signal.signal(());
        }
    }

    pub fn enable_trigger(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn disable_trigger(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn clear_trigger(&self) {
        self.signal.reset();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Waits for a trigger or `timeout`. Returns `true` on timeout.
    pub async fn wait_for_trigger(&self, timeout: Duration) -> bool {
        match with_timeout(timeout, self.signal.wait()).await {
            Ok(()) => {
                self.triggers.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(_) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    pub fn mark_scheduled(&self) {
        self.scheduled.store(true, Ordering::Release);
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    pub fn clear_schedule(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    pub fn triggers(&self) -> u32 {
        self.triggers.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

impl Default for TriggerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// The two timers of one mixer cycle: an inner sub-period for frequent
/// actions and an outer ceiling after which the mixer runs regardless.
/// Waits are clipped to the ceiling so wake-up overshoot never accumulates.
#[derive(Clone, Copy, Debug)]
pub struct FrequentActionWindow {
    start: Instant,
    sub_period: Duration,
    deadline: Instant,
}

impl FrequentActionWindow {
    pub fn open(now: Instant, sub_period: Duration, ceiling: Duration) -> Self {
        Self {
            start: now,
            sub_period,
            deadline: now + ceiling,
        }
    }

    /// Wait until the next sub-period boundary (counted from the window
    /// start, clipped to the ceiling), or `None` once the ceiling has been
    /// reached.
    pub fn next_wait(&self, now: Instant) -> Option<Duration> {
        if now >= self.deadline {
            return None;
        }
        let remaining = self.deadline - now;
        let sub = self.sub_period.as_ticks();
        if sub == 0 {
            return Some(remaining);
        }
        let elapsed = now.saturating_duration_since(self.start).as_ticks();
        let boundary = self.start + Duration::from_ticks((elapsed / sub + 1) * sub);
        Some((boundary - now).min(remaining))
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
