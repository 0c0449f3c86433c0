//! Forced power-off detection.
//!
//! A continuous hold of the power button for `hold` forces a shutdown even
//! when the UI task, which normally handles the soft power switch, is stuck.
//! The UI task resets the detector every cycle, so the path only ever fires
//! when the UI is not running.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::platform::Platform;

#[derive(Clone, Copy, Default)]
struct DebounceState {
    pressed_since: Option<Instant>,
    reported: bool,
}

pub struct PowerOffDebouncer {
    hold: Duration,
    state: Mutex<CriticalSectionRawMutex, Cell<DebounceState>>,
}

impl PowerOffDebouncer {
    pub const fn new(hold: Duration) -> Self {
        Self {
            hold,
            state: Mutex::new(Cell::new(DebounceState {
                pressed_since: None,
                reported: false,
            })),
        }
    }

    pub fn is_force_power_off_requested<P: Platform + ?Sized>(&self, platform: &P) -> bool {
        self.poll(platform.is_power_button_held(), Instant::now())
    }

    /// Returns true exactly once per continuous press, as soon as the press
    /// has lasted `hold`.
    pub fn poll(&self, held: bool, now: Instant) -> bool {
        self.state.lock(|cell| {
            let mut s = cell.get();
            let fire = if !held {
                s = DebounceState::default();
                false
            } else {
                match s.pressed_since {
                    None => {
                        s.pressed_since = Some(now);
                        false
                    }
                    Some(since) => {
                        let due = now.saturating_duration_since(since) >= self.hold;
                        if due && !s.reported {
                            s.reported = true;
                            true
                        } else {
                            false
                        }
                    }
                }
            };
            cell.set(s);
            fire
        })
    }

    pub fn reset(&self) {
        self.state.lock(|cell| cell.set(DebounceState::default()));
    }

    pub fn pressed_since(&self) -> Option<Instant> {
        self.state.lock(|cell| cell.get().pressed_since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(10_000);

    /// Polls every 10 ms from `start` for `len_ms` with the button held.
    fn hold_for(d: &PowerOffDebouncer, start: u64, len_ms: u64) -> usize {
        let mut fired = 0;
        let mut t = start;
        while t <= start + len_ms {
            if d.poll(true, Instant::from_millis(t)) {
                fired += 1;
            }
            t += 10;
        }
        fired
    }

    #[test]
    fn short_press_never_fires() {
        let d = PowerOffDebouncer::new(HOLD);
        assert_eq!(hold_for(&d, 1_000, 9_900), 0);
        assert!(!d.poll(false, Instant::from_millis(10_910)));
        assert_eq!(d.pressed_since(), None);
    }

    #[test]
    fn long_press_fires_exactly_once() {
        let d = PowerOffDebouncer::new(HOLD);
        assert_eq!(hold_for(&d, 0, 10_000), 1);
        // Keep holding: no second report for the same press.
        assert_eq!(hold_for(&d, 10_010, 5_000), 0);
    }

    #[test]
    fn release_restarts_the_window() {
        let d = PowerOffDebouncer::new(HOLD);
        assert_eq!(hold_for(&d, 0, 9_000), 0);
        assert!(!d.poll(false, Instant::from_millis(9_010)));

        assert!(!d.poll(true, Instant::from_millis(9_020)));
        assert_eq!(d.pressed_since(), Some(Instant::from_millis(9_020)));
        // 9.98 s into the new press: still nothing.
        assert!(!d.poll(true, Instant::from_millis(19_000)));
        assert!(d.poll(true, Instant::from_millis(19_020)));
    }

    #[test]
    fn second_press_fires_again() {
        let d = PowerOffDebouncer::new(HOLD);
        assert_eq!(hold_for(&d, 0, 10_000), 1);
        d.poll(false, Instant::from_millis(10_500));
        assert_eq!(hold_for(&d, 11_000, 10_000), 1);
    }

    #[test]
    fn reset_from_ui_clears_the_press() {
        let d = PowerOffDebouncer::new(HOLD);
        hold_for(&d, 0, 8_000);
        d.reset();
        assert_eq!(d.pressed_since(), None);
        // The press is timed again from the next poll.
        assert!(!d.poll(true, Instant::from_millis(9_000)));
        assert!(!d.poll(true, Instant::from_millis(18_990)));
        assert!(d.poll(true, Instant::from_millis(19_000)));
    }
}
