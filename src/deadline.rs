//! Per-module "next fire" bookkeeping.
//!
//! Synchronous modules keep their phase: each call advances the previous
//! deadline by exactly one period. When that advanced deadline is already
//! behind `now` the slot resynchronises to `now + period` instead of
//! replaying the missed frames. Asynchronous modules always restart from
//! `now`.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::config::Capabilities;
use crate::module::{ModuleIndex, ModuleSlot, Protocol, SyncClass, NUM_MODULES};

/// Outcome of one rescheduling step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    OnTime(Instant),
    /// The advanced deadline had already passed by `late_by`.
    Resynced { next: Instant, late_by: Duration },
}

impl Schedule {
    pub fn next(self) -> Instant {
        match self {
            Schedule::OnTime(next) | Schedule::Resynced { next, .. } => next,
        }
    }
}

/// Pure deadline step.
pub fn next_fire(class: SyncClass, previous: Instant, period: Duration, now: Instant) -> Schedule {
    match class {
        SyncClass::Synchronous => {
            let advanced = previous + period;
            if advanced <= now {
                Schedule::Resynced {
                    next: now + period,
                    late_by: now.saturating_duration_since(advanced),
                }
            } else {
                Schedule::OnTime(advanced)
            }
        }
        SyncClass::Asynchronous => Schedule::OnTime(now + period),
    }
}

pub struct DeadlineTracker {
    caps: Capabilities,
    slots: [Mutex<CriticalSectionRawMutex, Cell<ModuleSlot>>; NUM_MODULES],
}

impl DeadlineTracker {
    pub const fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            slots: [
                Mutex::new(Cell::new(ModuleSlot::new())),
                Mutex::new(Cell::new(ModuleSlot::new())),
            ],
        }
    }

    pub fn slot(&self, module: ModuleIndex) -> ModuleSlot {
        self.slots[module.index()].lock(|s| s.get())
    }

    pub fn protocol(&self, module: ModuleIndex) -> Protocol {
        self.slot(module).protocol
    }

    /// Called by model/protocol reconfiguration. The period is forgotten so
    /// the trigger falls back to its default until the new driver publishes
    /// one.
    pub fn set_protocol(&self, module: ModuleIndex, protocol: Protocol) {
        self.slots[module.index()].lock(|s| {
            let mut slot = s.get();
            if slot.protocol != protocol {
                slot.protocol = protocol;
                slot.period = Duration::from_ticks(0);
            }
            s.set(slot);
        });
        debug!("module {} protocol -> {}", module, protocol);
    }

    pub fn is_synchronous(&self, module: ModuleIndex) -> bool {
        self.protocol(module).is_synchronous(&self.caps)
    }

    pub fn schedule_next(&self, module: ModuleIndex, period_ms: u32) -> Instant {
        self.schedule_next_at(module, period_ms, Instant::now())
    }

    pub fn schedule_next_at(&self, module: ModuleIndex, period_ms: u32, now: Instant) -> Instant {
        let period = Duration::from_millis(period_ms as u64);
        let schedule = self.slots[module.index()].lock(|s| {
            let mut slot = s.get();
            let class = slot.protocol.sync_class(&self.caps);
            let schedule = next_fire(class, slot.next_fire, period, now);
            slot.next_fire = schedule.next();
            slot.period = period;
            if let Schedule::Resynced { .. } = schedule {
                slot.missed = slot.missed.wrapping_add(1);
            }
            s.set(slot);
            schedule
        });

        if let Schedule::Resynced { late_by, .. } = schedule {
            warn!("module {} late by {} us, resync", module, late_by.as_micros());
        }
        schedule.next()
    }

    /// Period the mixer trigger should run at: the internal module wins,
    /// then the external one, else `fallback`.
    pub fn trigger_period(&self, fallback: Duration) -> Duration {
        let zero = Duration::from_ticks(0);
        for module in ModuleIndex::ALL {
            if !module.is_present(&self.caps) {
                continue;
            }
            let period = self.slot(module).period;
            if period > zero {
                return period;
            }
        }
        fallback
    }

    pub fn missed(&self, module: ModuleIndex) -> u32 {
        self.slot(module).missed
    }
}
