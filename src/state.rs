//! Process-lifetime scheduler state and the shared mutex-guarded resources.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::config::{Capabilities, SchedulerConfig};
use crate::deadline::DeadlineTracker;
use crate::error::{Error, Result};
use crate::module::ModuleIndex;
use crate::power::PowerOffDebouncer;
use crate::trigger::TriggerScheduler;
use crate::watchdog::Heartbeat;

pub const MAX_OUTPUT_CHANNELS: usize = 32;

/// Everything the mixer computes in one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixState {
    pub channels: [i16; MAX_OUTPUT_CHANNELS],
    /// Bumped once per completed mixing pass.
    pub generation: u32,
    pub last_mix: Option<Instant>,
}

impl MixState {
    pub const fn new() -> Self {
        Self {
            channels: [0; MAX_OUTPUT_CHANNELS],
            generation: 0,
            last_mix: None,
        }
    }
}

impl Default for MixState {
    fn default() -> Self {
        Self::new()
    }
}

pub type MixMutex = Mutex<CriticalSectionRawMutex, MixState>;
/// Guards the audio queue owned by the audio collaborator. Kept apart from
/// the mix lock so audio and mixing never contend.
pub type AudioMutex = Mutex<CriticalSectionRawMutex, ()>;

pub struct SharedResources {
    pub mix: MixMutex,
    pub audio: AudioMutex,
    open: AtomicBool,
}

impl SharedResources {
    pub const fn new() -> Self {
        Self {
            mix: Mutex::new(MixState::new()),
            audio: Mutex::new(()),
            open: AtomicBool::new(false),
        }
    }

    /// Marks the mutexes as handed out to the task set. Only succeeds once.
    pub fn open(&self) -> Result<()> {
        if self.open.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Default for SharedResources {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler counters and flags, owned for the whole process lifetime and
/// shared by reference between the mixer, menus and supervisor tasks.
pub struct SchedulerState {
    pub caps: Capabilities,
    pub config: SchedulerConfig,
    pub deadlines: DeadlineTracker,
    pub trigger: TriggerScheduler,
    pub power_off: PowerOffDebouncer,
    pub heartbeat: Heartbeat,
    paused: AtomicBool,
    max_mix_duration_us: AtomicU32,
    mix_passes: AtomicU32,
}

impl SchedulerState {
    /// Pulses start paused until the UI has finished initialising.
    pub const fn new(caps: Capabilities, config: SchedulerConfig) -> Self {
        Self {
            caps,
            config,
            deadlines: DeadlineTracker::new(caps),
            trigger: TriggerScheduler::new(),
            power_off: PowerOffDebouncer::new(config.power_off_hold),
            heartbeat: Heartbeat::new(),
            paused: AtomicBool::new(true),
            max_mix_duration_us: AtomicU32::new(0),
            mix_passes: AtomicU32::new(0),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn record_mix_pass(&self, elapsed: Duration) {
        let us = elapsed.as_micros().min(u32::MAX as u64) as u32;
        self.max_mix_duration_us.fetch_max(us, Ordering::Relaxed);
        self.mix_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            max_mix_duration_us: self.max_mix_duration_us.load(Ordering::Relaxed),
            mix_passes: self.mix_passes.load(Ordering::Relaxed),
            triggers: self.trigger.triggers(),
            timeouts: self.trigger.timeouts(),
            missed_internal: self.deadlines.missed(ModuleIndex::Internal),
            missed_external: self.deadlines.missed(ModuleIndex::External),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    pub max_mix_duration_us: u32,
    pub mix_passes: u32,
    pub triggers: u32,
    pub timeouts: u32,
    pub missed_internal: u32,
    pub missed_external: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused() {
        let state = SchedulerState::new(Capabilities::DEFAULT, SchedulerConfig::DEFAULT);
        assert!(state.is_paused());
        state.resume();
        assert!(!state.is_paused());
    }

    #[test]
    fn max_duration_only_grows() {
        let state = SchedulerState::new(Capabilities::DEFAULT, SchedulerConfig::DEFAULT);
        state.record_mix_pass(Duration::from_micros(300));
        state.record_mix_pass(Duration::from_micros(120));
        let d = state.diagnostics();
        assert_eq!(d.max_mix_duration_us, 300);
        assert_eq!(d.mix_passes, 2);
    }

    #[test]
    fn resources_open_once() {
        let res = SharedResources::new();
        assert!(!res.is_open());
        res.open().unwrap();
        assert_eq!(res.open(), Err(Error::AlreadyStarted));
    }
}
