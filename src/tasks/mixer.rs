use core::cell::Cell;

use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use radio_mixer_sched::crsf::{rc_channels_frame, RcChannels, CRSF_PERIOD_MS, RC_FRAME_LEN};
use radio_mixer_sched::mixer::{Housekeeping, Mixer, MixerLoop, PulseOutput};
use radio_mixer_sched::module::NUM_MODULES;
use radio_mixer_sched::{MixState, ModuleIndex, Protocol, SchedulerState};

use crate::host::Firmware;
use crate::hw::IwdgWatchdog;
use crate::{RESOURCES, STATE};

/// Re-run period of a module slot with nothing plugged in.
const IDLE_MODULE_PERIOD_MS: u32 = 10;

// ── Inter-task channels ───────────────────────────────────────────────────────
//  Cap=1: the mixer only ever wants the latest trainer sample.
pub static TRAINER_CHAN: Channel<CriticalSectionRawMutex, RcChannels, 1> = Channel::new();
static TRAINER_INPUT: Mutex<CriticalSectionRawMutex, Cell<Option<RcChannels>>> =
    Mutex::new(Cell::new(None));

/// Frame handed from the mixer to each module's UART task.
pub static MODULE_FRAMES: [Signal<CriticalSectionRawMutex, [u8; RC_FRAME_LEN]>; NUM_MODULES] =
    [Signal::new(), Signal::new()];

pub static TELEMETRY_WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Passes the trainer channels straight through.
struct TrainerMixer;

impl Mixer for TrainerMixer {
    fn calculate(&mut self, mix: &mut MixState) {
        if let Some(rc) = TRAINER_INPUT.lock(|t| t.get()) {
            rc.to_mix(&mut mix.channels);
        }
    }
}

struct ModulePorts {
    state: &'static SchedulerState,
    frames: [Option<[u8; RC_FRAME_LEN]>; NUM_MODULES],
}

impl PulseOutput for ModulePorts {
    fn setup_pulses(&mut self, module: ModuleIndex, mix: &MixState) -> bool {
        let slot = &mut self.frames[module.index()];
        match self.state.deadlines.protocol(module) {
            Protocol::Crossfire => {
                *slot = Some(rc_channels_frame(&RcChannels::from_mix(&mix.channels)));
                true
            }
            Protocol::None => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn send_next_frame(&mut self, module: ModuleIndex) {
        let period = match self.frames[module.index()].take() {
            Some(frame) => {
                MODULE_FRAMES[module.index()].signal(frame);
                CRSF_PERIOD_MS
            }
            None => IDLE_MODULE_PERIOD_MS,
        };
        self.state.deadlines.schedule_next(module, period);
    }
}

struct RadioHousekeeping;

impl Housekeeping for RadioHousekeeping {
    fn frequent_actions(&mut self) {
        if let Ok(rc) = TRAINER_CHAN.try_receive() {
            TRAINER_INPUT.lock(|t| t.set(Some(rc)));
        }
    }

    fn telemetry_wakeup(&mut self) {
        TELEMETRY_WAKE.signal(());
    }
}

/// Mixer task: highest priority executor, never deleted.
#[task]
pub async fn mixer_task(fw: &'static Firmware, watchdog: IwdgWatchdog) -> ! {
    let ports = ModulePorts {
        state: &STATE,
        frames: [None; NUM_MODULES],
    };
    let mut mixer = MixerLoop::new(
        &STATE,
        &RESOURCES.mix,
        &fw.platform,
        &fw.coprocessor,
        TrainerMixer,
        ports,
        RadioHousekeeping,
        watchdog,
    );
    mixer.run().await
}
