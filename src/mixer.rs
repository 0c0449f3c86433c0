//! The mixer task body.
//!
//! One cycle: run the frequent background actions inside a window bounded
//! by the ceiling period, leaving early on a real trigger; re-arm the
//! trigger; handle a forced power-off; then, unless paused, mix and dispatch
//! under the mix lock and run the lower frequency housekeeping outside it.

use embassy_time::Instant;

use crate::coprocessor::Coprocessor;
use crate::module::{ModuleIndex, Protocol};
use crate::platform::Platform;
use crate::state::{MixMutex, MixState, SchedulerState};
use crate::trigger::FrequentActionWindow;
use crate::watchdog::{Heartbeat, Watchdog};

/// Channel computation. Both calls run with the mix lock held and must not
/// block.
pub trait Mixer {
    fn calculate(&mut self, mix: &mut MixState);
    /// Lower-rate bookkeeping that still needs the mix (timers, logical
    /// switch history, ...).
    fn periodic_updates(&mut self, _mix: &mut MixState) {}
}

/// RF pulse layer of both module ports.
pub trait PulseOutput {
    /// Builds the next frame from `mix`; false means the port is not ready
    /// for one this cycle.
    fn setup_pulses(&mut self, module: ModuleIndex, mix: &MixState) -> bool;
    fn send_next_frame(&mut self, module: ModuleIndex);
}

/// Background work interleaved with mixing.
pub trait Housekeeping {
    /// Trainer input sampling and accessory wakeups, every sub-period.
    fn frequent_actions(&mut self);
    fn telemetry_wakeup(&mut self);
    fn usb_joystick_update(&mut self) {}
    /// Hands the fresh channels to the internal co-processor module.
    fn coprocessor_channels_update(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerPhase {
    Paused,
    RunningFrequentActions,
    Dispatching,
}

/// What one call to [`MixerLoop::run_cycle`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Frequent-action rounds run inside the window.
    pub frequent_rounds: u8,
    /// The window was left through a real trigger rather than the ceiling.
    pub triggered: bool,
    pub mixed: bool,
    /// Modules that received a frame, as `1 << ModuleIndex`.
    pub dispatched: u8,
    pub forced_power_off: bool,
}

pub struct MixerLoop<'a, B, C, M, P, H, W>
where
    B: Platform + ?Sized,
    C: Coprocessor + ?Sized,
{
    state: &'a SchedulerState,
    mix: &'a MixMutex,
    platform: &'a B,
    coprocessor: &'a C,
    mixer: M,
    pulses: P,
    housekeeping: H,
    watchdog: W,
    phase: MixerPhase,
}

impl<'a, B, C, M, P, H, W> MixerLoop<'a, B, C, M, P, H, W>
where
    B: Platform + ?Sized,
    C: Coprocessor + ?Sized,
    M: Mixer,
    P: PulseOutput,
    H: Housekeeping,
    W: Watchdog,
{
    pub fn new(
        state: &'a SchedulerState,
        mix: &'a MixMutex,
        platform: &'a B,
        coprocessor: &'a C,
        mixer: M,
        pulses: P,
        housekeeping: H,
        watchdog: W,
    ) -> Self {
        Self {
            state,
            mix,
            platform,
            coprocessor,
            mixer,
            pulses,
            housekeeping,
            watchdog,
            phase: MixerPhase::Paused,
        }
    }

    pub fn phase(&self) -> MixerPhase {
        self.phase
    }

    pub async fn run(&mut self) -> ! {
        info!("mixer task started");
        self.state.trigger.start();
        loop {
            self.run_cycle().await;
        }
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let state = self.state;
        let cfg = &state.config;

        // ── Frequent actions until trigger or ceiling ─────────────────────────
        self.phase = MixerPhase::RunningFrequentActions;
        let window = FrequentActionWindow::open(
            Instant::now(),
            cfg.frequent_actions_period,
            cfg.max_period,
        );
        loop {
            let Some(wait) = window.next_wait(Instant::now()) else {
                break;
            };
            self.housekeeping.frequent_actions();
            report.frequent_rounds = report.frequent_rounds.saturating_add(1);
            if !state.trigger.wait_for_trigger(wait).await {
                report.triggered = true;
                break;
            }
        }

        state.trigger.clear_trigger();
        state.trigger.enable_trigger();

        if state.power_off.is_force_power_off_requested(self.platform) {
            warn!("power button held, forcing power off");
            self.force_power_off();
            report.forced_power_off = true;
        }

        // The co-processor queued a run for a module that has since gone away.
        if state.caps.coprocessor
            && state.deadlines.protocol(ModuleIndex::External) == Protocol::None
            && state.trigger.is_scheduled()
        {
            state.trigger.clear_schedule();
        }

        if state.is_paused() {
            self.phase = MixerPhase::Paused;
            return report;
        }

        // ── Mix + dispatch under the lock ─────────────────────────────────────
        self.phase = MixerPhase::Dispatching;
        let t0 = Instant::now();
        let mix_lock = self.mix;
        {
            let mut mix = mix_lock.lock().await;
            self.mixer.calculate(&mut mix);
            mix.generation = mix.generation.wrapping_add(1);
            mix.last_mix = Some(t0);

            report.dispatched = self.send_synchronous_pulses(&mix);

            self.mixer.periodic_updates(&mut mix);
        }
        report.mixed = true;

        // ── Housekeeping outside the lock ─────────────────────────────────────
        if state.caps.usb_joystick {
            self.housekeeping.usb_joystick_update();
        }
        if state.caps.coprocessor && state.caps.internal_module {
            self.housekeeping.coprocessor_channels_update();
        }
        self.housekeeping.telemetry_wakeup();

        if state.heartbeat.take_if_complete(Heartbeat::expected(&state.caps)) {
            self.watchdog.kick();
        }

        state.record_mix_pass(Instant::now().saturating_duration_since(t0));
        report
    }

    /// Same teardown order as a UI shutdown, minus the task deletions the
    /// mixer cannot do on itself.
    fn force_power_off(&self) {
        let state = self.state;
        state.pause();
        state.trigger.disable_trigger();
        self.platform.disable_module_interrupts();
        if state.caps.coprocessor && self.coprocessor.is_present() {
            self.coprocessor.stop();
        }
        self.platform.board_off();
    }

    fn send_synchronous_pulses(&mut self, mix: &MixState) -> u8 {
        let state = self.state;
        let mut sent = 0;
        for module in ModuleIndex::ALL {
            if !module.is_present(&state.caps) || !state.deadlines.is_synchronous(module) {
                continue;
            }
            if self.pulses.setup_pulses(module, mix) {
                self.pulses.send_next_frame(module);
                state.heartbeat.beat(Heartbeat::pulses_bit(module));
                sent |= 1 << module.index();
            }
        }
        sent
    }
}
