//! The low priority UI loop: soft power switch handling and the shutdown path.

use embassy_time::{Instant, Timer};

use crate::coprocessor::{save_handshake, Coprocessor, SaveOutcome};
use crate::error::Result;
use crate::orchestrator::{Orchestrator, TaskHost};
use crate::platform::{Platform, PowerState};

/// The user interface collaborator. Everything it does happens inside
/// `per_main`; the loop only paces it.
pub trait UiHost {
    fn init(&mut self);
    fn per_main(&mut self);
    /// False while the storage the co-processor saves to is unavailable
    /// (e.g. exported over USB mass storage).
    fn can_save_to_coprocessor(&self) -> bool {
        true
    }
    fn close(&mut self);
}

pub struct MenusLoop<'a, U: UiHost> {
    ui: &'a mut U,
    cycles: u32,
}

impl<'a, U: UiHost> MenusLoop<'a, U> {
    pub fn new(ui: &'a mut U) -> Self {
        Self { ui, cycles: 0 }
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Runs until the power switch reports `Off`, then saves, closes the UI
    /// and tears the task set down.
    pub async fn run<H, B, C>(&mut self, orchestrator: &Orchestrator<'_, H, B, C>) -> Result<()>
    where
        H: TaskHost + ?Sized,
        B: Platform + ?Sized,
        C: Coprocessor + ?Sized,
    {
        let state = orchestrator.state();
        let platform = orchestrator.platform();
        let period = state.config.menus_period;

        self.ui.init();
        state.resume();
        info!("menus running, pulses resumed");

        loop {
            match platform.power_check() {
                PowerState::Off => break,
                PowerState::Pressed => {
                    Timer::after(period).await;
                    continue;
                }
                PowerState::On => {}
            }

            let start = Instant::now();
            self.ui.per_main();
            self.cycles = self.cycles.wrapping_add(1);

            let runtime = Instant::now().saturating_duration_since(start);
            if runtime < period {
                Timer::after(period - runtime).await;
            }

            state.power_off.reset();
        }

        info!("power switch off after {=u32} menu cycles", self.cycles);

        if orchestrator.coprocessor_present() && self.ui.can_save_to_coprocessor() {
            let outcome = save_handshake(
                orchestrator.coprocessor(),
                state.config.save_timeout,
                state.config.save_poll,
            )
            .await;
            if outcome == SaveOutcome::TimedOut {
                warn!("model save on co-processor timed out");
            }
        }

        self.ui.close();
        orchestrator.stop()
    }
}
