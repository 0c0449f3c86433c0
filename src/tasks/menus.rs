use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::PC13;
use radio_mixer_sched::menus::{MenusLoop, UiHost};
use radio_mixer_sched::orchestrator::{Orchestrator, TaskId};
use radio_mixer_sched::{ModuleIndex, Protocol};

use crate::host::{cancel_signal, Firmware};
use crate::tasks::audio::{Beep, AUDIO_QUEUE};
use crate::{HOST, RESOURCES, STATE};

/// LED blink divider: one toggle every 10 UI cycles (~500 ms).
const LED_DIVIDER: u32 = 10;

struct RadioUi {
    led: Output<'static, PC13>,
    cycles: u32,
}

impl UiHost for RadioUi {
    fn init(&mut self) {
        self.led.set_high();
        STATE.deadlines.set_protocol(ModuleIndex::Internal, Protocol::Crossfire);
        STATE.deadlines.set_protocol(ModuleIndex::External, Protocol::None);
        let _ = AUDIO_QUEUE.try_send(Beep::STARTUP);
    }

    fn per_main(&mut self) {
        self.cycles = self.cycles.wrapping_add(1);
        if self.cycles % LED_DIVIDER == 0 {
            self.led.toggle();
        }
    }

    fn close(&mut self) {
        self.led.set_low();
        let _ = AUDIO_QUEUE.try_send(Beep::SHUTDOWN);
    }
}

#[task]
pub async fn menus_task(fw: &'static Firmware, led: Output<'static, PC13>) {
    let orchestrator = Orchestrator::new(&STATE, &RESOURCES, &HOST, &fw.platform, &fw.coprocessor);
    let mut ui = RadioUi { led, cycles: 0 };
    let mut menus = MenusLoop::new(&mut ui);

    match select(menus.run(&orchestrator), cancel_signal(TaskId::Menus).wait()).await {
        Either::First(Ok(())) => {}
        Either::First(Err(e)) => defmt::error!("shutdown failed: {}", e),
        Either::Second(()) => defmt::info!("menus task deleted"),
    }
}
