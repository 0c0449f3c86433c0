use core::sync::atomic::Ordering;

use embassy_executor::task;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::peripherals::PB2;
use embassy_time::{Duration, Ticker, Timer};
use radio_mixer_sched::watchdog::Heartbeat;

use crate::hw::MODULE_IRQS_ENABLED;
use crate::STATE;

/// 10 ms system tick, the timer producer of the watchdog heartbeat.
#[task]
pub async fn tick_10ms_task() {
    let mut ticker = Ticker::every(Duration::from_millis(10));
    loop {
        ticker.next().await;
        STATE.heartbeat.beat(Heartbeat::TIMER_10MS);
    }
}

/// Mixer scheduler timer. Re-reads the period every round so a protocol
/// change takes effect on the next trigger.
#[task]
pub async fn mixer_trigger_task() {
    loop {
        let period = STATE
            .deadlines
            .trigger_period(STATE.config.default_trigger_period);
        Timer::after(period).await;
        if MODULE_IRQS_ENABLED.load(Ordering::Acquire) {
            STATE.trigger.trigger_from_isr();
        }
    }
}

/// Heartbeat line of the external module bay.
#[task]
pub async fn external_heartbeat_task(mut heartbeat: ExtiInput<'static, PB2>) {
    loop {
        heartbeat.wait_for_rising_edge().await;
        if MODULE_IRQS_ENABLED.load(Ordering::Acquire) {
            STATE.trigger.trigger_from_isr();
        }
    }
}
