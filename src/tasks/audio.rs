use embassy_executor::task;
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::PB4;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};

use crate::RESOURCES;

#[derive(Clone, Copy)]
pub struct Beep {
    pub on: Duration,
    pub off: Duration,
    pub repeat: u8,
}

impl Beep {
    pub const STARTUP: Self = Self {
        on: Duration::from_millis(80),
        off: Duration::from_millis(40),
        repeat: 2,
    };
    pub const SHUTDOWN: Self = Self {
        on: Duration::from_millis(300),
        off: Duration::from_millis(0),
        repeat: 1,
    };
}

pub static AUDIO_QUEUE: Channel<CriticalSectionRawMutex, Beep, 4> = Channel::new();

/// Plays queued beeps on the buzzer. The audio lock is held for a whole
/// pattern so patterns never interleave.
#[task]
pub async fn audio_task(mut buzzer: Output<'static, PB4>) {
    loop {
        let beep = AUDIO_QUEUE.receive().await;
        let _audio = RESOURCES.audio.lock().await;
        for _ in 0..beep.repeat {
            buzzer.set_high();
            Timer::after(beep.on).await;
            buzzer.set_low();
            Timer::after(beep.off).await;
        }
    }
}
