use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_stm32::gpio::{Input, Output};
use embassy_stm32::peripherals::{IWDG, PC0, PC1};
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};
use radio_mixer_sched::platform::{Platform, PowerState};
use radio_mixer_sched::watchdog::Watchdog;

/// Hold time on the power button that turns the radio off through the UI.
const PWR_PRESS_SHUTDOWN: Duration = Duration::from_millis(1_500);

/// Cleared on teardown; the trigger and heartbeat tasks stop firing.
pub static MODULE_IRQS_ENABLED: AtomicBool = AtomicBool::new(true);

pub struct RadioPlatform {
    button: Mutex<CriticalSectionRawMutex, Input<'static, PC0>>,
    power_hold: Mutex<CriticalSectionRawMutex, RefCell<Output<'static, PC1>>>,
    pressed_since: Mutex<CriticalSectionRawMutex, Cell<Option<Instant>>>,
}

impl RadioPlatform {
    pub fn new(button: Input<'static, PC0>, power_hold: Output<'static, PC1>) -> Self {
        Self {
            button: Mutex::new(button),
            power_hold: Mutex::new(RefCell::new(power_hold)),
            pressed_since: Mutex::new(Cell::new(None)),
        }
    }
}

impl Platform for RadioPlatform {
    fn is_power_button_held(&self) -> bool {
        // Active low, pulled up.
        self.button.lock(|b| b.is_low())
    }

    fn power_check(&self) -> PowerState {
        let held = self.is_power_button_held();
        self.pressed_since.lock(|since| {
            if !held {
                since.set(None);
                return PowerState::On;
            }
            let now = Instant::now();
            let start = since.get().unwrap_or(now);
            since.set(Some(start));
            if now.saturating_duration_since(start) >= PWR_PRESS_SHUTDOWN {
                PowerState::Off
            } else {
                PowerState::Pressed
            }
        })
    }

    fn board_off(&self) {
        self.power_hold.lock(|p| p.borrow_mut().set_low());
    }

    fn disable_module_interrupts(&self) {
        MODULE_IRQS_ENABLED.store(false, Ordering::Release);
        cortex_m::peripheral::NVIC::mask(embassy_stm32::pac::Interrupt::EXTI2);
    }

    fn system_reset(&self) -> ! {
        cortex_m::peripheral::SCB::sys_reset()
    }
}

pub struct IwdgWatchdog(pub IndependentWatchdog<'static, IWDG>);

impl Watchdog for IwdgWatchdog {
    fn kick(&mut self) {
        self.0.pet();
    }
}
