//! Task primitives on top of the embassy executors.
//!
//! Each priority level is its own executor: `High` and `Medium` are
//! interrupt executors so they preempt the thread-mode executor running the
//! `Low` tasks. Embassy tasks cannot be killed from outside, so deletion
//! raises a per-task cancel signal the task body selects on.

use core::cell::{Cell, RefCell};

use embassy_executor::SendSpawner;
use embassy_stm32::gpio::Output;
use embassy_stm32::peripherals::{PB4, PC13};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use radio_mixer_sched::coprocessor::HandshakeCoprocessor;
use radio_mixer_sched::orchestrator::{Priority, TaskHost, TaskId, TaskSpec};
use radio_mixer_sched::{Error, Result};

use crate::hw::{IwdgWatchdog, RadioPlatform};
use crate::tasks;

type CsMutex<T> = Mutex<CriticalSectionRawMutex, T>;

/// Hardware owned by the orchestrated tasks. Owned parts are taken once by
/// the task that is created with them.
pub struct Firmware {
    pub platform: RadioPlatform,
    pub coprocessor: HandshakeCoprocessor<'static>,
    watchdog: CsMutex<RefCell<Option<IwdgWatchdog>>>,
    led: CsMutex<RefCell<Option<Output<'static, PC13>>>>,
    buzzer: CsMutex<RefCell<Option<Output<'static, PB4>>>>,
}

impl Firmware {
    pub fn new(
        platform: RadioPlatform,
        coprocessor: HandshakeCoprocessor<'static>,
        watchdog: IwdgWatchdog,
        led: Output<'static, PC13>,
        buzzer: Output<'static, PB4>,
    ) -> Self {
        Self {
            platform,
            coprocessor,
            watchdog: Mutex::new(RefCell::new(Some(watchdog))),
            led: Mutex::new(RefCell::new(Some(led))),
            buzzer: Mutex::new(RefCell::new(Some(buzzer))),
        }
    }
}

fn take<T>(slot: &CsMutex<RefCell<Option<T>>>) -> Option<T> {
    slot.lock(|s| s.borrow_mut().take())
}

// ── Cancellation ──────────────────────────────────────────────────────────────
static CANCEL: [Signal<CriticalSectionRawMutex, ()>; 5] = [
    Signal::new(),
    Signal::new(),
    Signal::new(),
    Signal::new(),
    Signal::new(),
];

pub fn cancel_signal(task: TaskId) -> &'static Signal<CriticalSectionRawMutex, ()> {
    &CANCEL[task as usize]
}

#[derive(Clone, Copy)]
struct Bound {
    high: SendSpawner,
    medium: SendSpawner,
    low: SendSpawner,
    fw: &'static Firmware,
}

pub struct FirmwareHost {
    bound: CsMutex<Cell<Option<Bound>>>,
}

impl FirmwareHost {
    pub const fn new() -> Self {
        Self {
            bound: Mutex::new(Cell::new(None)),
        }
    }

    /// Hands the running executors and the task context to the host.
    pub fn bind(&self, high: SendSpawner, medium: SendSpawner, low: SendSpawner, fw: &'static Firmware) {
        self.bound.lock(|b| {
            b.set(Some(Bound {
                high,
                medium,
                low,
                fw,
            }))
        });
    }
}

impl TaskHost for FirmwareHost {
    fn init(&self) {
        for signal in CANCEL.iter() {
            signal.reset();
        }
    }

    fn create_task(&self, spec: TaskSpec) -> Result<()> {
        let Some(b) = self.bound.lock(|b| b.get()) else {
            return Err(Error::Spawn(spec.id));
        };
        let spawner = match spec.priority {
            Priority::High => b.high,
            Priority::Medium => b.medium,
            Priority::Low => b.low,
        };
        let fw = b.fw;
        let spawned = match spec.id {
            TaskId::Mixer => {
                let watchdog = take(&fw.watchdog).ok_or(Error::Spawn(spec.id))?;
                spawner.spawn(tasks::mixer::mixer_task(fw, watchdog))
            }
            TaskId::Menus => {
                let led = take(&fw.led).ok_or(Error::Spawn(spec.id))?;
                spawner.spawn(tasks::menus::menus_task(fw, led))
            }
            TaskId::Audio => {
                let buzzer = take(&fw.buzzer).ok_or(Error::Spawn(spec.id))?;
                spawner.spawn(tasks::audio::audio_task(buzzer))
            }
            TaskId::Coprocessor => spawner.spawn(tasks::coprocessor::coprocessor_task(fw)),
            TaskId::Supervisor => spawner.spawn(tasks::coprocessor::supervisor_task(fw)),
        };
        spawned.map_err(|_| Error::Spawn(spec.id))?;
        defmt::debug!("spawned {=str} task", spec.name);
        Ok(())
    }

    fn delete_task(&self, task: TaskId) {
        cancel_signal(task).signal(());
    }

    fn start(&self) {
        // The executors are already running; tasks start on their next poll.
        defmt::info!("scheduler running");
    }
}
