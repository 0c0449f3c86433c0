#![no_std]
#![no_main]

mod board;
mod host;
mod hw;
mod tasks;
mod usb;

use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::usart::{Config as UsartConfig, Uart, UartTx};
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_stm32::{bind_interrupts, peripherals};
use radio_mixer_sched::coprocessor::{HandshakeCoprocessor, SharedArea};
use radio_mixer_sched::orchestrator::Orchestrator;
use radio_mixer_sched::{SchedulerConfig, SchedulerState, SharedResources};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::board::Board;
use crate::host::{Firmware, FirmwareHost};
use crate::hw::{IwdgWatchdog, RadioPlatform};
use crate::tasks::mixer::TRAINER_CHAN;

// ── Process-lifetime state ────────────────────────────────────────────────────
pub static STATE: SchedulerState = SchedulerState::new(board::CAPS, SchedulerConfig::DEFAULT);
pub static RESOURCES: SharedResources = SharedResources::new();
pub static HOST: FirmwareHost = FirmwareHost::new();
static SHARED_AREA: SharedArea = SharedArea::new();
static FIRMWARE: StaticCell<Firmware> = StaticCell::new();

// ── Executors ─────────────────────────────────────────────────────────────────
//  Two unused CAN interrupts drive the High and Medium priority executors.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_MED: InterruptExecutor = InterruptExecutor::new();

#[allow(non_snake_case)]
#[interrupt]
unsafe fn CAN1_RX0() {
    EXECUTOR_HIGH.on_interrupt()
}

#[allow(non_snake_case)]
#[interrupt]
unsafe fn CAN2_RX0() {
    EXECUTOR_MED.on_interrupt()
}

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    UART4 => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

fn module_uart_config() -> UsartConfig {
    let mut config = UsartConfig::default();
    config.baudrate = 400_000;
    config
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL), keep the power latch on
    let board = Board::init();
    let p = board.p;
    let power_hold = Output::new(p.PC1, Level::High, Speed::Low);
    let power_button = Input::new(p.PC0, Pull::Up);

    // 2. Watchdog, fed by the mixer once every heartbeat producer is alive
    let mut iwdg = IndependentWatchdog::new(p.IWDG, board::WATCHDOG_TIMEOUT_US);
    iwdg.unleash();

    // 3. USB (CDC-ACM diagnostics)
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 4. Priority executors
    interrupt::CAN1_RX0.set_priority(Priority::P6);
    let high = EXECUTOR_HIGH.start(interrupt::CAN1_RX0);
    interrupt::CAN2_RX0.set_priority(Priority::P7);
    let medium = EXECUTOR_MED.start(interrupt::CAN2_RX0);

    // 5. Module ports: internal USART1 (TX=PA9), external USART6 (TX=PC6)
    let internal_tx = UartTx::new(p.USART1, p.PA9, p.DMA2_CH7, module_uart_config()).unwrap();
    let external_tx = UartTx::new(p.USART6, p.PC6, p.DMA2_CH6, module_uart_config()).unwrap();
    high.spawn(tasks::modules::internal_module_task(internal_tx)).unwrap();
    high.spawn(tasks::modules::external_module_task(external_tx)).unwrap();

    // 6. Trainer input: CRSF receiver on UART4 @ 420000 (TX=PA0, RX=PA1)
    let mut trainer_config = UsartConfig::default();
    trainer_config.baudrate = 420_000;
    let trainer_uart = Uart::new(
        p.UART4, p.PA1, p.PA0,
        Irqs,
        p.DMA1_CH4, p.DMA1_CH2,
        trainer_config,
    ).unwrap();
    let (_trainer_tx, trainer_rx) = trainer_uart.split();
    spawner.spawn(tasks::trainer::trainer_task(trainer_rx, TRAINER_CHAN.sender())).unwrap();

    // 7. Mixer trigger sources and the 10 ms heartbeat
    let ext_heartbeat = ExtiInput::new(Input::new(p.PB2, Pull::Down), p.EXTI2);
    high.spawn(tasks::timers::mixer_trigger_task()).unwrap();
    high.spawn(tasks::timers::external_heartbeat_task(ext_heartbeat)).unwrap();
    high.spawn(tasks::timers::tick_10ms_task()).unwrap();

    // 8. Diagnostics over USB
    spawner.spawn(tasks::telemetry::telemetry_task(usb_serial)).unwrap();

    // 9. Co-processor image, probed through its entry word
    let coprocessor = unsafe { HandshakeCoprocessor::probe(board::COPROCESSOR_IMAGE_ADDR, &SHARED_AREA) };

    let fw: &'static Firmware = FIRMWARE.init(Firmware::new(
        RadioPlatform::new(power_button, power_hold),
        coprocessor,
        IwdgWatchdog(iwdg),
        Output::new(p.PC13, Level::High, Speed::Low),
        Output::new(p.PB4, Level::Low, Speed::Low),
    ));
    HOST.bind(high, medium, spawner.make_send(), fw);

    // 10. Orchestrated task set
    let orchestrator = Orchestrator::new(&STATE, &RESOURCES, &HOST, &fw.platform, &fw.coprocessor);
    if let Err(e) = orchestrator.start() {
        defmt::error!("task set start failed: {}", e);
    }
}
