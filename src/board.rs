use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;
use radio_mixer_sched::Capabilities;

/// Internal Crossfire module on USART1, external bay on USART6, no
/// multi-protocol module fitted.
pub const CAPS: Capabilities = Capabilities {
    internal_module: true,
    external_module: true,
    coprocessor: true,
    audio: true,
    multimodule: false,
    dsm2: true,
    module_usart: true,
    usb_joystick: false,
};

/// Flash sector the RF co-processor image is written to. Erased (all ones)
/// when no image has been flashed.
pub const COPROCESSOR_IMAGE_ADDR: usize = 0x0808_0000;

/// Independent watchdog timeout. The mixer kicks it at least every 35 ms.
pub const WATCHDOG_TIMEOUT_US: u32 = 500_000;

pub const MODEL_ID: u8 = 1;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7), // 48 MHz for USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}
