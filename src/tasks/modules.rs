use embassy_executor::task;
use embassy_stm32::peripherals::{DMA2_CH6, DMA2_CH7, USART1, USART6};
use embassy_stm32::usart::UartTx;
use radio_mixer_sched::ModuleIndex;

use crate::tasks::mixer::MODULE_FRAMES;

/// Internal module port: USART1 TX (PA9) @ 400 kbaud.
#[task]
pub async fn internal_module_task(mut tx: UartTx<'static, USART1, DMA2_CH7>) {
    let frames = &MODULE_FRAMES[ModuleIndex::Internal.index()];
    loop {
        let frame = frames.wait().await;
        let _ = tx.write(&frame).await;
    }
}

/// External module bay: USART6 TX (PC6) @ 400 kbaud.
#[task]
pub async fn external_module_task(mut tx: UartTx<'static, USART6, DMA2_CH6>) {
    let frames = &MODULE_FRAMES[ModuleIndex::External.index()];
    loop {
        let frame = frames.wait().await;
        let _ = tx.write(&frame).await;
    }
}
