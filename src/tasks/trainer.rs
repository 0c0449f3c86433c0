use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, UART4};
use embassy_stm32::usart::UartRx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use radio_mixer_sched::crsf::{CrsfParser, RcChannels};

/// Trainer input: CRSF receiver on UART4 RX, one `RcChannels` per frame.
#[task]
pub async fn trainer_task(
    mut rx: UartRx<'static, UART4, DMA1_CH2>,
    trainer_tx: Sender<'static, CriticalSectionRawMutex, RcChannels, 1>,
) {
    let mut parser = CrsfParser::new();
    let mut buf = [0u8; 64];

    loop {
        if let Ok(n) = rx.read_until_idle(&mut buf).await {
            if let Some(rc) = parser.push_bytes(&buf[..n]) {
                let _ = trainer_tx.try_send(rc);
            }
        }
    }
}
