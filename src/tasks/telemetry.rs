use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use crate::tasks::mixer::TELEMETRY_WAKE;
use crate::usb::UsbSerial;
use crate::STATE;

const USB_DEBUG_ENABLED: bool = true;

/// Counts telemetry wakeups from the mixer and prints the scheduler
/// diagnostics over USB every 500 ms.
#[task]
pub async fn telemetry_task(mut usb_serial: UsbSerial<'static>) {
    let mut wakeups: u32 = 0;
    let mut ticker = Ticker::every(Duration::from_millis(500));

    loop {
        match select(TELEMETRY_WAKE.wait(), ticker.next()).await {
            Either::First(()) => {
                wakeups = wakeups.wrapping_add(1);
                continue;
            }
            Either::Second(()) => {}
        }

        if !USB_DEBUG_ENABLED || !usb_serial.dtr() {
            continue;
        }

        let d = STATE.diagnostics();

        // Full speed bulk packets are 64 bytes: one line per packet.
        let mut m = heapless::String::<64>::new();
        let _ = write!(
            m,
            "[MIX] n={} max={}us wake={}\r\n",
            d.mix_passes, d.max_mix_duration_us, wakeups
        );
        let _ = usb_serial.write_packet(m.as_bytes()).await;

        let mut m = heapless::String::<64>::new();
        let _ = write!(
            m,
            "[TRG] ok={} tmo={} miss={}/{}\r\n",
            d.triggers, d.timeouts, d.missed_internal, d.missed_external
        );
        let _ = usb_serial.write_packet(m.as_bytes()).await;
    }
}
