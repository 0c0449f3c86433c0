use embassy_executor::task;
use embassy_futures::select::select;
use embassy_time::{Duration, Ticker};
use radio_mixer_sched::orchestrator::TaskId;
use radio_mixer_sched::supervisor::{Supervisor, SystemHooks};

use crate::board::MODEL_ID;
use crate::host::{cancel_signal, Firmware};
use crate::{HOST, STATE};

/// Slice period handed to the co-processor image.
const IMAGE_SLICE: Duration = Duration::from_millis(1);

#[task]
pub async fn coprocessor_task(fw: &'static Firmware) {
    let run = async {
        let mut ticker = Ticker::every(IMAGE_SLICE);
        loop {
            // SAFETY: only created once the image entry word is programmed.
            unsafe { fw.coprocessor.step() };
            ticker.next().await;
        }
    };
    let _ = select(run, cancel_signal(TaskId::Coprocessor).wait()).await;
}

struct RadioSystem;

impl SystemHooks for RadioSystem {
    fn prepare_firmware_update(&mut self) {
        defmt::info!("co-processor bootloader requested, handing over");
    }

    fn current_model_id(&self) -> u8 {
        MODEL_ID
    }
}

#[task]
pub async fn supervisor_task(fw: &'static Firmware) {
    let mut supervisor = Supervisor::new(&STATE, &HOST, &fw.coprocessor, RadioSystem);
    let _ = select(
        supervisor.run(&fw.platform),
        cancel_signal(TaskId::Supervisor).wait(),
    )
    .await;
}
