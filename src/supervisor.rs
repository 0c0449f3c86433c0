//! Companion task of the RF co-processor.
//!
//! Only created when a co-processor image is present. It watches the shared
//! flags: a boot icon request hands the radio over for a firmware update and
//! resets shortly after, a pending model id is pushed until the co-processor
//! echoes it back.

use embassy_time::{Instant, Ticker};

use crate::coprocessor::{Coprocessor, CoprocessorFlags};
use crate::module::{ModuleIndex, Protocol};
use crate::orchestrator::{TaskHost, TaskId};
use crate::platform::Platform;
use crate::state::SchedulerState;

pub trait SystemHooks {
    /// Switch the screen to the download view and flush storage. Called once,
    /// after the menus task has been deleted.
    fn prepare_firmware_update(&mut self);
    /// Model id the current model expects on the internal module.
    fn current_model_id(&self) -> u8;
    /// Shared FIFO and agent servicing, once per iteration.
    fn service(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SupervisorStep {
    Continue,
    ResetDue,
}

pub struct Supervisor<'a, H, C, S>
where
    H: TaskHost + ?Sized,
    C: Coprocessor + ?Sized,
    S: SystemHooks,
{
    state: &'a SchedulerState,
    host: &'a H,
    coprocessor: &'a C,
    hooks: S,
    boot_icon_since: Option<Instant>,
    last_model_push: Option<Instant>,
}

impl<'a, H, C, S> Supervisor<'a, H, C, S>
where
    H: TaskHost + ?Sized,
    C: Coprocessor + ?Sized,
    S: SystemHooks,
{
    pub fn new(state: &'a SchedulerState, host: &'a H, coprocessor: &'a C, hooks: S) -> Self {
        Self {
            state,
            host,
            coprocessor,
            hooks,
            boot_icon_since: None,
            last_model_push: None,
        }
    }

    pub fn hooks(&self) -> &S {
        &self.hooks
    }

    /// The model id is always re-sent after boot.
    pub fn enter(&mut self) {
        self.coprocessor.set_flags(CoprocessorFlags::MODEL_ID_PENDING);
    }

    pub fn poll(&mut self, now: Instant) -> SupervisorStep {
        let config = &self.state.config;
        let flags = self.coprocessor.poll_flags();

        if flags.contains(CoprocessorFlags::SHOW_BOOT_ICON) {
            let since = match self.boot_icon_since {
                Some(since) => since,
                None => {
                    info!("co-processor firmware update requested");
                    self.host.delete_task(TaskId::Menus);
                    self.hooks.prepare_firmware_update();
                    self.boot_icon_since = Some(now);
                    now
                }
            };
            if now.saturating_duration_since(since) >= config.boot_icon_reset_delay {
                return SupervisorStep::ResetDue;
            }
        }

        self.hooks.service();

        if flags.contains(CoprocessorFlags::MODEL_ID_PENDING) {
            let due = match self.last_model_push {
                None => true,
                Some(last) => now.saturating_duration_since(last) > config.model_id_retry,
            };
            if due {
                let wanted = self.hooks.current_model_id();
                self.coprocessor.push_model_id(wanted);
                if self.coprocessor.model_id() == wanted {
                    debug!("co-processor model id {=u8} confirmed", wanted);
                    self.coprocessor.clear_flags(CoprocessorFlags::MODEL_ID_PENDING);
                }
                self.last_model_push = Some(now);
            }
        }

        let trigger = &self.state.trigger;
        if self.state.deadlines.protocol(ModuleIndex::External) == Protocol::None
            && trigger.is_scheduled()
        {
            trigger.clear_schedule();
            trigger.trigger_from_isr();
        }

        SupervisorStep::Continue
    }

    pub async fn run<B: Platform + ?Sized>(&mut self, platform: &B) -> ! {
        self.enter();
        let mut ticker = Ticker::every(self.state.config.supervisor_period);
        loop {
            if self.poll(Instant::now()) == SupervisorStep::ResetDue {
                warn!("resetting for co-processor firmware update");
                platform.system_reset();
            }
            ticker.next().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Capabilities, SchedulerConfig};
    use crate::coprocessor::stub::StubCoprocessor;
    use crate::orchestrator::testing::{HostEvent, RecordingHost};
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct FakeHooks {
        model_id: u8,
        prepared: u32,
        serviced: u32,
    }

    impl SystemHooks for FakeHooks {
        fn prepare_firmware_update(&mut self) {
            self.prepared += 1;
        }
        fn current_model_id(&self) -> u8 {
            self.model_id
        }
        fn service(&mut self) {
            self.serviced += 1;
        }
    }

    fn caps() -> Capabilities {
        Capabilities {
            coprocessor: true,
            ..Capabilities::DEFAULT
        }
    }

    fn ms(v: u64) -> Instant {
        Instant::from_millis(v)
    }

    #[test]
    fn boot_icon_resets_after_delay() {
        let state = SchedulerState::new(caps(), SchedulerConfig::DEFAULT);
        let host = RecordingHost::default();
        let cop = StubCoprocessor::new(true, None);
        let mut sup = Supervisor::new(&state, &host, &cop, FakeHooks::default());

        assert_eq!(sup.poll(ms(1_000)), SupervisorStep::Continue);
        cop.raise(CoprocessorFlags::SHOW_BOOT_ICON);

        assert_eq!(sup.poll(ms(1_002)), SupervisorStep::Continue);
        assert_eq!(sup.poll(ms(1_100)), SupervisorStep::Continue);
        assert_eq!(sup.poll(ms(1_201)), SupervisorStep::Continue);
        assert_eq!(sup.poll(ms(1_202)), SupervisorStep::ResetDue);

        // Menus deleted and storage flushed exactly once.
        assert_eq!(*host.events.borrow(), [HostEvent::Delete(TaskId::Menus)]);
        assert_eq!(sup.hooks().prepared, 1);
    }

    #[test]
    fn model_id_pushed_until_confirmed() {
        let state = SchedulerState::new(caps(), SchedulerConfig::DEFAULT);
        let host = RecordingHost::default();
        let cop = StubCoprocessor::new(true, None);
        let hooks = FakeHooks {
            model_id: 5,
            ..Default::default()
        };
        let mut sup = Supervisor::new(&state, &host, &cop, hooks);
        sup.enter();
        assert!(cop.poll_flags().contains(CoprocessorFlags::MODEL_ID_PENDING));

        sup.poll(ms(10));
        // The stub adopts the id immediately.
        assert_eq!(cop.model_id(), 5);
        assert!(!cop.poll_flags().contains(CoprocessorFlags::MODEL_ID_PENDING));
        assert_eq!(cop.pushes.load(Ordering::SeqCst), 1);

        sup.poll(ms(2_000));
        assert_eq!(cop.pushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn model_id_retry_is_rate_limited() {
        let state = SchedulerState::new(caps(), SchedulerConfig::DEFAULT);
        let host = RecordingHost::default();
        let cop = StubCoprocessor::new(true, None);
        let mut sup = Supervisor::new(&state, &host, &cop, FakeHooks::default());

        cop.raise(CoprocessorFlags::MODEL_ID_PENDING);
        sup.poll(ms(0));
        assert_eq!(cop.pushes.load(Ordering::SeqCst), 1);

        // Re-requested straight away: the next attempt waits out the retry.
        cop.raise(CoprocessorFlags::MODEL_ID_PENDING);
        sup.poll(ms(500));
        sup.poll(ms(1_000));
        assert_eq!(cop.pushes.load(Ordering::SeqCst), 1);
        sup.poll(ms(1_001));
        assert_eq!(cop.pushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stale_schedule_fires_the_trigger() {
        let state = SchedulerState::new(caps(), SchedulerConfig::DEFAULT);
        let host = RecordingHost::default();
        let cop = StubCoprocessor::new(true, None);
        let mut sup = Supervisor::new(&state, &host, &cop, FakeHooks::default());

        state.trigger.start();
        state.trigger.mark_scheduled();
        sup.poll(ms(0));
        assert!(!state.trigger.is_scheduled());
        // Consumed the arming.
        assert!(!state.trigger.is_armed());

        state.trigger.enable_trigger();
        state.deadlines.set_protocol(ModuleIndex::External, Protocol::Crossfire);
        state.trigger.mark_scheduled();
        sup.poll(ms(2));
        assert!(state.trigger.is_scheduled());
        assert!(state.trigger.is_armed());
    }

    #[test]
    fn hooks_serviced_every_iteration() {
        let state = SchedulerState::new(caps(), SchedulerConfig::DEFAULT);
        let host = RecordingHost::default();
        let cop = StubCoprocessor::new(true, None);
        let mut sup = Supervisor::new(&state, &host, &cop, FakeHooks::default());
        for t in 0..5 {
            sup.poll(ms(t * 2));
        }
        assert_eq!(sup.hooks().serviced, 5);
    }
}
