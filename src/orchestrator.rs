//! Creation, start and teardown of the cooperating task set.

use crate::coprocessor::Coprocessor;
use crate::error::Result;
use crate::platform::Platform;
use crate::state::{SchedulerState, SharedResources};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskId {
    Mixer,
    Menus,
    Audio,
    /// The co-processor image itself.
    Coprocessor,
    /// Companion task servicing the co-processor flags.
    Supervisor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub id: TaskId,
    pub name: &'static str,
    pub priority: Priority,
}

pub const MIXER_TASK: TaskSpec = TaskSpec {
    id: TaskId::Mixer,
    name: "mixer",
    priority: Priority::High,
};
pub const MENUS_TASK: TaskSpec = TaskSpec {
    id: TaskId::Menus,
    name: "menus",
    priority: Priority::Low,
};
pub const AUDIO_TASK: TaskSpec = TaskSpec {
    id: TaskId::Audio,
    name: "audio",
    priority: Priority::Medium,
};
pub const COPROCESSOR_TASK: TaskSpec = TaskSpec {
    id: TaskId::Coprocessor,
    name: "crossfire",
    priority: Priority::Medium,
};
pub const SUPERVISOR_TASK: TaskSpec = TaskSpec {
    id: TaskId::Supervisor,
    name: "system",
    priority: Priority::Low,
};

/// Task primitives of the underlying executor.
pub trait TaskHost {
    fn init(&self);
    fn create_task(&self, spec: TaskSpec) -> Result<()>;
    /// Tears a task down; it will not be polled again.
    fn delete_task(&self, task: TaskId);
    /// Hands control to the scheduler. On hardware this does not return.
    fn start(&self);
}

pub struct Orchestrator<'a, H, B, C>
where
    H: TaskHost + ?Sized,
    B: Platform + ?Sized,
    C: Coprocessor + ?Sized,
{
    state: &'a SchedulerState,
    resources: &'a SharedResources,
    host: &'a H,
    platform: &'a B,
    coprocessor: &'a C,
}

impl<'a, H, B, C> Orchestrator<'a, H, B, C>
where
    H: TaskHost + ?Sized,
    B: Platform + ?Sized,
    C: Coprocessor + ?Sized,
{
    pub const fn new(
        state: &'a SchedulerState,
        resources: &'a SharedResources,
        host: &'a H,
        platform: &'a B,
        coprocessor: &'a C,
    ) -> Self {
        Self {
            state,
            resources,
            host,
            platform,
            coprocessor,
        }
    }

    pub fn state(&self) -> &'a SchedulerState {
        self.state
    }

    pub fn platform(&self) -> &'a B {
        self.platform
    }

    pub fn coprocessor(&self) -> &'a C {
        self.coprocessor
    }

    pub fn coprocessor_present(&self) -> bool {
        self.state.caps.coprocessor && self.coprocessor.is_present()
    }

    /// Creates every task of the set, then starts the scheduler. Only the
    /// first call does anything.
    pub fn start(&self) -> Result<()> {
        self.resources.open()?;
        self.host.init();

        self.host.create_task(MIXER_TASK)?;
        self.host.create_task(MENUS_TASK)?;

        if self.coprocessor_present() {
            self.host.create_task(COPROCESSOR_TASK)?;
            self.host.create_task(SUPERVISOR_TASK)?;
            self.coprocessor.start();
        }

        if self.state.caps.audio {
            self.host.create_task(AUDIO_TASK)?;
        }

        info!("task set created, caps {}", self.state.caps);
        self.host.start();
        Ok(())
    }

    /// Ordered teardown from the UI shutdown path: stop mixing, mask the
    /// module interrupts, drop the co-processor tasks, cut power.
    pub fn stop(&self) -> Result<()> {
        if !self.resources.is_open() {
            return Err(crate::error::Error::NotStarted);
        }
        self.state.pause();
        self.state.trigger.disable_trigger();
        self.platform.disable_module_interrupts();

        if self.coprocessor_present() {
            self.coprocessor.stop();
            self.host.delete_task(TaskId::Coprocessor);
            self.host.delete_task(TaskId::Supervisor);
        }

        info!("task set stopped, powering off");
        self.platform.board_off();
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::config::{Capabilities, SchedulerConfig};
    use crate::coprocessor::stub::StubCoprocessor;
    use crate::coprocessor::NoCoprocessor;
    use crate::error::Error;
    use std::sync::atomic::Ordering;

    #[test]
    fn start_creates_tasks_in_order() {
        let state = SchedulerState::new(Capabilities::DEFAULT, SchedulerConfig::DEFAULT);
        let res = SharedResources::new();
        let host = RecordingHost::default();
        let board = ScriptedBoard::default();
        let orch = Orchestrator::new(&state, &res, &host, &board, &NoCoprocessor);

        orch.start().unwrap();
        assert_eq!(
            *host.events.borrow(),
            [
                HostEvent::Init,
                HostEvent::Create(TaskId::Mixer, Priority::High),
                HostEvent::Create(TaskId::Menus, Priority::Low),
                HostEvent::Create(TaskId::Audio, Priority::Medium),
                HostEvent::Start,
            ]
        );
        assert!(res.is_open());
    }

    #[test]
    fn mixer_outranks_menus() {
        assert!(MIXER_TASK.priority > MENUS_TASK.priority);
        assert!(MIXER_TASK.priority > AUDIO_TASK.priority);
    }

    #[test]
    fn start_only_once() {
        let state = SchedulerState::new(Capabilities::DEFAULT, SchedulerConfig::DEFAULT);
        let res = SharedResources::new();
        let host = RecordingHost::default();
        let board = ScriptedBoard::default();
        let orch = Orchestrator::new(&state, &res, &host, &board, &NoCoprocessor);
        orch.start().unwrap();
        let created = host.events.borrow().len();
        assert_eq!(orch.start(), Err(Error::AlreadyStarted));
        assert_eq!(host.events.borrow().len(), created);
    }

    #[test]
    fn coprocessor_tasks_only_when_image_present() {
        let caps = Capabilities {
            coprocessor: true,
            audio: false,
            ..Capabilities::DEFAULT
        };
        let state = SchedulerState::new(caps, SchedulerConfig::DEFAULT);

        let res = SharedResources::new();
        let host = RecordingHost::default();
        let board = ScriptedBoard::default();
        let absent = StubCoprocessor::new(false, None);
        Orchestrator::new(&state, &res, &host, &board, &absent)
            .start()
            .unwrap();
        assert!(!host
            .events
            .borrow()
            .contains(&HostEvent::Create(TaskId::Coprocessor, Priority::Medium)));
        assert!(!absent.started.load(Ordering::SeqCst));

        let res = SharedResources::new();
        let host = RecordingHost::default();
        let present = StubCoprocessor::new(true, None);
        Orchestrator::new(&state, &res, &host, &board, &present)
            .start()
            .unwrap();
        assert_eq!(
            *host.events.borrow(),
            [
                HostEvent::Init,
                HostEvent::Create(TaskId::Mixer, Priority::High),
                HostEvent::Create(TaskId::Menus, Priority::Low),
                HostEvent::Create(TaskId::Coprocessor, Priority::Medium),
                HostEvent::Create(TaskId::Supervisor, Priority::Low),
                HostEvent::Start,
            ]
        );
        assert!(present.started.load(Ordering::SeqCst));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let state = SchedulerState::new(Capabilities::DEFAULT, SchedulerConfig::DEFAULT);
        let res = SharedResources::new();
        let host = RecordingHost {
            fail_on: Some(TaskId::Menus),
            ..Default::default()
        };
        let board = ScriptedBoard::default();
        let orch = Orchestrator::new(&state, &res, &host, &board, &NoCoprocessor);
        assert_eq!(orch.start(), Err(Error::Spawn(TaskId::Menus)));
        assert!(!host.events.borrow().contains(&HostEvent::Start));
    }

    #[test]
    fn stop_tears_down_in_order() {
        let caps = Capabilities {
            coprocessor: true,
            ..Capabilities::DEFAULT
        };
        let state = SchedulerState::new(caps, SchedulerConfig::DEFAULT);
        let res = SharedResources::new();
        let host = RecordingHost::default();
        let board = ScriptedBoard::default();
        let cop = StubCoprocessor::new(true, None);
        let orch = Orchestrator::new(&state, &res, &host, &board, &cop);

        assert_eq!(orch.stop(), Err(Error::NotStarted));

        orch.start().unwrap();
        state.resume();
        host.events.borrow_mut().clear();
        orch.stop().unwrap();

        assert!(state.is_paused());
        assert!(cop.stopped.load(Ordering::SeqCst));
        assert_eq!(
            *host.events.borrow(),
            [
                HostEvent::Delete(TaskId::Coprocessor),
                HostEvent::Delete(TaskId::Supervisor),
            ]
        );
        assert_eq!(
            board.events(),
            [BoardEvent::DisableInterrupts, BoardEvent::Off]
        );
    }
}
