//! RF module slots and protocol synchrony classes.

use embassy_time::{Duration, Instant};

use crate::config::Capabilities;

pub const NUM_MODULES: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleIndex {
    Internal = 0,
    External = 1,
}

impl ModuleIndex {
    pub const ALL: [ModuleIndex; NUM_MODULES] = [ModuleIndex::Internal, ModuleIndex::External];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn is_present(self, caps: &Capabilities) -> bool {
        match self {
            ModuleIndex::Internal => caps.internal_module,
            ModuleIndex::External => caps.external_module,
        }
    }
}

/// Channel protocol currently driven on a module port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    #[default]
    None,
    Ppm,
    Pxx1Pulses,
    Pxx1Serial,
    Pxx2HighSpeed,
    Pxx2LowSpeed,
    Dsm2Lp45,
    Dsm2Dsm2,
    Dsm2Dsmx,
    Sbus,
    Crossfire,
    Ghost,
    Afhds3,
    Multimodule,
}

/// How a protocol is paced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncClass {
    /// The link dictates the frame cadence; deadlines track its phase.
    Synchronous,
    /// Software paced; deadlines restart from "now".
    Asynchronous,
}

impl Protocol {
    pub fn sync_class(self, caps: &Capabilities) -> SyncClass {
        let synchronous = match self {
            Protocol::None
            | Protocol::Pxx1Pulses
            | Protocol::Pxx2HighSpeed
            | Protocol::Pxx2LowSpeed
            | Protocol::Crossfire
            | Protocol::Ghost
            | Protocol::Afhds3 => true,
            Protocol::Multimodule => caps.multimodule,
            Protocol::Pxx1Serial => caps.module_usart,
            Protocol::Sbus | Protocol::Dsm2Lp45 | Protocol::Dsm2Dsm2 | Protocol::Dsm2Dsmx => caps.dsm2,
            Protocol::Ppm => false,
        };
        if synchronous {
            SyncClass::Synchronous
        } else {
            SyncClass::Asynchronous
        }
    }

    pub fn is_synchronous(self, caps: &Capabilities) -> bool {
        self.sync_class(caps) == SyncClass::Synchronous
    }
}

/// Per-module scheduling record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleSlot {
    pub protocol: Protocol,
    /// Absolute time the next frame is due.
    pub next_fire: Instant,
    /// Last period published through `schedule_next`; zero until then.
    pub period: Duration,
    /// Deadlines that had already passed when rescheduled.
    pub missed: u32,
}

impl ModuleSlot {
    pub const fn new() -> Self {
        Self {
            protocol: Protocol::None,
            next_fire: Instant::from_ticks(0),
            period: Duration::from_ticks(0),
            missed: 0,
        }
    }
}

impl Default for ModuleSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ppm_is_never_synchronous() {
        let caps = Capabilities {
            multimodule: true,
            dsm2: true,
            module_usart: true,
            ..Capabilities::DEFAULT
        };
        assert_eq!(Protocol::Ppm.sync_class(&caps), SyncClass::Asynchronous);
    }

    #[test]
    fn link_paced_protocols_are_synchronous_everywhere() {
        let bare = Capabilities {
            multimodule: false,
            dsm2: false,
            module_usart: false,
            ..Capabilities::DEFAULT
        };
        for p in [
            Protocol::None,
            Protocol::Pxx1Pulses,
            Protocol::Pxx2HighSpeed,
            Protocol::Pxx2LowSpeed,
            Protocol::Crossfire,
            Protocol::Ghost,
            Protocol::Afhds3,
        ] {
            assert!(p.is_synchronous(&bare), "{:?}", p);
        }
    }

    #[test]
    fn optional_protocols_follow_capabilities() {
        let bare = Capabilities {
            multimodule: false,
            dsm2: false,
            module_usart: false,
            ..Capabilities::DEFAULT
        };
        assert!(!Protocol::Multimodule.is_synchronous(&bare));
        assert!(!Protocol::Pxx1Serial.is_synchronous(&bare));
        assert!(!Protocol::Sbus.is_synchronous(&bare));
        assert!(!Protocol::Dsm2Dsmx.is_synchronous(&bare));

        let full = Capabilities {
            multimodule: true,
            dsm2: true,
            module_usart: true,
            ..Capabilities::DEFAULT
        };
        assert!(Protocol::Multimodule.is_synchronous(&full));
        assert!(Protocol::Pxx1Serial.is_synchronous(&full));
        assert!(Protocol::Sbus.is_synchronous(&full));
        assert!(Protocol::Dsm2Lp45.is_synchronous(&full));
    }

    #[test]
    fn module_presence() {
        let caps = Capabilities {
            internal_module: false,
            ..Capabilities::DEFAULT
        };
        assert!(!ModuleIndex::Internal.is_present(&caps));
        assert!(ModuleIndex::External.is_present(&caps));
    }
}
