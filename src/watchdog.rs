use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::Capabilities;
use crate::module::ModuleIndex;

pub trait Watchdog {
    fn kick(&mut self);
}

/// Liveness bits collected from the periodic producers. The watchdog is only
/// fed once every expected producer has beaten since the last kick.
pub struct Heartbeat {
    bits: AtomicU8,
}

impl Heartbeat {
    pub const TIMER_10MS: u8 = 1 << 0;
    pub const PULSES_INTERNAL: u8 = 1 << 1;
    pub const PULSES_EXTERNAL: u8 = 1 << 2;

    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    pub const fn pulses_bit(module: ModuleIndex) -> u8 {
        match module {
            ModuleIndex::Internal => Self::PULSES_INTERNAL,
            ModuleIndex::External => Self::PULSES_EXTERNAL,
        }
    }

    pub fn expected(caps: &Capabilities) -> u8 {
        let mut mask = Self::TIMER_10MS;
        for module in ModuleIndex::ALL {
            if module.is_present(caps) {
                mask |= Self::pulses_bit(module);
            }
        }
        mask
    }

    pub fn beat(&self, bits: u8) {
        self.bits.fetch_or(bits, Ordering::AcqRel);
    }

    pub fn bits(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }

    /// Clears the mask and returns true when every `expected` bit was set.
    pub fn take_if_complete(&self, expected: u8) -> bool {
        self.bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                if b & expected == expected {
                    Some(0)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}
