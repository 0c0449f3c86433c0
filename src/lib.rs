//! Mixer scheduling and task coordination for an RC transmitter.
//!
//! The crate decides when the mixer runs, when freshly mixed channel frames
//! are handed to the internal and external RF modules, and how background
//! housekeeping is interleaved with that pulse path. Hardware, mixing math,
//! UI and the RF co-processor image are collaborators behind traits.
#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod config;
pub mod coprocessor;
pub mod crsf;
pub mod deadline;
pub mod error;
pub mod menus;
pub mod mixer;
pub mod module;
pub mod orchestrator;
pub mod platform;
pub mod power;
pub mod state;
pub mod supervisor;
pub mod trigger;
pub mod watchdog;

pub use config::{Capabilities, SchedulerConfig};
pub use error::{Error, Result};
pub use module::{ModuleIndex, Protocol};
pub use state::{MixState, SchedulerState, SharedResources};
