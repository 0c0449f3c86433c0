pub mod audio;
pub mod coprocessor;
pub mod menus;
pub mod mixer;
pub mod modules;
pub mod telemetry;
pub mod timers;
pub mod trainer;
