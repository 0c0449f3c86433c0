/// Board services the scheduling core consumes. Shared by the mixer, menus
/// and supervisor tasks, hence `&self` everywhere.
pub trait Platform: Sync {
    /// Raw power button level, no filtering.
    fn is_power_button_held(&self) -> bool;
    /// Soft power switch state machine (press / release / shutdown).
    fn power_check(&self) -> PowerState;
    /// Cut board power. May return on the simulator.
    fn board_off(&self);
    /// Mask the module "frame ready" interrupt sources before teardown.
    fn disable_module_interrupts(&self);
    fn system_reset(&self) -> !;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    On,
    /// Button held but shutdown not yet confirmed.
    Pressed,
    Off,
}
