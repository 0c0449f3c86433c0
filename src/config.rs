use embassy_time::Duration;

// ── Timing constants ──────────────────────────────────────────────────────────

/// Sub-period between two rounds of frequent background actions.
pub const MIXER_FREQUENT_ACTIONS_PERIOD_MS: u64 = 5;
/// Ceiling cadence: the mixer runs at least this often without any trigger.
pub const MIXER_MAX_PERIOD_MS: u64 = 30;
/// Soft period of the menus (UI) task.
pub const MENUS_TASK_PERIOD_MS: u64 = 50;
/// Continuous power-button hold that forces a power off.
pub const FORCE_POWER_OFF_HOLD_MS: u64 = 10_000;
/// Co-processor save acknowledgement window during shutdown.
pub const COPROCESSOR_SAVE_TIMEOUT_MS: u64 = 1_000;
pub const COPROCESSOR_SAVE_POLL_MS: u64 = 10;
/// Hardware trigger period used when no module has published one.
pub const DEFAULT_TRIGGER_PERIOD_US: u64 = 4_000;
pub const BOOT_ICON_RESET_DELAY_MS: u64 = 200;
pub const MODEL_ID_RETRY_MS: u64 = 1_000;
/// Poll period of the supervisor task.
pub const SUPERVISOR_PERIOD_MS: u64 = 2;

/// Scheduling policy knobs. `DEFAULT` holds the production values; tests
/// shrink individual fields with struct update syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub frequent_actions_period: Duration,
    pub max_period: Duration,
    pub menus_period: Duration,
    pub power_off_hold: Duration,
    pub save_timeout: Duration,
    pub save_poll: Duration,
    pub default_trigger_period: Duration,
    pub boot_icon_reset_delay: Duration,
    pub model_id_retry: Duration,
    pub supervisor_period: Duration,
}

impl SchedulerConfig {
    pub const DEFAULT: Self = Self {
        frequent_actions_period: Duration::from_millis(MIXER_FREQUENT_ACTIONS_PERIOD_MS),
        max_period: Duration::from_millis(MIXER_MAX_PERIOD_MS),
        menus_period: Duration::from_millis(MENUS_TASK_PERIOD_MS),
        power_off_hold: Duration::from_millis(FORCE_POWER_OFF_HOLD_MS),
        save_timeout: Duration::from_millis(COPROCESSOR_SAVE_TIMEOUT_MS),
        save_poll: Duration::from_millis(COPROCESSOR_SAVE_POLL_MS),
        default_trigger_period: Duration::from_micros(DEFAULT_TRIGGER_PERIOD_US),
        boot_icon_reset_delay: Duration::from_millis(BOOT_ICON_RESET_DELAY_MS),
        model_id_retry: Duration::from_millis(MODEL_ID_RETRY_MS),
        supervisor_period: Duration::from_millis(SUPERVISOR_PERIOD_MS),
    };
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Hardware capabilities ─────────────────────────────────────────────────────

/// What the radio this firmware runs on actually has. Enumerated once at
/// startup and never changed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    pub internal_module: bool,
    pub external_module: bool,
    /// A separately flashed RF co-processor image may be present.
    pub coprocessor: bool,
    pub audio: bool,
    /// Multi-protocol module is paced by the link.
    pub multimodule: bool,
    /// SBUS / DSM2 outputs are frame-driven on this board.
    pub dsm2: bool,
    /// Module ports are USART backed, which makes PXX1 serial synchronous.
    pub module_usart: bool,
    pub usb_joystick: bool,
}

impl Capabilities {
    pub const DEFAULT: Self = Self {
        internal_module: true,
        external_module: true,
        coprocessor: false,
        audio: true,
        multimodule: true,
        dsm2: true,
        module_usart: false,
        usb_joystick: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::DEFAULT
    }
}
