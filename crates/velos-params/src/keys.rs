//! Well-known keys in the [`ParamStore`][crate::ParamStore].

/// JSON identity of the vehicle resolved on this boot.
pub const CAR_PARAMS: &str = "CarParams";
/// JSON identity reused on the next boot to skip fingerprinting.
pub const CAR_PARAMS_CACHE: &str = "CarParamsCache";
/// Identity kept until the next route starts.
pub const CAR_PARAMS_PERSISTENT: &str = "CarParamsPersistent";
pub const CAR_PARAMS_PREV_ROUTE: &str = "CarParamsPrevRoute";
pub const FIRMWARE_QUERY_DONE: &str = "FirmwareQueryDone";
/// Set once the car interface has been initialized.
pub const CONTROLS_READY: &str = "ControlsReady";

pub const IS_METRIC: &str = "IsMetric";
pub const EXPERIMENTAL_MODE: &str = "ExperimentalMode";
pub const EXPERIMENTAL_LONGITUDINAL_ENABLED: &str = "ExperimentalLongitudinalEnabled";
/// Single ASCII digit, see `Personality::as_u8`.
pub const LONGITUDINAL_PERSONALITY: &str = "LongitudinalPersonality";
pub const JOYSTICK_DEBUG_MODE: &str = "JoystickDebugMode";
pub const DISENGAGE_ON_ACCELERATOR: &str = "DisengageOnAccelerator";
pub const DISENGAGE_ON_BRAKE: &str = "DisengageOnBrake";
/// Master switch for engagement. Off puts the system in dashcam mode.
pub const ENGAGEMENT_TOGGLE: &str = "EngagementToggle";
