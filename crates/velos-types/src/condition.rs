//! Condition identifiers and the effect categories a condition can carry.

use std::fmt;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Effect categories
// ────────────────────────────────────────────────────────────────────────────

/// How a detected condition influences engagement.
///
/// A single condition may carry several categories at once; e.g. an open door
/// both disengages the system (`UserDisable`) and blocks re-engagement
/// (`NoEntry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectCategory {
    Enable,
    PreEnable,
    OverrideLateral,
    OverrideLongitudinal,
    NoEntry,
    Warning,
    UserDisable,
    SoftDisable,
    ImmediateDisable,
    Permanent,
}

impl EffectCategory {
    pub const ALL: [EffectCategory; 10] = [
        EffectCategory::Enable,
        EffectCategory::PreEnable,
        EffectCategory::OverrideLateral,
        EffectCategory::OverrideLongitudinal,
        EffectCategory::NoEntry,
        EffectCategory::Warning,
        EffectCategory::UserDisable,
        EffectCategory::SoftDisable,
        EffectCategory::ImmediateDisable,
        EffectCategory::Permanent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectCategory::Enable => "enable",
            EffectCategory::PreEnable => "preEnable",
            EffectCategory::OverrideLateral => "overrideLateral",
            EffectCategory::OverrideLongitudinal => "overrideLongitudinal",
            EffectCategory::NoEntry => "noEntry",
            EffectCategory::Warning => "warning",
            EffectCategory::UserDisable => "userDisable",
            EffectCategory::SoftDisable => "softDisable",
            EffectCategory::ImmediateDisable => "immediateDisable",
            EffectCategory::Permanent => "permanent",
        }
    }
}

impl fmt::Display for EffectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view over "which effect categories are currently present".
///
/// The engagement state machine only ever asks this one question, so it is
/// written against this trait rather than a concrete event container.
pub trait EffectSet {
    fn contains(&self, category: EffectCategory) -> bool;
}

impl EffectSet for [EffectCategory] {
    fn contains(&self, category: EffectCategory) -> bool {
        self.iter().any(|c| *c == category)
    }
}

impl EffectSet for Vec<EffectCategory> {
    fn contains(&self, category: EffectCategory) -> bool {
        self.as_slice().iter().any(|c| *c == category)
    }
}

impl EffectSet for std::collections::HashSet<EffectCategory> {
    fn contains(&self, category: EffectCategory) -> bool {
        std::collections::HashSet::contains(self, &category)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Condition identifiers
// ────────────────────────────────────────────────────────────────────────────

macro_rules! conditions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every named condition the system can detect.
        ///
        /// The set is closed: the alert catalog must provide an entry (possibly
        /// empty) for each variant, which is checked once at construction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum ConditionId {
            $($variant),+
        }

        impl ConditionId {
            pub const ALL: &'static [ConditionId] = &[$(ConditionId::$variant),+];

            /// Stable camelCase name used in alert labels and the event log.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(ConditionId::$variant => $name),+
                }
            }
        }
    };
}

conditions! {
    // lifecycle
    Startup => "startup",
    StartupNoControl => "startupNoControl",
    StartupNoCar => "startupNoCar",
    StartupNoFw => "startupNoFw",
    ControlsInitializing => "controlsInitializing",
    DashcamMode => "dashcamMode",
    CarUnrecognized => "carUnrecognized",
    JoystickDebug => "joystickDebug",
    // driver input
    ButtonEnable => "buttonEnable",
    PcmEnable => "pcmEnable",
    ButtonCancel => "buttonCancel",
    PcmDisable => "pcmDisable",
    PedalPressed => "pedalPressed",
    BrakeHold => "brakeHold",
    ParkBrake => "parkBrake",
    WrongGear => "wrongGear",
    ReverseGear => "reverseGear",
    DoorOpen => "doorOpen",
    SeatbeltNotLatched => "seatbeltNotLatched",
    WrongCarMode => "wrongCarMode",
    WrongCruiseMode => "wrongCruiseMode",
    GasPressedOverride => "gasPressedOverride",
    SteerOverride => "steerOverride",
    PreEnableStandstill => "preEnableStandstill",
    // communication
    CanError => "canError",
    CanBusMissing => "canBusMissing",
    CommIssue => "commIssue",
    CommIssueAvgFreq => "commIssueAvgFreq",
    UsbError => "usbError",
    ControlsdLagging => "controlsdLagging",
    ProcessNotRunning => "processNotRunning",
    RadarFault => "radarFault",
    // safety hardware
    ControlsMismatch => "controlsMismatch",
    RelayMalfunction => "relayMalfunction",
    CruiseMismatch => "cruiseMismatch",
    // device health
    Overheat => "overheat",
    OutOfSpace => "outOfSpace",
    LowMemory => "lowMemory",
    FanMalfunction => "fanMalfunction",
    SoundsUnavailable => "soundsUnavailable",
    LowBattery => "lowBattery",
    // calibration
    CalibrationIncomplete => "calibrationIncomplete",
    CalibrationInvalid => "calibrationInvalid",
    CalibrationRecalibrating => "calibrationRecalibrating",
    // vehicle faults and limits
    SteerUnavailable => "steerUnavailable",
    BrakeUnavailable => "brakeUnavailable",
    SteerTempUnavailable => "steerTempUnavailable",
    SteerSaturated => "steerSaturated",
    AccFaulted => "accFaulted",
    EspDisabled => "espDisabled",
    CruiseDisabled => "cruiseDisabled",
    BelowEngageSpeed => "belowEngageSpeed",
    BelowSteerSpeed => "belowSteerSpeed",
    SpeedTooLow => "speedTooLow",
    SpeedTooHigh => "speedTooHigh",
    LowSpeedLockout => "lowSpeedLockout",
    // driving assistance
    Fcw => "fcw",
    StockFcw => "stockFcw",
    StockAeb => "stockAeb",
    Ldw => "ldw",
    PreLaneChangeLeft => "preLaneChangeLeft",
    PreLaneChangeRight => "preLaneChangeRight",
    LaneChangeBlocked => "laneChangeBlocked",
    LaneChange => "laneChange",
    AutoLaneChange => "autoLaneChange",
    PromptDriverDistracted => "promptDriverDistracted",
    DriverDistracted => "driverDistracted",
    PersonalityChanged => "personalityChanged",
    NoGps => "noGps",
    VehicleModelInvalid => "vehicleModelInvalid",
    PlannerError => "plannerError",
    SensorDataInvalid => "sensorDataInvalid",
    PosenetInvalid => "posenetInvalid",
}

impl ConditionId {
    /// Dense index into [`ConditionId::ALL`], usable for per-condition tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Reverse of [`ConditionId::index`].
    pub fn from_index(index: usize) -> Option<ConditionId> {
        Self::ALL.get(index).copied()
    }

    /// Number of distinct conditions.
    pub fn count() -> usize {
        Self::ALL.len()
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
