//! Vehicle-side data: raw bus frames, decoded state, identity, commands and
//! the health reports of the surrounding hardware.

use serde::{Deserialize, Serialize};

use crate::alert::{AlertSize, AlertStatus, AudibleAlert, VisualAlert};
use crate::condition::{ConditionId, EffectCategory};

/// Car name reported by interfaces that could not identify the vehicle.
pub const MOCK_CAR_NAME: &str = "mock";

// ────────────────────────────────────────────────────────────────────────────
// Raw bus frames
// ────────────────────────────────────────────────────────────────────────────

/// One raw frame as seen on a vehicle bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    pub address: u32,
    pub data: Vec<u8>,
    pub bus: u8,
}

impl CanFrame {
    /// Longest payload a frame can carry (CAN-FD).
    pub const MAX_DATA_LEN: usize = 64;
    /// Largest extended (29-bit) identifier.
    pub const MAX_ADDRESS: u32 = 0x1FFF_FFFF;

    pub fn new(address: u32, data: impl Into<Vec<u8>>, bus: u8) -> Self {
        Self { address, data: data.into(), bus }
    }

    pub fn is_well_formed(&self) -> bool {
        self.address <= Self::MAX_ADDRESS && self.data.len() <= Self::MAX_DATA_LEN
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle identity
// ────────────────────────────────────────────────────────────────────────────

/// Safety mode a safety unit can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetyModel {
    #[default]
    Silent,
    NoOutput,
    AllOutput,
    Elm327,
    Body,
    Toyota,
    Honda,
    Hyundai,
    HyundaiCanfd,
}

impl SafetyModel {
    /// Modes in which a unit never sends commands and is ignored by the cross-check.
    pub fn is_inert(self) -> bool {
        matches!(self, SafetyModel::Silent | SafetyModel::NoOutput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub safety_model: SafetyModel,
    pub safety_param: u16,
}

/// Bit flags describing deviations from default engagement behavior.
pub mod alternative_experience {
    pub const DEFAULT: u32 = 0;
    /// Pressing the accelerator does not disengage longitudinal control.
    pub const DISABLE_DISENGAGE_ON_GAS: u32 = 1;
    pub const ALLOW_AEB: u32 = 1 << 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SteerControlType {
    #[default]
    Torque,
    Angle,
}

/// Static description of the connected vehicle, fixed after cold start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    pub car_name: String,
    pub car_fingerprint: String,
    pub car_vin: String,
    pub car_fw: Vec<String>,
    /// Observe only: never commands actuators.
    pub passive: bool,
    pub dashcam_only: bool,
    pub not_car: bool,
    pub pcm_cruise: bool,
    pub longitudinal_control: bool,
    pub steer_control_type: SteerControlType,
    /// Below this speed (m/s) lateral control is unavailable.
    pub min_steer_speed: f32,
    /// Below this speed (m/s) engagement is refused.
    pub min_enable_speed: f32,
    pub safety_configs: Vec<SafetyConfig>,
    pub alternative_experience: u32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            car_name: MOCK_CAR_NAME.to_string(),
            car_fingerprint: MOCK_CAR_NAME.to_string(),
            car_vin: String::new(),
            car_fw: Vec::new(),
            passive: false,
            dashcam_only: false,
            not_car: false,
            pcm_cruise: true,
            longitudinal_control: false,
            steer_control_type: SteerControlType::Torque,
            min_steer_speed: 0.0,
            min_enable_speed: -1.0,
            safety_configs: vec![SafetyConfig { safety_model: SafetyModel::NoOutput, safety_param: 0 }],
            alternative_experience: alternative_experience::DEFAULT,
        }
    }
}

impl VehicleParams {
    pub fn is_recognized(&self) -> bool {
        self.car_name != MOCK_CAR_NAME
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decoded vehicle state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gear {
    #[default]
    Unknown,
    Park,
    Reverse,
    Neutral,
    Drive,
    Sport,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonKind {
    #[default]
    Unknown,
    LeftBlinker,
    RightBlinker,
    AccelCruise,
    DecelCruise,
    Cancel,
    MainCruise,
    SetCruise,
    ResumeCruise,
    GapAdjustCruise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub kind: ButtonKind,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CruiseState {
    pub enabled: bool,
    pub available: bool,
    pub standstill: bool,
    pub speed_kph: f32,
}

/// Vehicle state decoded from one batch of bus frames.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    pub v_ego: f32,
    pub a_ego: f32,
    pub standstill: bool,
    pub steering_angle_deg: f32,
    pub steering_pressed: bool,
    pub gas_pressed: bool,
    pub brake_pressed: bool,
    pub gear: Gear,
    pub left_blinker: bool,
    pub right_blinker: bool,
    pub door_open: bool,
    pub seatbelt_unlatched: bool,
    pub steer_fault_temporary: bool,
    pub steer_fault_permanent: bool,
    pub cruise: CruiseState,
    pub v_cruise_kph: f32,
    pub button_events: Vec<ButtonEvent>,
    /// Conditions raised by the vehicle interface itself.
    pub events: Vec<ConditionId>,
    pub can_valid: bool,
    pub can_timeout: bool,
    /// Cumulative count of cycles in which no bus frames arrived.
    pub can_error_counter: u64,
    pub cum_lag_ms: f32,
}

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LongControlState {
    #[default]
    Off,
    Pid,
    Stopping,
    Starting,
}

/// Low-level actuator commands produced by a control law.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Actuators {
    /// m/s^2
    pub accel: f32,
    /// Normalized steering torque in `[-1, 1]`.
    pub steer: f32,
    pub steering_angle_deg: f32,
    pub curvature: f32,
    pub long_control_state: LongControlState,
}

impl Actuators {
    pub fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CruiseControl {
    pub cancel: bool,
    pub resume: bool,
    /// Enabled but not commanding longitudinal motion.
    pub overriding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HudControl {
    /// m/s
    pub set_speed: f32,
    pub speed_visible: bool,
    pub lanes_visible: bool,
    pub lead_visible: bool,
    pub visual_alert: VisualAlert,
    pub lead_distance_bars: u8,
}

/// Per-cycle control decision handed to the vehicle interface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarControl {
    pub enabled: bool,
    pub lat_active: bool,
    pub long_active: bool,
    pub actuators: Actuators,
    pub cruise_control: CruiseControl,
    pub hud_control: HudControl,
}

// ────────────────────────────────────────────────────────────────────────────
// Hardware and process health
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetyFault {
    RelayMalfunction,
    HeartbeatTimeout,
    InterruptRateCan,
}

/// Report from one independent safety unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyUnitState {
    pub safety_model: SafetyModel,
    pub safety_param: u16,
    pub alternative_experience: u32,
    pub controls_allowed: bool,
    pub rx_checks_invalid: bool,
    pub faults: Vec<SafetyFault>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareType {
    #[default]
    Unknown,
    Uno,
    Dos,
    Tres,
    Red,
}

impl HardwareType {
    pub fn has_integrated_gps(self) -> bool {
        matches!(self, HardwareType::Uno | HardwareType::Dos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeripheralState {
    pub hardware_type: HardwareType,
    pub fan_speed_rpm: u16,
    pub voltage_mv: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThermalStatus {
    #[default]
    Green,
    Yellow,
    Red,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub thermal_status: ThermalStatus,
    pub free_space_percent: f32,
    pub memory_usage_percent: u8,
    pub fan_speed_percent_desired: u8,
    pub sound_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub name: String,
    pub running: bool,
    pub should_be_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStatus {
    #[default]
    Uncalibrated,
    Calibrated,
    Invalid,
    Recalibrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub status: CalibrationStatus,
    pub percent: u8,
}

/// Upstream signals some alert texts are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub calibration_percent: u8,
    /// Seconds until an automatic lane change begins.
    pub auto_lane_change_timer: f32,
    pub joystick_axes: [f32; 2],
    pub gps_integrated: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Engagement
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngagementState {
    #[default]
    Disabled,
    PreEnabled,
    Enabled,
    SoftDisabling,
}

impl EngagementState {
    pub fn is_enabled(self) -> bool {
        !matches!(self, EngagementState::Disabled)
    }

    pub fn is_active(self) -> bool {
        matches!(self, EngagementState::Enabled | EngagementState::SoftDisabling)
    }
}

/// Driving personality for longitudinal following distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Personality {
    Aggressive,
    #[default]
    Standard,
    Relaxed,
}

impl Personality {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Personality::Aggressive),
            1 => Some(Personality::Standard),
            2 => Some(Personality::Relaxed),
            _ => None,
        }
    }

    /// Step to the next-closer following distance, wrapping from aggressive to relaxed.
    pub fn cycle(self) -> Self {
        match self {
            Personality::Relaxed => Personality::Standard,
            Personality::Standard => Personality::Aggressive,
            Personality::Aggressive => Personality::Relaxed,
        }
    }
}

/// Published once per cycle for display and logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelfdriveState {
    pub state: EngagementState,
    pub enabled: bool,
    pub active: bool,
    /// Engagement would be accepted right now.
    pub engageable: bool,
    pub alert_text_1: String,
    pub alert_text_2: String,
    pub alert_size: AlertSize,
    pub alert_status: AlertStatus,
    pub alert_type: String,
    pub alert_sound: AudibleAlert,
    pub experimental_mode: bool,
    pub personality: Personality,
}

/// Serialized entry of the onroad event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: ConditionId,
    pub categories: Vec<EffectCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_well_formedness() {
        assert!(CanFrame::new(0x1A0, vec![0; 8], 0).is_well_formed());
        assert!(CanFrame::new(0x1A0, vec![0; 64], 0).is_well_formed());
        assert!(!CanFrame::new(0x1A0, vec![0; 65], 0).is_well_formed());
        assert!(!CanFrame::new(0x2000_0000, vec![0; 8], 0).is_well_formed());
    }

    #[test]
    fn engagement_flags() {
        assert!(!EngagementState::Disabled.is_enabled());
        assert!(EngagementState::PreEnabled.is_enabled());
        assert!(!EngagementState::PreEnabled.is_active());
        assert!(EngagementState::SoftDisabling.is_active());
    }

    #[test]
    fn personality_cycles_through_all_three() {
        let mut p = Personality::Relaxed;
        let mut seen = vec![p];
        for _ in 0..2 {
            p = p.cycle();
            seen.push(p);
        }
        assert_eq!(seen, vec![Personality::Relaxed, Personality::Standard, Personality::Aggressive]);
        assert_eq!(p.cycle(), Personality::Relaxed);
        assert_eq!(Personality::from_u8(p.as_u8()), Some(p));
        assert_eq!(Personality::from_u8(3), None);
    }

    #[test]
    fn default_params_are_unrecognized() {
        let params = VehicleParams::default();
        assert!(!params.is_recognized());
        let parsed: VehicleParams = serde_json::from_str(r#"{"car_name":"sedan"}"#).unwrap();
        assert!(parsed.is_recognized());
        assert!(parsed.pcm_cruise);
    }
}
