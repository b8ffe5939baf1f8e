//! The shipped condition -> alerts table.

use std::time::Duration;

use velos_types::{
    Alert, AlertSize, AlertStatus, AudibleAlert, ConditionId, EffectCategory, Priority, VisualAlert,
};

use crate::alerts::{
    auto_lane_change, banner, below_steer_speed, calibration_incomplete, engagement,
    immediate_disable, joystick, no_entry, no_gps, normal_permanent, personality_changed,
    soft_disable, wrong_car_mode,
};
use crate::catalog::CatalogEntry;

use EffectCategory::{
    Enable, ImmediateDisable, NoEntry, OverrideLateral, OverrideLongitudinal, Permanent, PreEnable,
    SoftDisable, UserDisable, Warning,
};

const STAY_ALERT: &str = "Always keep hands on wheel and eyes on road";

fn startup(text_1: &str, text_2: &str, status: AlertStatus) -> Alert {
    Alert::new(
        text_1,
        text_2,
        status,
        AlertSize::Mid,
        Priority::Lower,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_secs(10),
    )
}

/// Full-screen reminder while parked in a state that blocks engagement.
fn blocking_banner(text: &str) -> Alert {
    Alert::new(
        text,
        "",
        AlertStatus::Normal,
        AlertSize::Full,
        Priority::Lowest,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(200),
    )
    .with_creation_delay(Duration::from_millis(500))
}

fn take_control(text_2: &str, priority: Priority, visual: VisualAlert, audible: AudibleAlert) -> Alert {
    Alert::new(
        "TAKE CONTROL",
        text_2,
        AlertStatus::UserPrompt,
        AlertSize::Mid,
        priority,
        visual,
        audible,
        Duration::from_millis(200),
    )
}

fn lane_change(text: &str, audible: AudibleAlert) -> Alert {
    Alert::new(
        text,
        "",
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Low,
        VisualAlert::None,
        audible,
        Duration::from_millis(100),
    )
}

fn disengage() -> Alert {
    engagement(AudibleAlert::Disengage)
}

fn engage() -> Alert {
    engagement(AudibleAlert::Engage)
}

/// Every condition with its alerts. Conditions that only exist for logging
/// map to an empty entry.
pub fn entries() -> Vec<(ConditionId, CatalogEntry)> {
    use ConditionId as C;

    vec![
        // ── lifecycle ──────────────────────────────────────────────────────
        (
            C::Startup,
            CatalogEntry::new().with(
                Permanent,
                startup("Be ready to take over at any time", STAY_ALERT, AlertStatus::Normal),
            ),
        ),
        (
            C::StartupNoControl,
            CatalogEntry::new().with(Permanent, startup("Dashcam mode", STAY_ALERT, AlertStatus::Normal)),
        ),
        (
            C::StartupNoCar,
            CatalogEntry::new().with(
                Permanent,
                startup("Dashcam mode for unsupported car", STAY_ALERT, AlertStatus::Normal),
            ),
        ),
        (
            C::StartupNoFw,
            CatalogEntry::new().with(
                Permanent,
                startup("Car Unrecognized", "Check All Connections", AlertStatus::UserPrompt),
            ),
        ),
        (
            C::ControlsInitializing,
            CatalogEntry::new().with(NoEntry, no_entry("Controls Initializing")),
        ),
        (
            C::DashcamMode,
            CatalogEntry::new().with(
                Permanent,
                banner("Dashcam Mode", AlertStatus::Normal, Priority::Lowest),
            ),
        ),
        (
            C::CarUnrecognized,
            CatalogEntry::new().with(Permanent, {
                let mut alert = normal_permanent("Dashcam Mode", "Car Unrecognized");
                alert.priority = Priority::Lowest;
                alert
            }),
        ),
        (
            C::JoystickDebug,
            CatalogEntry::new()
                .with_fn(Warning, joystick)
                .with(Permanent, normal_permanent("Joystick Mode", "")),
        ),
        // ── driver input ───────────────────────────────────────────────────
        (C::ButtonEnable, CatalogEntry::new().with(Enable, engage())),
        (C::PcmEnable, CatalogEntry::new().with(Enable, engage())),
        (C::ButtonCancel, CatalogEntry::new().with(UserDisable, disengage())),
        (C::PcmDisable, CatalogEntry::new().with(UserDisable, disengage())),
        (
            C::PedalPressed,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Pedal Pressed").with_visual(VisualAlert::BrakePressed)),
        ),
        (
            C::BrakeHold,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Brake Hold Active")),
        ),
        (
            C::ParkBrake,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Parking Brake Engaged")),
        ),
        (
            C::WrongGear,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Gear not D").with_visual(VisualAlert::WrongGear)),
        ),
        (
            C::ReverseGear,
            CatalogEntry::new()
                .with(Permanent, blocking_banner("Reverse Gear"))
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Reverse Gear")),
        ),
        (
            C::DoorOpen,
            CatalogEntry::new()
                .with(Permanent, blocking_banner("Door Open"))
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Door Open")),
        ),
        (
            C::SeatbeltNotLatched,
            CatalogEntry::new()
                .with(Permanent, blocking_banner("Seatbelt Unlatched"))
                .with(SoftDisable, soft_disable("Seatbelt Unlatched"))
                .with(
                    NoEntry,
                    no_entry("Seatbelt Unlatched").with_visual(VisualAlert::SeatbeltUnbuckled),
                ),
        ),
        (
            C::WrongCarMode,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with_fn(NoEntry, wrong_car_mode),
        ),
        (
            C::WrongCruiseMode,
            CatalogEntry::new()
                .with(UserDisable, disengage())
                .with(NoEntry, no_entry("Adaptive Cruise Disabled")),
        ),
        (
            C::GasPressedOverride,
            CatalogEntry::new().with(OverrideLongitudinal, engagement(AudibleAlert::None)),
        ),
        (
            C::SteerOverride,
            CatalogEntry::new().with(OverrideLateral, engagement(AudibleAlert::None)),
        ),
        (
            C::PreEnableStandstill,
            CatalogEntry::new().with(
                PreEnable,
                banner("Release Brake to Engage", AlertStatus::Normal, Priority::Lowest)
                    .with_creation_delay(Duration::from_secs(1)),
            ),
        ),
        // ── communication ──────────────────────────────────────────────────
        (
            C::CanError,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("CAN Error: Check Connections"))
                .with(
                    Permanent,
                    banner("CAN Error: Check Connections", AlertStatus::Normal, Priority::Low)
                        .with_creation_delay(Duration::from_secs(1)),
                )
                .with(NoEntry, no_entry("CAN Error: Check Connections")),
        ),
        (
            C::CanBusMissing,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("CAN Bus Disconnected"))
                .with(
                    Permanent,
                    banner("CAN Bus Disconnected: Likely Faulty Cable", AlertStatus::Normal, Priority::Low)
                        .with_creation_delay(Duration::from_secs(1)),
                )
                .with(NoEntry, no_entry("CAN Bus Disconnected: Check Connections")),
        ),
        (
            C::CommIssue,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Communication Issue between Processes"))
                .with(
                    NoEntry,
                    no_entry("Communication Issue between Processes").with_audible(AudibleAlert::Disengage),
                ),
        ),
        (
            C::CommIssueAvgFreq,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Low Communication Rate between Processes"))
                .with(NoEntry, no_entry("Low Communication Rate between Processes")),
        ),
        (
            C::UsbError,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("USB Error: Reboot Your Device"))
                .with(Permanent, normal_permanent("USB Error: Reboot Your Device", ""))
                .with(NoEntry, no_entry("USB Error: Reboot Your Device")),
        ),
        (
            C::ControlsdLagging,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Controls Lagging"))
                .with(NoEntry, no_entry("Controls Process Lagging: Reboot Your Device")),
        ),
        (
            C::ProcessNotRunning,
            CatalogEntry::new().with(
                NoEntry,
                no_entry("System Malfunction: Reboot Your Device").with_audible(AudibleAlert::Disengage),
            ),
        ),
        (
            C::RadarFault,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Radar Error: Restart the Car"))
                .with(NoEntry, no_entry("Radar Error: Restart the Car")),
        ),
        // ── safety hardware ────────────────────────────────────────────────
        (
            C::ControlsMismatch,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("Controls Mismatch"))
                .with(NoEntry, no_entry("Controls Mismatch")),
        ),
        (
            C::RelayMalfunction,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("Harness Relay Malfunction"))
                .with(Permanent, normal_permanent("Harness Relay Malfunction", "Check Hardware"))
                .with(NoEntry, no_entry("Harness Relay Malfunction")),
        ),
        (
            C::CruiseMismatch,
            CatalogEntry::new().with(ImmediateDisable, immediate_disable("velos failed to cancel cruise")),
        ),
        // ── device health ──────────────────────────────────────────────────
        (
            C::Overheat,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("System Overheated", ""))
                .with(SoftDisable, soft_disable("System Overheated"))
                .with(NoEntry, no_entry("System Overheated")),
        ),
        (
            C::OutOfSpace,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("Out of Storage", ""))
                .with(NoEntry, no_entry("Out of Storage")),
        ),
        (
            C::LowMemory,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Low Memory: Reboot Your Device"))
                .with(Permanent, normal_permanent("Low Memory", "Reboot your Device"))
                .with(
                    NoEntry,
                    no_entry("Low Memory: Reboot Your Device").with_audible(AudibleAlert::Disengage),
                ),
        ),
        (
            C::FanMalfunction,
            CatalogEntry::new().with(Permanent, normal_permanent("Fan Malfunction", "Likely Hardware Issue")),
        ),
        (
            C::SoundsUnavailable,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("Speaker not found", "Reboot your Device"))
                .with(NoEntry, no_entry("Speaker not found")),
        ),
        (
            C::LowBattery,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Low Battery"))
                .with(NoEntry, no_entry("Low Battery")),
        ),
        // ── calibration ────────────────────────────────────────────────────
        (
            C::CalibrationIncomplete,
            CatalogEntry::new()
                .with_fn(Permanent, calibration_incomplete)
                .with(SoftDisable, soft_disable("Calibration Incomplete"))
                .with(NoEntry, no_entry("Calibration in Progress")),
        ),
        (
            C::CalibrationInvalid,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("Calibration Invalid", "Remount Device and Recalibrate"))
                .with(SoftDisable, soft_disable("Calibration Invalid: Remount Device & Recalibrate"))
                .with(NoEntry, no_entry("Calibration Invalid: Remount Device & Recalibrate")),
        ),
        (
            C::CalibrationRecalibrating,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("Device Remount Detected", "Recalibrating"))
                .with(SoftDisable, soft_disable("Device Remount Detected: Recalibrating"))
                .with(NoEntry, no_entry("Device Remount Detected: Recalibrating")),
        ),
        // ── vehicle faults and limits ──────────────────────────────────────
        (
            C::SteerUnavailable,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("LKAS Fault: Restart the Car"))
                .with(Permanent, normal_permanent("LKAS Fault: Restart the car to engage", ""))
                .with(NoEntry, no_entry("LKAS Fault: Restart the Car")),
        ),
        (
            C::BrakeUnavailable,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("Cruise Fault: Restart the Car"))
                .with(Permanent, normal_permanent("Cruise Fault: Restart the car to engage", ""))
                .with(NoEntry, no_entry("Cruise Fault: Restart the Car")),
        ),
        (
            C::SteerTempUnavailable,
            CatalogEntry::new()
                .with(
                    Warning,
                    take_control(
                        "Steering Temporarily Unavailable",
                        Priority::Low,
                        VisualAlert::SteerRequired,
                        AudibleAlert::None,
                    ),
                )
                .with(NoEntry, no_entry("Steering Temporarily Unavailable")),
        ),
        (
            C::SteerSaturated,
            CatalogEntry::new().with(
                Warning,
                take_control(
                    "Turn Exceeds Steering Limit",
                    Priority::Low,
                    VisualAlert::SteerRequired,
                    AudibleAlert::Prompt,
                )
                .with_duration(Duration::from_secs(1)),
            ),
        ),
        (
            C::AccFaulted,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("Cruise Fault: Restart the Car"))
                .with(Permanent, normal_permanent("Cruise Fault: Restart the car to engage", ""))
                .with(NoEntry, no_entry("Cruise Fault: Restart the Car")),
        ),
        (
            C::EspDisabled,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Electronic Stability Control Disabled"))
                .with(NoEntry, no_entry("Electronic Stability Control Disabled")),
        ),
        (
            C::CruiseDisabled,
            CatalogEntry::new().with(ImmediateDisable, immediate_disable("Cruise Is Off")),
        ),
        (
            C::BelowEngageSpeed,
            CatalogEntry::new().with(NoEntry, no_entry("Speed Too Low")),
        ),
        (C::BelowSteerSpeed, CatalogEntry::new().with_fn(Warning, below_steer_speed)),
        (
            C::SpeedTooLow,
            CatalogEntry::new().with(
                ImmediateDisable,
                immediate_disable("Speed too low").with_audible(AudibleAlert::Disengage),
            ),
        ),
        (
            C::SpeedTooHigh,
            CatalogEntry::new()
                .with(
                    Warning,
                    Alert::new(
                        "Speed Too High",
                        "Model uncertain at this speed",
                        AlertStatus::UserPrompt,
                        AlertSize::Mid,
                        Priority::High,
                        VisualAlert::SpeedTooHigh,
                        AudibleAlert::PromptRepeat,
                        Duration::from_secs(4),
                    ),
                )
                .with(NoEntry, no_entry("Slow down to engage")),
        ),
        (
            C::LowSpeedLockout,
            CatalogEntry::new()
                .with(Permanent, normal_permanent("Cruise Fault: Restart the car to engage", ""))
                .with(NoEntry, no_entry("Cruise Fault: Restart the Car")),
        ),
        // ── driving assistance ─────────────────────────────────────────────
        (
            C::Fcw,
            CatalogEntry::new().with(
                Permanent,
                Alert::new(
                    "BRAKE!",
                    "Risk of Collision",
                    AlertStatus::Critical,
                    AlertSize::Full,
                    Priority::Highest,
                    VisualAlert::Fcw,
                    AudibleAlert::WarningImmediate,
                    Duration::from_secs(2),
                ),
            ),
        ),
        (C::StockFcw, CatalogEntry::new()),
        (
            C::StockAeb,
            CatalogEntry::new()
                .with(
                    Permanent,
                    Alert::new(
                        "BRAKE!",
                        "Stock AEB: Risk of Collision",
                        AlertStatus::Critical,
                        AlertSize::Full,
                        Priority::Highest,
                        VisualAlert::Fcw,
                        AudibleAlert::None,
                        Duration::from_secs(2),
                    ),
                )
                .with(NoEntry, no_entry("Stock AEB: Risk of Collision")),
        ),
        (
            C::Ldw,
            CatalogEntry::new().with(
                Permanent,
                take_control("Lane Departure Detected", Priority::Low, VisualAlert::LdwLeft, AudibleAlert::Prompt)
                    .with_duration(Duration::from_secs(3)),
            ),
        ),
        (
            C::PreLaneChangeLeft,
            CatalogEntry::new().with(
                Warning,
                lane_change("Steer Left to Start Lane Change Once Safe", AudibleAlert::None).with_rate(0.75),
            ),
        ),
        (
            C::PreLaneChangeRight,
            CatalogEntry::new().with(
                Warning,
                lane_change("Steer Right to Start Lane Change Once Safe", AudibleAlert::None).with_rate(0.75),
            ),
        ),
        (
            C::LaneChangeBlocked,
            CatalogEntry::new().with(
                Warning,
                lane_change("Car Detected in Blindspot", AudibleAlert::PromptRepeat),
            ),
        ),
        (
            C::LaneChange,
            CatalogEntry::new().with(Warning, lane_change("Changing Lanes", AudibleAlert::None)),
        ),
        (C::AutoLaneChange, CatalogEntry::new().with_fn(Warning, auto_lane_change)),
        (
            C::PromptDriverDistracted,
            CatalogEntry::new().with(
                Warning,
                Alert::new(
                    "Pay Attention",
                    "Driver Distracted",
                    AlertStatus::UserPrompt,
                    AlertSize::Mid,
                    Priority::Mid,
                    VisualAlert::SteerRequired,
                    AudibleAlert::PromptDistracted,
                    Duration::from_millis(100),
                ),
            ),
        ),
        (
            C::DriverDistracted,
            CatalogEntry::new().with(
                Warning,
                Alert::new(
                    "DISENGAGE IMMEDIATELY",
                    "Driver Distracted",
                    AlertStatus::Critical,
                    AlertSize::Full,
                    Priority::High,
                    VisualAlert::SteerRequired,
                    AudibleAlert::WarningImmediate,
                    Duration::from_millis(100),
                ),
            ),
        ),
        (C::PersonalityChanged, CatalogEntry::new().with_fn(Permanent, personality_changed)),
        (C::NoGps, CatalogEntry::new().with_fn(Permanent, no_gps)),
        (
            C::VehicleModelInvalid,
            CatalogEntry::new()
                .with(NoEntry, no_entry("Vehicle Parameter Identification Failed"))
                .with(SoftDisable, soft_disable("Vehicle Parameter Identification Failed")),
        ),
        (
            C::PlannerError,
            CatalogEntry::new()
                .with(ImmediateDisable, immediate_disable("Planner Solution Error"))
                .with(NoEntry, no_entry("Planner Solution Error")),
        ),
        (
            C::SensorDataInvalid,
            CatalogEntry::new()
                .with(
                    Permanent,
                    normal_permanent("Sensor Data Invalid", "Possible Hardware Issue")
                        .with_creation_delay(Duration::from_secs(1)),
                )
                .with(NoEntry, no_entry("Sensor Data Invalid")),
        ),
        (
            C::PosenetInvalid,
            CatalogEntry::new()
                .with(SoftDisable, soft_disable("Posenet Speed Invalid"))
                .with(NoEntry, no_entry("Posenet Speed Invalid")),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_condition_is_listed_once() {
        let listed = entries();
        assert_eq!(listed.len(), ConditionId::count());
        let mut ids: Vec<ConditionId> = listed.iter().map(|(id, _)| *id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ConditionId::count());
    }

    #[test]
    fn engagement_blockers_carry_no_entry() {
        let listed = entries();
        for (id, entry) in &listed {
            let blocks_engagement = entry.contains(ImmediateDisable) || entry.contains(UserDisable);
            let is_button = matches!(id, ConditionId::ButtonCancel | ConditionId::PcmDisable);
            let is_transient = matches!(
                id,
                ConditionId::CruiseMismatch | ConditionId::CruiseDisabled | ConditionId::SpeedTooLow
            );
            if blocks_engagement && !is_button && !is_transient {
                assert!(entry.contains(NoEntry), "{id} disengages but does not block entry");
            }
        }
    }
}
