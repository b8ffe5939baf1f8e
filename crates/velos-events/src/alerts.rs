//! Builders for recurring alert shapes, plus the factories for alerts whose
//! text is computed from live signals.

use std::time::Duration;

use velos_types::{Alert, AlertSize, AlertStatus, AudibleAlert, Priority, VisualAlert};

use crate::catalog::AlertContext;

const MS_TO_KPH: f32 = 3.6;
const MS_TO_MPH: f32 = 2.236_936;
/// Calibration only learns above this speed (m/s).
const CALIBRATION_MIN_SPEED: f32 = 6.705_6;

pub const UNAVAILABLE: &str = "velos Unavailable";
pub const TAKE_CONTROL_NOW: &str = "TAKE CONTROL IMMEDIATELY";
const SOFT_DISABLE_ESCALATION: Duration = Duration::from_millis(500);

// ────────────────────────────────────────────────────────────────────────────
// Shapes
// ────────────────────────────────────────────────────────────────────────────

/// Engagement refused.
pub fn no_entry(reason: &str) -> Alert {
    Alert::new(
        UNAVAILABLE,
        reason,
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Low,
        VisualAlert::None,
        AudibleAlert::RefuseEngage,
        Duration::from_secs(3),
    )
}

/// Timed disengagement in progress.
pub fn soft_disable(reason: &str) -> Alert {
    Alert::new(
        TAKE_CONTROL_NOW,
        reason,
        AlertStatus::Critical,
        AlertSize::Full,
        Priority::Mid,
        VisualAlert::SteerRequired,
        AudibleAlert::WarningSoft,
        Duration::from_secs(2),
    )
}

/// Disengaged this cycle for safety.
pub fn immediate_disable(reason: &str) -> Alert {
    Alert::new(
        TAKE_CONTROL_NOW,
        reason,
        AlertStatus::Critical,
        AlertSize::Full,
        Priority::Highest,
        VisualAlert::SteerRequired,
        AudibleAlert::WarningImmediate,
        Duration::from_secs(4),
    )
}

/// Soft-disable alert for the current point of the countdown. In the final
/// half second it escalates to the immediate-disable shape.
pub fn soft_disable_countdown(alert: Alert, remaining: Duration) -> Alert {
    if remaining >= SOFT_DISABLE_ESCALATION {
        return alert;
    }
    Alert {
        label: alert.label,
        category: alert.category,
        ..immediate_disable(&alert.text_2)
    }
}

/// Sound-only engage/disengage confirmation.
pub fn engagement(audible: AudibleAlert) -> Alert {
    Alert::new(
        "",
        "",
        AlertStatus::Normal,
        AlertSize::None,
        Priority::Mid,
        VisualAlert::None,
        audible,
        Duration::from_millis(200),
    )
}

/// Informational banner shown regardless of engagement.
pub fn normal_permanent(text_1: &str, text_2: &str) -> Alert {
    let size = if text_2.is_empty() { AlertSize::Small } else { AlertSize::Mid };
    Alert::new(
        text_1,
        text_2,
        AlertStatus::Normal,
        size,
        Priority::Lower,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(200),
    )
}

/// Single-line warning with the given urgency.
pub fn banner(text: &str, status: AlertStatus, priority: Priority) -> Alert {
    Alert::new(
        text,
        "",
        status,
        AlertSize::Small,
        priority,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(200),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Factories
// ────────────────────────────────────────────────────────────────────────────

fn speed_unit(metric: bool) -> (f32, &'static str) {
    if metric { (MS_TO_KPH, "km/h") } else { (MS_TO_MPH, "mph") }
}

pub fn below_steer_speed(ctx: &AlertContext<'_>) -> Alert {
    let (factor, unit) = speed_unit(ctx.metric);
    let speed = (ctx.params.min_steer_speed * factor).round() as i32;
    Alert::new(
        "TAKE CONTROL",
        format!("Steer Unavailable Below {speed} {unit}"),
        AlertStatus::UserPrompt,
        AlertSize::Mid,
        Priority::Mid,
        VisualAlert::SteerRequired,
        AudibleAlert::Prompt,
        Duration::from_millis(300),
    )
}

pub fn calibration_incomplete(ctx: &AlertContext<'_>) -> Alert {
    let (factor, unit) = speed_unit(ctx.metric);
    let speed = (CALIBRATION_MIN_SPEED * factor) as i32;
    Alert::new(
        format!("Calibration in Progress: {}%", ctx.signals.calibration_percent),
        format!("Drive Above {speed} {unit}"),
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Lowest,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(200),
    )
}

pub fn no_gps(ctx: &AlertContext<'_>) -> Alert {
    let hint = if ctx.signals.gps_integrated {
        "If sky is visible, contact support"
    } else {
        "Check GPS antenna placement"
    };
    Alert::new(
        "Poor GPS reception",
        hint,
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Lower,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(200),
    )
    .with_creation_delay(Duration::from_secs(300))
}

pub fn wrong_car_mode(ctx: &AlertContext<'_>) -> Alert {
    let reason = if ctx.params.car_name == "honda" { "Main Switch Off" } else { "Cruise Mode Disabled" };
    no_entry(reason)
}

pub fn joystick(ctx: &AlertContext<'_>) -> Alert {
    let [gas, steer] = ctx.signals.joystick_axes;
    Alert::new(
        "Joystick Mode",
        format!("Gas: {}%, Steer: {}%", (gas * 100.0).round(), (steer * 100.0).round()),
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Low,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_millis(100),
    )
}

pub fn auto_lane_change(ctx: &AlertContext<'_>) -> Alert {
    Alert::new(
        format!("Auto Lane Change starts in {}s", ctx.signals.auto_lane_change_timer.max(0.0) as i32),
        "Monitor Other Vehicles",
        AlertStatus::Normal,
        AlertSize::Mid,
        Priority::Low,
        VisualAlert::None,
        AudibleAlert::PromptRepeat,
        Duration::from_millis(100),
    )
    .with_rate(0.75)
}

pub fn personality_changed(ctx: &AlertContext<'_>) -> Alert {
    let name = match ctx.personality {
        velos_types::Personality::Aggressive => "Aggressive",
        velos_types::Personality::Standard => "Standard",
        velos_types::Personality::Relaxed => "Relaxed",
    };
    Alert::new(
        format!("Driving Personality: {name}"),
        "",
        AlertStatus::Normal,
        AlertSize::Small,
        Priority::Lower,
        VisualAlert::None,
        AudibleAlert::None,
        Duration::from_secs(2),
    )
}
