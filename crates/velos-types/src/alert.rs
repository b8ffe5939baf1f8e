//! Driver-facing alert values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::{ConditionId, EffectCategory};

/// Display priority. Higher variants preempt lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Lowest,
    Lower,
    Low,
    Mid,
    High,
    Highest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertStatus {
    #[default]
    Normal,
    UserPrompt,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertSize {
    #[default]
    None,
    Small,
    Mid,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisualAlert {
    #[default]
    None,
    Fcw,
    SteerRequired,
    BrakePressed,
    WrongGear,
    SeatbeltUnbuckled,
    SpeedTooHigh,
    LdwLeft,
    LdwRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudibleAlert {
    #[default]
    None,
    Engage,
    Disengage,
    RefuseEngage,
    Prompt,
    PromptRepeat,
    PromptDistracted,
    WarningSoft,
    WarningImmediate,
}

/// A fully-resolved driver-facing alert.
///
/// Alerts are immutable values; the arbiter only reads them. The `label` and
/// `category` fields are empty until the alert is resolved for a concrete
/// condition through [`Alert::tagged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub text_1: String,
    pub text_2: String,
    pub status: AlertStatus,
    pub size: AlertSize,
    pub priority: Priority,
    pub visual: VisualAlert,
    pub audible: AudibleAlert,
    /// Minimum time on screen once shown.
    pub duration: Duration,
    /// Re-trigger rate in Hz; `0.0` means the alert never re-announces itself.
    pub rate: f32,
    /// How long the condition must persist before this alert may be created.
    pub creation_delay: Duration,
    /// `"<condition>/<category>"`, unique per (condition, category) pair.
    pub label: String,
    pub category: Option<EffectCategory>,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text_1: impl Into<String>,
        text_2: impl Into<String>,
        status: AlertStatus,
        size: AlertSize,
        priority: Priority,
        visual: VisualAlert,
        audible: AudibleAlert,
        duration: Duration,
    ) -> Self {
        Self {
            text_1: text_1.into(),
            text_2: text_2.into(),
            status,
            size,
            priority,
            visual,
            audible,
            duration,
            rate: 0.0,
            creation_delay: Duration::ZERO,
            label: String::new(),
            category: None,
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = delay;
        self
    }

    pub fn with_visual(mut self, visual: VisualAlert) -> Self {
        self.visual = visual;
        self
    }

    pub fn with_audible(mut self, audible: AudibleAlert) -> Self {
        self.audible = audible;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Bind this alert to the condition and category it was resolved for.
    pub fn tagged(mut self, condition: ConditionId, category: EffectCategory) -> Self {
        self.label = format!("{}/{}", condition.as_str(), category.as_str());
        self.category = Some(category);
        self
    }

    /// Window after which a repeat of the same alert re-announces itself.
    pub fn retrigger_window(&self) -> Option<Duration> {
        if self.rate > 0.0 && self.rate.is_finite() {
            Some(Duration::from_secs_f32(1.0 / self.rate))
        } else {
            None
        }
    }

    /// Reasons this alert cannot be displayed, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(format!("re-trigger rate must be finite and non-negative, got {}", self.rate));
        }
        if self.text_1.is_empty() && self.text_2.is_empty() && self.size != AlertSize::None {
            return Err(format!("{:?} alert has no text", self.size));
        }
        if self.size == AlertSize::Small && !self.text_2.is_empty() {
            return Err("small alerts carry a single line".to_string());
        }
        Ok(())
    }
}
