//! [`EngagementStateMachine`] – when the system may act.
//!
//! ```text
//!                 ENABLE (no NO_ENTRY)
//!   Disabled ─────────────────────────────► Enabled ◄──────────┐
//!      ▲  │ ENABLE + PRE_ENABLE              │  SOFT_DISABLE   │ SOFT_DISABLE
//!      │  ▼                                  ▼                 │ cleared
//!      │ PreEnabled ── PRE_ENABLE cleared ─► │ ─────► SoftDisabling
//!      │                                                      │ timer expired
//!      └──────────── USER_DISABLE / IMMEDIATE_DISABLE ◄───────┘
//! ```
//!
//! Every transition is a pure function of the current state, the effect
//! categories present this cycle and the soft-disable countdown.
//!
//! Precedence when several categories are present at once:
//! `IMMEDIATE_DISABLE` > `USER_DISABLE` > `SOFT_DISABLE` > the rest. A
//! transition *into* [`EngagementState::Enabled`] never happens while any
//! `NO_ENTRY` condition is present.

use tracing::{info, warn};
use velos_types::{EffectCategory, EffectSet, EngagementState};

/// Engagement flags derived from the state after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngagementOutput {
    /// Any state other than disabled.
    pub enabled: bool,
    /// Actuation permitted: enabled or soft-disabling.
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct EngagementStateMachine {
    state: EngagementState,
    soft_disable_cycles: u32,
    soft_disable_timer: u32,
    alert_categories: Vec<EffectCategory>,
}

impl EngagementStateMachine {
    /// `soft_disable_cycles` is the length of the soft-disable countdown.
    pub fn new(soft_disable_cycles: u32) -> Self {
        Self {
            state: EngagementState::Disabled,
            soft_disable_cycles,
            soft_disable_timer: 0,
            alert_categories: vec![EffectCategory::Permanent],
        }
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    /// Remaining soft-disable countdown in cycles.
    pub fn soft_disable_timer(&self) -> u32 {
        self.soft_disable_timer
    }

    /// Categories whose alerts are relevant after the last update.
    pub fn alert_categories(&self) -> &[EffectCategory] {
        &self.alert_categories
    }

    pub fn output(&self) -> EngagementOutput {
        EngagementOutput {
            enabled: self.state.is_enabled(),
            active: self.state.is_active(),
        }
    }

    /// Advance one cycle.
    pub fn update<E: EffectSet + ?Sized>(&mut self, events: &E) -> EngagementOutput {
        use EffectCategory as Cat;

        let previous = self.state;
        self.alert_categories.clear();
        self.alert_categories.push(Cat::Permanent);
        self.soft_disable_timer = self.soft_disable_timer.saturating_sub(1);

        if events.contains(Cat::ImmediateDisable) {
            self.alert_categories.push(Cat::ImmediateDisable);
            self.state = EngagementState::Disabled;
        } else if self.state != EngagementState::Disabled && events.contains(Cat::UserDisable) {
            self.alert_categories.push(Cat::UserDisable);
            self.state = EngagementState::Disabled;
        } else {
            let no_entry = events.contains(Cat::NoEntry);
            match self.state {
                EngagementState::Enabled => {
                    if events.contains(Cat::SoftDisable) {
                        self.state = EngagementState::SoftDisabling;
                        self.soft_disable_timer = self.soft_disable_cycles;
                        self.alert_categories.push(Cat::SoftDisable);
                    }
                }
                EngagementState::SoftDisabling => {
                    if self.soft_disable_timer == 0 {
                        self.state = EngagementState::Disabled;
                    } else if events.contains(Cat::SoftDisable) || no_entry {
                        self.alert_categories.push(Cat::SoftDisable);
                    } else {
                        self.state = EngagementState::Enabled;
                    }
                }
                EngagementState::PreEnabled => {
                    if events.contains(Cat::PreEnable) || no_entry {
                        self.alert_categories.push(Cat::PreEnable);
                    } else {
                        self.state = EngagementState::Enabled;
                    }
                }
                EngagementState::Disabled => {
                    if events.contains(Cat::Enable) {
                        if no_entry {
                            self.alert_categories.push(Cat::NoEntry);
                        } else {
                            self.state = if events.contains(Cat::PreEnable) {
                                EngagementState::PreEnabled
                            } else {
                                EngagementState::Enabled
                            };
                            self.alert_categories.push(Cat::Enable);
                        }
                    }
                }
            }
        }

        let output = self.output();
        if output.active {
            self.alert_categories.push(Cat::Warning);
        }
        if output.enabled {
            for category in [Cat::OverrideLateral, Cat::OverrideLongitudinal] {
                if events.contains(category) {
                    self.alert_categories.push(category);
                }
            }
        }

        if previous != self.state {
            match self.state {
                EngagementState::Disabled if previous == EngagementState::SoftDisabling => {
                    warn!(from = ?previous, "soft disable expired, disengaged")
                }
                _ => info!(from = ?previous, to = ?self.state, "engagement state changed"),
            }
        }
        output
    }
}
