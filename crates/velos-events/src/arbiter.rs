//! [`AlertArbiter`] – selects the single alert on screen.
//!
//! Rules, evaluated once per cycle:
//!
//! 1. [`AlertArbiter::add_many`] offers this cycle's candidates. A candidate
//!    replaces the current alert only when nothing is shown or it has a
//!    strictly higher priority; ties never preempt. A candidate with the
//!    current alert's label keeps it on screen, and restarts it once its
//!    re-trigger window has elapsed.
//! 2. [`AlertArbiter::process_alerts`] retires the current alert once its
//!    display duration has run out or its category was cleared.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};
use velos_types::{Alert, EffectCategory};

fn cycles(tick: Duration, duration: Duration) -> u64 {
    let tick_ns = tick.as_nanos().max(1);
    u64::try_from(duration.as_nanos().div_ceil(tick_ns)).unwrap_or(u64::MAX)
}

/// The alert currently on screen, with its display window in cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAlert {
    pub alert: Alert,
    pub start_cycle: u64,
    /// Last cycle on which the alert is guaranteed to be shown.
    pub end_cycle: u64,
}

#[derive(Debug, Clone)]
pub struct AlertArbiter {
    tick: Duration,
    current: Option<ActiveAlert>,
    /// Cycle each label was last (re)started.
    last_started: HashMap<String, u64>,
}

impl AlertArbiter {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            current: None,
            last_started: HashMap::new(),
        }
    }

    fn install(&mut self, alert: Alert, cycle: u64) {
        let end_cycle = cycle.saturating_add(cycles(self.tick, alert.duration)).max(cycle + 1);
        if self.last_started.insert(alert.label.clone(), cycle).is_none() {
            info!(label = %alert.label, text = %alert.text_1, "alert shown for the first time");
        } else {
            debug!(label = %alert.label, cycle, "alert started");
        }
        self.current = Some(ActiveAlert {
            alert,
            start_cycle: cycle,
            end_cycle,
        });
    }

    /// Offer this cycle's candidates. An alert past its display window no
    /// longer holds the screen against them.
    pub fn add_many(&mut self, cycle: u64, candidates: Vec<Alert>) {
        if self.current.as_ref().is_some_and(|c| cycle > c.end_cycle) {
            self.retire(cycle);
        }
        for alert in candidates {
            let Some(current) = self.current.as_mut() else {
                self.install(alert, cycle);
                continue;
            };

            if current.alert.label == alert.label {
                let retrigger = alert
                    .retrigger_window()
                    .is_some_and(|w| cycle.saturating_sub(current.start_cycle) >= cycles(self.tick, w));
                if retrigger {
                    self.install(alert, cycle);
                } else {
                    let extended = current.start_cycle.saturating_add(cycles(self.tick, alert.duration));
                    current.end_cycle = current.end_cycle.max(extended).max(cycle + 1);
                    // Dynamic texts may have changed since the alert started.
                    current.alert = alert;
                }
            } else if alert.priority > current.alert.priority {
                debug!(from = %current.alert.label, to = %alert.label, "alert preempted");
                self.install(alert, cycle);
            }
        }
    }

    /// Retire the current alert if it expired or its category is cleared.
    pub fn process_alerts(&mut self, cycle: u64, clear: &[EffectCategory]) {
        let retire = match &self.current {
            Some(current) => {
                cycle > current.end_cycle
                    || current.alert.category.is_some_and(|c| clear.contains(&c))
            }
            None => false,
        };
        if retire {
            self.retire(cycle);
        }
    }

    fn retire(&mut self, cycle: u64) {
        if let Some(old) = self.current.take() {
            debug!(label = %old.alert.label, cycle, "alert retired");
        }
    }

    pub fn current(&self) -> Option<&ActiveAlert> {
        self.current.as_ref()
    }

    /// The current alert started on `cycle`, i.e. its sound should play.
    pub fn started_on(&self, cycle: u64) -> bool {
        self.current.as_ref().is_some_and(|c| c.start_cycle == cycle)
    }

    /// Cycle on which `label` was last started, if it was ever shown.
    pub fn last_started(&self, label: &str) -> Option<u64> {
        self.last_started.get(label).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use velos_types::{AlertSize, AlertStatus, AudibleAlert, ConditionId, Priority, VisualAlert};

    const TICK: Duration = Duration::from_millis(10);

    fn alert(id: ConditionId, priority: Priority, duration_ms: u64) -> Alert {
        Alert::new(
            id.as_str(),
            "",
            AlertStatus::Normal,
            AlertSize::Small,
            priority,
            VisualAlert::None,
            AudibleAlert::None,
            Duration::from_millis(duration_ms),
        )
        .tagged(id, EffectCategory::Permanent)
    }

    fn label(arbiter: &AlertArbiter) -> Option<&str> {
        arbiter.current().map(|c| c.alert.label.as_str())
    }

    #[test]
    fn first_candidate_is_installed() {
        let mut arbiter = AlertArbiter::new(TICK);
        arbiter.add_many(1, vec![alert(ConditionId::Overheat, Priority::Lower, 200)]);
        arbiter.process_alerts(1, &[]);
        assert_eq!(label(&arbiter), Some("overheat/permanent"));
        assert!(arbiter.started_on(1));
        assert_eq!(arbiter.current().map(|c| c.end_cycle), Some(21));
    }

    #[test]
    fn higher_priority_preempts_and_tie_does_not() {
        let mut arbiter = AlertArbiter::new(TICK);
        arbiter.add_many(1, vec![alert(ConditionId::Overheat, Priority::Low, 1000)]);
        arbiter.add_many(2, vec![alert(ConditionId::LowMemory, Priority::Low, 1000)]);
        assert_eq!(label(&arbiter), Some("overheat/permanent"));

        arbiter.add_many(3, vec![alert(ConditionId::Fcw, Priority::Highest, 1000)]);
        assert_eq!(label(&arbiter), Some("fcw/permanent"));
    }

    #[test]
    fn candidates_within_one_cycle_pick_highest() {
        let mut arbiter = AlertArbiter::new(TICK);
        arbiter.add_many(
            1,
            vec![
                alert(ConditionId::Overheat, Priority::Lower, 200),
                alert(ConditionId::Fcw, Priority::Highest, 200),
                alert(ConditionId::LowMemory, Priority::Mid, 200),
            ],
        );
        assert_eq!(label(&arbiter), Some("fcw/permanent"));
    }

    #[test]
    fn alert_expires_after_duration_without_refresh() {
        let mut arbiter = AlertArbiter::new(TICK);
        arbiter.add_many(0, vec![alert(ConditionId::Overheat, Priority::Lower, 100)]);
        for cycle in 0..=10 {
            arbiter.process_alerts(cycle, &[]);
            assert!(arbiter.current().is_some(), "retired early at {cycle}");
        }
        arbiter.process_alerts(11, &[]);
        assert!(arbiter.current().is_none());
    }

    #[test]
    fn expired_alert_gives_way_in_the_same_cycle() {
        let mut arbiter = AlertArbiter::new(TICK);
        arbiter.add_many(0, vec![alert(ConditionId::Fcw, Priority::Mid, 100)]);
        arbiter.process_alerts(0, &[]);
        arbiter.add_many(10, vec![alert(ConditionId::Overheat, Priority::Lower, 100)]);
        assert_eq!(label(&arbiter), Some("fcw/permanent"));

        arbiter.add_many(11, vec![alert(ConditionId::Overheat, Priority::Lower, 100)]);
        assert_eq!(label(&arbiter), Some("overheat/permanent"));
        assert!(arbiter.started_on(11));
    }

    #[test]
    fn persisting_condition_keeps_alert_on_screen() {
        let mut arbiter = AlertArbiter::new(TICK);
        for cycle in 0..100 {
            arbiter.add_many(cycle, vec![alert(ConditionId::Overheat, Priority::Lower, 100)]);
            arbiter.process_alerts(cycle, &[]);
            assert_eq!(label(&arbiter), Some("overheat/permanent"));
        }
        // Without re-trigger the alert keeps its original start.
        assert_eq!(arbiter.current().map(|c| c.start_cycle), Some(0));
    }

    #[test]
    fn retrigger_restarts_after_window() {
        let mut arbiter = AlertArbiter::new(TICK);
        let repeating = alert(ConditionId::PreLaneChangeLeft, Priority::Low, 100).with_rate(2.0);
        for cycle in 0..=50 {
            arbiter.add_many(cycle, vec![repeating.clone()]);
            arbiter.process_alerts(cycle, &[]);
        }
        assert_eq!(arbiter.current().map(|c| c.start_cycle), Some(50));
        assert_eq!(arbiter.last_started("preLaneChangeLeft/permanent"), Some(50));
    }

    #[test]
    fn cleared_category_is_retired() {
        let mut arbiter = AlertArbiter::new(TICK);
        let warning = Alert {
            category: Some(EffectCategory::Warning),
            ..alert(ConditionId::SteerSaturated, Priority::Low, 1000)
        };
        arbiter.add_many(1, vec![warning]);
        arbiter.process_alerts(1, &[EffectCategory::NoEntry]);
        assert!(arbiter.current().is_some());
        arbiter.process_alerts(2, &[EffectCategory::Warning]);
        assert!(arbiter.current().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// A strictly higher-priority candidate always wins; an equal or
        /// lower one never displaces a live alert.
        #[test]
        fn preemption_is_strict(first in 0usize..6, second in 0usize..6) {
            let priorities = [
                Priority::Lowest, Priority::Lower, Priority::Low,
                Priority::Mid, Priority::High, Priority::Highest,
            ];
            let mut arbiter = AlertArbiter::new(TICK);
            arbiter.add_many(1, vec![alert(ConditionId::Overheat, priorities[first], 1000)]);
            arbiter.add_many(2, vec![alert(ConditionId::LowMemory, priorities[second], 1000)]);
            let expected = if second > first { "lowMemory/permanent" } else { "overheat/permanent" };
            prop_assert_eq!(label(&arbiter), Some(expected));
        }
    }
}
