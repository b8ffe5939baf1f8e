//! [`SafetyCrossCheck`] – agreement between the control plane and the
//! independent safety units.
//!
//! Three independent signals raise a mismatch:
//!
//! * A unit runs a safety configuration other than the one expected, once the
//!   startup grace period has passed. Units past the expected list must be in
//!   an inert mode.
//! * A unit reports that its receive checks failed.
//! * While engaged, a unit keeps refusing control (`controls_allowed` false)
//!   for `mismatch_limit` consecutive cycles.
//!
//! A mismatch episode is reported exactly once, on the cycle it begins. The
//! caller decides what to do with it; the coordinator latches it for the
//! rest of the session.

use tracing::{error, warn};
use velos_types::{SafetyConfig, SafetyFault, SafetyUnitState};

pub struct CrossCheckInput<'a> {
    /// Cycles since the process started.
    pub cycle: u64,
    pub expected: &'a [SafetyConfig],
    pub alternative_experience: u32,
    pub units: &'a [SafetyUnitState],
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossCheckReport {
    /// A new mismatch episode started this cycle.
    pub raise_mismatch: bool,
    /// Any unit reports a relay malfunction.
    pub relay_malfunction: bool,
    pub config_mismatch: bool,
    pub rx_checks_invalid: bool,
    /// Current run of consecutive refused-control cycles.
    pub refused_streak: u32,
}

#[derive(Debug, Clone)]
pub struct SafetyCrossCheck {
    grace_cycles: u64,
    mismatch_limit: u32,
    refused_streak: u32,
    /// Refused-control cycles over the whole process lifetime.
    refused_total: u64,
    in_episode: bool,
    episodes: u64,
}

impl SafetyCrossCheck {
    pub fn new(grace_cycles: u64, mismatch_limit: u32) -> Self {
        Self {
            grace_cycles,
            mismatch_limit,
            refused_streak: 0,
            refused_total: 0,
            in_episode: false,
            episodes: 0,
        }
    }

    /// Mismatch episodes raised so far.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn refused_total(&self) -> u64 {
        self.refused_total
    }

    fn unit_config_matches(
        unit: &SafetyUnitState,
        expected: Option<&SafetyConfig>,
        alternative_experience: u32,
    ) -> bool {
        match expected {
            Some(cfg) => {
                unit.safety_model == cfg.safety_model
                    && unit.safety_param == cfg.safety_param
                    && unit.alternative_experience == alternative_experience
            }
            None => unit.safety_model.is_inert(),
        }
    }

    pub fn update(&mut self, input: &CrossCheckInput<'_>) -> CrossCheckReport {
        let mut config_mismatch = false;
        let mut rx_checks_invalid = false;
        let mut relay_malfunction = false;
        let mut refused = false;

        for (i, unit) in input.units.iter().enumerate() {
            if !Self::unit_config_matches(unit, input.expected.get(i), input.alternative_experience) {
                config_mismatch = true;
            }
            rx_checks_invalid |= unit.rx_checks_invalid;
            relay_malfunction |= unit.faults.contains(&SafetyFault::RelayMalfunction);
            if input.enabled && !unit.safety_model.is_inert() && !unit.controls_allowed {
                refused = true;
            }
        }

        if refused {
            self.refused_streak = self.refused_streak.saturating_add(1);
            self.refused_total = self.refused_total.saturating_add(1);
        } else {
            self.refused_streak = 0;
        }

        let past_grace = input.cycle > self.grace_cycles;
        let mismatch = (config_mismatch && past_grace)
            || rx_checks_invalid
            || self.refused_streak >= self.mismatch_limit;

        let raise_mismatch = mismatch && !self.in_episode;
        if raise_mismatch {
            self.episodes += 1;
            error!(
                config_mismatch,
                rx_checks_invalid,
                refused_streak = self.refused_streak,
                "safety unit disagrees with control plane"
            );
        } else if self.in_episode && !mismatch {
            warn!("safety unit mismatch cleared");
        }
        self.in_episode = mismatch;

        CrossCheckReport {
            raise_mismatch,
            relay_malfunction,
            config_mismatch,
            rx_checks_invalid,
            refused_streak: self.refused_streak,
        }
    }
}
