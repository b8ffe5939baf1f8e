//! `velos-kernel` – Safety & Engagement
//!
//! Decides whether the system may act and keeps its outputs inside physical
//! bounds. Nothing here performs I/O; every decision is a pure function of
//! the inputs handed in by the cycle coordinator.
//!
//! # Modules
//!
//! - [`engagement`] – [`EngagementStateMachine`][engagement::EngagementStateMachine]:
//!   the four-state engagement machine and the alert categories each
//!   transition calls for.
//! - [`safety_check`] – [`SafetyCrossCheck`][safety_check::SafetyCrossCheck]:
//!   compares what the independent safety units report against what the
//!   control plane expects, and decides when a mismatch is an integrity fault.
//! - [`actuator_guard`] – [`ActuatorGuard`][actuator_guard::ActuatorGuard]:
//!   a rule engine that forces every actuator command back into a finite,
//!   bounded range before it reaches the vehicle.
//! - [`watchdog`] – [`ProcessWatchdog`][watchdog::ProcessWatchdog]:
//!   flags required processes that are not running.

pub mod actuator_guard;
pub mod engagement;
pub mod safety_check;
pub mod watchdog;

pub use actuator_guard::{ActuatorGuard, ActuatorRule, FiniteRule, RangeRule};
pub use engagement::{EngagementOutput, EngagementStateMachine};
pub use safety_check::{CrossCheckInput, CrossCheckReport, SafetyCrossCheck};
pub use watchdog::{ProcessHealth, ProcessWatchdog};
