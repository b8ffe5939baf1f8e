//! `velos-runtime` – the fixed-rate control loop and everything around it.
//!
//! # Modules
//!
//! - [`coordinator`] – [`CycleCoordinator`][coordinator::CycleCoordinator]:
//!   one 100 Hz cycle from bus frames to published commands. It merges the
//!   car interface's conditions with its own cross-cutting checks (topic
//!   staleness, safety-unit mismatch, process liveness, device health),
//!   steps the [`EngagementStateMachine`][velos_kernel::EngagementStateMachine],
//!   selects the alert on screen and hands the control decision to the
//!   plugged-in [`ControlLaw`][velos_hal::ControlLaw].
//! - [`cold_start`] – [`cold_start`][cold_start::cold_start]: waits for the
//!   first bus traffic, resolves the car interface and persists the result
//!   so downstream stages can proceed.
//! - [`rate_keeper`] – [`RateKeeper`][rate_keeper::RateKeeper]: monotonic
//!   cycle pacing with lag detection.
//! - [`toggles`] – [`LiveToggles`][toggles::LiveToggles]: slow-changing
//!   settings polled from the store at 10 Hz on a background thread.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.
//!
//! # Failure policy
//!
//! [`CycleCoordinator::step`][coordinator::CycleCoordinator::step] returns an
//! error only for faults it cannot classify. The daemon treats any such
//! error as fatal and exits; a supervisor restarts the process.

pub mod cold_start;
pub mod coordinator;
pub mod rate_keeper;
pub mod telemetry;
pub mod toggles;

pub use cold_start::{ColdStart, ColdStartInputs, cold_start};
pub use coordinator::{CoordinatorConfig, CycleCoordinator};
pub use rate_keeper::RateKeeper;
pub use toggles::{LiveToggles, PollerHandle, spawn_poller};
