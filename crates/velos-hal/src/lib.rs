//! `velos-hal` – Hardware Abstraction Layer
//!
//! The control plane never touches a specific vehicle. Everything
//! manufacturer-specific sits behind the traits in this crate, so decode
//! tables and control laws can be swapped without touching engagement logic.
//!
//! # Modules
//!
//! - [`car_interface`] – [`CarInterface`][car_interface::CarInterface]: decode
//!   bus frames into vehicle state and encode commands back into frames.
//! - [`control_law`] – [`ControlLaw`][control_law::ControlLaw]: turns the
//!   engagement decision into actuator targets.
//! - [`mock`] – [`MockCarInterface`][mock::MockCarInterface], a small frame
//!   layout used for simulation and tests.
//! - [`registry`] – [`InterfaceRegistry`][registry::InterfaceRegistry]:
//!   resolves which interface drives the connected vehicle.

pub mod car_interface;
pub mod control_law;
pub mod mock;
pub mod registry;

pub use car_interface::CarInterface;
pub use control_law::{ControlInput, ControlLaw, NeutralControlLaw};
pub use mock::MockCarInterface;
pub use registry::{InterfaceRegistry, Registration, Resolution, ResolutionSource};
