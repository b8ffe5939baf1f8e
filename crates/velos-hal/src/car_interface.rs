//! Generic `CarInterface` trait for per-vehicle decode and encode.
//!
//! An implementation owns one vehicle's signal tables. The coordinator hands
//! it every received batch of frames and every control decision, and only
//! ever sees the normalized [`VehicleState`] and [`Actuators`] it returns.

use velos_types::{Actuators, CanFrame, CarControl, VehicleParams, VehicleState, VelosError};

/// Default longitudinal limits (m/s^2) when an interface has no tuning.
pub const DEFAULT_ACCEL_LIMITS: (f32, f32) = (-3.5, 2.0);

/// Per-vehicle decode and command encoding.
pub trait CarInterface: Send {
    /// Identity and capabilities of the vehicle this interface drives.
    fn params(&self) -> &VehicleParams;

    /// Mutable identity, adjusted once during cold start.
    fn params_mut(&mut self) -> &mut VehicleParams;

    /// The interface can command actuators (not just observe).
    fn has_controller(&self) -> bool;

    /// Decode one batch of frames into vehicle state. Conditions the
    /// interface detects itself are returned in [`VehicleState::events`].
    ///
    /// # Errors
    ///
    /// Returns [`VelosError::CarInterface`] when the batch cannot be decoded
    /// at all. A single malformed frame is skipped rather than reported.
    fn decode(&mut self, frames: &[CanFrame]) -> Result<VehicleState, VelosError>;

    /// One-time setup before the first command is sent.
    ///
    /// # Errors
    ///
    /// Returns [`VelosError::CarInterface`] when the vehicle rejects setup.
    fn init(&mut self) -> Result<(), VelosError>;

    /// Encode `control` into frames. Returns the actuator values actually
    /// sent, after any vehicle-side limiting.
    ///
    /// # Errors
    ///
    /// Returns [`VelosError::CarInterface`] when the command cannot be encoded.
    fn apply(
        &mut self,
        control: &CarControl,
        now_ns: u64,
    ) -> Result<(Actuators, Vec<CanFrame>), VelosError>;

    /// Longitudinal acceleration bounds `(min, max)` for the current speed.
    fn accel_limits(&self, _v_ego: f32, _v_cruise: f32) -> (f32, f32) {
        DEFAULT_ACCEL_LIMITS
    }
}
