//! Generic `ControlLaw` trait for lateral and longitudinal control.
//!
//! Control-law math is outside the control plane. The coordinator only
//! decides *whether* lateral and longitudinal control are active and hands
//! the decision to whichever law is plugged in.

use velos_types::{Actuators, LongControlState, VehicleParams, VehicleState};

/// Everything a control law sees for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ControlInput<'a> {
    pub lat_active: bool,
    pub long_active: bool,
    pub state: &'a VehicleState,
    pub params: &'a VehicleParams,
    /// `(min, max)` m/s^2 from the car interface.
    pub accel_limits: (f32, f32),
    pub calibrated: bool,
}

pub trait ControlLaw: Send {
    /// Compute actuator targets for this cycle.
    fn update(&mut self, input: &ControlInput<'_>) -> Actuators;

    /// Drop any integrator state, e.g. after disengagement.
    fn reset(&mut self);
}

/// Holds the vehicle at its current speed with a straight wheel.
///
/// Useful wherever real control is not wanted: simulation, replay and tests.
#[derive(Debug, Default)]
pub struct NeutralControlLaw {
    was_long_active: bool,
}

impl NeutralControlLaw {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ControlLaw for NeutralControlLaw {
    fn update(&mut self, input: &ControlInput<'_>) -> Actuators {
        let long_control_state = match (input.long_active, self.was_long_active) {
            (false, _) => LongControlState::Off,
            (true, false) if input.state.standstill => LongControlState::Starting,
            (true, _) if input.state.standstill => LongControlState::Stopping,
            (true, _) => LongControlState::Pid,
        };
        self.was_long_active = input.long_active;

        let (min_accel, max_accel) = input.accel_limits;
        Actuators {
            accel: if input.long_active { 0.0_f32.clamp(min_accel, max_accel) } else { 0.0 },
            steering_angle_deg: if input.lat_active { input.state.steering_angle_deg } else { 0.0 },
            long_control_state,
            ..Actuators::neutral()
        }
    }

    fn reset(&mut self) {
        self.was_long_active = false;
    }
}
