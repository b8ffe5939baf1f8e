//! In-process vehicle for simulation and CI without a real car.
//!
//! [`MockCarInterface`] understands a deliberately tiny frame layout so that
//! tests and the simulation feeder can drive the whole control plane by
//! publishing a handful of frames:
//!
//! | address | payload |
//! |---------|---------|
//! | `0x1A0` | speed, `u16` little-endian, cm/s |
//! | `0x1B0` | driver input bits, see [`buttons`] |
//! | `0x1C0` | cruise bits: `0` available, `1` engaged |
//! | `0x7E0` | each byte is a condition index to raise this cycle |
//!
//! Commands come back as one steering frame (`0x2E4`) and, when a cruise
//! button press is requested, one cruise frame (`0x2E8`).
//!
//! # Example
//!
//! ```rust
//! use velos_hal::{CarInterface, MockCarInterface};
//! use velos_hal::mock::{buttons, buttons_frame, speed_frame};
//!
//! let mut car = MockCarInterface::testbench();
//! let state = car
//!     .decode(&[speed_frame(12.5), buttons_frame(buttons::DOOR)])
//!     .expect("mock decode never fails");
//!
//! assert!((state.v_ego - 12.5).abs() < 0.01);
//! assert!(state.door_open);
//! ```

use tracing::debug;
use velos_types::{
    Actuators, ButtonEvent, ButtonKind, CanFrame, CarControl, ConditionId, Gear, SafetyConfig,
    SafetyModel, VehicleParams, VehicleState, VelosError,
};

use crate::car_interface::CarInterface;

pub const SPEED_ADDR: u32 = 0x1A0;
pub const BUTTONS_ADDR: u32 = 0x1B0;
pub const CRUISE_ADDR: u32 = 0x1C0;
pub const CONDITION_ADDR: u32 = 0x7E0;
pub const STEER_COMMAND_ADDR: u32 = 0x2E4;
pub const CRUISE_COMMAND_ADDR: u32 = 0x2E8;

/// Addresses a testbench vehicle broadcasts.
pub const TESTBENCH_FINGERPRINT: &[u32] = &[SPEED_ADDR, BUTTONS_ADDR, CRUISE_ADDR, CONDITION_ADDR];
pub const TESTBENCH_CAR_NAME: &str = "testbench";

/// Full-scale steering torque in frame units.
const STEER_SCALE: f32 = 1500.0;

/// Bits of the driver input frame.
pub mod buttons {
    pub const ENABLE: u8 = 1;
    pub const CANCEL: u8 = 1 << 1;
    pub const GAS: u8 = 1 << 2;
    pub const BRAKE: u8 = 1 << 3;
    pub const DOOR: u8 = 1 << 4;
    pub const SEATBELT: u8 = 1 << 5;
    pub const GAP_ADJUST: u8 = 1 << 6;
}

// ────────────────────────────────────────────────────────────────────────────
// Frame builders
// ────────────────────────────────────────────────────────────────────────────

pub fn speed_frame(v_ego: f32) -> CanFrame {
    let cms = (v_ego * 100.0).round().clamp(0.0, f32::from(u16::MAX)) as u16;
    CanFrame::new(SPEED_ADDR, cms.to_le_bytes().to_vec(), 0)
}

pub fn buttons_frame(bits: u8) -> CanFrame {
    CanFrame::new(BUTTONS_ADDR, vec![bits], 0)
}

pub fn cruise_frame(available: bool, engaged: bool) -> CanFrame {
    CanFrame::new(CRUISE_ADDR, vec![u8::from(available) | (u8::from(engaged) << 1)], 0)
}

/// Raise `conditions` for the cycle this frame is decoded in.
pub fn condition_frame(conditions: &[ConditionId]) -> CanFrame {
    let data = conditions
        .iter()
        .filter_map(|id| u8::try_from(id.index()).ok())
        .collect::<Vec<u8>>();
    CanFrame::new(CONDITION_ADDR, data, 0)
}

// ────────────────────────────────────────────────────────────────────────────
// MockCarInterface
// ────────────────────────────────────────────────────────────────────────────

pub struct MockCarInterface {
    params: VehicleParams,
    controller: bool,
    /// Signals persist between batches; a batch only updates what it carries.
    state: VehicleState,
    buttons: u8,
    cruise_seen: bool,
    initialized: bool,
    frames_sent: u64,
}

impl MockCarInterface {
    pub fn new(params: VehicleParams, controller: bool) -> Self {
        Self {
            params,
            controller,
            state: VehicleState {
                gear: Gear::Drive,
                can_valid: true,
                ..VehicleState::default()
            },
            buttons: 0,
            cruise_seen: false,
            initialized: false,
            frames_sent: 0,
        }
    }

    /// Identity of the testbench vehicle.
    pub fn testbench_params() -> VehicleParams {
        VehicleParams {
            car_name: TESTBENCH_CAR_NAME.to_string(),
            car_fingerprint: TESTBENCH_CAR_NAME.to_string(),
            pcm_cruise: true,
            longitudinal_control: true,
            safety_configs: vec![SafetyConfig {
                safety_model: SafetyModel::AllOutput,
                safety_param: 0,
            }],
            ..VehicleParams::default()
        }
    }

    /// A recognized, controllable vehicle.
    pub fn testbench() -> Self {
        Self::new(Self::testbench_params(), true)
    }

    /// Stand-in for a vehicle nobody recognized: observe only.
    pub fn unrecognized() -> Self {
        Self::new(VehicleParams::default(), false)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn pressed(&self, bit: u8) -> bool {
        self.buttons & bit != 0
    }
}

impl CarInterface for MockCarInterface {
    fn params(&self) -> &VehicleParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut VehicleParams {
        &mut self.params
    }

    fn has_controller(&self) -> bool {
        self.controller
    }

    fn decode(&mut self, frames: &[CanFrame]) -> Result<VehicleState, VelosError> {
        let prev_buttons = self.buttons;
        let prev_brake = self.state.brake_pressed;
        let prev_cruise = self.state.cruise.enabled;
        let mut events = Vec::new();

        for frame in frames {
            if !frame.is_well_formed() {
                debug!(address = frame.address, len = frame.data.len(), "dropping malformed frame");
                continue;
            }
            match (frame.address, frame.data.as_slice()) {
                (SPEED_ADDR, [lo, hi, ..]) => {
                    self.state.v_ego = f32::from(u16::from_le_bytes([*lo, *hi])) / 100.0;
                }
                (BUTTONS_ADDR, [bits, ..]) => self.buttons = *bits,
                (CRUISE_ADDR, [bits, ..]) => {
                    self.cruise_seen = true;
                    self.state.cruise.available = bits & 1 != 0;
                    self.state.cruise.enabled = bits & 2 != 0;
                }
                (CONDITION_ADDR, data) => {
                    events.extend(data.iter().filter_map(|i| ConditionId::from_index(usize::from(*i))));
                }
                _ => {}
            }
        }

        let standstill = self.state.v_ego < 0.01;
        self.state.standstill = standstill;
        self.state.cruise.standstill = standstill && self.state.cruise.enabled;
        self.state.gas_pressed = self.pressed(buttons::GAS);
        self.state.brake_pressed = self.pressed(buttons::BRAKE);
        self.state.door_open = self.pressed(buttons::DOOR);
        self.state.seatbelt_unlatched = self.pressed(buttons::SEATBELT);
        self.state.can_valid = true;

        self.state.button_events.clear();
        for (bit, kind) in [
            (buttons::ENABLE, ButtonKind::SetCruise),
            (buttons::CANCEL, ButtonKind::Cancel),
            (buttons::GAP_ADJUST, ButtonKind::GapAdjustCruise),
        ] {
            if (prev_buttons ^ self.buttons) & bit != 0 {
                self.state.button_events.push(ButtonEvent { kind, pressed: self.pressed(bit) });
            }
        }

        if self.state.door_open {
            events.push(ConditionId::DoorOpen);
        }
        if self.state.seatbelt_unlatched {
            events.push(ConditionId::SeatbeltNotLatched);
        }
        if self.cruise_seen && !self.state.cruise.available {
            events.push(ConditionId::WrongCarMode);
        }
        if self.state.brake_pressed && (!prev_brake || !standstill) {
            events.push(ConditionId::PedalPressed);
        }
        if self.state.v_ego < self.params.min_enable_speed {
            events.push(ConditionId::BelowEngageSpeed);
        }

        for event in &self.state.button_events {
            match (event.kind, event.pressed) {
                (ButtonKind::Cancel, true) => events.push(ConditionId::ButtonCancel),
                (ButtonKind::SetCruise, false) if !self.params.pcm_cruise => {
                    events.push(ConditionId::ButtonEnable);
                }
                _ => {}
            }
        }
        if self.params.pcm_cruise {
            match (prev_cruise, self.state.cruise.enabled) {
                (false, true) => events.push(ConditionId::PcmEnable),
                (true, false) => events.push(ConditionId::PcmDisable),
                _ => {}
            }
        }

        self.state.events = events;
        Ok(self.state.clone())
    }

    fn init(&mut self) -> Result<(), VelosError> {
        self.initialized = true;
        Ok(())
    }

    fn apply(
        &mut self,
        control: &CarControl,
        _now_ns: u64,
    ) -> Result<(Actuators, Vec<CanFrame>), VelosError> {
        if !self.initialized {
            return Err(VelosError::CarInterface("command before init".to_string()));
        }

        let mut sent = control.actuators;
        if !control.lat_active {
            sent.steer = 0.0;
            sent.steering_angle_deg = 0.0;
        }
        if !control.long_active {
            sent.accel = 0.0;
        }

        let torque = (sent.steer.clamp(-1.0, 1.0) * STEER_SCALE).round() as i16;
        let mut steer = torque.to_le_bytes().to_vec();
        steer.push(u8::from(control.lat_active));
        steer.push((self.frames_sent % 16) as u8);
        let mut frames = vec![CanFrame::new(STEER_COMMAND_ADDR, steer, 0)];

        let cruise = control.cruise_control;
        if cruise.cancel || cruise.resume {
            let bits = u8::from(cruise.cancel) | (u8::from(cruise.resume) << 1);
            frames.push(CanFrame::new(CRUISE_COMMAND_ADDR, vec![bits], 0));
        }

        self.frames_sent += 1;
        Ok((sent, frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_persists_between_batches() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        car.decode(&[speed_frame(20.0)])?;
        let state = car.decode(&[buttons_frame(0)])?;
        assert!((state.v_ego - 20.0).abs() < 0.01);
        assert!(!state.standstill);
        Ok(())
    }

    #[test]
    fn malformed_frame_is_skipped() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        let bad = CanFrame::new(BUTTONS_ADDR, vec![buttons::DOOR; 65], 0);
        let state = car.decode(&[bad, speed_frame(3.0)])?;
        assert!(!state.door_open);
        assert!((state.v_ego - 3.0).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn cruise_edges_raise_pcm_events() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        assert!(car.decode(&[cruise_frame(true, false)])?.events.is_empty());
        let on = car.decode(&[cruise_frame(true, true)])?;
        assert_eq!(on.events, vec![ConditionId::PcmEnable]);
        assert!(car.decode(&[cruise_frame(true, true)])?.events.is_empty());
        let off = car.decode(&[cruise_frame(true, false)])?;
        assert_eq!(off.events, vec![ConditionId::PcmDisable]);
        Ok(())
    }

    #[test]
    fn button_enable_fires_on_release_without_pcm() -> Result<(), VelosError> {
        let mut params = MockCarInterface::testbench_params();
        params.pcm_cruise = false;
        let mut car = MockCarInterface::new(params, true);
        let press = car.decode(&[buttons_frame(buttons::ENABLE)])?;
        assert!(press.events.is_empty());
        assert_eq!(press.button_events, vec![ButtonEvent { kind: ButtonKind::SetCruise, pressed: true }]);
        let release = car.decode(&[buttons_frame(0)])?;
        assert_eq!(release.events, vec![ConditionId::ButtonEnable]);
        Ok(())
    }

    #[test]
    fn injected_conditions_are_reported_once() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        let state = car.decode(&[condition_frame(&[ConditionId::Overheat, ConditionId::Fcw])])?;
        assert_eq!(state.events, vec![ConditionId::Overheat, ConditionId::Fcw]);
        assert!(car.decode(&[speed_frame(1.0)])?.events.is_empty());
        Ok(())
    }

    #[test]
    fn unavailable_cruise_is_wrong_car_mode() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        assert!(car.decode(&[speed_frame(1.0)])?.events.is_empty());
        let state = car.decode(&[cruise_frame(false, false)])?;
        assert_eq!(state.events, vec![ConditionId::WrongCarMode]);
        Ok(())
    }

    #[test]
    fn apply_requires_init() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        assert!(car.apply(&CarControl::default(), 0).is_err());
        car.init()?;
        let control = CarControl {
            lat_active: true,
            actuators: Actuators { steer: 0.5, accel: 1.0, ..Actuators::neutral() },
            ..CarControl::default()
        };
        let (sent, frames) = car.apply(&control, 0)?;
        assert_eq!(sent.steer, 0.5);
        assert_eq!(sent.accel, 0.0);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address, STEER_COMMAND_ADDR);
        assert_eq!(i16::from_le_bytes([frames[0].data[0], frames[0].data[1]]), 750);
        Ok(())
    }

    #[test]
    fn cancel_request_emits_cruise_frame() -> Result<(), VelosError> {
        let mut car = MockCarInterface::testbench();
        car.init()?;
        let mut control = CarControl::default();
        control.cruise_control.cancel = true;
        let (_, frames) = car.apply(&control, 0)?;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], CanFrame::new(CRUISE_COMMAND_ADDR, vec![1], 0));
        Ok(())
    }
}
