//! Topic lanes and the message envelope routed over them.
//!
//! | Topic | Direction | Typical rate |
//! |---|---|---|
//! | [`Topic::Can`] | vehicle bus -> coordinator | 100 Hz |
//! | [`Topic::SendCan`] | coordinator -> vehicle bus | 100 Hz |
//! | [`Topic::CarState`], [`Topic::CarControl`], [`Topic::CarOutput`], [`Topic::SelfdriveState`] | published each cycle | 100 Hz |
//! | [`Topic::OnroadEvents`] | event log | 1 Hz or on change |
//! | [`Topic::PandaStates`], [`Topic::PeripheralState`], [`Topic::DeviceState`], [`Topic::ManagerState`] | health reports | 2-10 Hz |
//! | upstream topics ([`Topic::ModelV2`], [`Topic::RadarState`], ...) | opaque JSON | 20 Hz |

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use velos_types::{
    Actuators, CalibrationReport, CanFrame, CarControl, DeviceState, EventRecord, PeripheralState,
    ProcessState, SafetyUnitState, SelfdriveState, VehicleParams, VehicleState,
};

/// Every routing lane on the [`crate::MessageBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    Can,
    SendCan,
    CarState,
    CarParams,
    CarControl,
    CarOutput,
    SelfdriveState,
    OnroadEvents,
    PandaStates,
    PeripheralState,
    DeviceState,
    ManagerState,
    LiveCalibration,
    ModelV2,
    RadarState,
    LongitudinalPlan,
    LivePose,
    DriverMonitoring,
    TestJoystick,
}

impl Topic {
    pub const ALL: [Topic; 19] = [
        Topic::Can,
        Topic::SendCan,
        Topic::CarState,
        Topic::CarParams,
        Topic::CarControl,
        Topic::CarOutput,
        Topic::SelfdriveState,
        Topic::OnroadEvents,
        Topic::PandaStates,
        Topic::PeripheralState,
        Topic::DeviceState,
        Topic::ManagerState,
        Topic::LiveCalibration,
        Topic::ModelV2,
        Topic::RadarState,
        Topic::LongitudinalPlan,
        Topic::LivePose,
        Topic::DriverMonitoring,
        Topic::TestJoystick,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Nominal publish rate in Hz; `0.0` for irregular topics.
    pub fn expected_frequency(self) -> f32 {
        match self {
            Topic::Can
            | Topic::SendCan
            | Topic::CarState
            | Topic::CarControl
            | Topic::CarOutput
            | Topic::SelfdriveState => 100.0,
            Topic::ModelV2
            | Topic::RadarState
            | Topic::LongitudinalPlan
            | Topic::LivePose
            | Topic::DriverMonitoring => 20.0,
            Topic::PandaStates => 10.0,
            Topic::LiveCalibration => 4.0,
            Topic::PeripheralState | Topic::DeviceState | Topic::ManagerState => 2.0,
            Topic::OnroadEvents => 1.0,
            Topic::CarParams => 0.02,
            Topic::TestJoystick => 0.0,
        }
    }
}

/// Message body. Upstream producers whose schema the control plane does not
/// own travel as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Payload {
    Can(Vec<CanFrame>),
    SendCan(Vec<CanFrame>),
    CarState(VehicleState),
    CarParams(VehicleParams),
    CarControl(CarControl),
    CarOutput(Actuators),
    SelfdriveState(SelfdriveState),
    OnroadEvents(Vec<EventRecord>),
    PandaStates(Vec<SafetyUnitState>),
    PeripheralState(PeripheralState),
    DeviceState(DeviceState),
    ManagerState(Vec<ProcessState>),
    LiveCalibration(CalibrationReport),
    Upstream(serde_json::Value),
}

/// Envelope for everything routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Monotonic publish time in nanoseconds.
    pub mono_time: u64,
    /// Producer's own judgement of whether the content is trustworthy.
    pub valid: bool,
    pub payload: Payload,
}

impl Message {
    pub fn new(payload: Payload, valid: bool, mono_time: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            mono_time,
            valid,
            payload,
        }
    }
}
