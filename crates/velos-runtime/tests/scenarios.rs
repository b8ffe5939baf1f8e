//! End-to-end cycles through a full `CycleCoordinator` driving the mock car.

use std::sync::Arc;
use std::time::Duration;

use velos_hal::mock::{MockCarInterface, condition_frame, cruise_frame, speed_frame};
use velos_hal::{ControlInput, ControlLaw, NeutralControlLaw};
use velos_middleware::{MessageBus, Payload, Topic};
use velos_params::{ParamStore, keys};
use velos_runtime::{CoordinatorConfig, CycleCoordinator, LiveToggles};
use velos_types::{
    Actuators, CanFrame, ConditionId, DeviceState, EngagementState, HardwareType, PeripheralState, ProcessState,
    SafetyModel, SafetyUnitState, ThermalStatus,
};

const TICK: Duration = Duration::from_millis(10);

struct Harness {
    coordinator: CycleCoordinator,
    bus: MessageBus,
    store: ParamStore,
}

impl Harness {
    fn new(config: CoordinatorConfig) -> Self {
        Self::with_law(config, Box::new(NeutralControlLaw::new()))
    }

    fn with_law(config: CoordinatorConfig, law: Box<dyn ControlLaw>) -> Self {
        let bus = MessageBus::default();
        let store = ParamStore::open_in_memory().unwrap();
        let coordinator = CycleCoordinator::new(
            config,
            bus.clone(),
            store.clone(),
            Arc::new(LiveToggles::new()),
            Box::new(MockCarInterface::testbench()),
            law,
        )
        .unwrap();
        Self { coordinator, bus, store }
    }

    /// One cycle with `frames` on the bus, one tick after the last.
    async fn cycle(&mut self, frames: Vec<CanFrame>) {
        tokio::time::advance(TICK).await;
        self.bus.publish_payload(Topic::Can, Payload::Can(frames), true, 0);
        self.coordinator.step().await.unwrap();
    }

    /// One cycle whose bus batch arrives flagged invalid.
    async fn invalid_cycle(&mut self, frames: Vec<CanFrame>) {
        tokio::time::advance(TICK).await;
        self.bus.publish_payload(Topic::Can, Payload::Can(frames), false, 0);
        self.coordinator.step().await.unwrap();
    }

    /// One paced cycle; `late_by` is how long the cycle body overran.
    async fn paced_cycle(&mut self, frames: Vec<CanFrame>, late_by: Duration) -> bool {
        tokio::time::advance(late_by).await;
        self.bus.publish_payload(Topic::Can, Payload::Can(frames), true, 0);
        self.coordinator.tick().await.unwrap()
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        self.bus.publish_payload(topic, payload, true, 0);
    }

    /// One cycle in which nothing arrives on the bus.
    async fn silent_cycle(&mut self) {
        self.coordinator.step().await.unwrap();
    }

    async fn moving(&mut self) {
        self.cycle(vec![speed_frame(15.0)]).await;
    }

    async fn with_condition(&mut self, id: ConditionId) {
        self.cycle(vec![speed_frame(15.0), condition_frame(&[id])]).await;
    }

    async fn engage(&mut self) {
        self.with_condition(ConditionId::ButtonEnable).await;
        assert_eq!(self.coordinator.state(), EngagementState::Enabled);
    }
}

fn unmonitored() -> CoordinatorConfig {
    CoordinatorConfig {
        monitored: Vec::new(),
        ..CoordinatorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn enable_from_disabled() {
    let mut h = Harness::new(unmonitored());
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);

    h.with_condition(ConditionId::ButtonEnable).await;
    assert_eq!(h.coordinator.state(), EngagementState::Enabled);
    assert!(h.coordinator.enabled());
    assert!(h.coordinator.active());
    assert!(h.coordinator.last_control().lat_active);
    assert!(h.coordinator.last_control().long_active);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !h.store.get_bool(keys::CONTROLS_READY).unwrap()
        && std::time::Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(h.store.get_bool(keys::CONTROLS_READY).unwrap());
}

#[tokio::test(start_paused = true)]
async fn soft_disable_recovers_before_expiry() {
    let mut h = Harness::new(CoordinatorConfig {
        soft_disable: Duration::from_millis(500),
        ..unmonitored()
    });
    h.engage().await;

    for _ in 0..3 {
        h.with_condition(ConditionId::CommIssue).await;
        assert_eq!(h.coordinator.state(), EngagementState::SoftDisabling);
        assert!(h.coordinator.active());
    }
    h.moving().await;
    assert_eq!(h.coordinator.state(), EngagementState::Enabled);
}

#[tokio::test(start_paused = true)]
async fn soft_disable_expires_to_disabled() {
    let mut h = Harness::new(CoordinatorConfig {
        soft_disable: Duration::from_millis(500),
        ..unmonitored()
    });
    h.engage().await;

    for _ in 0..60 {
        h.with_condition(ConditionId::CommIssue).await;
    }
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
    assert!(!h.coordinator.enabled());
}

#[tokio::test(start_paused = true)]
async fn immediate_disable_acts_on_the_same_cycle() {
    let mut h = Harness::new(unmonitored());
    h.engage().await;
    h.with_condition(ConditionId::RelayMalfunction).await;
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
    assert!(!h.coordinator.last_control().lat_active);
}

#[tokio::test(start_paused = true)]
async fn no_entry_blocks_engagement() {
    let mut h = Harness::new(unmonitored());
    h.cycle(vec![speed_frame(15.0), condition_frame(&[ConditionId::ButtonEnable, ConditionId::DoorOpen])])
        .await;
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
    let alert = h.coordinator.current_alert().unwrap();
    assert_eq!(alert.alert.label, "doorOpen/noEntry");
}

#[tokio::test(start_paused = true)]
async fn refused_control_raises_one_mismatch_per_episode() {
    let mut h = Harness::new(unmonitored());
    let refusing = vec![SafetyUnitState {
        safety_model: SafetyModel::AllOutput,
        controls_allowed: false,
        ..SafetyUnitState::default()
    }];
    h.bus.publish_payload(Topic::PandaStates, Payload::PandaStates(refusing), true, 0);
    h.engage().await;

    for _ in 0..199 {
        h.moving().await;
    }
    assert_eq!(h.coordinator.cross_check().episodes(), 0);
    assert_eq!(h.coordinator.state(), EngagementState::Enabled);

    h.moving().await;
    assert_eq!(h.coordinator.cross_check().episodes(), 1);
    assert!(h.coordinator.events().contains_id(ConditionId::ControlsMismatch));
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);

    for _ in 0..300 {
        h.moving().await;
    }
    assert_eq!(h.coordinator.cross_check().episodes(), 1);
    assert!(h.coordinator.events().contains_id(ConditionId::ControlsMismatch));

    h.with_condition(ConditionId::ButtonEnable).await;
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn can_timeouts_accumulate_across_recovery() {
    let mut h = Harness::new(unmonitored());
    h.engage().await;
    h.moving().await;

    for expected in 1..=6 {
        h.silent_cycle().await;
        assert_eq!(h.coordinator.can_timeout_counter(), expected);
    }
    assert_eq!(h.coordinator.vehicle_state().can_error_counter, 6);
    assert!(!h.coordinator.events().contains_id(ConditionId::CanBusMissing));
    assert_eq!(h.coordinator.state(), EngagementState::Enabled);

    for _ in 0..20 {
        h.moving().await;
    }
    assert_eq!(h.coordinator.can_timeout_counter(), 6);

    for _ in 0..4 {
        h.silent_cycle().await;
    }
    assert_eq!(h.coordinator.can_timeout_counter(), 10);
}

#[tokio::test(start_paused = true)]
async fn missing_bus_escalates_to_disengagement() {
    let mut h = Harness::new(unmonitored());
    h.engage().await;
    for _ in 0..10 {
        h.silent_cycle().await;
    }
    assert!(h.coordinator.events().contains_id(ConditionId::CanBusMissing));
    assert!(!h.coordinator.vehicle_state().can_valid);
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
}

struct NanLaw;

impl ControlLaw for NanLaw {
    fn update(&mut self, _input: &ControlInput<'_>) -> Actuators {
        Actuators {
            accel: f32::NAN,
            steer: f32::INFINITY,
            ..Actuators::neutral()
        }
    }

    fn reset(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn non_finite_actuators_never_reach_the_car() {
    let mut h = Harness::with_law(unmonitored(), Box::new(NanLaw));
    let mut sendcan = h.bus.subscribe(Topic::SendCan);
    h.engage().await;
    h.moving().await;

    let sent = h.coordinator.last_control().actuators;
    assert_eq!(sent.accel, 0.0);
    assert_eq!(sent.steer, 0.0);
    assert!(h.coordinator.last_output().accel.is_finite());
    assert_eq!(sendcan.drain().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_topic_raises_comm_issue() {
    let mut h = Harness::new(CoordinatorConfig {
        monitored: vec![Topic::DeviceState],
        init_timeout: Duration::from_millis(50),
        ..CoordinatorConfig::default()
    });
    for _ in 0..4 {
        h.moving().await;
    }
    assert!(!h.coordinator.initialized());
    assert!(h.coordinator.events().contains_id(ConditionId::ControlsInitializing));

    h.moving().await;
    h.moving().await;
    assert!(h.coordinator.initialized());
    assert!(h.coordinator.events().contains_id(ConditionId::CommIssue));
    assert!(!h.coordinator.events().contains_id(ConditionId::CommIssueAvgFreq));
}

#[tokio::test(start_paused = true)]
async fn wrong_rate_raises_avg_freq_issue() {
    let mut h = Harness::new(CoordinatorConfig {
        monitored: vec![Topic::DeviceState],
        init_timeout: Duration::from_millis(50),
        ..CoordinatorConfig::default()
    });
    // Published every cycle, far above its nominal 2 Hz.
    for _ in 0..10 {
        h.bus.publish_payload(Topic::DeviceState, Payload::DeviceState(healthy_device()), true, 0);
        h.moving().await;
    }
    assert!(h.coordinator.events().contains_id(ConditionId::CommIssueAvgFreq));
    assert!(!h.coordinator.events().contains_id(ConditionId::CommIssue));
}

fn healthy_device() -> DeviceState {
    DeviceState {
        free_space_percent: 50.0,
        memory_usage_percent: 30,
        sound_available: true,
        ..DeviceState::default()
    }
}

#[tokio::test(start_paused = true)]
async fn event_log_is_republished_on_change() {
    let mut h = Harness::new(unmonitored());
    let mut log = h.bus.subscribe(Topic::OnroadEvents);

    h.moving().await;
    let first = log.drain();
    assert_eq!(first.len(), 1);
    h.moving().await;
    assert_eq!(log.drain().len(), 1, "startup event dropped out");
    h.moving().await;
    assert!(log.drain().is_empty());

    h.with_condition(ConditionId::DoorOpen).await;
    let changed = log.drain();
    assert_eq!(changed.len(), 1);
    match &changed[0].payload {
        Payload::OnroadEvents(records) => {
            assert!(records.iter().any(|r| r.name == ConditionId::DoorOpen));
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_bus_batches_raise_can_error() {
    let mut h = Harness::new(unmonitored());
    let mut car_state = h.bus.subscribe(Topic::CarState);
    h.moving().await;
    assert!(h.coordinator.initialized());
    car_state.drain();

    for _ in 0..3 {
        h.invalid_cycle(vec![speed_frame(15.0), condition_frame(&[ConditionId::ButtonEnable])]).await;
        assert!(h.coordinator.events().contains_id(ConditionId::CanError));
        assert!(!h.coordinator.events().contains_id(ConditionId::CanBusMissing));
        assert_eq!(h.coordinator.state(), EngagementState::Disabled);
    }
    assert!(!h.coordinator.vehicle_state().can_valid);
    assert_eq!(h.coordinator.can_timeout_counter(), 0);
    assert!(car_state.drain().iter().all(|m| !m.valid));

    h.moving().await;
    assert!(h.coordinator.vehicle_state().can_valid);
    assert!(!h.coordinator.events().contains_id(ConditionId::CanError));
}

#[tokio::test(start_paused = true)]
async fn invalid_bus_batch_disengages_immediately() {
    let mut h = Harness::new(unmonitored());
    h.engage().await;
    h.invalid_cycle(vec![speed_frame(15.0)]).await;
    assert!(h.coordinator.events().contains_id(ConditionId::CanError));
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
    assert!(!h.coordinator.last_control().lat_active);
}

#[tokio::test(start_paused = true)]
async fn stopped_process_blocks_engagement() {
    let mut h = Harness::new(unmonitored());
    h.moving().await;

    let down = |name: &str| ProcessState {
        name: name.to_string(),
        running: false,
        should_be_running: true,
    };
    h.publish(Topic::ManagerState, Payload::ManagerState(vec![down("loggerd")]));
    h.moving().await;
    assert!(!h.coordinator.events().contains_id(ConditionId::ProcessNotRunning));

    h.publish(Topic::ManagerState, Payload::ManagerState(vec![down("loggerd"), down("plannerd")]));
    h.with_condition(ConditionId::ButtonEnable).await;
    assert!(h.coordinator.events().contains_id(ConditionId::ProcessNotRunning));
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_raise_controlsd_lagging() {
    let mut h = Harness::new(unmonitored());
    h.paced_cycle(vec![speed_frame(15.0), condition_frame(&[ConditionId::ButtonEnable])], Duration::ZERO)
        .await;
    for _ in 0..3 {
        assert!(!h.paced_cycle(vec![speed_frame(15.0)], Duration::ZERO).await);
    }
    assert_eq!(h.coordinator.state(), EngagementState::Enabled);
    assert!(!h.coordinator.events().contains_id(ConditionId::ControlsdLagging));

    let mut late = 0;
    for _ in 0..10 {
        if h.paced_cycle(vec![speed_frame(15.0)], Duration::from_millis(20)).await {
            late += 1;
        }
    }
    assert!(late > 0);
    assert!(h.coordinator.events().contains_id(ConditionId::ControlsdLagging));
    assert!(h.coordinator.vehicle_state().cum_lag_ms > 0.0);
    assert_eq!(h.coordinator.state(), EngagementState::SoftDisabling);
}

#[tokio::test(start_paused = true)]
async fn safety_config_mismatch_waits_out_the_grace_window() {
    let mut h = Harness::new(CoordinatorConfig {
        mismatch_grace: Duration::from_millis(50),
        ..unmonitored()
    });
    let misconfigured = vec![SafetyUnitState {
        safety_model: SafetyModel::AllOutput,
        safety_param: 7,
        controls_allowed: true,
        ..SafetyUnitState::default()
    }];
    h.publish(Topic::PandaStates, Payload::PandaStates(misconfigured));
    h.engage().await;

    for _ in 0..4 {
        h.moving().await;
        assert!(!h.coordinator.events().contains_id(ConditionId::ControlsMismatch));
        assert_eq!(h.coordinator.state(), EngagementState::Enabled);
    }
    h.moving().await;
    assert_eq!(h.coordinator.cross_check().episodes(), 1);
    assert!(h.coordinator.events().contains_id(ConditionId::ControlsMismatch));
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn overheating_soft_disables() {
    let mut h = Harness::new(unmonitored());
    h.engage().await;
    h.publish(
        Topic::DeviceState,
        Payload::DeviceState(DeviceState {
            thermal_status: ThermalStatus::Red,
            ..healthy_device()
        }),
    );
    h.moving().await;
    assert!(h.coordinator.events().contains_id(ConditionId::Overheat));
    assert_eq!(h.coordinator.state(), EngagementState::SoftDisabling);
}

#[tokio::test(start_paused = true)]
async fn full_disk_blocks_engagement() {
    let mut h = Harness::new(unmonitored());
    h.publish(
        Topic::DeviceState,
        Payload::DeviceState(DeviceState {
            free_space_percent: 3.0,
            ..healthy_device()
        }),
    );
    h.with_condition(ConditionId::ButtonEnable).await;
    assert!(h.coordinator.events().contains_id(ConditionId::OutOfSpace));
    assert!(!h.coordinator.events().contains_id(ConditionId::Overheat));
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn stalled_fan_is_reported_after_its_grace() {
    let mut h = Harness::new(CoordinatorConfig {
        fan_grace: Duration::from_millis(50),
        ..unmonitored()
    });
    let fan = |rpm| {
        Payload::PeripheralState(PeripheralState {
            hardware_type: HardwareType::Tres,
            fan_speed_rpm: rpm,
            voltage_mv: 12_000,
        })
    };
    h.publish(
        Topic::DeviceState,
        Payload::DeviceState(DeviceState {
            fan_speed_percent_desired: 80,
            ..healthy_device()
        }),
    );
    h.publish(Topic::PeripheralState, fan(2000));
    for _ in 0..10 {
        h.moving().await;
    }
    assert!(!h.coordinator.events().contains_id(ConditionId::FanMalfunction));

    h.publish(Topic::PeripheralState, fan(0));
    for _ in 0..5 {
        h.moving().await;
        assert!(!h.coordinator.events().contains_id(ConditionId::FanMalfunction));
    }
    h.moving().await;
    assert!(h.coordinator.events().contains_id(ConditionId::FanMalfunction));
}

#[tokio::test(start_paused = true)]
async fn cruise_engaged_without_us_raises_mismatch() {
    let mut h = Harness::new(CoordinatorConfig {
        cruise_mismatch_after: Duration::from_millis(50),
        ..unmonitored()
    });
    h.cycle(vec![
        speed_frame(15.0),
        cruise_frame(true, true),
        condition_frame(&[ConditionId::DoorOpen]),
    ])
    .await;
    assert_eq!(h.coordinator.state(), EngagementState::Disabled);

    for _ in 0..4 {
        h.cycle(vec![speed_frame(15.0), cruise_frame(true, true)]).await;
        assert!(!h.coordinator.events().contains_id(ConditionId::CruiseMismatch));
    }
    h.cycle(vec![speed_frame(15.0), cruise_frame(true, true)]).await;
    assert!(h.coordinator.events().contains_id(ConditionId::CruiseMismatch));

    h.cycle(vec![speed_frame(15.0), cruise_frame(true, false)]).await;
    assert!(!h.coordinator.events().contains_id(ConditionId::CruiseMismatch));
}

#[tokio::test(start_paused = true)]
async fn specific_fault_suppresses_comm_issue() {
    let config = || CoordinatorConfig {
        monitored: vec![Topic::DeviceState, Topic::PandaStates],
        init_timeout: Duration::from_millis(50),
        ..CoordinatorConfig::default()
    };
    let units = || {
        Payload::PandaStates(vec![SafetyUnitState {
            safety_model: SafetyModel::AllOutput,
            controls_allowed: true,
            ..SafetyUnitState::default()
        }])
    };

    let mut faulted = Harness::new(config());
    faulted.bus.publish_payload(Topic::PandaStates, units(), false, 0);
    for _ in 0..6 {
        faulted.moving().await;
    }
    assert!(faulted.coordinator.initialized());
    assert!(faulted.coordinator.events().contains_id(ConditionId::UsbError));
    assert!(!faulted.coordinator.events().contains_id(ConditionId::CommIssue));
    assert!(!faulted.coordinator.events().contains_id(ConditionId::CommIssueAvgFreq));

    let mut plain = Harness::new(config());
    plain.publish(Topic::PandaStates, units());
    for _ in 0..6 {
        plain.moving().await;
    }
    assert!(!plain.coordinator.events().contains_id(ConditionId::UsbError));
    assert!(plain.coordinator.events().contains_id(ConditionId::CommIssue));
}
