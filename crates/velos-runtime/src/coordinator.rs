//! [`CycleCoordinator`] – one fixed-rate control cycle, end to end.
//!
//! Each call to [`CycleCoordinator::step`] runs, in order:
//!
//! 1. **Sample**: bounded-wait receive of one batch of bus frames, decoded
//!    by the car interface. The batch is only valid if every message in it
//!    was published valid. An empty batch bumps the cumulative CAN-timeout
//!    counter and reuses the previous vehicle state. Upstream topics are
//!    drained into the [`TopicMonitor`].
//! 2. **Events**: the car interface's conditions plus everything owned by
//!    the control plane: safety-unit cross-check, device health,
//!    calibration, process liveness, bus and topic staleness, cruise
//!    mismatch.
//! 3. **Engagement**: the [`EngagementStateMachine`] steps on the merged
//!    event set, unless the car is passive or the cycle is not initialized.
//! 4. **Alerts**: candidates for the relevant categories go through the
//!    [`AlertArbiter`].
//! 5. **Control**: lateral and longitudinal activity is decided here, the
//!    control law fills in the actuators and the [`ActuatorGuard`] bounds
//!    them before the car interface encodes them.
//! 6. **Publish**: vehicle state, command, engagement state and, on their
//!    own periods, the vehicle identity and the event log.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use velos_events::{ActiveAlert, AlertArbiter, AlertCatalog, AlertContext, EventSet};
use velos_hal::{CarInterface, ControlInput, ControlLaw};
use velos_kernel::{
    ActuatorGuard, CrossCheckInput, CrossCheckReport, EngagementStateMachine, ProcessHealth, ProcessWatchdog,
    SafetyCrossCheck,
};
use velos_middleware::{MessageBus, Payload, Topic, TopicMonitor, TopicReceiver};
use velos_params::{ParamStore, keys};
use velos_types::{
    Actuators, ButtonKind, CalibrationReport, CalibrationStatus, CarControl, ConditionId, CruiseControl,
    DeviceState, EffectCategory, EngagementState, HardwareType, HudControl, PeripheralState, SafetyUnitState,
    SelfdriveState, SignalSnapshot, ThermalStatus, VehicleState, VelosError, alternative_experience,
};

use crate::rate_keeper::RateKeeper;
use crate::toggles::LiveToggles;

/// Below this speed (m/s) lateral control is never active.
const MIN_LAT_SPEED: f32 = 0.3;
const KPH_TO_MS: f32 = 1.0 / 3.6;
const MIN_FREE_SPACE_PERCENT: f32 = 7.0;
const MAX_MEMORY_PERCENT: u8 = 90;
const MIN_FAN_RPM: u16 = 500;
const FAN_DESIRED_PERCENT: u8 = 50;
/// Planned speed (m/s) above which a cruise standstill is resumed.
const RESUME_SPEED: f64 = 0.1;

/// Every upstream topic a cycle reads.
pub const INPUT_TOPICS: [Topic; 11] = [
    Topic::DeviceState,
    Topic::PandaStates,
    Topic::PeripheralState,
    Topic::ManagerState,
    Topic::LiveCalibration,
    Topic::ModelV2,
    Topic::RadarState,
    Topic::LongitudinalPlan,
    Topic::LivePose,
    Topic::DriverMonitoring,
    Topic::TestJoystick,
];

/// Event-driven producers, never held to a rate.
const IRREGULAR_TOPICS: [Topic; 2] = [Topic::RadarState, Topic::TestJoystick];

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub rate_hz: f64,
    /// Longest wait for a batch of bus frames.
    pub can_timeout: Duration,
    /// Consecutive empty batches before the bus counts as missing.
    pub can_missing_cycles: u64,
    /// Configuration mismatches are tolerated this long after start.
    pub mismatch_grace: Duration,
    /// Consecutive refused-control cycles that raise a mismatch.
    pub mismatch_limit: u32,
    pub soft_disable: Duration,
    pub car_params_period: Duration,
    pub events_period: Duration,
    /// Initialize anyway once this much time has passed.
    pub init_timeout: Duration,
    pub cruise_mismatch_after: Duration,
    pub fan_grace: Duration,
    /// Cycles finishing later than this past their deadline are logged.
    pub print_delay_threshold: Option<Duration>,
    /// Topics held to the liveness, rate and validity checks.
    pub monitored: Vec<Topic>,
    /// Supervised processes whose absence is not a fault.
    pub ignored_processes: Vec<String>,
    pub replay: bool,
    pub simulation: bool,
    pub sounds_available: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rate_hz: 100.0,
            can_timeout: Duration::from_millis(20),
            can_missing_cycles: 10,
            mismatch_grace: Duration::from_secs(10),
            mismatch_limit: 200,
            soft_disable: Duration::from_secs(3),
            car_params_period: Duration::from_secs(50),
            events_period: Duration::from_secs(1),
            init_timeout: Duration::from_secs(6),
            cruise_mismatch_after: Duration::from_secs(6),
            fan_grace: Duration::from_secs(15),
            print_delay_threshold: Some(Duration::from_millis(10)),
            monitored: INPUT_TOPICS.iter().copied().filter(|t| *t != Topic::TestJoystick).collect(),
            ignored_processes: ["loggerd", "encoderd", "statsd"].map(String::from).to_vec(),
            replay: false,
            simulation: false,
            sounds_available: true,
        }
    }
}

/// Whole cycles in `period`, at least one.
fn cycles(period: Duration, tick: Duration) -> u64 {
    let n = period.as_nanos() / tick.as_nanos().max(1);
    u64::try_from(n).unwrap_or(u64::MAX).max(1)
}

fn upstream(monitor: &TopicMonitor, topic: Topic) -> Option<&Value> {
    match monitor.latest(topic) {
        Some(Payload::Upstream(value)) => Some(value),
        _ => None,
    }
}

/// Offending topics of a comm-issue report; logged once per change.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CommReport {
    invalid: Vec<Topic>,
    not_alive: Vec<Topic>,
    not_freq_ok: Vec<Topic>,
}

// ─────────────────────────────────────────────────────────────────────────────
// CycleCoordinator
// ─────────────────────────────────────────────────────────────────────────────

pub struct CycleCoordinator {
    config: CoordinatorConfig,
    tick: Duration,
    init_cycles: u64,
    car_params_cycles: u64,
    events_cycles: u64,
    cruise_mismatch_cycles: u64,
    fan_grace_cycles: u64,

    bus: MessageBus,
    can_rx: TopicReceiver,
    monitor: TopicMonitor,
    store: ParamStore,
    toggles: Arc<LiveToggles>,
    car: Box<dyn CarInterface>,
    control_law: Box<dyn ControlLaw>,

    events: EventSet,
    arbiter: AlertArbiter,
    engagement: EngagementStateMachine,
    cross_check: SafetyCrossCheck,
    watchdog: ProcessWatchdog,
    guard: ActuatorGuard,
    rate_keeper: RateKeeper,
    actuator_log_limiter: DefaultDirectRateLimiter,
    comm_log_limiter: DefaultDirectRateLimiter,
    clock_start: Instant,

    frame: u64,
    initialized: bool,
    controls_ready: bool,
    enabled: bool,
    active: bool,
    startup_event: Option<ConditionId>,
    mismatch_latched: bool,
    /// Cumulative over the process lifetime.
    can_timeout_counter: u64,
    consecutive_can_misses: u64,
    can_mono_time: u64,
    cruise_mismatch_counter: u64,
    last_functional_fan_frame: u64,
    comm_report: Option<CommReport>,
    published_events: Vec<ConditionId>,
    vehicle_state: VehicleState,
    last_control: CarControl,
    last_output: Actuators,
}

impl CycleCoordinator {
    /// Wire a coordinator around a resolved car interface.
    ///
    /// # Errors
    ///
    /// Fails when the cycle rate is not positive or the alert catalog does
    /// not validate.
    pub fn new(
        config: CoordinatorConfig,
        bus: MessageBus,
        store: ParamStore,
        toggles: Arc<LiveToggles>,
        car: Box<dyn CarInterface>,
        control_law: Box<dyn ControlLaw>,
    ) -> Result<Self, VelosError> {
        if !(config.rate_hz.is_finite() && config.rate_hz > 0.0) {
            return Err(VelosError::Params(format!("invalid cycle rate {}", config.rate_hz)));
        }
        let tick = Duration::from_secs_f64(1.0 / config.rate_hz);

        let catalog = Arc::new(AlertCatalog::standard()?);
        let mut events = EventSet::new(catalog, tick);
        let params = car.params();
        if !config.sounds_available {
            events.add_static(ConditionId::SoundsUnavailable);
        }
        if !params.is_recognized() {
            events.add_static(ConditionId::CarUnrecognized);
        } else if params.passive {
            events.add_static(ConditionId::DashcamMode);
        }

        let startup_event = if !params.is_recognized() {
            if params.car_fw.is_empty() {
                ConditionId::StartupNoFw
            } else {
                ConditionId::StartupNoCar
            }
        } else if !car.has_controller() || params.passive {
            ConditionId::StartupNoControl
        } else {
            ConditionId::Startup
        };

        let unchecked: Vec<Topic> = INPUT_TOPICS.iter().copied().filter(|t| !config.monitored.contains(t)).collect();
        let mut ignore_alive = unchecked.clone();
        if config.simulation {
            ignore_alive.push(Topic::ManagerState);
        }
        let mut ignore_freq = unchecked.clone();
        ignore_freq.extend(IRREGULAR_TOPICS);
        let monitor = TopicMonitor::new(&bus, &INPUT_TOPICS)
            .ignore_alive(&ignore_alive)
            .ignore_freq(&ignore_freq)
            .ignore_valid(&unchecked);

        let mut watchdog = ProcessWatchdog::new();
        for name in &config.ignored_processes {
            watchdog.ignore(name);
        }

        let soft_disable_cycles = u32::try_from(cycles(config.soft_disable, tick)).unwrap_or(u32::MAX);
        let once_per_second = Quota::per_second(NonZeroU32::MIN);

        info!(
            car = %params.car_name,
            passive = params.passive,
            startup = %startup_event,
            rate_hz = config.rate_hz,
            "cycle coordinator created"
        );

        Ok(Self {
            tick,
            init_cycles: cycles(config.init_timeout, tick),
            car_params_cycles: cycles(config.car_params_period, tick),
            events_cycles: cycles(config.events_period, tick),
            cruise_mismatch_cycles: cycles(config.cruise_mismatch_after, tick),
            fan_grace_cycles: cycles(config.fan_grace, tick),
            can_rx: bus.subscribe(Topic::Can),
            monitor,
            bus,
            store,
            toggles,
            car,
            control_law,
            events,
            arbiter: AlertArbiter::new(tick),
            engagement: EngagementStateMachine::new(soft_disable_cycles),
            cross_check: SafetyCrossCheck::new(cycles(config.mismatch_grace, tick), config.mismatch_limit),
            watchdog,
            guard: ActuatorGuard::standard(),
            rate_keeper: match config.print_delay_threshold {
                Some(threshold) => RateKeeper::new(config.rate_hz).with_print_delay_threshold(threshold),
                None => RateKeeper::new(config.rate_hz),
            },
            actuator_log_limiter: RateLimiter::direct(once_per_second),
            comm_log_limiter: RateLimiter::direct(once_per_second),
            clock_start: Instant::now(),
            frame: 0,
            initialized: false,
            controls_ready: false,
            enabled: false,
            active: false,
            startup_event: Some(startup_event),
            mismatch_latched: false,
            can_timeout_counter: 0,
            consecutive_can_misses: 0,
            can_mono_time: 0,
            cruise_mismatch_counter: 0,
            last_functional_fan_frame: 0,
            comm_report: None,
            published_events: Vec::new(),
            vehicle_state: VehicleState::default(),
            last_control: CarControl::default(),
            last_output: Actuators::neutral(),
            config,
        })
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> EngagementState {
        self.engagement.state()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn active(&self) -> bool {
        self.active
    }

    /// Cycles without bus frames since the process started.
    pub fn can_timeout_counter(&self) -> u64 {
        self.can_timeout_counter
    }

    pub fn events(&self) -> &EventSet {
        &self.events
    }

    pub fn current_alert(&self) -> Option<&ActiveAlert> {
        self.arbiter.current()
    }

    pub fn cross_check(&self) -> &SafetyCrossCheck {
        &self.cross_check
    }

    pub fn vehicle_state(&self) -> &VehicleState {
        &self.vehicle_state
    }

    pub fn last_control(&self) -> &CarControl {
        &self.last_control
    }

    /// Actuator values the car interface last reported as sent.
    pub fn last_output(&self) -> &Actuators {
        &self.last_output
    }

    fn now_ns(&self) -> u64 {
        u64::try_from(self.clock_start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    // ── loop ────────────────────────────────────────────────────────────────

    /// Run cycles at the configured rate until a cycle fails.
    pub async fn run(&mut self) -> Result<(), VelosError> {
        info!(rate_hz = self.config.rate_hz, "cycle loop started");
        loop {
            self.tick().await?;
        }
    }

    /// Run one cycle, then sleep out the rest of its interval. Returns
    /// `true` when the cycle finished later than the print threshold.
    pub async fn tick(&mut self) -> Result<bool, VelosError> {
        self.step().await?;
        Ok(self.rate_keeper.keep_time().await)
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Car-interface failures. The caller is expected to stop.
    pub async fn step(&mut self) -> Result<(), VelosError> {
        let state = self.data_sample().await?;
        self.update_events(&state);

        if self.initialized && !self.car.params().passive {
            let output = self.engagement.update(&self.events);
            self.enabled = output.enabled;
            self.active = output.active;
        }

        self.update_alerts(&state);
        let control = self.state_control(&state);
        self.controls_update(&state, &control)?;
        self.publish(&state, &control);

        self.vehicle_state = state;
        self.last_control = control;
        Ok(())
    }

    // ── 1. sample ───────────────────────────────────────────────────────────

    async fn data_sample(&mut self) -> Result<VehicleState, VelosError> {
        let batch = self.can_rx.recv_batch(self.config.can_timeout).await;
        self.frame += 1;
        let now_ns = self.now_ns();
        self.monitor.update(now_ns);

        let mut frames = Vec::new();
        let mut transport_valid = true;
        for message in batch {
            if let Payload::Can(batch_frames) = message.payload {
                if frames.is_empty() && !batch_frames.is_empty() {
                    self.can_mono_time = message.mono_time;
                }
                transport_valid &= message.valid;
                frames.extend(batch_frames);
            }
        }

        let mut state = if frames.is_empty() {
            self.can_timeout_counter += 1;
            self.consecutive_can_misses += 1;
            let mut previous = self.vehicle_state.clone();
            previous.events.clear();
            previous.button_events.clear();
            previous
        } else {
            self.consecutive_can_misses = 0;
            let mut decoded = self.car.decode(&frames)?;
            decoded.can_valid &= transport_valid;
            decoded
        };
        state.can_timeout = self.consecutive_can_misses >= self.config.can_missing_cycles;
        if state.can_timeout {
            state.can_valid = false;
        }
        state.can_error_counter = self.can_timeout_counter;
        state.cum_lag_ms = (-self.rate_keeper.remaining() * 1000.0) as f32;

        if !self.initialized {
            self.check_initialized(&state);
        }
        Ok(state)
    }

    fn check_initialized(&mut self, state: &VehicleState) {
        let healthy = state.can_valid && self.monitor.all_checks();
        let timed_out = self.frame >= self.init_cycles;
        if !(healthy || timed_out || (self.config.simulation && !self.config.replay)) {
            return;
        }
        self.initialized = true;
        if healthy {
            info!(frame = self.frame, "controls initialized");
        } else {
            warn!(
                frame = self.frame,
                timed_out,
                can_valid = state.can_valid,
                not_alive = ?self.monitor.not_alive(),
                not_freq_ok = ?self.monitor.not_freq_ok(),
                invalid = ?self.monitor.invalid(),
                "controls initialized with unhealthy inputs"
            );
        }
    }

    // ── 2. events ───────────────────────────────────────────────────────────

    fn update_events(&mut self, state: &VehicleState) {
        self.events.clear();
        let safety = self.cross_check_safety_units();

        if self.toggles.joystick_debug() {
            self.events.add(ConditionId::JoystickDebug);
            self.startup_event = None;
        }
        if let Some(startup) = self.startup_event.take() {
            self.events.add(startup);
        }
        if !self.initialized {
            self.events.add(ConditionId::ControlsInitializing);
            return;
        }
        if self.car.params().passive {
            return;
        }

        if state.can_valid {
            self.events.ingest_external(state.events.iter().copied());
        }
        self.pedal_and_override_events(state);
        self.device_events();
        self.calibration_events();
        self.lane_change_events();

        if safety.relay_malfunction {
            self.events.add(ConditionId::RelayMalfunction);
        }

        // Everything added from here on is a system fault.
        let num_events = self.events.len();
        self.process_events();
        if !self.config.replay && self.rate_keeper.lagging() {
            self.events.add(ConditionId::ControlsdLagging);
        }
        if !self.monitor.valid(Topic::RadarState) {
            self.events.add(ConditionId::RadarFault);
        }
        if !self.monitor.valid(Topic::PandaStates) {
            self.events.add(ConditionId::UsbError);
        }
        if state.can_timeout {
            self.events.add(ConditionId::CanBusMissing);
        } else if !state.can_valid {
            self.events.add(ConditionId::CanError);
        }

        let has_disable = self.events.contains(EffectCategory::NoEntry)
            && (self.events.contains(EffectCategory::SoftDisable)
                || self.events.contains(EffectCategory::ImmediateDisable));
        let no_system_errors = !has_disable || self.events.len() == num_events;
        self.comm_events(no_system_errors);

        if !self.config.replay {
            if state.cruise.enabled && !self.enabled {
                self.cruise_mismatch_counter += 1;
            } else {
                self.cruise_mismatch_counter = 0;
            }
            if self.cruise_mismatch_counter > self.cruise_mismatch_cycles {
                self.events.add(ConditionId::CruiseMismatch);
            }
        }

        let fcw = upstream(&self.monitor, Topic::LongitudinalPlan)
            .and_then(|plan| plan.get("fcw"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if fcw && self.enabled && !self.car.params().not_car {
            self.events.add(ConditionId::Fcw);
        }

        self.personality_events(state);
    }

    fn safety_units(&self) -> Vec<SafetyUnitState> {
        match self.monitor.latest(Topic::PandaStates) {
            Some(Payload::PandaStates(units)) => units.clone(),
            _ => Vec::new(),
        }
    }

    /// Runs every cycle, initialized or not, so a mismatch episode is never
    /// missed. The first raise is latched for the rest of the session.
    fn cross_check_safety_units(&mut self) -> CrossCheckReport {
        let units = self.safety_units();
        let params = self.car.params();
        let report = self.cross_check.update(&CrossCheckInput {
            cycle: self.frame,
            expected: &params.safety_configs,
            alternative_experience: params.alternative_experience,
            units: &units,
            enabled: self.enabled,
        });
        if report.raise_mismatch && !self.mismatch_latched {
            self.mismatch_latched = true;
            self.events.add_static(ConditionId::ControlsMismatch);
            error!(
                frame = self.frame,
                config_mismatch = report.config_mismatch,
                rx_checks_invalid = report.rx_checks_invalid,
                refused_streak = report.refused_streak,
                "controls mismatch latched"
            );
        }
        report
    }

    fn pedal_and_override_events(&mut self, state: &VehicleState) {
        let params = self.car.params();
        let disengage_on_gas = params.alternative_experience & alternative_experience::DISABLE_DISENGAGE_ON_GAS == 0;
        if state.gas_pressed {
            if disengage_on_gas {
                if !self.vehicle_state.gas_pressed {
                    self.events.add(ConditionId::PedalPressed);
                }
            } else if self.enabled {
                self.events.add(ConditionId::GasPressedOverride);
            }
        }
        if state.steering_pressed && self.active {
            self.events.add(ConditionId::SteerOverride);
        }
    }

    fn device_events(&mut self) {
        let Some(Payload::DeviceState(device)) = self.monitor.latest(Topic::DeviceState) else {
            return;
        };
        let device: DeviceState = *device;
        if device.thermal_status >= ThermalStatus::Red {
            self.events.add(ConditionId::Overheat);
        }
        if !self.config.simulation {
            if device.free_space_percent < MIN_FREE_SPACE_PERCENT {
                self.events.add(ConditionId::OutOfSpace);
            }
            if device.memory_usage_percent > MAX_MEMORY_PERCENT {
                self.events.add(ConditionId::LowMemory);
            }
        }

        let peripheral = match self.monitor.latest(Topic::PeripheralState) {
            Some(Payload::PeripheralState(p)) => *p,
            _ => PeripheralState::default(),
        };
        if peripheral.hardware_type != HardwareType::Unknown {
            if peripheral.fan_speed_rpm < MIN_FAN_RPM && device.fan_speed_percent_desired > FAN_DESIRED_PERCENT {
                if self.frame.saturating_sub(self.last_functional_fan_frame) > self.fan_grace_cycles {
                    self.events.add(ConditionId::FanMalfunction);
                }
            } else {
                self.last_functional_fan_frame = self.frame;
            }
        }
    }

    fn calibration(&self) -> Option<CalibrationReport> {
        match self.monitor.latest(Topic::LiveCalibration) {
            Some(Payload::LiveCalibration(report)) => Some(*report),
            _ => None,
        }
    }

    fn calibration_events(&mut self) {
        let Some(report) = self.calibration() else {
            return;
        };
        match report.status {
            CalibrationStatus::Calibrated => {}
            CalibrationStatus::Uncalibrated => self.events.add(ConditionId::CalibrationIncomplete),
            CalibrationStatus::Recalibrating => self.events.add(ConditionId::CalibrationRecalibrating),
            CalibrationStatus::Invalid => self.events.add(ConditionId::CalibrationInvalid),
        }
    }

    fn lane_change_events(&mut self) {
        let Some(meta) = upstream(&self.monitor, Topic::ModelV2).and_then(|m| m.get("meta")) else {
            return;
        };
        let lane_change = meta.get("laneChangeState").and_then(Value::as_str);
        let direction = meta.get("laneChangeDirection").and_then(Value::as_str);
        let event = match (lane_change, direction) {
            (Some("preLaneChange"), Some("left")) => Some(ConditionId::PreLaneChangeLeft),
            (Some("preLaneChange"), Some("right")) => Some(ConditionId::PreLaneChangeRight),
            (Some("laneChangeStarting" | "laneChangeFinishing"), _) => Some(ConditionId::LaneChange),
            _ => None,
        };
        if let Some(event) = event {
            self.events.add(event);
        }
    }

    fn process_events(&mut self) {
        if self.config.simulation || self.monitor.recv_frame(Topic::ManagerState) == 0 {
            return;
        }
        let Some(Payload::ManagerState(processes)) = self.monitor.latest(Topic::ManagerState) else {
            return;
        };
        if let ProcessHealth::NotRunning(_) = self.watchdog.check(processes) {
            self.events.add(ConditionId::ProcessNotRunning);
        }
    }

    /// Generic comm fault, only when nothing more specific explains it.
    fn comm_events(&mut self, no_system_errors: bool) {
        if self.monitor.all_checks() || !no_system_errors {
            self.comm_report = None;
            return;
        }
        if !self.monitor.all_alive() {
            self.events.add(ConditionId::CommIssue);
        } else if !self.monitor.all_freq_ok() {
            self.events.add(ConditionId::CommIssueAvgFreq);
        } else {
            self.events.add(ConditionId::CommIssue);
        }

        let report = CommReport {
            invalid: self.monitor.invalid(),
            not_alive: self.monitor.not_alive(),
            not_freq_ok: self.monitor.not_freq_ok(),
        };
        if self.comm_report.as_ref() != Some(&report) {
            if self.comm_log_limiter.check().is_ok() {
                error!(
                    invalid = ?report.invalid,
                    not_alive = ?report.not_alive,
                    not_freq_ok = ?report.not_freq_ok,
                    "communication issue"
                );
            }
            self.comm_report = Some(report);
        }
    }

    fn personality_events(&mut self, state: &VehicleState) {
        if !self.car.params().longitudinal_control {
            return;
        }
        let released = state
            .button_events
            .iter()
            .any(|b| b.kind == ButtonKind::GapAdjustCruise && !b.pressed);
        if !released {
            return;
        }
        let personality = self.toggles.personality().cycle();
        self.toggles.set_personality(personality);
        self.store.put_nonblocking(
            keys::LONGITUDINAL_PERSONALITY,
            personality.as_u8().to_string().into_bytes(),
        );
        self.events.add(ConditionId::PersonalityChanged);
        info!(personality = ?personality, "driving personality changed");
    }

    // ── 4. alerts ───────────────────────────────────────────────────────────

    fn signals(&self) -> SignalSnapshot {
        let auto_lane_change_timer = upstream(&self.monitor, Topic::ModelV2)
            .and_then(|m| m.pointer("/meta/autoLaneChangeTimer"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32;
        let mut joystick_axes = [0.0; 2];
        if let Some(axes) = upstream(&self.monitor, Topic::TestJoystick)
            .and_then(|j| j.get("axes"))
            .and_then(Value::as_array)
        {
            for (slot, value) in joystick_axes.iter_mut().zip(axes) {
                *slot = value.as_f64().unwrap_or(0.0) as f32;
            }
        }
        let gps_integrated = matches!(
            self.monitor.latest(Topic::PeripheralState),
            Some(Payload::PeripheralState(p)) if p.hardware_type.has_integrated_gps()
        );
        SignalSnapshot {
            calibration_percent: self.calibration().map_or(0, |c| c.percent),
            auto_lane_change_timer,
            joystick_axes,
            gps_integrated,
        }
    }

    fn update_alerts(&mut self, state: &VehicleState) {
        let categories = self.engagement.alert_categories();
        let mut clear = Vec::new();
        if !categories.contains(&EffectCategory::Warning) {
            clear.push(EffectCategory::Warning);
        }
        if self.enabled {
            clear.push(EffectCategory::NoEntry);
        }

        let signals = self.signals();
        let ctx = AlertContext {
            params: self.car.params(),
            state,
            signals: &signals,
            metric: self.toggles.is_metric(),
            personality: self.toggles.personality(),
            soft_disable_remaining: self.tick * self.engagement.soft_disable_timer(),
        };
        let alerts = self.events.resolve_alerts(categories, &ctx);
        self.arbiter.add_many(self.frame, alerts);
        self.arbiter.process_alerts(self.frame, &clear);
    }

    // ── 5. control ──────────────────────────────────────────────────────────

    fn state_control(&mut self, state: &VehicleState) -> CarControl {
        let calibrated = self.calibration().is_some_and(|c| c.status == CalibrationStatus::Calibrated);
        let plan = upstream(&self.monitor, Topic::LongitudinalPlan);
        let plan_speed = plan
            .and_then(|p| p.get("speeds"))
            .and_then(Value::as_array)
            .and_then(|speeds| speeds.last())
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let lead_visible = plan.and_then(|p| p.get("hasLead")).and_then(Value::as_bool).unwrap_or(false);

        let params = self.car.params();
        let standstill = state.v_ego <= params.min_steer_speed.max(MIN_LAT_SPEED) || state.standstill;
        let steer_fault = state.steer_fault_temporary || state.steer_fault_permanent;
        let lat_active =
            self.active && !steer_fault && !standstill && !self.events.contains(EffectCategory::OverrideLateral);
        let long_active = self.enabled
            && !self.events.contains(EffectCategory::OverrideLongitudinal)
            && params.longitudinal_control;

        if !self.active {
            self.control_law.reset();
        }
        let accel_limits = self.car.accel_limits(state.v_ego, state.v_cruise_kph * KPH_TO_MS);
        let mut actuators = self.control_law.update(&ControlInput {
            lat_active,
            long_active,
            state,
            params,
            accel_limits,
            calibrated,
        });

        let corrections = self.guard.sanitize(&mut actuators);
        if !corrections.is_empty() && self.actuator_log_limiter.check().is_ok() {
            error!(frame = self.frame, corrections = ?corrections, "actuator command corrected");
        }

        let visual_alert = self.arbiter.current().map(|a| a.alert.visual).unwrap_or_default();
        CarControl {
            enabled: self.enabled,
            lat_active,
            long_active,
            actuators,
            cruise_control: CruiseControl {
                cancel: state.cruise.enabled && (!self.enabled || !params.pcm_cruise),
                resume: self.enabled && state.cruise.standstill && plan_speed > RESUME_SPEED,
                overriding: self.enabled && !long_active && params.longitudinal_control,
            },
            hud_control: HudControl {
                set_speed: state.v_cruise_kph * KPH_TO_MS,
                speed_visible: self.enabled,
                lanes_visible: self.enabled,
                lead_visible,
                visual_alert,
                lead_distance_bars: self.toggles.personality().as_u8() + 1,
            },
        }
    }

    fn controls_update(&mut self, state: &VehicleState, control: &CarControl) -> Result<(), VelosError> {
        if !self.initialized || self.car.params().passive {
            return Ok(());
        }
        if !self.controls_ready {
            self.car.init()?;
            self.store.put_bool_nonblocking(keys::CONTROLS_READY, true);
            self.controls_ready = true;
            info!(car = %self.car.params().car_name, "controls ready");
        }

        let now_ns = if self.config.replay { self.can_mono_time } else { self.now_ns() };
        let (output, frames) = self.car.apply(control, now_ns)?;
        self.last_output = output;
        debug!(frames = frames.len(), "commands encoded");
        self.bus.publish_payload(Topic::SendCan, Payload::SendCan(frames), state.can_valid, now_ns);
        Ok(())
    }

    // ── 6. publish ──────────────────────────────────────────────────────────

    fn publish(&mut self, state: &VehicleState, control: &CarControl) {
        let now_ns = self.now_ns();
        let can_valid = state.can_valid;
        let params = self.car.params();
        let cycle = self.frame - 1;

        self.bus.publish_payload(Topic::CarState, Payload::CarState(state.clone()), can_valid, now_ns);
        if cycle % self.car_params_cycles == 0 {
            self.bus.publish_payload(Topic::CarParams, Payload::CarParams(params.clone()), true, now_ns);
        }
        self.bus.publish_payload(Topic::CarControl, Payload::CarControl(*control), can_valid, now_ns);
        self.bus.publish_payload(Topic::CarOutput, Payload::CarOutput(self.last_output), can_valid, now_ns);

        let alert = self.arbiter.current().map(|a| &a.alert);
        let selfdrive = SelfdriveState {
            state: self.engagement.state(),
            enabled: self.enabled,
            active: self.active,
            engageable: !self.events.contains(EffectCategory::NoEntry),
            alert_text_1: alert.map(|a| a.text_1.clone()).unwrap_or_default(),
            alert_text_2: alert.map(|a| a.text_2.clone()).unwrap_or_default(),
            alert_size: alert.map(|a| a.size).unwrap_or_default(),
            alert_status: alert.map(|a| a.status).unwrap_or_default(),
            alert_type: alert.map(|a| a.label.clone()).unwrap_or_default(),
            alert_sound: alert.map(|a| a.audible).unwrap_or_default(),
            experimental_mode: self.toggles.experimental_mode(),
            personality: self.toggles.personality(),
        };
        self.bus.publish_payload(Topic::SelfdriveState, Payload::SelfdriveState(selfdrive), true, now_ns);

        let changed = self.events.names() != self.published_events.as_slice();
        if changed || cycle % self.events_cycles == 0 {
            self.bus.publish_payload(Topic::OnroadEvents, Payload::OnroadEvents(self.events.to_records()), true, now_ns);
            self.published_events = self.events.names().to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velos_hal::NeutralControlLaw;
    use velos_hal::mock::{MockCarInterface, buttons, buttons_frame, condition_frame, speed_frame};
    use velos_types::{CanFrame, Personality, VehicleParams};

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            monitored: Vec::new(),
            ..CoordinatorConfig::default()
        }
    }

    fn coordinator(car: MockCarInterface) -> (CycleCoordinator, MessageBus, ParamStore, Arc<LiveToggles>) {
        let bus = MessageBus::default();
        let store = ParamStore::open_in_memory().unwrap();
        let toggles = Arc::new(LiveToggles::new());
        let coordinator = CycleCoordinator::new(
            config(),
            bus.clone(),
            store.clone(),
            Arc::clone(&toggles),
            Box::new(car),
            Box::new(NeutralControlLaw::new()),
        )
        .unwrap();
        (coordinator, bus, store, toggles)
    }

    async fn cycle(c: &mut CycleCoordinator, bus: &MessageBus, frames: Vec<CanFrame>) {
        bus.publish_payload(Topic::Can, Payload::Can(frames), true, 0);
        c.step().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_shows_startup() {
        let (mut c, bus, _, _) = coordinator(MockCarInterface::testbench());
        cycle(&mut c, &bus, vec![speed_frame(0.0)]).await;
        assert!(c.initialized());
        assert!(c.events().contains_id(ConditionId::Startup));

        cycle(&mut c, &bus, vec![speed_frame(0.0)]).await;
        assert!(!c.events().contains_id(ConditionId::Startup));
        let alert = c.current_alert().unwrap();
        assert_eq!(alert.alert.label, "startup/permanent");
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_car_never_engages() {
        let mut params = VehicleParams::default();
        params.passive = true;
        let (mut c, bus, _, _) = coordinator(MockCarInterface::new(params, false));
        cycle(&mut c, &bus, vec![condition_frame(&[ConditionId::ButtonEnable])]).await;
        cycle(&mut c, &bus, vec![condition_frame(&[ConditionId::ButtonEnable])]).await;

        assert!(c.events().contains_id(ConditionId::CarUnrecognized));
        assert!(!c.events().contains_id(ConditionId::ButtonEnable));
        assert_eq!(c.state(), EngagementState::Disabled);
        assert!(!c.enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn uninitialized_cycle_reports_initializing() {
        let bus = MessageBus::default();
        let mut c = CycleCoordinator::new(
            CoordinatorConfig::default(),
            bus.clone(),
            ParamStore::open_in_memory().unwrap(),
            Arc::new(LiveToggles::new()),
            Box::new(MockCarInterface::testbench()),
            Box::new(NeutralControlLaw::new()),
        )
        .unwrap();
        cycle(&mut c, &bus, vec![condition_frame(&[ConditionId::ButtonEnable])]).await;

        assert!(!c.initialized());
        assert!(c.events().contains_id(ConditionId::ControlsInitializing));
        assert_eq!(c.state(), EngagementState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn gap_adjust_release_cycles_personality() {
        let (mut c, bus, store, toggles) = coordinator(MockCarInterface::testbench());
        cycle(&mut c, &bus, vec![buttons_frame(buttons::GAP_ADJUST)]).await;
        assert_eq!(toggles.personality(), Personality::Standard);

        cycle(&mut c, &bus, vec![buttons_frame(0)]).await;
        assert_eq!(toggles.personality(), Personality::Aggressive);
        assert!(c.events().contains_id(ConditionId::PersonalityChanged));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.get_string(keys::LONGITUDINAL_PERSONALITY).unwrap().is_none()
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.get_string(keys::LONGITUDINAL_PERSONALITY).unwrap().as_deref(), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn gas_press_disengages_by_default() {
        let (mut c, bus, _, _) = coordinator(MockCarInterface::testbench());
        cycle(&mut c, &bus, vec![speed_frame(10.0), condition_frame(&[ConditionId::ButtonEnable])]).await;
        assert!(c.enabled());

        cycle(&mut c, &bus, vec![buttons_frame(buttons::GAS)]).await;
        assert!(c.events().contains_id(ConditionId::PedalPressed));
        assert!(!c.enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn gas_overrides_when_disengage_on_gas_is_off() {
        let mut params = MockCarInterface::testbench_params();
        params.alternative_experience = alternative_experience::DISABLE_DISENGAGE_ON_GAS;
        let (mut c, bus, _, _) = coordinator(MockCarInterface::new(params, true));
        cycle(&mut c, &bus, vec![speed_frame(10.0), condition_frame(&[ConditionId::ButtonEnable])]).await;
        cycle(&mut c, &bus, vec![buttons_frame(buttons::GAS)]).await;

        assert!(c.events().contains_id(ConditionId::GasPressedOverride));
        assert!(c.enabled());
        assert!(!c.last_control().long_active);
        assert!(c.last_control().cruise_control.overriding);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_state_and_command() {
        let (mut c, bus, _, _) = coordinator(MockCarInterface::testbench());
        let mut car_state = bus.subscribe(Topic::CarState);
        let mut selfdrive = bus.subscribe(Topic::SelfdriveState);
        let mut sendcan = bus.subscribe(Topic::SendCan);
        let mut car_params = bus.subscribe(Topic::CarParams);

        cycle(&mut c, &bus, vec![speed_frame(12.0)]).await;
        cycle(&mut c, &bus, vec![speed_frame(12.0)]).await;

        let states = car_state.drain();
        assert_eq!(states.len(), 2);
        assert!(states.iter().all(|m| m.valid));
        assert_eq!(selfdrive.drain().len(), 2);
        assert_eq!(sendcan.drain().len(), 2);
        assert_eq!(car_params.drain().len(), 1);
    }
}
