//! Cold start: from first bus traffic to a configured car interface.
//!
//! 1. Wait for a non-empty batch of bus frames and one peripheral sample.
//! 2. Keep collecting frames for a short fingerprint window.
//! 3. Resolve the interface, preferring the cached identity of a previous
//!    boot, and mark the firmware query done.
//! 4. Apply the user's engagement toggles: alternative-experience flags and
//!    passive (observe-only) mode.
//! 5. Persist the identity. `CarParams` is written before returning so that
//!    downstream stages blocked on it can proceed; the cache copies are
//!    written in the background.

use std::collections::BTreeSet;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use velos_hal::{CarInterface, InterfaceRegistry, Resolution, ResolutionSource};
use velos_middleware::{MessageBus, Payload, Topic, TopicReceiver};
use velos_params::{ParamStore, keys};
use velos_types::{
    CanFrame, PeripheralState, SafetyConfig, SafetyModel, VehicleParams, VelosError, alternative_experience,
};

/// Frames are gathered this long after the first batch before fingerprinting.
pub const FINGERPRINT_WINDOW: Duration = Duration::from_millis(200);

/// Subscriptions cold start reads from. Create them before any producer
/// starts publishing so that no early frame is missed.
pub struct ColdStartInputs {
    can: TopicReceiver,
    peripheral: TopicReceiver,
}

impl ColdStartInputs {
    pub fn subscribe(bus: &MessageBus) -> Self {
        Self {
            can: bus.subscribe(Topic::Can),
            peripheral: bus.subscribe(Topic::PeripheralState),
        }
    }
}

/// Outcome of [`cold_start`].
pub struct ColdStart {
    pub car: Box<dyn CarInterface>,
    pub source: ResolutionSource,
    pub peripheral: PeripheralState,
    /// Background store writes still in flight.
    pub writes: Vec<JoinHandle<()>>,
}

impl ColdStart {
    /// Wait for the background writes to land.
    pub fn join_writes(&mut self) {
        for handle in self.writes.drain(..) {
            if handle.join().is_err() {
                warn!("background param write panicked");
            }
        }
    }
}

/// Run the cold-start protocol.
///
/// # Errors
///
/// [`VelosError::Channel`] when the bus closes before traffic arrives, and
/// store errors while reading toggles or persisting the identity.
pub async fn cold_start(
    mut inputs: ColdStartInputs,
    store: &ParamStore,
    registry: &InterfaceRegistry,
) -> Result<ColdStart, VelosError> {
    let frames = collect_frames(&mut inputs.can).await?;
    let peripheral = wait_for_peripheral(&mut inputs.peripheral).await?;
    debug!(frames = frames.len(), hardware = ?peripheral.hardware_type, "bus traffic and peripheral seen");

    let cached = read_cached_params(store)?;
    let Resolution { interface: mut car, source } = registry.resolve(&frames, cached.as_ref());
    store.put_bool(keys::FIRMWARE_QUERY_DONE, true)?;

    let disengage_on_gas = toggle_or_true(store, keys::DISENGAGE_ON_ACCELERATOR)?;
    let disengage_on_brake = toggle_or_true(store, keys::DISENGAGE_ON_BRAKE)?;
    let engagement_toggle = toggle_or_true(store, keys::ENGAGEMENT_TOGGLE)?;
    let has_controller = car.has_controller();
    apply_toggles(car.params_mut(), has_controller, disengage_on_gas, disengage_on_brake, engagement_toggle);

    if let Some(previous) = store.get(keys::CAR_PARAMS_PERSISTENT)? {
        store.put(keys::CAR_PARAMS_PREV_ROUTE, &previous)?;
    }
    let serialized = serde_json::to_vec(car.params())?;
    store.put(keys::CAR_PARAMS, &serialized)?;
    let writes = vec![
        store.put_nonblocking(keys::CAR_PARAMS_CACHE, serialized.clone()),
        store.put_nonblocking(keys::CAR_PARAMS_PERSISTENT, serialized),
    ];

    let params = car.params();
    info!(
        car = %params.car_name,
        source = ?source,
        passive = params.passive,
        alternative_experience = params.alternative_experience,
        "vehicle resolved"
    );

    Ok(ColdStart { car, source, peripheral, writes })
}

/// Frames from batches flagged invalid never take part in identification.
async fn collect_frames(can: &mut TopicReceiver) -> Result<Vec<CanFrame>, VelosError> {
    let mut frames = Vec::new();
    while frames.is_empty() {
        let message = can.recv().await.ok_or_else(|| VelosError::Channel("bus closed during cold start".into()))?;
        match message.payload {
            Payload::Can(batch) if message.valid => frames.extend(batch),
            Payload::Can(batch) => debug!(frames = batch.len(), "skipping invalid bus batch"),
            _ => {}
        }
    }

    let deadline = Instant::now() + FINGERPRINT_WINDOW;
    let mut seen: BTreeSet<(u8, u32)> = frames.iter().map(|f| (f.bus, f.address)).collect();
    while let Some(left) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) {
        for message in can.recv_batch(left).await.into_iter().filter(|m| m.valid) {
            if let Payload::Can(batch) = message.payload {
                frames.extend(batch.into_iter().filter(|f| seen.insert((f.bus, f.address))));
            }
        }
    }
    Ok(frames)
}

async fn wait_for_peripheral(peripheral: &mut TopicReceiver) -> Result<PeripheralState, VelosError> {
    loop {
        let message = peripheral
            .recv()
            .await
            .ok_or_else(|| VelosError::Channel("bus closed during cold start".into()))?;
        if let Payload::PeripheralState(state) = message.payload {
            return Ok(state);
        }
    }
}

/// A cached identity that no longer parses is ignored, not fatal.
fn read_cached_params(store: &ParamStore) -> Result<Option<VehicleParams>, VelosError> {
    let Some(bytes) = store.get(keys::CAR_PARAMS_CACHE)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(params) => Ok(Some(params)),
        Err(e) => {
            warn!(error = %e, "discarding unreadable cached vehicle identity");
            Ok(None)
        }
    }
}

/// Engagement toggles default to on when never written.
fn toggle_or_true(store: &ParamStore, key: &str) -> Result<bool, VelosError> {
    Ok(store.get(key)?.is_none_or(|v| v == b"1"))
}

fn apply_toggles(
    params: &mut VehicleParams,
    has_controller: bool,
    disengage_on_gas: bool,
    disengage_on_brake: bool,
    engagement_toggle: bool,
) {
    if !disengage_on_gas {
        params.alternative_experience |= alternative_experience::DISABLE_DISENGAGE_ON_GAS;
    }
    if !disengage_on_brake {
        params.alternative_experience |= alternative_experience::ALLOW_AEB;
    }

    let controller_available = has_controller && engagement_toggle && !params.dashcam_only;
    params.passive = !controller_available || params.dashcam_only;
    if params.passive {
        params.safety_configs = vec![SafetyConfig {
            safety_model: SafetyModel::NoOutput,
            safety_param: 0,
        }];
    }
}
