//! `velosd` – the engagement control daemon.
//!
//! 1. Initialises structured logging (`RUST_LOG`, `VELOS_LOG_FORMAT=json`,
//!    optional OTLP export via `OTEL_EXPORTER_OTLP_ENDPOINT`).
//! 2. Loads [`DaemonConfig`] and opens the parameter store.
//! 3. Runs cold start against the bus; in simulation the built-in feed
//!    provides the traffic.
//! 4. Starts the toggle poller and hands control to the 100 Hz
//!    [`CycleCoordinator`] until it fails or Ctrl-C is received, then stops
//!    the poller and the simulated feed.

mod config;
mod sim;

use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use velos_hal::{InterfaceRegistry, NeutralControlLaw};
use velos_middleware::MessageBus;
use velos_params::{ParamStore, ParamsError};
use velos_runtime::toggles::POLL_PERIOD;
use velos_runtime::{
    ColdStartInputs, CoordinatorConfig, CycleCoordinator, LiveToggles, cold_start, spawn_poller, telemetry,
};
use velos_types::VelosError;

use crate::config::{ConfigError, DaemonConfig};

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Velos(#[from] VelosError),

    #[error("Failed to start toggle poller: {0}")]
    Poller(#[from] std::io::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _telemetry = telemetry::init_tracing("velosd");

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || signal.notify_one()) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    match run(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "velosd stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(shutdown: Arc<Notify>) -> Result<(), DaemonError> {
    let cfg = DaemonConfig::load()?;
    info!(
        replay = cfg.replay,
        simulation = cfg.simulation,
        params = %cfg.params_path.display(),
        "configuration loaded"
    );
    let store = ParamStore::open(&cfg.params_path)?;

    let bus = MessageBus::default();
    let inputs = ColdStartInputs::subscribe(&bus);
    let feeder = cfg.simulation.then(|| sim::spawn_feeder(bus.clone()));
    if !cfg.simulation {
        info!("waiting for bus traffic");
    }

    let registry = InterfaceRegistry::with_builtin();
    let boot = tokio::select! {
        boot = cold_start(inputs, &store, &registry) => boot?,
        _ = shutdown.notified() => {
            info!("shutdown requested during cold start");
            return Ok(());
        }
    };
    let longitudinal_control = boot.car.params().longitudinal_control;

    let toggles = Arc::new(LiveToggles::new());
    toggles.refresh(&store, longitudinal_control)?;
    let poller = spawn_poller(Arc::clone(&toggles), store.clone(), longitudinal_control, POLL_PERIOD)?;

    let config = CoordinatorConfig {
        replay: cfg.replay,
        simulation: cfg.simulation,
        ..CoordinatorConfig::default()
    };
    let mut coordinator =
        CycleCoordinator::new(config, bus, store, toggles, boot.car, Box::new(NeutralControlLaw::new()))?;
    let result = tokio::select! {
        result = coordinator.run() => result,
        _ = shutdown.notified() => {
            info!("shutdown requested");
            Ok(())
        }
    };

    poller.stop();
    if let Some(feeder) = feeder {
        feeder.abort();
    }
    result?;
    Ok(())
}
