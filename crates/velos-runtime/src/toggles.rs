//! [`LiveToggles`] – user settings the cycle reads without touching the store.
//!
//! A background thread refreshes the toggles from the [`ParamStore`] at a
//! low rate. Each field is an independent atomic primitive written on its
//! own; a composite setting must not be shared this way and belongs on the
//! message bus instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};
use velos_params::{ParamStore, ParamsError, keys};
use velos_types::Personality;

/// Default refresh period of the poller.
pub const POLL_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct LiveToggles {
    is_metric: AtomicBool,
    experimental_mode: AtomicBool,
    joystick_debug: AtomicBool,
    personality: AtomicU8,
}

impl Default for LiveToggles {
    fn default() -> Self {
        Self {
            is_metric: AtomicBool::new(false),
            experimental_mode: AtomicBool::new(false),
            joystick_debug: AtomicBool::new(false),
            personality: AtomicU8::new(Personality::default().as_u8()),
        }
    }
}

impl LiveToggles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every toggle once from `store`.
    ///
    /// `experimental_mode` only counts when the car has longitudinal control.
    pub fn refresh(&self, store: &ParamStore, longitudinal_control: bool) -> Result<(), ParamsError> {
        self.is_metric.store(store.get_bool(keys::IS_METRIC)?, Ordering::Relaxed);
        let experimental = store.get_bool(keys::EXPERIMENTAL_MODE)? && longitudinal_control;
        self.experimental_mode.store(experimental, Ordering::Relaxed);
        self.joystick_debug.store(store.get_bool(keys::JOYSTICK_DEBUG_MODE)?, Ordering::Relaxed);

        let personality = store
            .get_string(keys::LONGITUDINAL_PERSONALITY)?
            .and_then(|s| s.trim().parse::<u8>().ok())
            .and_then(Personality::from_u8)
            .unwrap_or_default();
        self.set_personality(personality);
        Ok(())
    }

    pub fn is_metric(&self) -> bool {
        self.is_metric.load(Ordering::Relaxed)
    }

    pub fn experimental_mode(&self) -> bool {
        self.experimental_mode.load(Ordering::Relaxed)
    }

    pub fn joystick_debug(&self) -> bool {
        self.joystick_debug.load(Ordering::Relaxed)
    }

    pub fn personality(&self) -> Personality {
        Personality::from_u8(self.personality.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_personality(&self, personality: Personality) {
        self.personality.store(personality.as_u8(), Ordering::Relaxed);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Poller
// ─────────────────────────────────────────────────────────────────────────────

/// Stops the poller thread when dropped.
pub struct PollerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Signal the poller and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("toggle poller panicked");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Refresh `toggles` from `store` every `period` on a dedicated thread.
///
/// Store errors are logged and the previous values are kept.
pub fn spawn_poller(
    toggles: Arc<LiveToggles>,
    store: ParamStore,
    longitudinal_control: bool,
    period: Duration,
) -> std::io::Result<PollerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let thread = thread::Builder::new().name("toggle-poller".to_string()).spawn(move || {
        debug!(period_ms = period.as_millis() as u64, "toggle poller started");
        while !flag.load(Ordering::Relaxed) {
            if let Err(e) = toggles.refresh(&store, longitudinal_control) {
                warn!(error = %e, "toggle refresh failed");
            }
            thread::sleep(period);
        }
        debug!("toggle poller stopped");
    })?;
    Ok(PollerHandle { stop, thread: Some(thread) })
}
