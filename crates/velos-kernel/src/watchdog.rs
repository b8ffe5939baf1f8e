//! [`ProcessWatchdog`] – required-process monitor.
//!
//! The process manager publishes the state of every managed process. The
//! watchdog reduces that list to the set of processes that should be running
//! but are not, skipping any name on the ignore list (processes that are
//! optional on this platform or disabled by configuration).

use std::collections::{BTreeSet, HashSet};

use tracing::{info, warn};
use velos_types::ProcessState;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state derived from one manager report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessHealth {
    /// Every required process is running.
    Healthy,
    /// The named required processes are not running.
    NotRunning(BTreeSet<String>),
}

impl ProcessHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProcessHealth::Healthy)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ProcessWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// Flags required processes that are down.
///
/// # Example
///
/// ```
/// use velos_kernel::watchdog::{ProcessHealth, ProcessWatchdog};
/// use velos_types::ProcessState;
///
/// let mut wd = ProcessWatchdog::new();
/// wd.ignore("loggerd");
///
/// let report = vec![
///     ProcessState { name: "loggerd".into(), running: false, should_be_running: true },
///     ProcessState { name: "plannerd".into(), running: true, should_be_running: true },
/// ];
/// assert_eq!(wd.check(&report), ProcessHealth::Healthy);
/// ```
#[derive(Default)]
pub struct ProcessWatchdog {
    ignored: HashSet<String>,
    last_down: BTreeSet<String>,
}

impl ProcessWatchdog {
    /// Create a watchdog with an empty ignore list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Never report `name` as not running.
    pub fn ignore(&mut self, name: &str) {
        self.ignored.insert(name.to_string());
    }

    /// Evaluate one manager report. Changes to the set of down processes
    /// are logged; repeated identical reports are not.
    pub fn check(&mut self, processes: &[ProcessState]) -> ProcessHealth {
        let down: BTreeSet<String> = processes
            .iter()
            .filter(|p| p.should_be_running && !p.running && !self.ignored.contains(&p.name))
            .map(|p| p.name.clone())
            .collect();

        if down != self.last_down {
            if down.is_empty() {
                info!("all required processes running");
            } else {
                warn!(processes = ?down, "required processes not running");
            }
            self.last_down.clone_from(&down);
        }

        if down.is_empty() {
            ProcessHealth::Healthy
        } else {
            ProcessHealth::NotRunning(down)
        }
    }
}
