//! [`InterfaceRegistry`] – central car-interface registry and resolver.
//!
//! Every supported vehicle registers its bus fingerprint, its default
//! identity and a factory for its [`CarInterface`]. At cold start the
//! registry decides which interface drives the connected vehicle:
//!
//! 1. A cached identity from a previous boot is reused when it names a
//!    registered car.
//! 2. Otherwise the addresses seen on the bus are matched against every
//!    fingerprint. Exactly one registration must contain all of them.
//! 3. Anything else falls back to an observe-only
//!    [`MockCarInterface`][crate::mock::MockCarInterface].

use std::collections::{BTreeSet, HashMap};

use tracing::{info, warn};
use velos_types::{CanFrame, VehicleParams};

use crate::car_interface::CarInterface;
use crate::mock::{MockCarInterface, TESTBENCH_CAR_NAME, TESTBENCH_FINGERPRINT};

/// Builds the default identity of a registered car.
pub type ParamsFn = fn() -> VehicleParams;
/// Builds an interface for a resolved identity.
pub type InterfaceFactory = fn(VehicleParams) -> Box<dyn CarInterface>;

#[derive(Clone)]
pub struct Registration {
    pub car_name: &'static str,
    /// Addresses the car broadcasts on its primary bus.
    pub fingerprint: &'static [u32],
    pub params: ParamsFn,
    pub factory: InterfaceFactory,
}

/// How the interface was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Fingerprint,
    Fallback,
}

pub struct Resolution {
    pub interface: Box<dyn CarInterface>,
    pub source: ResolutionSource,
}

/// Registry of every supported vehicle.
///
/// Construct with [`InterfaceRegistry::new`], register cars, then call
/// [`InterfaceRegistry::resolve`] once the first frames have arrived.
#[derive(Default, Clone)]
pub struct InterfaceRegistry {
    registrations: HashMap<String, Registration>,
}

impl InterfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the testbench vehicle.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Registration {
            car_name: TESTBENCH_CAR_NAME,
            fingerprint: TESTBENCH_FINGERPRINT,
            params: MockCarInterface::testbench_params,
            factory: |params| Box::new(MockCarInterface::new(params, true)),
        });
        registry
    }

    /// Register a car. A previous registration with the same name is replaced.
    pub fn register(&mut self, registration: Registration) {
        self.registrations.insert(registration.car_name.to_string(), registration);
    }

    pub fn car_names(&self) -> BTreeSet<&str> {
        self.registrations.keys().map(String::as_str).collect()
    }

    /// Choose the interface for the connected vehicle.
    pub fn resolve(&self, frames: &[CanFrame], cached: Option<&VehicleParams>) -> Resolution {
        if let Some(params) = cached {
            if let Some(reg) = self.registrations.get(&params.car_name) {
                info!(car = %params.car_name, "reusing cached vehicle identity");
                return Resolution {
                    interface: (reg.factory)(params.clone()),
                    source: ResolutionSource::Cache,
                };
            }
        }

        let observed: BTreeSet<u32> = frames
            .iter()
            .filter(|f| f.bus == 0 && f.is_well_formed())
            .map(|f| f.address)
            .collect();
        let candidates: Vec<&Registration> = if observed.is_empty() {
            Vec::new()
        } else {
            self.registrations
                .values()
                .filter(|reg| observed.iter().all(|addr| reg.fingerprint.contains(addr)))
                .collect()
        };

        match candidates.as_slice() {
            [reg] => {
                info!(car = reg.car_name, "fingerprinted vehicle");
                Resolution {
                    interface: (reg.factory)((reg.params)()),
                    source: ResolutionSource::Fingerprint,
                }
            }
            _ => {
                warn!(
                    candidates = candidates.len(),
                    addresses = observed.len(),
                    "vehicle not recognized, falling back to observe-only interface"
                );
                Resolution {
                    interface: Box::new(MockCarInterface::unrecognized()),
                    source: ResolutionSource::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{SPEED_ADDR, buttons_frame, speed_frame};
    use velos_types::MOCK_CAR_NAME;

    const SEDAN_FINGERPRINT: &[u32] = &[SPEED_ADDR, 0x3A0];

    fn sedan_params() -> VehicleParams {
        VehicleParams {
            car_name: "sedan".to_string(),
            ..VehicleParams::default()
        }
    }

    fn registry_with_sedan() -> InterfaceRegistry {
        let mut registry = InterfaceRegistry::with_builtin();
        registry.register(Registration {
            car_name: "sedan",
            fingerprint: SEDAN_FINGERPRINT,
            params: sedan_params,
            factory: |params| Box::new(MockCarInterface::new(params, true)),
        });
        registry
    }

    #[test]
    fn unique_fingerprint_resolves() {
        let registry = InterfaceRegistry::with_builtin();
        let resolution = registry.resolve(&[speed_frame(0.0), buttons_frame(0)], None);
        assert_eq!(resolution.source, ResolutionSource::Fingerprint);
        assert_eq!(resolution.interface.params().car_name, TESTBENCH_CAR_NAME);
        assert!(resolution.interface.has_controller());
    }

    #[test]
    fn ambiguous_fingerprint_falls_back() {
        // The speed frame alone matches both cars.
        let resolution = registry_with_sedan().resolve(&[speed_frame(0.0)], None);
        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.interface.params().car_name, MOCK_CAR_NAME);
        assert!(!resolution.interface.has_controller());
    }

    #[test]
    fn unknown_address_falls_back() {
        let registry = registry_with_sedan();
        let frames = [speed_frame(0.0), CanFrame::new(0x123, vec![0], 0)];
        assert_eq!(registry.resolve(&frames, None).source, ResolutionSource::Fallback);
    }

    #[test]
    fn other_buses_are_ignored() {
        let registry = registry_with_sedan();
        let frames = [speed_frame(0.0), CanFrame::new(0x3A0, vec![0], 0), CanFrame::new(0x555, vec![0], 2)];
        let resolution = registry.resolve(&frames, None);
        assert_eq!(resolution.source, ResolutionSource::Fingerprint);
        assert_eq!(resolution.interface.params().car_name, "sedan");
    }

    #[test]
    fn cached_identity_wins() {
        let registry = registry_with_sedan();
        let mut cached = sedan_params();
        cached.car_vin = "1VELOS0000".to_string();
        let resolution = registry.resolve(&[], Some(&cached));
        assert_eq!(resolution.source, ResolutionSource::Cache);
        assert_eq!(resolution.interface.params().car_vin, "1VELOS0000");
    }

    #[test]
    fn cache_for_unregistered_car_is_ignored() {
        let registry = InterfaceRegistry::with_builtin();
        let resolution = registry.resolve(&[speed_frame(0.0)], Some(&sedan_params()));
        assert_eq!(resolution.source, ResolutionSource::Fingerprint);
    }

    #[test]
    fn car_names_are_listed() {
        let registry = registry_with_sedan();
        let names: Vec<&str> = registry.car_names().into_iter().collect();
        assert_eq!(names, vec!["sedan", TESTBENCH_CAR_NAME]);
    }
}
