//! [`AlertCatalog`] – the total mapping from condition to per-category alerts.
//!
//! Every [`ConditionId`] has an entry, possibly empty. Completeness and the
//! sanity of every alert (including what each factory produces for a neutral
//! context) are checked once, when the catalog is built, so that lookups in
//! the control loop cannot fail.

use std::time::Duration;

use velos_types::{
    Alert, ConditionId, EffectCategory, Personality, SignalSnapshot, VehicleParams, VehicleState,
    VelosError,
};

/// Inputs a dynamic alert may read when it is resolved.
#[derive(Debug, Clone, Copy)]
pub struct AlertContext<'a> {
    pub params: &'a VehicleParams,
    pub state: &'a VehicleState,
    pub signals: &'a SignalSnapshot,
    pub metric: bool,
    pub personality: Personality,
    /// Time left before an ongoing soft disable completes.
    pub soft_disable_remaining: Duration,
}

/// Computes an alert from live context.
pub type AlertFactory = fn(&AlertContext<'_>) -> Alert;

/// Either a fixed alert or a factory evaluated at resolve time.
#[derive(Debug, Clone)]
pub enum AlertSpec {
    Static(Alert),
    Dynamic(AlertFactory),
}

impl AlertSpec {
    pub fn resolve(&self, ctx: &AlertContext<'_>) -> Alert {
        match self {
            AlertSpec::Static(alert) => alert.clone(),
            AlertSpec::Dynamic(factory) => factory(ctx),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CatalogEntry
// ────────────────────────────────────────────────────────────────────────────

/// Alerts for one condition, keyed by effect category.
#[derive(Debug, Clone, Default)]
pub struct CatalogEntry {
    effects: Vec<(EffectCategory, AlertSpec)>,
}

impl CatalogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fixed alert for `category`, replacing any previous one.
    pub fn with(self, category: EffectCategory, alert: Alert) -> Self {
        self.insert(category, AlertSpec::Static(alert))
    }

    /// Attach a computed alert for `category`, replacing any previous one.
    pub fn with_fn(self, category: EffectCategory, factory: AlertFactory) -> Self {
        self.insert(category, AlertSpec::Dynamic(factory))
    }

    fn insert(mut self, category: EffectCategory, spec: AlertSpec) -> Self {
        self.effects.retain(|(c, _)| *c != category);
        self.effects.push((category, spec));
        self
    }

    pub fn get(&self, category: EffectCategory) -> Option<&AlertSpec> {
        self.effects.iter().find(|(c, _)| *c == category).map(|(_, s)| s)
    }

    pub fn contains(&self, category: EffectCategory) -> bool {
        self.get(category).is_some()
    }

    pub fn categories(&self) -> impl Iterator<Item = EffectCategory> + '_ {
        self.effects.iter().map(|(c, _)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AlertCatalog
// ────────────────────────────────────────────────────────────────────────────

/// Validated, total condition -> alerts mapping.
///
/// # Example
///
/// ```
/// use velos_events::AlertCatalog;
/// use velos_types::{ConditionId, EffectCategory};
///
/// let catalog = AlertCatalog::standard().unwrap();
/// let door = catalog.entry(ConditionId::DoorOpen);
/// assert!(door.contains(EffectCategory::NoEntry));
/// assert!(catalog.entry(ConditionId::StockFcw).is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct AlertCatalog {
    entries: Vec<CatalogEntry>,
}

impl AlertCatalog {
    /// Build a catalog, failing on missing or duplicated conditions and on
    /// any alert that cannot be displayed.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ConditionId, CatalogEntry)>,
    ) -> Result<Self, VelosError> {
        let mut slots: Vec<Option<CatalogEntry>> = vec![None; ConditionId::count()];
        for (id, entry) in entries {
            let slot = &mut slots[id.index()];
            if slot.is_some() {
                return Err(VelosError::CatalogDuplicate(id));
            }
            *slot = Some(entry);
        }

        let params = VehicleParams::default();
        let state = VehicleState::default();
        let signals = SignalSnapshot::default();
        let blank_context = AlertContext {
            params: &params,
            state: &state,
            signals: &signals,
            metric: true,
            personality: Personality::default(),
            soft_disable_remaining: Duration::ZERO,
        };

        let mut checked = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let id = ConditionId::ALL[index];
            let entry = slot.ok_or(VelosError::CatalogIncomplete(id))?;
            for (category, spec) in &entry.effects {
                let alert = spec.resolve(&blank_context).tagged(id, *category);
                alert.validate().map_err(|reason| VelosError::InvalidAlert {
                    label: alert.label.clone(),
                    reason,
                })?;
            }
            checked.push(entry);
        }

        Ok(Self { entries: checked })
    }

    /// The shipped catalog.
    pub fn standard() -> Result<Self, VelosError> {
        Self::from_entries(crate::standard::entries())
    }

    pub fn entry(&self, id: ConditionId) -> &CatalogEntry {
        &self.entries[id.index()]
    }

    /// Does condition `id` carry `category`?
    pub fn has_effect(&self, id: ConditionId, category: EffectCategory) -> bool {
        self.entry(id).contains(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{no_entry, normal_permanent};

    fn all_empty() -> Vec<(ConditionId, CatalogEntry)> {
        ConditionId::ALL.iter().map(|id| (*id, CatalogEntry::new())).collect()
    }

    #[test]
    fn standard_catalog_is_total_and_valid() -> Result<(), VelosError> {
        let catalog = AlertCatalog::standard()?;
        for id in ConditionId::ALL {
            let _ = catalog.entry(*id);
        }
        assert!(catalog.has_effect(ConditionId::ControlsMismatch, EffectCategory::ImmediateDisable));
        assert!(catalog.has_effect(ConditionId::ButtonEnable, EffectCategory::Enable));
        Ok(())
    }

    #[test]
    fn missing_condition_is_rejected() {
        let entries = all_empty().into_iter().filter(|(id, _)| *id != ConditionId::Fcw);
        let err = AlertCatalog::from_entries(entries).unwrap_err();
        assert_eq!(err, VelosError::CatalogIncomplete(ConditionId::Fcw));
    }

    #[test]
    fn duplicate_condition_is_rejected() {
        let mut entries = all_empty();
        entries.push((ConditionId::DoorOpen, CatalogEntry::new()));
        let err = AlertCatalog::from_entries(entries).unwrap_err();
        assert_eq!(err, VelosError::CatalogDuplicate(ConditionId::DoorOpen));
    }

    #[test]
    fn invalid_alert_is_rejected_with_label() {
        let mut entries = all_empty();
        entries.retain(|(id, _)| *id != ConditionId::LowMemory);
        entries.push((
            ConditionId::LowMemory,
            CatalogEntry::new().with(EffectCategory::NoEntry, no_entry("Low Memory").with_rate(f32::INFINITY)),
        ));
        match AlertCatalog::from_entries(entries) {
            Err(VelosError::InvalidAlert { label, .. }) => assert_eq!(label, "lowMemory/noEntry"),
            other => panic!("expected InvalidAlert, got {other:?}"),
        }
    }

    #[test]
    fn broken_factory_is_caught_at_construction() {
        fn blank(_: &AlertContext<'_>) -> Alert {
            normal_permanent("", "")
        }
        let mut entries = all_empty();
        entries.retain(|(id, _)| *id != ConditionId::NoGps);
        entries.push((ConditionId::NoGps, CatalogEntry::new().with_fn(EffectCategory::Permanent, blank)));
        assert!(AlertCatalog::from_entries(entries).is_err());
    }

    #[test]
    fn entry_replaces_same_category() {
        let entry = CatalogEntry::new()
            .with(EffectCategory::NoEntry, no_entry("first"))
            .with(EffectCategory::NoEntry, no_entry("second"));
        assert_eq!(entry.categories().count(), 1);
        match entry.get(EffectCategory::NoEntry) {
            Some(AlertSpec::Static(alert)) => assert_eq!(alert.text_2, "second"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
