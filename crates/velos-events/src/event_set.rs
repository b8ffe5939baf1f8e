//! [`EventSet`] – the conditions active in the current cycle.
//!
//! Conditions are either per-cycle (cleared by [`EventSet::clear`]) or static
//! (re-inserted on every clear for the rest of the session). For each
//! condition the set also remembers for how many consecutive cycles it has
//! been present, which is what alert creation delays are measured against.

use std::sync::Arc;
use std::time::Duration;

use velos_types::{Alert, ConditionId, EffectCategory, EffectSet, EventRecord};

use crate::alerts::soft_disable_countdown;
use crate::catalog::{AlertCatalog, AlertContext};

/// Active conditions of one control cycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use velos_events::{AlertCatalog, EventSet};
/// use velos_types::{ConditionId, EffectCategory};
///
/// let catalog = Arc::new(AlertCatalog::standard().unwrap());
/// let mut events = EventSet::new(catalog, Duration::from_millis(10));
///
/// events.add(ConditionId::DoorOpen);
/// assert!(events.contains(EffectCategory::NoEntry));
///
/// events.clear();
/// assert!(events.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct EventSet {
    catalog: Arc<AlertCatalog>,
    tick: Duration,
    active: Vec<ConditionId>,
    statics: Vec<ConditionId>,
    /// Consecutive completed cycles each condition has been present for.
    present_for: Vec<u32>,
}

impl EventSet {
    /// `tick` is the control period; creation delays are counted in ticks.
    pub fn new(catalog: Arc<AlertCatalog>, tick: Duration) -> Self {
        Self {
            catalog,
            tick,
            active: Vec::new(),
            statics: Vec::new(),
            present_for: vec![0; ConditionId::count()],
        }
    }

    /// Mark `id` present for this cycle. Adding twice is harmless.
    pub fn add(&mut self, id: ConditionId) {
        if !self.active.contains(&id) {
            self.active.push(id);
        }
    }

    /// Mark `id` present for this cycle and every cycle after it.
    pub fn add_static(&mut self, id: ConditionId) {
        if !self.statics.contains(&id) {
            self.statics.push(id);
        }
        self.add(id);
    }

    /// Merge conditions reported by another component, e.g. the vehicle
    /// interface or a deserialized event log.
    pub fn ingest_external(&mut self, ids: impl IntoIterator<Item = ConditionId>) {
        for id in ids {
            self.add(id);
        }
    }

    /// Close the cycle: advance persistence counters and reset to the static
    /// conditions.
    pub fn clear(&mut self) {
        for (index, count) in self.present_for.iter_mut().enumerate() {
            let id = ConditionId::ALL[index];
            *count = if self.active.contains(&id) { count.saturating_add(1) } else { 0 };
        }
        self.active.clone_from(&self.statics);
    }

    /// Any active condition carries `category`.
    pub fn contains(&self, category: EffectCategory) -> bool {
        self.active.iter().any(|id| self.catalog.has_effect(*id, category))
    }

    pub fn contains_id(&self, id: ConditionId) -> bool {
        self.active.contains(&id)
    }

    pub fn names(&self) -> &[ConditionId] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Cycles `id` has been continuously present, not counting the current one.
    pub fn persistence(&self, id: ConditionId) -> u32 {
        self.present_for[id.index()]
    }

    /// Resolve the alerts of every active condition for the requested
    /// categories, honoring creation delays. Order follows insertion order of
    /// conditions, then the order of `categories`.
    pub fn resolve_alerts(&self, categories: &[EffectCategory], ctx: &AlertContext<'_>) -> Vec<Alert> {
        let tick_ns = self.tick.as_nanos();
        let mut out = Vec::new();
        for id in &self.active {
            let entry = self.catalog.entry(*id);
            for category in categories {
                let Some(spec) = entry.get(*category) else {
                    continue;
                };
                let mut alert = spec.resolve(ctx);
                if *category == EffectCategory::SoftDisable {
                    alert = soft_disable_countdown(alert, ctx.soft_disable_remaining);
                }
                let held_ns = (u128::from(self.present_for[id.index()]) + 1) * tick_ns;
                if held_ns >= alert.creation_delay.as_nanos() {
                    out.push(alert.tagged(*id, *category));
                }
            }
        }
        out
    }

    /// Serializable view for the event log.
    pub fn to_records(&self) -> Vec<EventRecord> {
        self.active
            .iter()
            .map(|id| EventRecord {
                name: *id,
                categories: self.catalog.entry(*id).categories().collect(),
            })
            .collect()
    }
}

impl EffectSet for EventSet {
    fn contains(&self, category: EffectCategory) -> bool {
        EventSet::contains(self, category)
    }
}
