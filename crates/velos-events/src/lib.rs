//! `velos-events` – from detected conditions to the one alert on screen.
//!
//! # Modules
//!
//! - [`alerts`] – builders for the recurring alert shapes and the factories
//!   for alerts whose text depends on live signals.
//! - [`catalog`] – [`AlertCatalog`], the total mapping from every condition
//!   to its per-category alerts, validated once at construction.
//! - [`standard`] – the shipped catalog contents.
//! - [`event_set`] – [`EventSet`], the per-cycle set of active conditions
//!   with persistence counters for creation delays.
//! - [`arbiter`] – [`AlertArbiter`], which picks the single alert to display.

pub mod alerts;
pub mod arbiter;
pub mod catalog;
pub mod event_set;
pub mod standard;

pub use arbiter::{ActiveAlert, AlertArbiter};
pub use catalog::{AlertCatalog, AlertContext, AlertFactory, AlertSpec, CatalogEntry};
pub use event_set::EventSet;
