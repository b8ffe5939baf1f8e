//! `velos-params` – persisted configuration store.
//!
//! Rarely-changing toggles and the cached vehicle identity live in a small
//! SQLite key/value table shared by every process on the device.
//!
//! # Modules
//!
//! - [`store`] – [`ParamStore`][store::ParamStore]: blocking and
//!   non-blocking get/put of raw bytes, booleans and strings.
//! - [`keys`] – the well-known key names.

pub mod keys;
pub mod store;

pub use store::{ParamStore, ParamsError};
