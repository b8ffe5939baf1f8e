pub mod alert;
pub mod condition;
pub mod error;
pub mod vehicle;

pub use alert::{Alert, AlertSize, AlertStatus, AudibleAlert, Priority, VisualAlert};
pub use condition::{ConditionId, EffectCategory, EffectSet};
pub use error::VelosError;
pub use vehicle::*;
