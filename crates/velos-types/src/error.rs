use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::ConditionId;

/// Error type shared across the control plane.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VelosError {
    #[error("Alert catalog has no entry for condition {0}")]
    CatalogIncomplete(ConditionId),

    #[error("Alert catalog lists condition {0} more than once")]
    CatalogDuplicate(ConditionId),

    #[error("Invalid alert {label}: {reason}")]
    InvalidAlert { label: String, reason: String },

    #[error("Transport channel error: {0}")]
    Channel(String),

    #[error("Parameter store error: {0}")]
    Params(String),

    #[error("Vehicle interface error: {0}")]
    CarInterface(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for VelosError {
    fn from(err: serde_json::Error) -> Self {
        VelosError::Serialization(err.to_string())
    }
}
