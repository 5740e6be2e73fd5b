//! 配置校验错误

use elisa_labware::{LabwareError, Microliters, VesselId};
use thiserror::Error;

/// 配置校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Duplicate vessel id: {0}")]
    DuplicateVessel(VesselId),

    #[error("Vessel {vessel} loaded with {loaded}, above its capacity {capacity}")]
    Overfilled {
        vessel: VesselId,
        loaded: Microliters,
        capacity: Microliters,
    },

    #[error("Duplicate pool name: {0}")]
    DuplicatePool(String),

    #[error("Pool '{0}' has no vessels")]
    EmptyPool(String),

    #[error("Pool '{pool}' references unknown vessel {vessel}")]
    UnknownVessel { pool: String, vessel: VesselId },

    #[error("Pool '{pool}': {reason}")]
    InvalidPolicy { pool: String, reason: String },

    #[error("Duplicate group name: {0}")]
    DuplicateGroup(String),

    #[error("Group '{group}' references unknown pool '{pool}'")]
    UnknownPool { group: String, pool: String },

    #[error("Group '{group}' lists {actual} sources; expected 1 or {plates} (one per plate)")]
    SourceCount {
        group: String,
        actual: usize,
        plates: usize,
    },

    #[error("Carve-out references unknown group '{0}'")]
    UnknownGroup(String),

    #[error("Group '{group}': {reason}")]
    InvalidVolume { group: String, reason: String },

    #[error("Group '{group}': {reason}")]
    InvalidPattern { group: String, reason: String },

    #[error(
        "Batch capacity {capacity} plus safety volume {safety} exceeds pipette maximum {max_volume}"
    )]
    CapacityExceeded {
        capacity: Microliters,
        safety: Microliters,
        max_volume: Microliters,
    },

    #[error("Layout must contain at least one plate")]
    NoPlates,

    #[error("Invalid labware: {0}")]
    Labware(#[from] LabwareError),
}
