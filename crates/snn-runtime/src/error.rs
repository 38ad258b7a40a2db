//! Error types for the SNN simulation core

use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur in the SNN runtime.
///
/// Three kinds, per the error-handling design: capacity overflows and
/// consistency errors are raised *during* a tick and are always fatal (the
/// tick is indivisible, nothing is retried, and numerical saturation such as
/// the voltage/weight clamps is never an error); configuration errors are
/// raised at construction time, before any tick runs.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Storage-primitive error (id/time/spike construction)
    #[error("Storage error: {source}")]
    Storage {
        #[from]
        /// Source storage error
        source: snn_storage::StorageError,
    },

    /// Invalid network configuration, caught at construction
    #[error("Invalid network configuration: {reason}")]
    InvalidConfiguration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Invalid parameter value, caught at construction
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Neuron not found
    #[error("Neuron {neuron_id} not found")]
    NeuronNotFound {
        /// Neuron ID that was not found
        neuron_id: u32,
    },

    /// Network topology error (dangling/invalid synapse endpoints, etc.)
    #[error("Network topology error: {reason}")]
    NetworkTopology {
        /// Reason for topology error
        reason: String,
    },

    /// D1 firing-table capacity exceeded during FIND_FIRING.
    ///
    /// Fatal and sticky: the tick that raised it is reported failed; its
    /// partial firing-table writes are rolled back by the next
    /// second-boundary pass rather than retried in place.
    #[error(
        "FIRE_UPDATE_OVERFLOW_D1: firing table D1 exceeded capacity {capacity} at tick {tick}"
    )]
    FireUpdateOverflowD1 {
        /// Tick at which the overflow was detected
        tick: u32,
        /// Configured `maxSpikesD1`
        capacity: u32,
    },

    /// D2 firing-table capacity exceeded during FIND_FIRING.
    #[error(
        "FIRE_UPDATE_OVERFLOW_D2: firing table D2 exceeded capacity {capacity} at tick {tick}"
    )]
    FireUpdateOverflowD2 {
        /// Tick at which the overflow was detected
        tick: u32,
        /// Configured `maxSpikesD2`
        capacity: u32,
    },

    /// Delivery referenced a post-synaptic group id that does not exist.
    #[error(
        "CURRENT_UPDATE_GROUP_UNKNOWN: group {group_id} referenced during delivery does not exist"
    )]
    CurrentUpdateGroupUnknown {
        /// The unresolved group id
        group_id: u32,
    },
}

impl RuntimeError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create a network topology error
    pub fn network_topology(reason: impl Into<String>) -> Self {
        Self::NetworkTopology {
            reason: reason.into(),
        }
    }
}
