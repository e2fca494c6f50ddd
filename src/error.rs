//! Error types for beamsig.
//!
//! All errors are strongly typed using thiserror. Each collaborator seam
//! (configuration, geometry computation, simulation connection, report
//! decoding) has its own enum so callers can match on the failing layer.

use thiserror::Error;

/// Errors raised while interpreting the simulation configuration document.
///
/// These are caller errors: the document is assumed schema-valid, and a
/// configuration error during synthesis is fatal: no partially built
/// element is usable.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Unknown simulation type '{found}' (allowed: srw, shadow, madx)")]
    UnknownSimulationType {
        found: String,
    },

    #[error("Configuration document has no 'models' mapping")]
    MissingModels,

    #[error("Model '{model}' is missing from the configuration document")]
    MissingModel {
        model: String,
    },

    #[error("Model entry '{entry}' does not exist")]
    MissingEntry {
        entry: String,
    },

    #[error("Model entry '{entry}' has no '{field}' field")]
    MissingEntryField {
        entry: String,
        field: String,
    },

    #[error("Element '{element}' has no field named '{field}'")]
    UnknownField {
        element: String,
        field: String,
    },

    #[error("Element '{element}' does not support triggering")]
    TriggerNotSupported {
        element: String,
    },
}

/// Errors raised by the remote derived-geometry computation.
#[derive(Debug, Error)]
pub enum ComputationError {
    #[error("Geometry computation failed: {message}")]
    Failed {
        message: String,
    },

    #[error("Geometry computation response is missing key '{key}'")]
    MissingKey {
        key: String,
    },
}

/// Errors raised by the simulation-connection collaborator.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Simulation run failed: {message}")]
    SimulationFailed {
        message: String,
    },

    #[error("Data file unavailable (index {file_index}): {message}")]
    DatafileUnavailable {
        file_index: i64,
        message: String,
    },
}

/// Errors raised while decoding a simulation output file.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("No decoder registered for simulation type '{sim_type}'")]
    UnsupportedSimulationType {
        sim_type: String,
    },

    #[error("Malformed report file '{path}': {message}")]
    MalformedReport {
        path: String,
        message: String,
    },

    #[error("Failed to read report file: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type for beamsig.
///
/// This enum encompasses every failure the bridge can surface to the
/// orchestration layer.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Computation error: {0}")]
    Computation(#[from] ComputationError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BridgeError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this is a geometry-computation error.
    #[must_use]
    pub const fn is_computation(&self) -> bool {
        matches!(self, Self::Computation(_))
    }

    /// Returns true if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns true if this is a decode error.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Result type alias for beamsig operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
