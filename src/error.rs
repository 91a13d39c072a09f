//! Error types for the counter simulator and validation harness.
//!
//! Errors are grouped by where they can occur so that callers can decide how
//! far a failure is allowed to travel: configuration errors stop startup,
//! store and tick errors stay inside one counter generator, protocol errors
//! stay inside one scenario.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors: unknown entities, malformed policies and paths,
/// unreadable input files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An entity name is missing from the object identifier map.
    #[error("Entity '{name}' not found in {table}")]
    UnknownEntity {
        /// Interface or queue name that was looked up.
        name: String,
        /// Name map that was searched.
        table: &'static str,
    },

    /// A path string could not be parsed.
    #[error("Malformed path '{path}': {reason}")]
    MalformedPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A counter policy entry is unusable.
    #[error("Invalid policy for counter '{counter}': {reason}")]
    InvalidPolicy {
        /// Counter name from the policy document.
        counter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An input file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An input file was read but could not be decoded.
    #[error("Failed to decode {}: {reason}", path.display())]
    Decode {
        /// File (or document name) that was decoded.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// The harness configuration holds values no run can work with.
    #[error("Invalid configuration: {reason}")]
    Invalid {
        /// Which setting is wrong.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The store was reached but the operation failed.
    #[error("Store backend error: {0}")]
    BackendError(String),
}

/// Errors in the shape of a telemetry response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The response did not carry exactly one notification.
    #[error("got {actual} notifications, want 1")]
    NotificationCount {
        /// Notifications received.
        actual: usize,
    },

    /// The notification did not carry exactly one update.
    #[error("got {actual} updates in the notification, want 1")]
    UpdateCount {
        /// Updates received.
        actual: usize,
    },

    /// The update has no value.
    #[error("update carries no typed value")]
    MissingValue,

    /// A structured or decimal value could not be decoded.
    #[error("malformed structured payload: {reason}")]
    MalformedPayload {
        /// Decoder message.
        reason: String,
    },

    /// The value uses an encoding the comparator cannot render.
    #[error("unsupported scalar encoding: {kind}")]
    UnsupportedScalar {
        /// Name of the typed value variant.
        kind: &'static str,
    },
}

/// Errors that abandon a single simulation tick.
#[derive(Debug, Error)]
pub enum TickError {
    /// The tick did not finish within its budget.
    #[error("Tick timed out after {duration_ms}ms")]
    Timeout {
        /// The budget that was exceeded.
        duration_ms: u64,
    },

    /// Reading or writing the counter row failed.
    #[error("Store write failed: {0}")]
    Store(#[from] StoreError),

    /// The simulation was shut down mid-tick.
    #[error("Tick cancelled")]
    Cancelled,
}

/// Top-level error type for the harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed telemetry response.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Simulation tick error.
    #[error("Tick error: {0}")]
    Tick(#[from] TickError),

    /// The telemetry service could not be dialed.
    #[error("Transport error: {message}")]
    Transport {
        /// Error description.
        message: String,
    },

    /// The suite report could not be written.
    #[error("Report error: {message}")]
    Report {
        /// Error description.
        message: String,
    },
}

impl HarnessError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this error must stop the process at startup.
    #[must_use]
    pub const fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if retrying the same operation later can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Protocol(_) | Self::Report { .. } => false,
            Self::Store(e) => matches!(e, StoreError::ConnectionError(_)),
            Self::Tick(e) => matches!(e, TickError::Timeout { .. } | TickError::Store(_)),
            Self::Transport { .. } => true,
        }
    }
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
