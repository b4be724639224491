//! Error types for configuration, derived computation and the
//! diagnostics lifecycle.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use gridiag_core::{Dim, QuantityError, StateError, Timestamp};
use gridiag_monitor::MonitorError;

use crate::config::OutputFormat;

// ── ConfigError ────────────────────────────────────────────────────

/// Invalid diagnostics configuration, detected at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Variables were requested but no output path was given.
    MissingPath,
    /// `output_format` is not one of the recognized values.
    UnknownOutputFormat {
        /// The value found in the configuration.
        found: String,
    },
    /// `time_chunk_size` is zero.
    ZeroTimeChunkSize,
    /// A name appears in both `names` and `derived_names`.
    NameCollision {
        /// The colliding name.
        name: String,
    },
    /// A name appears twice in the same list.
    DuplicateName {
        /// The repeated name.
        name: String,
    },
    /// A name is reserved for the time coordinate of every record.
    ReservedName {
        /// The reserved name.
        name: String,
    },
    /// A name cannot be used as a stored array name.
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPath => write!(
                f,
                "diagnostics names were given, but no path to store them"
            ),
            Self::UnknownOutputFormat { found } => write!(
                f,
                "unknown output format '{found}', expected 'zarr' or 'netcdf'"
            ),
            Self::ZeroTimeChunkSize => write!(f, "time_chunk_size must be at least 1"),
            Self::NameCollision { name } => write!(
                f,
                "'{name}' is listed in both names and derived_names"
            ),
            Self::DuplicateName { name } => write!(f, "'{name}' is listed twice"),
            Self::ReservedName { name } => {
                write!(f, "'{name}' is reserved for the record time")
            }
            Self::InvalidName { name, reason } => {
                write!(f, "'{name}' is not a valid variable name: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

// ── IntegrationError ───────────────────────────────────────────────

/// Inputs to the column integral violate its contract.
#[derive(Clone, Debug, PartialEq)]
pub enum IntegrationError {
    /// The tracer has fewer than three dimensions.
    TooFewDimensions {
        /// Number of dimensions found.
        ndim: usize,
    },
    /// The third dimension is not the vertical.
    VerticalAxisMisplaced {
        /// The dimension found at axis 2.
        found: Dim,
    },
    /// `delp` does not line up with the tracer.
    ShapeMismatch {
        /// Description of the mismatch.
        reason: String,
    },
    /// The result could not be constructed.
    Quantity(QuantityError),
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewDimensions { ndim } => write!(
                f,
                "column integral needs at least 3 dimensions, tracer has {ndim}"
            ),
            Self::VerticalAxisMisplaced { found } => write!(
                f,
                "column integral expects the vertical as the third dimension, found '{found}'"
            ),
            Self::ShapeMismatch { reason } => write!(f, "delp does not match tracer: {reason}"),
            Self::Quantity(e) => write!(f, "column integral result: {e}"),
        }
    }
}

impl Error for IntegrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Quantity(e) => Some(e),
            _ => None,
        }
    }
}

impl From<QuantityError> for IntegrationError {
    fn from(e: QuantityError) -> Self {
        Self::Quantity(e)
    }
}

// ── DiagnosticsError ───────────────────────────────────────────────

/// Any failure raised by the diagnostics layer.
#[derive(Debug)]
pub enum DiagnosticsError {
    /// Invalid configuration.
    Config(ConfigError),
    /// A requested variable is missing or ambiguous.
    State(StateError),
    /// A derived diagnostic could not be computed.
    Integration(IntegrationError),
    /// The backend monitor failed.
    Monitor(MonitorError),
    /// `store` was called with a time that does not follow the previous one.
    NonMonotonicTime {
        /// Time of the previous stored record.
        previous: Timestamp,
        /// Time passed to the rejected call.
        current: Timestamp,
    },
    /// `store_grid` was called a second time.
    GridAlreadyStored,
    /// The requested backend was not compiled in.
    BackendUnavailable {
        /// The requested output format.
        format: OutputFormat,
    },
    /// The output directory could not be created.
    Filesystem {
        /// The directory.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

impl fmt::Display for DiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid diagnostics config: {e}"),
            Self::State(e) => write!(f, "{e}"),
            Self::Integration(e) => write!(f, "{e}"),
            Self::Monitor(e) => write!(f, "diagnostics monitor failed: {e}"),
            Self::NonMonotonicTime { previous, current } => write!(
                f,
                "diagnostics time must strictly increase: got {current} after {previous}"
            ),
            Self::GridAlreadyStored => write!(f, "grid data was already stored"),
            Self::BackendUnavailable { format } => {
                let feature = match format {
                    OutputFormat::Zarr => "streaming",
                    OutputFormat::Netcdf => "netcdf",
                };
                write!(f, "output format '{format}' needs the '{feature}' feature")
            }
            Self::Filesystem { path, source } => {
                write!(f, "cannot create {}: {source}", path.display())
            }
        }
    }
}

impl Error for DiagnosticsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::State(e) => Some(e),
            Self::Integration(e) => Some(e),
            Self::Monitor(e) => Some(e),
            Self::Filesystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for DiagnosticsError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StateError> for DiagnosticsError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<IntegrationError> for DiagnosticsError {
    fn from(e: IntegrationError) -> Self {
        Self::Integration(e)
    }
}

impl From<MonitorError> for DiagnosticsError {
    fn from(e: MonitorError) -> Self {
        Self::Monitor(e)
    }
}
