//! Error types for the storage backends.

use std::fmt;
use std::io;

use gridiag_comm::CommError;
use gridiag_core::QuantityError;

/// Errors raised while persisting diagnostics.
#[derive(Debug)]
pub enum MonitorError {
    /// An I/O error while reading or writing the store.
    Io(io::Error),
    /// A collective operation failed.
    Comm(CommError),
    /// A quantity could not be rebuilt from stored data.
    Quantity(QuantityError),
    /// The NetCDF library rejected an operation.
    #[cfg(feature = "netcdf")]
    Netcdf(netcdf::Error),
    /// Stored data is not what this crate writes (bad magic, truncated, ...).
    Malformed {
        /// What went wrong.
        detail: String,
    },
    /// The container was written by an unsupported format version.
    UnsupportedVersion {
        /// The version found in the data.
        found: u8,
    },
    /// Ranks disagree on the batched window size.
    InconsistentChunkSize {
        /// This rank's configured size.
        local: usize,
    },
    /// A field's layout differs between ranks or between timesteps.
    InconsistentLayout {
        /// Field name.
        name: String,
        /// Description of the mismatch.
        reason: String,
    },
    /// A timestep record carries a different set of fields than the
    /// records before it in the same window.
    InconsistentFields {
        /// Field names of the first record in the window.
        expected: Vec<String>,
        /// Field names of the offending record.
        found: Vec<String>,
    },
    /// A field name cannot be used as an array name in the store.
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A stored array or chunk was not found.
    NotFound {
        /// Store key that was missing.
        key: String,
    },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Comm(e) => write!(f, "communication error: {e}"),
            Self::Quantity(e) => write!(f, "invalid quantity: {e}"),
            #[cfg(feature = "netcdf")]
            Self::Netcdf(e) => write!(f, "NetCDF error: {e}"),
            Self::Malformed { detail } => write!(f, "malformed container: {detail}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::InconsistentChunkSize { local } => write!(
                f,
                "time_chunk_size {local} on this rank does not match the other ranks"
            ),
            Self::InconsistentLayout { name, reason } => {
                write!(f, "inconsistent layout for '{name}': {reason}")
            }
            Self::InconsistentFields { expected, found } => write!(
                f,
                "record fields {found:?} differ from window fields {expected:?}"
            ),
            Self::InvalidName { name, reason } => {
                write!(f, "invalid array name '{name}': {reason}")
            }
            Self::NotFound { key } => write!(f, "key '{key}' not found in store"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Comm(e) => Some(e),
            Self::Quantity(e) => Some(e),
            #[cfg(feature = "netcdf")]
            Self::Netcdf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MonitorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<CommError> for MonitorError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for MonitorError {
    fn from(e: netcdf::Error) -> Self {
        Self::Netcdf(e)
    }
}

impl From<QuantityError> for MonitorError {
    fn from(e: QuantityError) -> Self {
        Self::Quantity(e)
    }
}
