//! Error types for quantity construction and state lookup.

use std::error::Error;
use std::fmt;

/// Errors from [`Quantity`](crate::Quantity) construction and indexing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuantityError {
    /// `dims`, `origin`, `extent` and the array shape disagree in length.
    RankMismatch {
        /// Number of dimension tags.
        dims: usize,
        /// Length of the array shape.
        shape: usize,
        /// Length of `origin`.
        origin: usize,
        /// Length of `extent`.
        extent: usize,
    },
    /// `origin + extent` runs past the padded array on some axis.
    ExtentOutOfBounds {
        /// Offending axis.
        axis: usize,
        /// Origin on that axis.
        origin: usize,
        /// Extent on that axis.
        extent: usize,
        /// Array length on that axis.
        len: usize,
    },
    /// The flat data buffer does not match the product of the shape.
    DataLength {
        /// Elements required by the shape.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },
    /// An index has the wrong rank or falls outside the array.
    IndexOutOfBounds {
        /// The offending index.
        index: Vec<usize>,
    },
}

impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RankMismatch {
                dims,
                shape,
                origin,
                extent,
            } => write!(
                f,
                "rank mismatch: {dims} dims, shape of rank {shape}, \
                 origin of rank {origin}, extent of rank {extent}"
            ),
            Self::ExtentOutOfBounds {
                axis,
                origin,
                extent,
                len,
            } => write!(
                f,
                "axis {axis}: origin {origin} + extent {extent} exceeds length {len}"
            ),
            Self::DataLength { expected, actual } => {
                write!(f, "data has {actual} elements, shape requires {expected}")
            }
            Self::IndexOutOfBounds { index } => write!(f, "index {index:?} out of bounds"),
        }
    }
}

impl Error for QuantityError {}

/// Errors from looking up variables on a [`DriverState`](crate::DriverState).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The variable is present on neither sub-state.
    MissingVariable {
        /// Requested variable name.
        name: String,
    },
    /// The variable is present on both sub-states, so the lookup has no
    /// single answer.
    AmbiguousVariable {
        /// Requested variable name.
        name: String,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVariable { name } => {
                write!(f, "variable '{name}' not found on dycore or physics state")
            }
            Self::AmbiguousVariable { name } => {
                write!(f, "variable '{name}' is defined on both dycore and physics state")
            }
        }
    }
}

impl Error for StateError {}
