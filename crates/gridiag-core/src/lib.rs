//! Core types for the gridiag diagnostics layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the data the diagnostics layer reads but does not own: gridded
//! [`Quantity`] values with padded storage, the [`DriverState`] holding
//! the dycore and physics sub-states, constant [`GridData`], and the
//! [`Timestamp`] attached to every stored record.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dims;
pub mod error;
pub mod quantity;
pub mod state;
pub mod time;

pub use dims::Dim;
pub use error::{QuantityError, StateError};
pub use quantity::{Quantity, RegionIter, Shape};
pub use state::{DriverState, GridData, SubState};
pub use time::{Timestamp, TimestampKind};
