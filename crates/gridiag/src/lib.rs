//! gridiag: diagnostics capture for distributed gridded simulations.
//!
//! This is the facade crate that re-exports the public API of the gridiag
//! sub-crates. For most drivers, adding `gridiag` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use gridiag::prelude::*;
//! use chrono::TimeDelta;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = DiagnosticsConfig::new(DiagnosticsOptions {
//!     path: Some(dir.path().join("diagnostics")),
//!     output_format: "netcdf".into(),
//!     names: vec!["u".into()],
//!     derived_names: vec!["column_integrated_qv".into()],
//!     ..DiagnosticsOptions::default()
//! })
//! .unwrap();
//!
//! // A single 2x2x3 column of tracer and pressure thickness.
//! let field = |value: f64, units: &str| {
//!     Quantity::filled([Dim::X, Dim::Y, Dim::Z], &[2, 2, 3], 1, value, units).unwrap()
//! };
//! let dycore: SubState = [
//!     ("u", field(5.0, "m/s")),
//!     ("qv", field(0.01, "kg/kg")),
//!     ("delp", field(100.0, "Pa")),
//! ]
//! .into_iter()
//! .collect();
//! let state = DriverState::new(dycore, SubState::new());
//!
//! let mut diagnostics = config.diagnostics_factory(&Communicator::local()).unwrap();
//! diagnostics.store(TimeDelta::minutes(15).into(), &state).unwrap();
//! diagnostics.cleanup().unwrap();
//!
//! let written = gridiag::monitor::read_dataset(
//!     &dir.path().join("diagnostics").join("state_0000.nc"),
//! )
//! .unwrap();
//! let column = written.variable("column_integrated_qv").unwrap();
//! assert!((column.data[0] - 3.0).abs() < 1e-12);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gridiag-core` | Quantities, driver state, timestamps |
//! | [`comm`] | `gridiag-comm` | Communicator, partitioner, filesystem |
//! | [`monitor`] | `gridiag-monitor` | Storage backends (chunked store, NetCDF windows) |
//! | [`diagnostics`] | `gridiag-diagnostics` | Configuration, factory, derived variables |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Quantities, driver state and timestamps (`gridiag-core`).
pub use gridiag_core as types;

/// Cross-rank collaborators (`gridiag-comm`).
///
/// [`comm::Communicator`] bundles a [`comm::Partitioner`] with a
/// [`comm::CollectiveComm`]; [`comm::ThreadComm`] runs several ranks in
/// one process.
pub use gridiag_comm as comm;

/// Storage backends (`gridiag-monitor`).
///
/// With the `netcdf` feature, `monitor::BatchedMonitor` gathers windows
/// of timesteps onto the root rank and writes NetCDF; with `streaming`,
/// `monitor::ChunkedMonitor` writes per-rank chunks as they arrive.
pub use gridiag_monitor as monitor;

/// Configuration, lifecycle and derived variables (`gridiag-diagnostics`).
pub use gridiag_diagnostics as diagnostics;

/// Common imports for typical gridiag usage.
///
/// ```rust
/// use gridiag::prelude::*;
/// ```
pub mod prelude {
    // Core data
    pub use gridiag_core::{Dim, DriverState, GridData, Quantity, SubState, Timestamp};

    // Collaborators
    pub use gridiag_comm::{CollectiveComm, Communicator, Filesystem, Partitioner};

    // Backends
    pub use gridiag_monitor::{Monitor, StateRecord};

    // Diagnostics
    pub use gridiag_diagnostics::{
        Diagnostics, DiagnosticsConfig, DiagnosticsOptions, OutputFormat,
    };

    // Errors
    pub use gridiag_core::{QuantityError, StateError};
    pub use gridiag_diagnostics::{ConfigError, DiagnosticsError, IntegrationError};
    pub use gridiag_monitor::MonitorError;
}
