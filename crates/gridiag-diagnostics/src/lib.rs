//! Diagnostics capture for gridded simulation drivers.
//!
//! A driver builds a [`DiagnosticsConfig`] (usually by deserializing its
//! configuration document), asks it for a [`Diagnostics`] instance with
//! [`DiagnosticsConfig::diagnostics_factory`], and then on every rank:
//!
//! 1. optionally calls [`Diagnostics::store_grid`] once,
//! 2. calls [`Diagnostics::store`] at each diagnostics time,
//! 3. calls [`Diagnostics::cleanup`] once at the end of the run.
//!
//! Each stored record holds the configured raw variables, looked up in
//! the union of the dycore and physics sub-states, plus any derived
//! variables such as `column_integrated_<tracer>`.
//!
//! # Features
//!
//! - `streaming` (default): the chunked directory backend behind the
//!   `"zarr"` output format.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod column;
pub mod config;
pub mod derived;
pub mod diagnostics;
pub mod error;
pub mod factory;

pub use column::{integrate, COLUMN_INTEGRAL_UNITS};
pub use config::{DiagnosticsConfig, DiagnosticsOptions, OutputFormat};
pub use derived::{
    ColumnIntegrated, ColumnIntegratedKind, DerivedKind, DerivedPlan, DerivedRecipe,
    DerivedRegistry, COLUMN_INTEGRATED_PREFIX,
};
pub use diagnostics::{Diagnostics, MonitorDiagnostics, NullDiagnostics};
pub use error::{ConfigError, DiagnosticsError, IntegrationError};
pub use factory::{FileMonitorBuilder, MonitorBuilder};
