//! Storage backends for gridiag diagnostics.
//!
//! A [`Monitor`] persists timestamped mappings of named quantities. Two
//! backends are provided:
//!
//! - [`ChunkedMonitor`] (feature `streaming`, on by default) streams
//!   every timestep straight into a [`DirectoryStore`]: the root rank
//!   writes per-array metadata once, then every rank writes its own
//!   chunk of each field. Nothing is buffered.
//! - [`BatchedMonitor`] (feature `netcdf`, on by default) buffers
//!   `time_chunk_size` timesteps in memory, gathers them onto the root
//!   rank and writes one NetCDF file per window.
//!
//! Chunks and rank-to-rank payloads use the binary format in [`codec`].
//!
//! # Layout
//!
//! ```text
//! chunked:  <root>/time/<t>                 timestamp of step t
//!           <root>/<name>/.meta             array metadata (root only)
//!           <root>/<name>/<t>.<xi>.<yi>     chunk of rank (xi, yi) at step t
//!           <root>/<name>/c.<xi>.<yi>       chunk of a constant field
//! batched:  <root>/state_NNNN.nc            one window of timesteps
//!           <root>/constants.nc             constant fields
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

#[cfg(feature = "netcdf")]
pub mod batched;
#[cfg(feature = "streaming")]
pub mod chunked;
pub mod codec;
pub mod collective;
pub mod error;
pub mod layout;
pub mod record;

#[cfg(feature = "netcdf")]
pub use batched::{read_dataset, BatchedMonitor, Dataset};
#[cfg(feature = "streaming")]
pub use chunked::{ArrayMeta, ChunkedMonitor, DirectoryStore};
pub use codec::Variable;
pub use error::MonitorError;
pub use record::{ConstantRecord, Monitor, StateRecord};

/// Magic bytes at the start of every encoded payload.
pub const MAGIC: [u8; 4] = *b"GDIA";

/// Current payload format version.
pub const FORMAT_VERSION: u8 = 1;

/// Name of the leading time axis in time-stacked variables.
pub const TIME_DIM: &str = "time";
