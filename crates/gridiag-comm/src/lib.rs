//! Parallel-environment collaborators for the gridiag diagnostics layer.
//!
//! The diagnostics core never talks to MPI or the filesystem directly.
//! It goes through the narrow interfaces defined here:
//!
//! - [`CollectiveComm`]: rank/size plus the handful of collectives the
//!   storage backends need (barrier, gather to root, broadcast from root)
//! - [`Partitioner`]: maps a rank's sub-domain into the global grid
//! - [`Communicator`]: bundles the two, as handed to the diagnostics factory
//! - [`Filesystem`]: `exists` / `makedirs`, safe under concurrent ranks
//!
//! Reference implementations are provided for single-process runs
//! ([`LocalComm`]) and for in-process multi-rank runs over
//! crossbeam channels ([`ThreadComm`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collective;
pub mod communicator;
pub mod error;
pub mod fs;
pub mod partitioner;

pub use collective::{CollectiveComm, LocalComm, ThreadComm, ROOT_RANK};
pub use communicator::Communicator;
pub use error::CommError;
pub use fs::{Filesystem, LocalFilesystem};
pub use partitioner::{Partitioner, TilePartitioner};
