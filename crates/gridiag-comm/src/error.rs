//! Error types for communicator and partitioner operations.

use std::fmt;

/// Errors from collective operations and domain decomposition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// The channel to a peer rank was closed (peer exited or panicked).
    Disconnected {
        /// The peer that went away.
        peer: usize,
    },
    /// The root rank called a broadcast without a payload.
    MissingRootPayload,
    /// A rank index is outside the communicator.
    RankOutOfRange {
        /// Offending rank.
        rank: usize,
        /// Communicator size.
        size: usize,
    },
    /// Partitioner and collective handle disagree on the number of ranks.
    SizeMismatch {
        /// Ranks in the partitioner layout.
        partitioner: usize,
        /// Ranks in the collective handle.
        comm: usize,
    },
    /// A layout with zero ranks along some axis.
    EmptyLayout,
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { peer } => write!(f, "rank {peer} disconnected"),
            Self::MissingRootPayload => write!(f, "root rank must supply the broadcast payload"),
            Self::RankOutOfRange { rank, size } => {
                write!(f, "rank {rank} out of range for communicator of size {size}")
            }
            Self::SizeMismatch { partitioner, comm } => write!(
                f,
                "partitioner covers {partitioner} ranks but communicator has {comm}"
            ),
            Self::EmptyLayout => write!(f, "layout must have at least one rank per axis"),
        }
    }
}

impl std::error::Error for CommError {}
