//! The communicator handed to the diagnostics factory.

use std::fmt;
use std::sync::Arc;

use crate::collective::{CollectiveComm, LocalComm, ThreadComm};
use crate::error::CommError;
use crate::partitioner::{Partitioner, TilePartitioner};

/// A partitioner plus a collective-communication handle for one rank.
///
/// Cheap to clone; backends keep their own handle for the lifetime of
/// the run.
#[derive(Clone)]
pub struct Communicator {
    partitioner: Arc<dyn Partitioner>,
    comm: Arc<dyn CollectiveComm>,
}

impl Communicator {
    /// Pair a partitioner with a collective handle of matching size.
    pub fn new(
        partitioner: Arc<dyn Partitioner>,
        comm: Arc<dyn CollectiveComm>,
    ) -> Result<Self, CommError> {
        if partitioner.total_ranks() != comm.size() {
            return Err(CommError::SizeMismatch {
                partitioner: partitioner.total_ranks(),
                comm: comm.size(),
            });
        }
        Ok(Self { partitioner, comm })
    }

    /// A single-rank communicator.
    pub fn local() -> Self {
        Self {
            partitioner: Arc::new(TilePartitioner::single()),
            comm: Arc::new(LocalComm),
        }
    }

    /// One communicator per rank of an in-process `nx × ny` layout.
    ///
    /// Each element is meant to be moved into its own thread.
    pub fn threaded(nx: usize, ny: usize) -> Result<Vec<Self>, CommError> {
        let partitioner: Arc<dyn Partitioner> = Arc::new(TilePartitioner::new(nx, ny)?);
        ThreadComm::create(nx * ny)
            .into_iter()
            .map(|comm| Self::new(Arc::clone(&partitioner), Arc::new(comm)))
            .collect()
    }

    /// The domain-decomposition partitioner.
    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    /// The collective-communication handle.
    pub fn comm(&self) -> &Arc<dyn CollectiveComm> {
        &self.comm
    }

    /// Shorthand for `comm().rank()`.
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("layout", &self.partitioner.layout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_is_one_rank() {
        let c = Communicator::local();
        assert_eq!(c.rank(), 0);
        assert_eq!(c.comm().size(), 1);
        assert_eq!(c.partitioner().layout(), (1, 1));
    }

    #[test]
    fn mismatched_sizes_rejected() {
        let err = Communicator::new(
            Arc::new(TilePartitioner::new(2, 1).unwrap()),
            Arc::new(LocalComm),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CommError::SizeMismatch {
                partitioner: 2,
                comm: 1
            }
        );
    }

    #[test]
    fn threaded_assigns_ranks_in_order() {
        let comms = Communicator::threaded(2, 2).unwrap();
        let ranks: Vec<_> = comms.iter().map(Communicator::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }
}
