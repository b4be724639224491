//! Collective communication between ranks.
//!
//! Payloads are opaque byte buffers so the trait stays object-safe;
//! callers encode whatever they exchange. Every collective must be
//! entered by all ranks in the same order.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::CommError;

/// Rank that receives gathers and originates broadcasts.
pub const ROOT_RANK: usize = 0;

/// The collective operations the storage backends rely on.
pub trait CollectiveComm: Send + Sync {
    /// This process's rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Whether this rank is [`ROOT_RANK`].
    fn is_root(&self) -> bool {
        self.rank() == ROOT_RANK
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;

    /// Gather one payload per rank onto the root.
    ///
    /// The root receives `Some(payloads)` indexed by rank; every other
    /// rank receives `None`.
    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, CommError>;

    /// Broadcast the root's payload to every rank.
    ///
    /// The root must pass `Some`; other ranks pass `None` and receive the
    /// root's bytes.
    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>, CommError>;
}

// ── LocalComm ─────────────────────────────────────────────────────

/// A communicator of exactly one rank. Every collective is local.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalComm;

impl CollectiveComm for LocalComm {
    fn rank(&self) -> usize {
        ROOT_RANK
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }

    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, CommError> {
        Ok(Some(vec![payload]))
    }

    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>, CommError> {
        payload.ok_or(CommError::MissingRootPayload)
    }
}

// ── ThreadComm ────────────────────────────────────────────────────

/// In-process multi-rank communicator: one instance per thread.
///
/// Every ordered pair of ranks has its own unbounded FIFO channel, so
/// messages from consecutive collectives never overtake each other and
/// sends never block.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// `outgoing[dst]` carries messages from this rank to `dst`.
    outgoing: Vec<Sender<Vec<u8>>>,
    /// `incoming[src]` carries messages from `src` to this rank.
    incoming: Vec<Receiver<Vec<u8>>>,
}

impl ThreadComm {
    /// Create `size` connected communicators, indexed by rank.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<Vec<u8>>>> = (0..size).map(|_| Vec::new()).collect();
        for src_senders in senders.iter_mut() {
            for dst_receivers in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                src_senders.push(tx);
                dst_receivers.push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| ThreadComm {
                rank,
                size,
                outgoing,
                incoming,
            })
            .collect()
    }

    fn send(&self, dst: usize, payload: Vec<u8>) -> Result<(), CommError> {
        self.outgoing[dst]
            .send(payload)
            .map_err(|_| CommError::Disconnected { peer: dst })
    }

    fn recv(&self, src: usize) -> Result<Vec<u8>, CommError> {
        self.incoming[src]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: src })
    }
}

impl CollectiveComm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.gather_bytes(Vec::new())?;
        let token = if self.is_root() { Some(Vec::new()) } else { None };
        self.broadcast_bytes(token)?;
        Ok(())
    }

    fn gather_bytes(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>, CommError> {
        if !self.is_root() {
            self.send(ROOT_RANK, payload)?;
            return Ok(None);
        }
        let mut gathered = Vec::with_capacity(self.size);
        gathered.push(payload);
        for src in 1..self.size {
            gathered.push(self.recv(src)?);
        }
        Ok(Some(gathered))
    }

    fn broadcast_bytes(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>, CommError> {
        if !self.is_root() {
            return self.recv(ROOT_RANK);
        }
        let payload = payload.ok_or(CommError::MissingRootPayload)?;
        for dst in 1..self.size {
            self.send(dst, payload.clone())?;
        }
        Ok(payload)
    }
}
