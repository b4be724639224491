//! Collective helpers shared by the backends.

use gridiag_comm::CollectiveComm;

use crate::error::MonitorError;

/// Check that every rank passed the same `value`.
///
/// The root compares the gathered payloads and broadcasts the verdict,
/// so every rank returns the same answer and none is left waiting.
pub fn all_ranks_agree(comm: &dyn CollectiveComm, value: &[u8]) -> Result<bool, MonitorError> {
    let gathered = comm.gather_bytes(value.to_vec())?;
    let verdict = gathered.map(|all| {
        let agree = all.iter().all(|v| v.as_slice() == all[0].as_slice());
        vec![u8::from(agree)]
    });
    let verdict = comm.broadcast_bytes(verdict)?;
    Ok(verdict.first() == Some(&1))
}
