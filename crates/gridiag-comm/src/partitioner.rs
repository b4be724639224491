//! Domain decomposition: where a rank's sub-domain sits in the global grid.

use gridiag_core::Dim;

use crate::error::CommError;

/// Maps per-rank sub-domains to the global grid.
///
/// Decomposition is along the horizontal axes only; every rank holds the
/// full vertical column and any non-spatial axes.
pub trait Partitioner: Send + Sync {
    /// Ranks along `(x, y)`.
    fn layout(&self) -> (usize, usize);

    /// Position of `rank` in the layout as `(x index, y index)`.
    fn subtile_index(&self, rank: usize) -> Result<(usize, usize), CommError>;

    /// Total ranks covered by the layout.
    fn total_ranks(&self) -> usize {
        let (nx, ny) = self.layout();
        nx * ny
    }

    /// Global extent of a field whose per-rank extent is `local_extent`.
    ///
    /// Interface axes share their edge points between neighbouring ranks,
    /// so `n` ranks of `m` interface points cover `n * (m - 1) + 1`.
    fn global_extent(&self, dims: &[Dim], local_extent: &[usize]) -> Vec<usize> {
        let (nx, ny) = self.layout();
        dims.iter()
            .zip(local_extent)
            .map(|(dim, &len)| {
                let ranks = axis_ranks(dim, nx, ny);
                if dim.is_interface() && ranks > 1 && len > 0 {
                    ranks * (len - 1) + 1
                } else {
                    ranks * len
                }
            })
            .collect()
    }

    /// Start of `rank`'s sub-domain in the global field, per axis.
    fn subtile_offset(
        &self,
        rank: usize,
        dims: &[Dim],
        local_extent: &[usize],
    ) -> Result<Vec<usize>, CommError> {
        let (xi, yi) = self.subtile_index(rank)?;
        Ok(dims
            .iter()
            .zip(local_extent)
            .map(|(dim, &len)| {
                let stride = if dim.is_interface() { len.saturating_sub(1) } else { len };
                if dim.is_x() {
                    xi * stride
                } else if dim.is_y() {
                    yi * stride
                } else {
                    0
                }
            })
            .collect())
    }
}

fn axis_ranks(dim: &Dim, nx: usize, ny: usize) -> usize {
    if dim.is_x() {
        nx
    } else if dim.is_y() {
        ny
    } else {
        1
    }
}

/// A rectangular `nx × ny` layout of equally sized sub-domains.
///
/// Ranks are numbered x-fastest: rank `r` sits at `(r % nx, r / nx)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilePartitioner {
    nx: usize,
    ny: usize,
}

impl TilePartitioner {
    /// Create a layout of `nx` ranks along x and `ny` along y.
    pub fn new(nx: usize, ny: usize) -> Result<Self, CommError> {
        if nx == 0 || ny == 0 {
            return Err(CommError::EmptyLayout);
        }
        Ok(Self { nx, ny })
    }

    /// The trivial one-rank layout.
    pub fn single() -> Self {
        Self { nx: 1, ny: 1 }
    }
}

impl Partitioner for TilePartitioner {
    fn layout(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    fn subtile_index(&self, rank: usize) -> Result<(usize, usize), CommError> {
        let size = self.nx * self.ny;
        if rank >= size {
            return Err(CommError::RankOutOfRange { rank, size });
        }
        Ok((rank % self.nx, rank / self.nx))
    }
}
