//! Placing per-rank blocks into global arrays.

use gridiag_comm::Partitioner;
use gridiag_core::{Dim, RegionIter};

use crate::codec::Variable;
use crate::error::MonitorError;
use crate::TIME_DIM;

/// Copy a dense `block` into `global` at `offset`.
///
/// Both buffers are row-major; the block must fit inside the global shape.
pub fn place_block(
    global: &mut [f64],
    global_shape: &[usize],
    block: &[f64],
    block_shape: &[usize],
    offset: &[usize],
) {
    let zero: Vec<usize> = block_shape.iter().map(|_| 0).collect();
    for (src, idx) in RegionIter::new(&zero, block_shape).enumerate() {
        let mut dst = 0;
        for axis in 0..global_shape.len() {
            dst = dst * global_shape[axis] + idx[axis] + offset[axis];
        }
        global[dst] = block[src];
    }
}

/// Horizontal dims of a variable, ignoring a leading time axis.
fn spatial_dims(v: &Variable) -> Vec<Dim> {
    v.dims
        .iter()
        .filter(|d| d.as_str() != TIME_DIM)
        .map(|d| Dim::from_name(d))
        .collect()
}

/// Assemble the global variable from one block per rank.
///
/// `parts[rank]` is that rank's local variable. A leading `time` axis,
/// if present, is carried through undecomposed. All parts must agree on
/// name, dims and shape.
pub fn assemble(
    parts: &[Variable],
    partitioner: &dyn Partitioner,
) -> Result<Variable, MonitorError> {
    let first = parts.first().ok_or_else(|| MonitorError::Malformed {
        detail: "no parts to assemble".to_string(),
    })?;
    for (rank, part) in parts.iter().enumerate() {
        if part.name != first.name || part.dims != first.dims || part.shape != first.shape {
            return Err(MonitorError::InconsistentLayout {
                name: first.name.clone(),
                reason: format!(
                    "rank {rank} holds {:?} {:?}, rank 0 holds {:?} {:?}",
                    part.dims, part.shape, first.dims, first.shape
                ),
            });
        }
    }

    let timed = first.dims.first().map(String::as_str) == Some(TIME_DIM);
    let spatial = spatial_dims(first);
    let local_spatial = if timed { &first.shape[1..] } else { &first.shape[..] };
    let mut global_shape = partitioner.global_extent(&spatial, local_spatial);
    if timed {
        global_shape.insert(0, first.shape[0]);
    }

    let mut data = vec![0.0; global_shape.iter().product()];
    for (rank, part) in parts.iter().enumerate() {
        let mut offset = partitioner.subtile_offset(rank, &spatial, local_spatial)?;
        if timed {
            offset.insert(0, 0);
        }
        place_block(&mut data, &global_shape, &part.data, &part.shape, &offset);
    }

    Ok(Variable {
        name: first.name.clone(),
        units: first.units.clone(),
        dims: first.dims.clone(),
        shape: global_shape,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridiag_comm::TilePartitioner;
    use proptest::prelude::*;

    fn block(rank: usize, shape: Vec<usize>, dims: &[&str]) -> Variable {
        let n = shape.iter().product();
        Variable {
            name: "q".into(),
            units: "1".into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape,
            data: vec![rank as f64; n],
        }
    }

    #[test]
    fn place_block_writes_at_offset() {
        let mut global = vec![0.0; 12];
        place_block(&mut global, &[3, 4], &[1.0, 2.0, 3.0, 4.0], &[2, 2], &[1, 2]);
        assert_eq!(
            global,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 3.0, 4.0]
        );
    }

    #[test]
    fn assemble_two_by_one_layout() {
        let p = TilePartitioner::new(2, 1).unwrap();
        let parts = vec![block(0, vec![2, 3], &["x", "y"]), block(1, vec![2, 3], &["x", "y"])];
        let global = assemble(&parts, &p).unwrap();
        assert_eq!(global.shape, vec![4, 3]);
        assert_eq!(global.get(&[1, 2]), Some(0.0));
        assert_eq!(global.get(&[2, 0]), Some(1.0));
    }

    #[test]
    fn assemble_keeps_time_axis() {
        let p = TilePartitioner::new(1, 2).unwrap();
        let dims = ["time", "x", "y"];
        let parts = vec![block(0, vec![3, 2, 2], &dims), block(1, vec![3, 2, 2], &dims)];
        let global = assemble(&parts, &p).unwrap();
        assert_eq!(global.shape, vec![3, 2, 4]);
        assert_eq!(global.get(&[2, 1, 3]), Some(1.0));
        assert_eq!(global.get(&[2, 1, 1]), Some(0.0));
    }

    #[test]
    fn mismatched_parts_rejected() {
        let p = TilePartitioner::new(2, 1).unwrap();
        let parts = vec![block(0, vec![2, 3], &["x", "y"]), block(1, vec![2, 2], &["x", "y"])];
        assert!(matches!(
            assemble(&parts, &p),
            Err(MonitorError::InconsistentLayout { .. })
        ));
    }

    proptest! {
        #[test]
        fn assembled_blocks_tile_the_global_array(
            nx in 1usize..4,
            ny in 1usize..4,
            lx in 1usize..4,
            ly in 1usize..4,
            lz in 1usize..3,
        ) {
            let p = TilePartitioner::new(nx, ny).unwrap();
            let (gx, gy) = (nx * lx, ny * ly);
            // Each block holds the flat global index of its points.
            let parts: Vec<Variable> = (0..nx * ny)
                .map(|rank| {
                    let (xi, yi) = p.subtile_index(rank).unwrap();
                    let data = RegionIter::new(&[0, 0, 0], &[lx, ly, lz])
                        .map(|i| (((xi * lx + i[0]) * gy + yi * ly + i[1]) * lz + i[2]) as f64)
                        .collect();
                    Variable {
                        name: "q".into(),
                        units: "1".into(),
                        dims: vec!["x".into(), "y".into(), "z".into()],
                        shape: vec![lx, ly, lz],
                        data,
                    }
                })
                .collect();
            let global = assemble(&parts, &p).unwrap();
            prop_assert_eq!(&global.shape, &vec![gx, gy, lz]);
            let expected: Vec<f64> = (0..gx * gy * lz).map(|n| n as f64).collect();
            prop_assert_eq!(global.data, expected);
        }
    }
}
