//! Multi-rank tests for both backends.
//!
//! Each rank runs on its own thread with a `ThreadComm`. Every rank fills
//! its sub-domain with values derived from global coordinates, so the
//! reassembled array can be checked point by point.

use std::borrow::Cow;
#[cfg(feature = "netcdf")]
use std::path::Path;
use std::thread;

use chrono::TimeDelta;
use gridiag_comm::{Communicator, Partitioner, TilePartitioner};
use gridiag_core::{Dim, Quantity};
#[cfg(feature = "netcdf")]
use gridiag_monitor::batched::{read_dataset, window_file_name, CONSTANTS_FILE_NAME};
#[cfg(feature = "netcdf")]
use gridiag_monitor::{BatchedMonitor, MonitorError};
#[cfg(feature = "streaming")]
use gridiag_monitor::{ChunkedMonitor, DirectoryStore};
use gridiag_monitor::{ConstantRecord, Monitor, StateRecord};

const LOCAL: [usize; 3] = [3, 2, 2];

fn global_value(gx: usize, gy: usize, k: usize, step: usize) -> f64 {
    (step * 1000 + gx * 100 + gy * 10 + k) as f64
}

/// The rank's piece of a field whose global values follow `global_value`.
fn local_field(comm: &Communicator, step: usize) -> Quantity {
    let (xi, yi) = comm.partitioner().subtile_index(comm.rank()).unwrap();
    let mut q = Quantity::filled([Dim::X, Dim::Y, Dim::Z], &LOCAL, 2, f64::NAN, "kg/kg").unwrap();
    let origin = q.origin().to_vec();
    for idx in q.compute_region().collect::<Vec<_>>() {
        let gx = xi * LOCAL[0] + idx[0] - origin[0];
        let gy = yi * LOCAL[1] + idx[1] - origin[1];
        q.set(&idx, global_value(gx, gy, idx[2], step)).unwrap();
    }
    q
}

fn run_ranks<F>(nx: usize, ny: usize, body: F)
where
    F: Fn(Communicator) + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = Communicator::threaded(nx, ny)
        .unwrap()
        .into_iter()
        .map(|comm| {
            let body = body.clone();
            thread::spawn(move || body(comm))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn drive(monitor: &mut dyn Monitor, comm: &Communicator, steps: usize) {
    for step in 0..steps {
        let q = local_field(comm, step);
        let mut record = StateRecord::new(TimeDelta::minutes(step as i64 * 15).into());
        record.insert("qv", Cow::Borrowed(&q));
        monitor.store(&record).unwrap();
    }
    let lat = local_field(comm, 99);
    let constants: ConstantRecord<'_> = [("lat".to_string(), &lat)].into_iter().collect();
    monitor.store_constant(&constants).unwrap();
    monitor.cleanup().unwrap();
}

/// Compare every global point of `step`; `timed` arrays carry a leading
/// time axis indexed by `step`.
fn check_global(get: impl Fn(&[usize]) -> Option<f64>, step: usize, timed: bool) {
    for gx in 0..6 {
        for gy in 0..4 {
            for k in 0..2 {
                let idx = if timed {
                    vec![step, gx, gy, k]
                } else {
                    vec![gx, gy, k]
                };
                let expected = global_value(gx, gy, k, step);
                assert_eq!(get(&idx), Some(expected), "at {idx:?}");
            }
        }
    }
}

#[cfg(feature = "streaming")]
#[test]
fn chunked_store_reassembles_two_by_two_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    run_ranks(2, 2, move |comm| {
        let mut monitor = ChunkedMonitor::new(DirectoryStore::new(&root), &comm);
        drive(&mut monitor, &comm, 3);
    });

    let store = DirectoryStore::new(tmp.path());
    let partitioner = TilePartitioner::new(2, 2).unwrap();
    assert_eq!(store.read_times().unwrap().len(), 3);
    assert_eq!(store.read_meta("qv").unwrap().shape, vec![6, 4, 2]);
    for step in 0..3 {
        let v = store.read_array("qv", Some(step), &partitioner).unwrap();
        check_global(|idx| v.get(idx), step, false);
    }
    let lat = store.read_array("lat", None, &partitioner).unwrap();
    check_global(|idx| lat.get(idx), 99, false);
}

#[cfg(feature = "netcdf")]
#[test]
fn batched_store_gathers_windows_on_root() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    run_ranks(2, 2, move |comm| {
        let mut monitor = BatchedMonitor::new(&root, &comm, 2).unwrap();
        drive(&mut monitor, &comm, 3);
    });

    let first = read_dataset(&tmp.path().join(window_file_name(0))).unwrap();
    let qv = first.variable("qv").unwrap();
    assert_eq!(qv.shape, vec![2, 6, 4, 2]);
    for step in 0..2 {
        check_global(|idx| qv.get(idx), step, true);
    }

    let second = read_dataset(&tmp.path().join(window_file_name(1))).unwrap();
    assert_eq!(second.times, vec![TimeDelta::minutes(30).into()]);
    assert!(!tmp.path().join(window_file_name(2)).exists());

    let constants = read_dataset(&tmp.path().join(CONSTANTS_FILE_NAME)).unwrap();
    let lat = constants.variable("lat").unwrap();
    check_global(|idx| lat.get(idx), 99, false);
}

#[cfg(feature = "netcdf")]
#[test]
fn disagreeing_chunk_sizes_fail_on_every_rank() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    run_ranks(2, 1, move |comm| {
        let size = if comm.rank() == 0 { 2 } else { 3 };
        let result = BatchedMonitor::new(Path::new(&root), &comm, size);
        assert!(matches!(
            result,
            Err(MonitorError::InconsistentChunkSize { .. })
        ));
    });
}
