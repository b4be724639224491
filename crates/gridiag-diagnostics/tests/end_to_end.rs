//! Full runs through the default factory and file backends.

use std::thread;

use chrono::TimeDelta;
use gridiag_comm::{Communicator, TilePartitioner};
use gridiag_core::Timestamp;
use gridiag_diagnostics::{DiagnosticsConfig, DiagnosticsOptions};
#[cfg(feature = "netcdf")]
use gridiag_monitor::batched::{read_dataset, window_file_name, CONSTANTS_FILE_NAME};
use gridiag_test_utils::fixtures::{self, NX, NY, NZ};

fn options(path: &std::path::Path, format: &str) -> DiagnosticsOptions {
    DiagnosticsOptions {
        path: Some(path.to_path_buf()),
        output_format: format.to_string(),
        names: vec!["u".into(), "v".into()],
        derived_names: vec!["column_integrated_qv".into()],
        ..DiagnosticsOptions::default()
    }
}

fn minutes(m: i64) -> Timestamp {
    TimeDelta::minutes(m).into()
}

fn u_value(i: usize, j: usize, k: usize) -> f64 {
    (i * 100 + j * 10 + k) as f64
}

#[cfg(feature = "streaming")]
#[test]
fn zarr_run_stores_raw_derived_and_grid() {
    use gridiag_monitor::DirectoryStore;

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("output.zarr");
    let config = DiagnosticsConfig::new(options(&path, "zarr")).unwrap();
    let mut diagnostics = config.diagnostics_factory(&Communicator::local()).unwrap();

    let state = fixtures::driver_state();
    diagnostics.store(minutes(0), &state).unwrap();
    diagnostics.store_grid(&fixtures::grid_data()).unwrap();
    diagnostics.cleanup().unwrap();

    let store = DirectoryStore::new(&path);
    let single = TilePartitioner::single();
    assert_eq!(store.read_times().unwrap(), vec![minutes(0)]);

    let u = store.read_array("u", Some(0), &single).unwrap();
    assert_eq!(u.shape, vec![NX, NY, NZ]);
    assert_eq!(u.units, "m/s");
    assert_eq!(u.get(&[3, 2, 4]), Some(u_value(3, 2, 4)));

    let v = store.read_array("v", Some(0), &single).unwrap();
    assert_eq!(v.get(&[1, 1, 1]), Some(-u_value(1, 1, 1)));

    let column = store.read_array("column_integrated_qv", Some(0), &single).unwrap();
    assert_eq!(column.dims, vec!["x", "y"]);
    assert_eq!(column.units, "kg/m**2");
    for value in &column.data {
        assert!((value - fixtures::qv_column()).abs() < 1e-12);
    }

    let lat = store.read_array("lat", None, &single).unwrap();
    assert_eq!(lat.get(&[0, 2]), Some(10.0));
    assert!(store.read_meta("lon").is_ok());
    assert!(store.read_meta("qv").is_err());
}

#[cfg(feature = "netcdf")]
#[test]
fn netcdf_run_writes_windows_and_constants() {
    let tmp = tempfile::tempdir().unwrap();
    let mut opts = options(tmp.path(), "netcdf");
    opts.time_chunk_size = 2;
    let config = DiagnosticsConfig::new(opts).unwrap();
    let mut diagnostics = config.diagnostics_factory(&Communicator::local()).unwrap();

    diagnostics.store_grid(&fixtures::grid_data()).unwrap();
    let state = fixtures::driver_state();
    for step in 0..3 {
        diagnostics.store(minutes(step * 30), &state).unwrap();
    }
    diagnostics.cleanup().unwrap();

    let first = read_dataset(&tmp.path().join(window_file_name(0))).unwrap();
    assert_eq!(first.times, vec![minutes(0), minutes(30)]);
    let names: Vec<_> = first.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["u", "v", "column_integrated_qv"]);
    let u = first.variable("u").unwrap();
    assert_eq!(u.dims, vec!["time", "x", "y", "z"]);
    assert_eq!(u.get(&[1, 2, 0, 3]), Some(u_value(2, 0, 3)));

    let second = read_dataset(&tmp.path().join(window_file_name(1))).unwrap();
    assert_eq!(second.times, vec![minutes(60)]);
    assert_eq!(second.variable("column_integrated_qv").unwrap().shape, vec![1, NX, NY]);

    let constants = read_dataset(&tmp.path().join(CONSTANTS_FILE_NAME)).unwrap();
    assert!(constants.times.is_empty());
    assert_eq!(constants.variable("lon").unwrap().get(&[3, 0]), Some(30.0));
}

#[cfg(feature = "netcdf")]
#[test]
fn netcdf_run_across_two_ranks_gathers_global_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let config = DiagnosticsConfig::new(options(tmp.path(), "netcdf")).unwrap();

    let handles: Vec<_> = Communicator::threaded(2, 1)
        .unwrap()
        .into_iter()
        .map(|comm| {
            let config = config.clone();
            thread::spawn(move || {
                let mut diagnostics = config.diagnostics_factory(&comm).unwrap();
                diagnostics.store(minutes(0), &fixtures::driver_state()).unwrap();
                diagnostics.cleanup().unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let window = read_dataset(&tmp.path().join(window_file_name(0))).unwrap();
    let u = window.variable("u").unwrap();
    assert_eq!(u.shape, vec![1, 2 * NX, NY, NZ]);
    for gx in 0..2 * NX {
        assert_eq!(u.get(&[0, gx, 1, 2]), Some(u_value(gx % NX, 1, 2)));
    }
}

#[test]
fn disabled_config_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut diagnostics = DiagnosticsConfig::disabled()
        .diagnostics_factory(&Communicator::local())
        .unwrap();
    diagnostics.store(minutes(0), &fixtures::driver_state()).unwrap();
    diagnostics.cleanup().unwrap();
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}
