//! Building diagnostics from a configuration.

use std::path::Path;

use gridiag_comm::{Communicator, Filesystem, LocalFilesystem};
use gridiag_monitor::Monitor;

use crate::config::{DiagnosticsConfig, OutputFormat};
use crate::diagnostics::{Diagnostics, MonitorDiagnostics, NullDiagnostics};
use crate::error::DiagnosticsError;

/// Constructs the backend monitor for each output format.
pub trait MonitorBuilder {
    /// Monitor for [`OutputFormat::Zarr`].
    fn streaming(
        &self,
        path: &Path,
        communicator: &Communicator,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError>;

    /// Monitor for [`OutputFormat::Netcdf`].
    fn batched(
        &self,
        path: &Path,
        communicator: &Communicator,
        time_chunk_size: usize,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError>;
}

/// The file-backed monitors shipped with gridiag.
///
/// Without the `streaming` feature, [`MonitorBuilder::streaming`] fails
/// with [`DiagnosticsError::BackendUnavailable`]; without `netcdf`,
/// [`MonitorBuilder::batched`] does.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileMonitorBuilder;

impl MonitorBuilder for FileMonitorBuilder {
    #[cfg(feature = "streaming")]
    fn streaming(
        &self,
        path: &Path,
        communicator: &Communicator,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
        use gridiag_monitor::{ChunkedMonitor, DirectoryStore};

        Ok(Box::new(ChunkedMonitor::new(
            DirectoryStore::new(path),
            communicator,
        )))
    }

    #[cfg(not(feature = "streaming"))]
    fn streaming(
        &self,
        _path: &Path,
        _communicator: &Communicator,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
        Err(DiagnosticsError::BackendUnavailable {
            format: OutputFormat::Zarr,
        })
    }

    #[cfg(feature = "netcdf")]
    fn batched(
        &self,
        path: &Path,
        communicator: &Communicator,
        time_chunk_size: usize,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
        use gridiag_monitor::BatchedMonitor;

        Ok(Box::new(BatchedMonitor::new(
            path,
            communicator,
            time_chunk_size,
        )?))
    }

    #[cfg(not(feature = "netcdf"))]
    fn batched(
        &self,
        _path: &Path,
        _communicator: &Communicator,
        _time_chunk_size: usize,
    ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
        Err(DiagnosticsError::BackendUnavailable {
            format: OutputFormat::Netcdf,
        })
    }
}

impl DiagnosticsConfig {
    /// Build the diagnostics for this rank.
    ///
    /// Collective when a path is set: every rank must call it. Without a
    /// path this returns [`NullDiagnostics`] and touches nothing.
    pub fn diagnostics_factory(
        &self,
        communicator: &Communicator,
    ) -> Result<Box<dyn Diagnostics>, DiagnosticsError> {
        self.diagnostics_factory_with(communicator, &LocalFilesystem, &FileMonitorBuilder)
    }

    /// [`diagnostics_factory`](Self::diagnostics_factory) with an explicit
    /// filesystem and backend builder.
    pub fn diagnostics_factory_with(
        &self,
        communicator: &Communicator,
        fs: &dyn Filesystem,
        builder: &dyn MonitorBuilder,
    ) -> Result<Box<dyn Diagnostics>, DiagnosticsError> {
        let Some(path) = self.path() else {
            return Ok(Box::new(NullDiagnostics));
        };

        if !fs.exists(path) {
            fs.makedirs(path)
                .map_err(|source| DiagnosticsError::Filesystem {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        let monitor = match self.output_format() {
            OutputFormat::Zarr => builder.streaming(path, communicator)?,
            OutputFormat::Netcdf => {
                builder.batched(path, communicator, self.time_chunk_size())?
            }
        };
        if communicator.comm().is_root() {
            log::info!(
                "storing diagnostics in {} as {}",
                path.display(),
                self.output_format()
            );
        }

        Ok(Box::new(MonitorDiagnostics::new(
            monitor,
            self.names().to_vec(),
            self.derived_names(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagnosticsOptions;
    use chrono::TimeDelta;
    use gridiag_test_utils::{fixtures, RecordingFilesystem, RecordingMonitor};
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Hands out one prepared recording monitor and notes which
    /// constructor was used.
    struct StubBuilder {
        monitor: RecordingMonitor,
        calls: RefCell<Vec<String>>,
    }

    impl StubBuilder {
        fn new() -> Self {
            Self {
                monitor: RecordingMonitor::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl MonitorBuilder for StubBuilder {
        fn streaming(
            &self,
            path: &Path,
            _communicator: &Communicator,
        ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
            self.calls
                .borrow_mut()
                .push(format!("streaming {}", path.display()));
            Ok(Box::new(self.monitor.clone()))
        }

        fn batched(
            &self,
            path: &Path,
            _communicator: &Communicator,
            time_chunk_size: usize,
        ) -> Result<Box<dyn Monitor>, DiagnosticsError> {
            self.calls
                .borrow_mut()
                .push(format!("batched {} {time_chunk_size}", path.display()));
            Ok(Box::new(self.monitor.clone()))
        }
    }

    fn config(format: &str, names: &[&str], derived: &[&str]) -> DiagnosticsConfig {
        DiagnosticsConfig::new(DiagnosticsOptions {
            path: Some(PathBuf::from("out/diag")),
            output_format: format.to_string(),
            time_chunk_size: 3,
            names: names.iter().map(|s| s.to_string()).collect(),
            derived_names: derived.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    fn handle(builder: &StubBuilder) -> Arc<Mutex<gridiag_test_utils::Recording>> {
        builder.monitor.handle()
    }

    #[test]
    fn no_path_gives_null_diagnostics_without_io() {
        let fs = RecordingFilesystem::new();
        let builder = StubBuilder::new();
        let mut d = DiagnosticsConfig::disabled()
            .diagnostics_factory_with(&Communicator::local(), &fs, &builder)
            .unwrap();
        d.store(TimeDelta::zero().into(), &fixtures::driver_state())
            .unwrap();
        d.cleanup().unwrap();
        assert_eq!(fs.exists_calls(), 0);
        assert!(fs.makedirs_calls().is_empty());
        assert!(builder.calls.borrow().is_empty());
    }

    #[test]
    fn zarr_creates_directory_and_uses_streaming() {
        let fs = RecordingFilesystem::new();
        let builder = StubBuilder::new();
        let d = config("zarr", &["u"], &[])
            .diagnostics_factory_with(&Communicator::local(), &fs, &builder)
            .unwrap();
        assert_eq!(fs.makedirs_calls(), vec![PathBuf::from("out/diag")]);
        assert_eq!(*builder.calls.borrow(), ["streaming out/diag"]);
        d.cleanup().unwrap();
        assert_eq!(handle(&builder).lock().unwrap().cleanups, 1);
    }

    #[test]
    fn netcdf_uses_batched_with_chunk_size() {
        let fs = RecordingFilesystem::new();
        let builder = StubBuilder::new();
        let d = config("netcdf", &["u"], &[])
            .diagnostics_factory_with(&Communicator::local(), &fs, &builder)
            .unwrap();
        assert_eq!(*builder.calls.borrow(), ["batched out/diag 3"]);
        d.cleanup().unwrap();
    }

    #[test]
    fn existing_directory_not_recreated() {
        let fs = RecordingFilesystem::with_existing("out/diag");
        let builder = StubBuilder::new();
        let d = config("zarr", &["u"], &[])
            .diagnostics_factory_with(&Communicator::local(), &fs, &builder)
            .unwrap();
        assert_eq!(fs.exists_calls(), 1);
        assert!(fs.makedirs_calls().is_empty());
        d.cleanup().unwrap();
    }

    #[test]
    fn built_diagnostics_forward_configured_names() {
        let fs = RecordingFilesystem::new();
        let builder = StubBuilder::new();
        let mut d = config("zarr", &["u", "v"], &["column_integrated_qv", "unknown"])
            .diagnostics_factory_with(&Communicator::local(), &fs, &builder)
            .unwrap();
        d.store(TimeDelta::minutes(5).into(), &fixtures::driver_state())
            .unwrap();
        d.cleanup().unwrap();

        let recording = handle(&builder).lock().unwrap().clone();
        assert_eq!(
            recording.records[0].keys().collect::<Vec<_>>(),
            ["time", "u", "v", "column_integrated_qv"]
        );
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn default_builder_writes_batched_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/diag");
        let config = DiagnosticsConfig::new(DiagnosticsOptions {
            path: Some(path.clone()),
            output_format: "netcdf".into(),
            names: vec!["u".into()],
            ..DiagnosticsOptions::default()
        })
        .unwrap();
        let d = config.diagnostics_factory(&Communicator::local()).unwrap();
        assert!(path.is_dir());
        d.cleanup().unwrap();
    }

    #[cfg(not(feature = "netcdf"))]
    #[test]
    fn netcdf_without_netcdf_feature_fails_clearly() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DiagnosticsConfig::new(DiagnosticsOptions {
            path: Some(tmp.path().to_path_buf()),
            output_format: "netcdf".into(),
            ..DiagnosticsOptions::default()
        })
        .unwrap();
        assert!(matches!(
            config.diagnostics_factory(&Communicator::local()),
            Err(DiagnosticsError::BackendUnavailable {
                format: OutputFormat::Netcdf
            })
        ));
    }

    #[cfg(not(feature = "streaming"))]
    #[test]
    fn zarr_without_streaming_feature_fails_clearly() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DiagnosticsConfig::new(DiagnosticsOptions {
            path: Some(tmp.path().to_path_buf()),
            ..DiagnosticsOptions::default()
        })
        .unwrap();
        assert!(matches!(
            config.diagnostics_factory(&Communicator::local()),
            Err(DiagnosticsError::BackendUnavailable {
                format: OutputFormat::Zarr
            })
        ));
    }
}
