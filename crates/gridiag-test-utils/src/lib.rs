//! Test utilities and mock collaborators for gridiag development.
//!
//! Provides a [`RecordingMonitor`] that keeps every record it is handed,
//! a [`RecordingFilesystem`] that counts calls instead of touching disk,
//! standard driver-state [`fixtures`], and [`capture_logs`] for asserting
//! on log output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod logs;

pub use logs::{capture_logs, messages_at, CapturedLog};

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use gridiag_comm::Filesystem;
use gridiag_core::Quantity;
use gridiag_monitor::{ConstantRecord, Monitor, MonitorError, StateRecord};
use indexmap::IndexMap;

/// Everything a [`RecordingMonitor`] has been handed.
#[derive(Clone, Debug, Default)]
pub struct Recording {
    pub records: Vec<StateRecord<'static>>,
    pub constants: Vec<IndexMap<String, Quantity>>,
    pub cleanups: usize,
}

/// Mock [`Monitor`] that clones every record into a shared [`Recording`].
///
/// Keep a [`handle`](RecordingMonitor::handle) before moving the monitor
/// into the code under test, then inspect the recording afterwards.
#[derive(Clone, Debug, Default)]
pub struct RecordingMonitor {
    recording: Arc<Mutex<Recording>>,
    fail_after: Option<usize>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A monitor whose `store` fails once `n` records have been accepted.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Shared view of the recording.
    pub fn handle(&self) -> Arc<Mutex<Recording>> {
        Arc::clone(&self.recording)
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        // A poisoned lock only means another test thread panicked.
        self.recording.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Monitor for RecordingMonitor {
    fn store(&mut self, record: &StateRecord<'_>) -> Result<(), MonitorError> {
        let fail_after = self.fail_after;
        let mut recording = self.lock();
        if fail_after.is_some_and(|n| recording.records.len() >= n) {
            return Err(MonitorError::Io(io::Error::other("recording monitor is full")));
        }
        recording.records.push(record.clone().into_owned());
        Ok(())
    }

    fn store_constant(&mut self, fields: &ConstantRecord<'_>) -> Result<(), MonitorError> {
        let owned = fields
            .iter()
            .map(|(name, q)| (name.clone(), (*q).clone()))
            .collect();
        self.lock().constants.push(owned);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), MonitorError> {
        self.lock().cleanups += 1;
        Ok(())
    }
}

/// Mock [`Filesystem`] that tracks directories in memory.
#[derive(Debug, Default)]
pub struct RecordingFilesystem {
    state: Mutex<FsState>,
}

#[derive(Debug, Default)]
struct FsState {
    existing: HashSet<PathBuf>,
    exists_calls: usize,
    makedirs_calls: Vec<PathBuf>,
}

impl RecordingFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A filesystem where `path` already exists.
    pub fn with_existing(path: impl Into<PathBuf>) -> Self {
        let fs = Self::default();
        fs.lock().existing.insert(path.into());
        fs
    }

    pub fn exists_calls(&self) -> usize {
        self.lock().exists_calls
    }

    /// Every path passed to `makedirs`, in call order.
    pub fn makedirs_calls(&self) -> Vec<PathBuf> {
        self.lock().makedirs_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Filesystem for RecordingFilesystem {
    fn exists(&self, path: &Path) -> bool {
        let mut state = self.lock();
        state.exists_calls += 1;
        state.existing.contains(path)
    }

    fn makedirs(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        state.makedirs_calls.push(path.to_path_buf());
        state.existing.insert(path.to_path_buf());
        Ok(())
    }
}
