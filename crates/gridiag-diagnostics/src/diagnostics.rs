//! The diagnostics lifecycle.
//!
//! A run calls `store_grid` at most once, `store` once per diagnostics
//! timestep with strictly increasing times, and finally `cleanup`, which
//! consumes the instance.

use std::borrow::Cow;
use std::cmp::Ordering;

use gridiag_core::{DriverState, GridData, Timestamp};
use gridiag_monitor::{ConstantRecord, Monitor, StateRecord};

use crate::derived::{DerivedPlan, DerivedRegistry};
use crate::error::DiagnosticsError;

/// Diagnostics capture for one rank.
pub trait Diagnostics {
    /// Record the configured variables of `state` at `time`.
    fn store(&mut self, time: Timestamp, state: &DriverState) -> Result<(), DiagnosticsError>;

    /// Record the grid coordinates once.
    fn store_grid(&mut self, grid: &GridData) -> Result<(), DiagnosticsError>;

    /// Flush and close the backend.
    fn cleanup(self: Box<Self>) -> Result<(), DiagnosticsError>;
}

// ── NullDiagnostics ────────────────────────────────────────────────

/// Diagnostics that store nothing, used when no output path is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn store(&mut self, _time: Timestamp, _state: &DriverState) -> Result<(), DiagnosticsError> {
        Ok(())
    }

    fn store_grid(&mut self, _grid: &GridData) -> Result<(), DiagnosticsError> {
        Ok(())
    }

    fn cleanup(self: Box<Self>) -> Result<(), DiagnosticsError> {
        Ok(())
    }
}

// ── MonitorDiagnostics ─────────────────────────────────────────────

/// Diagnostics forwarding one record per timestep to a [`Monitor`].
///
/// Raw variables are borrowed from the driver state; derived variables
/// are computed fresh on every call. Dropping an instance without
/// calling [`close`](MonitorDiagnostics::close) (or
/// [`Diagnostics::cleanup`]) logs a warning, since buffered output may
/// never reach disk.
pub struct MonitorDiagnostics<M: Monitor = Box<dyn Monitor>> {
    monitor: M,
    names: Vec<String>,
    derived: DerivedPlan,
    last_time: Option<Timestamp>,
    grid_stored: bool,
    closed: bool,
}

impl<M: Monitor> MonitorDiagnostics<M> {
    /// Wrap `monitor`, resolving `derived_names` with the default registry.
    pub fn new<S: AsRef<str>>(monitor: M, names: Vec<String>, derived_names: &[S]) -> Self {
        Self::with_registry(monitor, names, derived_names, &DerivedRegistry::default())
    }

    /// Wrap `monitor`, resolving `derived_names` with `registry`.
    pub fn with_registry<S: AsRef<str>>(
        monitor: M,
        names: Vec<String>,
        derived_names: &[S],
        registry: &DerivedRegistry,
    ) -> Self {
        Self {
            monitor,
            names,
            derived: registry.resolve(derived_names),
            last_time: None,
            grid_stored: false,
            closed: false,
        }
    }

    /// Raw variable names, in storage order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Derived names that will be computed, in storage order.
    pub fn derived_names(&self) -> impl Iterator<Item = &str> {
        self.derived.names()
    }

    /// Derived names that were requested but are not supported.
    pub fn unsupported_derived(&self) -> &[String] {
        self.derived.unsupported()
    }

    /// The wrapped monitor.
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    /// Flush and close the monitor.
    pub fn close(mut self) -> Result<(), DiagnosticsError> {
        self.closed = true;
        self.monitor.cleanup()?;
        Ok(())
    }

    fn check_time(&self, time: Timestamp) -> Result<(), DiagnosticsError> {
        match self.last_time {
            Some(previous) if time.compare(&previous) != Some(Ordering::Greater) => {
                Err(DiagnosticsError::NonMonotonicTime {
                    previous,
                    current: time,
                })
            }
            _ => Ok(()),
        }
    }
}

impl<M: Monitor> Diagnostics for MonitorDiagnostics<M> {
    fn store(&mut self, time: Timestamp, state: &DriverState) -> Result<(), DiagnosticsError> {
        self.check_time(time)?;

        let mut record = StateRecord::new(time);
        for (name, quantity) in state.resolve_all(&self.names)? {
            record.insert(name, Cow::Borrowed(quantity));
        }
        for (name, quantity) in self.derived.compute(state)? {
            record.insert(name, Cow::Owned(quantity));
        }

        self.monitor.store(&record)?;
        self.last_time = Some(time);
        log::trace!("stored diagnostics at {time}");
        Ok(())
    }

    fn store_grid(&mut self, grid: &GridData) -> Result<(), DiagnosticsError> {
        if self.grid_stored {
            return Err(DiagnosticsError::GridAlreadyStored);
        }
        let mut fields = ConstantRecord::new();
        fields.insert("lat".to_string(), &grid.lat);
        fields.insert("lon".to_string(), &grid.lon);
        self.monitor.store_constant(&fields)?;
        self.grid_stored = true;
        Ok(())
    }

    fn cleanup(self: Box<Self>) -> Result<(), DiagnosticsError> {
        (*self).close()
    }
}

impl<M: Monitor> Drop for MonitorDiagnostics<M> {
    fn drop(&mut self) {
        if !self.closed {
            log::warn!("diagnostics dropped without cleanup; buffered output may be lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};
    use gridiag_core::StateError;
    use gridiag_monitor::MonitorError;
    use gridiag_test_utils::{capture_logs, fixtures, messages_at, RecordingMonitor};
    use log::Level;

    const NO_DERIVED: &[&str] = &[];

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn elapsed(minutes: i64) -> Timestamp {
        TimeDelta::minutes(minutes).into()
    }

    #[test]
    fn null_diagnostics_accept_everything() {
        let mut d = NullDiagnostics;
        d.store(elapsed(0), &fixtures::driver_state()).unwrap();
        d.store(elapsed(0), &fixtures::driver_state()).unwrap();
        d.store_grid(&fixtures::grid_data()).unwrap();
        d.store_grid(&fixtures::grid_data()).unwrap();
        Box::new(d).cleanup().unwrap();
    }

    #[test]
    fn record_holds_raw_then_derived_in_order() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let mut d = MonitorDiagnostics::new(
            monitor,
            names(&["v", "surface_temperature", "u"]),
            &["column_integrated_qv"],
        );
        let state = fixtures::driver_state();
        d.store(elapsed(15), &state).unwrap();
        d.close().unwrap();

        let recording = handle.lock().unwrap();
        assert_eq!(recording.records.len(), 1);
        assert_eq!(recording.cleanups, 1);
        let record = &recording.records[0];
        assert_eq!(record.time, elapsed(15));
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            ["time", "v", "surface_temperature", "u", "column_integrated_qv"]
        );
        assert_eq!(record.get("u"), state.dycore_state.get("u"));
        assert_eq!(
            record.get("surface_temperature"),
            state.physics_state.get("surface_temperature")
        );
    }

    #[test]
    fn absolute_times_stored_verbatim() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let mut d = MonitorDiagnostics::new(monitor, names(&["u"]), NO_DERIVED);
        let t = NaiveDate::from_ymd_opt(2016, 8, 1)
            .and_then(|d| d.and_hms_opt(0, 15, 0))
            .unwrap();
        d.store(t.into(), &fixtures::driver_state()).unwrap();
        d.close().unwrap();
        assert_eq!(handle.lock().unwrap().records[0].time, Timestamp::Absolute(t));
    }

    #[test]
    fn unsupported_derived_name_skipped() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let mut d = MonitorDiagnostics::new(monitor, names(&["u"]), &["vorticity_max"]);
        assert_eq!(d.unsupported_derived(), ["vorticity_max"]);
        assert_eq!(d.derived_names().count(), 0);
        d.store(elapsed(0), &fixtures::driver_state()).unwrap();
        d.close().unwrap();
        let recording = handle.lock().unwrap();
        assert_eq!(recording.records[0].keys().collect::<Vec<_>>(), ["time", "u"]);
    }

    #[test]
    fn missing_variable_is_fatal_and_nothing_is_stored() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let mut d = MonitorDiagnostics::new(monitor, names(&["u", "ql"]), NO_DERIVED);
        match d.store(elapsed(0), &fixtures::driver_state()) {
            Err(DiagnosticsError::State(StateError::MissingVariable { name })) => {
                assert_eq!(name, "ql")
            }
            other => panic!("expected MissingVariable, got {other:?}"),
        }
        d.close().unwrap();
        assert!(handle.lock().unwrap().records.is_empty());
    }

    #[test]
    fn ambiguous_variable_is_fatal() {
        let mut state = fixtures::driver_state();
        state
            .physics_state
            .insert("u", fixtures::xyz("m/s", |_, _, _| 0.0));
        let mut d = MonitorDiagnostics::new(RecordingMonitor::new(), names(&["u"]), NO_DERIVED);
        assert!(matches!(
            d.store(elapsed(0), &state),
            Err(DiagnosticsError::State(StateError::AmbiguousVariable { .. }))
        ));
        d.close().unwrap();
    }

    #[test]
    fn time_must_strictly_increase() {
        let mut d = MonitorDiagnostics::new(RecordingMonitor::new(), names(&["u"]), NO_DERIVED);
        let state = fixtures::driver_state();
        d.store(elapsed(10), &state).unwrap();
        assert!(matches!(
            d.store(elapsed(10), &state),
            Err(DiagnosticsError::NonMonotonicTime { .. })
        ));
        assert!(matches!(
            d.store(elapsed(5), &state),
            Err(DiagnosticsError::NonMonotonicTime { .. })
        ));
        d.store(elapsed(20), &state).unwrap();
        d.close().unwrap();
    }

    #[test]
    fn time_kind_cannot_change() {
        let mut d = MonitorDiagnostics::new(RecordingMonitor::new(), names(&["u"]), NO_DERIVED);
        let state = fixtures::driver_state();
        d.store(elapsed(10), &state).unwrap();
        let absolute = NaiveDate::from_ymd_opt(2030, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert!(matches!(
            d.store(absolute.into(), &state),
            Err(DiagnosticsError::NonMonotonicTime { .. })
        ));
        d.close().unwrap();
    }

    #[test]
    fn grid_stored_once_independent_of_timesteps() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let mut d = MonitorDiagnostics::new(monitor, names(&["u"]), NO_DERIVED);
        d.store(elapsed(0), &fixtures::driver_state()).unwrap();
        let grid = fixtures::grid_data();
        d.store_grid(&grid).unwrap();
        assert!(matches!(
            d.store_grid(&grid),
            Err(DiagnosticsError::GridAlreadyStored)
        ));
        d.close().unwrap();

        let recording = handle.lock().unwrap();
        assert_eq!(recording.constants.len(), 1);
        let constants = &recording.constants[0];
        assert_eq!(constants.keys().collect::<Vec<_>>(), ["lat", "lon"]);
        assert_eq!(constants["lat"], grid.lat);
        assert_eq!(recording.records.len(), 1);
    }

    #[test]
    fn monitor_failure_propagates() {
        let monitor = RecordingMonitor::failing_after(1);
        let mut d = MonitorDiagnostics::new(monitor, names(&["u"]), NO_DERIVED);
        let state = fixtures::driver_state();
        d.store(elapsed(0), &state).unwrap();
        match d.store(elapsed(1), &state) {
            Err(DiagnosticsError::Monitor(MonitorError::Io(_))) => {}
            other => panic!("expected Monitor(Io), got {other:?}"),
        }
        d.close().unwrap();
    }

    #[test]
    fn failed_store_does_not_advance_time() {
        let monitor = RecordingMonitor::new();
        let mut d = MonitorDiagnostics::new(monitor, names(&["u", "ql"]), NO_DERIVED);
        let state = fixtures::driver_state();
        assert!(d.store(elapsed(5), &state).is_err());
        assert!(d.last_time.is_none());
        d.close().unwrap();
    }

    #[test]
    fn boxed_cleanup_reaches_monitor() {
        let monitor = RecordingMonitor::new();
        let handle = monitor.handle();
        let d: Box<dyn Diagnostics> =
            Box::new(MonitorDiagnostics::new(monitor, names(&["u"]), NO_DERIVED));
        d.cleanup().unwrap();
        assert_eq!(handle.lock().unwrap().cleanups, 1);
    }

    #[test]
    fn dropping_without_cleanup_warns() {
        let ((), logs) = capture_logs(|| {
            let d = MonitorDiagnostics::new(RecordingMonitor::new(), names(&["u"]), NO_DERIVED);
            drop(d);
        });
        assert_eq!(
            messages_at(&logs, Level::Warn),
            ["diagnostics dropped without cleanup; buffered output may be lost"]
        );

        let ((), logs) = capture_logs(|| {
            let d = MonitorDiagnostics::new(RecordingMonitor::new(), names(&["u"]), NO_DERIVED);
            d.close().unwrap();
        });
        assert!(messages_at(&logs, Level::Warn).is_empty());
    }
}
