//! Batched time-windowed store written as NetCDF.
//!
//! [`BatchedMonitor`] keeps the compute domain of each field in memory
//! for `time_chunk_size` timesteps, then gathers every rank's window onto
//! the root, which assembles the global arrays and writes one NetCDF file
//! with an unlimited `time` dimension.
//!
//! The root holds a full window of global data for every field before
//! writing, so large grids or many fields need a small window.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta};
use gridiag_comm::{CollectiveComm, Communicator, Partitioner};
use gridiag_core::Timestamp;
use indexmap::IndexMap;

use crate::codec::{variable_from_bytes, variable_to_bytes, Variable};
use crate::collective::all_ranks_agree;
use crate::error::MonitorError;
use crate::layout::assemble;
use crate::record::{ConstantRecord, Monitor, StateRecord};
use crate::TIME_DIM;

/// File name of window `index`.
pub fn window_file_name(index: usize) -> String {
    format!("state_{index:04}.nc")
}

/// File name of the constants file.
pub const CONSTANTS_FILE_NAME: &str = "constants.nc";

/// Time coordinate units for absolute timestamps.
pub const EPOCH_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// Time coordinate units for elapsed timestamps.
pub const ELAPSED_UNITS: &str = "seconds";

const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ── Dataset ────────────────────────────────────────────────────────

/// Contents of one file written by [`BatchedMonitor`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    /// Timestamps of the time axis; empty for constants.
    pub times: Vec<Timestamp>,
    /// Variables in write order, without the time coordinate.
    pub variables: Vec<Variable>,
}

impl Dataset {
    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Encode `times` as seconds for the `time` coordinate.
fn time_axis(times: &[Timestamp]) -> Result<(Vec<f64>, &'static str), MonitorError> {
    let absolute = matches!(times.first(), Some(Timestamp::Absolute(_)));
    let mut seconds = Vec::with_capacity(times.len());
    for t in times {
        let (secs, nanos) = match (t, absolute) {
            (Timestamp::Absolute(dt), true) => {
                let utc = dt.and_utc();
                (utc.timestamp(), i64::from(utc.timestamp_subsec_nanos()))
            }
            (Timestamp::Elapsed(d), false) => (d.num_seconds(), i64::from(d.subsec_nanos())),
            _ => {
                return Err(MonitorError::InconsistentLayout {
                    name: TIME_DIM.to_string(),
                    reason: "window mixes absolute and elapsed timestamps".to_string(),
                })
            }
        };
        seconds.push(secs as f64 + nanos as f64 / NANOS_PER_SECOND as f64);
    }
    Ok((seconds, if absolute { EPOCH_UNITS } else { ELAPSED_UNITS }))
}

/// Decode one `time` coordinate value with the given units.
fn timestamp_from_seconds(seconds: f64, units: &str) -> Result<Timestamp, MonitorError> {
    let out_of_range = || MonitorError::Malformed {
        detail: format!("time value {seconds} {units} out of range"),
    };
    let nanos = (seconds * NANOS_PER_SECOND as f64).round();
    if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let nanos = nanos as i64;
    if units == ELAPSED_UNITS {
        return Ok(Timestamp::Elapsed(TimeDelta::nanoseconds(nanos)));
    }
    if units == EPOCH_UNITS {
        let secs = nanos.div_euclid(NANOS_PER_SECOND);
        let subsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
        return DateTime::from_timestamp(secs, subsec)
            .map(|dt| Timestamp::Absolute(dt.naive_utc()))
            .ok_or_else(out_of_range);
    }
    Err(MonitorError::Malformed {
        detail: format!("unsupported time units '{units}'"),
    })
}

fn full_extent(shape: &[usize]) -> Vec<Range<usize>> {
    shape.iter().map(|&n| 0..n).collect()
}

fn text_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute_value(name)? {
        Ok(netcdf::AttributeValue::Str(s)) => Some(s),
        _ => None,
    }
}

/// Write `variables` to a new NetCDF file at `path`.
///
/// With `times`, the file gets an unlimited `time` dimension and a
/// `time` coordinate; every variable must then lead with `time`.
fn write_dataset(
    path: &Path,
    times: &[Timestamp],
    variables: &[Variable],
) -> Result<(), MonitorError> {
    let mut file = netcdf::create(path)?;

    if !times.is_empty() {
        let (seconds, units) = time_axis(times)?;
        file.add_unlimited_dimension(TIME_DIM)?;
        let mut time_var = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
        time_var.put_attribute("standard_name", "time")?;
        time_var.put_attribute("units", units)?;
        if units == EPOCH_UNITS {
            time_var.put_attribute("calendar", "standard")?;
        }
        time_var.put_values(&seconds, full_extent(&[seconds.len()]).as_slice())?;
    }

    for v in variables {
        for (dim, &len) in v.dims.iter().zip(&v.shape) {
            if dim == TIME_DIM {
                continue;
            }
            match file.dimension(dim).map(|d| d.len()) {
                Some(existing) if existing == len => {}
                Some(existing) => {
                    return Err(MonitorError::InconsistentLayout {
                        name: v.name.clone(),
                        reason: format!(
                            "dimension '{dim}' has length {existing} in this file, {len} here"
                        ),
                    })
                }
                None => {
                    file.add_dimension(dim, len)?;
                }
            }
        }
        let dims: Vec<&str> = v.dims.iter().map(String::as_str).collect();
        let mut var = file.add_variable::<f64>(&v.name, &dims)?;
        var.put_attribute("units", v.units.as_str())?;
        var.put_values(&v.data, full_extent(&v.shape).as_slice())?;
    }

    file.add_attribute("Conventions", "CF-1.8")?;
    file.add_attribute("source", "gridiag")?;
    Ok(())
}

/// Read a NetCDF file written by [`BatchedMonitor`].
pub fn read_dataset(path: &Path) -> Result<Dataset, MonitorError> {
    let file = netcdf::open(path)?;

    let times = match file.variable(TIME_DIM) {
        Some(var) => {
            let units = text_attribute(&var, "units").unwrap_or_default();
            let seconds: Vec<f64> = var.get_values(..)?;
            seconds
                .into_iter()
                .map(|s| timestamp_from_seconds(s, &units))
                .collect::<Result<_, _>>()?
        }
        None => Vec::new(),
    };

    let mut variables = Vec::new();
    for var in file.variables() {
        let name = var.name();
        if name == TIME_DIM {
            continue;
        }
        let data: Vec<f64> = var.get_values(..)?;
        variables.push(Variable {
            units: text_attribute(&var, "units").unwrap_or_default(),
            dims: var.dimensions().iter().map(|d| d.name()).collect(),
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
            data,
            name,
        });
    }
    Ok(Dataset { times, variables })
}

// ── BatchedMonitor ─────────────────────────────────────────────────

/// Buffers timesteps and writes one gathered NetCDF file per window.
pub struct BatchedMonitor {
    path: PathBuf,
    comm: Arc<dyn CollectiveComm>,
    partitioner: Arc<dyn Partitioner>,
    time_chunk_size: usize,
    times: Vec<Timestamp>,
    buffer: IndexMap<String, Vec<Variable>>,
    windows_written: usize,
}

impl BatchedMonitor {
    /// Bind a monitor to the directory `path`.
    ///
    /// Collective: every rank must call this with the same
    /// `time_chunk_size`, otherwise all ranks fail with
    /// [`MonitorError::InconsistentChunkSize`].
    pub fn new(
        path: impl Into<PathBuf>,
        communicator: &Communicator,
        time_chunk_size: usize,
    ) -> Result<Self, MonitorError> {
        let comm = Arc::clone(communicator.comm());
        let size = (time_chunk_size as u64).to_le_bytes();
        if !all_ranks_agree(comm.as_ref(), &size)? || time_chunk_size == 0 {
            return Err(MonitorError::InconsistentChunkSize {
                local: time_chunk_size,
            });
        }
        Ok(Self {
            path: path.into(),
            comm,
            partitioner: Arc::clone(communicator.partitioner()),
            time_chunk_size,
            times: Vec::with_capacity(time_chunk_size),
            buffer: IndexMap::new(),
            windows_written: 0,
        })
    }

    /// Timesteps per written file.
    pub fn time_chunk_size(&self) -> usize {
        self.time_chunk_size
    }

    /// Timesteps held in memory, not yet written.
    pub fn buffered_steps(&self) -> usize {
        self.times.len()
    }

    /// Number of window files written (or, off-root, contributed to).
    pub fn windows_written(&self) -> usize {
        self.windows_written
    }

    /// Path of window `index`.
    pub fn window_path(&self, index: usize) -> PathBuf {
        self.path.join(window_file_name(index))
    }

    /// Path of the constants file.
    pub fn constants_path(&self) -> PathBuf {
        self.path.join(CONSTANTS_FILE_NAME)
    }

    /// Gather one variable from every rank; the root gets the global array.
    fn gather(&self, local: &Variable) -> Result<Option<Variable>, MonitorError> {
        let Some(payloads) = self.comm.gather_bytes(variable_to_bytes(local)?)? else {
            return Ok(None);
        };
        let parts = payloads
            .iter()
            .map(|bytes| variable_from_bytes(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        assemble(&parts, self.partitioner.as_ref()).map(Some)
    }

    /// Write the buffered window, if any.
    fn flush(&mut self) -> Result<(), MonitorError> {
        if self.times.is_empty() {
            return Ok(());
        }
        let times = std::mem::take(&mut self.times);
        let buffer = std::mem::take(&mut self.buffer);
        let mut variables = Vec::with_capacity(buffer.len());
        for (name, steps) in &buffer {
            let local = stack_steps(name, steps)?;
            if let Some(global) = self.gather(&local)? {
                variables.push(global);
            }
        }
        if self.comm.is_root() {
            let path = self.window_path(self.windows_written);
            write_dataset(&path, &times, &variables)?;
            log::info!("wrote diagnostics window {}", path.display());
        }
        self.windows_written += 1;
        Ok(())
    }
}

/// Stack per-step variables along a new leading time axis.
fn stack_steps(name: &str, steps: &[Variable]) -> Result<Variable, MonitorError> {
    let first = steps.first().ok_or_else(|| MonitorError::Malformed {
        detail: format!("no buffered steps for '{name}'"),
    })?;
    let mut data = Vec::with_capacity(first.data.len() * steps.len());
    for (step, v) in steps.iter().enumerate() {
        if v.dims != first.dims || v.shape != first.shape || v.units != first.units {
            return Err(MonitorError::InconsistentLayout {
                name: name.to_string(),
                reason: format!(
                    "step {step} holds {:?} {:?} ({}), step 0 holds {:?} {:?} ({})",
                    v.dims, v.shape, v.units, first.dims, first.shape, first.units
                ),
            });
        }
        data.extend_from_slice(&v.data);
    }
    let mut dims = vec![TIME_DIM.to_string()];
    dims.extend(first.dims.iter().cloned());
    let mut shape = vec![steps.len()];
    shape.extend_from_slice(&first.shape);
    Ok(Variable {
        name: name.to_string(),
        units: first.units.clone(),
        dims,
        shape,
        data,
    })
}

impl Monitor for BatchedMonitor {
    fn store(&mut self, record: &StateRecord<'_>) -> Result<(), MonitorError> {
        if !self.times.is_empty() && !self.buffer.keys().eq(record.fields.keys()) {
            return Err(MonitorError::InconsistentFields {
                expected: self.buffer.keys().cloned().collect(),
                found: record.fields.keys().cloned().collect(),
            });
        }
        self.times.push(record.time);
        for (name, quantity) in &record.fields {
            self.buffer
                .entry(name.clone())
                .or_default()
                .push(Variable::from_quantity(name.as_str(), quantity));
        }
        if self.times.len() >= self.time_chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    fn store_constant(&mut self, fields: &ConstantRecord<'_>) -> Result<(), MonitorError> {
        let mut variables = Vec::with_capacity(fields.len());
        for (name, quantity) in fields {
            if let Some(global) = self.gather(&Variable::from_quantity(name.as_str(), quantity))? {
                variables.push(global);
            }
        }
        if self.comm.is_root() {
            write_dataset(&self.constants_path(), &[], &variables)?;
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), MonitorError> {
        self.flush()?;
        self.comm.barrier()?;
        Ok(())
    }
}
