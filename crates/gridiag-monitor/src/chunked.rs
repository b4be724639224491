//! Streaming chunked store.
//!
//! [`ChunkedMonitor`] writes each timestep as it arrives. Every array is
//! split into one chunk per rank, so ranks never write the same file and
//! no data crosses rank boundaries. The only collectives are at array
//! creation (ranks agree on the sub-domain shape, the root writes the
//! metadata, then everyone waits for it) and at cleanup.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridiag_comm::{CollectiveComm, Communicator, Partitioner};
use gridiag_core::{Dim, Quantity, Timestamp};

use crate::codec::{
    timestamp_from_bytes, timestamp_to_bytes, variable_from_bytes, variable_to_bytes,
    ContainerKind, Decoder, Encoder, Variable,
};
use crate::collective::all_ranks_agree;
use crate::error::MonitorError;
use crate::layout::assemble;
use crate::record::{ConstantRecord, Monitor, StateRecord};
use crate::TIME_DIM;

// ── DirectoryStore ─────────────────────────────────────────────────

/// A key/value store backed by a directory tree.
///
/// Keys are `/`-separated relative paths. Writes go through a temporary
/// file and a rename, so readers never observe a half-written value.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |p, part| p.join(part))
    }

    /// Write `bytes` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, bytes: &[u8]) -> Result<(), MonitorError> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &path)?;
        Ok(())
    }

    /// Read the value under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, MonitorError> {
        fs::read(self.path_of(key)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => MonitorError::NotFound {
                key: key.to_string(),
            },
            _ => MonitorError::Io(e),
        })
    }

    /// Whether a value exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.path_of(key).is_file()
    }

    /// Timestamps of every step written so far, in step order.
    pub fn read_times(&self) -> Result<Vec<Timestamp>, MonitorError> {
        let mut times = Vec::new();
        while self.contains(&time_key(times.len())) {
            times.push(timestamp_from_bytes(&self.get(&time_key(times.len()))?)?);
        }
        Ok(times)
    }

    /// Metadata of array `name`.
    pub fn read_meta(&self, name: &str) -> Result<ArrayMeta, MonitorError> {
        ArrayMeta::from_bytes(&self.get(&meta_key(name))?)
    }

    /// Reassemble the global array `name` at `step` (`None` for a
    /// constant array) from every rank's chunk.
    pub fn read_array(
        &self,
        name: &str,
        step: Option<usize>,
        partitioner: &dyn Partitioner,
    ) -> Result<Variable, MonitorError> {
        let meta = self.read_meta(name)?;
        let dims: Vec<Dim> = meta.dims.iter().map(|d| Dim::from_name(d)).collect();
        if !has_horizontal(&dims) {
            return variable_from_bytes(&self.get(&chunk_key(name, step, (0, 0)))?);
        }
        let parts = (0..partitioner.total_ranks())
            .map(|rank| -> Result<Variable, MonitorError> {
                let index = partitioner.subtile_index(rank)?;
                variable_from_bytes(&self.get(&chunk_key(name, step, index))?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        assemble(&parts, partitioner)
    }
}

fn time_key(step: usize) -> String {
    format!("{TIME_DIM}/{step}")
}

fn meta_key(name: &str) -> String {
    format!("{name}/.meta")
}

fn chunk_key(name: &str, step: Option<usize>, (xi, yi): (usize, usize)) -> String {
    match step {
        Some(t) => format!("{name}/{t}.{xi}.{yi}"),
        None => format!("{name}/c.{xi}.{yi}"),
    }
}

/// Reject array names that would escape their own directory or land
/// in the timestamp directory.
fn check_name(name: &str) -> Result<(), MonitorError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name.starts_with('.') {
        "name starts with '.'"
    } else if name == TIME_DIM {
        "name is reserved for timestamps"
    } else {
        return Ok(());
    };
    Err(MonitorError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn has_horizontal(dims: &[Dim]) -> bool {
    dims.iter().any(|d| d.is_x() || d.is_y())
}

// ── ArrayMeta ──────────────────────────────────────────────────────

/// Per-array metadata written once by the root rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayMeta {
    /// Unit annotation.
    pub units: String,
    /// Dimension tags (without the time axis).
    pub dims: Vec<String>,
    /// Global shape (without the time axis).
    pub shape: Vec<usize>,
    /// Per-rank chunk shape.
    pub chunks: Vec<usize>,
    /// Whether the array has one chunk set per timestep.
    pub time_dependent: bool,
}

impl ArrayMeta {
    fn describe(quantity: &Quantity, partitioner: &dyn Partitioner, time_dependent: bool) -> Self {
        Self {
            units: quantity.units().to_string(),
            dims: quantity.dims().iter().map(|d| d.as_str().to_string()).collect(),
            shape: partitioner.global_extent(quantity.dims(), quantity.extent()),
            chunks: quantity.extent().to_vec(),
            time_dependent,
        }
    }

    fn matches(&self, quantity: &Quantity, time_dependent: bool) -> bool {
        self.time_dependent == time_dependent
            && self.units == quantity.units()
            && self.chunks == quantity.extent()
            && self.dims.len() == quantity.ndim()
            && self.dims.iter().zip(quantity.dims()).all(|(a, b)| a == b.as_str())
    }

    /// Serialize as a standalone container.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MonitorError> {
        let mut enc = Encoder::new(ContainerKind::ArrayMeta);
        enc.str(&self.units)?;
        enc.strs(&self.dims)?;
        enc.usizes(&self.shape)?;
        enc.usizes(&self.chunks)?;
        enc.u8(u8::from(self.time_dependent));
        Ok(enc.finish())
    }

    /// Parse a standalone container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MonitorError> {
        let mut dec = Decoder::new(bytes, ContainerKind::ArrayMeta)?;
        let meta = Self {
            units: dec.str()?,
            dims: dec.strs()?,
            shape: dec.usizes()?,
            chunks: dec.usizes()?,
            time_dependent: dec.u8()? != 0,
        };
        dec.finish()?;
        Ok(meta)
    }
}

/// Bytes every rank must agree on before an array is created.
fn layout_fingerprint(quantity: &Quantity) -> Vec<u8> {
    let mut bytes = quantity.units().as_bytes().to_vec();
    for (dim, len) in quantity.dims().iter().zip(quantity.extent()) {
        bytes.push(0);
        bytes.extend_from_slice(dim.as_str().as_bytes());
        bytes.extend_from_slice(&(*len as u64).to_le_bytes());
    }
    bytes
}

// ── ChunkedMonitor ─────────────────────────────────────────────────

/// Streams every record straight into a [`DirectoryStore`].
pub struct ChunkedMonitor {
    store: DirectoryStore,
    comm: Arc<dyn CollectiveComm>,
    partitioner: Arc<dyn Partitioner>,
    arrays: HashMap<String, ArrayMeta>,
    steps_written: usize,
}

impl ChunkedMonitor {
    /// Bind a monitor to `store`, partitioned by `communicator`.
    pub fn new(store: DirectoryStore, communicator: &Communicator) -> Self {
        Self {
            store,
            comm: Arc::clone(communicator.comm()),
            partitioner: Arc::clone(communicator.partitioner()),
            arrays: HashMap::new(),
            steps_written: 0,
        }
    }

    /// The underlying store.
    pub fn store_handle(&self) -> &DirectoryStore {
        &self.store
    }

    /// Number of timesteps stored so far.
    pub fn steps_written(&self) -> usize {
        self.steps_written
    }

    /// Make sure array `name` exists and matches `quantity`'s layout.
    fn ensure_array(
        &mut self,
        name: &str,
        quantity: &Quantity,
        time_dependent: bool,
    ) -> Result<(), MonitorError> {
        check_name(name)?;
        if let Some(meta) = self.arrays.get(name) {
            if meta.matches(quantity, time_dependent) {
                return Ok(());
            }
            return Err(MonitorError::InconsistentLayout {
                name: name.to_string(),
                reason: format!(
                    "array created as {:?} {:?} ({}), now given {:?} {:?} ({})",
                    meta.dims,
                    meta.chunks,
                    meta.units,
                    quantity.dims(),
                    quantity.extent(),
                    quantity.units()
                ),
            });
        }
        if !all_ranks_agree(self.comm.as_ref(), &layout_fingerprint(quantity))? {
            return Err(MonitorError::InconsistentLayout {
                name: name.to_string(),
                reason: "ranks hold sub-domains of different shape".to_string(),
            });
        }
        let meta = ArrayMeta::describe(quantity, self.partitioner.as_ref(), time_dependent);
        if self.comm.is_root() {
            self.store.set(&meta_key(name), &meta.to_bytes()?)?;
            log::debug!(
                "created array '{name}' with global shape {:?} in {}",
                meta.shape,
                self.store.root().display()
            );
        }
        self.comm.barrier()?;
        self.arrays.insert(name.to_string(), meta);
        Ok(())
    }

    /// Write this rank's chunk of `quantity`.
    fn write_chunk(
        &self,
        name: &str,
        quantity: &Quantity,
        step: Option<usize>,
    ) -> Result<(), MonitorError> {
        // Fields without a horizontal axis are identical on every rank.
        let index = if has_horizontal(quantity.dims()) {
            self.partitioner.subtile_index(self.comm.rank())?
        } else if self.comm.is_root() {
            (0, 0)
        } else {
            return Ok(());
        };
        let bytes = variable_to_bytes(&Variable::from_quantity(name, quantity))?;
        self.store.set(&chunk_key(name, step, index), &bytes)
    }
}

impl Monitor for ChunkedMonitor {
    fn store(&mut self, record: &StateRecord<'_>) -> Result<(), MonitorError> {
        let step = self.steps_written;
        if self.comm.is_root() {
            self.store
                .set(&time_key(step), &timestamp_to_bytes(&record.time))?;
        }
        for (name, quantity) in &record.fields {
            self.ensure_array(name, quantity, true)?;
            self.write_chunk(name, quantity, Some(step))?;
        }
        self.steps_written += 1;
        log::trace!("rank {} wrote step {step} at {}", self.comm.rank(), record.time);
        Ok(())
    }

    fn store_constant(&mut self, fields: &ConstantRecord<'_>) -> Result<(), MonitorError> {
        for (name, quantity) in fields {
            self.ensure_array(name, quantity, false)?;
            self.write_chunk(name, quantity, None)?;
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), MonitorError> {
        self.comm.barrier()?;
        if self.comm.is_root() {
            log::info!(
                "closed chunked store {} after {} steps",
                self.store.root().display(),
                self.steps_written
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::borrow::Cow;

    fn field(value: f64) -> Quantity {
        Quantity::filled([Dim::X, Dim::Y, Dim::Z], &[3, 2, 4], 1, value, "m/s").unwrap()
    }

    fn record(seconds: i64, q: &Quantity) -> StateRecord<'_> {
        let mut r = StateRecord::new(TimeDelta::seconds(seconds).into());
        r.insert("u", Cow::Borrowed(q));
        r
    }

    #[test]
    fn store_set_get_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(tmp.path());
        store.set("a/b/c", b"xyz").unwrap();
        assert!(store.contains("a/b/c"));
        assert_eq!(store.get("a/b/c").unwrap(), b"xyz");
        assert!(matches!(
            store.get("missing"),
            Err(MonitorError::NotFound { .. })
        ));
    }

    #[test]
    fn single_rank_streams_every_step() {
        let tmp = tempfile::tempdir().unwrap();
        let comm = Communicator::local();
        let mut monitor = ChunkedMonitor::new(DirectoryStore::new(tmp.path()), &comm);
        for step in 0..3 {
            let q = field(step as f64);
            monitor.store(&record(step * 60, &q)).unwrap();
        }
        monitor.cleanup().unwrap();

        let store = DirectoryStore::new(tmp.path());
        assert_eq!(store.read_times().unwrap().len(), 3);
        let meta = store.read_meta("u").unwrap();
        assert_eq!(meta.shape, vec![3, 2, 4]);
        assert!(meta.time_dependent);
        let step2 = store.read_array("u", Some(2), comm.partitioner().as_ref()).unwrap();
        assert_eq!(step2.data, vec![2.0; 24]);
    }

    #[test]
    fn changing_extent_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut monitor =
            ChunkedMonitor::new(DirectoryStore::new(tmp.path()), &Communicator::local());
        let q = field(0.0);
        monitor.store(&record(0, &q)).unwrap();
        let smaller =
            Quantity::filled([Dim::X, Dim::Y, Dim::Z], &[3, 2, 3], 1, 0.0, "m/s").unwrap();
        assert!(matches!(
            monitor.store(&record(1, &smaller)),
            Err(MonitorError::InconsistentLayout { .. })
        ));
    }

    #[test]
    fn constants_have_no_step() {
        let tmp = tempfile::tempdir().unwrap();
        let comm = Communicator::local();
        let mut monitor = ChunkedMonitor::new(DirectoryStore::new(tmp.path()), &comm);
        let lat = Quantity::filled([Dim::X, Dim::Y], &[3, 2], 1, 45.0, "degrees_north").unwrap();
        let fields: ConstantRecord<'_> = [("lat".to_string(), &lat)].into_iter().collect();
        monitor.store_constant(&fields).unwrap();
        let store = monitor.store_handle();
        assert!(!store.read_meta("lat").unwrap().time_dependent);
        assert!(store.contains("lat/c.0.0"));
        assert_eq!(store.read_times().unwrap(), vec![]);
    }

    #[test]
    fn names_that_leave_the_array_directory_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("store");
        let mut monitor = ChunkedMonitor::new(DirectoryStore::new(&root), &Communicator::local());
        let q = field(1.0);
        for name in ["../escaped", "a/b", "", ".", "..", ".meta", "time", "c:\\x"] {
            let mut r = StateRecord::new(TimeDelta::zero().into());
            r.insert(name, Cow::Borrowed(&q));
            assert!(
                matches!(monitor.store(&r), Err(MonitorError::InvalidName { .. })),
                "{name:?} accepted"
            );
        }
        assert!(!tmp.path().join("escaped").exists());
        assert!(!root.join("a").exists());
    }
}
