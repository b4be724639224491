//! Binary payloads exchanged between ranks and written as store chunks.
//!
//! Every payload starts with `[MAGIC "GDIA"] [VERSION u8] [KIND u8]`.
//! Integers and floats are little-endian, strings carry a `u32` byte
//! length and lists a `u32` count. Decoding works on an in-memory slice
//! and checks every length against the bytes that remain, so a corrupt
//! header fails with [`MonitorError::Malformed`] before anything is
//! allocated.

use chrono::{DateTime, TimeDelta};
use gridiag_core::{Dim, Quantity, Timestamp};

use crate::error::MonitorError;
use crate::{FORMAT_VERSION, MAGIC};

/// Payload kinds, stored after the version byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ContainerKind {
    /// A single [`Variable`] (chunk or gather payload).
    Variable = 0,
    /// Chunked-store array metadata.
    ArrayMeta = 1,
    /// A lone [`Timestamp`].
    Timestamp = 2,
}

impl ContainerKind {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Variable),
            1 => Some(Self::ArrayMeta),
            2 => Some(Self::Timestamp),
            _ => None,
        }
    }
}

fn malformed(detail: impl Into<String>) -> MonitorError {
    MonitorError::Malformed {
        detail: detail.into(),
    }
}

/// A dense named array: the unit of persistence.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    /// Field name.
    pub name: String,
    /// Unit annotation.
    pub units: String,
    /// Dimension tags, outermost first.
    pub dims: Vec<String>,
    /// Array shape, one entry per dim.
    pub shape: Vec<usize>,
    /// Row-major values, `shape.iter().product()` of them.
    pub data: Vec<f64>,
}

impl Variable {
    /// Capture the compute domain of `quantity`, dropping halo points.
    pub fn from_quantity(name: impl Into<String>, quantity: &Quantity) -> Self {
        Self {
            name: name.into(),
            units: quantity.units().to_string(),
            dims: quantity.dims().iter().map(|d| d.as_str().to_string()).collect(),
            shape: quantity.extent().to_vec(),
            data: quantity.compute_values(),
        }
    }

    /// Rebuild a halo-free quantity from the stored array.
    pub fn to_quantity(&self) -> Result<Quantity, MonitorError> {
        Ok(Quantity::from_compute_domain(
            self.data.clone(),
            self.dims.iter().map(|d| Dim::from_name(d)),
            &self.shape,
            self.units.clone(),
        )?)
    }

    /// Value at a multi-index, if in bounds.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        self.data.get(flat).copied()
    }

    fn check(&self) -> Result<(), MonitorError> {
        let expected: usize = self.shape.iter().product();
        if self.dims.len() == self.shape.len() && self.data.len() == expected {
            return Ok(());
        }
        Err(malformed(format!(
            "variable '{}' has {} dims, shape {:?} and {} values",
            self.name,
            self.dims.len(),
            self.shape,
            self.data.len()
        )))
    }
}

// ── Encoder ────────────────────────────────────────────────────────

/// Builds one payload in memory.
#[derive(Debug)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Start a payload of `kind`.
    pub fn new(kind: ContainerKind) -> Self {
        let mut buf = MAGIC.to_vec();
        buf.push(FORMAT_VERSION);
        buf.push(kind as u8);
        Self { buf }
    }

    /// The finished payload.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Append one byte.
    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a little-endian `u64`.
    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a little-endian `i64`.
    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn count(&mut self, n: usize) -> Result<(), MonitorError> {
        let n = u32::try_from(n).map_err(|_| malformed(format!("length {n} exceeds u32::MAX")))?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn str(&mut self, s: &str) -> Result<(), MonitorError> {
        self.count(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Append a counted list of strings.
    pub fn strs(&mut self, values: &[String]) -> Result<(), MonitorError> {
        self.count(values.len())?;
        values.iter().try_for_each(|v| self.str(v))
    }

    /// Append a counted list of sizes, each as `u64`.
    pub fn usizes(&mut self, values: &[usize]) -> Result<(), MonitorError> {
        self.count(values.len())?;
        for &v in values {
            self.u64(v as u64);
        }
        Ok(())
    }

    /// Append `[tag u8] [seconds i64] [nanos i64]`.
    pub fn timestamp(&mut self, t: &Timestamp) {
        let (tag, secs, nanos) = match t {
            Timestamp::Absolute(dt) => {
                let utc = dt.and_utc();
                let nanos = i64::from(utc.timestamp_subsec_nanos());
                (TIME_ABSOLUTE, utc.timestamp(), nanos)
            }
            Timestamp::Elapsed(d) => (TIME_ELAPSED, d.num_seconds(), i64::from(d.subsec_nanos())),
        };
        self.u8(tag);
        self.i64(secs);
        self.i64(nanos);
    }

    /// Append a variable body. Its shape, dims and data must agree.
    pub fn variable(&mut self, v: &Variable) -> Result<(), MonitorError> {
        v.check()?;
        self.str(&v.name)?;
        self.str(&v.units)?;
        self.strs(&v.dims)?;
        self.usizes(&v.shape)?;
        self.buf.reserve(v.data.len() * 8);
        for x in &v.data {
            self.buf.extend_from_slice(&x.to_le_bytes());
        }
        Ok(())
    }
}

// ── Decoder ────────────────────────────────────────────────────────

/// Reads one payload from a byte slice.
#[derive(Debug)]
pub struct Decoder<'a> {
    rest: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Check the header of `bytes` and position after it.
    pub fn new(bytes: &'a [u8], expected: ContainerKind) -> Result<Self, MonitorError> {
        let mut d = Self { rest: bytes };
        let magic = d.take(MAGIC.len())?;
        if magic != MAGIC {
            return Err(malformed(format!("bad magic {magic:?}")));
        }
        let version = d.u8()?;
        if version != FORMAT_VERSION {
            return Err(MonitorError::UnsupportedVersion { found: version });
        }
        let tag = d.u8()?;
        match ContainerKind::from_tag(tag) {
            Some(kind) if kind == expected => Ok(d),
            Some(kind) => Err(malformed(format!(
                "expected {expected:?} payload, found {kind:?}"
            ))),
            None => Err(malformed(format!("unknown payload kind {tag}"))),
        }
    }

    /// Fail if any bytes are left over.
    pub fn finish(self) -> Result<(), MonitorError> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(malformed(format!("{} trailing bytes", self.rest.len())))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MonitorError> {
        if n > self.rest.len() {
            return Err(malformed(format!(
                "truncated: need {n} bytes, {} left",
                self.rest.len()
            )));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], MonitorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read one byte.
    pub fn u8(&mut self) -> Result<u8, MonitorError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u64`.
    pub fn u64(&mut self) -> Result<u64, MonitorError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read a little-endian `i64`.
    pub fn i64(&mut self) -> Result<i64, MonitorError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn count(&mut self) -> Result<usize, MonitorError> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn str(&mut self) -> Result<String, MonitorError> {
        let len = self.count()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| malformed(format!("invalid UTF-8 string: {e}")))
    }

    /// Read a counted list of strings.
    pub fn strs(&mut self) -> Result<Vec<String>, MonitorError> {
        let n = self.count()?;
        // Every string needs at least its 4-byte length.
        if n.saturating_mul(4) > self.rest.len() {
            return Err(malformed(format!("list of {n} strings exceeds payload")));
        }
        (0..n).map(|_| self.str()).collect()
    }

    /// Read a counted list of `u64` sizes.
    pub fn usizes(&mut self) -> Result<Vec<usize>, MonitorError> {
        let n = self.count()?;
        let bytes = self.take(n.saturating_mul(8))?;
        bytes
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                usize::try_from(u64::from_le_bytes(b))
                    .map_err(|_| malformed("size does not fit in usize"))
            })
            .collect()
    }

    /// Read a timestamp written by [`Encoder::timestamp`].
    pub fn timestamp(&mut self) -> Result<Timestamp, MonitorError> {
        let tag = self.u8()?;
        let secs = self.i64()?;
        let nanos = self.i64()?;
        let out_of_range = || malformed(format!("timestamp out of range: {secs}s {nanos}ns"));
        match tag {
            TIME_ABSOLUTE => {
                let nanos = u32::try_from(nanos).map_err(|_| out_of_range())?;
                DateTime::from_timestamp(secs, nanos)
                    .map(|dt| Timestamp::Absolute(dt.naive_utc()))
                    .ok_or_else(out_of_range)
            }
            TIME_ELAPSED => TimeDelta::try_seconds(secs)
                .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos)))
                .map(Timestamp::Elapsed)
                .ok_or_else(out_of_range),
            other => Err(malformed(format!("unknown timestamp tag {other}"))),
        }
    }

    /// Read a variable body written by [`Encoder::variable`].
    pub fn variable(&mut self) -> Result<Variable, MonitorError> {
        let name = self.str()?;
        let units = self.str()?;
        let dims = self.strs()?;
        let shape = self.usizes()?;
        if dims.len() != shape.len() {
            return Err(malformed(format!(
                "variable '{name}': {} dims but shape {shape:?}",
                dims.len()
            )));
        }
        let byte_len = shape
            .iter()
            .try_fold(8usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| malformed(format!("variable '{name}': shape {shape:?} overflows")))?;
        let data = self
            .take(byte_len)?
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b)
            })
            .collect();
        Ok(Variable {
            name,
            units,
            dims,
            shape,
            data,
        })
    }
}

const TIME_ABSOLUTE: u8 = 0;
const TIME_ELAPSED: u8 = 1;

/// Serialize a variable as a standalone payload.
pub fn variable_to_bytes(v: &Variable) -> Result<Vec<u8>, MonitorError> {
    let mut enc = Encoder::new(ContainerKind::Variable);
    enc.variable(v)?;
    Ok(enc.finish())
}

/// Parse a standalone variable payload.
pub fn variable_from_bytes(bytes: &[u8]) -> Result<Variable, MonitorError> {
    let mut dec = Decoder::new(bytes, ContainerKind::Variable)?;
    let v = dec.variable()?;
    dec.finish()?;
    Ok(v)
}

/// Serialize a timestamp as a standalone payload.
pub fn timestamp_to_bytes(t: &Timestamp) -> Vec<u8> {
    let mut enc = Encoder::new(ContainerKind::Timestamp);
    enc.timestamp(t);
    enc.finish()
}

/// Parse a standalone timestamp payload.
pub fn timestamp_from_bytes(bytes: &[u8]) -> Result<Timestamp, MonitorError> {
    let mut dec = Decoder::new(bytes, ContainerKind::Timestamp)?;
    let t = dec.timestamp()?;
    dec.finish()?;
    Ok(t)
}
