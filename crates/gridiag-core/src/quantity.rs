//! Gridded quantities with padded storage.
//!
//! A [`Quantity`] owns a row-major `f64` buffer covering the whole padded
//! array of one rank. Only the compute domain `[origin, origin + extent)`
//! on each axis holds valid data; everything outside is halo.

use smallvec::SmallVec;

use crate::dims::Dim;
use crate::error::QuantityError;

/// Per-axis sizes or indices. Gridded fields rarely exceed four axes.
pub type Shape = SmallVec<[usize; 4]>;

/// A gridded array value restricted to a rank's sub-domain.
///
/// Invariant (checked by every constructor): `dims`, `shape`, `origin`
/// and `extent` have the same length, `origin[i] + extent[i] <= shape[i]`
/// on every axis, and `data.len()` equals the product of `shape`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity {
    data: Vec<f64>,
    shape: Shape,
    dims: SmallVec<[Dim; 4]>,
    origin: Shape,
    extent: Shape,
    units: String,
}

impl Quantity {
    /// Wrap a padded buffer, validating the sub-domain description.
    pub fn new(
        data: Vec<f64>,
        shape: &[usize],
        dims: impl IntoIterator<Item = Dim>,
        origin: &[usize],
        extent: &[usize],
        units: impl Into<String>,
    ) -> Result<Self, QuantityError> {
        let dims: SmallVec<[Dim; 4]> = dims.into_iter().collect();
        if dims.len() != shape.len() || origin.len() != shape.len() || extent.len() != shape.len()
        {
            return Err(QuantityError::RankMismatch {
                dims: dims.len(),
                shape: shape.len(),
                origin: origin.len(),
                extent: extent.len(),
            });
        }
        for axis in 0..shape.len() {
            if origin[axis] + extent[axis] > shape[axis] {
                return Err(QuantityError::ExtentOutOfBounds {
                    axis,
                    origin: origin[axis],
                    extent: extent[axis],
                    len: shape[axis],
                });
            }
        }
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(QuantityError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: shape.into(),
            dims,
            origin: origin.into(),
            extent: extent.into(),
            units: units.into(),
        })
    }

    /// A quantity with no halo: the whole buffer is the compute domain.
    pub fn from_compute_domain(
        data: Vec<f64>,
        dims: impl IntoIterator<Item = Dim>,
        extent: &[usize],
        units: impl Into<String>,
    ) -> Result<Self, QuantityError> {
        let origin: Shape = extent.iter().map(|_| 0).collect();
        Self::new(data, extent, dims, &origin, extent, units)
    }

    /// A quantity filled with `value`, padded by `halo` points on each
    /// side of every horizontal axis.
    pub fn filled(
        dims: impl IntoIterator<Item = Dim>,
        extent: &[usize],
        halo: usize,
        value: f64,
        units: impl Into<String>,
    ) -> Result<Self, QuantityError> {
        let dims: SmallVec<[Dim; 4]> = dims.into_iter().collect();
        let mut shape = Shape::new();
        let mut origin = Shape::new();
        for (dim, &len) in dims.iter().zip(extent) {
            let pad = if dim.is_x() || dim.is_y() { halo } else { 0 };
            shape.push(len + 2 * pad);
            origin.push(pad);
        }
        if dims.len() != extent.len() {
            return Err(QuantityError::RankMismatch {
                dims: dims.len(),
                shape: extent.len(),
                origin: origin.len(),
                extent: extent.len(),
            });
        }
        let len = shape.iter().product();
        Self::new(vec![value; len], &shape, dims, &origin, extent, units)
    }

    /// Dimension tags, one per axis.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Padded array shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Start of the compute domain on each axis.
    pub fn origin(&self) -> &[usize] {
        &self.origin
    }

    /// Length of the compute domain on each axis.
    pub fn extent(&self) -> &[usize] {
        &self.extent
    }

    /// Unit annotation (e.g. `"m/s"`).
    pub fn units(&self) -> &str {
        &self.units
    }

    /// The full padded buffer, row-major.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Row-major strides of the padded buffer.
    pub fn strides(&self) -> Shape {
        let mut strides: Shape = self.shape.iter().map(|_| 1).collect();
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Flat buffer offset of a multi-index into the padded array.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, QuantityError> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return Err(QuantityError::IndexOutOfBounds {
                index: index.to_vec(),
            });
        }
        Ok(index
            .iter()
            .zip(self.strides().iter())
            .map(|(i, s)| i * s)
            .sum())
    }

    /// Value at a multi-index into the padded array.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.flat_index(index).ok().map(|i| self.data[i])
    }

    /// Overwrite the value at a multi-index into the padded array.
    pub fn set(&mut self, index: &[usize], value: f64) -> Result<(), QuantityError> {
        let i = self.flat_index(index)?;
        self.data[i] = value;
        Ok(())
    }

    /// Iterate the multi-indices of the compute domain, row-major.
    pub fn compute_region(&self) -> RegionIter {
        RegionIter::new(&self.origin, &self.extent)
    }

    /// Copy the compute domain into a dense row-major buffer of shape `extent`.
    pub fn compute_values(&self) -> Vec<f64> {
        let strides = self.strides();
        self.compute_region()
            .map(|idx| {
                let flat: usize = idx.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
                self.data[flat]
            })
            .collect()
    }
}

/// Row-major iterator over the multi-indices of a rectangular region.
///
/// A region with zero extent on any axis yields nothing; a zero-rank
/// region yields the empty index once.
#[derive(Clone, Debug)]
pub struct RegionIter {
    start: Shape,
    extent: Shape,
    current: Option<Shape>,
}

impl RegionIter {
    /// Iterate `[start[i], start[i] + extent[i])` on every axis.
    pub fn new(start: &[usize], extent: &[usize]) -> Self {
        let current = if extent.iter().any(|&e| e == 0) {
            None
        } else {
            Some(start.into())
        };
        Self {
            start: start.into(),
            extent: extent.into(),
            current,
        }
    }
}

impl Iterator for RegionIter {
    type Item = Shape;

    fn next(&mut self) -> Option<Shape> {
        let current = self.current.take()?;
        let mut next = current.clone();
        let mut axis = next.len();
        while axis > 0 {
            axis -= 1;
            next[axis] += 1;
            if next[axis] < self.start[axis] + self.extent[axis] {
                self.current = Some(next);
                break;
            }
            next[axis] = self.start[axis];
        }
        Some(current)
    }
}
