//! Mass-weighted vertical column integrals.

use std::fmt;

use gridiag_core::{Dim, Quantity, RegionIter};

use crate::error::IntegrationError;

/// Units of every column integral.
pub const COLUMN_INTEGRAL_UNITS: &str = "kg/m**2";

/// Axis holding the vertical dimension.
const VERTICAL_AXIS: usize = 2;

/// Integrate `tracer * delp` over the vertical compute levels.
///
/// `tracer` must have at least three dimensions with [`Dim::Z`] third.
/// `delp` must match the tracer on its first three axes (dims, shape,
/// origin and extent); it is either 3-D and broadcast over any trailing
/// tracer axes, or laid out exactly like the tracer.
///
/// The result drops axis 2 and keeps the padded layout of the remaining
/// axes: every horizontal point is summed, halo included, while only the
/// levels `[origin_z, origin_z + extent_z)` contribute. Units are
/// [`COLUMN_INTEGRAL_UNITS`].
pub fn integrate(tracer: &Quantity, delp: &Quantity) -> Result<Quantity, IntegrationError> {
    check_layout(tracer, delp)?;

    let shape = drop_vertical(tracer.shape());
    let origin = drop_vertical(tracer.origin());
    let extent = drop_vertical(tracer.extent());
    let dims: Vec<Dim> = drop_vertical(tracer.dims());

    let t_strides = tracer.strides();
    let d_strides = delp.strides();
    let k0 = tracer.origin()[VERTICAL_AXIS];
    let nk = tracer.extent()[VERTICAL_AXIS];
    let (t_data, d_data) = (tracer.data(), delp.data());

    let zero = vec![0; shape.len()];
    let data = RegionIter::new(&zero, &shape)
        .map(|out| {
            let mut t_base = 0;
            let mut d_base = 0;
            for (axis, &i) in out.iter().enumerate() {
                let src = if axis < VERTICAL_AXIS { axis } else { axis + 1 };
                t_base += i * t_strides[src];
                if src < d_strides.len() {
                    d_base += i * d_strides[src];
                }
            }
            (k0..k0 + nk)
                .map(|k| {
                    t_data[t_base + k * t_strides[VERTICAL_AXIS]]
                        * d_data[d_base + k * d_strides[VERTICAL_AXIS]]
                })
                .sum()
        })
        .collect();

    Ok(Quantity::new(
        data,
        &shape,
        dims,
        &origin,
        &extent,
        COLUMN_INTEGRAL_UNITS,
    )?)
}

fn drop_vertical<T: Clone>(values: &[T]) -> Vec<T> {
    values
        .iter()
        .enumerate()
        .filter(|&(axis, _)| axis != VERTICAL_AXIS)
        .map(|(_, v)| v.clone())
        .collect()
}

fn check_layout(tracer: &Quantity, delp: &Quantity) -> Result<(), IntegrationError> {
    let ndim = tracer.ndim();
    if ndim <= VERTICAL_AXIS {
        return Err(IntegrationError::TooFewDimensions { ndim });
    }
    let vertical = &tracer.dims()[VERTICAL_AXIS];
    if *vertical != Dim::Z {
        return Err(IntegrationError::VerticalAxisMisplaced {
            found: vertical.clone(),
        });
    }

    let compared = if delp.ndim() == ndim {
        ndim
    } else if delp.ndim() == VERTICAL_AXIS + 1 {
        VERTICAL_AXIS + 1
    } else {
        return Err(IntegrationError::ShapeMismatch {
            reason: format!("delp has {} dimensions, tracer has {ndim}", delp.ndim()),
        });
    };
    same("dims", &tracer.dims()[..compared], &delp.dims()[..compared])?;
    same("shape", &tracer.shape()[..compared], &delp.shape()[..compared])?;
    same("origin", &tracer.origin()[..compared], &delp.origin()[..compared])?;
    same("extent", &tracer.extent()[..compared], &delp.extent()[..compared])?;
    Ok(())
}

fn same<T: PartialEq + fmt::Debug>(
    what: &str,
    tracer: &[T],
    delp: &[T],
) -> Result<(), IntegrationError> {
    if tracer == delp {
        return Ok(());
    }
    Err(IntegrationError::ShapeMismatch {
        reason: format!("{what} {delp:?} vs tracer {tracer:?}"),
    })
}
