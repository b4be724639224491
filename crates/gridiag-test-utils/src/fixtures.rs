//! Standard driver-state fixtures.
//!
//! All 3-D fields share one layout: [`NX`] x [`NY`] x [`NZ`] compute
//! points with a [`HALO`]-point horizontal halo filled with
//! [`HALO_FILL`], so any read outside the compute domain stands out.

use gridiag_core::{Dim, DriverState, GridData, Quantity, SubState};

pub const NX: usize = 4;
pub const NY: usize = 3;
pub const NZ: usize = 5;
pub const HALO: usize = 1;
pub const HALO_FILL: f64 = -9999.0;

/// An `[x, y, z]` quantity whose compute point `(i, j, k)` holds
/// `f(i, j, k)`, indices relative to the compute domain.
pub fn xyz(units: &str, f: impl Fn(usize, usize, usize) -> f64) -> Quantity {
    let mut q = Quantity::filled([Dim::X, Dim::Y, Dim::Z], &[NX, NY, NZ], HALO, HALO_FILL, units)
        .expect("fixture layout is valid");
    fill(&mut q, |idx| f(idx[0], idx[1], idx[2]));
    q
}

/// An `[x, y]` quantity whose compute point `(i, j)` holds `f(i, j)`.
pub fn xy(units: &str, f: impl Fn(usize, usize) -> f64) -> Quantity {
    let mut q = Quantity::filled([Dim::X, Dim::Y], &[NX, NY], HALO, HALO_FILL, units)
        .expect("fixture layout is valid");
    fill(&mut q, |idx| f(idx[0], idx[1]));
    q
}

fn fill(q: &mut Quantity, f: impl Fn(&[usize]) -> f64) {
    let origin = q.origin().to_vec();
    for idx in q.compute_region().collect::<Vec<_>>() {
        let local: Vec<usize> = idx.iter().zip(&origin).map(|(i, o)| i - o).collect();
        q.set(&idx, f(&local)).expect("index inside compute domain");
    }
}

/// Tracer mixing ratio at level `k`.
pub fn qv_value(k: usize) -> f64 {
    0.001 * (k + 1) as f64
}

/// Layer pressure thickness at level `k`.
pub fn delp_value(k: usize) -> f64 {
    100.0 + 10.0 * k as f64
}

/// Expected column integral of `qv` over the full depth.
pub fn qv_column() -> f64 {
    (0..NZ).map(|k| qv_value(k) * delp_value(k)).sum()
}

/// Dycore state with `u`, `v`, `qv` and `delp`.
pub fn dycore_state() -> SubState {
    [
        ("u", xyz("m/s", |i, j, k| (i * 100 + j * 10 + k) as f64)),
        ("v", xyz("m/s", |i, j, k| -((i * 100 + j * 10 + k) as f64))),
        ("qv", xyz("kg/kg", |_, _, k| qv_value(k))),
        ("delp", xyz("Pa", |_, _, k| delp_value(k))),
    ]
    .into_iter()
    .collect()
}

/// Physics state with `surface_temperature` and `precipitation`.
pub fn physics_state() -> SubState {
    [
        ("surface_temperature", xy("K", |i, j| 280.0 + (i + j) as f64)),
        ("precipitation", xy("kg/m**2/s", |_, _| 0.0)),
    ]
    .into_iter()
    .collect()
}

pub fn driver_state() -> DriverState {
    DriverState::new(dycore_state(), physics_state())
}

pub fn grid_data() -> GridData {
    GridData::new(
        xy("degrees_north", |_, j| -30.0 + 20.0 * j as f64),
        xy("degrees_east", |i, _| 10.0 * i as f64),
    )
}
