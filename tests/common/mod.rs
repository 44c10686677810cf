//! Shared fixtures and tolerance helpers for integration tests

#![allow(dead_code)]

use ndarray::Array2;
use poroelastic_modeller::{Grid, Model, PointSource, PoroelasticMaterial, Receiver, TimeAxis};

/// Water-saturated sandstone, permeable enough that the drag term stays
/// resolved at the time steps used here.
pub fn sandstone() -> PoroelasticMaterial {
    PoroelasticMaterial {
        vp: 3000.0,
        vs: 1500.0,
        rho_s: 2650.0,
        rho_f: 1000.0,
        phi: 0.2,
        k: 1.0e-9,
        mu_f: 1.0e-3,
        k_dr: 1.0e10,
        k_s: 3.6e10,
        k_f: 2.25e9,
        g: 6.0e9,
        tortuosity: 2.0,
    }
}

/// Homogeneous model with `n` cells of 5 m per axis.
pub fn homogeneous_model(ndim: usize, n: usize, nbl: usize) -> Model {
    let grid = Grid::new(vec![n; ndim], vec![5.0; ndim], nbl).unwrap();
    Model::homogeneous(grid, &sandstone()).unwrap()
}

/// Ricker source at `position` peaking at 4 ms.
pub fn ricker_source(position: &[f64], axis: TimeAxis, amplitude: f64) -> PointSource {
    let coords = Array2::from_shape_vec((1, position.len()), position.to_vec()).unwrap();
    PointSource::ricker("shot", coords, axis, 100.0, Some(0.004), amplitude)
}

/// Receivers at the given x offsets, every other coordinate fixed at `depth`.
pub fn receiver_line(xs: &[f64], ndim: usize, depth: f64, axis: TimeAxis) -> Receiver {
    let coords = Array2::from_shape_fn((xs.len(), ndim), |(i, d)| if d == 0 { xs[i] } else { depth });
    Receiver::new("line", coords, axis)
}

pub fn max_abs(values: &Array2<f64>) -> f64 {
    values.iter().map(|v| v.abs()).fold(0.0, f64::max)
}

/// Relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-300 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}

/// Assert two traces agree to within `tolerance` of the larger peak.
pub fn assert_traces_close(a: &Array2<f64>, b: &Array2<f64>, tolerance: f64, message: &str) {
    assert_eq!(a.dim(), b.dim(), "{}: dimension mismatch", message);
    let scale = max_abs(a).max(max_abs(b)).max(f64::MIN_POSITIVE);
    for ((ix, &x), &y) in a.indexed_iter().zip(b.iter()) {
        let diff = (x - y).abs() / scale;
        assert!(
            diff <= tolerance,
            "{}: sample {:?} differs by {} (tolerance {})",
            message,
            ix,
            diff,
            tolerance
        );
    }
}
