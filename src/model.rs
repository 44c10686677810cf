use crate::coefficients::CoupledMomentum;
use crate::error::{PoroError, Result};
use crate::grid::{Dimensionality, Grid, SpacingMap, Symbol};
use ndarray::{ArrayD, Axis as ArrayAxis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Homogeneous poroelastic rock description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoroelasticMaterial {
    pub vp: f64,         // P-wave velocity (m/s)
    pub vs: f64,         // S-wave velocity (m/s)
    pub rho_s: f64,      // Grain density (kg/m^3)
    pub rho_f: f64,      // Pore fluid density (kg/m^3)
    pub phi: f64,        // Porosity
    pub k: f64,          // Permeability (m^2)
    pub mu_f: f64,       // Fluid viscosity (Pa s)
    pub k_dr: f64,       // Drained bulk modulus (Pa)
    pub k_s: f64,        // Grain bulk modulus (Pa)
    pub k_f: f64,        // Fluid bulk modulus (Pa)
    pub g: f64,          // Frame shear modulus (Pa)
    pub tortuosity: f64, // Dimensionless
}

/// Heterogeneous material arrays on the physical (unpadded) grid.
#[derive(Debug, Clone)]
pub struct MaterialArrays {
    pub vp: ArrayD<f64>,
    pub vs: ArrayD<f64>,
    pub rho_s: ArrayD<f64>,
    pub rho_f: ArrayD<f64>,
    pub phi: ArrayD<f64>,
    pub k: ArrayD<f64>,
    pub mu_f: ArrayD<f64>,
    pub k_dr: ArrayD<f64>,
    pub k_s: ArrayD<f64>,
    pub k_f: ArrayD<f64>,
    pub g: ArrayD<f64>,
    pub tortuosity: ArrayD<f64>,
}

impl MaterialArrays {
    pub fn homogeneous(shape: &[usize], m: &PoroelasticMaterial) -> Self {
        let fill = |v: f64| ArrayD::from_elem(IxDyn(shape), v);
        MaterialArrays {
            vp: fill(m.vp),
            vs: fill(m.vs),
            rho_s: fill(m.rho_s),
            rho_f: fill(m.rho_f),
            phi: fill(m.phi),
            k: fill(m.k),
            mu_f: fill(m.mu_f),
            k_dr: fill(m.k_dr),
            k_s: fill(m.k_s),
            k_f: fill(m.k_f),
            g: fill(m.g),
            tortuosity: fill(m.tortuosity),
        }
    }
}

/// Material values of a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellProperties {
    pub vp: f64,
    pub vs: f64,
    pub rho_s: f64,
    pub rho_f: f64,
    pub phi: f64,
    pub k: f64,
    pub mu_f: f64,
    pub k_dr: f64,
    pub k_s: f64,
    pub k_f: f64,
    pub g: f64,
    pub tortuosity: f64,
    pub rho_b: f64,
    pub alpha: f64,
    pub m: f64,
    pub k_u: f64,
    pub l_u: f64,
}

/// Physical model: grid plus padded material and absorbing-layer arrays.
///
/// Parameter consistency (positive moduli, `0 < phi < 1`) is the caller's
/// responsibility and is not checked here.
#[derive(Debug, Clone)]
pub struct Model {
    pub grid: Grid,

    // Primary storage on the padded grid, node positions
    pub vp: ArrayD<f64>,
    pub vs: ArrayD<f64>,
    pub rho_s: ArrayD<f64>,
    pub rho_f: ArrayD<f64>,
    pub phi: ArrayD<f64>,
    pub k: ArrayD<f64>,
    pub mu_f: ArrayD<f64>,
    pub k_dr: ArrayD<f64>,
    pub k_s: ArrayD<f64>,
    pub k_f: ArrayD<f64>,
    pub g: ArrayD<f64>,
    pub tortuosity: ArrayD<f64>,

    // Biot-Gassmann quantities derived once at construction
    pub rho_b: ArrayD<f64>, // Bulk density
    pub alpha: ArrayD<f64>, // Biot coefficient
    pub m: ArrayD<f64>,     // Biot modulus
    pub k_u: ArrayD<f64>,   // Undrained bulk modulus
    pub l_u: ArrayD<f64>,   // Undrained Lamé parameter

    /// Multiplicative absorbing mask, 1 in the interior.
    pub damp: ArrayD<f64>,
}

impl Model {
    pub fn homogeneous(grid: Grid, material: &PoroelasticMaterial) -> Result<Self> {
        let arrays = MaterialArrays::homogeneous(grid.shape(), material);
        Self::from_arrays(grid, arrays)
    }

    pub fn from_arrays(grid: Grid, arrays: MaterialArrays) -> Result<Self> {
        let pad = |name: &str, values: &ArrayD<f64>| pad_edge(&grid, name, values);

        let vp = pad("vp", &arrays.vp)?;
        let vs = pad("vs", &arrays.vs)?;
        let rho_s = pad("rho_s", &arrays.rho_s)?;
        let rho_f = pad("rho_f", &arrays.rho_f)?;
        let phi = pad("phi", &arrays.phi)?;
        let k = pad("k", &arrays.k)?;
        let mu_f = pad("mu_f", &arrays.mu_f)?;
        let k_dr = pad("k_dr", &arrays.k_dr)?;
        let k_s = pad("k_s", &arrays.k_s)?;
        let k_f = pad("k_f", &arrays.k_f)?;
        let g = pad("g", &arrays.g)?;
        let tortuosity = pad("tortuosity", &arrays.tortuosity)?;

        let rho_b = &phi * &rho_f + (1.0 - &phi) * &rho_s;
        let alpha = 1.0 - &k_dr / &k_s;
        let m = 1.0 / (&phi / &k_f + (&alpha - &phi) / &k_s);
        let k_u = &alpha * &alpha * &m + &k_dr;
        let l_u = &k_u - &(&g * (2.0 / 3.0));

        let damp = damping_mask(&grid);

        Ok(Model {
            grid,
            vp,
            vs,
            rho_s,
            rho_f,
            phi,
            k,
            mu_f,
            k_dr,
            k_s,
            k_f,
            g,
            tortuosity,
            rho_b,
            alpha,
            m,
            k_u,
            l_u,
            damp,
        })
    }

    pub fn dimensionality(&self) -> Result<Dimensionality> {
        Dimensionality::from_ndim(self.grid.ndim())
    }

    /// Grid spacing symbols with their numeric values.
    pub fn spacing_map(&self) -> Result<SpacingMap> {
        let dims = self.dimensionality()?;
        Ok(dims
            .axes()
            .iter()
            .zip(self.grid.spacing())
            .map(|(&axis, &h)| (Symbol::Spacing(axis), h))
            .collect())
    }

    pub fn cell(&self, index: &IxDyn) -> CellProperties {
        CellProperties {
            vp: self.vp[index],
            vs: self.vs[index],
            rho_s: self.rho_s[index],
            rho_f: self.rho_f[index],
            phi: self.phi[index],
            k: self.k[index],
            mu_f: self.mu_f[index],
            k_dr: self.k_dr[index],
            k_s: self.k_s[index],
            k_f: self.k_f[index],
            g: self.g[index],
            tortuosity: self.tortuosity[index],
            rho_b: self.rho_b[index],
            alpha: self.alpha[index],
            m: self.m[index],
            k_u: self.k_u[index],
            l_u: self.l_u[index],
        }
    }

    /// Evaluate `f` on every padded cell.
    pub fn map_cells<T, F>(&self, f: F) -> ArrayD<T>
    where
        F: Fn(&CellProperties) -> T,
    {
        ArrayD::from_shape_fn(IxDyn(&self.grid.padded_shape()), |ix| f(&self.cell(&ix)))
    }

    /// Fastest P-wave speed in the model: the larger of the given `vp` and
    /// the undrained speed `sqrt((l_u + 2g) / rho_b)`.
    pub fn max_p_velocity(&self) -> f64 {
        self.map_cells(|c| c.vp.max(((c.l_u + 2.0 * c.g) / c.rho_b).sqrt()))
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    /// Stable time step `cfl * min(h) / vp_max`.
    pub fn critical_dt(&self, cfl: f64) -> f64 {
        let vp_max = self.max_p_velocity();
        if vp_max <= 0.0 {
            log::warn!("model has no finite positive P-wave speed; critical dt is unbounded");
            return f64::INFINITY;
        }
        cfl * self.grid.min_spacing() / vp_max
    }

    /// Shortest viscous relaxation time `rho_bar / (rho_b * mu_f / k)` of the
    /// relative fluid motion. Explicit steps longer than this let the drag
    /// term overshoot.
    pub fn drag_limited_dt(&self) -> f64 {
        self.map_cells(|c| {
            let drag = CoupledMomentum::derive(c.rho_b, c.rho_f, c.phi, c.tortuosity, c.mu_f, c.k);
            1.0 / drag.e.abs()
        })
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::INFINITY, f64::min)
    }
}

fn pad_edge(grid: &Grid, name: &str, values: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    if values.shape() != grid.shape() {
        return Err(PoroError::ShapeMismatch {
            name: name.to_string(),
            expected: grid.shape().to_vec(),
            actual: values.shape().to_vec(),
        });
    }
    let nbl = grid.nbl() as isize;
    let shape = grid.shape();
    Ok(ArrayD::from_shape_fn(IxDyn(&grid.padded_shape()), |ix| {
        let src: Vec<usize> = (0..ix.ndim())
            .map(|d| (ix[d] as isize - nbl).clamp(0, shape[d] as isize - 1) as usize)
            .collect();
        values[IxDyn(&src)]
    }))
}

/// Absorbing mask: each border slab at depth `i` loses
/// `c * (pos - sin(2 pi pos) / (2 pi))` with `pos = (nbl - i) / nbl`.
fn damping_mask(grid: &Grid) -> ArrayD<f64> {
    let shape = grid.padded_shape();
    let mut damp = ArrayD::from_elem(IxDyn(&shape), 1.0);
    let nbl = grid.nbl();
    if nbl == 0 {
        return damp;
    }
    let coeff = 1.5 * (1.0f64 / 0.001).ln() / 40.0;
    for (d, &n) in shape.iter().enumerate() {
        for i in 0..nbl {
            let pos = (nbl - i) as f64 / nbl as f64;
            let val = coeff * (pos - (2.0 * PI * pos).sin() / (2.0 * PI));
            damp.index_axis_mut(ArrayAxis(d), i)
                .mapv_inplace(|v| v - val);
            damp.index_axis_mut(ArrayAxis(d), n - 1 - i)
                .mapv_inplace(|v| v - val);
        }
    }
    damp
}
