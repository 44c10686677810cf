//! Pointwise evaluation of update expressions on the staggered grid.
//!
//! A value at storage index `i` lives at `i * h` on an unstaggered axis and at
//! `(i + 1/2) * h` on a staggered one. Reads outside the padded grid are zero.

use crate::error::{PoroError, Result};
use crate::expr::{Expr, FieldRef, TimeLevel};
use crate::field::Workspace;
use crate::grid::{Grid, Symbol};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

const WEIGHTS_2: [f64; 1] = [1.0];
const WEIGHTS_4: [f64; 2] = [9.0 / 8.0, -1.0 / 24.0];
const WEIGHTS_6: [f64; 3] = [75.0 / 64.0, -25.0 / 384.0, 3.0 / 640.0];
const WEIGHTS_8: [f64; 4] = [1225.0 / 1024.0, -245.0 / 3072.0, 49.0 / 5120.0, -5.0 / 7168.0];

/// Half-offset first-derivative weights for a given accuracy order.
pub fn staggered_weights(order: usize) -> Result<&'static [f64]> {
    match order {
        2 => Ok(&WEIGHTS_2),
        4 => Ok(&WEIGHTS_4),
        6 => Ok(&WEIGHTS_6),
        8 => Ok(&WEIGHTS_8),
        _ => Err(PoroError::UnsupportedSpaceOrder { order }),
    }
}

fn sample(data: &ArrayD<f64>, index: &[isize]) -> f64 {
    let mut uix = [0usize; 3];
    for (d, &i) in index.iter().enumerate() {
        if i < 0 {
            return 0.0;
        }
        uix[d] = i as usize;
    }
    data.get(IxDyn(&uix[..index.len()])).copied().unwrap_or(0.0)
}

/// Read `data` (sitting at `src` offsets) at location `loc`, averaging the
/// two neighbours on every axis where the offsets disagree. `skip` excludes
/// one axis from the averaging.
fn read_at(data: &ArrayD<f64>, src: &[bool], loc: &[bool], index: &[isize], skip: Option<usize>) -> f64 {
    let ndim = index.len();
    let mut mismatched = [0usize; 3];
    let mut count = 0;
    for d in 0..ndim {
        if Some(d) != skip && src[d] != loc[d] {
            mismatched[count] = d;
            count += 1;
        }
    }
    if count == 0 {
        return sample(data, index);
    }

    let mut ix = [0isize; 3];
    let mut sum = 0.0;
    for mask in 0..(1usize << count) {
        ix[..ndim].copy_from_slice(index);
        for (bit, &d) in mismatched[..count].iter().enumerate() {
            let upper = (mask >> bit) & 1 == 1;
            // staggered target between i and i+1, node target between i-1 and i
            ix[d] += match (loc[d], upper) {
                (true, false) => 0,
                (true, true) => 1,
                (false, false) => -1,
                (false, true) => 0,
            };
        }
        sum += sample(data, &ix[..ndim]);
    }
    sum / (1usize << count) as f64
}

/// Evaluates expressions at grid locations for one time step.
pub struct Evaluator<'a> {
    ws: &'a Workspace,
    t: usize,
    dt: f64,
    inv_spacing: &'a [f64],
}

impl<'a> Evaluator<'a> {
    /// `inv_spacing` holds `1/h` per storage axis.
    pub fn new(ws: &'a Workspace, t: usize, dt: f64, inv_spacing: &'a [f64]) -> Self {
        Self {
            ws,
            t,
            dt,
            inv_spacing,
        }
    }

    fn level(&self, r: FieldRef) -> &'a ArrayD<f64> {
        let field = self.ws.field(r.field);
        match r.time {
            TimeLevel::Now => field.at(self.t),
            TimeLevel::Forward => field.at(self.t + 1),
        }
    }

    /// Value of `expr` at storage index `index` for a quantity located at `loc`.
    pub fn eval(&self, expr: &Expr, index: &[isize], loc: &[bool]) -> f64 {
        match expr {
            Expr::Const(v) => *v,
            Expr::Symbol(Symbol::Dt) => self.dt,
            Expr::Symbol(Symbol::Spacing(axis)) => self
                .ws
                .dims()
                .axis_index(*axis)
                .map(|d| 1.0 / self.inv_spacing[d])
                .unwrap_or(f64::NAN),
            Expr::Param(p) => {
                let node = [false; 3];
                read_at(&self.ws.param(*p).data, &node[..index.len()], loc, index, None)
            }
            Expr::Field(r) => {
                let field = self.ws.field(r.field);
                read_at(self.level(*r), field.offsets(), loc, index, None)
            }
            Expr::Derivative(r, axis) => match self.ws.dims().axis_index(*axis) {
                Some(d) => self.derivative(*r, d, index, loc),
                None => f64::NAN,
            },
            Expr::Add(a, b) => self.eval(a, index, loc) + self.eval(b, index, loc),
            Expr::Mul(a, b) => self.eval(a, index, loc) * self.eval(b, index, loc),
            Expr::Div(a, b) => self.eval(a, index, loc) / self.eval(b, index, loc),
            Expr::Neg(a) => -self.eval(a, index, loc),
        }
    }

    fn derivative(&self, r: FieldRef, d: usize, index: &[isize], loc: &[bool]) -> f64 {
        let field = self.ws.field(r.field);
        let data = self.level(r);
        let src = field.offsets();
        let ndim = index.len();
        let mut ix = [0isize; 3];
        ix[..ndim].copy_from_slice(index);
        let base = index[d];
        let mut at = |shift: isize| {
            ix[d] = base + shift;
            read_at(data, src, loc, &ix[..ndim], Some(d))
        };

        if src[d] == loc[d] {
            // collocated: plain centred difference
            return (at(1) - at(-1)) * 0.5 * self.inv_spacing[d];
        }

        let weights = staggered_weights(field.space_order()).unwrap_or(&WEIGHTS_2[..]);
        let mut acc = 0.0;
        for (k, w) in weights.iter().enumerate() {
            let k = k as isize + 1;
            let (upper, lower) = if loc[d] { (k, 1 - k) } else { (k - 1, -k) };
            acc += w * (at(upper) - at(lower));
        }
        acc * self.inv_spacing[d]
    }

    /// Evaluate `expr` on every padded cell for a quantity located at `loc`.
    pub fn evaluate_grid(&self, expr: &Expr, loc: &[bool]) -> Result<ArrayD<f64>> {
        let grid = self.ws.grid();
        let shape = grid.padded_shape();
        let values: Vec<f64> = (0..grid.padded_len())
            .into_par_iter()
            .map(|flat| self.eval(expr, &grid.unravel(flat), loc))
            .collect();
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| PoroError::invalid_grid(e.to_string()))
    }

    /// Interpolate `expr` to a physical coordinate.
    pub fn evaluate_point(&self, expr: &Expr, coords: &[f64]) -> f64 {
        let node = [false; 3];
        let loc = &node[..coords.len()];
        point_weights(self.ws.grid(), loc, coords)
            .into_iter()
            .map(|(ix, w)| w * self.eval(expr, &ix, loc))
            .sum()
    }
}

/// Multilinear interpolation stencil of a physical coordinate onto the
/// storage points of a quantity located at `offsets`. Points outside the
/// padded grid are dropped.
pub fn point_weights(grid: &Grid, offsets: &[bool], coords: &[f64]) -> Vec<(Vec<isize>, f64)> {
    let ndim = coords.len();
    let nbl = grid.nbl() as f64;
    let mut base = vec![0isize; ndim];
    let mut frac = vec![0.0; ndim];
    for d in 0..ndim {
        let shift = if offsets[d] { 0.5 } else { 0.0 };
        let pos = coords[d] / grid.spacing()[d] + nbl - shift;
        let lower = pos.floor();
        base[d] = lower as isize;
        frac[d] = pos - lower;
    }

    let mut out = Vec::with_capacity(1 << ndim);
    for mask in 0..(1usize << ndim) {
        let mut ix = base.clone();
        let mut w = 1.0;
        for d in 0..ndim {
            if (mask >> d) & 1 == 1 {
                ix[d] += 1;
                w *= frac[d];
            } else {
                w *= 1.0 - frac[d];
            }
        }
        if w != 0.0 && grid.in_bounds(&ix) {
            out.push((ix, w));
        }
    }
    out
}
