//! Error type shared by the modelling library.
//!
//! The binary and the configuration loader wrap these in `anyhow`; the library
//! itself only ever returns [`PoroError`].

use crate::grid::Axis;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoroError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoroError {
    /// No poroelastic kernel exists for this number of spatial axes.
    #[error("unsupported configuration: no poroelastic kernel for a {ndim}-dimensional grid (supported: 2, 3)")]
    UnsupportedDimensionality { ndim: usize },

    #[error("invalid grid: {message}")]
    InvalidGrid { message: String },

    #[error("shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Staggered stencils are only tabulated for even orders 2 to 8.
    #[error("unsupported space order {order} (supported: 2, 4, 6, 8)")]
    UnsupportedSpaceOrder { order: usize },

    #[error("symbol '{symbol}' has no value in the substitution map")]
    UnboundSymbol { symbol: String },

    #[error("axis {axis:?} does not exist on a {ndim}-dimensional grid")]
    AxisUnavailable { axis: Axis, ndim: usize },

    #[error("no {kind} named '{name}'")]
    UnknownName { kind: &'static str, name: String },

    #[error("time range {time_m}..={time_max} exceeds the {depth} stored time levels of '{field}'")]
    TimeRange {
        field: String,
        time_m: usize,
        time_max: usize,
        depth: usize,
    },

    #[error("invalid time step {dt}")]
    InvalidTimeStep { dt: f64 },
}

impl PoroError {
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        PoroError::UnknownName {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_grid(message: impl Into<String>) -> Self {
        PoroError::InvalidGrid {
            message: message.into(),
        }
    }
}
