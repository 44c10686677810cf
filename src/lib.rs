//! Staggered-grid finite-difference modelling of poroelastic waves.
//!
//! [`forward_operator`] assembles the update relations for a 2D or 3D
//! [`Model`] and returns an [`Operator`] that steps them through time,
//! injecting a [`PointSource`] and sampling [`Receiver`] traces.

pub mod coefficients;
pub mod config;
pub mod error;
pub mod expr;
pub mod field;
pub mod grid;
pub mod kernel;
pub mod model;
pub mod operator;
pub mod source;
pub mod stencil;
pub mod visualisation;
pub mod wavefield;

pub use error::{PoroError, Result};
pub use field::TimeHistory;
pub use grid::{Axis, Dimensionality, Grid, Staggering};
pub use kernel::{Kernel, Relation};
pub use model::{MaterialArrays, Model, PoroelasticMaterial};
pub use operator::{forward_operator, ApplyArgs, ApplySummary, Operator, OperatorOptions};
pub use source::{PointSource, Receiver, TimeAxis};
pub use wavefield::Wavefield;
