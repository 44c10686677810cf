use crate::error::{PoroError, Result};
use crate::grid::{Dimensionality, Grid, Staggering};
use crate::source::SparseTimeSeries;
use crate::stencil;
use ndarray::{ArrayD, IxDyn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SparseId(pub(crate) usize);

/// How many time levels a field keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeHistory {
    /// Rolling window over the last three steps.
    Rolling,
    /// Every one of `nt` steps is retained.
    Full(usize),
}

impl TimeHistory {
    pub const ROLLING_DEPTH: usize = 3;

    pub fn from_save(save: bool, nt: usize) -> Self {
        if save {
            TimeHistory::Full(nt)
        } else {
            TimeHistory::Rolling
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TimeHistory::Rolling => Self::ROLLING_DEPTH,
            TimeHistory::Full(nt) => *nt,
        }
    }
}

/// Time-varying field on the padded grid.
#[derive(Debug, Clone)]
pub struct TimeField {
    name: String,
    staggering: Staggering,
    offsets: Vec<bool>,
    space_order: usize,
    history: TimeHistory,
    buffers: Vec<ArrayD<f64>>,
}

impl TimeField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn staggering(&self) -> Staggering {
        self.staggering
    }

    /// Half-cell offsets per storage axis.
    pub fn offsets(&self) -> &[bool] {
        &self.offsets
    }

    pub fn space_order(&self) -> usize {
        self.space_order
    }

    pub fn history(&self) -> TimeHistory {
        self.history
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer slot holding time step `t`.
    pub fn slot(&self, t: usize) -> usize {
        t % self.buffers.len()
    }

    pub fn at(&self, t: usize) -> &ArrayD<f64> {
        &self.buffers[self.slot(t)]
    }

    pub fn at_mut(&mut self, t: usize) -> &mut ArrayD<f64> {
        let slot = self.slot(t);
        &mut self.buffers[slot]
    }

    pub fn store(&mut self, t: usize, values: ArrayD<f64>) {
        let slot = self.slot(t);
        self.buffers[slot] = values;
    }

    pub fn buffers(&self) -> &[ArrayD<f64>] {
        &self.buffers
    }

    pub fn zero(&mut self) {
        for b in &mut self.buffers {
            b.fill(0.0);
        }
    }
}

/// Time-invariant node-centred coefficient array.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub data: ArrayD<f64>,
}

/// Registry of every array a set of update relations refers to.
#[derive(Debug, Clone)]
pub struct Workspace {
    grid: Grid,
    dims: Dimensionality,
    fields: Vec<TimeField>,
    params: Vec<Param>,
    sparse: Vec<SparseTimeSeries>,
}

impl Workspace {
    pub fn new(grid: Grid, dims: Dimensionality) -> Result<Self> {
        if grid.ndim() != dims.ndim() {
            return Err(PoroError::invalid_grid(format!(
                "{}-dimensional grid used as {:?}",
                grid.ndim(),
                dims
            )));
        }
        Ok(Workspace {
            grid,
            dims,
            fields: Vec::new(),
            params: Vec::new(),
            sparse: Vec::new(),
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn dims(&self) -> Dimensionality {
        self.dims
    }

    pub fn add_field(
        &mut self,
        name: &str,
        staggering: Staggering,
        history: TimeHistory,
        space_order: usize,
    ) -> Result<FieldId> {
        stencil::staggered_weights(space_order)?;
        if history.depth() == 0 {
            return Err(PoroError::TimeRange {
                field: name.to_string(),
                time_m: 0,
                time_max: 0,
                depth: 0,
            });
        }
        let shape = IxDyn(&self.grid.padded_shape());
        let field = TimeField {
            name: name.to_string(),
            staggering,
            offsets: staggering.offsets(self.dims),
            space_order,
            history,
            buffers: (0..history.depth())
                .map(|_| ArrayD::zeros(shape.clone()))
                .collect(),
        };
        self.fields.push(field);
        Ok(FieldId(self.fields.len() - 1))
    }

    pub fn add_param(&mut self, name: &str, data: ArrayD<f64>) -> Result<ParamId> {
        let expected = self.grid.padded_shape();
        if data.shape() != expected.as_slice() {
            return Err(PoroError::ShapeMismatch {
                name: name.to_string(),
                expected,
                actual: data.shape().to_vec(),
            });
        }
        self.params.push(Param {
            name: name.to_string(),
            data,
        });
        Ok(ParamId(self.params.len() - 1))
    }

    pub fn add_sparse(&mut self, series: SparseTimeSeries) -> Result<SparseId> {
        if series.coordinates.ncols() != self.grid.ndim() {
            return Err(PoroError::ShapeMismatch {
                name: series.name.clone(),
                expected: vec![series.npoint(), self.grid.ndim()],
                actual: series.coordinates.shape().to_vec(),
            });
        }
        let expected = (series.nt(), series.npoint());
        if series.data.dim() != expected {
            return Err(PoroError::ShapeMismatch {
                name: series.name.clone(),
                expected: vec![expected.0, expected.1],
                actual: series.data.shape().to_vec(),
            });
        }
        self.sparse.push(series);
        Ok(SparseId(self.sparse.len() - 1))
    }

    pub fn field(&self, id: FieldId) -> &TimeField {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut TimeField {
        &mut self.fields[id.0]
    }

    pub fn fields(&self) -> &[TimeField] {
        &self.fields
    }

    pub fn find_field(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|f| f.name == name).map(FieldId)
    }

    pub fn param(&self, id: ParamId) -> &Param {
        &self.params[id.0]
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn sparse(&self, id: SparseId) -> &SparseTimeSeries {
        &self.sparse[id.0]
    }

    pub fn sparse_mut(&mut self, id: SparseId) -> &mut SparseTimeSeries {
        &mut self.sparse[id.0]
    }

    pub fn find_sparse(&self, name: &str) -> Option<SparseId> {
        self.sparse.iter().position(|s| s.name == name).map(SparseId)
    }
}
