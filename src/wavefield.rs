use crate::error::Result;
use crate::field::{FieldId, TimeHistory, Workspace};
use crate::grid::{Axis, Dimensionality, Staggering};
use ndarray::{ArrayD, Zip};

/// Vector quantity with one staggered component per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorField {
    Planar { x: FieldId, z: FieldId },
    Volumetric { x: FieldId, y: FieldId, z: FieldId },
}

impl VectorField {
    pub fn x(&self) -> FieldId {
        match self {
            VectorField::Planar { x, .. } | VectorField::Volumetric { x, .. } => *x,
        }
    }

    /// Absent on planar grids.
    pub fn y(&self) -> Option<FieldId> {
        match self {
            VectorField::Planar { .. } => None,
            VectorField::Volumetric { y, .. } => Some(*y),
        }
    }

    pub fn z(&self) -> FieldId {
        match self {
            VectorField::Planar { z, .. } | VectorField::Volumetric { z, .. } => *z,
        }
    }

    pub fn components(&self) -> Vec<FieldId> {
        match self {
            VectorField::Planar { x, z } => vec![*x, *z],
            VectorField::Volumetric { x, y, z } => vec![*x, *y, *z],
        }
    }
}

/// Symmetric stress tensor; normal components on nodes, shear components
/// staggered along both of their axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressField {
    Planar {
        xx: FieldId,
        zz: FieldId,
        xz: FieldId,
    },
    Volumetric {
        xx: FieldId,
        yy: FieldId,
        zz: FieldId,
        xy: FieldId,
        xz: FieldId,
        yz: FieldId,
    },
}

impl StressField {
    pub fn xx(&self) -> FieldId {
        match self {
            StressField::Planar { xx, .. } | StressField::Volumetric { xx, .. } => *xx,
        }
    }

    pub fn zz(&self) -> FieldId {
        match self {
            StressField::Planar { zz, .. } | StressField::Volumetric { zz, .. } => *zz,
        }
    }

    pub fn xz(&self) -> FieldId {
        match self {
            StressField::Planar { xz, .. } | StressField::Volumetric { xz, .. } => *xz,
        }
    }

    pub fn yy(&self) -> Option<FieldId> {
        match self {
            StressField::Planar { .. } => None,
            StressField::Volumetric { yy, .. } => Some(*yy),
        }
    }

    pub fn xy(&self) -> Option<FieldId> {
        match self {
            StressField::Planar { .. } => None,
            StressField::Volumetric { xy, .. } => Some(*xy),
        }
    }

    pub fn yz(&self) -> Option<FieldId> {
        match self {
            StressField::Planar { .. } => None,
            StressField::Volumetric { yz, .. } => Some(*yz),
        }
    }

    pub fn components(&self) -> Vec<FieldId> {
        match self {
            StressField::Planar { xx, zz, xz } => vec![*xx, *zz, *xz],
            StressField::Volumetric {
                xx,
                yy,
                zz,
                xy,
                xz,
                yz,
            } => vec![*xx, *yy, *zz, *xy, *xz, *yz],
        }
    }
}

/// Every field the poroelastic kernels advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wavefield {
    pub velocity: VectorField,
    pub relative_velocity: VectorField,
    pub stress: StressField,
    pub pressure: FieldId,
}

impl Wavefield {
    pub fn build(ws: &mut Workspace, history: TimeHistory, space_order: usize) -> Result<Self> {
        Ok(Wavefield {
            velocity: particle_velocity_fields(ws, history, space_order)?,
            relative_velocity: relative_velocity_fields(ws, history, space_order)?,
            stress: stress_fields(ws, history, space_order)?,
            pressure: pressure_field(ws, history, space_order)?,
        })
    }

    pub fn components(&self) -> Vec<FieldId> {
        let mut out = self.velocity.components();
        out.extend(self.relative_velocity.components());
        out.extend(self.stress.components());
        out.push(self.pressure);
        out
    }

    /// `|v|` at time step `t`, each component taken at its own storage point.
    pub fn velocity_magnitude(&self, ws: &Workspace, t: usize) -> ArrayD<f64> {
        let mut mag = ArrayD::zeros(ws.field(self.velocity.x()).at(t).raw_dim());
        for id in self.velocity.components() {
            Zip::from(&mut mag)
                .and(ws.field(id).at(t))
                .for_each(|m, &v| *m += v * v);
        }
        mag.mapv_inplace(f64::sqrt);
        mag
    }
}

fn vector_fields(
    ws: &mut Workspace,
    prefix: &str,
    history: TimeHistory,
    space_order: usize,
) -> Result<VectorField> {
    let dims = ws.dims();
    let mut component = |axis: Axis| {
        ws.add_field(
            &format!("{prefix}{axis}"),
            Staggering::along(&[axis]),
            history,
            space_order,
        )
    };
    Ok(match dims {
        Dimensionality::Two => VectorField::Planar {
            x: component(Axis::X)?,
            z: component(Axis::Z)?,
        },
        Dimensionality::Three => VectorField::Volumetric {
            x: component(Axis::X)?,
            y: component(Axis::Y)?,
            z: component(Axis::Z)?,
        },
    })
}

pub fn particle_velocity_fields(
    ws: &mut Workspace,
    history: TimeHistory,
    space_order: usize,
) -> Result<VectorField> {
    vector_fields(ws, "v", history, space_order)
}

pub fn relative_velocity_fields(
    ws: &mut Workspace,
    history: TimeHistory,
    space_order: usize,
) -> Result<VectorField> {
    vector_fields(ws, "q", history, space_order)
}

pub fn stress_fields(ws: &mut Workspace, history: TimeHistory, space_order: usize) -> Result<StressField> {
    let dims = ws.dims();
    let mut component = |a: Axis, b: Axis| {
        let staggering = if a == b {
            Staggering::NODE
        } else {
            Staggering::along(&[a, b])
        };
        ws.add_field(&format!("t{a}{b}"), staggering, history, space_order)
    };
    Ok(match dims {
        Dimensionality::Two => StressField::Planar {
            xx: component(Axis::X, Axis::X)?,
            zz: component(Axis::Z, Axis::Z)?,
            xz: component(Axis::X, Axis::Z)?,
        },
        Dimensionality::Three => StressField::Volumetric {
            xx: component(Axis::X, Axis::X)?,
            yy: component(Axis::Y, Axis::Y)?,
            zz: component(Axis::Z, Axis::Z)?,
            xy: component(Axis::X, Axis::Y)?,
            xz: component(Axis::X, Axis::Z)?,
            yz: component(Axis::Y, Axis::Z)?,
        },
    })
}

pub fn pressure_field(ws: &mut Workspace, history: TimeHistory, space_order: usize) -> Result<FieldId> {
    ws.add_field("p", Staggering::NODE, history, space_order)
}
