//! Poroelastic update relations.
//!
//! Each kernel registers its fields and coefficient arrays in a
//! [`Workspace`] and returns the relations one time step evaluates, in order.
//! Velocities are advanced first; stresses and pressure then read the
//! already-advanced velocities of the same step.

use crate::coefficients::{CoupledMomentum, SaturatedElastic};
use crate::error::{PoroError, Result};
use crate::expr::Expr;
use crate::field::{FieldId, SparseId, TimeHistory, Workspace};
use crate::grid::Dimensionality;
use crate::model::Model;
use crate::source::{PointSource, Receiver};
use crate::wavefield::Wavefield;

/// Injection of a source wavelet into the forward level of `field`,
/// scaled by `scale` at every receiving grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub field: FieldId,
    pub scale: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// `target.forward = expr`, evaluated at the target's storage points.
    Update { target: FieldId, expr: Expr },
    /// Add every point of `source` into each target's forward level.
    Inject {
        source: SparseId,
        targets: Vec<Injection>,
    },
    /// Sample `expr` at every point of `receiver` for the current step.
    Interpolate { receiver: SparseId, expr: Expr },
}

impl Relation {
    pub fn is_update(&self) -> bool {
        matches!(self, Relation::Update { .. })
    }

    pub fn target(&self) -> Option<FieldId> {
        match self {
            Relation::Update { target, .. } => Some(*target),
            _ => None,
        }
    }

    fn update(target: FieldId, expr: Expr) -> Self {
        Relation::Update { target, expr }
    }
}

/// Fields plus the ordered relations that advance them.
#[derive(Debug, Clone)]
pub struct KernelOutput {
    pub wavefield: Wavefield,
    pub relations: Vec<Relation>,
}

/// One equation set per supported dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Damped, coupled two-phase formulation.
    Poroelastic2d,
    /// Undamped single-phase Biot formulation.
    Poroelastic3d,
}

impl Kernel {
    pub fn select(dims: Dimensionality) -> Self {
        match dims {
            Dimensionality::Two => Kernel::Poroelastic2d,
            Dimensionality::Three => Kernel::Poroelastic3d,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Poroelastic2d => "poroelastic-2d",
            Kernel::Poroelastic3d => "poroelastic-3d",
        }
    }

    pub fn assemble(
        &self,
        model: &Model,
        ws: &mut Workspace,
        space_order: usize,
        history: TimeHistory,
        source: &PointSource,
        receiver: &Receiver,
    ) -> Result<KernelOutput> {
        match self {
            Kernel::Poroelastic2d => poroelastic_2d(model, ws, space_order, history, source, receiver),
            Kernel::Poroelastic3d => poroelastic_3d(model, ws, space_order, history, source, receiver),
        }
    }
}

/// 2D poroelastic kernel.
pub fn poroelastic_2d(
    model: &Model,
    ws: &mut Workspace,
    space_order: usize,
    history: TimeHistory,
    source: &PointSource,
    receiver: &Receiver,
) -> Result<KernelOutput> {
    let wavefield = Wavefield::build(ws, history, space_order)?;
    let (vx, vz) = (wavefield.velocity.x(), wavefield.velocity.z());
    let (qx, qz) = (wavefield.relative_velocity.x(), wavefield.relative_velocity.z());
    let (txx, tzz, txz) = (wavefield.stress.xx(), wavefield.stress.zz(), wavefield.stress.xz());
    let p = wavefield.pressure;

    let coupled = model.map_cells(|c| CoupledMomentum::derive(c.rho_b, c.rho_f, c.phi, c.tortuosity, c.mu_f, c.k));
    let damp = Expr::from(ws.add_param("damp", model.damp.clone())?);
    let a = Expr::from(ws.add_param("A", coupled.mapv(|c| c.a))?);
    let b = Expr::from(ws.add_param("B", coupled.mapv(|c| c.b))?);
    let c = Expr::from(ws.add_param("C", coupled.mapv(|c| c.c))?);
    let d = Expr::from(ws.add_param("D", coupled.mapv(|c| c.d))?);
    let e = Expr::from(ws.add_param("E", coupled.mapv(|c| c.e))?);
    let f = Expr::from(ws.add_param("F", coupled.mapv(|c| c.f))?);
    let l_u = Expr::from(ws.add_param("l_u", model.l_u.clone())?);
    let g = Expr::from(ws.add_param("G", model.g.clone())?);
    let alpha_m = Expr::from(ws.add_param("alpha_M", &model.alpha * &model.m)?);
    let m = Expr::from(ws.add_param("M", model.m.clone())?);
    let dt = Expr::dt();

    let div_x = || txx.now().dx() + txz.now().dz();
    let div_z = || txz.now().dx() + tzz.now().dz();
    let div_q = || qx.forward().dx() + qz.forward().dz();

    let u_vx = damp.clone()
        * (vx.now() + dt.clone() * (a.clone() * div_x() + c.clone() * p.now().dx()) + b.clone() * dt.clone() * qx.now());
    let u_vz = damp.clone()
        * (vz.now() + dt.clone() * (a * div_z() + c * p.now().dz()) + b * dt.clone() * qz.now());

    let u_qx = damp.clone()
        * (qx.now() + dt.clone() * (d.clone() * div_x() + f.clone() * p.now().dx()) + e.clone() * dt.clone() * qx.now());
    let u_qz = damp.clone()
        * (qz.now() + dt.clone() * (d * div_z() + f * p.now().dz()) + e * dt.clone() * qz.now());

    let lambda_2g = l_u.clone() + 2.0 * g.clone();
    let u_txx = damp.clone()
        * (txx.now()
            + dt.clone()
                * (lambda_2g.clone() * vx.forward().dx()
                    + l_u.clone() * vz.forward().dz()
                    + alpha_m.clone() * div_q()));
    let u_tzz = damp.clone()
        * (tzz.now()
            + dt.clone()
                * (lambda_2g * vz.forward().dz() + l_u * vx.forward().dx() + alpha_m.clone() * div_q()));
    let u_txz = damp.clone() * (txz.now() + dt.clone() * (g * (vx.forward().dz() + vz.forward().dx())));

    let u_p = damp
        * (p.now()
            - dt * (alpha_m * (vx.forward().dx() + vz.forward().dz()) + m * div_q()));

    let mut relations = vec![
        Relation::update(vx, u_vx),
        Relation::update(vz, u_vz),
        Relation::update(qx, u_qx),
        Relation::update(qz, u_qz),
        Relation::update(txx, u_txx),
        Relation::update(tzz, u_tzz),
        Relation::update(txz, u_txz),
        Relation::update(p, u_p),
    ];
    relations.extend(src_rec(model, ws, &wavefield, source, receiver)?);
    Ok(KernelOutput { wavefield, relations })
}

/// 3D poroelastic kernel.
pub fn poroelastic_3d(
    model: &Model,
    ws: &mut Workspace,
    space_order: usize,
    history: TimeHistory,
    source: &PointSource,
    receiver: &Receiver,
) -> Result<KernelOutput> {
    let wavefield = Wavefield::build(ws, history, space_order)?;
    let vel = wavefield.velocity;
    let (vx, vz) = (vel.x(), vel.z());
    let vy = vel.y().ok_or_else(|| PoroError::invalid_grid("volumetric kernel on a planar wavefield"))?;
    let stress = wavefield.stress;
    let missing = || PoroError::invalid_grid("volumetric kernel on a planar stress tensor");
    let (txx, tzz, txz) = (stress.xx(), stress.zz(), stress.xz());
    let tyy = stress.yy().ok_or_else(missing)?;
    let txy = stress.xy().ok_or_else(missing)?;
    let tyz = stress.yz().ok_or_else(missing)?;

    let saturated = model.map_cells(|c| {
        SaturatedElastic::derive(c.vp, c.vs, c.rho_s, c.rho_f, c.phi, c.k_dr, c.k_s, c.k_f)
    });
    let damp = Expr::from(ws.add_param("damp", model.damp.clone())?);
    let rho_b = Expr::from(ws.add_param("rho_b", saturated.mapv(|s| s.rho_b))?);
    let mu = Expr::from(ws.add_param("mu", saturated.mapv(|s| s.mu))?);
    let l = Expr::from(ws.add_param("lambda", saturated.mapv(|s| s.lambda))?);
    let dt = Expr::dt();

    let buoyancy = || damp.clone() * dt.clone() * (1.0 / rho_b.clone());
    let u_vx = damp.clone() * vx.now() - buoyancy() * (txx.now().dx() + txy.now().dy() + txz.now().dz());
    let u_vy = damp.clone() * vy.now() - buoyancy() * (txy.now().dx() + tyy.now().dy() + tyz.now().dz());
    let u_vz = damp.clone() * vz.now() - buoyancy() * (txz.now().dx() + tyz.now().dy() + tzz.now().dz());

    let normal = || damp.clone() * (l.clone() + 2.0 * mu.clone()) * dt.clone();
    let lateral = || damp.clone() * l.clone() * dt.clone();
    let shear = || damp.clone() * mu.clone() * dt.clone();

    let u_txx = damp.clone() * txx.now()
        - normal() * vx.forward().dx()
        - lateral() * (vy.forward().dy() + vz.forward().dz());
    let u_tyy = damp.clone() * tyy.now()
        - normal() * vy.forward().dy()
        - lateral() * (vx.forward().dx() + vz.forward().dz());
    let u_tzz = damp.clone() * tzz.now()
        - normal() * vz.forward().dz()
        - lateral() * (vx.forward().dx() + vy.forward().dy());
    let u_txz = damp.clone() * txz.now() - shear() * (vx.forward().dz() + vz.forward().dx());
    let u_txy = damp.clone() * txy.now() - shear() * (vy.forward().dx() + vx.forward().dy());
    let u_tyz = damp.clone() * tyz.now() - shear() * (vy.forward().dz() + vz.forward().dy());

    let mut relations = vec![
        Relation::update(vx, u_vx),
        Relation::update(vy, u_vy),
        Relation::update(vz, u_vz),
        Relation::update(txx, u_txx),
        Relation::update(tyy, u_tyy),
        Relation::update(tzz, u_tzz),
        Relation::update(txz, u_txz),
        Relation::update(txy, u_txy),
        Relation::update(tyz, u_tyz),
    ];
    relations.extend(src_rec(model, ws, &wavefield, source, receiver)?);
    Ok(KernelOutput { wavefield, relations })
}

/// Source injection and receiver interpolation.
///
/// The wavelet is split between the phases: `1 - phi` of it goes into the
/// normal stresses and, where the kernel advances pressure, `phi` into `p`.
/// `rec1` records `tzz`, `rec2` the divergence of the particle velocity.
pub fn src_rec(
    model: &Model,
    ws: &mut Workspace,
    wavefield: &Wavefield,
    source: &PointSource,
    receiver: &Receiver,
) -> Result<Vec<Relation>> {
    let mut src = source.clone();
    src.name = "src".to_string();
    let src = ws.add_sparse(src)?;
    let rec1 = ws.add_sparse(receiver.like("rec1"))?;
    let rec2 = ws.add_sparse(receiver.like("rec2"))?;

    let phi = Expr::from(ws.add_param("phi", model.phi.clone())?);
    let solid = (1.0 - phi.clone()) * Expr::dt();
    let fluid = phi * Expr::dt();

    let stress = wavefield.stress;
    let mut targets = vec![
        Injection {
            field: stress.xx(),
            scale: solid.clone(),
        },
        Injection {
            field: stress.zz(),
            scale: solid.clone(),
        },
    ];
    match ws.dims() {
        Dimensionality::Two => targets.push(Injection {
            field: wavefield.pressure,
            scale: fluid,
        }),
        Dimensionality::Three => {
            if let Some(tyy) = stress.yy() {
                targets.push(Injection {
                    field: tyy,
                    scale: solid,
                });
            }
        }
    }

    let vel = wavefield.velocity;
    let mut divergence = vel.x().now().dx() + vel.z().now().dz();
    if let Some(vy) = vel.y() {
        divergence = divergence + vy.now().dy();
    }

    Ok(vec![
        Relation::Inject {
            source: src,
            targets,
        },
        Relation::Interpolate {
            receiver: rec1,
            expr: stress.zz().now().expr(),
        },
        Relation::Interpolate {
            receiver: rec2,
            expr: divergence,
        },
    ])
}
