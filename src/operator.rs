//! Time stepping of assembled poroelastic relations.

use crate::error::{PoroError, Result};
use crate::expr::Expr;
use crate::field::{SparseId, TimeField, TimeHistory, Workspace};
use crate::grid::{Dimensionality, SpacingMap, Symbol};
use crate::kernel::{Injection, Kernel, KernelOutput, Relation};
use crate::model::Model;
use crate::source::{PointSource, Receiver};
use crate::stencil::{point_weights, Evaluator};
use crate::wavefield::Wavefield;
use ndarray::{Array2, ArrayD, Slice};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorOptions {
    pub space_order: usize,
    /// Keep every time step instead of a rolling window.
    pub save: bool,
    pub name: String,
}

impl Default for OperatorOptions {
    fn default() -> Self {
        Self {
            space_order: 4,
            save: false,
            name: "Forward".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyArgs {
    pub dt: f64,
    pub time_m: usize,
    /// Last step to compute; defaults to the second-to-last source sample.
    pub time_max: Option<usize>,
}

impl ApplyArgs {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            time_m: 0,
            time_max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplySummary {
    pub name: String,
    pub time_m: usize,
    pub time_max: usize,
    pub steps: usize,
    pub elapsed: Duration,
}

impl ApplySummary {
    /// Grid-point updates per second, counting every update relation once.
    pub fn throughput(&self, points_per_step: usize) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.steps * points_per_step) as f64 / secs
        } else {
            0.0
        }
    }
}

/// Assembled relations bound to their arrays, ready to run.
#[derive(Debug, Clone)]
pub struct Operator {
    name: String,
    kernel: Kernel,
    ws: Workspace,
    wavefield: Wavefield,
    relations: Vec<Relation>,
    inv_spacing: Vec<f64>,
    source: SparseId,
    latest: Option<usize>,
}

/// Build the forward poroelastic operator for `model`.
///
/// The kernel is chosen from the model's dimensionality; anything other than
/// a 2D or 3D grid fails here with [`PoroError::UnsupportedDimensionality`].
pub fn forward_operator(
    model: &Model,
    source: &PointSource,
    receiver: &Receiver,
    options: &OperatorOptions,
) -> Result<Operator> {
    let dims = model.dimensionality()?;
    let kernel = Kernel::select(dims);
    let history = TimeHistory::from_save(options.save, source.nt());
    let mut ws = Workspace::new(model.grid.clone(), dims)?;

    log::debug!(
        "assembling {} kernel (space order {}, {} time levels)",
        kernel.name(),
        options.space_order,
        history.depth()
    );
    let output = kernel.assemble(model, &mut ws, options.space_order, history, source, receiver)?;
    Operator::new(&options.name, kernel, ws, output, &model.spacing_map()?)
}

impl Operator {
    /// Bind grid spacings into every relation.
    ///
    /// Only `dt` may stay symbolic; it is supplied at [`Operator::apply`].
    pub fn new(
        name: &str,
        kernel: Kernel,
        ws: Workspace,
        output: KernelOutput,
        subs: &SpacingMap,
    ) -> Result<Self> {
        let dims = ws.dims();
        let inv_spacing = dims
            .axes()
            .iter()
            .map(|&axis| {
                subs.get(&Symbol::Spacing(axis))
                    .map(|h| 1.0 / h)
                    .ok_or_else(|| unbound(Symbol::Spacing(axis)))
            })
            .collect::<Result<Vec<_>>>()?;

        let relations = output
            .relations
            .iter()
            .map(|rel| bind(rel, subs, dims))
            .collect::<Result<Vec<_>>>()?;

        let source = ws
            .find_sparse("src")
            .ok_or_else(|| PoroError::unknown("source", "src"))?;

        log::debug!(
            "operator '{}': {} relations over {} fields",
            name,
            relations.len(),
            ws.fields().len()
        );

        Ok(Self {
            name: name.to_string(),
            kernel,
            ws,
            wavefield: output.wavefield,
            relations,
            inv_spacing,
            source,
            latest: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn wavefield(&self) -> &Wavefield {
        &self.wavefield
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    /// Last time step written, if the operator has run.
    pub fn latest_step(&self) -> Option<usize> {
        self.latest
    }

    pub fn field(&self, name: &str) -> Result<&TimeField> {
        self.ws
            .find_field(name)
            .map(|id| self.ws.field(id))
            .ok_or_else(|| PoroError::unknown("field", name))
    }

    /// Field `name` at time step `step`, cropped to the physical domain.
    pub fn snapshot(&self, name: &str, step: usize) -> Result<ArrayD<f64>> {
        let field = self.field(name)?;
        self.check_held(field, step)?;
        Ok(self.crop(field.at(step)))
    }

    /// `|v|` at time step `step`, cropped to the physical domain.
    pub fn velocity_magnitude(&self, step: usize) -> Result<ArrayD<f64>> {
        self.check_held(self.ws.field(self.wavefield.velocity.x()), step)?;
        Ok(self.crop(&self.wavefield.velocity_magnitude(&self.ws, step)))
    }

    fn check_held(&self, field: &TimeField, step: usize) -> Result<()> {
        let depth = field.depth();
        let latest = self.latest.unwrap_or(0);
        let held = match field.history() {
            TimeHistory::Full(_) => step < depth,
            TimeHistory::Rolling => step <= latest && step + depth > latest,
        };
        if held {
            Ok(())
        } else {
            Err(PoroError::TimeRange {
                field: field.name().to_string(),
                time_m: step,
                time_max: step,
                depth,
            })
        }
    }

    fn crop(&self, data: &ArrayD<f64>) -> ArrayD<f64> {
        let grid = self.ws.grid();
        let nbl = grid.nbl();
        let shape = grid.shape();
        data.slice_each_axis(|ax| Slice::from(nbl..nbl + shape[ax.axis.index()]))
            .to_owned()
    }

    pub fn receiver_data(&self, name: &str) -> Result<&Array2<f64>> {
        self.ws
            .find_sparse(name)
            .map(|id| &self.ws.sparse(id).data)
            .ok_or_else(|| PoroError::unknown("receiver", name))
    }

    /// Zero every field and recorded trace; the source wavelet is kept.
    pub fn reset(&mut self) {
        for rel in &self.relations {
            match rel {
                Relation::Update { target, .. } => self.ws.field_mut(*target).zero(),
                Relation::Interpolate { receiver, .. } => self.ws.sparse_mut(*receiver).data.fill(0.0),
                Relation::Inject { .. } => {}
            }
        }
        self.latest = None;
    }

    /// Run steps `time_m..=time_max`, each writing level `t + 1`.
    pub fn apply(&mut self, args: ApplyArgs) -> Result<ApplySummary> {
        if !(args.dt.is_finite() && args.dt > 0.0) {
            return Err(PoroError::InvalidTimeStep { dt: args.dt });
        }
        let nt = self.ws.sparse(self.source).nt();
        let time_max = args.time_max.unwrap_or(nt.saturating_sub(2));
        self.check_time_range(args.time_m, time_max)?;

        log::info!(
            "{}: {} kernel, steps {}..={} at dt = {:.3e} s",
            self.name,
            self.kernel.name(),
            args.time_m,
            time_max,
            args.dt
        );
        let started = Instant::now();
        let steps = time_max - args.time_m + 1;
        let report = (steps / 10).max(1);
        for t in args.time_m..=time_max {
            self.step(t, args.dt)?;
            if (t - args.time_m + 1) % report == 0 {
                log::debug!("{}: step {}/{}", self.name, t + 1, time_max + 1);
            }
        }
        let summary = ApplySummary {
            name: self.name.clone(),
            time_m: args.time_m,
            time_max,
            steps,
            elapsed: started.elapsed(),
        };
        let points = self.ws.grid().padded_len() * self.relations.iter().filter(|r| r.is_update()).count();
        log::info!(
            "{}: {} steps in {:.2} s ({:.3e} point updates/s)",
            self.name,
            summary.steps,
            summary.elapsed.as_secs_f64(),
            summary.throughput(points)
        );
        Ok(summary)
    }

    fn check_time_range(&self, time_m: usize, time_max: usize) -> Result<()> {
        for field in self.ws.fields() {
            let full = matches!(field.history(), TimeHistory::Full(_));
            if time_m > time_max || (full && time_max + 1 >= field.depth()) {
                return Err(PoroError::TimeRange {
                    field: field.name().to_string(),
                    time_m,
                    time_max,
                    depth: field.depth(),
                });
            }
        }
        Ok(())
    }

    /// Advance every relation once, reading level `t` and writing `t + 1`.
    pub fn step(&mut self, t: usize, dt: f64) -> Result<()> {
        for i in 0..self.relations.len() {
            match &self.relations[i] {
                Relation::Update { target, expr } => {
                    let target = *target;
                    let loc = self.ws.field(target).offsets().to_vec();
                    let values = Evaluator::new(&self.ws, t, dt, &self.inv_spacing).evaluate_grid(expr, &loc)?;
                    self.ws.field_mut(target).store(t + 1, values);
                }
                Relation::Inject { source, targets } => {
                    let adds = self.injections(*source, targets, t, dt);
                    for (field, index, amount) in adds {
                        let ix: Vec<usize> = index.iter().map(|&i| i as usize).collect();
                        self.ws.field_mut(field).at_mut(t + 1)[ix.as_slice()] += amount;
                    }
                }
                Relation::Interpolate { receiver, expr } => {
                    let receiver = *receiver;
                    let ev = Evaluator::new(&self.ws, t, dt, &self.inv_spacing);
                    let rec = self.ws.sparse(receiver);
                    if t >= rec.nt() {
                        continue;
                    }
                    let values: Vec<f64> = rec
                        .coordinates
                        .rows()
                        .into_iter()
                        .map(|c| ev.evaluate_point(expr, &c.to_vec()))
                        .collect();
                    let mut row = self.ws.sparse_mut(receiver).data.row_mut(t);
                    for (out, v) in row.iter_mut().zip(values) {
                        *out = v;
                    }
                }
            }
        }
        self.latest = Some(t + 1);
        Ok(())
    }

    /// Grid contributions of every source point to every target at step `t`.
    fn injections(
        &self,
        source: SparseId,
        targets: &[Injection],
        t: usize,
        dt: f64,
    ) -> Vec<(crate::field::FieldId, Vec<isize>, f64)> {
        let ev = Evaluator::new(&self.ws, t, dt, &self.inv_spacing);
        let src = self.ws.sparse(source);
        let mut out = Vec::new();
        for (p, coords) in src.coordinates.rows().into_iter().enumerate() {
            let value = src.sample(t, p);
            if value == 0.0 {
                continue;
            }
            let coords = coords.to_vec();
            for target in targets {
                let offsets = self.ws.field(target.field).offsets();
                for (index, w) in point_weights(self.ws.grid(), offsets, &coords) {
                    let scale = ev.eval(&target.scale, &index, offsets);
                    out.push((target.field, index, value * w * scale));
                }
            }
        }
        out
    }
}

fn unbound(symbol: Symbol) -> PoroError {
    PoroError::UnboundSymbol {
        symbol: symbol.to_string(),
    }
}

/// Substitute `subs` and check that only `dt` is left free.
fn bind_expr(expr: &Expr, subs: &SpacingMap, dims: Dimensionality) -> Result<Expr> {
    for axis in expr.derivative_axes() {
        if dims.axis_index(axis).is_none() {
            return Err(PoroError::AxisUnavailable {
                axis,
                ndim: dims.ndim(),
            });
        }
        if !subs.contains_key(&Symbol::Spacing(axis)) {
            return Err(unbound(Symbol::Spacing(axis)));
        }
    }
    let bound = expr.substitute(subs);
    match bound.free_symbols().into_iter().find(|s| *s != Symbol::Dt) {
        Some(s) => Err(unbound(s)),
        None => Ok(bound),
    }
}

fn bind(rel: &Relation, subs: &SpacingMap, dims: Dimensionality) -> Result<Relation> {
    Ok(match rel {
        Relation::Update { target, expr } => Relation::Update {
            target: *target,
            expr: bind_expr(expr, subs, dims)?,
        },
        Relation::Inject { source, targets } => Relation::Inject {
            source: *source,
            targets: targets
                .iter()
                .map(|inj| {
                    Ok(Injection {
                        field: inj.field,
                        scale: bind_expr(&inj.scale, subs, dims)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        },
        Relation::Interpolate { receiver, expr } => Relation::Interpolate {
            receiver: *receiver,
            expr: bind_expr(expr, subs, dims)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, Grid};
    use crate::model::tests::sandstone;
    use crate::model::PoroelasticMaterial;
    use crate::field::FieldId;
    use crate::source::TimeAxis;
    use ndarray::{Array2, Dimension, IxDyn};

    fn setup(ndim: usize, nt: usize) -> (Model, PointSource, Receiver) {
        let grid = Grid::new(vec![12; ndim], vec![5.0; ndim], 4).unwrap();
        // permeable enough that the drag term stays well resolved at dt = 2e-4
        let material = PoroelasticMaterial { k: 1.0e-9, ..sandstone() };
        let model = Model::homogeneous(grid, &material).unwrap();
        let axis = TimeAxis::new(0.0, 2e-4, nt);
        let src = PointSource::ricker("shot", Array2::from_elem((1, ndim), 30.0), axis, 200.0, None, 1.0);
        let mut coords = Array2::from_elem((3, ndim), 30.0);
        for (i, mut row) in coords.rows_mut().into_iter().enumerate() {
            row[0] = 10.0 + 15.0 * i as f64;
        }
        let rec = Receiver::new("line", coords, axis);
        (model, src, rec)
    }

    #[test]
    fn one_dimensional_grid_is_unsupported() {
        let grid = Grid::new(vec![20], vec![5.0], 2).unwrap();
        let model = Model::homogeneous(grid, &sandstone()).unwrap();
        let axis = TimeAxis::new(0.0, 1e-3, 5);
        let src = PointSource::ricker("shot", Array2::from_elem((1, 1), 10.0), axis, 20.0, None, 1.0);
        let rec = src.like("rec");
        let err = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap_err();
        assert_eq!(err, PoroError::UnsupportedDimensionality { ndim: 1 });
    }

    #[test]
    fn invalid_space_order_is_rejected() {
        let (model, src, rec) = setup(2, 10);
        let options = OperatorOptions {
            space_order: 5,
            ..Default::default()
        };
        let err = forward_operator(&model, &src, &rec, &options).unwrap_err();
        assert_eq!(err, PoroError::UnsupportedSpaceOrder { order: 5 });
    }

    #[test]
    fn save_keeps_every_time_step() {
        for ndim in [2, 3] {
            let (model, src, rec) = setup(ndim, 17);
            let saved = forward_operator(
                &model,
                &src,
                &rec,
                &OperatorOptions {
                    save: true,
                    ..Default::default()
                },
            )
            .unwrap();
            assert!(saved.workspace().fields().iter().all(|f| f.depth() == 17));
            let rolling = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap();
            assert!(rolling.workspace().fields().iter().all(|f| f.depth() == 3));
        }
    }

    #[test]
    fn only_dt_stays_symbolic() {
        let (model, src, rec) = setup(2, 10);
        let op = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap();
        for rel in op.relations() {
            if let Relation::Update { expr, .. } = rel {
                let free: Vec<_> = expr.free_symbols().into_iter().collect();
                assert_eq!(free, vec![Symbol::Dt]);
            }
        }
    }

    #[test]
    fn missing_spacing_is_an_unbound_symbol() {
        let (model, src, rec) = setup(2, 10);
        let dims = Dimensionality::Two;
        let mut ws = Workspace::new(model.grid.clone(), dims).unwrap();
        let output = Kernel::select(dims)
            .assemble(&model, &mut ws, 4, TimeHistory::Rolling, &src, &rec)
            .unwrap();
        let mut subs = model.spacing_map().unwrap();
        subs.remove(&Symbol::Spacing(Axis::Z));
        let err = Operator::new("Forward", Kernel::Poroelastic2d, ws, output, &subs).unwrap_err();
        assert_eq!(
            err,
            PoroError::UnboundSymbol {
                symbol: "h_z".to_string()
            }
        );
    }

    #[test]
    fn derivative_along_a_missing_axis_is_rejected() {
        let dims = Dimensionality::Two;
        let subs: SpacingMap = [(Symbol::Spacing(Axis::Y), 1.0)].into_iter().collect();
        let f = crate::field::FieldId(0);
        let err = bind_expr(&f.now().dy(), &subs, dims).unwrap_err();
        assert_eq!(err, PoroError::AxisUnavailable { axis: Axis::Y, ndim: 2 });
    }

    #[test]
    fn time_range_beyond_saved_history_fails() {
        let (model, src, rec) = setup(2, 10);
        let options = OperatorOptions {
            save: true,
            ..Default::default()
        };
        let mut op = forward_operator(&model, &src, &rec, &options).unwrap();
        let err = op
            .apply(ApplyArgs {
                dt: 1e-4,
                time_m: 0,
                time_max: Some(9),
            })
            .unwrap_err();
        assert!(matches!(err, PoroError::TimeRange { time_max: 9, depth: 10, .. }));
        assert!(op.apply(ApplyArgs::new(1e-4)).is_ok());
        assert_eq!(op.latest_step(), Some(9));
    }

    #[test]
    fn non_positive_dt_is_rejected() {
        let (model, src, rec) = setup(2, 10);
        let mut op = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap();
        assert!(matches!(
            op.apply(ApplyArgs::new(0.0)),
            Err(PoroError::InvalidTimeStep { .. })
        ));
        assert!(op.apply(ApplyArgs::new(f64::NAN)).is_err());
    }

    #[test]
    fn short_run_stays_finite_and_records() {
        for ndim in [2, 3] {
            let (model, src, rec) = setup(ndim, 40);
            let dt = model.critical_dt(0.4).min(model.drag_limited_dt()).min(2e-4);
            let mut op = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap();
            let summary = op.apply(ApplyArgs::new(dt)).unwrap();
            assert_eq!(summary.steps, 39);

            let txx = op.snapshot("txx", 39).unwrap();
            assert_eq!(txx.shape(), vec![12; ndim].as_slice());
            assert!(txx.iter().all(|v| v.is_finite()));
            assert!(txx.iter().any(|v| *v != 0.0));

            let rec1 = op.receiver_data("rec1").unwrap();
            assert_eq!(rec1.dim(), (40, 3));
            assert!(rec1.iter().all(|v| v.is_finite()));
            assert!(rec1.iter().any(|v| *v != 0.0));
            assert!(op.receiver_data("rec2").is_ok());
            assert!(op.receiver_data("rec3").is_err());

            // rolling history only holds the last three levels
            assert!(op.snapshot("txx", 10).is_err());

            let vmag = op.velocity_magnitude(39).unwrap();
            assert_eq!(vmag.shape(), txx.shape());
            assert!(vmag.iter().all(|v| *v >= 0.0 && v.is_finite()));
        }
    }

    /// Affine profile `c + g . x` over physical position.
    #[derive(Debug, Clone)]
    struct Plane {
        c: f64,
        g: Vec<f64>,
    }

    impl Plane {
        fn new(c: f64, g: &[f64]) -> Self {
            Self { c, g: g.to_vec() }
        }

        fn at(&self, x: &[f64]) -> f64 {
            self.c + self.g.iter().zip(x).map(|(g, x)| g * x).sum::<f64>()
        }

        /// `self + s * other + shift`
        fn combine(&self, s: f64, other: &Plane, shift: f64) -> Plane {
            Plane {
                c: self.c + s * other.c + shift,
                g: self.g.iter().zip(&other.g).map(|(a, b)| a + s * b).collect(),
            }
        }
    }

    fn position(op: &Operator, id: FieldId, index: &[usize]) -> Vec<f64> {
        let offsets = op.ws.field(id).offsets();
        let h = op.ws.grid().spacing();
        index
            .iter()
            .enumerate()
            .map(|(d, &i)| (i as f64 + if offsets[d] { 0.5 } else { 0.0 }) * h[d])
            .collect()
    }

    fn seed(op: &mut Operator, id: FieldId, plane: &Plane) {
        let offsets = op.ws.field(id).offsets().to_vec();
        let h = op.ws.grid().spacing().to_vec();
        for (ix, v) in op.ws.field_mut(id).at_mut(0).indexed_iter_mut() {
            let x: Vec<f64> = ix
                .slice()
                .iter()
                .enumerate()
                .map(|(d, &i)| (i as f64 + if offsets[d] { 0.5 } else { 0.0 }) * h[d])
                .collect();
            *v = plane.at(&x);
        }
    }

    fn param(op: &Operator, name: &str, cell: &[usize]) -> f64 {
        op.ws
            .params()
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data[IxDyn(cell)])
            .unwrap()
    }

    fn value(op: &Operator, id: FieldId, t: usize, cell: &[usize]) -> f64 {
        op.ws.field(id).at(t)[IxDyn(cell)]
    }

    fn assert_close(got: f64, want: f64, what: &str) {
        let tol = 1e-9 * want.abs().max(1.0);
        assert!((got - want).abs() <= tol, "{what}: got {got}, expected {want}");
    }

    fn silent_operator(ndim: usize) -> Operator {
        let (model, mut src, rec) = setup(ndim, 10);
        src.data.fill(0.0);
        forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap()
    }

    #[test]
    fn planar_step_matches_the_coupled_update_equations() {
        let mut op = silent_operator(2);
        let w = *op.wavefield();
        let (vx, vz) = (w.velocity.x(), w.velocity.z());
        let (qx, qz) = (w.relative_velocity.x(), w.relative_velocity.z());
        let (txx, tzz, txz) = (w.stress.xx(), w.stress.zz(), w.stress.xz());
        let p = w.pressure;

        let pvx = Plane::new(0.3, &[0.02, -0.01]);
        let pvz = Plane::new(-0.1, &[0.015, 0.03]);
        let pqx = Plane::new(0.05, &[-0.01, 0.004]);
        let pqz = Plane::new(0.02, &[0.006, -0.012]);
        let pxx = Plane::new(1.0e3, &[40.0, -25.0]);
        let pzz = Plane::new(-2.0e3, &[-15.0, 35.0]);
        let pxz = Plane::new(500.0, &[10.0, 20.0]);
        let pp = Plane::new(3.0e3, &[-30.0, 12.0]);
        for (id, plane) in [
            (vx, &pvx),
            (vz, &pvz),
            (qx, &pqx),
            (qz, &pqz),
            (txx, &pxx),
            (tzz, &pzz),
            (txz, &pxz),
            (p, &pp),
        ] {
            seed(&mut op, id, plane);
        }

        let dt = 1e-4;
        op.step(0, dt).unwrap();

        // padded grid is 20 wide; the centre stencil stays clear of the absorbing layer
        let cell = [10, 10];
        let k = |name: &str| param(&op, name, &cell);
        let (a, b, c, d, e, f) = (k("A"), k("B"), k("C"), k("D"), k("E"), k("F"));
        let (l_u, g, alpha_m, m, damp) = (k("l_u"), k("G"), k("alpha_M"), k("M"), k("damp"));
        assert_eq!(damp, 1.0);

        let div_x = pxx.g[0] + pxz.g[1];
        let div_z = pxz.g[0] + pzz.g[1];
        // advanced velocities stay affine; stresses and pressure see their slopes
        let vx1 = pvx.combine(b * dt, &pqx, dt * (a * div_x + c * pp.g[0]));
        let vz1 = pvz.combine(b * dt, &pqz, dt * (a * div_z + c * pp.g[1]));
        let qx1 = pqx.combine(e * dt, &pqx, dt * (d * div_x + f * pp.g[0]));
        let qz1 = pqz.combine(e * dt, &pqz, dt * (d * div_z + f * pp.g[1]));
        let div_v = vx1.g[0] + vz1.g[1];
        let div_q = qx1.g[0] + qz1.g[1];

        let x = position(&op, vx, &cell);
        let want = damp * (pvx.at(&x) + dt * (a * div_x + c * pp.g[0]) + b * dt * pqx.at(&x));
        assert_close(value(&op, vx, 1, &cell), want, "vx");

        let x = position(&op, qx, &cell);
        let want = damp * (pqx.at(&x) + dt * (d * div_x + f * pp.g[0]) + e * dt * pqx.at(&x));
        assert_close(value(&op, qx, 1, &cell), want, "qx");

        let x = position(&op, txx, &cell);
        let want = damp * (pxx.at(&x) + dt * ((l_u + 2.0 * g) * vx1.g[0] + l_u * vz1.g[1] + alpha_m * div_q));
        assert_close(value(&op, txx, 1, &cell), want, "txx");

        let x = position(&op, txz, &cell);
        let want = damp * (pxz.at(&x) + dt * g * (vx1.g[1] + vz1.g[0]));
        assert_close(value(&op, txz, 1, &cell), want, "txz");

        let x = position(&op, p, &cell);
        let want = damp * (pp.at(&x) - dt * (alpha_m * div_v + m * div_q));
        assert_close(value(&op, p, 1, &cell), want, "p");
    }

    #[test]
    fn volumetric_step_matches_the_single_phase_update_equations() {
        let mut op = silent_operator(3);
        let w = *op.wavefield();
        let (vx, vz) = (w.velocity.x(), w.velocity.z());
        let vy = w.velocity.y().unwrap();
        let (txx, tzz, txz) = (w.stress.xx(), w.stress.zz(), w.stress.xz());
        let (tyy, txy, tyz) = (w.stress.yy().unwrap(), w.stress.xy().unwrap(), w.stress.yz().unwrap());

        let pvx = Plane::new(0.3, &[0.02, -0.01, 0.005]);
        let pvy = Plane::new(0.1, &[-0.004, 0.012, 0.007]);
        let pvz = Plane::new(-0.2, &[0.009, 0.003, -0.015]);
        let pxx = Plane::new(1.0e3, &[40.0, -25.0, 10.0]);
        let pyy = Plane::new(-500.0, &[5.0, 30.0, -12.0]);
        let pzz = Plane::new(-2.0e3, &[-15.0, 8.0, 35.0]);
        let pxz = Plane::new(200.0, &[10.0, -6.0, 20.0]);
        let pxy = Plane::new(-300.0, &[-18.0, 22.0, 4.0]);
        let pyz = Plane::new(150.0, &[7.0, -9.0, 16.0]);
        for (id, plane) in [
            (vx, &pvx),
            (vy, &pvy),
            (vz, &pvz),
            (txx, &pxx),
            (tyy, &pyy),
            (tzz, &pzz),
            (txz, &pxz),
            (txy, &pxy),
            (tyz, &pyz),
        ] {
            seed(&mut op, id, plane);
        }
        // seeded but outside the volumetric system
        let idle: Vec<FieldId> = w
            .relative_velocity
            .components()
            .into_iter()
            .chain([w.pressure])
            .collect();
        let busy = Plane::new(1.0, &[0.5, -0.5, 0.25]);
        for &id in &idle {
            seed(&mut op, id, &busy);
        }

        let dt = 1e-4;
        op.step(0, dt).unwrap();

        let cell = [10, 10, 10];
        let k = |name: &str| param(&op, name, &cell);
        let (rho_b, mu, lambda, damp) = (k("rho_b"), k("mu"), k("lambda"), k("damp"));
        assert_eq!(damp, 1.0);

        // stress terms are uniform, so advanced velocities keep their slopes
        let x = position(&op, vx, &cell);
        let want = damp * pvx.at(&x) - damp * dt / rho_b * (pxx.g[0] + pxy.g[1] + pxz.g[2]);
        assert_close(value(&op, vx, 1, &cell), want, "vx");

        let x = position(&op, txx, &cell);
        let want = damp * pxx.at(&x)
            - damp * (lambda + 2.0 * mu) * dt * pvx.g[0]
            - damp * lambda * dt * (pvy.g[1] + pvz.g[2]);
        assert_close(value(&op, txx, 1, &cell), want, "txx");

        let x = position(&op, txy, &cell);
        let want = damp * pxy.at(&x) - damp * mu * dt * (pvy.g[0] + pvx.g[1]);
        assert_close(value(&op, txy, 1, &cell), want, "txy");

        for &id in &idle {
            let name = op.ws.field(id).name().to_string();
            assert!(op.ws.field(id).at(1).iter().all(|v| *v == 0.0), "{name} was advanced");
        }
    }

    #[test]
    fn reset_clears_fields_and_traces() {
        let (model, src, rec) = setup(2, 20);
        let mut op = forward_operator(&model, &src, &rec, &OperatorOptions::default()).unwrap();
        op.apply(ApplyArgs::new(1e-4)).unwrap();
        op.reset();
        assert!(op.latest_step().is_none());
        assert!(op.receiver_data("rec1").unwrap().iter().all(|v| *v == 0.0));
        assert!(op
            .workspace()
            .fields()
            .iter()
            .all(|f| f.buffers().iter().all(|b| b.iter().all(|v| *v == 0.0))));
        let src_data = op.receiver_data("src").unwrap();
        assert!(src_data.iter().any(|v| *v != 0.0));
    }
}
