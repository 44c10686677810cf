use crate::grid::Grid;
use crate::model::{Model, PoroelasticMaterial};
use crate::operator::OperatorOptions;
use crate::source::{ricker_wavelet, PointSource, Receiver, SparseTimeSeries, TimeAxis};
use anyhow::{anyhow, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub shape: Vec<usize>,
    pub spacing: Vec<f64>, // metres per cell along each axis
    #[serde(default = "default_nbl")]
    pub nbl: usize,
}

fn default_nbl() -> usize {
    40
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.shape.len() != self.spacing.len() {
            return Err(anyhow!(
                "grid shape {:?} and spacing {:?} have different lengths",
                self.shape,
                self.spacing
            ));
        }
        if self.shape.iter().any(|&n| n == 0) {
            return Err(anyhow!("Grid dimensions must be positive ({:?})", self.shape));
        }
        if self.spacing.iter().any(|&h| h <= 0.0) {
            return Err(anyhow!("Grid spacing must be positive ({:?})", self.spacing));
        }
        Ok(())
    }

    pub fn extent(&self) -> Vec<f64> {
        self.shape
            .iter()
            .zip(&self.spacing)
            .map(|(&n, &h)| (n.saturating_sub(1)) as f64 * h)
            .collect()
    }
}

fn validate_material(m: &PoroelasticMaterial) -> Result<()> {
    let positive = [
        ("vp", m.vp),
        ("vs", m.vs),
        ("rho_s", m.rho_s),
        ("rho_f", m.rho_f),
        ("k", m.k),
        ("mu_f", m.mu_f),
        ("k_dr", m.k_dr),
        ("k_s", m.k_s),
        ("k_f", m.k_f),
        ("g", m.g),
        ("tortuosity", m.tortuosity),
    ];
    for (name, value) in positive {
        if !(value > 0.0) {
            return Err(anyhow!("material {} must be positive, got {}", name, value));
        }
    }
    if !(m.phi > 0.0 && m.phi < 1.0) {
        return Err(anyhow!("porosity must be in (0, 1), got {}", m.phi));
    }
    if m.vs > m.vp {
        return Err(anyhow!(
            "S-wave velocity must be less than P-wave velocity (vs={} > vp={})",
            m.vs,
            m.vp
        ));
    }
    if m.vp < m.vs * std::f64::consts::SQRT_2 {
        log::warn!(
            "vp {} is below vs * sqrt(2); the volumetric Lame parameter is negative",
            m.vp
        );
    }
    if m.k_dr > m.k_s {
        log::warn!(
            "drained bulk modulus {} exceeds the grain modulus {}; Biot coefficient is negative",
            m.k_dr,
            m.k_s
        );
    }
    Ok(())
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>, // Optional: derived from the model when absent
    pub total_time: f64,
    #[serde(default = "default_space_order")]
    pub space_order: usize,
    #[serde(default)]
    pub save: bool,
    #[serde(default = "default_cfl_safety")]
    pub cfl_safety: f64,
}

fn default_space_order() -> usize {
    4
}

fn default_cfl_safety() -> f64 {
    0.5
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        if self.total_time <= 0.0 {
            return Err(anyhow!("total_time must be positive, got {}", self.total_time));
        }
        if let Some(dt) = self.dt {
            if dt <= 0.0 || !dt.is_finite() {
                return Err(anyhow!("dt must be positive, got {}", dt));
            }
        }
        if self.cfl_safety <= 0.0 || self.cfl_safety > 1.0 {
            return Err(anyhow!("cfl_safety must be in (0, 1], got {}", self.cfl_safety));
        }
        if ![2, 4, 6, 8].contains(&self.space_order) {
            return Err(anyhow!(
                "space_order must be one of 2, 4, 6, 8, got {}",
                self.space_order
            ));
        }
        Ok(())
    }

    /// The configured `dt`, or the largest step both the CFL condition and
    /// (on planar grids) the fluid drag allow.
    pub fn resolve_dt(&self, model: &Model) -> f64 {
        let cfl_dt = model.critical_dt(self.cfl_safety);
        match self.dt {
            Some(dt) => {
                if dt > cfl_dt {
                    log::warn!("dt = {:e} s exceeds the CFL limit of {:e} s", dt, cfl_dt);
                }
                dt
            }
            None if model.grid.ndim() == 2 => cfl_dt.min(model.drag_limited_dt()),
            None => cfl_dt,
        }
    }

    pub fn time_axis(&self, dt: f64) -> TimeAxis {
        TimeAxis::from_stop(0.0, self.total_time, dt)
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub position: Vec<f64>, // metres from the physical origin
    pub frequency: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>, // Default: 1.2 / frequency
}

fn default_amplitude() -> f64 {
    1.0
}

impl SourceConfig {
    fn validate(&self, grid: &GridConfig) -> Result<()> {
        check_position("Source", &self.position, grid)?;
        if self.frequency <= 0.0 {
            return Err(anyhow!("Source frequency must be positive, got {}", self.frequency));
        }
        if let Some(delay) = self.delay {
            if delay < 0.0 {
                return Err(anyhow!("Source delay must be non-negative, got {}", delay));
            }
        }
        Ok(())
    }
}

fn check_position(what: &str, position: &[f64], grid: &GridConfig) -> Result<()> {
    let extent = grid.extent();
    if position.len() != extent.len() {
        return Err(anyhow!(
            "{} position {:?} does not match the {}-dimensional grid",
            what,
            position,
            extent.len()
        ));
    }
    if position.iter().zip(&extent).any(|(&p, &e)| p < 0.0 || p > e) {
        return Err(anyhow!(
            "{} position {:?} is outside the domain {:?}",
            what,
            position,
            extent
        ));
    }
    Ok(())
}

/// Receivers spaced evenly along a straight line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
    pub count: usize,
}

impl ReceiverConfig {
    fn validate(&self, grid: &GridConfig) -> Result<()> {
        check_position("Receiver line start", &self.start, grid)?;
        check_position("Receiver line end", &self.end, grid)?;
        if self.count == 0 {
            return Err(anyhow!("At least one receiver must be defined"));
        }
        Ok(())
    }

    pub fn coordinates(&self) -> Array2<f64> {
        let ndim = self.start.len();
        Array2::from_shape_fn((self.count, ndim), |(i, d)| {
            let frac = if self.count > 1 {
                i as f64 / (self.count - 1) as f64
            } else {
                0.0
            };
            self.start[d] + frac * (self.end[d] - self.start[d])
        })
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_field")]
    pub field: String,
    /// Steps between snapshots; only the final state is written when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_interval: Option<usize>,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

fn default_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_field() -> String {
    "tzz".to_string()
}

fn default_image_width() -> u32 {
    1200
}

fn default_image_height() -> u32 {
    1000
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            field: default_field(),
            snapshot_interval: None,
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }
}

impl OutputConfig {
    fn validate(&self, ndim: usize) -> Result<()> {
        let valid_fields: &[&str] = if ndim == 3 {
            &["vx", "vy", "vz", "vmag", "txx", "tyy", "tzz", "txy", "txz", "tyz"]
        } else {
            &["vx", "vz", "vmag", "qx", "qz", "txx", "tzz", "txz", "p"]
        };
        if !valid_fields.contains(&self.field.as_str()) {
            return Err(anyhow!(
                "Invalid field '{}'. Must be one of: {:?}",
                self.field,
                valid_fields
            ));
        }
        if self.snapshot_interval == Some(0) {
            return Err(anyhow!("snapshot_interval must be positive"));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        Ok(())
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub material: PoroelasticMaterial,
    pub simulation: SimulationConfig,
    pub sources: Vec<SourceConfig>,
    pub receivers: ReceiverConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        validate_material(&self.material)?;
        self.simulation.validate()?;
        self.output.validate(self.grid.shape.len())?;

        if self.sources.is_empty() {
            return Err(anyhow!("At least one source must be defined"));
        }
        for source in &self.sources {
            source.validate(&self.grid)?;
        }
        self.receivers.validate(&self.grid)?;

        if let Some(dt) = self.simulation.dt {
            if dt < 1e-7 {
                log::warn!("dt is very small ({}), simulation may be slow", dt);
            }
        }
        Ok(())
    }

    pub fn build_grid(&self) -> Result<Grid> {
        Ok(Grid::new(
            self.grid.shape.clone(),
            self.grid.spacing.clone(),
            self.grid.nbl,
        )?)
    }

    pub fn build_model(&self) -> Result<Model> {
        Ok(Model::homogeneous(self.build_grid()?, &self.material)?)
    }

    /// Every configured source as one point of a single series, each
    /// carrying its own wavelet.
    pub fn build_source(&self, time_axis: TimeAxis) -> PointSource {
        let ndim = self.grid.shape.len();
        let coords = Array2::from_shape_fn((self.sources.len(), ndim), |(i, d)| {
            self.sources[i].position[d]
        });
        let mut src = SparseTimeSeries::new("src", coords, time_axis);
        let times = time_axis.time_values();
        for (p, cfg) in self.sources.iter().enumerate() {
            let t0 = cfg.delay.unwrap_or(1.2 / cfg.frequency);
            for (out, &t) in src.data.column_mut(p).iter_mut().zip(times.iter()) {
                *out = cfg.amplitude * ricker_wavelet(t, cfg.frequency, t0);
            }
        }
        src
    }

    pub fn build_receivers(&self, time_axis: TimeAxis) -> Receiver {
        Receiver::new("rec", self.receivers.coordinates(), time_axis)
    }

    pub fn operator_options(&self) -> OperatorOptions {
        OperatorOptions {
            space_order: self.simulation.space_order,
            save: self.simulation.save,
            ..Default::default()
        }
    }

    /// Log configuration summary
    pub fn log_summary(&self, dt: f64) {
        log::info!(
            "grid {:?} cells at {:?} m, {} absorbing cells per side",
            self.grid.shape,
            self.grid.spacing,
            self.grid.nbl
        );
        log::info!(
            "material: vp={} m/s, vs={} m/s, phi={}, k={} m^2",
            self.material.vp,
            self.material.vs,
            self.material.phi,
            self.material.k
        );
        log::info!(
            "dt={:e} s, nt={}, total_time={} s, space order {}",
            dt,
            self.simulation.time_axis(dt).num,
            self.simulation.total_time,
            self.simulation.space_order
        );
        for (i, src) in self.sources.iter().enumerate() {
            log::info!(
                "source {}: {:?} m, {} Hz, amplitude {}",
                i,
                src.position,
                src.frequency,
                src.amplitude
            );
        }
        log::info!(
            "{} receivers from {:?} to {:?}",
            self.receivers.count,
            self.receivers.start,
            self.receivers.end
        );
    }
}
