use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// Uniform sampling of the modelled time interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    pub start: f64, // s
    pub step: f64,  // s
    pub num: usize,
}

impl TimeAxis {
    pub fn new(start: f64, step: f64, num: usize) -> Self {
        Self { start, step, num }
    }

    /// Samples from `start` to `stop` inclusive, stop rounded to the step.
    pub fn from_stop(start: f64, stop: f64, step: f64) -> Self {
        let num = ((stop - start) / step).round() as usize + 1;
        Self { start, step, num }
    }

    pub fn stop(&self) -> f64 {
        self.start + self.num.saturating_sub(1) as f64 * self.step
    }

    pub fn time_values(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.num, |i| self.start + i as f64 * self.step)
    }
}

/// Ricker wavelet with peak frequency `f0` centred on `t0`.
pub fn ricker_wavelet(t: f64, f0: f64, t0: f64) -> f64 {
    let tau = t - t0;
    let arg = (PI * f0 * tau).powi(2);
    (1.0 - 2.0 * arg) * (-arg).exp()
}

/// Off-grid points with one time series each.
///
/// Coordinates are in metres from the origin of the physical domain, one row
/// per point. Data is laid out `(nt, npoint)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTimeSeries {
    pub name: String,
    pub coordinates: Array2<f64>,
    pub time_axis: TimeAxis,
    pub data: Array2<f64>,
}

/// Point set injected into the wavefield.
pub type PointSource = SparseTimeSeries;

/// Point set sampling the wavefield.
pub type Receiver = SparseTimeSeries;

impl SparseTimeSeries {
    /// Zero-valued series.
    pub fn new(name: &str, coordinates: Array2<f64>, time_axis: TimeAxis) -> Self {
        let npoint = coordinates.nrows();
        Self {
            name: name.to_string(),
            coordinates,
            time_axis,
            data: Array2::zeros((time_axis.num, npoint)),
        }
    }

    /// Every point fires the same Ricker wavelet. `t0` defaults to `1.2 / f0`
    /// so the wavelet starts near zero.
    pub fn ricker(
        name: &str,
        coordinates: Array2<f64>,
        time_axis: TimeAxis,
        f0: f64,
        t0: Option<f64>,
        amplitude: f64,
    ) -> Self {
        let t0 = t0.unwrap_or(1.2 / f0);
        let mut series = Self::new(name, coordinates, time_axis);
        for (i, t) in time_axis.time_values().iter().enumerate() {
            let value = amplitude * ricker_wavelet(*t, f0, t0);
            series.data.row_mut(i).fill(value);
        }
        series
    }

    /// Same geometry and sampling, zeroed data, new name.
    pub fn like(&self, name: &str) -> Self {
        Self::new(name, self.coordinates.clone(), self.time_axis)
    }

    pub fn npoint(&self) -> usize {
        self.coordinates.nrows()
    }

    pub fn nt(&self) -> usize {
        self.time_axis.num
    }

    /// Value of point `p` at time step `t`, zero past the end of the series.
    pub fn sample(&self, t: usize, p: usize) -> f64 {
        if t < self.data.nrows() {
            self.data[[t, p]]
        } else {
            0.0
        }
    }
}
