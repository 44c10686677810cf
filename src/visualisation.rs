use anyhow::{anyhow, Context, Result};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// 2D view of a snapshot: planar fields as-is, volumetric fields cut along
/// the middle of the y axis.
pub fn section(data: &ArrayD<f64>) -> Result<Array2<f64>> {
    match data.ndim() {
        2 => Ok(data.view().into_dimensionality::<Ix2>()?.to_owned()),
        3 => {
            let mid = data.len_of(Axis(1)) / 2;
            Ok(data
                .index_axis(Axis(1), mid)
                .into_dimensionality::<Ix2>()?
                .to_owned())
        }
        n => Err(anyhow!("cannot plot a {}-dimensional field", n)),
    }
}

fn plot_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("plotting failed: {}", e)
}

pub struct WavefieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    gradient: Box<dyn colorgrad::Gradient>,
}

impl WavefieldVisualiser {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            gradient: Box::new(colorgrad::preset::rd_yl_bu()),
        })
    }

    /// Render a snapshot with a symmetric colour scale.
    pub fn plot_field(&self, data: &ArrayD<f64>, timestep: usize, field_name: &str, time: f64) -> Result<PathBuf> {
        let plane = section(data)?;
        let filename = self
            .output_dir
            .join(format!("{}_{:06}.png", field_name, timestep));
        let title = format!("{} at t={:.4}s (step {})", field_name, time, timestep);
        self.draw(&plane, &filename, &title, ("X (grid points)", "Z (grid points)"))?;
        log::debug!("saved frame {}", filename.display());
        Ok(filename)
    }

    /// Receiver traces as an image, receiver index across and time up.
    pub fn plot_gather(&self, data: &Array2<f64>, name: &str) -> Result<PathBuf> {
        let filename = self.output_dir.join(format!("{}_gather.png", name));
        // data is (nt, npoint); draw receivers along x
        let plane = data.t().to_owned();
        self.draw(&plane, &filename, name, ("receiver", "time step"))?;
        log::debug!("saved gather {}", filename.display());
        Ok(filename)
    }

    fn draw(&self, data: &Array2<f64>, filename: &Path, title: &str, labels: (&str, &str)) -> Result<()> {
        let root = BitMapBackend::new(filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let (nx, nz) = data.dim();
        let max_abs = data
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| v.abs())
            .fold(0.0_f64, f64::max);

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0..nx, 0..nz)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .x_desc(labels.0)
            .y_desc(labels.1)
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(data.indexed_iter().map(|((i, k), &value)| {
                let color = self.value_to_color(value, -max_abs, max_abs);
                Rectangle::new([(i, k), (i + 1, k + 1)], color.filled())
            }))
            .map_err(plot_err)?;

        root.present().map_err(plot_err)?;
        Ok(())
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val && value.is_finite() {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}
