use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use poroelastic_modeller::config::Config;
use poroelastic_modeller::visualisation::WavefieldVisualiser;
use poroelastic_modeller::{forward_operator, ApplyArgs, Operator};
use std::path::PathBuf;

/// Poroelastic wave modelling on a staggered grid
#[derive(Parser)]
#[command(name = "poroelastic-modeller")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staggered-grid poroelastic wave modeller", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a forward model and write snapshots and shot gathers
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Check a configuration file without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::Run { config } => run(Config::from_file(&config)?),
        Commands::Validate { config } => {
            let config = Config::from_file(&config)?;
            let model = config.build_model()?;
            let dt = config.simulation.resolve_dt(&model);
            config.log_summary(dt);
            info!("configuration is valid");
            Ok(())
        }
    }
}

fn run(config: Config) -> Result<()> {
    let model = config.build_model()?;
    let dt = config.simulation.resolve_dt(&model);
    config.log_summary(dt);

    let time_axis = config.simulation.time_axis(dt);
    let source = config.build_source(time_axis);
    let receivers = config.build_receivers(time_axis);
    let mut op = forward_operator(&model, &source, &receivers, &config.operator_options())
        .context("failed to build the forward operator")?;

    let visualiser = WavefieldVisualiser::new(
        &config.output.dir,
        config.output.image_width,
        config.output.image_height,
    )?;

    let last = time_axis.num.saturating_sub(2);
    let interval = config.output.snapshot_interval.unwrap_or(last + 1);
    let mut time_m = 0;
    while time_m <= last {
        let time_max = (time_m + interval - 1).min(last);
        op.apply(ApplyArgs {
            dt,
            time_m,
            time_max: Some(time_max),
        })?;
        save_snapshot(&op, &visualiser, &config.output.field, time_max + 1, dt)?;
        time_m = time_max + 1;
    }

    for name in ["rec1", "rec2"] {
        visualiser.plot_gather(op.receiver_data(name)?, name)?;
    }
    info!("output written to {}", config.output.dir.display());
    Ok(())
}

fn save_snapshot(op: &Operator, visualiser: &WavefieldVisualiser, field: &str, step: usize, dt: f64) -> Result<()> {
    let data = match field {
        "vmag" => op.velocity_magnitude(step)?,
        name => op.snapshot(name, step)?,
    };
    visualiser.plot_field(&data, step, field, step as f64 * dt)?;
    Ok(())
}
