//! Command line interface for the geodesic driver

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{DriverConfig, MetricConfig};

/// Geodesic - particle trajectories in a user-defined static spacetime
#[derive(Parser, Debug)]
#[command(name = "geodesic", version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Metric component g_tt in t, r, phi (overrides config file)
    #[arg(long, value_name = "EXPR", allow_hyphen_values = true)]
    pub g_tt: Option<String>,

    /// Metric component g_rr (overrides config file)
    #[arg(long, value_name = "EXPR", allow_hyphen_values = true)]
    pub g_rr: Option<String>,

    /// Metric component g_phiphi (overrides config file)
    #[arg(long, value_name = "EXPR", allow_hyphen_values = true)]
    pub g_phiphi: Option<String>,

    /// Initial velocity along y (overrides config file)
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub v_y: Option<f64>,

    /// Number of ticks before the run is stopped
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub frames: Option<u64>,

    /// Fixed time step
    #[arg(long, value_name = "VALUE")]
    pub dt: Option<f64>,

    /// Print the trajectory as x,y lines after the run
    #[arg(short, long)]
    pub trajectory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    fn overrides_metric(&self) -> bool {
        self.g_tt.is_some() || self.g_rr.is_some() || self.g_phiphi.is_some()
    }
}

/// Loads configuration from file or defaults, then applies command-line overrides
pub fn load_and_apply_config(args: &Args) -> Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {}", path.display());
            DriverConfig::load(path)?
        }
        None => DriverConfig::default(),
    };

    if args.overrides_metric() {
        let mut metric = config.metric.into_symbolic();
        if let Some(expr) = &args.g_tt {
            metric.g_tt = expr.clone();
        }
        if let Some(expr) = &args.g_rr {
            metric.g_rr = expr.clone();
        }
        if let Some(expr) = &args.g_phiphi {
            metric.g_phiphi = expr.clone();
        }
        log::info!(
            "Overriding metric to diag({}, {}, {})",
            metric.g_tt,
            metric.g_rr,
            metric.g_phiphi
        );
        config.metric = MetricConfig::Symbolic(metric);
    }

    if let Some(v_y) = args.v_y {
        log::info!("Overriding initial v_y to: {v_y}");
        config.initial.v_y = v_y;
    }

    if let Some(frames) = args.frames {
        log::info!("Overriding frame budget to: {frames}");
        config.integration.frames = frames;
    }

    if let Some(dt) = args.dt {
        log::info!("Overriding time step to: {dt}");
        config.integration.dt = dt;
    }

    config.validate()?;
    Ok(config)
}
