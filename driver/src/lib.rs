//! Headless driver for the geodesic simulation.
//!
//! Builds the engine once from configuration, then issues one step per tick
//! until the particle halts or the frame budget is spent.

pub mod cli;
pub mod config;
mod profiler;

use std::io::Write;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use cgmath::Point2;
use simulation::schwarzschild::Schwarzschild;
use simulation::{
    AccelerationModel, CoordinateSystem, GeodesicModel, HaltReason, Horizon, MetricTensor,
    Simulation, StateVector, StepOutcome,
};

pub use cli::Args;
pub use config::DriverConfig;
use config::MetricConfig;
use profiler::Profiler;

/// Result of one run.
#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: StepOutcome,
    pub steps: u64,
    pub horizon: Horizon,
    pub final_state: StateVector,
    pub history: Vec<Point2<f64>>,
}

/// Sets up the acceleration model for the configured metric and finds its
/// horizon.
pub fn build_model(config: &DriverConfig) -> Result<(Box<dyn AccelerationModel>, Horizon)> {
    match &config.metric {
        MetricConfig::Symbolic(metric) => {
            log::info!(
                "Metric diag({}, {}, {}) with parameters {:?}",
                metric.g_tt,
                metric.g_rr,
                metric.g_phiphi,
                metric.parameters
            );
            let tensor = MetricTensor::parse_diagonal(
                CoordinateSystem::polar(),
                metric.components(),
                &metric.parameters,
            )
            .context("Invalid metric")?;
            let (model, horizon) = simulation::setup(tensor, &config.horizon.detector())
                .context("Failed to derive the connection")?;
            let model: Box<dyn AccelerationModel> = Box::new(model);
            Ok((model, horizon))
        }
        MetricConfig::Schwarzschild { mass } => {
            ensure!(*mass > 0.0, "mass must be positive, got {mass}");
            log::info!("Closed-form Schwarzschild metric, M = {mass}");
            let spacetime = Schwarzschild::new(*mass);
            let model: Box<dyn AccelerationModel> = Box::new(GeodesicModel::new(spacetime));
            Ok((model, spacetime.horizon()))
        }
    }
}

/// Runs the configured scenario to completion.
pub fn simulate(config: &DriverConfig) -> Result<Report> {
    let mut profiler = Profiler::new();

    profiler.begin_setup();
    let (model, horizon) = build_model(config)?;
    profiler.end_setup();

    let integration = &config.integration;
    let mut sim = Simulation::new(model, config.initial.state(), horizon, integration.step_config());
    let tick = Duration::from_millis(integration.tick_interval_ms);

    for _ in 0..integration.frames {
        profiler.begin_step();
        let outcome = sim.step();
        profiler.end_step();
        if outcome.is_halted() {
            break;
        }
        if !tick.is_zero() {
            std::thread::sleep(tick);
        }
    }
    // Out of frames, unless already halted.
    let outcome = sim.stop();
    profiler.log_summary();

    Ok(Report {
        outcome,
        steps: sim.steps(),
        horizon,
        final_state: *sim.state(),
        history: sim.history().to_vec(),
    })
}

pub fn write_trajectory(history: &[Point2<f64>], out: &mut impl Write) -> std::io::Result<()> {
    for point in history {
        writeln!(out, "{},{}", point.x, point.y)?;
    }
    Ok(())
}

fn describe(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::Running => "still running".to_string(),
        StepOutcome::Halted(HaltReason::HorizonCrossed { radius }) => {
            format!("particle hit the barrier (r < {radius:.2})")
        }
        StepOutcome::Halted(HaltReason::ExternalStop) => "frame budget exhausted".to_string(),
        StepOutcome::Halted(HaltReason::Unphysical(err)) => format!("unphysical state: {err}"),
    }
}

pub fn run(args: Args) -> Result<()> {
    let config = cli::load_and_apply_config(&args)?;
    let report = simulate(&config)?;

    match report.horizon.radius() {
        Some(radius) => println!("Horizon: r = {radius:.4}"),
        None => println!("Horizon: none"),
    }
    let end = report.final_state.position;
    println!(
        "{} steps, {}; final position ({:.4}, {:.4}), r = {:.4}",
        report.steps,
        describe(report.outcome),
        end.x,
        end.y,
        report.final_state.radius()
    );

    if args.trajectory {
        let stdout = std::io::stdout();
        write_trajectory(&report.history, &mut stdout.lock()).context("Failed to write trajectory")?;
    }
    Ok(())
}
