//! Fixed-step time evolution with horizon-crossing halt.

use cgmath::Point2;

use crate::error::UnphysicalState;
use crate::geodesic::{AccelerationModel, StateVector};
use crate::horizon::Horizon;
use crate::integrator::semi_implicit_euler;

pub const DEFAULT_TIME_STEP: f64 = 0.05;
/// Distance outside the horizon at which a particle counts as captured.
pub const DEFAULT_HORIZON_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub dt: f64,
    pub horizon_margin: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_TIME_STEP,
            horizon_margin: DEFAULT_HORIZON_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaltReason {
    /// The particle came within the margin of the horizon at `radius`.
    HorizonCrossed { radius: f64 },
    /// Stopped by the caller.
    ExternalStop,
    Unphysical(UnphysicalState),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Running,
    Halted(HaltReason),
}

impl StepOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(self, StepOutcome::Halted(_))
    }
}

/// One particle evolving under an [`AccelerationModel`].
///
/// `history` starts with the initial position and gains one point per
/// applied step. Once halted, the state and history are frozen.
pub struct Simulation<M> {
    model: M,
    state: StateVector,
    history: Vec<Point2<f64>>,
    horizon: Horizon,
    config: StepConfig,
    outcome: StepOutcome,
    steps: u64,
}

impl<M: AccelerationModel> Simulation<M> {
    pub fn new(model: M, initial: StateVector, horizon: Horizon, config: StepConfig) -> Self {
        log::info!(
            "Starting at ({:.3}, {:.3}) with velocity ({:.3}, {:.3}), dt = {}",
            initial.position.x,
            initial.position.y,
            initial.velocity.x,
            initial.velocity.y,
            config.dt
        );
        Self {
            model,
            state: initial,
            history: vec![initial.position],
            horizon,
            config,
            outcome: StepOutcome::Running,
            steps: 0,
        }
    }

    /// Advances by one `dt` unless halted.
    ///
    /// The horizon check runs before the acceleration is evaluated, so the
    /// step that would take the particle inside is never applied.
    pub fn step(&mut self) -> StepOutcome {
        if self.outcome.is_halted() {
            return self.outcome;
        }

        if let Some(radius) = self.horizon.radius() {
            let r = self.state.radius();
            if r <= radius + self.config.horizon_margin {
                log::info!(
                    "Crossed the horizon at r = {radius} after {} steps (particle at r = {r:.4})",
                    self.steps
                );
                return self.halt(HaltReason::HorizonCrossed { radius });
            }
        }

        match self.model.derivative(&self.state) {
            Ok(derivative) => {
                semi_implicit_euler(&mut self.state, derivative.acceleration, self.config.dt);
                self.history.push(self.state.position);
                self.steps += 1;
                log::trace!(
                    "step {}: r = {:.6}, a = ({:.3e}, {:.3e})",
                    self.steps,
                    self.state.radius(),
                    derivative.acceleration.x,
                    derivative.acceleration.y
                );
                self.outcome
            }
            Err(err) => {
                log::warn!("Halting after {} steps: {err}", self.steps);
                self.halt(HaltReason::Unphysical(err))
            }
        }
    }

    /// Steps until halted or `max_steps` have been applied, then stops.
    pub fn run(&mut self, max_steps: u64) -> StepOutcome {
        for _ in 0..max_steps {
            if self.step().is_halted() {
                return self.outcome;
            }
        }
        self.stop()
    }

    /// Halts with [`HaltReason::ExternalStop`]; no-op if already halted.
    pub fn stop(&mut self) -> StepOutcome {
        if self.outcome.is_halted() {
            return self.outcome;
        }
        log::info!("Stopped after {} steps", self.steps);
        self.halt(HaltReason::ExternalStop)
    }

    fn halt(&mut self, reason: HaltReason) -> StepOutcome {
        self.outcome = StepOutcome::Halted(reason);
        self.outcome
    }

    pub fn state(&self) -> &StateVector {
        &self.state
    }

    pub fn history(&self) -> &[Point2<f64>] {
        &self.history
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    pub fn outcome(&self) -> StepOutcome {
        self.outcome
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}
