use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use simulation::stepper::{DEFAULT_HORIZON_MARGIN, DEFAULT_TIME_STEP};
use simulation::{RootScan, StateVector, StepConfig};

/// Schwarzschild components with the mass left as the parameter `M`.
pub const SCHWARZSCHILD_G_TT: &str = "-(1 - 2*M/r)";
pub const SCHWARZSCHILD_G_RR: &str = "1/(1 - 2*M/r)";
pub const SCHWARZSCHILD_G_PHIPHI: &str = "r^2";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct DriverConfig {
    pub metric: MetricConfig,
    pub initial: InitialConfig,
    pub integration: IntegrationConfig,
    pub horizon: HorizonConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricConfig {
    Symbolic(SymbolicMetric),
    /// Closed-form Schwarzschild, no symbolic setup.
    Schwarzschild { mass: f64 },
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig::Symbolic(SymbolicMetric::schwarzschild(1.0))
    }
}

impl MetricConfig {
    /// The same metric in symbolic form.
    pub fn into_symbolic(self) -> SymbolicMetric {
        match self {
            MetricConfig::Symbolic(metric) => metric,
            MetricConfig::Schwarzschild { mass } => SymbolicMetric::schwarzschild(mass),
        }
    }
}

/// Diagonal components as expression text in `t`, `r` and `phi`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SymbolicMetric {
    #[serde(default = "default_g_tt")]
    pub g_tt: String,
    #[serde(default = "default_g_rr")]
    pub g_rr: String,
    #[serde(default = "default_g_phiphi")]
    pub g_phiphi: String,
    /// Named constants substituted before setup.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

fn default_g_tt() -> String {
    SCHWARZSCHILD_G_TT.to_string()
}

fn default_g_rr() -> String {
    SCHWARZSCHILD_G_RR.to_string()
}

fn default_g_phiphi() -> String {
    SCHWARZSCHILD_G_PHIPHI.to_string()
}

impl SymbolicMetric {
    pub fn new(g_tt: &str, g_rr: &str, g_phiphi: &str) -> Self {
        Self {
            g_tt: g_tt.to_string(),
            g_rr: g_rr.to_string(),
            g_phiphi: g_phiphi.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Schwarzschild in expression form with `M` bound to `mass`.
    pub fn schwarzschild(mass: f64) -> Self {
        Self {
            parameters: BTreeMap::from([("M".to_string(), mass)]),
            ..Self::new(SCHWARZSCHILD_G_TT, SCHWARZSCHILD_G_RR, SCHWARZSCHILD_G_PHIPHI)
        }
    }

    pub fn components(&self) -> [&str; 3] {
        [&self.g_tt, &self.g_rr, &self.g_phiphi]
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InitialConfig {
    pub x: f64,
    pub y: f64,
    pub v_x: f64,
    pub v_y: f64,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 0.0,
            v_x: 0.0,
            v_y: 0.0,
        }
    }
}

impl InitialConfig {
    pub fn state(&self) -> StateVector {
        StateVector::new(self.x, self.y, self.v_x, self.v_y)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IntegrationConfig {
    pub dt: f64,
    /// Tick budget; the loop is stopped externally once it runs out.
    pub frames: u64,
    pub horizon_margin: f64,
    /// Pause between ticks, 0 to run flat out.
    pub tick_interval_ms: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_TIME_STEP,
            frames: 1000,
            horizon_margin: DEFAULT_HORIZON_MARGIN,
            tick_interval_ms: 0,
        }
    }
}

impl IntegrationConfig {
    pub fn step_config(&self) -> StepConfig {
        StepConfig {
            dt: self.dt,
            horizon_margin: self.horizon_margin,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HorizonConfig {
    pub min_radius: f64,
    pub max_radius: f64,
    pub samples: usize,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        let scan = RootScan::default();
        Self {
            min_radius: scan.min_radius,
            max_radius: scan.max_radius,
            samples: scan.samples,
        }
    }
}

impl HorizonConfig {
    pub fn detector(&self) -> RootScan {
        RootScan {
            min_radius: self.min_radius,
            max_radius: self.max_radius,
            samples: self.samples,
            ..RootScan::default()
        }
    }
}

impl DriverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let integration = &self.integration;
        ensure!(
            integration.dt.is_finite() && integration.dt > 0.0,
            "dt must be positive, got {}",
            integration.dt
        );
        ensure!(
            integration.horizon_margin.is_finite() && integration.horizon_margin >= 0.0,
            "horizon_margin must be non-negative, got {}",
            integration.horizon_margin
        );
        let horizon = &self.horizon;
        ensure!(
            horizon.min_radius > 0.0 && horizon.max_radius > horizon.min_radius,
            "horizon scan needs 0 < min_radius < max_radius, got [{}, {}]",
            horizon.min_radius,
            horizon.max_radius
        );
        ensure!(horizon.samples >= 2, "horizon scan needs at least 2 samples");
        if let MetricConfig::Schwarzschild { mass } = self.metric {
            ensure!(mass.is_finite() && mass > 0.0, "mass must be positive, got {mass}");
        }
        Ok(())
    }
}
