//! The simulation crate handles the general relativity side: it takes a
//! diagonal metric in `(t, r, phi)`, derives its Christoffel symbols
//! symbolically, compiles them into numeric evaluators and integrates the
//! geodesic equation for a single particle in the plane.
//!
//! Setup is expensive and happens once ([`connection::build`],
//! [`horizon::detect_horizon`]); stepping ([`stepper::Simulation::step`])
//! only evaluates compiled programs.

pub mod compile;
pub mod connection;
pub mod error;
pub mod expr;
pub mod geodesic;
pub mod horizon;
pub mod integrator;
pub mod metric;
pub mod parse;
pub mod simplify;
pub mod stepper;

pub use connection::{build, Connection, Spacetime};
pub use error::{ConfigError, HorizonError, ParseError, SymbolicError, UnphysicalState};
pub use expr::Expr;
pub use geodesic::{AccelerationModel, GeodesicModel, StateDerivative, StateVector};
pub use horizon::{detect_horizon, Horizon, HorizonDetector, RootScan};
pub use metric::{CoordinateSystem, MetricTensor};
pub use stepper::{HaltReason, Simulation, StepConfig, StepOutcome};

/// Number of spacetime coordinates: time, radius, angle.
pub const DIM: usize = 3;

/// Builds the symbolic engine for `metric` and locates its horizon.
///
/// Horizon detection failures only disable the horizon check; configuration
/// errors abort.
pub fn setup(
    metric: MetricTensor,
    detector: &impl HorizonDetector,
) -> Result<(GeodesicModel<Connection>, Horizon), ConfigError> {
    let radial = CoordinateSystem::RADIUS;
    let horizon = detect_horizon(
        detector,
        metric.entry(radial, radial),
        metric.coordinates().radial(),
    );
    let connection = Connection::build(metric)?;
    Ok((GeodesicModel::new(connection), horizon))
}

/// Closed-form Schwarzschild spacetime in the equatorial plane.
///
/// Skips the symbolic pipeline entirely; useful as a fast path and as a
/// reference for the derived connection.
pub mod schwarzschild {
    use crate::connection::{ChristoffelValues, MetricValues, Point, Spacetime};
    use crate::horizon::Horizon;
    use crate::DIM;

    /// Calculate the metric coefficient g_tt (time-time component)
    /// g_tt = -(1 - 2M/r) in geometric units
    pub fn g_tt(mass: f64, r: f64) -> f64 {
        -(1.0 - (2.0 * mass) / r)
    }

    /// Calculate the metric coefficient g_rr (radial-radial component)
    /// g_rr = 1/(1 - 2M/r) in geometric units
    pub fn g_rr(mass: f64, r: f64) -> f64 {
        1.0 / (1.0 - (2.0 * mass) / r)
    }

    /// Calculate the metric coefficient g_phi_phi (azimuthal component)
    /// g_φφ = r² on the equator (θ = π/2)
    pub fn g_phi_phi(r: f64) -> f64 {
        r * r
    }

    /// Calculate the Schwarzschild radius (event horizon)
    /// r_s = 2GM/c² (in geometric units where G=c=1, r_s = 2M)
    pub fn schwarzschild_radius(mass: f64) -> f64 {
        2.0 * mass
    }

    /// Check if a position is inside the event horizon
    /// r <= r_s
    pub fn is_inside_event_horizon(mass: f64, r: f64) -> bool {
        r <= schwarzschild_radius(mass)
    }

    /// Schwarzschild spacetime of a point mass
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Schwarzschild {
        /// Mass in geometric units
        pub mass: f64,
    }

    impl Schwarzschild {
        /// Create a new Schwarzschild spacetime
        /// Mass in geometric units (G = c = 1)
        pub fn new(mass: f64) -> Self {
            Self { mass }
        }

        /// Get the event horizon
        /// Located at r = r_s = 2M
        pub fn horizon(&self) -> Horizon {
            Horizon::at(schwarzschild_radius(self.mass))
        }
    }

    impl Spacetime for Schwarzschild {
        fn metric_at(&self, point: &Point) -> MetricValues {
            let r = point[1];
            let mut g = [[0.0; DIM]; DIM];
            g[0][0] = g_tt(self.mass, r);
            g[1][1] = g_rr(self.mass, r);
            g[2][2] = g_phi_phi(r);
            g
        }

        fn christoffel_at(&self, point: &Point) -> ChristoffelValues {
            let m = self.mass;
            let r = point[1];
            let shifted = r - schwarzschild_radius(m);
            let mut gamma = [[[0.0; DIM]; DIM]; DIM];
            gamma[0][0][1] = m / (r * shifted);
            gamma[0][1][0] = gamma[0][0][1];
            gamma[1][0][0] = m * shifted / (r * r * r);
            gamma[1][1][1] = -m / (r * shifted);
            gamma[1][2][2] = -shifted;
            gamma[2][1][2] = 1.0 / r;
            gamma[2][2][1] = gamma[2][1][2];
            gamma
        }
    }
}
