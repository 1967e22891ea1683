//! Planar particle state and the geodesic acceleration model.

use cgmath::{EuclideanSpace, InnerSpace, Point2, Vector2};

use crate::connection::{ChristoffelValues, MetricValues, Spacetime};
use crate::error::UnphysicalState;
use crate::metric::CoordinateSystem;
use crate::DIM;

const T: usize = CoordinateSystem::TIME;
const R: usize = CoordinateSystem::RADIUS;
const PHI: usize = CoordinateSystem::ANGLE;

/// Position and velocity of one particle in the flat simulation plane.
///
/// Velocity is taken with respect to coordinate time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub position: Point2<f64>,
    pub velocity: Vector2<f64>,
}

impl StateVector {
    pub fn new(x: f64, y: f64, v_x: f64, v_y: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            velocity: Vector2::new(v_x, v_y),
        }
    }

    pub fn radius(&self) -> f64 {
        self.position.to_vec().magnitude()
    }

    pub fn angle(&self) -> f64 {
        self.position.y.atan2(self.position.x)
    }

    /// Radius, angle and their coordinate-time rates.
    pub fn to_polar(&self) -> Result<PolarState, UnphysicalState> {
        let r = self.radius();
        if r == 0.0 {
            return Err(UnphysicalState::AtOrigin);
        }
        let Point2 { x, y } = self.position;
        let Vector2 { x: v_x, y: v_y } = self.velocity;
        Ok(PolarState {
            r,
            phi: self.angle(),
            v_r: (x * v_x + y * v_y) / r,
            v_phi: (x * v_y - y * v_x) / (r * r),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarState {
    pub r: f64,
    pub phi: f64,
    pub v_r: f64,
    pub v_phi: f64,
}

impl PolarState {
    pub fn position(&self) -> Point2<f64> {
        let (sin, cos) = self.phi.sin_cos();
        Point2::new(self.r * cos, self.r * sin)
    }
}

/// Time derivative of a [`StateVector`]: `(v_x, v_y, a_x, a_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateDerivative {
    pub velocity: Vector2<f64>,
    pub acceleration: Vector2<f64>,
}

impl StateDerivative {
    pub fn to_array(&self) -> [f64; 4] {
        [
            self.velocity.x,
            self.velocity.y,
            self.acceleration.x,
            self.acceleration.y,
        ]
    }
}

/// Anything that can turn a particle state into its time derivative.
pub trait AccelerationModel {
    fn derivative(&self, state: &StateVector) -> Result<StateDerivative, UnphysicalState>;
}

impl<M: AccelerationModel + ?Sized> AccelerationModel for Box<M> {
    fn derivative(&self, state: &StateVector) -> Result<StateDerivative, UnphysicalState> {
        (**self).derivative(state)
    }
}

impl<M: AccelerationModel + ?Sized> AccelerationModel for &M {
    fn derivative(&self, state: &StateVector) -> Result<StateDerivative, UnphysicalState> {
        (**self).derivative(state)
    }
}

/// Free fall through a static spacetime.
///
/// The metric is always evaluated at `t = 0`: only static metrics are
/// simulated, even though the time symbol stays available to expressions.
#[derive(Debug, Clone)]
pub struct GeodesicModel<S> {
    spacetime: S,
}

impl<S: Spacetime> GeodesicModel<S> {
    pub fn new(spacetime: S) -> Self {
        Self { spacetime }
    }

    pub fn spacetime(&self) -> &S {
        &self.spacetime
    }
}

/// Four-velocity `(u^t, u^r, u^phi)` for the given coordinate-time rates.
///
/// The signature is read off g_phiphi: for a mostly-plus metric the norm is
/// -1 and the radicand is negated, for a mostly-minus metric it is used as is.
pub fn four_velocity(polar: &PolarState, g: &MetricValues) -> Result<[f64; DIM], UnphysicalState> {
    let norm = g[T][T] + g[R][R] * polar.v_r * polar.v_r + g[PHI][PHI] * polar.v_phi * polar.v_phi;
    if !norm.is_finite() {
        return Err(UnphysicalState::NonFinite { radius: polar.r });
    }
    let radicand = if g[PHI][PHI] > 0.0 { -norm } else { norm };
    if radicand <= 0.0 {
        return Err(UnphysicalState::NonTimelike {
            radius: polar.r,
            radicand,
        });
    }
    let u_t = radicand.sqrt().recip();
    Ok([u_t, polar.v_r * u_t, polar.v_phi * u_t])
}

/// a^i = -Γ^i_{jk} u^j u^k
pub fn contract(gamma: &ChristoffelValues, u: &[f64; DIM]) -> [f64; DIM] {
    let mut a = [0.0; DIM];
    for (a_i, plane) in a.iter_mut().zip(gamma) {
        for (row, u_j) in plane.iter().zip(u) {
            for (gamma_ijk, u_k) in row.iter().zip(u) {
                *a_i -= gamma_ijk * u_j * u_k;
            }
        }
    }
    a
}

impl<S: Spacetime> AccelerationModel for GeodesicModel<S> {
    fn derivative(&self, state: &StateVector) -> Result<StateDerivative, UnphysicalState> {
        let polar = state.to_polar()?;
        let point = [0.0, polar.r, polar.phi];

        let g = self.spacetime.metric_at(&point);
        let u = four_velocity(&polar, &g)?;
        let a = contract(&self.spacetime.christoffel_at(&point), &u);

        // Polar to Cartesian, still per unit proper time.
        let (sin, cos) = polar.phi.sin_cos();
        let radial = a[R] - polar.r * u[PHI] * u[PHI];
        let tangential = polar.r * a[PHI] + 2.0 * u[R] * u[PHI];
        let proper = Vector2::new(radial * cos - tangential * sin, radial * sin + tangential * cos);

        // d²x/dt² = (d²x/dτ² - dx/dt · d²t/dτ²) / (dt/dτ)²
        let acceleration = (proper - state.velocity * a[T]) / (u[T] * u[T]);
        if !(acceleration.x.is_finite() && acceleration.y.is_finite()) {
            return Err(UnphysicalState::NonFinite { radius: polar.r });
        }

        Ok(StateDerivative {
            velocity: state.velocity,
            acceleration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::metric::MetricTensor;
    use std::collections::BTreeMap;

    fn model(diagonal: [&str; DIM]) -> GeodesicModel<Connection> {
        let metric =
            MetricTensor::parse_diagonal(CoordinateSystem::polar(), diagonal, &BTreeMap::new()).unwrap();
        GeodesicModel::new(Connection::build(metric).unwrap())
    }

    #[test]
    fn test_polar_round_trip() {
        for (x, y) in [(10.0, 0.0), (-3.0, 4.0), (0.5, -7.25), (-1e-3, -2e-3)] {
            let state = StateVector::new(x, y, 0.3, -0.1);
            let back = state.to_polar().unwrap().position();
            assert!((back.x - x).abs() < 1e-12);
            assert!((back.y - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_polar_rates() {
        // Tangential motion at (10, 0): no radial rate, angular rate v_y / r.
        let polar = StateVector::new(10.0, 0.0, 0.0, 0.2).to_polar().unwrap();
        assert_eq!(polar.v_r, 0.0);
        assert!((polar.v_phi - 0.02).abs() < 1e-15);

        let polar = StateVector::new(0.0, 2.0, 0.0, -0.5).to_polar().unwrap();
        assert!((polar.phi - std::f64::consts::FRAC_PI_2).abs() < 1e-15);
        assert!((polar.v_r + 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_origin_is_unphysical() {
        let flat = model(["-1", "1", "r^2"]);
        let state = StateVector::new(0.0, 0.0, 0.1, 0.0);
        assert_eq!(flat.derivative(&state), Err(UnphysicalState::AtOrigin));
    }

    #[test]
    fn test_flat_space_at_rest() {
        let flat = model(["-1", "1", "r^2"]);
        for r in [0.1, 1.0, 10.0, 250.0] {
            let d = flat.derivative(&StateVector::new(r, 0.0, 0.0, 0.0)).unwrap();
            assert_eq!(d.to_array(), [0.0, 0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_flat_space_moving_particle_is_unaccelerated() {
        let flat = model(["-1", "1", "r^2"]);
        let d = flat.derivative(&StateVector::new(3.0, -4.0, 0.2, 0.35)).unwrap();
        assert!(d.acceleration.magnitude() < 1e-12);
        assert_eq!(d.velocity, Vector2::new(0.2, 0.35));
    }

    #[test]
    fn test_mostly_minus_signature() {
        let flat = model(["1", "-1", "-r^2"]);
        let d = flat.derivative(&StateVector::new(3.0, 4.0, -0.1, 0.3)).unwrap();
        assert!(d.acceleration.magnitude() < 1e-12);
    }

    #[test]
    fn test_superluminal_state_is_unphysical() {
        let flat = model(["-1", "1", "r^2"]);
        let err = flat.derivative(&StateVector::new(5.0, 0.0, 1.5, 0.0)).unwrap_err();
        assert!(matches!(err, UnphysicalState::NonTimelike { radicand, .. } if radicand < 0.0));
    }

    #[test]
    fn test_schwarzschild_pulls_inward() {
        let bh = model(["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"]);
        let d = bh.derivative(&StateVector::new(10.0, 0.0, 0.0, 0.0)).unwrap();
        // At rest: d²r/dt² = -M (1 - 2M/r) / r²
        let expected = -(1.0 - 0.2) / 100.0;
        assert!((d.acceleration.x - expected).abs() < 1e-12);
        assert!(d.acceleration.y.abs() < 1e-12);
    }

    #[test]
    fn test_inside_horizon_is_unphysical_at_rest() {
        let bh = model(["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"]);
        let err = bh.derivative(&StateVector::new(1.0, 0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, UnphysicalState::NonTimelike { .. }));
    }

    #[test]
    fn test_contract() {
        let mut gamma = [[[0.0; DIM]; DIM]; DIM];
        gamma[1][2][2] = -2.0;
        gamma[2][1][2] = 0.5;
        gamma[2][2][1] = 0.5;
        let a = contract(&gamma, &[1.0, 3.0, 4.0]);
        assert_eq!(a, [0.0, 32.0, -12.0]);
    }
}
