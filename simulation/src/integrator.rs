use cgmath::Vector2;

use crate::geodesic::StateVector;

/// Semi-implicit (symplectic) Euler: velocity first, then position with the
/// updated velocity.
pub fn semi_implicit_euler(state: &mut StateVector, acceleration: Vector2<f64>, dt: f64) {
    state.velocity += acceleration * dt;
    state.position += state.velocity * dt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_uses_updated_velocity() {
        let mut state = StateVector::new(1.0, 2.0, 0.5, 0.0);
        semi_implicit_euler(&mut state, Vector2::new(0.0, -2.0), 0.5);
        assert_eq!(state.velocity, Vector2::new(0.5, -1.0));
        assert_eq!(state.position.x, 1.25);
        assert_eq!(state.position.y, 1.5);
    }

    #[test]
    fn test_free_drift() {
        let mut state = StateVector::new(10.0, 0.0, 0.0, 0.2);
        for _ in 0..10 {
            semi_implicit_euler(&mut state, Vector2::new(0.0, 0.0), 0.05);
        }
        assert_eq!(state.position.x, 10.0);
        assert!((state.position.y - 0.1).abs() < 1e-12);
    }
}
