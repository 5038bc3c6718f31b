//! Steering behaviors.
//!
//! Pure functions over `Vec2`; the enemy owns the state and the randomness.

use crate::math::{map_range, Vec2};

/// Radius inside which an agent starts slowing down.
pub const ARRIVAL_RADIUS: f32 = 100.0;

/// Distance at which a target counts as reached.
pub const TARGET_REACHED: f32 = 5.0;

/// Per-axis bound of the velocity jitter added every frame.
pub const JITTER: f32 = 0.1;

/// Speed and force limits of a steering agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringLimits {
    pub max_speed: f32,
    pub max_force: f32,
}

impl Default for SteeringLimits {
    fn default() -> Self {
        Self {
            max_speed: 2.5,
            max_force: 0.1,
        }
    }
}

/// Desired velocity toward `target`, slowing linearly inside `ARRIVAL_RADIUS`.
pub fn arrive(position: Vec2, target: Vec2, max_speed: f32) -> Vec2 {
    let to_target = target - position;
    let distance = to_target.len();
    let speed = if distance < ARRIVAL_RADIUS {
        map_range(distance, 0.0, ARRIVAL_RADIUS, 0.0, max_speed)
    } else {
        max_speed
    };
    to_target.with_len(speed)
}

/// Steering force: desired minus current velocity, capped at `max_force`.
pub fn steer(desired: Vec2, velocity: Vec2, max_force: f32) -> Vec2 {
    (desired - velocity).limit(max_force)
}

/// One steering step. Returns the new velocity, capped at `max_speed`.
///
/// `jitter` is added before the cap.
pub fn step_velocity(
    position: Vec2,
    velocity: Vec2,
    target: Vec2,
    limits: SteeringLimits,
    jitter: Vec2,
) -> Vec2 {
    let desired = arrive(position, target, limits.max_speed);
    let force = steer(desired, velocity, limits.max_force);
    (velocity + force + jitter).limit(limits.max_speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrive_full_speed_when_far() {
        let d = arrive(Vec2::ZERO, Vec2::new(300.0, 400.0), 2.5);
        assert!((d.len() - 2.5).abs() < 1e-5);
    }

    #[test]
    fn arrive_slows_inside_radius() {
        let d = arrive(Vec2::ZERO, Vec2::new(50.0, 0.0), 2.5);
        assert!((d.x - 1.25).abs() < 1e-5);
        assert_eq!(d.y, 0.0);
    }

    #[test]
    fn arrive_on_target_is_zero() {
        let p = Vec2::new(10.0, 10.0);
        assert_eq!(arrive(p, p, 2.5), Vec2::ZERO);
    }

    #[test]
    fn steering_force_is_capped() {
        let f = steer(Vec2::new(2.5, 0.0), Vec2::new(-2.5, 0.0), 0.1);
        assert!((f.len() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn step_never_exceeds_max_speed() {
        let limits = SteeringLimits::default();
        let v = step_velocity(
            Vec2::ZERO,
            Vec2::new(2.5, 0.0),
            Vec2::new(1000.0, 0.0),
            limits,
            Vec2::new(JITTER, JITTER),
        );
        assert!(v.len() <= limits.max_speed + 1e-6);
    }
}
