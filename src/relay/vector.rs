//! Vec3 - Minimal 3D coordinate math for runner motion
//!
//! Only what the relay needs: distances, clamped stepping toward a point
//! and a unit facing vector.

use serde::{Deserialize, Serialize};

/// World-space 3D coordinate (also used for facing directions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Straight-line Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    #[must_use]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector pointing from `self` to `target`, or `None` when they coincide.
    #[must_use]
    pub fn direction_to(self, target: Self) -> Option<Self> {
        let delta = target - self;
        let len = delta.length();
        if len <= f32::EPSILON {
            return None;
        }
        Some(delta * (1.0 / len))
    }

    /// Step toward `target` by at most `max_step`, never overshooting.
    #[must_use]
    pub fn move_towards(self, target: Self, max_step: f32) -> Self {
        let delta = target - self;
        let len = delta.length();
        if len <= max_step || len <= f32::EPSILON {
            return target;
        }
        self + delta * (max_step / len)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_towards_clamps_at_target() {
        let from = Vec3::new(0.0, 0.0, 0.0);
        let to = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(from.move_towards(to, 5.0), to);

        let partial = from.move_towards(to, 0.25);
        assert!((partial.x - 0.25).abs() < 1e-6);
        assert_eq!(partial.y, 0.0);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(1.0, 2.0, 2.0);
        assert!((Vec3::ZERO.distance(a) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn direction_to_self_is_none() {
        let p = Vec3::new(3.0, 1.0, -2.0);
        assert!(p.direction_to(p).is_none());
        let dir = p.direction_to(Vec3::new(3.0, 1.0, 2.0)).unwrap();
        assert!((dir.z - 1.0).abs() < 1e-6);
    }
}
