//! Math types.
//!
//! This module intentionally stays small and deterministic.
//! It avoids SIMD/unsafe and focuses on stable semantics.

use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// 2D vector in screen space (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f32) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn len(self) -> f32 {
        self.len_sq().sqrt()
    }

    pub fn distance(self, to: Self) -> f32 {
        (to - self).len()
    }

    /// Returns the vector scaled to `len`, or zero for a zero-length vector.
    pub fn with_len(self, len: f32) -> Self {
        let m = self.len();
        if m > 0.0 {
            self * (len / m)
        } else {
            Self::ZERO
        }
    }

    /// Clamps the magnitude to at most `max`.
    pub fn limit(self, max: f32) -> Self {
        if self.len_sq() > max * max {
            self.with_len(max)
        } else {
            self
        }
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Linearly re-maps `value` from `[start1, stop1]` onto `[start2, stop2]`.
///
/// The result is not clamped.
pub fn map_range(value: f32, start1: f32, stop1: f32, start2: f32, stop2: f32) -> f32 {
    start2 + (stop2 - start2) * ((value - start1) / (stop1 - start1))
}

/// Play-field size. Positions wrap across these bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Wraps a point onto the torus `[0, width) x [0, height)`.
    pub fn wrap(self, p: Vec2) -> Vec2 {
        Vec2::new(wrap_axis(p.x, self.width), wrap_axis(p.y, self.height))
    }

    pub fn contains(self, p: Vec2) -> bool {
        (0.0..self.width).contains(&p.x) && (0.0..self.height).contains(&p.y)
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

fn wrap_axis(v: f32, extent: f32) -> f32 {
    if extent <= 0.0 || !v.is_finite() {
        return 0.0;
    }
    let w = v.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs.
    if w >= extent {
        0.0
    } else {
        w
    }
}
