//! Three-component position vector stored as little-endian `f32`s.

use std::ops::{Add, Mul};

/// A position or displacement in game units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Reads three consecutive little-endian `f32`s as (x, y, z).
    pub fn from_le_bytes(bytes: [u8; 12]) -> Self {
        Self {
            x: read_f32_le(&bytes, 0),
            y: read_f32_le(&bytes, 4),
            z: read_f32_le(&bytes, 8),
        }
    }

    /// Writes (x, y, z) as three consecutive little-endian `f32`s.
    pub fn to_le_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.x.to_le_bytes());
        out[4..8].copy_from_slice(&self.y.to_le_bytes());
        out[8..12].copy_from_slice(&self.z.to_le_bytes());
        out
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Reads a little-endian `f32` at `offset`.
///
/// # Panics
///
/// Panics if `bytes` is shorter than `offset + 4`.
pub fn read_f32_le(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}
