// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Sensor Identifiers and Positions
// ─────────────────────────────────────────────────────────────────────
//! Sensor identifiers and Cartesian positions.
//!
//! A sensor (DOM) is addressed by its string and its module number on
//! that string. The pair is packed into a single integer:
//!
//!   id = sign(string) * (100 * |string| + module)
//!
//! Negative string numbers form a separate, legal namespace. The packing
//! is a bijection for modules in [1, 99].

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{VetoError, VetoResult};

/// Smallest encodable module number.
pub const MODULE_MIN: i32 = 1;
/// Largest encodable module number.
pub const MODULE_MAX: i32 = 99;
/// Largest encodable string magnitude; keeps every packed id inside `i32`.
pub const STRING_MAX: i32 = (i32::MAX - MODULE_MAX) / 100;

/// Packed (string, module) sensor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(i32);

impl SensorId {
    /// Pack a (string, module) pair. No range checks; use
    /// [`SensorId::try_new`] when the pair comes from user input.
    #[inline]
    pub const fn new(string: i32, module: i32) -> Self {
        let id = 100 * string.abs() + module;
        if string < 0 {
            Self(-id)
        } else {
            Self(id)
        }
    }

    /// Pack a (string, module) pair, rejecting modules outside [1, 99]
    /// and strings beyond [`STRING_MAX`] in magnitude.
    pub fn try_new(string: i32, module: i32) -> VetoResult<Self> {
        if !(MODULE_MIN..=MODULE_MAX).contains(&module) {
            return Err(VetoError::InvalidModule(module));
        }
        if !(-STRING_MAX..=STRING_MAX).contains(&string) {
            return Err(VetoError::InvalidString(string));
        }
        let id = string
            .checked_abs()
            .and_then(|s| s.checked_mul(100))
            .and_then(|v| v.checked_add(module))
            .ok_or(VetoError::InvalidString(string))?;
        Ok(Self(if string < 0 { -id } else { id }))
    }

    /// Wrap an already packed identifier.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// String number, sign preserved.
    #[inline]
    pub const fn string(self) -> i32 {
        let s = self.0.abs() / 100;
        if self.0 < 0 {
            -s
        } else {
            s
        }
    }

    /// Module number on the string.
    #[inline]
    pub const fn module(self) -> i32 {
        self.0.abs() % 100
    }

    /// Unpack into `(string, module)`.
    #[inline]
    pub const fn decode(self) -> (i32, i32) {
        (self.string(), self.module())
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cartesian position (m).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Vec3) -> f64 {
        (*self - *other).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
