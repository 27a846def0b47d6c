// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Hits and Sensor Classes
// ─────────────────────────────────────────────────────────────────────
//! Calibrated hits as consumed by the veto evaluation, and the sensor
//! classes used to select them from an event.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VetoError;
use crate::geometry::{SensorId, Vec3};

/// A single calibrated hit recorded by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Sensor that recorded the hit.
    pub sensor: SensorId,
    /// Signal amplitude (photo-electrons).
    pub amplitude: f64,
    /// Leading-edge time (ns).
    pub time: f64,
    /// Single-sensor ("SLC") hit without local coincidence.
    pub slc: bool,
}

impl Hit {
    pub fn new(sensor: SensorId, amplitude: f64, time: f64) -> Self {
        Self {
            sensor,
            amplitude,
            time,
            slc: false,
        }
    }

    /// Same hit, flagged as a single-sensor-coincidence hit.
    pub fn with_slc(mut self, slc: bool) -> Self {
        self.slc = slc;
        self
    }

    /// Amplitude and time are both finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.amplitude.is_finite() && self.time.is_finite()
    }
}

/// A hit together with the position of its owning sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedHit {
    pub hit: Hit,
    pub position: Vec3,
}

impl PlacedHit {
    pub fn new(hit: Hit, position: Vec3) -> Self {
        Self { hit, position }
    }
}

/// Whether single-sensor-coincidence hits take part in a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoincidencePolicy {
    /// SLC hits are selected like any other hit.
    Include,
    /// SLC hits are dropped.
    Exclude,
}

impl CoincidencePolicy {
    pub fn from_allow(allow_slc: bool) -> Self {
        if allow_slc {
            Self::Include
        } else {
            Self::Exclude
        }
    }

    #[inline]
    pub fn admits(self, hit: &Hit) -> bool {
        match self {
            Self::Include => true,
            Self::Exclude => !hit.slc,
        }
    }
}

/// Sensor classes of the IC86 detector.
///
/// `InIceStandard`, `DeepCore` and `IceTop` are what a sensor *is*;
/// `InIce` and `All` are selections spanning several of those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorClass {
    All,
    InIce,
    InIceStandard,
    DeepCore,
    IceTop,
}

/// Last string of the standard (non-DeepCore) in-ice array.
pub const LAST_STANDARD_STRING: i32 = 78;
/// Last string of the IC86 array.
pub const LAST_STRING: i32 = 86;
/// Last in-ice module on a string.
pub const LAST_IN_ICE_MODULE: i32 = 60;
/// IceTop tank modules occupy 61..=64 on each string.
pub const ICETOP_MODULES: std::ops::RangeInclusive<i32> = 61..=64;

impl SensorClass {
    /// Whether a sensor of class `kind` belongs to this selection.
    pub fn includes(self, kind: SensorClass) -> bool {
        match self {
            Self::All => true,
            Self::InIce => matches!(kind, Self::InIce | Self::InIceStandard | Self::DeepCore),
            other => other == kind,
        }
    }

    /// Class of a sensor in the standard IC86 numbering, if it has one.
    pub fn classify(id: SensorId) -> Option<SensorClass> {
        let (string, module) = id.decode();
        if !(1..=LAST_STRING).contains(&string) {
            return None;
        }
        if ICETOP_MODULES.contains(&module) {
            return Some(Self::IceTop);
        }
        if !(1..=LAST_IN_ICE_MODULE).contains(&module) {
            return None;
        }
        if string <= LAST_STANDARD_STRING {
            Some(Self::InIceStandard)
        } else {
            Some(Self::DeepCore)
        }
    }
}

impl FromStr for SensorClass {
    type Err = VetoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "All" | "all" => Ok(Self::All),
            "InIce" | "in_ice" => Ok(Self::InIce),
            "InIceStandard" | "in_ice_standard" => Ok(Self::InIceStandard),
            "DeepCore" | "deep_core" => Ok(Self::DeepCore),
            "IceTop" | "ice_top" => Ok(Self::IceTop),
            other => Err(VetoError::Config(format!("unknown sensor class: {other}"))),
        }
    }
}
