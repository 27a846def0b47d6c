// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Veto Region Parameters
// ─────────────────────────────────────────────────────────────────────
//! The fixed parameter vector of a veto region.
//!
//! All clamping lives here: `minFiringSensors` and `minHits` never drop
//! below 1 and the SLC flag is a plain bool, whichever way the value
//! arrives (constructor, setter or deserialization).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VetoError;

/// Firing criteria and hit filters of one veto region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVetoParams")]
pub struct VetoParams {
    min_total_amplitude: f64,
    min_hit_amplitude: f64,
    min_firing_sensors: u32,
    min_hits: u32,
    allow_slc: bool,
    min_time_residual: f64,
    max_time_residual: f64,
}

#[derive(Deserialize)]
struct RawVetoParams {
    min_total_amplitude: f64,
    min_hit_amplitude: f64,
    min_firing_sensors: i64,
    min_hits: i64,
    allow_slc: bool,
    min_time_residual: f64,
    max_time_residual: f64,
}

impl From<RawVetoParams> for VetoParams {
    fn from(raw: RawVetoParams) -> Self {
        Self::new(
            raw.min_total_amplitude,
            raw.min_hit_amplitude,
            raw.min_firing_sensors,
            raw.min_hits,
            raw.allow_slc,
            raw.min_time_residual,
            raw.max_time_residual,
        )
    }
}

impl Default for VetoParams {
    /// Fires on any single valid veto hit, SLC hits allowed, no
    /// time-residual filtering.
    fn default() -> Self {
        Self::new(0.0, 0.0, 1, 1, true, 1.0, 0.0)
    }
}

/// Clamp a count to >= 1; NaN maps to 1, fractions truncate.
fn clamp_count(value: f64) -> u32 {
    if value.is_nan() {
        return 1;
    }
    value.trunc().clamp(1.0, u32::MAX as f64) as u32
}

impl VetoParams {
    /// Build a parameter vector.
    ///
    /// Hits pass the residual filter only if their time residual lies in
    /// `[min_time_residual, max_time_residual]`; `min > max` disables the
    /// filter.
    pub fn new(
        min_total_amplitude: f64,
        min_hit_amplitude: f64,
        min_firing_sensors: i64,
        min_hits: i64,
        allow_slc: bool,
        min_time_residual: f64,
        max_time_residual: f64,
    ) -> Self {
        Self {
            min_total_amplitude,
            min_hit_amplitude,
            min_firing_sensors: min_firing_sensors.clamp(1, u32::MAX as i64) as u32,
            min_hits: min_hits.clamp(1, u32::MAX as i64) as u32,
            allow_slc,
            min_time_residual,
            max_time_residual,
        }
    }

    pub fn min_total_amplitude(&self) -> f64 {
        self.min_total_amplitude
    }

    pub fn min_hit_amplitude(&self) -> f64 {
        self.min_hit_amplitude
    }

    pub fn min_firing_sensors(&self) -> u32 {
        self.min_firing_sensors
    }

    pub fn min_hits(&self) -> u32 {
        self.min_hits
    }

    pub fn allow_slc(&self) -> bool {
        self.allow_slc
    }

    pub fn min_time_residual(&self) -> f64 {
        self.min_time_residual
    }

    pub fn max_time_residual(&self) -> f64 {
        self.max_time_residual
    }

    /// Time-residual window is active (`min <= max`).
    #[inline]
    pub fn residual_filtering(&self) -> bool {
        self.min_time_residual <= self.max_time_residual
    }

    /// Whether a hit with time residual `tres` passes the residual filter.
    #[inline]
    pub fn accepts_residual(&self, tres: f64) -> bool {
        !self.residual_filtering()
            || (self.min_time_residual..=self.max_time_residual).contains(&tres)
    }

    /// Update one parameter, applying the clamping rules.
    pub fn set(&mut self, param: VetoParameter, value: f64) {
        match param {
            VetoParameter::MinTotalAmplitude => self.min_total_amplitude = value,
            VetoParameter::MinHitAmplitude => self.min_hit_amplitude = value,
            VetoParameter::MinFiringSensors => self.min_firing_sensors = clamp_count(value),
            VetoParameter::MinHits => self.min_hits = clamp_count(value),
            VetoParameter::AllowSlc => self.allow_slc = value > 0.1,
            VetoParameter::MinTimeResidual => self.min_time_residual = value,
            VetoParameter::MaxTimeResidual => self.max_time_residual = value,
        }
    }

    /// Builder form of [`VetoParams::set`].
    pub fn with(mut self, param: VetoParameter, value: f64) -> Self {
        self.set(param, value);
        self
    }

    /// Numeric value of one parameter (the SLC flag reads 0 or 1).
    pub fn get(&self, param: VetoParameter) -> f64 {
        match param {
            VetoParameter::MinTotalAmplitude => self.min_total_amplitude,
            VetoParameter::MinHitAmplitude => self.min_hit_amplitude,
            VetoParameter::MinFiringSensors => self.min_firing_sensors as f64,
            VetoParameter::MinHits => self.min_hits as f64,
            VetoParameter::AllowSlc => {
                if self.allow_slc {
                    1.0
                } else {
                    0.0
                }
            }
            VetoParameter::MinTimeResidual => self.min_time_residual,
            VetoParameter::MaxTimeResidual => self.max_time_residual,
        }
    }
}

impl fmt::Display for VetoParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in VetoParameter::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", param.label(), self.get(*param))?;
        }
        Ok(())
    }
}

/// Named parameter of a veto region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VetoParameter {
    /// Minimal total amplitude of all valid veto hits.
    MinTotalAmplitude,
    /// Minimal amplitude of a single veto hit.
    MinHitAmplitude,
    /// Minimal number of distinct sensors with a valid veto hit.
    MinFiringSensors,
    /// Minimal number of valid veto hits.
    MinHits,
    /// Whether SLC hits may count as veto hits.
    AllowSlc,
    /// Lower bound of the accepted time residual (ns).
    MinTimeResidual,
    /// Upper bound of the accepted time residual (ns).
    MaxTimeResidual,
}

impl VetoParameter {
    pub const ALL: [VetoParameter; 7] = [
        Self::AllowSlc,
        Self::MinHitAmplitude,
        Self::MinFiringSensors,
        Self::MinHits,
        Self::MinTotalAmplitude,
        Self::MinTimeResidual,
        Self::MaxTimeResidual,
    ];

    /// Conventional slot label, as used in stored veto records.
    pub fn label(self) -> &'static str {
        match self {
            Self::AllowSlc => "SLCVeto",
            Self::MinHitAmplitude => "AmpVetoMin",
            Self::MinFiringSensors => "NdomVetoMin",
            Self::MinHits => "NhitVetoMin",
            Self::MinTotalAmplitude => "QtotVetoMin",
            Self::MinTimeResidual => "TresVetoMin",
            Self::MaxTimeResidual => "TresVetoMax",
        }
    }

    fn snake_name(self) -> &'static str {
        match self {
            Self::AllowSlc => "allow_slc",
            Self::MinHitAmplitude => "min_hit_amplitude",
            Self::MinFiringSensors => "min_firing_sensors",
            Self::MinHits => "min_hits",
            Self::MinTotalAmplitude => "min_total_amplitude",
            Self::MinTimeResidual => "min_time_residual",
            Self::MaxTimeResidual => "max_time_residual",
        }
    }
}

impl FromStr for VetoParameter {
    type Err = VetoError;

    /// Accepts both the slot label (`"NdomVetoMin"`) and the field name
    /// (`"min_firing_sensors"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.label() == s || p.snake_name() == s)
            .ok_or_else(|| VetoError::UnknownParameter(s.to_string()))
    }
}

impl fmt::Display for VetoParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
