// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Configuration
// ─────────────────────────────────────────────────────────────────────

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VetoError, VetoResult};

/// Estimator used for the event's central hit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentralValue {
    /// Amplitude-weighted median of the hit times.
    WeightedMedian,
    /// Amplitude-weighted mean of the hit times.
    WeightedMean,
    /// Plain median of the hit times.
    Median,
    /// Plain mean of the hit times.
    Mean,
}

impl CentralValue {
    pub fn is_weighted(self) -> bool {
        matches!(self, Self::WeightedMedian | Self::WeightedMean)
    }
}

impl FromStr for CentralValue {
    type Err = VetoError;

    /// Accepts the variant name or its snake_case form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WeightedMedian" | "weighted_median" => Ok(Self::WeightedMedian),
            "WeightedMean" | "weighted_mean" => Ok(Self::WeightedMean),
            "Median" | "median" => Ok(Self::Median),
            "Mean" | "mean" => Ok(Self::Mean),
            other => Err(VetoError::Config(format!("unknown central value: {other}"))),
        }
    }
}

/// Runtime configuration of the veto processor.
///
/// Region definitions live in the registry; this holds the constants of
/// the reference estimation that are shared by all regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VetoConfig {
    /// Name of the processor; per-region records are attached to the
    /// event under `"<processor_name>-<region>"`.
    /// Default: "IceVeto".
    pub processor_name: String,

    /// Width of the sliding window used to find the event start (ns).
    /// Default: 3000.
    pub start_window: f64,

    /// Start threshold as a fraction of the total reference amplitude.
    /// Default: 0.05.
    pub start_threshold_fraction: f64,

    /// Lower bound of the start threshold (photo-electrons).
    /// Default: 3.
    pub start_threshold_floor: f64,

    /// Central hit time estimator.
    /// Default: amplitude-weighted median.
    pub central_value: CentralValue,

    /// An upstream selection signal below this value marks the event as
    /// rejected; rejected events are not evaluated.
    /// Default: 0.1.
    pub selection_threshold: f64,
}

impl Default for VetoConfig {
    fn default() -> Self {
        Self {
            processor_name: "IceVeto".to_string(),
            start_window: 3000.0,
            start_threshold_fraction: 0.05,
            start_threshold_floor: 3.0,
            central_value: CentralValue::WeightedMedian,
            selection_threshold: 0.1,
        }
    }
}

impl VetoConfig {
    /// Record key under which a region's evaluation is attached.
    pub fn record_key(&self, region: &str) -> String {
        format!("{}-{}", self.processor_name, region)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> VetoResult<()> {
        if self.processor_name.is_empty() {
            return Err(VetoError::Config("processor_name must not be empty".to_string()));
        }
        if !(self.start_window.is_finite() && self.start_window > 0.0) {
            return Err(VetoError::Config(format!(
                "start_window must be finite and > 0, got {}",
                self.start_window
            )));
        }
        if !(0.0..=1.0).contains(&self.start_threshold_fraction) {
            return Err(VetoError::Config(format!(
                "start_threshold_fraction must be in [0, 1], got {}",
                self.start_threshold_fraction
            )));
        }
        if !(self.start_threshold_floor.is_finite() && self.start_threshold_floor >= 0.0) {
            return Err(VetoError::Config(format!(
                "start_threshold_floor must be finite and >= 0, got {}",
                self.start_threshold_floor
            )));
        }
        if !self.selection_threshold.is_finite() {
            return Err(VetoError::Numerical(format!(
                "selection_threshold must be finite, got {}",
                self.selection_threshold
            )));
        }
        Ok(())
    }

    /// Load from JSON string and validate. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> VetoResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VetoError::Config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(VetoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_record_key() {
        assert_eq!(VetoConfig::default().record_key("HESE86"), "IceVeto-HESE86");
    }

    #[test]
    fn test_rejects_bad_window() {
        let config = VetoConfig {
            start_window: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VetoError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let config = VetoConfig {
            start_threshold_fraction: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            VetoConfig::from_json(r#"{"start_window": 25.0, "central_value": "Mean"}"#).unwrap();
        assert_eq!(config.start_window, 25.0);
        assert_eq!(config.central_value, CentralValue::Mean);
        assert_eq!(config.processor_name, "IceVeto");
    }

    #[test]
    fn test_central_value_names() {
        assert_eq!("weighted_mean".parse(), Ok(CentralValue::WeightedMean));
        assert_eq!("Median".parse(), Ok(CentralValue::Median));
        assert!("mode".parse::<CentralValue>().is_err());
    }

    #[test]
    fn test_from_json_validates() {
        assert!(matches!(
            VetoConfig::from_json(r#"{"start_window": -1.0}"#),
            Err(VetoError::Config(_))
        ));
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            VetoConfig::from_json("not json"),
            Err(VetoError::Config(_))
        ));
    }
}
