// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Evaluation Records
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hit::Hit;
use crate::params::VetoParams;

/// Auditable outcome of one veto region on one event.
///
/// Built once per region per event and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoEvaluation {
    /// Region name.
    pub region: String,
    /// Stable numeric id of the region.
    pub region_id: u32,
    /// Region title at evaluation time.
    pub title: String,
    /// Parameter snapshot used for this evaluation.
    pub params: VetoParams,
    /// Distinct sensors with at least one valid veto hit.
    pub firing_sensor_count: u32,
    /// Number of valid veto hits.
    pub hit_count: u32,
    /// Summed amplitude of the valid veto hits.
    pub total_amplitude: f64,
    /// All firing criteria were met.
    pub fired: bool,
    /// The hits that passed every per-hit filter.
    pub evidence: Vec<Hit>,
}

impl VetoEvaluation {
    /// Contribution of this region to the overall veto level (0 or 1).
    #[inline]
    pub fn level(&self) -> u32 {
        u32::from(self.fired)
    }
}

impl fmt::Display for VetoEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (id={}): ndom={} nhit={} qtot={:.3} fired={} [{}]",
            self.region,
            self.region_id,
            self.firing_sensor_count,
            self.hit_count,
            self.total_amplitude,
            self.fired,
            self.params
        )
    }
}

/// Result of one veto pass over an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VetoOutcome {
    /// Number of regions that fired.
    pub level: u32,
    /// Per-region records, in registry order.
    pub evaluations: Vec<VetoEvaluation>,
}

impl VetoOutcome {
    pub fn evaluation(&self, region: &str) -> Option<&VetoEvaluation> {
        self.evaluations.iter().find(|e| e.region == region)
    }

    /// Names of the regions that fired.
    pub fn fired_regions(&self) -> impl Iterator<Item = &str> {
        self.evaluations
            .iter()
            .filter(|e| e.fired)
            .map(|e| e.region.as_str())
    }

    pub fn is_vetoed(&self) -> bool {
        self.level > 0
    }
}
