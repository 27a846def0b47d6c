// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Veto Decision Aggregator
// ─────────────────────────────────────────────────────────────────────
//! Firing decision per region and the overall event veto level.

use veto_types::{VetoConfig, VetoEvaluation, VetoOutcome, VetoParams};

use crate::event::VetoEvent;
use crate::registry::VetoRegion;
use crate::residual::RegionAggregate;

/// A region fires when every aggregate reaches its minimum.
pub fn fires(params: &VetoParams, aggregate: &RegionAggregate) -> bool {
    aggregate.total_amplitude >= params.min_total_amplitude()
        && aggregate.firing_sensor_count >= params.min_firing_sensors()
        && aggregate.hit_count >= params.min_hits()
}

/// Collects per-region records for one event.
#[derive(Debug, Default)]
pub struct VetoDecisionAggregator {
    records: Vec<VetoEvaluation>,
}

impl VetoDecisionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide `region` on its aggregate and keep the resulting record.
    pub fn push(&mut self, region: &VetoRegion, aggregate: RegionAggregate) -> &VetoEvaluation {
        let params = *region.params();
        let fired = fires(&params, &aggregate);
        log::debug!(
            "{}: ndom={} nhit={} qtot={:.3} fired={}",
            region.name(),
            aggregate.firing_sensor_count,
            aggregate.hit_count,
            aggregate.total_amplitude,
            fired
        );
        self.records.push(VetoEvaluation {
            region: region.name().to_string(),
            region_id: region.id(),
            title: region.title().to_string(),
            params,
            firing_sensor_count: aggregate.firing_sensor_count,
            hit_count: aggregate.hit_count,
            total_amplitude: aggregate.total_amplitude,
            fired,
            evidence: aggregate.evidence,
        });
        &self.records[self.records.len() - 1]
    }

    /// Number of regions fired so far.
    pub fn level(&self) -> u32 {
        self.records.iter().map(VetoEvaluation::level).sum()
    }

    pub fn finish(self) -> VetoOutcome {
        VetoOutcome {
            level: self.level(),
            evaluations: self.records,
        }
    }
}

/// Write an outcome back to the event: one record per region, then the
/// overall level.
pub fn attach(outcome: &VetoOutcome, event: &mut dyn VetoEvent, config: &VetoConfig) {
    for record in &outcome.evaluations {
        event.attach_result(&config.record_key(&record.region), record.clone());
    }
    event.set_veto_level(outcome.level);
}
