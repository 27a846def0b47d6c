// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Residual Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Per-region walk over the member sensors of a veto region.
//!
//! Each hit at a member sensor is filtered on coincidence, amplitude and
//! the time residual against the event reference:
//!
//! ```text
//! tres0 = (t_hit - t_ref) - |x_sensor - x_ref| / c
//! ```
//!
//! Only `tres0` gates acceptance. The start-referenced and depth-only
//! residuals are computed for instrumentation. Depth offsets are signed,
//! positive for a sensor above the reference.

use veto_types::{Hit, SensorClass, Vec3};

use crate::event::{Sensor, VetoEvent};
use crate::observer::ResidualObserver;
use crate::reference::ReferenceFrame;
use crate::registry::VetoRegion;

/// Residuals of one hit against both event references.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitResiduals {
    pub dt_ref: f64,
    pub dt_start: f64,
    pub dist_ref: f64,
    pub dist_start: f64,
    /// Signed depth offset `z_sensor - z_ref`.
    pub dz_ref: f64,
    /// Signed depth offset `z_sensor - z_start`.
    pub dz_start: f64,
    /// Gating residual.
    pub t_res_ref: f64,
    pub t_res_start: f64,
    pub t_res_z_ref: f64,
    pub t_res_z_start: f64,
}

/// Sensor-to-reference distances, shared by all hits of a sensor.
#[derive(Debug, Clone, Copy)]
struct SensorOffsets {
    dist_ref: f64,
    dist_start: f64,
    dz_ref: f64,
    dz_start: f64,
}

impl SensorOffsets {
    fn new(position: Vec3, frame: &ReferenceFrame) -> Self {
        Self {
            dist_ref: position.distance(&frame.position),
            dist_start: position.distance(&frame.start_position),
            dz_ref: position.z - frame.position.z,
            dz_start: position.z - frame.start_position.z,
        }
    }

    fn residuals(&self, time: f64, frame: &ReferenceFrame, c: f64) -> HitResiduals {
        let dt_ref = time - frame.time;
        let dt_start = time - frame.start_time();
        HitResiduals {
            dt_ref,
            dt_start,
            dist_ref: self.dist_ref,
            dist_start: self.dist_start,
            dz_ref: self.dz_ref,
            dz_start: self.dz_start,
            t_res_ref: dt_ref - self.dist_ref / c,
            t_res_start: dt_start - self.dist_start / c,
            t_res_z_ref: dt_ref - self.dz_ref / c,
            t_res_z_start: dt_start - self.dz_start / c,
        }
    }
}

/// Observed aggregates of one region on one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionAggregate {
    pub firing_sensor_count: u32,
    pub hit_count: u32,
    pub total_amplitude: f64,
    pub evidence: Vec<Hit>,
}

impl RegionAggregate {
    /// Fold in the valid hits of one firing sensor.
    fn with_sensor(mut self, hits: Vec<Hit>) -> Self {
        self.firing_sensor_count += 1;
        self.hit_count += hits.len() as u32;
        self.total_amplitude += hits.iter().map(|h| h.amplitude).sum::<f64>();
        self.evidence.extend(hits);
        self
    }
}

/// Evaluates veto regions against one reference frame.
pub struct ResidualEvaluator<'a> {
    frame: &'a ReferenceFrame,
    light_speed: f64,
    observer: Option<&'a dyn ResidualObserver>,
}

impl<'a> ResidualEvaluator<'a> {
    /// `light_speed` must be finite and positive.
    pub fn new(frame: &'a ReferenceFrame, light_speed: f64) -> Self {
        Self {
            frame,
            light_speed,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn ResidualObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Aggregate the valid veto hits of every member sensor of `region`.
    pub fn evaluate(&self, region: &VetoRegion, event: &dyn VetoEvent) -> RegionAggregate {
        region
            .members()
            .filter_map(|id| event.sensor(id, SensorClass::All))
            .map(|sensor| self.valid_hits(region, sensor))
            .filter(|hits| !hits.is_empty())
            .fold(RegionAggregate::default(), RegionAggregate::with_sensor)
    }

    /// Hits of `sensor` passing every per-hit filter of `region`.
    pub fn valid_hits(&self, region: &VetoRegion, sensor: &Sensor) -> Vec<Hit> {
        let params = region.params();
        let offsets = SensorOffsets::new(sensor.position, self.frame);

        sensor
            .hits
            .iter()
            .filter(|h| params.allow_slc() || !h.slc)
            .filter(|h| h.amplitude >= params.min_hit_amplitude())
            .filter(|h| {
                let finite = h.is_finite();
                if !finite {
                    log::debug!("{}: skipping non-finite hit on sensor {}", region.name(), h.sensor);
                }
                finite
            })
            .filter(|h| {
                let residuals = offsets.residuals(h.time, self.frame, self.light_speed);
                let accepted = params.accepts_residual(residuals.t_res_ref);
                if accepted {
                    if let Some(observer) = self.observer {
                        observer.on_veto_hit(region.name(), h, &residuals);
                    }
                }
                accepted
            })
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use veto_types::{SensorId, VetoParameter, VetoParams};

    use super::*;
    use crate::event::InMemoryEvent;
    use crate::registry::{SensorRange, VetoRegionRegistry};

    fn frame_at_origin() -> ReferenceFrame {
        ReferenceFrame {
            position: Vec3::ZERO,
            time: 0.0,
            total_amplitude: 0.0,
            start: None,
            start_position: Vec3::ZERO,
            hit_count: 0,
        }
    }

    fn registry(params: VetoParams) -> VetoRegionRegistry {
        let mut registry = VetoRegionRegistry::new();
        registry.define("veto", params).unwrap();
        registry.add_range("veto", SensorRange::new(1, 2, 1, 2)).unwrap();
        registry
    }

    fn event(hits: &[(i32, i32, f64, f64, bool)]) -> InMemoryEvent {
        let mut event = InMemoryEvent::new();
        for s in 1..=3 {
            for m in 1..=2 {
                let position = Vec3::new(300.0, 0.0, 0.0);
                event.add_sensor(SensorId::new(s, m), position, SensorClass::InIceStandard);
            }
        }
        for &(s, m, amplitude, time, slc) in hits {
            event
                .add_hit(Hit::new(SensorId::new(s, m), amplitude, time).with_slc(slc))
                .unwrap();
        }
        event
    }

    fn windowed() -> VetoParams {
        VetoParams::new(0.0, 0.0, 1, 1, true, -5.0, 5.0)
    }

    #[test]
    fn test_residual_gating() {
        let registry = registry(windowed());
        let region = registry.lookup("veto").unwrap();
        let event = event(&[(1, 1, 1.0, 300.0, false), (1, 1, 1.0, 350.0, false)]);
        let frame = frame_at_origin();

        let agg = ResidualEvaluator::new(&frame, 1.0).evaluate(region, &event);
        assert_eq!(agg.hit_count, 1);
        assert_eq!(agg.firing_sensor_count, 1);
        assert_eq!(agg.evidence.len(), 1);
        assert_eq!(agg.evidence[0].time, 300.0);
    }

    #[test]
    fn test_no_filter_sentinel_accepts_all() {
        let registry = registry(VetoParams::default());
        let region = registry.lookup("veto").unwrap();
        let event = event(&[(1, 1, 1.0, -1e6, false), (1, 2, 2.0, 1e6, false)]);
        let frame = frame_at_origin();

        let agg = ResidualEvaluator::new(&frame, 1.0).evaluate(region, &event);
        assert_eq!(agg.hit_count, 2);
        assert_eq!(agg.firing_sensor_count, 2);
        assert!((agg.total_amplitude - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_slc_and_amplitude_cuts() {
        let params = VetoParams::default()
            .with(VetoParameter::AllowSlc, 0.0)
            .with(VetoParameter::MinHitAmplitude, 0.5);
        let registry = registry(params);
        let region = registry.lookup("veto").unwrap();
        let event = event(&[
            (1, 1, 2.0, 0.0, true),
            (1, 1, 0.4, 0.0, false),
            (2, 2, 0.5, 0.0, false),
        ]);
        let frame = frame_at_origin();

        let agg = ResidualEvaluator::new(&frame, 1.0).evaluate(region, &event);
        assert_eq!(agg.hit_count, 1);
        assert_eq!(agg.firing_sensor_count, 1);
        assert_eq!(agg.evidence[0].sensor, SensorId::new(2, 2));
    }

    #[test]
    fn test_non_members_and_silent_sensors_ignored() {
        let registry = registry(VetoParams::default());
        let region = registry.lookup("veto").unwrap();
        // String 3 is not a member; sensors without hits contribute nothing.
        let event = event(&[(3, 1, 5.0, 0.0, false)]);
        let frame = frame_at_origin();

        let agg = ResidualEvaluator::new(&frame, 1.0).evaluate(region, &event);
        assert_eq!(agg, RegionAggregate::default());
    }

    #[test]
    fn test_non_finite_hit_skipped() {
        let registry = registry(VetoParams::default());
        let region = registry.lookup("veto").unwrap();
        let event = event(&[(1, 1, 1.0, f64::NAN, false), (1, 1, 1.0, 10.0, false)]);
        let frame = frame_at_origin();

        let agg = ResidualEvaluator::new(&frame, 1.0).evaluate(region, &event);
        assert_eq!(agg.hit_count, 1);
        assert!(agg.total_amplitude.is_finite());
    }

    #[test]
    fn test_residuals_against_both_references() {
        let frame = ReferenceFrame {
            position: Vec3::new(0.0, 0.0, 100.0),
            time: 50.0,
            total_amplitude: 10.0,
            start: Some(crate::reference::StartWindow {
                first: 0,
                last: 0,
                time: 20.0,
            }),
            start_position: Vec3::new(0.0, 0.0, 0.0),
            hit_count: 1,
        };
        let offsets = SensorOffsets::new(Vec3::new(30.0, 0.0, 140.0), &frame);
        let r = offsets.residuals(200.0, &frame, 1.0);
        assert!((r.dist_ref - 50.0).abs() < 1e-9);
        assert!((r.dz_ref - 40.0).abs() < 1e-9);
        assert!((r.dz_start - 140.0).abs() < 1e-9);
        assert!((r.t_res_ref - 100.0).abs() < 1e-9);
        assert!((r.t_res_z_ref - 110.0).abs() < 1e-9);
        assert!((r.t_res_z_start - 40.0).abs() < 1e-9);
        assert!((r.dt_start - 180.0).abs() < 1e-9);

        // Below the centre of gravity, above the start sensor.
        let below = SensorOffsets::new(Vec3::new(0.0, 0.0, 40.0), &frame);
        let r = below.residuals(200.0, &frame, 1.0);
        assert!((r.dz_ref + 60.0).abs() < 1e-9);
        assert!((r.dz_start - 40.0).abs() < 1e-9);
        assert!((r.t_res_z_ref - 210.0).abs() < 1e-9);
        assert!((r.t_res_z_start - 140.0).abs() < 1e-9);
        assert!((r.t_res_ref - 90.0).abs() < 1e-9);
    }

    struct Recorder(Mutex<Vec<f64>>);

    impl ResidualObserver for Recorder {
        fn on_veto_hit(&self, _region: &str, _hit: &Hit, residuals: &HitResiduals) {
            self.0.lock().unwrap().push(residuals.t_res_ref);
        }
    }

    #[test]
    fn test_observer_sees_accepted_hits_only() {
        let registry = registry(windowed());
        let region = registry.lookup("veto").unwrap();
        let event = event(&[(1, 1, 1.0, 302.0, false), (1, 1, 1.0, 350.0, false)]);
        let frame = frame_at_origin();
        let recorder = Recorder(Mutex::new(Vec::new()));

        ResidualEvaluator::new(&frame, 1.0)
            .with_observer(Some(&recorder))
            .evaluate(region, &event);
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!((seen[0] - 2.0).abs() < 1e-9);
    }
}
