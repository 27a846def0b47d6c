// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Event Store Interface
// ─────────────────────────────────────────────────────────────────────
//! Interface to the event and hit store the veto pass reads from and
//! writes its records to.
//!
//! The in-memory backend is used by the tests, the benches and the
//! Python bindings. A framework integration implements `VetoEvent` over
//! its own event record.

use std::collections::BTreeMap;

use veto_types::{
    CoincidencePolicy, Hit, PlacedHit, SensorClass, SensorId, Vec3, VetoError, VetoEvaluation,
    VetoResult,
};

/// A sensor together with the hits it recorded in one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: SensorId,
    pub position: Vec3,
    pub class: SensorClass,
    pub hits: Vec<Hit>,
}

impl Sensor {
    pub fn new(id: SensorId, position: Vec3, class: SensorClass) -> Self {
        Self {
            id,
            position,
            class,
            hits: Vec::new(),
        }
    }
}

/// Event store contract consumed by the veto processor.
pub trait VetoEvent {
    /// Upstream selection signal, if an upstream selector ran.
    fn selection(&self) -> Option<f64>;

    /// The event was rejected upstream: a selection signal exists and is
    /// below `threshold`.
    fn has_prior_rejection(&self, threshold: f64) -> bool {
        self.selection().is_some_and(|s| s < threshold)
    }

    /// Hits of all sensors in `class` admitted by `policy`, with sensor
    /// positions attached.
    fn hits(&self, class: SensorClass, policy: CoincidencePolicy) -> Vec<PlacedHit>;

    /// Sensor `id` if it belongs to `class` and recorded hits in this event.
    fn sensor(&self, id: SensorId, class: SensorClass) -> Option<&Sensor>;

    /// Store a region record under `key`.
    fn attach_result(&mut self, key: &str, record: VetoEvaluation);

    fn set_veto_level(&mut self, level: u32);
}

/// Event held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEvent {
    sensors: BTreeMap<SensorId, Sensor>,
    selection: Option<f64>,
    results: Vec<(String, VetoEvaluation)>,
    veto_level: Option<u32>,
}

impl InMemoryEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor. Replaces any previous sensor with the same id.
    pub fn add_sensor(&mut self, id: SensorId, position: Vec3, class: SensorClass) {
        self.sensors.insert(id, Sensor::new(id, position, class));
    }

    /// Register a sensor classified by the standard IC86 numbering.
    pub fn add_ic86_sensor(&mut self, id: SensorId, position: Vec3) -> VetoResult<SensorClass> {
        let class = SensorClass::classify(id)
            .ok_or_else(|| VetoError::Config(format!("sensor {id} is not part of IC86")))?;
        self.add_sensor(id, position, class);
        Ok(class)
    }

    /// Record a hit on an already registered sensor.
    pub fn add_hit(&mut self, hit: Hit) -> VetoResult<()> {
        let sensor = self
            .sensors
            .get_mut(&hit.sensor)
            .ok_or(VetoError::UnknownSensor(hit.sensor.raw()))?;
        sensor.hits.push(hit);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Option<f64>) {
        self.selection = selection;
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Attached region records, in attachment order.
    pub fn results(&self) -> &[(String, VetoEvaluation)] {
        &self.results
    }

    pub fn result(&self, key: &str) -> Option<&VetoEvaluation> {
        self.results
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
    }

    /// Overall veto level, once a veto pass has written it.
    pub fn veto_level(&self) -> Option<u32> {
        self.veto_level
    }
}

impl VetoEvent for InMemoryEvent {
    fn selection(&self) -> Option<f64> {
        self.selection
    }

    fn hits(&self, class: SensorClass, policy: CoincidencePolicy) -> Vec<PlacedHit> {
        self.sensors
            .values()
            .filter(|s| class.includes(s.class))
            .flat_map(|s| {
                s.hits
                    .iter()
                    .filter(|h| policy.admits(h))
                    .map(move |h| PlacedHit::new(*h, s.position))
            })
            .collect()
    }

    fn sensor(&self, id: SensorId, class: SensorClass) -> Option<&Sensor> {
        self.sensors
            .get(&id)
            .filter(|s| class.includes(s.class) && !s.hits.is_empty())
    }

    fn attach_result(&mut self, key: &str, record: VetoEvaluation) {
        match self.results.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = record,
            None => self.results.push((key.to_string(), record)),
        }
    }

    fn set_veto_level(&mut self, level: u32) {
        self.veto_level = Some(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> InMemoryEvent {
        let mut event = InMemoryEvent::new();
        event
            .add_ic86_sensor(SensorId::new(1, 1), Vec3::new(0.0, 0.0, 500.0))
            .unwrap();
        event
            .add_ic86_sensor(SensorId::new(80, 30), Vec3::new(10.0, 0.0, -300.0))
            .unwrap();
        event
            .add_ic86_sensor(SensorId::new(1, 61), Vec3::new(0.0, 0.0, 1950.0))
            .unwrap();
        event
    }

    #[test]
    fn test_add_hit_unknown_sensor() {
        let mut event = event();
        let hit = Hit::new(SensorId::new(2, 2), 1.0, 0.0);
        assert_eq!(event.add_hit(hit), Err(VetoError::UnknownSensor(202)));
    }

    #[test]
    fn test_add_sensor_outside_ic86() {
        let mut event = InMemoryEvent::new();
        assert!(event.add_ic86_sensor(SensorId::new(90, 1), Vec3::ZERO).is_err());
        assert_eq!(event.sensor_count(), 0);
    }

    #[test]
    fn test_hits_by_class_and_policy() {
        let mut event = event();
        event.add_hit(Hit::new(SensorId::new(1, 1), 1.0, 10.0)).unwrap();
        event
            .add_hit(Hit::new(SensorId::new(1, 1), 0.5, 20.0).with_slc(true))
            .unwrap();
        event.add_hit(Hit::new(SensorId::new(80, 30), 2.0, 5.0)).unwrap();
        event.add_hit(Hit::new(SensorId::new(1, 61), 9.0, 0.0)).unwrap();

        let in_ice = event.hits(SensorClass::InIce, CoincidencePolicy::Exclude);
        assert_eq!(in_ice.len(), 2);
        let standard = event.hits(SensorClass::InIceStandard, CoincidencePolicy::Include);
        assert_eq!(standard.len(), 2);
        assert!(standard.iter().all(|h| h.position.z == 500.0));
        assert_eq!(event.hits(SensorClass::All, CoincidencePolicy::Include).len(), 4);
    }

    #[test]
    fn test_sensor_lookup_requires_hits() {
        let mut event = event();
        assert!(event.sensor(SensorId::new(1, 1), SensorClass::All).is_none());
        event.add_hit(Hit::new(SensorId::new(1, 1), 1.0, 10.0)).unwrap();
        assert!(event.sensor(SensorId::new(1, 1), SensorClass::All).is_some());
        assert!(event.sensor(SensorId::new(1, 1), SensorClass::IceTop).is_none());
    }

    #[test]
    fn test_prior_rejection() {
        let mut event = event();
        assert!(!event.has_prior_rejection(0.1));
        event.set_selection(Some(0.0));
        assert!(event.has_prior_rejection(0.1));
        event.set_selection(Some(1.0));
        assert!(!event.has_prior_rejection(0.1));
    }
}
