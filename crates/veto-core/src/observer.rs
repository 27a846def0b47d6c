// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Residual Instrumentation Hook
// ─────────────────────────────────────────────────────────────────────
//! Optional per-hit instrumentation of the residual evaluation.
//!
//! Nothing is reported unless an observer is installed on the processor.

use parking_lot::Mutex;

use veto_types::Hit;

use crate::residual::HitResiduals;

/// Receives every valid veto hit together with its residuals.
pub trait ResidualObserver: Send + Sync {
    fn on_veto_hit(&self, region: &str, hit: &Hit, residuals: &HitResiduals);
}

/// Writes each valid veto hit to the `log` channel at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ResidualObserver for LogObserver {
    fn on_veto_hit(&self, region: &str, hit: &Hit, r: &HitResiduals) {
        log::trace!(
            "{region}: sensor {} q={:.3} t={:.1} dist0={:.1} distStart={:.1} \
             tres0={:.1} tresStart={:.1} tresz0={:.1} treszStart={:.1}",
            hit.sensor,
            hit.amplitude,
            hit.time,
            r.dist_ref,
            r.dist_start,
            r.t_res_ref,
            r.t_res_start,
            r.t_res_z_ref,
            r.t_res_z_start,
        );
    }
}

type HitFn = Box<dyn Fn(&str, &Hit, &HitResiduals) + Send + Sync>;

/// Observer that forwards to a callback.
pub struct ExternalObserver {
    on_hit: HitFn,
}

impl ExternalObserver {
    pub fn new(on_hit: impl Fn(&str, &Hit, &HitResiduals) + Send + Sync + 'static) -> Self {
        Self {
            on_hit: Box::new(on_hit),
        }
    }
}

impl ResidualObserver for ExternalObserver {
    fn on_veto_hit(&self, region: &str, hit: &Hit, residuals: &HitResiduals) {
        (self.on_hit)(region, hit, residuals)
    }
}

/// One valid veto hit as seen by a [`BufferedObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedHit {
    pub region: String,
    pub hit: Hit,
    pub residuals: HitResiduals,
}

/// Queues valid veto hits until drained.
///
/// The processor calls observers with the registry read lock held, so an
/// inline observer must not touch the registry. Draining after the pass
/// has no such restriction.
#[derive(Debug, Default)]
pub struct BufferedObserver {
    pending: Mutex<Vec<ObservedHit>>,
}

impl BufferedObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued hit, oldest first.
    pub fn drain(&self) -> Vec<ObservedHit> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl ResidualObserver for BufferedObserver {
    fn on_veto_hit(&self, region: &str, hit: &Hit, residuals: &HitResiduals) {
        self.pending.lock().push(ObservedHit {
            region: region.to_string(),
            hit: *hit,
            residuals: *residuals,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use veto_types::SensorId;

    use super::*;

    #[test]
    fn test_external_observer_forwards() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let observer = ExternalObserver::new(move |region, _, _| {
            assert_eq!(region, "Upper86");
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let hit = Hit::new(SensorId::new(1, 1), 1.0, 0.0);
        observer.on_veto_hit("Upper86", &hit, &HitResiduals::default());
        LogObserver.on_veto_hit("Upper86", &hit, &HitResiduals::default());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_buffered_observer_drains_in_order() {
        let observer = BufferedObserver::new();
        for module in 1..=3 {
            let hit = Hit::new(SensorId::new(1, module), 1.0, f64::from(module));
            observer.on_veto_hit("Bottom86", &hit, &HitResiduals::default());
        }
        assert_eq!(observer.len(), 3);

        let drained = observer.drain();
        assert!(observer.is_empty());
        let modules: Vec<i32> = drained.iter().map(|o| o.hit.sensor.module()).collect();
        assert_eq!(modules, vec![1, 2, 3]);
        assert!(drained.iter().all(|o| o.region == "Bottom86"));
    }
}
