// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Veto Processor
// ─────────────────────────────────────────────────────────────────────
//! One veto pass over one event:
//!
//! ```text
//! registry ─► reference frames ─► residual walk per region ─► decision ─► event
//! ```
//!
//! The registry sits behind a read/write lock. A pass holds the read
//! lock for the whole event, so region definitions cannot change halfway
//! through an evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use veto_types::{VetoConfig, VetoOutcome, VetoResult};

use crate::constants::{PhysicalConstants, VacuumConstants};
use crate::decision::{attach, VetoDecisionAggregator};
use crate::event::VetoEvent;
use crate::observer::ResidualObserver;
use crate::reference::{ReferenceEstimator, ReferenceFrame};
use crate::registry::{ReferencePolicy, VetoRegionRegistry};
use crate::residual::ResidualEvaluator;

/// Evaluates every registered veto region on an event.
pub struct VetoProcessor {
    config: VetoConfig,
    estimator: ReferenceEstimator,
    registry: RwLock<VetoRegionRegistry>,
    constants: Arc<dyn PhysicalConstants>,
    observer: Option<Arc<dyn ResidualObserver>>,
}

impl VetoProcessor {
    /// Processor with an empty registry and vacuum light speed.
    ///
    /// Refuses a configuration that fails [`VetoConfig::validate`].
    pub fn new(config: VetoConfig) -> VetoResult<Self> {
        if let Err(e) = config.validate() {
            log::warn!("{}: refusing configuration: {e}", config.processor_name);
            return Err(e);
        }
        Ok(Self::build(config))
    }

    fn build(config: VetoConfig) -> Self {
        Self {
            estimator: ReferenceEstimator::from_config(&config),
            config,
            registry: RwLock::new(VetoRegionRegistry::new()),
            constants: Arc::new(VacuumConstants),
            observer: None,
        }
    }

    pub fn with_constants(mut self, constants: Arc<dyn PhysicalConstants>) -> Self {
        self.constants = constants;
        self
    }

    /// Install a per-hit instrumentation hook.
    pub fn with_observer(mut self, observer: Arc<dyn ResidualObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &VetoConfig {
        &self.config
    }

    /// Shared access to the region definitions.
    pub fn registry(&self) -> RwLockReadGuard<'_, VetoRegionRegistry> {
        self.registry.read()
    }

    /// Exclusive access for configuration. Blocks while a pass is running.
    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, VetoRegionRegistry> {
        self.registry.write()
    }

    /// Reference frame built from the hits `policy` selects.
    pub fn reference_frame(&self, event: &dyn VetoEvent, policy: ReferencePolicy) -> ReferenceFrame {
        self.estimator
            .estimate(&event.hits(policy.sensor_class, policy.coincidence))
    }

    /// Evaluate all regions without touching the event.
    ///
    /// Returns `None` if the event was rejected upstream or no usable
    /// propagation speed is available.
    pub fn evaluate(&self, event: &dyn VetoEvent) -> Option<VetoOutcome> {
        if event.has_prior_rejection(self.config.selection_threshold) {
            log::debug!(
                "{}: event rejected upstream, skipping veto pass",
                self.config.processor_name
            );
            return None;
        }

        let c = self.constants.speed_of_light();
        if !(c.is_finite() && c > 0.0) {
            log::error!(
                "{}: invalid speed of light {c}, skipping veto pass",
                self.config.processor_name
            );
            return None;
        }

        let registry = self.registry.read();
        let mut frames: HashMap<ReferencePolicy, ReferenceFrame> = HashMap::new();
        let mut aggregator = VetoDecisionAggregator::new();

        for region in registry.regions() {
            let frame = frames
                .entry(region.reference())
                .or_insert_with(|| self.reference_frame(event, region.reference()));
            let aggregate = ResidualEvaluator::new(frame, c)
                .with_observer(self.observer.as_deref())
                .evaluate(region, event);
            aggregator.push(region, aggregate);
        }

        Some(aggregator.finish())
    }

    /// Evaluate all regions and write the records and veto level back to
    /// the event.
    pub fn process(&self, event: &mut dyn VetoEvent) -> Option<VetoOutcome> {
        let outcome = self.evaluate(&*event)?;
        attach(&outcome, event, &self.config);
        Some(outcome)
    }
}

impl Default for VetoProcessor {
    fn default() -> Self {
        Self::build(VetoConfig::default())
    }
}
