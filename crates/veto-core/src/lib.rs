// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Veto region registry and the per-event veto evaluation.
//!
//! A pass over one event runs, for every registered region:
//! reference estimation (centre of gravity, central time and the
//! sliding-window event start), the residual walk over the region's
//! member sensors, and the firing decision. The overall veto level is the
//! number of regions that fired.
//!
//! # Invariants
//!
//! 1. **Configuration errors are never fatal**: every failing registry
//!    call leaves the registry as it was, logs a warning and returns the
//!    error to the caller.
//!
//! 2. **Evaluation is infallible**: missing hits, empty regions, zero
//!    reference amplitude and an unreachable start threshold all yield
//!    zero contributions, never errors. Non-finite hits are skipped.
//!
//! 3. **Region definitions are frozen during a pass**: the processor
//!    holds the registry read lock for the whole event.

pub mod constants;
pub mod decision;
pub mod event;
pub mod observer;
pub mod presets;
pub mod processor;
pub mod reference;
pub mod registry;
pub mod residual;

pub use constants::{ExternalConstants, PhysicalConstants, VacuumConstants};
pub use decision::VetoDecisionAggregator;
pub use event::{InMemoryEvent, Sensor, VetoEvent};
pub use observer::{BufferedObserver, ExternalObserver, LogObserver, ObservedHit, ResidualObserver};
pub use presets::{Preset, PresetOverrides};
pub use processor::VetoProcessor;
pub use reference::{ReferenceEstimator, ReferenceFrame};
pub use registry::{ReferencePolicy, ReportDetail, SensorRange, VetoRegion, VetoRegionRegistry};
pub use residual::{HitResiduals, RegionAggregate, ResidualEvaluator};
