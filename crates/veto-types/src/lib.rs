// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! IceVeto kernel: per-event (self)vetoing of detector events.

pub mod config;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod params;
pub mod record;

pub use config::{CentralValue, VetoConfig};
pub use error::{VetoError, VetoResult};
pub use geometry::{SensorId, Vec3};
pub use hit::{CoincidencePolicy, Hit, PlacedHit, SensorClass};
pub use params::{VetoParameter, VetoParams};
pub use record::{VetoEvaluation, VetoOutcome};
