// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Physical Constants Provider
// ─────────────────────────────────────────────────────────────────────

/// Speed of light in vacuum, metres per nanosecond.
pub const SPEED_OF_LIGHT_M_PER_NS: f64 = 0.299_792_458;

/// Source of the signal propagation speed used in time residuals.
///
/// Units must match hit positions and times.
pub trait PhysicalConstants: Send + Sync {
    fn speed_of_light(&self) -> f64;
}

/// Vacuum light speed in m/ns.
#[derive(Debug, Clone, Copy, Default)]
pub struct VacuumConstants;

impl PhysicalConstants for VacuumConstants {
    fn speed_of_light(&self) -> f64 {
        SPEED_OF_LIGHT_M_PER_NS
    }
}

type SpeedFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Constants provider backed by a callback.
///
/// Used by the FFI layer to take the propagation speed from Python.
pub struct ExternalConstants {
    speed_fn: SpeedFn,
}

impl ExternalConstants {
    pub fn new(speed_fn: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self {
            speed_fn: Box::new(speed_fn),
        }
    }

    /// Fixed propagation speed, e.g. `c = 1` in natural units.
    pub fn fixed(speed: f64) -> Self {
        Self::new(move || speed)
    }
}

impl PhysicalConstants for ExternalConstants {
    fn speed_of_light(&self) -> f64 {
        (self.speed_fn)()
    }
}
