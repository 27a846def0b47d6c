// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all veto kernel failures.
///
/// None of these are fatal: configuration calls that fail leave the
/// registry untouched and the caller is free to carry on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VetoError {
    /// A veto region with this name is already registered.
    #[error("veto region already exists: {0}")]
    DuplicateRegion(String),

    /// No veto region registered under this name.
    #[error("no veto region found with name: {0}")]
    UnknownRegion(String),

    /// Preset name not present in the standard preset table.
    #[error("unknown pre-defined veto system: {0}")]
    UnknownPreset(String),

    /// Parameter name not recognised.
    #[error("unknown veto parameter: {0}")]
    UnknownParameter(String),

    /// String or module range selects no sensors.
    #[error("empty sensor range: strings [{string_lo}, {string_hi}] modules [{module_lo}, {module_hi}]")]
    EmptyRange {
        string_lo: i32,
        string_hi: i32,
        module_lo: i32,
        module_hi: i32,
    },

    /// Hit addressed to a sensor the event does not know.
    #[error("no sensor registered with id {0}")]
    UnknownSensor(i32),

    /// Module index outside the encodable range [1, 99].
    #[error("module index {0} outside [1, 99]")]
    InvalidModule(i32),

    /// String index whose packed id would not fit the sensor id range.
    #[error("string index {0} outside the encodable sensor id range")]
    InvalidString(i32),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf where a finite value is required).
    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type VetoResult<T> = Result<T, VetoError>;
