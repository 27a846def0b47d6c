// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Veto Region Registry
// ─────────────────────────────────────────────────────────────────────
//! Named veto regions: a set of member sensors plus a parameter vector.
//!
//! The registry is configuration-time state. Every mutating operation
//! either succeeds completely or leaves the registry untouched; failures
//! are reported on the `log` channel and returned as `VetoError`, but are
//! never fatal.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use veto_types::geometry::{MODULE_MAX, MODULE_MIN, STRING_MAX};
use veto_types::{
    CoincidencePolicy, SensorClass, SensorId, VetoError, VetoParameter, VetoParams, VetoResult,
};

use crate::presets::{MembershipOp, Preset, PresetOverrides};

/// Title given to every newly defined region.
pub const DEFAULT_TITLE: &str = "IceVeto system";

const PREDEFINED_PREFIX: &str = "Pre-defined ";

/// Which hits of an event feed the reference estimation for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencePolicy {
    pub sensor_class: SensorClass,
    pub coincidence: CoincidencePolicy,
}

impl Default for ReferencePolicy {
    /// All in-ice sensors, SLC hits excluded.
    fn default() -> Self {
        Self {
            sensor_class: SensorClass::InIce,
            coincidence: CoincidencePolicy::Exclude,
        }
    }
}

/// Rectangular block of sensors: strings `[string_lo, string_hi]` ×
/// modules `[module_lo, module_hi]`, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorRange {
    pub string_lo: i32,
    pub string_hi: i32,
    pub module_lo: i32,
    pub module_hi: i32,
}

impl SensorRange {
    pub const fn new(string_lo: i32, string_hi: i32, module_lo: i32, module_hi: i32) -> Self {
        Self {
            string_lo,
            string_hi,
            module_lo,
            module_hi,
        }
    }

    /// A single sensor.
    pub const fn single(string: i32, module: i32) -> Self {
        Self::new(string, string, module, module)
    }

    /// Inverted bounds on either axis.
    pub fn is_empty(&self) -> bool {
        self.string_lo > self.string_hi || self.module_lo > self.module_hi
    }

    pub fn validate(&self) -> VetoResult<()> {
        if self.is_empty() {
            return Err(VetoError::EmptyRange {
                string_lo: self.string_lo,
                string_hi: self.string_hi,
                module_lo: self.module_lo,
                module_hi: self.module_hi,
            });
        }
        for module in [self.module_lo, self.module_hi] {
            if !(MODULE_MIN..=MODULE_MAX).contains(&module) {
                return Err(VetoError::InvalidModule(module));
            }
        }
        for string in [self.string_lo, self.string_hi] {
            if !(-STRING_MAX..=STRING_MAX).contains(&string) {
                return Err(VetoError::InvalidString(string));
            }
        }
        Ok(())
    }

    /// Every sensor in the block, string-major. Only meaningful for a
    /// range that passes [`SensorRange::validate`].
    pub fn sensor_ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        (self.string_lo..=self.string_hi).flat_map(move |string| {
            (self.module_lo..=self.module_hi).map(move |module| SensorId::new(string, module))
        })
    }
}

/// A named veto region.
#[derive(Debug, Clone, PartialEq)]
pub struct VetoRegion {
    id: u32,
    name: String,
    title: String,
    params: VetoParams,
    reference: ReferencePolicy,
    members: BTreeSet<SensorId>,
}

impl VetoRegion {
    fn new(id: u32, name: &str, params: VetoParams, reference: ReferencePolicy) -> Self {
        Self {
            id,
            name: name.to_string(),
            title: DEFAULT_TITLE.to_string(),
            params,
            reference,
            members: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn params(&self) -> &VetoParams {
        &self.params
    }

    pub fn reference(&self) -> ReferencePolicy {
        self.reference
    }

    /// Region still matches the preset it was activated from.
    pub fn is_predefined(&self) -> bool {
        self.title.starts_with(PREDEFINED_PREFIX)
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.members.contains(&id)
    }

    /// Member sensors in ascending id order.
    pub fn members(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.members.iter().copied()
    }

    pub fn sensor_count(&self) -> usize {
        self.members.len()
    }

    /// Number of sensors newly added.
    fn add(&mut self, range: &SensorRange) -> usize {
        range
            .sensor_ids()
            .filter(|id| self.members.insert(*id))
            .count()
    }

    /// Number of sensors actually removed.
    fn remove(&mut self, range: &SensorRange) -> usize {
        range
            .sensor_ids()
            .filter(|id| self.members.remove(id))
            .count()
    }

    fn apply(&mut self, op: &MembershipOp) {
        match op {
            MembershipOp::Add(range) => self.add(range),
            MembershipOp::Remove(range) => self.remove(range),
        };
    }

    fn clear_predefined(&mut self) {
        if let Some(rest) = self.title.strip_prefix(PREDEFINED_PREFIX) {
            self.title = rest.to_string();
        }
    }

    fn mark_predefined(&mut self) {
        if !self.is_predefined() {
            self.title = format!("{PREDEFINED_PREFIX}{}", self.title);
        }
    }
}

/// Detail level of [`VetoRegionRegistry::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportDetail {
    /// Id, title, name and sensor count per region.
    Summary,
    /// Summary plus the parameter settings.
    Parameters,
    /// Parameters plus the full member list.
    Sensors,
}

impl FromStr for ReportDetail {
    type Err = VetoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "parameters" => Ok(Self::Parameters),
            "sensors" => Ok(Self::Sensors),
            _ => Err(VetoError::Config(format!("unknown report detail: {s}"))),
        }
    }
}

/// Log a configuration error and hand it back to the caller.
fn diagnose(err: VetoError) -> VetoError {
    log::warn!("veto registry: {err}");
    err
}

/// Owner of all veto region definitions, in definition order.
#[derive(Debug, Clone, Default)]
pub struct VetoRegionRegistry {
    regions: Vec<VetoRegion>,
}

impl VetoRegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a region with the default reference policy.
    ///
    /// Returns the region id. Fails if `name` is already taken.
    pub fn define(&mut self, name: &str, params: VetoParams) -> VetoResult<u32> {
        self.define_with_reference(name, params, ReferencePolicy::default())
    }

    pub fn define_with_reference(
        &mut self,
        name: &str,
        params: VetoParams,
        reference: ReferencePolicy,
    ) -> VetoResult<u32> {
        if self.lookup(name).is_some() {
            return Err(diagnose(VetoError::DuplicateRegion(name.to_string())));
        }
        let id = self.regions.len() as u32 + 1;
        self.regions.push(VetoRegion::new(id, name, params, reference));
        log::info!("defined veto region {id} '{name}': {params}");
        Ok(id)
    }

    /// Add every sensor of `range` to region `name`.
    ///
    /// Already present sensors are left alone. Returns how many sensors
    /// were new.
    pub fn add_range(&mut self, name: &str, range: SensorRange) -> VetoResult<usize> {
        range.validate().map_err(diagnose)?;
        let region = self.region_mut(name)?;
        let added = region.add(&range);
        region.clear_predefined();
        Ok(added)
    }

    /// Remove every sensor of `range` from region `name`.
    ///
    /// Non-members are ignored. Returns how many sensors were removed.
    pub fn remove_range(&mut self, name: &str, range: SensorRange) -> VetoResult<usize> {
        range.validate().map_err(diagnose)?;
        let region = self.region_mut(name)?;
        let removed = region.remove(&range);
        region.clear_predefined();
        Ok(removed)
    }

    /// Update one parameter of region `name`.
    pub fn set_parameter(
        &mut self,
        name: &str,
        param: VetoParameter,
        value: f64,
    ) -> VetoResult<()> {
        let region = self.region_mut(name)?;
        region.params.set(param, value);
        log::debug!("veto region '{name}': {param} set to {}", region.params.get(param));
        Ok(())
    }

    /// Change which hits feed the reference estimation for region `name`.
    pub fn set_reference_policy(&mut self, name: &str, reference: ReferencePolicy) -> VetoResult<()> {
        self.region_mut(name)?.reference = reference;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&VetoRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Expand a standard preset into a new region named after it.
    ///
    /// Unset overrides fall back to the preset's own defaults.
    pub fn activate_preset(&mut self, preset: &str, overrides: PresetOverrides) -> VetoResult<u32> {
        let preset: Preset = preset.parse().map_err(diagnose)?;
        let params = preset.resolve(&overrides);
        let id = self.define_with_reference(preset.name(), params, preset.reference_policy())?;
        let region = self.region_mut(preset.name())?;
        for op in preset.recipe() {
            region.apply(&op);
        }
        region.mark_predefined();
        log::info!(
            "activated preset '{}' with {} sensors",
            preset.name(),
            region.sensor_count()
        );
        Ok(id)
    }

    /// All regions in definition order.
    pub fn regions(&self) -> &[VetoRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Human-readable listing of the registered regions.
    pub fn report(&self, detail: ReportDetail) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Number of registered veto systems : {}", self.regions.len());
        for region in &self.regions {
            let _ = writeln!(
                out,
                " Veto system {} : ({}) name={} nDOMs={}",
                region.id,
                region.title,
                region.name,
                region.sensor_count()
            );
            if detail >= ReportDetail::Parameters {
                let _ = writeln!(out, "  Parameters : {}", region.params);
                let _ = writeln!(
                    out,
                    "  Reference : {:?} sensors, SLC {:?}",
                    region.reference.sensor_class, region.reference.coincidence
                );
            }
            if detail == ReportDetail::Sensors {
                let ids: Vec<String> = region.members().map(|id| id.to_string()).collect();
                let _ = writeln!(out, "  Sensors : {}", ids.join(" "));
            }
        }
        out
    }

    fn region_mut(&mut self, name: &str) -> VetoResult<&mut VetoRegion> {
        self.regions
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| diagnose(VetoError::UnknownRegion(name.to_string())))
    }
}
