// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Standard IC86 Veto Presets
// ─────────────────────────────────────────────────────────────────────
//! Pre-defined veto regions for the IC86 detector.
//!
//! Each preset is a membership recipe (a sequence of add/remove range
//! operations) plus its own parameter defaults. Layout data:
//!   - strings 1-86, in-ice modules 1-60, IceTop tank modules 61-64
//!   - outer strings: 1-7, 13-14, 21-22, 30-31, 40-41, 50-51, 59-60,
//!     67-68, 72-78
//!   - dust layer: modules 39-43

use std::str::FromStr;

use veto_types::{CoincidencePolicy, SensorClass, VetoError, VetoParams};

use crate::registry::{ReferencePolicy, SensorRange};

/// One step of a membership recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Add(SensorRange),
    Remove(SensorRange),
}

const ICETOP: SensorRange = SensorRange::new(1, 86, 61, 64);
const UPPER: SensorRange = SensorRange::new(1, 79, 1, 6);
const BOTTOM: SensorRange = SensorRange::new(1, 79, 60, 60);
const DUST_LAYER: SensorRange = SensorRange::new(1, 79, 39, 43);

/// Blocks of outer strings, full in-ice depth.
const OUTER_STRINGS: [(i32, i32); 9] = [
    (1, 7),
    (13, 14),
    (21, 22),
    (30, 31),
    (40, 41),
    (50, 51),
    (59, 60),
    (67, 68),
    (72, 78),
];

const fn add(string: i32, module_lo: i32, module_hi: i32) -> MembershipOp {
    MembershipOp::Add(SensorRange::new(string, string, module_lo, module_hi))
}

const fn remove(string: i32, module: i32) -> MembershipOp {
    MembershipOp::Remove(SensorRange::single(string, module))
}

/// Sensor-level corrections turning the Start86 layout into HESE86.
const HESE_ADJUSTMENTS: &[MembershipOp] = &[
    remove(8, 43),
    remove(10, 43),
    remove(11, 43),
    remove(12, 43),
    remove(15, 60),
    remove(16, 43),
    remove(18, 43),
    remove(19, 43),
    remove(20, 43),
    remove(24, 60),
    remove(25, 60),
    remove(26, 43),
    add(27, 38, 38),
    remove(27, 43),
    remove(28, 43),
    remove(29, 60),
    add(34, 7, 8),
    remove(34, 39),
    add(34, 44, 44),
    remove(34, 60),
    remove(35, 60),
    add(37, 7, 7),
    remove(37, 60),
    add(38, 38, 38),
    remove(38, 43),
    remove(39, 60),
    remove(42, 60),
    remove(45, 43),
    remove(46, 60),
    remove(47, 60),
    add(49, 7, 7),
    remove(49, 60),
    remove(52, 43),
    remove(55, 60),
    remove(56, 60),
    add(57, 7, 7),
    remove(57, 60),
    remove(58, 43),
    remove(63, 43),
    add(64, 7, 8),
    remove(64, 39),
    add(64, 44, 44),
    remove(64, 60),
    add(65, 7, 7),
    remove(65, 39),
    remove(65, 60),
    add(66, 7, 7),
    remove(66, 39),
    remove(66, 60),
    remove(71, 43),
];

/// The standard veto regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Down-going charged particles seen by the IceTop tanks.
    IceTop86,
    /// Down-going charged particles seen by the top 6 in-ice modules.
    Upper86,
    /// Particles sneaking in through the dust layer.
    DustLayer86,
    /// Light from below, from showers missing the detector.
    Bottom86,
    /// Particles entering through the outer strings.
    Sides86,
    /// The veto layout used for the IC86 HESE selection.
    Hese86,
    /// Starting-event veto: Upper + DustLayer + Bottom + Sides.
    Start86,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Self::IceTop86,
        Self::Upper86,
        Self::DustLayer86,
        Self::Bottom86,
        Self::Sides86,
        Self::Hese86,
        Self::Start86,
    ];

    /// Preset name; also the name of the region it creates.
    pub fn name(self) -> &'static str {
        match self {
            Self::IceTop86 => "IceTop86",
            Self::Upper86 => "Upper86",
            Self::DustLayer86 => "DustLayer86",
            Self::Bottom86 => "Bottom86",
            Self::Sides86 => "Sides86",
            Self::Hese86 => "HESE86",
            Self::Start86 => "Start86",
        }
    }

    /// Parameter defaults of this preset.
    pub fn defaults(self) -> VetoParams {
        let (qtot, ndom) = match self {
            Self::Hese86 => (3.0, 3),
            _ => (0.0, 1),
        };
        let allow_slc = !matches!(self, Self::Hese86 | Self::IceTop86);
        VetoParams::new(qtot, 0.0, ndom, 1, allow_slc, 1.0, 0.0)
    }

    /// Hits used for the reference position and time.
    pub fn reference_policy(self) -> ReferencePolicy {
        match self {
            Self::Hese86 => ReferencePolicy {
                sensor_class: SensorClass::InIceStandard,
                coincidence: CoincidencePolicy::Exclude,
            },
            _ => ReferencePolicy::default(),
        }
    }

    /// Membership recipe, applied in order to an empty region.
    pub fn recipe(self) -> Vec<MembershipOp> {
        let mut ops = Vec::new();
        let start_like = matches!(self, Self::Start86 | Self::Hese86);

        if self == Self::IceTop86 {
            ops.push(MembershipOp::Add(ICETOP));
        }
        if self == Self::Upper86 || start_like {
            ops.push(MembershipOp::Add(UPPER));
        }
        if self == Self::Bottom86 || start_like {
            ops.push(MembershipOp::Add(BOTTOM));
        }
        if self == Self::DustLayer86 || start_like {
            ops.push(MembershipOp::Add(DUST_LAYER));
        }
        if self == Self::Sides86 || start_like {
            ops.extend(
                OUTER_STRINGS
                    .iter()
                    .map(|&(lo, hi)| MembershipOp::Add(SensorRange::new(lo, hi, 1, 60))),
            );
        }
        if self == Self::Hese86 {
            ops.extend_from_slice(HESE_ADJUSTMENTS);
        }
        ops
    }

    /// Apply caller overrides on top of this preset's defaults.
    pub fn resolve(self, overrides: &PresetOverrides) -> VetoParams {
        let d = self.defaults();
        let (tres_min, tres_max) = overrides.time_residual.unwrap_or((1.0, 0.0));
        VetoParams::new(
            overrides.min_total_amplitude.unwrap_or(d.min_total_amplitude()),
            overrides.min_hit_amplitude.unwrap_or(d.min_hit_amplitude()),
            overrides
                .min_firing_sensors
                .unwrap_or(d.min_firing_sensors() as i64),
            overrides.min_hits.unwrap_or(d.min_hits() as i64),
            overrides.allow_slc.unwrap_or(d.allow_slc()),
            tres_min,
            tres_max,
        )
    }
}

impl FromStr for Preset {
    type Err = VetoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| VetoError::UnknownPreset(s.to_string()))
    }
}

/// Caller overrides for preset activation. `None` keeps the preset's
/// own default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresetOverrides {
    pub min_total_amplitude: Option<f64>,
    pub min_hit_amplitude: Option<f64>,
    pub min_firing_sensors: Option<i64>,
    pub min_hits: Option<i64>,
    pub allow_slc: Option<bool>,
    /// `(min, max)` time-residual window; `None` disables the filter.
    pub time_residual: Option<(f64, f64)>,
}

impl PresetOverrides {
    /// Build overrides from sentinel-style arguments.
    ///
    /// Negative values mean "use the preset default"; `tres_min ==
    /// tres_max` means "no time-residual filtering".
    pub fn from_raw(
        min_total_amplitude: f64,
        min_hit_amplitude: f64,
        min_firing_sensors: i64,
        min_hits: i64,
        allow_slc: i64,
        tres_min: f64,
        tres_max: f64,
    ) -> Self {
        let non_negative = |v: f64| (v >= 0.0).then_some(v);
        Self {
            min_total_amplitude: non_negative(min_total_amplitude),
            min_hit_amplitude: non_negative(min_hit_amplitude),
            min_firing_sensors: (min_firing_sensors >= 0).then_some(min_firing_sensors),
            min_hits: (min_hits >= 0).then_some(min_hits),
            allow_slc: (allow_slc >= 0).then_some(allow_slc != 0),
            time_residual: (tres_min != tres_max).then_some((tres_min, tres_max)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use veto_types::SensorId;

    use super::*;

    fn membership(preset: Preset) -> BTreeSet<SensorId> {
        let mut set = BTreeSet::new();
        for op in preset.recipe() {
            match op {
                MembershipOp::Add(r) => set.extend(r.sensor_ids()),
                MembershipOp::Remove(r) => {
                    for id in r.sensor_ids() {
                        set.remove(&id);
                    }
                }
            }
        }
        set
    }

    #[test]
    fn test_names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(preset.name().parse::<Preset>(), Ok(preset));
        }
        assert!("Hese86".parse::<Preset>().is_err());
    }

    #[test]
    fn test_recipes_are_valid_ranges() {
        for preset in Preset::ALL {
            for op in preset.recipe() {
                let (MembershipOp::Add(r) | MembershipOp::Remove(r)) = op;
                assert!(r.validate().is_ok(), "{preset:?}: {r:?}");
            }
        }
    }

    #[test]
    fn test_icetop_membership() {
        let set = membership(Preset::IceTop86);
        assert_eq!(set.len(), 86 * 4);
        assert!(set.contains(&SensorId::new(86, 64)));
        assert!(!set.contains(&SensorId::new(1, 60)));
    }

    #[test]
    fn test_start_is_union_of_parts() {
        let start = membership(Preset::Start86);
        let union: BTreeSet<SensorId> = [
            Preset::Upper86,
            Preset::DustLayer86,
            Preset::Bottom86,
            Preset::Sides86,
        ]
        .into_iter()
        .flat_map(membership)
        .collect();
        assert_eq!(start, union);
    }

    #[test]
    fn test_hese_adjustments() {
        let hese = membership(Preset::Hese86);
        let start = membership(Preset::Start86);
        assert!(start.contains(&SensorId::new(8, 43)));
        assert!(!hese.contains(&SensorId::new(8, 43)));
        assert!(!start.contains(&SensorId::new(34, 44)));
        assert!(hese.contains(&SensorId::new(34, 44)));
        assert!(hese.contains(&SensorId::new(27, 38)));
        assert!(!hese.contains(&SensorId::new(66, 60)));
    }

    #[test]
    fn test_preset_defaults_differ() {
        let common = Preset::Start86.defaults();
        let hese = Preset::Hese86.defaults();
        assert_eq!(common.min_total_amplitude(), 0.0);
        assert_eq!(common.min_firing_sensors(), 1);
        assert!(common.allow_slc());
        assert_eq!(hese.min_total_amplitude(), 3.0);
        assert_eq!(hese.min_firing_sensors(), 3);
        assert!(!hese.allow_slc());
        assert!(!Preset::IceTop86.defaults().allow_slc());
        assert!(!common.residual_filtering());
    }

    #[test]
    fn test_unset_sentinels_use_preset_defaults() {
        let overrides = PresetOverrides::from_raw(-1.0, -1.0, -1, -1, -1, 0.0, 0.0);
        assert_eq!(overrides, PresetOverrides::default());
        assert_eq!(Preset::Hese86.resolve(&overrides), Preset::Hese86.defaults());
        assert_eq!(Preset::Upper86.resolve(&overrides), Preset::Upper86.defaults());
    }

    #[test]
    fn test_explicit_overrides_win() {
        let overrides = PresetOverrides::from_raw(10.0, 0.25, 2, 4, 1, -100.0, 200.0);
        let params = Preset::Hese86.resolve(&overrides);
        assert_eq!(params.min_total_amplitude(), 10.0);
        assert_eq!(params.min_hit_amplitude(), 0.25);
        assert_eq!(params.min_firing_sensors(), 2);
        assert_eq!(params.min_hits(), 4);
        assert!(params.allow_slc());
        assert_eq!(params.min_time_residual(), -100.0);
        assert_eq!(params.max_time_residual(), 200.0);
    }

    #[test]
    fn test_equal_residual_bounds_disable_filter() {
        let overrides = PresetOverrides::from_raw(-1.0, -1.0, -1, -1, -1, 5.0, 5.0);
        assert!(!Preset::Sides86.resolve(&overrides).residual_filtering());
    }

    #[test]
    fn test_zero_count_override_clamped() {
        let overrides = PresetOverrides::from_raw(-1.0, -1.0, 0, 0, -1, 0.0, 0.0);
        let params = Preset::Hese86.resolve(&overrides);
        assert_eq!(params.min_firing_sensors(), 1);
        assert_eq!(params.min_hits(), 1);
    }

    #[test]
    fn test_hese_reference_policy() {
        assert_eq!(
            Preset::Hese86.reference_policy().sensor_class,
            SensorClass::InIceStandard
        );
        assert_eq!(
            Preset::Upper86.reference_policy().sensor_class,
            SensorClass::InIce
        );
    }
}
