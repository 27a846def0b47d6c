// ─────────────────────────────────────────────────────────────────────
// IceVeto Kernel — Reference Estimator
// ─────────────────────────────────────────────────────────────────────
//! Event reference position and times for the residual computation.
//!
//! Two independent anchors are derived from the interior hits:
//! - the amplitude-weighted centre of gravity with a central hit time;
//! - the event start: the earliest time-ordered run of hits whose summed
//!   amplitude reaches a threshold within a bounded time span.

use veto_types::{CentralValue, PlacedHit, Vec3, VetoConfig};

/// Earliest window satisfying the start criterion, as indices into the
/// time-ordered hit sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartWindow {
    pub first: usize,
    pub last: usize,
    /// Time of the first hit in the window.
    pub time: f64,
}

/// Reference anchors of one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    /// Amplitude-weighted centre of gravity.
    pub position: Vec3,
    /// Central hit time.
    pub time: f64,
    pub total_amplitude: f64,
    /// `None` if no window reached the start threshold.
    pub start: Option<StartWindow>,
    /// Position of the sensor owning the last hit of the start window.
    pub start_position: Vec3,
    /// Number of hits the frame was built from.
    pub hit_count: usize,
}

impl ReferenceFrame {
    /// Start time, or 0 when no start window exists.
    pub fn start_time(&self) -> f64 {
        self.start.map_or(0.0, |w| w.time)
    }

    /// Start window indices, `(-1, -1)` when no start window exists.
    pub fn window_indices(&self) -> (i64, i64) {
        self.start
            .map_or((-1, -1), |w| (w.first as i64, w.last as i64))
    }
}

/// Sum of hit amplitudes.
pub fn total_amplitude(hits: &[PlacedHit]) -> f64 {
    hits.iter().map(|h| h.hit.amplitude).sum()
}

/// Amplitude-weighted centroid of the hit positions.
///
/// Zero vector when the total amplitude is zero.
pub fn center_of_gravity(hits: &[PlacedHit]) -> Vec3 {
    let total = total_amplitude(hits);
    if total == 0.0 {
        return Vec3::ZERO;
    }
    let weighted = hits
        .iter()
        .fold(Vec3::ZERO, |acc, h| acc + h.position * h.hit.amplitude);
    weighted * (1.0 / total)
}

/// Central value of the hit times.
///
/// Returns 0 for an empty collection, or a weighted estimate over zero
/// total amplitude.
pub fn central_time(hits: &[PlacedHit], mode: CentralValue) -> f64 {
    let weight = |h: &PlacedHit| {
        if mode.is_weighted() {
            h.hit.amplitude
        } else {
            1.0
        }
    };
    let mut samples: Vec<(f64, f64)> = hits.iter().map(|h| (h.hit.time, weight(h))).collect();
    match mode {
        CentralValue::WeightedMedian | CentralValue::Median => median(&mut samples),
        CentralValue::WeightedMean | CentralValue::Mean => mean(&samples),
    }
}

fn mean(samples: &[(f64, f64)]) -> f64 {
    let total: f64 = samples.iter().map(|s| s.1).sum();
    if total == 0.0 {
        return 0.0;
    }
    samples.iter().map(|(v, w)| v * w).sum::<f64>() / total
}

/// Weighted median: first value whose cumulative weight reaches half the
/// total. Landing exactly on the half averages with the next value, so
/// unit weights give the ordinary median.
fn median(samples: &mut [(f64, f64)]) -> f64 {
    let total: f64 = samples.iter().map(|s| s.1).sum();
    if samples.is_empty() || total <= 0.0 {
        return 0.0;
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let half = 0.5 * total;
    let tolerance = 1e-12 * total;
    let mut cumulative = 0.0;
    for (i, &(value, w)) in samples.iter().enumerate() {
        cumulative += w;
        if cumulative >= half - tolerance {
            if (cumulative - half).abs() <= tolerance {
                if let Some(&(next, _)) = samples.get(i + 1) {
                    return 0.5 * (value + next);
                }
            }
            return value;
        }
    }
    samples[samples.len() - 1].0
}

/// Hits in ascending time order; ties keep their original order.
pub fn sort_by_time(hits: &[PlacedHit]) -> Vec<PlacedHit> {
    let mut ordered = hits.to_vec();
    ordered.sort_by(|a, b| a.hit.time.total_cmp(&b.hit.time));
    ordered
}

/// Find the earliest window `[first, last]` of time-ordered hits spanning
/// at most `width` whose summed amplitude reaches `threshold`.
///
/// The right edge advances one hit at a time; the left edge follows so
/// the span stays within `width`, but never passes the right edge. The
/// first right edge at which the window sum reaches the threshold wins.
pub fn slide_window(ordered: &[PlacedHit], threshold: f64, width: f64) -> Option<(usize, usize)> {
    let mut first = 0;
    let mut sum = 0.0;
    for (last, h) in ordered.iter().enumerate() {
        sum += h.hit.amplitude;
        while first < last && h.hit.time - ordered[first].hit.time > width {
            sum -= ordered[first].hit.amplitude;
            first += 1;
        }
        if sum >= threshold {
            return Some((first, last));
        }
    }
    None
}

/// Builds [`ReferenceFrame`]s from interior hits.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEstimator {
    window: f64,
    threshold_fraction: f64,
    threshold_floor: f64,
    central_value: CentralValue,
}

impl Default for ReferenceEstimator {
    fn default() -> Self {
        Self::from_config(&VetoConfig::default())
    }
}

impl ReferenceEstimator {
    pub fn new(
        window: f64,
        threshold_fraction: f64,
        threshold_floor: f64,
        central_value: CentralValue,
    ) -> Self {
        Self {
            window,
            threshold_fraction,
            threshold_floor,
            central_value,
        }
    }

    pub fn from_config(config: &VetoConfig) -> Self {
        Self::new(
            config.start_window,
            config.start_threshold_fraction,
            config.start_threshold_floor,
            config.central_value,
        )
    }

    /// Start threshold for a given total amplitude.
    pub fn threshold(&self, total_amplitude: f64) -> f64 {
        (self.threshold_fraction * total_amplitude).max(self.threshold_floor)
    }

    pub fn estimate(&self, hits: &[PlacedHit]) -> ReferenceFrame {
        let finite: Vec<PlacedHit> = hits
            .iter()
            .filter(|h| h.hit.is_finite() && h.position.is_finite())
            .copied()
            .collect();
        if finite.len() != hits.len() {
            log::debug!(
                "reference estimation: skipped {} non-finite hits",
                hits.len() - finite.len()
            );
        }

        let total = total_amplitude(&finite);
        let ordered = sort_by_time(&finite);
        let start = slide_window(&ordered, self.threshold(total), self.window).map(
            |(first, last)| StartWindow {
                first,
                last,
                time: ordered[first].hit.time,
            },
        );
        let start_position = start.map_or(Vec3::ZERO, |w| ordered[w.last].position);

        ReferenceFrame {
            position: center_of_gravity(&finite),
            time: central_time(&finite, self.central_value),
            total_amplitude: total,
            start,
            start_position,
            hit_count: finite.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use veto_types::{Hit, SensorId};

    use super::*;

    fn placed(module: i32, amplitude: f64, time: f64, position: Vec3) -> PlacedHit {
        PlacedHit::new(Hit::new(SensorId::new(1, module), amplitude, time), position)
    }

    fn train(amplitudes: &[f64], times: &[f64]) -> Vec<PlacedHit> {
        amplitudes
            .iter()
            .zip(times)
            .enumerate()
            .map(|(i, (&a, &t))| placed(i as i32 + 1, a, t, Vec3::new(0.0, 0.0, i as f64)))
            .collect()
    }

    #[test]
    fn test_centroid_weighted() {
        let hits = vec![
            placed(1, 1.0, 0.0, Vec3::new(0.0, 0.0, 0.0)),
            placed(2, 3.0, 0.0, Vec3::new(10.0, 0.0, 0.0)),
        ];
        let cog = center_of_gravity(&hits);
        assert!((cog.x - 7.5).abs() < 1e-12);
        assert_eq!(cog.y, 0.0);
        assert_eq!(cog.z, 0.0);
    }

    #[test]
    fn test_centroid_zero_amplitude() {
        let hits = vec![placed(1, 0.0, 0.0, Vec3::new(5.0, 5.0, 5.0))];
        assert_eq!(center_of_gravity(&hits), Vec3::ZERO);
        assert_eq!(center_of_gravity(&[]), Vec3::ZERO);
    }

    #[test]
    fn test_slide_window_basic() {
        let hits = train(&[1.0; 6], &[0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(slide_window(&hits, 3.0, 25.0), Some((0, 2)));
    }

    #[test]
    fn test_slide_window_left_edge_contracts() {
        // Early isolated hit, dense cluster later.
        let hits = train(&[1.0, 1.0, 1.0, 1.0], &[0.0, 100.0, 105.0, 110.0]);
        assert_eq!(slide_window(&hits, 3.0, 25.0), Some((1, 3)));
    }

    #[test]
    fn test_slide_window_unreachable() {
        let hits = train(&[1.0, 1.0], &[0.0, 10.0]);
        assert_eq!(slide_window(&hits, 3.0, 25.0), None);
        assert_eq!(slide_window(&[], 3.0, 25.0), None);
    }

    #[test]
    fn test_slide_window_non_positive_width() {
        let hits = train(&[1.0, 1.0, 2.0], &[0.0, 10.0, 20.0]);
        assert_eq!(slide_window(&hits, 2.0, -1.0), Some((2, 2)));
        assert_eq!(slide_window(&hits, 3.0, 0.0), None);
    }

    #[test]
    fn test_slide_window_single_bright_hit() {
        let hits = train(&[0.5, 8.0], &[0.0, 5000.0]);
        assert_eq!(slide_window(&hits, 3.0, 3000.0), Some((1, 1)));
    }

    #[test]
    fn test_sort_is_stable() {
        let hits = train(&[1.0, 2.0, 3.0], &[5.0, 1.0, 5.0]);
        let ordered = sort_by_time(&hits);
        let amps: Vec<f64> = ordered.iter().map(|h| h.hit.amplitude).collect();
        assert_eq!(amps, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_central_values() {
        let hits = train(&[1.0, 1.0, 10.0], &[0.0, 10.0, 100.0]);
        assert_eq!(central_time(&hits, CentralValue::Median), 10.0);
        assert_eq!(central_time(&hits, CentralValue::WeightedMedian), 100.0);
        assert!((central_time(&hits, CentralValue::Mean) - 110.0 / 3.0).abs() < 1e-9);
        assert!((central_time(&hits, CentralValue::WeightedMean) - 1010.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_median_even_count_averages() {
        let hits = train(&[1.0; 4], &[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(central_time(&hits, CentralValue::Median), 15.0);
        assert_eq!(central_time(&hits, CentralValue::WeightedMedian), 15.0);
    }

    #[test]
    fn test_central_value_empty() {
        assert_eq!(central_time(&[], CentralValue::WeightedMedian), 0.0);
        let dark = train(&[0.0, 0.0], &[3.0, 4.0]);
        assert_eq!(central_time(&dark, CentralValue::WeightedMean), 0.0);
    }

    #[test]
    fn test_estimate_frame() {
        let estimator = ReferenceEstimator::new(25.0, 0.05, 3.0, CentralValue::WeightedMedian);
        let hits = train(&[1.0; 6], &[50.0, 40.0, 30.0, 20.0, 10.0, 0.0]);
        let frame = estimator.estimate(&hits);
        assert_eq!(frame.total_amplitude, 6.0);
        assert_eq!(frame.hit_count, 6);
        assert_eq!(frame.window_indices(), (0, 2));
        assert_eq!(frame.start_time(), 0.0);
        // Third earliest hit (t=20) is input index 3, sitting at z=3.
        assert_eq!(frame.start_position, Vec3::new(0.0, 0.0, 3.0));
        assert!((frame.position.z - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_without_start() {
        let frame = ReferenceEstimator::default().estimate(&[]);
        assert_eq!(frame.start, None);
        assert_eq!(frame.window_indices(), (-1, -1));
        assert_eq!(frame.start_time(), 0.0);
        assert_eq!(frame.start_position, Vec3::ZERO);
        assert_eq!(frame.position, Vec3::ZERO);
    }

    #[test]
    fn test_estimate_skips_non_finite() {
        let mut hits = train(&[2.0, 2.0], &[0.0, 1.0]);
        hits.push(placed(9, f64::NAN, 0.5, Vec3::ZERO));
        let frame = ReferenceEstimator::default().estimate(&hits);
        assert_eq!(frame.hit_count, 2);
        assert_eq!(frame.total_amplitude, 4.0);
        assert!(frame.position.is_finite());
    }

    #[test]
    fn test_estimate_negative_window() {
        let estimator = ReferenceEstimator::new(-1.0, 0.0, 0.5, CentralValue::Median);
        let frame = estimator.estimate(&train(&[1.0], &[7.0]));
        assert_eq!(frame.window_indices(), (0, 0));
        assert_eq!(frame.start_time(), 7.0);

        let strict = ReferenceEstimator::new(-1.0, 0.0, 2.0, CentralValue::Median);
        assert_eq!(strict.estimate(&train(&[1.0, 1.0], &[0.0, 10.0])).start, None);
    }

    #[test]
    fn test_threshold_floor() {
        let estimator = ReferenceEstimator::default();
        assert_eq!(estimator.threshold(0.0), 3.0);
        assert!((estimator.threshold(200.0) - 10.0).abs() < 1e-12);
    }
}
