use log::debug;
use serde::{Deserialize, Serialize};

use crate::signal::peaks::{PeakParams, TurningPointDetector};
use crate::signal::velocity::segment_slope;
use crate::types::{AnalysisSummary, Axis, Direction, NystagmusEvent};

/// 斜率绝对值低于该阈值视为退化区段，不计算速度比
const MIN_SLOPE: f64 = 1e-6;

/// Acceptance window for a fast/slow phase pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Both phase durations must lie in `[min_time, max_time]` seconds
    pub min_time: f64,
    pub max_time: f64,
    /// Fast/slow velocity ratio must lie in `[min_ratio, max_ratio]`
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            min_time: 0.3,
            max_time: 0.8,
            min_ratio: 1.4,
            max_ratio: 8.0,
        }
    }
}

/// Segments a conditioned angle signal into fast/slow phase events and
/// summarises them as direction, slow-phase velocity and its variability.
#[derive(Debug, Clone, Default)]
pub struct NystagmusPatternClassifier {
    params: ClassifierParams,
    detector: TurningPointDetector,
}

impl NystagmusPatternClassifier {
    pub fn new(params: ClassifierParams, peaks: PeakParams) -> Self {
        Self {
            params,
            detector: TurningPointDetector::new(peaks),
        }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn detector(&self) -> &TurningPointDetector {
        &self.detector
    }

    pub fn classify(&self, signal: &[f64], time: &[f64], axis: Axis) -> AnalysisSummary {
        let len = signal.len().min(time.len());
        let turning_points = self.detector.detect(&signal[..len]);
        self.classify_turning_points(&signal[..len], &time[..len], &turning_points, axis)
    }

    /// Classify with turning points that were already detected on `signal`.
    pub fn classify_turning_points(
        &self,
        signal: &[f64],
        time: &[f64],
        turning_points: &[usize],
        axis: Axis,
    ) -> AnalysisSummary {
        if turning_points.len() < 3 {
            return AnalysisSummary::unknown(axis);
        }

        let events: Vec<NystagmusEvent> = (1..turning_points.len() - 1)
            .filter_map(|i| self.evaluate_triple(signal, time, turning_points, i))
            .collect();

        debug!(
            "{} turning points, {} accepted nystagmus events",
            turning_points.len(),
            events.len()
        );

        summarize(events, axis)
    }

    /// 以第 i 个转折点为中心的三点组合，判断快相/慢相
    fn evaluate_triple(
        &self,
        signal: &[f64],
        time: &[f64],
        turning_points: &[usize],
        i: usize,
    ) -> Option<NystagmusEvent> {
        let (prev, curr, next) = (turning_points[i - 1], turning_points[i], turning_points[i + 1]);

        let slope1 = segment_slope(time, signal, prev, curr)?;
        let slope2 = segment_slope(time, signal, curr, next)?;
        if slope1.abs() < MIN_SLOPE || slope2.abs() < MIN_SLOPE {
            return None;
        }

        let duration1 = time[curr] - time[prev];
        let duration2 = time[next] - time[curr];

        let mut ratio = (slope1 / slope2).abs();
        let fast_phase_first = ratio > 1.0;

        let (fast_time, slow_time, fast_slope, slow_slope) = if fast_phase_first {
            (duration1, duration2, slope1.abs(), slope2.abs())
        } else {
            ratio = 1.0 / ratio;
            (duration2, duration1, slope2.abs(), slope1.abs())
        };

        let p = &self.params;
        let time_valid = (p.min_time..=p.max_time).contains(&fast_time)
            && (p.min_time..=p.max_time).contains(&slow_time);
        let ratio_valid = (p.min_ratio..=p.max_ratio).contains(&ratio);

        if !(time_valid && ratio_valid) {
            return None;
        }

        Some(NystagmusEvent {
            turning_point_index: i,
            fast_phase_first,
            fast_duration_s: fast_time,
            slow_duration_s: slow_time,
            velocity_ratio: ratio,
            fast_velocity_deg_s: fast_slope,
            slow_velocity_deg_s: slow_slope,
        })
    }
}

/// Direction, SPV and CV over the accepted events.
pub fn summarize(events: Vec<NystagmusEvent>, axis: Axis) -> AnalysisSummary {
    if events.is_empty() {
        return AnalysisSummary::unknown(axis);
    }

    let count = events.len() as f64;
    let signed_mean = events.iter().map(NystagmusEvent::signed_slow_velocity).sum::<f64>() / count;
    let direction = Direction::from_signed_mean(axis, signed_mean);

    let spv = events.iter().map(|e| e.slow_velocity_deg_s).sum::<f64>() / count;
    let variance = events
        .iter()
        .map(|e| (e.slow_velocity_deg_s - spv).powi(2))
        .sum::<f64>()
        / count;
    let cv = if spv > 0.0 { variance.sqrt() / spv * 100.0 } else { 0.0 };

    AnalysisSummary {
        axis,
        direction,
        spv_deg_s: spv,
        cv_percent: cv,
        events,
    }
}
