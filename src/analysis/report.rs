use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::classifier::NystagmusPatternClassifier;
use super::AnalysisConfig;
use crate::error::RecordingError;
use crate::recording::reader::read_series;
use crate::signal::conditioner::{ConditionedSignal, OfflineSignalConditioner};
use crate::signal::velocity::{slopes, SlopeSeries};
use crate::types::{AnalysisSummary, Axis, GazeSeries};

/// Everything produced while analysing one recording on one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub axis: Axis,
    /// 原始时间戳与所选轴的角度
    pub timestamps: Vec<f64>,
    pub raw_values: Vec<f64>,
    pub conditioned: ConditionedSignal,
    /// Indices into `conditioned`
    pub turning_points: Vec<usize>,
    pub slopes: SlopeSeries,
    pub summary: AnalysisSummary,
}

/// Conditioning, turning points, slopes and classification on `axis`.
pub fn analyze_series(series: &GazeSeries, axis: Axis, config: &AnalysisConfig) -> AnalysisReport {
    let timestamps = series.timestamps();
    let raw_values = series.axis_values(axis);

    let conditioner = OfflineSignalConditioner::new(config.conditioning.clone());
    let conditioned = conditioner.condition(&timestamps, &raw_values);

    let classifier = NystagmusPatternClassifier::new(config.classifier.clone(), config.detection.clone());
    let turning_points = classifier.detector().detect(&conditioned.value);
    let slopes = slopes(&conditioned.time, &conditioned.value, &turning_points);
    let summary = classifier.classify_turning_points(&conditioned.value, &conditioned.time, &turning_points, axis);

    info!("Analysis finished: {}", summary.describe());

    AnalysisReport {
        axis,
        timestamps,
        raw_values,
        conditioned,
        turning_points,
        slopes,
        summary,
    }
}

/// Load a recorded CSV and analyse it.
pub fn analyze_recording<P: AsRef<Path>>(
    csv_path: P,
    axis: Axis,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, RecordingError> {
    let series = read_series(csv_path.as_ref())?;
    info!(
        "Loaded {} samples from {} for {} analysis",
        series.len(),
        csv_path.as_ref().display(),
        axis
    );
    Ok(analyze_series(&series, axis, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, GazeSample};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const FS: f64 = 60.0;
    const SLOW_VELOCITY: f64 = 20.0;
    const FAST_VELOCITY: f64 = 35.0;
    const SLOW_TIME: f64 = 0.7;
    const FAST_TIME: f64 = 0.4;

    /// 三角波：慢相上升 20°/s 持续 0.7s，快相下降 35°/s 持续 0.4s，
    /// 从慢相中点（角度 0）开始
    fn nystagmus_angle(t: f64) -> f64 {
        let period = SLOW_TIME + FAST_TIME;
        let amplitude = SLOW_VELOCITY * SLOW_TIME / 2.0;
        let phase = (t + SLOW_TIME / 2.0) % period;
        if phase < SLOW_TIME {
            -amplitude + SLOW_VELOCITY * phase
        } else {
            amplitude - FAST_VELOCITY * (phase - SLOW_TIME)
        }
    }

    fn synthetic_series(cycles: usize, noise: f64, seed: u64) -> GazeSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = (cycles as f64 * (SLOW_TIME + FAST_TIME) * FS).round() as usize;
        let mut series = GazeSeries::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / FS;
            let yaw = nystagmus_angle(t) + rng.random_range(-noise..=noise);
            let pitch = rng.random_range(-noise..=noise);
            series.push(GazeSample::new(t, pitch, yaw));
        }
        series
    }

    #[test]
    fn test_synthetic_nystagmus_end_to_end() {
        let series = synthetic_series(10, 0.05, 42);
        let report = analyze_series(&series, Axis::Horizontal, &AnalysisConfig::default());

        assert_eq!(report.conditioned.len(), series.len() * 10);
        assert!(report.turning_points.windows(2).all(|w| w[0] < w[1]));

        let summary = &report.summary;
        assert!(!summary.events.is_empty());
        assert!(
            (summary.spv_deg_s - SLOW_VELOCITY).abs() < SLOW_VELOCITY * 0.1,
            "SPV {} should be close to {}",
            summary.spv_deg_s,
            SLOW_VELOCITY
        );

        for event in &summary.events {
            assert!(event.velocity_ratio >= 1.4 && event.velocity_ratio <= 8.0);
            assert!(event.fast_velocity_deg_s > event.slow_velocity_deg_s);
        }

        assert_eq!(summary.direction, Direction::Right);
    }

    #[test]
    fn test_direction_follows_phase_order_not_slope_sign() {
        let series = synthetic_series(10, 0.05, 42);
        let mut mirrored = GazeSeries::with_capacity(series.len());
        for sample in series.samples() {
            mirrored.push(GazeSample::new(sample.timestamp, sample.pitch_deg, -sample.yaw_deg));
        }

        let config = AnalysisConfig::default();
        let report = analyze_series(&series, Axis::Horizontal, &config);
        let mirrored_report = analyze_series(&mirrored, Axis::Horizontal, &config);

        // 镜像信号的转折点位置相同，快慢相先后顺序也相同
        assert_eq!(report.turning_points, mirrored_report.turning_points);
        let order = |r: &AnalysisReport| r.summary.events.iter().map(|e| e.fast_phase_first).collect::<Vec<_>>();
        assert_eq!(order(&report), order(&mirrored_report));

        // 方向取决于快相在前的三点组多少，与慢相斜率正负无关
        assert_eq!(mirrored_report.summary.direction, report.summary.direction);
        assert_eq!(mirrored_report.summary.direction, Direction::Right);
    }

    #[test]
    fn test_flat_axis_is_unknown() {
        let series = synthetic_series(10, 0.0, 1);
        let report = analyze_series(&series, Axis::Vertical, &AnalysisConfig::default());
        assert!(report.summary.is_unknown());
        assert_eq!(report.summary.spv_deg_s, 0.0);
        assert_eq!(report.summary.cv_percent, 0.0);
        assert_eq!(report.raw_values, series.pitches());
    }

    #[test]
    fn test_empty_series() {
        let report = analyze_series(&GazeSeries::new(), Axis::Horizontal, &AnalysisConfig::default());
        assert!(report.conditioned.is_empty());
        assert!(report.turning_points.is_empty());
        assert!(report.slopes.slopes.is_empty());
        assert_eq!(report.summary, AnalysisSummary::unknown(Axis::Horizontal));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let series = synthetic_series(3, 0.0, 3);
        let report = analyze_series(&series, Axis::Horizontal, &AnalysisConfig::default());
        let json = serde_json::to_string(&report).expect("serialize report");
        assert!(json.contains("\"axis\":\"horizontal\""));
        let back: AnalysisReport = serde_json::from_str(&json).expect("deserialize report");
        assert_eq!(back.turning_points, report.turning_points);
    }

    #[test]
    fn test_missing_recording_is_error() {
        let path = std::env::temp_dir().join("vnghub_report_missing.csv");
        let result = analyze_recording(&path, Axis::Horizontal, &AnalysisConfig::default());
        assert!(matches!(result, Err(RecordingError::NotFound(_))));
    }
}
