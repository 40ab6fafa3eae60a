use serde::{Deserialize, Serialize};

/// Slopes between consecutive turning points, in signal units per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlopeSeries {
    /// Midpoint time of each segment
    pub mid_times: Vec<f64>,
    pub slopes: Vec<f64>,
}

/// Slope of the straight segment from index `a` to index `b`, or `None` when
/// the time span is not positive.
pub fn segment_slope(time: &[f64], signal: &[f64], a: usize, b: usize) -> Option<f64> {
    let dt = time[b] - time[a];
    if dt > 0.0 {
        Some((signal[b] - signal[a]) / dt)
    } else {
        None
    }
}

/// 计算相邻转折点之间的斜率（速度），时间差非正的区段被跳过
pub fn slopes(time: &[f64], signal: &[f64], turning_points: &[usize]) -> SlopeSeries {
    let mut series = SlopeSeries::default();

    for pair in turning_points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if let Some(slope) = segment_slope(time, signal, a, b) {
            series.slopes.push(slope);
            series.mid_times.push((time[a] + time[b]) / 2.0);
        }
    }

    series
}
