use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of recent raw samples the median is taken over
const MEDIAN_WINDOW: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// EMA weight of the newest median
    pub alpha: f64,
    /// 原始样本历史长度
    pub history_capacity: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            history_capacity: 15,
        }
    }
}

/// Low-latency smoothing for live gaze angles: a 3-sample median removes
/// single-frame spikes, then an exponential moving average seeded by the
/// first median.
#[derive(Debug, Clone)]
pub struct OnlineSmoothingFilter {
    alpha: f64,
    capacity: usize,
    history: VecDeque<(f64, f64)>,
    last_smoothed: Option<(f64, f64)>,
}

impl OnlineSmoothingFilter {
    pub fn new(config: &SmoothingConfig) -> Self {
        let capacity = config.history_capacity.max(MEDIAN_WINDOW);
        Self {
            alpha: config.alpha,
            capacity,
            history: VecDeque::with_capacity(capacity),
            last_smoothed: None,
        }
    }

    pub fn process(&mut self, pitch: f64, yaw: f64) -> (f64, f64) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((pitch, yaw));

        if self.history.len() < MEDIAN_WINDOW {
            return (pitch, yaw);
        }

        let recent = self.history.iter().rev().take(MEDIAN_WINDOW);
        let (pitches, yaws): (Vec<f64>, Vec<f64>) = recent.copied().unzip();
        let median = (median3(&pitches), median3(&yaws));

        let previous = self.last_smoothed.unwrap_or(median);
        let smoothed = (
            self.alpha * median.0 + (1.0 - self.alpha) * previous.0,
            self.alpha * median.1 + (1.0 - self.alpha) * previous.1,
        );
        self.last_smoothed = Some(smoothed);
        smoothed
    }

    /// 新的采集会话开始时清空状态
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_smoothed = None;
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for OnlineSmoothingFilter {
    fn default() -> Self {
        Self::new(&SmoothingConfig::default())
    }
}

fn median3(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_two_samples_pass_through() {
        let mut filter = OnlineSmoothingFilter::default();
        assert_eq!(filter.process(1.0, -4.0), (1.0, -4.0));
        assert_eq!(filter.process(5.0, 7.0), (5.0, 7.0));
    }

    #[test]
    fn test_seeded_ema_sequence() {
        let mut filter = OnlineSmoothingFilter::default();
        let pitches = [1.0, 5.0, 2.0, 2.0, 2.0];
        let outputs: Vec<(f64, f64)> = pitches.iter().map(|&p| filter.process(p, 0.0)).collect();

        assert_eq!(outputs[0].0, 1.0);
        assert_eq!(outputs[1].0, 5.0);

        // 第三个样本：中值 median(1,5,2)=2，以中值作为初值 -> 2
        let y2 = 2.0;
        assert!((outputs[2].0 - y2).abs() < 1e-12);
        // median(5,2,2)=2
        let y3 = 0.3 * 2.0 + 0.7 * y2;
        assert!((outputs[3].0 - y3).abs() < 1e-12);
        let y4 = 0.3 * 2.0 + 0.7 * y3;
        assert!((outputs[4].0 - y4).abs() < 1e-12);

        assert!(outputs.iter().all(|(_, yaw)| *yaw == 0.0));
    }

    #[test]
    fn test_spike_is_removed() {
        let mut filter = OnlineSmoothingFilter::default();
        for _ in 0..5 {
            filter.process(10.0, 10.0);
        }
        let (pitch, yaw) = filter.process(90.0, -90.0);
        assert!((pitch - 10.0).abs() < 1e-12);
        assert!((yaw - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_converges_to_step() {
        let mut filter = OnlineSmoothingFilter::default();
        let mut last = (0.0, 0.0);
        for _ in 0..3 {
            last = filter.process(0.0, 0.0);
        }
        assert_eq!(last, (0.0, 0.0));
        for _ in 0..60 {
            last = filter.process(20.0, -20.0);
        }
        assert!((last.0 - 20.0).abs() < 1e-6);
        assert!((last.1 + 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_history_is_bounded_and_reset() {
        let mut filter = OnlineSmoothingFilter::new(&SmoothingConfig {
            alpha: 0.5,
            history_capacity: 4,
        });
        for i in 0..20 {
            filter.process(i as f64, 0.0);
        }
        assert_eq!(filter.history_len(), 4);

        filter.reset();
        assert_eq!(filter.history_len(), 0);
        assert_eq!(filter.process(42.0, 1.0), (42.0, 1.0));
    }
}
