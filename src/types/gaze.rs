use serde::{Deserialize, Serialize};

use super::Axis;

/// One smoothed gaze measurement, produced once per analysis cycle.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GazeSample {
    /// Seconds since the start of the session
    pub timestamp: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

impl GazeSample {
    pub fn new(timestamp: f64, pitch_deg: f64, yaw_deg: f64) -> Self {
        Self { timestamp, pitch_deg, yaw_deg }
    }

    /// 推理失败时的中性样本
    pub fn neutral(timestamp: f64) -> Self {
        Self::new(timestamp, 0.0, 0.0)
    }
}

/// Raw 3D gaze direction returned by the external estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GazeVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GazeVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// 视线向量 -> (pitch, yaw)，单位：度
    pub fn to_pitch_yaw_degrees(&self) -> (f64, f64) {
        let pitch = (-self.y).clamp(-1.0, 1.0).asin();
        let yaw = (-self.x).atan2(-self.z);
        (pitch.to_degrees(), yaw.to_degrees())
    }
}

/// Append-only, timestamp-ordered sequence of gaze samples.
///
/// Samples whose timestamp would go backwards, or is not finite, are
/// rejected, so the series always satisfies the non-decreasing invariant.
#[derive(Debug, Clone, Default)]
pub struct GazeSeries {
    samples: Vec<GazeSample>,
}

impl GazeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity) }
    }

    /// Returns `false` (and leaves the series untouched) if the sample is
    /// older than the last one appended or its timestamp is not finite.
    pub fn push(&mut self, sample: GazeSample) -> bool {
        if !sample.timestamp.is_finite() {
            return false;
        }
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                return false;
            }
        }
        self.samples.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[GazeSample] {
        &self.samples
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn pitches(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.pitch_deg).collect()
    }

    pub fn yaws(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.yaw_deg).collect()
    }

    /// 水平轴取 yaw，垂直轴取 pitch
    pub fn axis_values(&self, axis: Axis) -> Vec<f64> {
        match axis {
            Axis::Horizontal => self.yaws(),
            Axis::Vertical => self.pitches(),
        }
    }
}
