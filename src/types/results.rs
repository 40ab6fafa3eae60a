use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which gaze angle a recording is analysed on.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// 水平 (yaw)
    Horizontal,
    /// 垂直 (pitch)
    Vertical,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "horizontal"),
            Axis::Vertical => write!(f, "vertical"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "yaw" | "h" => Ok(Axis::Horizontal),
            "vertical" | "pitch" | "v" => Ok(Axis::Vertical),
            other => Err(format!("Unknown axis: {}", other)),
        }
    }
}

/// Nystagmus direction, named after the sign of the mean slow-phase slope.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    Unknown,
}

impl Direction {
    pub fn from_signed_mean(axis: Axis, signed_mean: f64) -> Self {
        match axis {
            Axis::Horizontal if signed_mean > 0.0 => Direction::Right,
            Axis::Horizontal => Direction::Left,
            Axis::Vertical if signed_mean > 0.0 => Direction::Up,
            Axis::Vertical => Direction::Down,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted fast/slow phase pair built from three consecutive turning points.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NystagmusEvent {
    /// Index of the middle turning point inside the turning-point list
    pub turning_point_index: usize,
    pub fast_phase_first: bool,
    pub fast_duration_s: f64,
    pub slow_duration_s: f64,
    /// Always >= 1: fast velocity over slow velocity
    pub velocity_ratio: f64,
    pub fast_velocity_deg_s: f64,
    pub slow_velocity_deg_s: f64,
}

impl NystagmusEvent {
    /// 慢相速度带方向：快相在前为 +1，否则为 -1
    pub fn signed_slow_velocity(&self) -> f64 {
        if self.fast_phase_first {
            self.slow_velocity_deg_s
        } else {
            -self.slow_velocity_deg_s
        }
    }
}

/// Clinical characterization of one recording on one axis.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalysisSummary {
    pub axis: Axis,
    pub direction: Direction,
    pub spv_deg_s: f64,
    pub cv_percent: f64,
    pub events: Vec<NystagmusEvent>,
}

impl AnalysisSummary {
    pub fn unknown(axis: Axis) -> Self {
        Self {
            axis,
            direction: Direction::Unknown,
            spv_deg_s: 0.0,
            cv_percent: 0.0,
            events: Vec::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.direction == Direction::Unknown
    }

    /// 单行结果描述，用于日志和命令行输出
    pub fn describe(&self) -> String {
        format!(
            "{} | direction: {} | SPV: {:.1}°/s | CV: {:.1}% | events: {}",
            self.axis,
            self.direction.as_str().to_uppercase(),
            self.spv_deg_s,
            self.cv_percent,
            self.events.len()
        )
    }
}
