//! Offline signal conditioning and feature extraction for recorded gaze angles.

pub mod butterworth;
pub mod resample;
pub mod conditioner;
pub mod peaks;
pub mod velocity;

pub use conditioner::{condition, ConditionedSignal, ConditioningParams, FilterSpec, OfflineSignalConditioner};
pub use peaks::{find_turning_points, PeakParams, TurningPointDetector};
pub use velocity::{segment_slope, slopes, SlopeSeries};
