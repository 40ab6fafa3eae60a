//! Seams to the external vision capabilities: eye-region extraction and the
//! gaze-estimation network. Only the plumbing around them lives here.

use std::fmt;
use std::str::FromStr;

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{EstimateError, PipelineError};
use crate::types::GazeVector;

/// Inference backend requested at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// 由 provider 自行选择可用的加速后端
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComputeDevice::Auto => "auto",
            ComputeDevice::Cpu => "cpu",
            ComputeDevice::Cuda => "cuda",
            ComputeDevice::Metal => "metal",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ComputeDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ComputeDevice::Auto),
            "cpu" => Ok(ComputeDevice::Cpu),
            "cuda" | "gpu" => Ok(ComputeDevice::Cuda),
            "metal" | "mps" => Ok(ComputeDevice::Metal),
            other => Err(format!("Unknown compute device: {}", other)),
        }
    }
}

/// Eye image to 3D gaze direction.
pub trait GazeEstimator: Send {
    fn estimate(&mut self, eye_image: &RgbImage) -> Result<GazeVector, EstimateError>;
}

/// Loads an estimator for a device; called once at pipeline start.
pub trait EstimatorProvider {
    fn load(&self, device: ComputeDevice) -> Result<Box<dyn GazeEstimator>, PipelineError>;
}

/// Frame to eye region of interest, `None` when no eye is found.
pub trait EyeRegionExtractor: Send {
    fn extract(&mut self, frame: &RgbImage) -> Option<RgbImage>;
}

/// Four eye-contour points in normalized image coordinates (0..1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeLandmarks {
    pub outer: (f64, f64),
    pub inner: (f64, f64),
    pub upper: (f64, f64),
    pub lower: (f64, f64),
}

/// Face landmark model producing the eye corners and lids of one eye.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Option<EyeLandmarks>;
}

/// Horizontal padding, as a fraction of the eye width
const PAD_X: f64 = 0.5;
/// Vertical padding, as a fraction of the eye height
const PAD_Y: f64 = 0.8;

/// Pixel rectangle `(x, y, width, height)` around the eye, or `None` if the
/// clamped box is empty.
pub fn eye_region_bounds(width: u32, height: u32, landmarks: &EyeLandmarks) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = (width as f64, height as f64);

    // 横向由内外眼角决定，纵向由上下眼睑决定
    let x_min = landmarks.outer.0.min(landmarks.inner.0) * w;
    let x_max = landmarks.outer.0.max(landmarks.inner.0) * w;
    let y_min = landmarks.upper.1.min(landmarks.lower.1) * h;
    let y_max = landmarks.upper.1.max(landmarks.lower.1) * h;

    let pad_w = (x_max - x_min) * PAD_X;
    let pad_h = (y_max - y_min) * PAD_Y;

    let x1 = (x_min - pad_w).max(0.0) as u32;
    let x2 = (x_max + pad_w).min(w) as u32;
    let y1 = (y_min - pad_h).max(0.0) as u32;
    let y2 = (y_max + pad_h).min(h) as u32;

    if x2 > x1 && y2 > y1 {
        Some((x1, y1, x2 - x1, y2 - y1))
    } else {
        None
    }
}

pub fn crop_eye_region(frame: &RgbImage, landmarks: &EyeLandmarks) -> Option<RgbImage> {
    let (x, y, w, h) = eye_region_bounds(frame.width(), frame.height(), landmarks)?;
    Some(imageops::crop_imm(frame, x, y, w, h).to_image())
}

/// Eye-region extractor backed by a landmark detector.
pub struct LandmarkEyeExtractor<D: LandmarkDetector> {
    detector: D,
}

impl<D: LandmarkDetector> LandmarkEyeExtractor<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: LandmarkDetector> EyeRegionExtractor for LandmarkEyeExtractor<D> {
    fn extract(&mut self, frame: &RgbImage) -> Option<RgbImage> {
        let landmarks = self.detector.detect(frame)?;
        crop_eye_region(frame, &landmarks)
    }
}

/// Run the estimator and convert its vector to `(pitch, yaw)` in degrees.
pub fn estimate_angles(estimator: &mut dyn GazeEstimator, eye_image: &RgbImage) -> Result<(f64, f64), EstimateError> {
    let vector = estimator.estimate(eye_image)?;
    if !vector.is_finite() {
        return Err(EstimateError::InvalidData(format!(
            "non-finite gaze vector ({}, {}, {})",
            vector.x, vector.y, vector.z
        )));
    }
    Ok(vector.to_pitch_yaw_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLandmarks(Option<EyeLandmarks>);

    impl LandmarkDetector for FixedLandmarks {
        fn detect(&mut self, _frame: &RgbImage) -> Option<EyeLandmarks> {
            self.0
        }
    }

    struct VectorEstimator(GazeVector);

    impl GazeEstimator for VectorEstimator {
        fn estimate(&mut self, _eye_image: &RgbImage) -> Result<GazeVector, EstimateError> {
            Ok(self.0)
        }
    }

    fn eye() -> EyeLandmarks {
        EyeLandmarks {
            outer: (0.40, 0.50),
            inner: (0.60, 0.52),
            upper: (0.50, 0.45),
            lower: (0.50, 0.55),
        }
    }

    #[test]
    fn test_bounds_are_padded() {
        // 宽 200px 的眼睛两侧各加 100px，高 100px 的眼睛上下各加 80px
        let bounds = eye_region_bounds(1000, 1000, &eye()).expect("bounds");
        assert_eq!(bounds, (300, 370, 400, 260));
    }

    #[test]
    fn test_bounds_are_clamped_to_image() {
        let landmarks = EyeLandmarks {
            outer: (0.0, 0.0),
            inner: (0.2, 0.0),
            upper: (0.1, 0.9),
            lower: (0.1, 1.0),
        };
        let (x, y, w, h) = eye_region_bounds(100, 100, &landmarks).expect("bounds");
        assert_eq!((x, y), (0, 82));
        assert_eq!(x + w, 30);
        assert_eq!(y + h, 100);
    }

    #[test]
    fn test_degenerate_box_is_none() {
        let point = (0.5, 0.5);
        let landmarks = EyeLandmarks { outer: point, inner: point, upper: point, lower: point };
        assert!(eye_region_bounds(640, 480, &landmarks).is_none());
    }

    #[test]
    fn test_landmark_extractor_crops() {
        let frame = RgbImage::new(1000, 1000);
        let mut extractor = LandmarkEyeExtractor::new(FixedLandmarks(Some(eye())));
        let roi = extractor.extract(&frame).expect("roi");
        assert_eq!(roi.dimensions(), (400, 260));

        let mut blind = LandmarkEyeExtractor::new(FixedLandmarks(None));
        assert!(blind.extract(&frame).is_none());
    }

    #[test]
    fn test_vector_to_degrees() {
        let image = RgbImage::new(2, 2);

        // 正前方：(0, 0, -1)
        let mut estimator = VectorEstimator(GazeVector::new(0.0, 0.0, -1.0));
        let (pitch, yaw) = estimate_angles(&mut estimator, &image).expect("angles");
        assert!(pitch.abs() < 1e-12 && yaw.abs() < 1e-12);

        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut estimator = VectorEstimator(GazeVector::new(-s, 0.0, -s));
        let (_, yaw) = estimate_angles(&mut estimator, &image).expect("angles");
        assert!((yaw - 45.0).abs() < 1e-9);

        let mut estimator = VectorEstimator(GazeVector::new(0.0, -2.0, -1.0));
        let (pitch, _) = estimate_angles(&mut estimator, &image).expect("angles");
        assert!((pitch - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_vector_is_invalid() {
        let mut estimator = VectorEstimator(GazeVector::new(f64::NAN, 0.0, -1.0));
        assert!(matches!(
            estimate_angles(&mut estimator, &RgbImage::new(2, 2)),
            Err(EstimateError::InvalidData(_))
        ));
    }

    #[test]
    fn test_device_parse() {
        assert_eq!("MPS".parse::<ComputeDevice>(), Ok(ComputeDevice::Metal));
        assert_eq!("cpu".parse::<ComputeDevice>(), Ok(ComputeDevice::Cpu));
        assert!("tpu".parse::<ComputeDevice>().is_err());
        assert_eq!(ComputeDevice::default().to_string(), "auto");
    }
}
