//! Real-time gaze acquisition: camera capture, single-slot frame handoff,
//! inference and online smoothing.

pub mod mailbox;
pub mod smoothing;
pub mod estimator;
pub mod capture;
pub mod analysis;
pub mod pipeline;

pub use capture::{enumerate_cameras, CameraProvider, FpsMeter, FrameSource, PreviewSession, VideoSink};
pub use estimator::{
    crop_eye_region, ComputeDevice, EstimatorProvider, EyeLandmarks, EyeRegionExtractor, GazeEstimator,
    LandmarkDetector, LandmarkEyeExtractor,
};
pub use mailbox::FrameMailbox;
pub use pipeline::{AcquisitionPipeline, PipelineOutputs, PipelineStats};
pub use smoothing::{OnlineSmoothingFilter, SmoothingConfig};
