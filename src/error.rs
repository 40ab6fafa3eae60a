use std::path::PathBuf;

/// 采集管线启动错误，启动阶段一次性上报
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Camera {camera_id} unavailable: {reason}")]
    CameraUnavailable { camera_id: u32, reason: String },
    #[error("Gaze estimator unavailable: {0}")]
    EstimatorUnavailable(String),
    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),
    #[error("Failed to spawn {0} thread")]
    Thread(String),
}

/// Per-cycle inference failure. Both variants fall back to a neutral sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("estimator unavailable: {0}")]
    Unavailable(String),
    #[error("estimator returned invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Missing or invalid CSV header in {0}, expected Timestamp,Pitch,Yaw")]
    MissingHeader(PathBuf),
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Recording not found: {0}")]
    NotFound(PathBuf),
}

impl RecordingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecordingError::Io { path: path.into(), source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Analysis already running for {0}")]
    AlreadyRunning(PathBuf),
    #[error("Analysis queue is full, try again later")]
    QueueFull,
    #[error("Analysis worker disconnected")]
    Disconnected,
    #[error(transparent)]
    Recording(#[from] RecordingError),
}
