pub mod gaze;
pub mod frame;
pub mod results;
pub mod tasks;

pub use gaze::{GazeSample, GazeSeries, GazeVector};
pub use frame::RawFrame;
pub use results::{Axis, Direction, NystagmusEvent, AnalysisSummary};
pub use tasks::{AnalysisTask, LiveEvent};
