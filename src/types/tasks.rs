use std::path::PathBuf;

use crossbeam_channel::Sender;
use image::RgbImage;

use super::{Axis, GazeSample, RawFrame};
use crate::analysis::AnalysisReport;
use crate::error::AnalysisError;

/// Work item for the offline analysis worker thread
pub enum AnalysisTask {
    Analyze {
        csv_path: PathBuf,
        axis: Axis,
        response_sender: Sender<Result<AnalysisReport, AnalysisError>>,
    },
}

/// Messages delivered from the live pipeline to the presentation consumer.
///
/// Frames are moved into the message; the consumer owns them afterwards.
#[derive(Debug)]
pub enum LiveEvent {
    Sample(GazeSample),
    Frame(RawFrame),
    EyeRegion(RgbImage),
    CaptureFps(f64),
    PersistenceFailed(String),
}
