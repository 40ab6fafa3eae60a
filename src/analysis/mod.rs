//! Offline nystagmus analysis of recorded gaze series.

pub mod classifier;
pub mod report;
pub mod handler;

use serde::{Deserialize, Serialize};

use crate::signal::conditioner::ConditioningParams;
use crate::signal::peaks::PeakParams;
use classifier::ClassifierParams;

pub use classifier::NystagmusPatternClassifier;
pub use handler::{run_analysis_handler, AnalysisService};
pub use report::{analyze_recording, analyze_series, AnalysisReport};

/// 离线分析的全部参数
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub conditioning: ConditioningParams,
    pub detection: PeakParams,
    pub classifier: ClassifierParams,
}
