use log::debug;
use serde::{Deserialize, Serialize};

use super::butterworth::{zero_phase_filter, FilterKind};
use super::resample::{linspace, resample};

/// Butterworth stage parameters: cutoff and sampling rate in Hz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub cutoff: f64,
    pub fs: f64,
    pub order: usize,
}

impl FilterSpec {
    pub fn new(cutoff: f64, fs: f64, order: usize) -> Self {
        Self { cutoff, fs, order }
    }
}

/// 预处理参数：高通 -> 低通 -> 插值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningParams {
    pub highpass: FilterSpec,
    pub lowpass: FilterSpec,
    pub interpolate_ratio: f64,
}

impl Default for ConditioningParams {
    fn default() -> Self {
        Self {
            highpass: FilterSpec::new(0.1, 60.0, 5),
            lowpass: FilterSpec::new(6.0, 60.0, 5),
            interpolate_ratio: 10.0,
        }
    }
}

/// Filtered, upsampled signal on a uniform time axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionedSignal {
    pub time: Vec<f64>,
    pub value: Vec<f64>,
}

impl ConditionedSignal {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Offline conditioning of a recorded angle series: drift removal, denoising
/// and resampling onto a finer uniform grid.
#[derive(Debug, Clone, Default)]
pub struct OfflineSignalConditioner {
    params: ConditioningParams,
}

impl OfflineSignalConditioner {
    pub fn new(params: ConditioningParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConditioningParams {
        &self.params
    }

    pub fn condition(&self, timestamps: &[f64], values: &[f64]) -> ConditionedSignal {
        condition(timestamps, values, &self.params)
    }
}

/// Condition `values` sampled at `timestamps`.
///
/// Mismatched inputs are truncated to the shorter length; empty input gives an
/// empty signal. The output holds `floor(len * interpolate_ratio)` points.
pub fn condition(timestamps: &[f64], values: &[f64], params: &ConditioningParams) -> ConditionedSignal {
    let len = timestamps.len().min(values.len());
    if len == 0 {
        return ConditionedSignal::default();
    }
    let timestamps = &timestamps[..len];
    let values = &values[..len];

    // 1. 高通滤波（去漂移）
    let hp = &params.highpass;
    let filtered = zero_phase_filter(values, hp.cutoff, hp.fs, hp.order, FilterKind::HighPass);

    // 2. 低通滤波（去噪）
    let lp = &params.lowpass;
    let filtered = zero_phase_filter(&filtered, lp.cutoff, lp.fs, lp.order, FilterKind::LowPass);

    // 3. 插值
    let target_len = (len as f64 * params.interpolate_ratio) as usize;
    let value = resample(&filtered, target_len);

    // 4. 新的均匀时间轴
    let time = linspace(timestamps[0], timestamps[len - 1], value.len());

    debug!(
        "Conditioned {} samples into {} points over [{:.3}, {:.3}]s",
        len,
        value.len(),
        timestamps[0],
        timestamps[len - 1]
    );

    ConditionedSignal { time, value }
}
