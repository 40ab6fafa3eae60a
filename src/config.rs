use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::acquisition::smoothing::SmoothingConfig;
use crate::acquisition::estimator::ComputeDevice;
use crate::analysis::classifier::ClassifierParams;
use crate::analysis::AnalysisConfig;
use crate::signal::conditioner::ConditioningParams;
use crate::signal::peaks::PeakParams;

/// 应用配置管理模块
/// 集中管理所有配置项，提供默认值和配置验证

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub acquisition: AcquisitionConfig,
    pub smoothing: SmoothingConfig,
    pub recording: RecordingConfig,
    pub conditioning: ConditioningParams,
    pub detection: PeakParams,
    pub classifier: ClassifierParams,
    pub channels: ChannelConfig,
}

/// 摄像头目标配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub camera_id: u32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 枚举摄像头时最多尝试的设备号
    pub max_probe: u32,
}

/// 采集/推理循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// 推理线程邮箱为空时的轮询间隔
    pub poll_interval_ms: u64,
    /// 每采集多少帧上报一次实测帧率
    pub fps_report_interval: u64,
    pub device: ComputeDevice,
    /// 是否把原始帧转交给显示端
    pub forward_frames: bool,
}

/// 录制文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub data_root: String,
    pub video_extension: String,
    pub default_test_type: String,
    pub auto_create_dir: bool,
}

/// 通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub live_event_capacity: usize,
    pub persistence_capacity: usize,
    pub analysis_task_capacity: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            width: 1920,
            height: 1080,
            fps: 120.0,
            max_probe: 5,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            fps_report_interval: 30,
            device: ComputeDevice::Auto,
            forward_frames: true,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            data_root: "Data".to_string(),
            video_extension: "mkv".to_string(),
            default_test_type: "Spontaneous".to_string(),
            auto_create_dir: true,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            live_event_capacity: 256,
            persistence_capacity: 1024,
            analysis_task_capacity: 8,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content)
            .map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 || self.camera.fps <= 0.0 {
            return Err(ConfigError::ValidationError("Camera resolution and fps must be positive".to_string()));
        }

        if self.acquisition.fps_report_interval == 0 {
            return Err(ConfigError::ValidationError("FPS report interval must be positive".to_string()));
        }

        if !(self.smoothing.alpha > 0.0 && self.smoothing.alpha <= 1.0) {
            return Err(ConfigError::ValidationError("Smoothing alpha must be in (0, 1]".to_string()));
        }

        if self.smoothing.history_capacity < 3 {
            return Err(ConfigError::ValidationError("Smoothing history must hold at least 3 samples".to_string()));
        }

        for (name, filter) in [("highpass", &self.conditioning.highpass), ("lowpass", &self.conditioning.lowpass)] {
            if filter.cutoff <= 0.0 || filter.fs <= 0.0 || filter.order == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} cutoff, fs and order must be positive", name
                )));
            }
        }

        if self.conditioning.interpolate_ratio < 1.0 {
            return Err(ConfigError::ValidationError("Interpolate ratio must be at least 1".to_string()));
        }

        if self.detection.prominence < 0.0 || self.detection.distance == 0 {
            return Err(ConfigError::ValidationError("Peak prominence must be >= 0 and distance >= 1".to_string()));
        }

        if self.classifier.min_time > self.classifier.max_time {
            return Err(ConfigError::ValidationError("Classifier min_time must not exceed max_time".to_string()));
        }

        if self.classifier.min_ratio > self.classifier.max_ratio {
            return Err(ConfigError::ValidationError("Classifier min_ratio must not exceed max_ratio".to_string()));
        }

        if self.channels.live_event_capacity == 0
            || self.channels.persistence_capacity == 0
            || self.channels.analysis_task_capacity == 0
        {
            return Err(ConfigError::ValidationError("Channel capacities must be positive".to_string()));
        }

        Ok(())
    }

    /// 离线分析参数
    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            conditioning: self.conditioning.clone(),
            detection: self.detection.clone(),
            classifier: self.classifier.clone(),
        }
    }

    /// 获取数据根目录
    pub fn get_data_root(&self) -> PathBuf {
        PathBuf::from(&self.recording.data_root)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config_path.as_deref()
    }

    /// 保存配置
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            self.config.save_to_file(path)?;
        }
        Ok(())
    }

    /// 保存配置到指定文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.config.save_to_file(path)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
