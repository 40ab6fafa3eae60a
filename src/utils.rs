use chrono::{DateTime, Local};

/// 录制文件名使用的本地时间格式
pub const RECORDING_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 文件夹安全的患者姓名：只保留字母、数字和空格，并去掉首尾空白
pub fn sanitize_patient_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Per-patient folder name, `"{id}_{safe_name}"`.
pub fn patient_folder_name(patient_id: &str, name: &str) -> String {
    format!("{}_{}", patient_id, sanitize_patient_name(name))
}

/// Base name of a new recording pair.
pub fn recording_stamp(time: &DateTime<Local>) -> String {
    time.format(RECORDING_STAMP_FORMAT).to_string()
}

/// 将秒数格式化为 MM:SS.mmm，用于录制时长显示
pub fn format_elapsed(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return format!("Invalid duration: {}", seconds);
    }
    let total_ms = (seconds * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;
    let ms = total_ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, secs, ms)
}
