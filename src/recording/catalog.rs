//! On-disk layout of recordings.
//!
//! ```text
//! <root>/<patient_id>_<safe_name>/<test_type>/<YYYYmmdd_HHMMSS>.csv
//!                                            /<YYYYmmdd_HHMMSS>.<video_extension>
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{info, warn};

use crate::config::RecordingConfig;
use crate::error::RecordingError;
use crate::utils::{patient_folder_name, recording_stamp};

/// Test type reported for CSVs stored directly in the patient folder
pub const UNKNOWN_TEST_TYPE: &str = "Unknown";

/// 未指定检查类型时使用的子目录
pub const DEFAULT_TEST_TYPE: &str = "Spontaneous";

/// Paths of a new recording pair sharing one stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    pub stem: String,
    pub csv: PathBuf,
    pub video: PathBuf,
}

/// One discovered recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub csv_path: PathBuf,
    pub test_type: String,
    pub stem: String,
}

#[derive(Debug, Clone)]
pub struct RecordingCatalog {
    root: PathBuf,
    video_extension: String,
    default_test_type: String,
    auto_create_dir: bool,
}

impl RecordingCatalog {
    pub fn new<P: Into<PathBuf>>(root: P, video_extension: &str) -> Self {
        Self {
            root: root.into(),
            video_extension: video_extension.trim_start_matches('.').to_string(),
            default_test_type: DEFAULT_TEST_TYPE.to_string(),
            auto_create_dir: true,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self {
            default_test_type: config.default_test_type.clone(),
            auto_create_dir: config.auto_create_dir,
            ..Self::new(&config.data_root, &config.video_extension)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_test_type(&self) -> &str {
        &self.default_test_type
    }

    /// Whether new recordings create their folders on demand.
    pub fn auto_create_dir(&self) -> bool {
        self.auto_create_dir
    }

    pub fn patient_dir(&self, patient_id: &str, name: &str) -> PathBuf {
        self.root.join(patient_folder_name(patient_id, name))
    }

    /// Paths for a recording started now. `None` files it under the default
    /// test type; folders are created when `auto_create_dir` is set.
    pub fn new_recording(
        &self,
        patient_id: &str,
        name: &str,
        test_type: Option<&str>,
    ) -> Result<RecordingPaths, RecordingError> {
        let test_type = test_type.unwrap_or(&self.default_test_type);
        self.new_recording_at(patient_id, name, test_type, &Local::now(), self.auto_create_dir)
    }

    pub fn new_recording_at(
        &self,
        patient_id: &str,
        name: &str,
        test_type: &str,
        started_at: &DateTime<Local>,
        create_dirs: bool,
    ) -> Result<RecordingPaths, RecordingError> {
        let dir = self.patient_dir(patient_id, name).join(test_type);
        if create_dirs {
            fs::create_dir_all(&dir).map_err(|e| RecordingError::io(&dir, e))?;
        }

        let stem = recording_stamp(started_at);
        let csv = dir.join(format!("{}.csv", stem));
        let video = self.video_path_for(&csv);
        Ok(RecordingPaths { stem, csv, video })
    }

    /// Same-stem video sibling of a CSV.
    pub fn video_path_for(&self, csv_path: &Path) -> PathBuf {
        csv_path.with_extension(&self.video_extension)
    }

    /// All CSV recordings of a patient, newest first. A missing patient folder
    /// yields an empty list.
    pub fn list_records(&self, patient_id: &str, name: &str) -> Result<Vec<RecordEntry>, RecordingError> {
        let patient_dir = self.patient_dir(patient_id, name);
        if !patient_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut csv_files = Vec::new();
        collect_csv_files(&patient_dir, &mut csv_files)?;
        csv_files.sort();
        csv_files.reverse();

        let entries = csv_files
            .into_iter()
            .map(|csv_path| {
                let test_type = test_type_of(&patient_dir, &csv_path);
                let stem = csv_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                RecordEntry { csv_path, test_type, stem }
            })
            .collect();
        Ok(entries)
    }

    /// Remove a CSV and its video sibling. Returns whether a video was removed.
    pub fn delete_record(&self, csv_path: &Path) -> Result<bool, RecordingError> {
        fs::remove_file(csv_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RecordingError::NotFound(csv_path.to_path_buf()),
            _ => RecordingError::io(csv_path, e),
        })?;
        info!("Deleted recording {}", csv_path.display());

        let video = self.video_path_for(csv_path);
        match fs::remove_file(&video) {
            Ok(()) => {
                info!("Deleted video {}", video.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No video found next to {}", csv_path.display());
                Ok(false)
            }
            Err(e) => Err(RecordingError::io(&video, e)),
        }
    }
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RecordingError> {
    let entries = fs::read_dir(dir).map_err(|e| RecordingError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| RecordingError::io(dir, e))?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            out.push(path);
        }
    }
    Ok(())
}

/// 患者目录下的第一级子目录即检查类型
fn test_type_of(patient_dir: &Path, csv_path: &Path) -> String {
    let relative = csv_path.strip_prefix(patient_dir).unwrap_or(csv_path);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(first), Some(_)) => first.as_os_str().to_string_lossy().into_owned(),
        _ => UNKNOWN_TEST_TYPE.to_string(),
    }
}
