use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};

use crate::error::RecordingError;
use crate::types::{GazeSample, LiveEvent};

pub const CSV_HEADER: &str = "Timestamp,Pitch,Yaw";

/// Destination for live gaze samples. Implementations own their resource and
/// are moved into the persistence thread.
pub trait SampleSink: Send {
    fn write_sample(&mut self, sample: &GazeSample) -> Result<(), RecordingError>;

    fn finish(&mut self) -> Result<(), RecordingError> {
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

/// 单行 CSV：时间戳 4 位小数，角度 2 位小数
pub fn format_row(sample: &GazeSample) -> String {
    format!("{:.4},{:.2},{:.2}", sample.timestamp, sample.pitch_deg, sample.yaw_deg)
}

/// Appends one row per sample and flushes after every row.
pub struct CsvSampleWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CsvSampleWriter {
    /// Create (truncate) `path` and write the header.
    pub fn create<P: AsRef<Path>>(path: P, create_dirs: bool) -> Result<Self, RecordingError> {
        let path = path.as_ref().to_path_buf();

        if create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| RecordingError::io(parent, e))?;
            }
        }

        let file = File::create(&path).map_err(|e| RecordingError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER).map_err(|e| RecordingError::io(&path, e))?;
        writer.flush().map_err(|e| RecordingError::io(&path, e))?;

        info!("Recording samples to {}", path.display());
        Ok(Self { path, writer, rows: 0 })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl SampleSink for CsvSampleWriter {
    fn write_sample(&mut self, sample: &GazeSample) -> Result<(), RecordingError> {
        writeln!(self.writer, "{}", format_row(sample)).map_err(|e| RecordingError::io(&self.path, e))?;
        self.writer.flush().map_err(|e| RecordingError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordingError> {
        self.writer.flush().map_err(|e| RecordingError::io(&self.path, e))
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Persistence thread body: drains `sample_receiver` into `sink`.
///
/// Write failures are logged and forwarded as [`LiveEvent::PersistenceFailed`]
/// but never stop the loop. Samples still queued at shutdown are written
/// before the thread exits.
pub fn run_persistence_handler(
    sample_receiver: Receiver<GazeSample>,
    mut sink: Box<dyn SampleSink>,
    event_sender: Sender<LiveEvent>,
    shutdown_signal: Arc<AtomicBool>,
) {
    info!("Persistence handler thread started");
    let mut written = 0u64;
    let mut failed = 0u64;

    let mut persist = |sample: GazeSample, sink: &mut Box<dyn SampleSink>| match sink.write_sample(&sample) {
        Ok(()) => written += 1,
        Err(e) => {
            failed += 1;
            warn!("Persistence handler: failed to write sample at {:.4}s: {}", sample.timestamp, e);
            if let Err(TrySendError::Full(_)) = event_sender.try_send(LiveEvent::PersistenceFailed(e.to_string())) {
                debug!("Persistence handler: live event channel full, failure report dropped");
            }
        }
    };

    while !shutdown_signal.load(Ordering::Relaxed) {
        match sample_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(sample) => persist(sample, &mut sink),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Persistence handler: sample channel disconnected, exiting");
                break;
            }
        }
    }

    // 退出前写完队列中剩余的样本
    while let Ok(sample) = sample_receiver.try_recv() {
        persist(sample, &mut sink);
    }

    if let Err(e) = sink.finish() {
        warn!("Persistence handler: final flush failed: {}", e);
        let _ = event_sender.try_send(LiveEvent::PersistenceFailed(e.to_string()));
    }

    info!(
        "Persistence handler thread exiting: {} samples written, {} failed",
        written, failed
    );
}
