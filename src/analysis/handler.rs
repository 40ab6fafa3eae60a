use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{error, info, warn};

use super::report::{analyze_recording, AnalysisReport};
use super::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{AnalysisTask, Axis};

/// Recordings with an analysis job queued or running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `false` if the recording is already claimed.
    pub fn try_claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Background worker that analyses at most one job per recording at a time.
pub struct AnalysisService {
    task_sender: Sender<AnalysisTask>,
    in_flight: InFlight,
    shutdown_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisService {
    pub fn start(config: AnalysisConfig, queue_capacity: usize) -> Self {
        let (task_sender, task_receiver) = bounded(queue_capacity.max(1));
        let in_flight = InFlight::default();
        let shutdown_signal = Arc::new(AtomicBool::new(false));

        let handle = {
            let in_flight = in_flight.clone();
            let shutdown_signal = Arc::clone(&shutdown_signal);
            thread::spawn(move || run_analysis_handler(task_receiver, in_flight, config, shutdown_signal))
        };

        Self {
            task_sender,
            in_flight,
            shutdown_signal,
            handle: Some(handle),
        }
    }

    /// Queue an analysis of `csv_path`. The report arrives on the returned receiver.
    pub fn submit<P: AsRef<Path>>(
        &self,
        csv_path: P,
        axis: Axis,
    ) -> Result<Receiver<Result<AnalysisReport, AnalysisError>>, AnalysisError> {
        let csv_path = csv_path.as_ref().to_path_buf();
        if !self.in_flight.try_claim(&csv_path) {
            warn!("Analysis for {} is already running", csv_path.display());
            return Err(AnalysisError::AlreadyRunning(csv_path));
        }

        let (response_sender, response_receiver) = bounded(1);
        let task = AnalysisTask::Analyze {
            csv_path: csv_path.clone(),
            axis,
            response_sender,
        };

        match self.task_sender.try_send(task) {
            Ok(()) => Ok(response_receiver),
            Err(TrySendError::Full(_)) => {
                self.in_flight.release(&csv_path);
                Err(AnalysisError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.release(&csv_path);
                Err(AnalysisError::Disconnected)
            }
        }
    }

    pub fn is_running<P: AsRef<Path>>(&self, csv_path: P) -> bool {
        self.in_flight.contains(csv_path.as_ref())
    }

    /// Stop the worker and wait for it. A job already running completes first.
    pub fn shutdown(&mut self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Analysis worker thread panicked");
            }
        }
    }
}

impl Drop for AnalysisService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn run_analysis_handler(
    task_receiver: Receiver<AnalysisTask>,
    in_flight: InFlight,
    config: AnalysisConfig,
    shutdown_signal: Arc<AtomicBool>,
) {
    info!("Analysis handler thread started");

    while !shutdown_signal.load(Ordering::Relaxed) {
        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(AnalysisTask::Analyze { csv_path, axis, response_sender }) => {
                let result = analyze_recording(&csv_path, axis, &config).map_err(AnalysisError::from);
                if let Err(e) = &result {
                    warn!("Analysis handler: {} failed: {}", csv_path.display(), e);
                }

                // 先释放再回复，调用方收到结果后即可重新提交
                in_flight.release(&csv_path);
                if let Err(e) = response_sender.try_send(result) {
                    warn!("Analysis handler: failed to send result: {}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Analysis handler: task channel disconnected, exiting");
                break;
            }
        }
    }

    // 未处理的任务直接丢弃，释放占用
    for task in task_receiver.try_iter() {
        let AnalysisTask::Analyze { csv_path, .. } = task;
        in_flight.release(&csv_path);
    }

    info!("Analysis handler thread exiting gracefully");
}
