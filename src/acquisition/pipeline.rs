use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use log::{error, info, warn};

use super::analysis::{AnalysisCounters, AnalysisLoop, SampleOutputs, SessionClock};
use super::capture::{run_capture_loop, spawn_named, CameraProvider, CaptureCounters, FrameRoute, VideoSink};
use super::estimator::{EstimatorProvider, EyeRegionExtractor};
use super::mailbox::{FrameMailbox, MailboxStats};
use super::smoothing::OnlineSmoothingFilter;
use crate::config::{AppConfig, RecordingConfig};
use crate::error::PipelineError;
use crate::recording::catalog::RecordingPaths;
use crate::recording::writer::{run_persistence_handler, CsvSampleWriter, SampleSink};
use crate::types::LiveEvent;

/// Optional recording targets of a session.
#[derive(Default)]
pub struct PipelineOutputs {
    pub video_sink: Option<Box<dyn VideoSink>>,
    pub sample_sink: Option<Box<dyn SampleSink>>,
}

impl PipelineOutputs {
    /// Record samples to the CSV of `paths`. Its folder is created only when
    /// `auto_create_dir` is set.
    pub fn recording(
        paths: &RecordingPaths,
        config: &RecordingConfig,
        video_sink: Option<Box<dyn VideoSink>>,
    ) -> Result<Self, PipelineError> {
        let writer = CsvSampleWriter::create(&paths.csv, config.auto_create_dir)?;
        Ok(Self {
            video_sink,
            sample_sink: Some(Box::new(writer)),
        })
    }
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    pub captured: u64,
    pub processed: u64,
    pub estimate_failures: u64,
    pub missing_eye: u64,
    pub dropped_events: u64,
    pub dropped_samples: u64,
    pub video_failures: u64,
    pub mailbox: MailboxStats,
    pub final_fps: Option<f64>,
}

/// Live acquisition: a capture thread and an analysis thread decoupled by a
/// single-slot mailbox, plus an optional persistence thread. Everything the
/// presentation side needs arrives on one live event channel.
pub struct AcquisitionPipeline {
    shutdown_signal: Arc<AtomicBool>,
    mailbox: Arc<FrameMailbox>,
    capture_counters: Arc<CaptureCounters>,
    analysis_counters: Arc<AnalysisCounters>,
    capture_handle: Option<JoinHandle<Option<f64>>>,
    // 推理线程不在 stop 中 join，下一次轮询时自行退出
    analysis_handle: JoinHandle<()>,
    persistence_handle: Option<JoinHandle<()>>,
    final_fps: Option<f64>,
}

impl AcquisitionPipeline {
    /// Open the camera and the estimator, then start the threads.
    ///
    /// Camera and estimator failures abort the start and are returned once.
    pub fn start(
        config: &AppConfig,
        camera: &dyn CameraProvider,
        estimators: &dyn EstimatorProvider,
        extractor: Box<dyn EyeRegionExtractor>,
        outputs: PipelineOutputs,
    ) -> Result<(Self, Receiver<LiveEvent>), PipelineError> {
        let source = camera.open(&config.camera).map_err(|e| {
            error!("Failed to open camera {}: {}", config.camera.camera_id, e);
            e
        })?;
        let estimator = estimators.load(config.acquisition.device).map_err(|e| {
            error!("Failed to load gaze estimator on {}: {}", config.acquisition.device, e);
            e
        })?;

        let (event_sender, event_receiver) = bounded(config.channels.live_event_capacity);
        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let mailbox = Arc::new(FrameMailbox::new());
        let capture_counters = Arc::new(CaptureCounters::default());
        let analysis_counters = Arc::new(AnalysisCounters::default());
        let session_start = Instant::now();

        let (persistence_sender, persistence_handle) = match outputs.sample_sink {
            Some(sink) => {
                let (sample_sender, sample_receiver) = bounded(config.channels.persistence_capacity);
                let event_sender = event_sender.clone();
                let shutdown_signal = Arc::clone(&shutdown_signal);
                let handle = spawn_named("persistence", move || {
                    run_persistence_handler(sample_receiver, sink, event_sender, shutdown_signal)
                })?;
                (Some(sample_sender), Some(handle))
            }
            None => (None, None),
        };

        let analysis = AnalysisLoop::new(
            Arc::clone(&mailbox),
            extractor,
            estimator,
            OnlineSmoothingFilter::new(&config.smoothing),
            SessionClock::new(session_start),
            SampleOutputs {
                event_sender: event_sender.clone(),
                persistence_sender,
                forward_frames: config.acquisition.forward_frames,
            },
            Arc::clone(&analysis_counters),
        );
        let poll_interval = Duration::from_millis(config.acquisition.poll_interval_ms);
        let analysis_handle = {
            let shutdown_signal = Arc::clone(&shutdown_signal);
            spawn_named("analysis", move || analysis.run(poll_interval, shutdown_signal))
        }
        .inspect_err(|_| shutdown_signal.store(true, Ordering::Relaxed))?;

        let capture_handle = {
            let route = FrameRoute::Mailbox(Arc::clone(&mailbox));
            let fps_interval = config.acquisition.fps_report_interval;
            let counters = Arc::clone(&capture_counters);
            let shutdown_signal = Arc::clone(&shutdown_signal);
            let video_sink = outputs.video_sink;
            spawn_named("capture", move || {
                run_capture_loop(source, video_sink, route, event_sender, fps_interval, counters, shutdown_signal)
            })
        }
        .inspect_err(|_| shutdown_signal.store(true, Ordering::Relaxed))?;

        info!(
            "Acquisition pipeline started: camera {} ({}x{} @ {}fps), device {}",
            config.camera.camera_id,
            config.camera.width,
            config.camera.height,
            config.camera.fps,
            config.acquisition.device
        );

        Ok((
            Self {
                shutdown_signal,
                mailbox,
                capture_counters,
                analysis_counters,
                capture_handle: Some(capture_handle),
                analysis_handle,
                persistence_handle,
                final_fps: None,
            },
            event_receiver,
        ))
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown_signal.load(Ordering::Relaxed)
    }

    /// Whether the analysis thread has exited yet.
    pub fn analysis_finished(&self) -> bool {
        self.analysis_handle.is_finished()
    }

    /// Stop all loops. Capture and persistence are joined; the analysis
    /// thread sees the flag on its next poll and exits on its own.
    pub fn stop(&mut self) -> PipelineStats {
        self.shutdown_signal.store(true, Ordering::Relaxed);

        if let Some(handle) = self.capture_handle.take() {
            match handle.join() {
                Ok(fps) => self.final_fps = fps,
                Err(_) => error!("Capture thread panicked"),
            }
        }
        if let Some(handle) = self.persistence_handle.take() {
            if handle.join().is_err() {
                error!("Persistence thread panicked");
            }
        }
        if !self.analysis_finished() {
            warn!("Analysis thread still finishing its last frame, not waiting for it");
        }

        let stats = self.stats();
        info!(
            "Acquisition pipeline stopped: {} captured, {} analysed, {} frames skipped",
            stats.captured, stats.processed, stats.mailbox.overwritten
        );
        stats
    }

    pub fn stats(&self) -> PipelineStats {
        let capture = &self.capture_counters;
        let analysis = &self.analysis_counters;
        PipelineStats {
            captured: capture.frames.load(Ordering::Relaxed),
            processed: analysis.processed.load(Ordering::Relaxed),
            estimate_failures: analysis.estimate_failures.load(Ordering::Relaxed),
            missing_eye: analysis.missing_eye.load(Ordering::Relaxed),
            dropped_events: analysis.dropped_events.load(Ordering::Relaxed)
                + capture.dropped_events.load(Ordering::Relaxed),
            dropped_samples: analysis.dropped_samples.load(Ordering::Relaxed),
            video_failures: capture.video_failures.load(Ordering::Relaxed),
            mailbox: self.mailbox.stats(),
            final_fps: self.final_fps,
        }
    }
}

impl Drop for AcquisitionPipeline {
    fn drop(&mut self) {
        if self.capture_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::capture::tests::SyntheticProvider;
    use crate::acquisition::estimator::{ComputeDevice, GazeEstimator};
    use crate::error::{EstimateError, RecordingError};
    use crate::recording::catalog::RecordingCatalog;
    use crate::types::{GazeSample, GazeVector};
    use image::RgbImage;
    use std::sync::Mutex;
    use std::thread;

    struct WholeFrame;

    impl EyeRegionExtractor for WholeFrame {
        fn extract(&mut self, frame: &RgbImage) -> Option<RgbImage> {
            Some(frame.clone())
        }
    }

    /// 推理较慢的估计器，每隔 `fail_every` 帧失败一次
    struct SlowEstimator {
        delay: Duration,
        fail_every: Option<u64>,
        calls: u64,
    }

    impl GazeEstimator for SlowEstimator {
        fn estimate(&mut self, eye_image: &RgbImage) -> Result<GazeVector, EstimateError> {
            thread::sleep(self.delay);
            self.calls += 1;
            if self.fail_every.is_some_and(|n| self.calls % n == 0) {
                return Err(EstimateError::InvalidData("empty tensor".to_string()));
            }
            let level = eye_image.get_pixel(0, 0)[0] as f64 / 255.0;
            Ok(GazeVector::new(-level * 0.5, 0.0, -1.0))
        }
    }

    struct Estimators {
        available: bool,
        delay: Duration,
        fail_every: Option<u64>,
    }

    impl EstimatorProvider for Estimators {
        fn load(&self, device: ComputeDevice) -> Result<Box<dyn GazeEstimator>, PipelineError> {
            if !self.available {
                return Err(PipelineError::EstimatorUnavailable(format!("no checkpoint for {}", device)));
            }
            Ok(Box::new(SlowEstimator {
                delay: self.delay,
                fail_every: self.fail_every,
                calls: 0,
            }))
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<GazeSample>>>);

    impl SampleSink for MemorySink {
        fn write_sample(&mut self, sample: &GazeSample) -> Result<(), RecordingError> {
            self.0.lock().unwrap().push(*sample);
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.acquisition.fps_report_interval = 10;
        config.channels.live_event_capacity = 100_000;
        config
    }

    fn camera(frame_delay_ms: u64) -> SyntheticProvider {
        SyntheticProvider {
            available: vec![0],
            frames: None,
            frame_delay: Duration::from_millis(frame_delay_ms),
        }
    }

    fn wait_for_analysis_exit(pipeline: &AcquisitionPipeline) {
        for _ in 0..200 {
            if pipeline.analysis_finished() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("analysis thread did not exit");
    }

    #[test]
    fn test_start_fails_when_camera_unavailable() {
        let mut config = test_config();
        config.camera.camera_id = 3;
        let estimators = Estimators { available: true, delay: Duration::ZERO, fail_every: None };
        let result = AcquisitionPipeline::start(
            &config,
            &camera(1),
            &estimators,
            Box::new(WholeFrame),
            PipelineOutputs::default(),
        );
        assert!(matches!(result, Err(PipelineError::CameraUnavailable { camera_id: 3, .. })));
    }

    #[test]
    fn test_start_fails_when_estimator_unavailable() {
        let estimators = Estimators { available: false, delay: Duration::ZERO, fail_every: None };
        let result = AcquisitionPipeline::start(
            &test_config(),
            &camera(1),
            &estimators,
            Box::new(WholeFrame),
            PipelineOutputs::default(),
        );
        assert!(matches!(result, Err(PipelineError::EstimatorUnavailable(_))));
    }

    #[test]
    fn test_slow_analysis_skips_frames_without_backlog() {
        let sink = MemorySink::default();
        let estimators = Estimators { available: true, delay: Duration::from_millis(5), fail_every: Some(4) };
        let outputs = PipelineOutputs { video_sink: None, sample_sink: Some(Box::new(sink.clone())) };

        let (mut pipeline, events) =
            AcquisitionPipeline::start(&test_config(), &camera(1), &estimators, Box::new(WholeFrame), outputs)
                .expect("start");
        assert!(pipeline.is_running());
        thread::sleep(Duration::from_millis(300));
        let stats = pipeline.stop();
        assert!(!pipeline.is_running());
        wait_for_analysis_exit(&pipeline);
        let stats_after = pipeline.stats();

        // 推理慢于采集：有帧被覆盖，但邮箱中最多只保留一帧
        assert!(stats.captured > stats_after.processed);
        assert!(stats_after.mailbox.overwritten > 0);
        assert_eq!(stats_after.mailbox.published, stats.captured);
        let pending = stats.captured - stats_after.mailbox.taken - stats_after.mailbox.overwritten;
        assert!(pending <= 1);
        assert!(stats_after.estimate_failures > 0);

        let samples: Vec<GazeSample> = events
            .try_iter()
            .filter_map(|e| match e {
                LiveEvent::Sample(sample) => Some(sample),
                _ => None,
            })
            .collect();
        assert_eq!(samples.len() as u64, stats_after.processed);
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(samples.iter().any(|s| s.pitch_deg == 0.0 && s.yaw_deg == 0.0));

        let persisted = sink.0.lock().unwrap().len() as u64;
        assert!(persisted >= 1 && persisted <= stats_after.processed);
    }

    #[test]
    fn test_fps_reports_reach_consumer() {
        let estimators = Estimators { available: true, delay: Duration::ZERO, fail_every: None };
        let (mut pipeline, events) = AcquisitionPipeline::start(
            &test_config(),
            &camera(1),
            &estimators,
            Box::new(WholeFrame),
            PipelineOutputs::default(),
        )
        .expect("start");

        let fps = events
            .iter()
            .find_map(|e| match e {
                LiveEvent::CaptureFps(fps) => Some(fps),
                _ => None,
            })
            .expect("fps report");
        assert!(fps > 0.0 && fps <= 1000.0);

        let stats = pipeline.stop();
        assert!(stats.final_fps.is_some());
    }

    #[test]
    fn test_stream_end_stops_pipeline() {
        let provider = SyntheticProvider { available: vec![0], frames: Some(20), frame_delay: Duration::from_millis(1) };
        let estimators = Estimators { available: true, delay: Duration::ZERO, fail_every: None };
        let sink = MemorySink::default();
        let outputs = PipelineOutputs { video_sink: None, sample_sink: Some(Box::new(sink.clone())) };

        let (mut pipeline, _events) =
            AcquisitionPipeline::start(&test_config(), &provider, &estimators, Box::new(WholeFrame), outputs)
                .expect("start");

        let mut running = true;
        for _ in 0..400 {
            running = pipeline.is_running();
            if !running {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!running, "pipeline still running after the camera stream ended");
        wait_for_analysis_exit(&pipeline);

        let stats = pipeline.stop();
        assert_eq!(stats.captured, 20);
    }

    #[test]
    fn test_recording_outputs_write_csv() {
        let root = std::env::temp_dir().join(format!("vnghub_pipeline_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let recording = RecordingConfig {
            data_root: root.to_string_lossy().into_owned(),
            auto_create_dir: false,
            ..RecordingConfig::default()
        };
        let catalog = RecordingCatalog::from_config(&recording);
        let paths = catalog.new_recording("P9", "Test", None).expect("paths");
        // 目录未创建时录制无法开始
        assert!(matches!(
            PipelineOutputs::recording(&paths, &recording, None),
            Err(PipelineError::Recording(_))
        ));

        let recording = RecordingConfig { auto_create_dir: true, ..recording };
        let outputs = PipelineOutputs::recording(&paths, &recording, None).expect("outputs");
        let estimators = Estimators { available: true, delay: Duration::ZERO, fail_every: None };

        let (mut pipeline, _events) =
            AcquisitionPipeline::start(&test_config(), &camera(2), &estimators, Box::new(WholeFrame), outputs)
                .expect("start");
        thread::sleep(Duration::from_millis(100));
        pipeline.stop();

        let content = std::fs::read_to_string(&paths.csv).expect("csv");
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Timestamp,Pitch,Yaw"));
        assert!(lines.count() >= 1);

        let _ = std::fs::remove_dir_all(&root);
    }
}
