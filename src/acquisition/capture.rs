use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use image::RgbImage;
use log::{debug, error, info, warn};

use super::mailbox::FrameMailbox;
use crate::config::CameraConfig;
use crate::error::{PipelineError, RecordingError};
use crate::types::{LiveEvent, RawFrame};

/// An opened camera stream.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended or failed.
    fn read_frame(&mut self) -> Option<RgbImage>;

    /// Negotiated `(width, height)`
    fn resolution(&self) -> (u32, u32);

    /// Negotiated frame rate
    fn fps(&self) -> f64;
}

/// Opens cameras by id at a target configuration.
pub trait CameraProvider {
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn FrameSource>, PipelineError>;
}

/// Synchronous video writer fed by the capture loop.
pub trait VideoSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError>;

    fn finish(&mut self) -> Result<(), RecordingError> {
        Ok(())
    }
}

/// Measured frame rate over every `interval` frames.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    interval: u64,
    frames: u64,
    window_start: Instant,
    last_fps: Option<f64>,
}

impl FpsMeter {
    pub fn new(interval: u64) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: u64, start: Instant) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            window_start: start,
            last_fps: None,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    /// Count one frame; returns the rate when a window completes.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames % self.interval != 0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        self.window_start = now;
        if elapsed > 0.0 {
            let fps = self.interval as f64 / elapsed;
            self.last_fps = Some(fps);
            Some(fps)
        } else {
            None
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

/// Where captured frames go.
pub enum FrameRoute {
    /// 交给推理线程（采集模式）
    Mailbox(Arc<FrameMailbox>),
    /// 直接转交显示端（预览模式）
    Display,
}

#[derive(Debug, Default)]
pub struct CaptureCounters {
    pub frames: AtomicU64,
    pub video_failures: AtomicU64,
    pub dropped_events: AtomicU64,
}

/// Capture thread body. Runs until the stop flag is set or the source ends;
/// the end of the stream sets the flag so the other stages wind down too.
pub fn run_capture_loop(
    mut source: Box<dyn FrameSource>,
    mut video_sink: Option<Box<dyn VideoSink>>,
    route: FrameRoute,
    event_sender: Sender<LiveEvent>,
    fps_report_interval: u64,
    counters: Arc<CaptureCounters>,
    shutdown_signal: Arc<AtomicBool>,
) -> Option<f64> {
    let (width, height) = source.resolution();
    info!("Capture loop started: {}x{} @ {:.1}fps", width, height, source.fps());

    let mut meter = FpsMeter::new(fps_report_interval);
    let mut sequence = 0u64;

    let send_event = |event: LiveEvent| match event_sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            counters.dropped_events.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    };

    while !shutdown_signal.load(Ordering::Relaxed) {
        let Some(image) = source.read_frame() else {
            warn!("Camera stream ended after {} frames", sequence);
            shutdown_signal.store(true, Ordering::Relaxed);
            break;
        };
        // 读帧后立即打时间戳，不计入视频写入耗时
        let captured_at = Instant::now();

        if let Some(sink) = video_sink.as_mut() {
            if let Err(e) = sink.write_frame(&image) {
                counters.video_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to write video frame {}: {}", sequence, e);
                send_event(LiveEvent::PersistenceFailed(e.to_string()));
            }
        }

        let frame = RawFrame::captured(image, sequence, captured_at);
        sequence += 1;
        counters.frames.fetch_add(1, Ordering::Relaxed);

        match &route {
            FrameRoute::Mailbox(mailbox) => {
                mailbox.publish(frame);
            }
            FrameRoute::Display => {
                if !send_event(LiveEvent::Frame(frame)) {
                    info!("Display consumer disconnected, stopping capture");
                    break;
                }
            }
        }

        if let Some(fps) = meter.tick() {
            debug!("Capture fps: {:.1}", fps);
            send_event(LiveEvent::CaptureFps(fps));
        }
    }

    if let Some(sink) = video_sink.as_mut() {
        if let Err(e) = sink.finish() {
            error!("Failed to finalize video: {}", e);
            send_event(LiveEvent::PersistenceFailed(e.to_string()));
        }
    }

    let final_fps = meter.last_fps();
    info!(
        "Capture loop stopped after {} frames, final fps: {:.1}",
        sequence,
        final_fps.unwrap_or(0.0)
    );
    final_fps
}

pub(crate) fn spawn_named<T, F>(name: &str, body: F) -> Result<JoinHandle<T>, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(body).map_err(|e| {
        error!("Failed to spawn {} thread: {}", name, e);
        PipelineError::Thread(name.to_string())
    })
}

/// Camera preview without recording or inference, for positioning the
/// camera before an exam.
pub struct PreviewSession {
    shutdown_signal: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    handle: Option<JoinHandle<Option<f64>>>,
}

impl PreviewSession {
    pub fn start(
        provider: &dyn CameraProvider,
        config: &CameraConfig,
        fps_report_interval: u64,
        event_sender: Sender<LiveEvent>,
    ) -> Result<Self, PipelineError> {
        let source = provider.open(config).map_err(|e| {
            error!("Preview: {}", e);
            e
        })?;

        let shutdown_signal = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(CaptureCounters::default());
        let handle = {
            let shutdown_signal = Arc::clone(&shutdown_signal);
            let counters = Arc::clone(&counters);
            spawn_named("preview", move || {
                run_capture_loop(
                    source,
                    None,
                    FrameRoute::Display,
                    event_sender,
                    fps_report_interval,
                    counters,
                    shutdown_signal,
                )
            })?
        };

        info!("Preview started on camera {}", config.camera_id);
        Ok(Self {
            shutdown_signal,
            counters,
            handle: Some(handle),
        })
    }

    pub fn frames(&self) -> u64 {
        self.counters.frames.load(Ordering::Relaxed)
    }

    /// Stop and join the preview thread; returns the last measured fps.
    pub fn stop(&mut self) -> Option<f64> {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(fps) => fps,
            Err(_) => {
                error!("Preview thread panicked");
                None
            }
        }
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ids in `0..base.max_probe` that the provider can open.
pub fn enumerate_cameras(provider: &dyn CameraProvider, base: &CameraConfig) -> Vec<u32> {
    (0..base.max_probe)
        .filter(|&camera_id| {
            let config = CameraConfig { camera_id, ..base.clone() };
            match provider.open(&config) {
                Ok(_) => true,
                Err(e) => {
                    debug!("Camera {} not available: {}", camera_id, e);
                    false
                }
            }
        })
        .collect()
}
