use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, info, warn};

use super::estimator::{estimate_angles, EyeRegionExtractor, GazeEstimator};
use super::mailbox::FrameMailbox;
use super::smoothing::OnlineSmoothingFilter;
use crate::types::{GazeSample, LiveEvent, RawFrame};

/// Session-relative, non-decreasing timestamps from frame capture instants.
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Instant,
    last: f64,
}

impl SessionClock {
    pub fn new(start: Instant) -> Self {
        Self { start, last: 0.0 }
    }

    pub fn timestamp(&mut self, at: Instant) -> f64 {
        let seconds = at.saturating_duration_since(self.start).as_secs_f64();
        self.last = self.last.max(seconds);
        self.last
    }
}

#[derive(Debug, Default)]
pub struct AnalysisCounters {
    pub processed: AtomicU64,
    /// 推理失败（估计器不可用或返回无效数据）
    pub estimate_failures: AtomicU64,
    /// 未检测到眼部区域
    pub missing_eye: AtomicU64,
    pub dropped_events: AtomicU64,
    pub dropped_samples: AtomicU64,
}

/// Downstream consumers of each sample. Every send is non-blocking.
pub struct SampleOutputs {
    pub event_sender: Sender<LiveEvent>,
    pub persistence_sender: Option<Sender<GazeSample>>,
    pub forward_frames: bool,
}

/// State owned by the analysis thread.
pub struct AnalysisLoop {
    mailbox: Arc<FrameMailbox>,
    extractor: Box<dyn EyeRegionExtractor>,
    estimator: Box<dyn GazeEstimator>,
    smoother: OnlineSmoothingFilter,
    clock: SessionClock,
    outputs: SampleOutputs,
    counters: Arc<AnalysisCounters>,
}

impl AnalysisLoop {
    pub fn new(
        mailbox: Arc<FrameMailbox>,
        extractor: Box<dyn EyeRegionExtractor>,
        estimator: Box<dyn GazeEstimator>,
        smoother: OnlineSmoothingFilter,
        clock: SessionClock,
        outputs: SampleOutputs,
        counters: Arc<AnalysisCounters>,
    ) -> Self {
        Self {
            mailbox,
            extractor,
            estimator,
            smoother,
            clock,
            outputs,
            counters,
        }
    }

    /// Turn one frame into a sample and fan it out. Any inference failure
    /// yields a neutral `(0, 0)` sample.
    pub fn process_frame(&mut self, frame: RawFrame) -> GazeSample {
        let timestamp = self.clock.timestamp(frame.captured_at);

        let sample = match self.extractor.extract(&frame.image) {
            Some(eye_region) => {
                let sample = match estimate_angles(self.estimator.as_mut(), &eye_region) {
                    Ok((pitch, yaw)) => {
                        let (pitch, yaw) = self.smoother.process(pitch, yaw);
                        GazeSample::new(timestamp, pitch, yaw)
                    }
                    Err(e) => {
                        self.counters.estimate_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Inference failed on frame {}: {}", frame.sequence, e);
                        GazeSample::neutral(timestamp)
                    }
                };
                self.send_event(LiveEvent::EyeRegion(eye_region));
                sample
            }
            None => {
                self.counters.missing_eye.fetch_add(1, Ordering::Relaxed);
                debug!("No eye region in frame {}", frame.sequence);
                GazeSample::neutral(timestamp)
            }
        };

        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        if let Some(sender) = &self.outputs.persistence_sender {
            if let Err(TrySendError::Full(_)) = sender.try_send(sample) {
                self.counters.dropped_samples.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.send_event(LiveEvent::Sample(sample));
        if self.outputs.forward_frames {
            self.send_event(LiveEvent::Frame(frame));
        }

        sample
    }

    fn send_event(&self, event: LiveEvent) {
        if let Err(TrySendError::Full(_)) = self.outputs.event_sender.try_send(event) {
            self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Poll the mailbox until the shutdown signal is set.
    pub fn run(mut self, poll_interval: Duration, shutdown_signal: Arc<AtomicBool>) {
        info!("Analysis loop started");
        while !shutdown_signal.load(Ordering::Relaxed) {
            match self.mailbox.take() {
                Some(frame) => {
                    self.process_frame(frame);
                }
                None => thread::sleep(poll_interval),
            }
        }
        info!(
            "Analysis loop stopped after {} frames",
            self.counters.processed.load(Ordering::Relaxed)
        );
    }
}
