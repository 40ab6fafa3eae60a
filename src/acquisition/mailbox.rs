use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::types::RawFrame;

/// Single-slot handoff between the capture and analysis loops.
///
/// `publish` overwrites any frame the consumer has not taken yet, `take`
/// empties the slot. At most one frame is ever buffered.
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Option<RawFrame>>,
    published: AtomicU64,
    overwritten: AtomicU64,
    taken: AtomicU64,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<RawFrame>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `frame`, returning `true` if an unconsumed frame was dropped.
    pub fn publish(&self, frame: RawFrame) -> bool {
        let previous = self.slot().replace(frame);
        self.published.fetch_add(1, Ordering::Relaxed);
        // 被覆盖的旧帧在锁外释放
        match previous {
            Some(_) => {
                self.overwritten.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn take(&self) -> Option<RawFrame> {
        let frame = self.slot().take();
        if frame.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    pub fn is_empty(&self) -> bool {
        self.slot().is_none()
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            published: self.published.load(Ordering::Relaxed),
            overwritten: self.overwritten.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub published: u64,
    /// 未被消费就被覆盖的帧数
    pub overwritten: u64,
    pub taken: u64,
}
