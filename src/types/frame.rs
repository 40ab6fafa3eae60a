use std::time::Instant;

use image::RgbImage;

/// A captured camera frame. Owned by exactly one stage at a time and moved,
/// never shared, between capture, mailbox and analysis.
#[derive(Debug)]
pub struct RawFrame {
    pub image: RgbImage,
    pub captured_at: Instant,
    /// 采集线程内的帧序号
    pub sequence: u64,
}

impl RawFrame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self::captured(image, sequence, Instant::now())
    }

    /// Frame read from the camera at `captured_at`.
    pub fn captured(image: RgbImage, sequence: u64, captured_at: Instant) -> Self {
        Self {
            image,
            captured_at,
            sequence,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
