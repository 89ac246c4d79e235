//! Test-pattern frame source.
//!
//! Renders diagonal color bands that shift a little on every capture, plus a
//! white bar sweeping left to right, at the configured display size.  The
//! frame then goes through the same [`FrameEncoder`] as real captures, so
//! resize and JPEG cost are representative.
//!
//! Rendering and encoding run on the blocking pool to keep the runtime
//! threads free.

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use mirror_core::{DisplayGeometry, StreamGeometry};

use crate::application::frame_source::{CaptureError, EncodedFrame, FrameEncoder, FrameSource};

const BAR_WIDTH: u32 = 16;

pub struct SyntheticFrameSource {
    display: DisplayGeometry,
    encoder: FrameEncoder,
    tick: u32,
}

impl SyntheticFrameSource {
    pub fn new(display: DisplayGeometry, encoder: FrameEncoder) -> Self {
        Self {
            display,
            encoder,
            tick: 0,
        }
    }

    /// Draws frame number `tick` at display size.
    fn render(display: DisplayGeometry, tick: u32) -> RgbImage {
        let bar_x = (tick.wrapping_mul(8)) % display.width.max(1);
        RgbImage::from_fn(display.width, display.height, |x, y| {
            if x >= bar_x && x < bar_x + BAR_WIDTH {
                return Rgb([255, 255, 255]);
            }
            let band = (x + y).wrapping_add(tick.wrapping_mul(4)) / 32;
            Rgb([
                (band.wrapping_mul(53) % 256) as u8,
                (band.wrapping_mul(97) % 256) as u8,
                (band.wrapping_mul(151) % 256) as u8,
            ])
        })
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn display_geometry(&mut self) -> Result<DisplayGeometry, CaptureError> {
        Ok(self.display)
    }

    async fn capture(&mut self, target: StreamGeometry) -> Result<EncodedFrame, CaptureError> {
        let (display, encoder, tick) = (self.display, self.encoder, self.tick);
        self.tick = self.tick.wrapping_add(1);

        tokio::task::spawn_blocking(move || encoder.encode(&Self::render(display, tick), target))
            .await
            .map_err(|e| CaptureError::Capture(format!("render task failed: {e}")))?
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
