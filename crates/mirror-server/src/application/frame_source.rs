//! Capture + encode abstraction.
//!
//! A [`FrameSource`] grabs the current display contents and hands back one
//! JPEG already sized to the stream geometry.  Each call is independent; a
//! failure is returned to the caller as a [`CaptureError`] and never retried
//! here.
//!
//! All back-ends share [`FrameEncoder`] for the resize + compress step so
//! they produce identical output for identical pixels.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use mirror_core::{DisplayGeometry, StreamGeometry};
use thiserror::Error;

/// Error type for capture and encoding.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No capture device, or it went away.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device was present but the grab failed.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The raw pixel buffer did not match the reported dimensions.
    #[error("invalid frame buffer: {0}")]
    InvalidFrame(String),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// One compressed image, ready to send as a single binary message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
    geometry: StreamGeometry,
}

impl EncodedFrame {
    pub fn new(bytes: Vec<u8>, geometry: StreamGeometry) -> Self {
        Self { bytes, geometry }
    }

    pub fn geometry(&self) -> StreamGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Resizes to the stream geometry with a Lanczos3 filter and JPEG-encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    /// `quality` is clamped into 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encodes `image` at `target` size.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Encode`] if the JPEG encoder fails.
    pub fn encode(
        &self,
        image: &RgbImage,
        target: StreamGeometry,
    ) -> Result<EncodedFrame, CaptureError> {
        let bytes = if image.dimensions() == (target.width, target.height) {
            self.compress(image)?
        } else {
            let resized = imageops::resize(image, target.width, target.height, FilterType::Lanczos3);
            self.compress(&resized)?
        };
        Ok(EncodedFrame::new(bytes, target))
    }

    fn compress(&self, image: &RgbImage) -> Result<Vec<u8>, CaptureError> {
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        image.write_with_encoder(encoder)?;
        Ok(bytes)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(crate::domain::config::DEFAULT_JPEG_QUALITY)
    }
}

/// Produces encoded frames of the host display.
///
/// Implementors are used by one screen session at a time.
#[async_trait]
pub trait FrameSource: Send {
    /// Native dimensions of the display being captured.
    async fn display_geometry(&mut self) -> Result<DisplayGeometry, CaptureError>;

    /// Grabs the display and returns it encoded at `target` size.
    async fn capture(&mut self, target: StreamGeometry) -> Result<EncodedFrame, CaptureError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
