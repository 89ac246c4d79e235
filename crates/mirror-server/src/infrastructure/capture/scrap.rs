//! Primary-display capture with `scrap`.
//!
//! `scrap::Capturer` is not `Send`, so it lives on a dedicated OS thread for
//! its whole life.  [`ScrapFrameSource`] forwards each capture request to that
//! thread over a channel and awaits the reply.
//!
//! # Frame readiness
//!
//! The capturer reports `WouldBlock` until the OS has a new frame.  That is
//! not an error: the worker retries every [`RETRY_INTERVAL`] for at most
//! [`READY_TIMEOUT`] before giving up with [`CaptureError::Capture`].
//!
//! # Pixel format
//!
//! Frames are BGRA with a row stride that may exceed `width * 4`.  Rows are
//! converted to packed RGB before encoding.

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::RgbImage;
use mirror_core::{DisplayGeometry, StreamGeometry};
use ::scrap::{Capturer, Display};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::application::frame_source::{CaptureError, EncodedFrame, FrameEncoder, FrameSource};

const RETRY_INTERVAL: Duration = Duration::from_millis(5);
const READY_TIMEOUT: Duration = Duration::from_millis(500);

struct CaptureRequest {
    target: StreamGeometry,
    reply: oneshot::Sender<Result<EncodedFrame, CaptureError>>,
}

pub struct ScrapFrameSource {
    display: DisplayGeometry,
    requests: mpsc::Sender<CaptureRequest>,
}

impl ScrapFrameSource {
    /// Opens the primary display on a new capture thread.
    ///
    /// Blocks until the device is open and its size is known.  The thread
    /// exits when the source is dropped.
    ///
    /// # Errors
    ///
    /// [`CaptureError::DeviceUnavailable`] if there is no primary display or
    /// the capturer cannot be created.
    pub fn start(encoder: FrameEncoder) -> Result<Self, CaptureError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let (requests, rx) = mpsc::channel(1);

        thread::Builder::new()
            .name("scrap-capture".into())
            .spawn(move || worker(encoder, ready_tx, rx))
            .map_err(|e| CaptureError::DeviceUnavailable(format!("cannot spawn capture thread: {e}")))?;

        let display = ready_rx
            .recv()
            .map_err(|_| CaptureError::DeviceUnavailable("capture thread exited".into()))??;

        let DisplayGeometry { width, height } = display;
        info!("capturing primary display {width}x{height}");
        Ok(Self { display, requests })
    }
}

#[async_trait]
impl FrameSource for ScrapFrameSource {
    async fn display_geometry(&mut self) -> Result<DisplayGeometry, CaptureError> {
        Ok(self.display)
    }

    async fn capture(&mut self, target: StreamGeometry) -> Result<EncodedFrame, CaptureError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(CaptureRequest { target, reply })
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("capture thread stopped".into()))?;
        response
            .await
            .map_err(|_| CaptureError::DeviceUnavailable("capture thread stopped".into()))?
    }
}

fn worker(
    encoder: FrameEncoder,
    ready: std::sync::mpsc::SyncSender<Result<DisplayGeometry, CaptureError>>,
    mut requests: mpsc::Receiver<CaptureRequest>,
) {
    let mut capturer = match open_primary() {
        Ok(capturer) => capturer,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let display = DisplayGeometry::new(capturer.width() as u32, capturer.height() as u32);
    if ready.send(Ok(display)).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let result = grab(&mut capturer, display)
            .and_then(|image| encoder.encode(&image, request.target));
        let _ = request.reply.send(result);
    }
    debug!("capture thread exiting");
}

fn open_primary() -> Result<Capturer, CaptureError> {
    let display = Display::primary()
        .map_err(|e| CaptureError::DeviceUnavailable(format!("no primary display: {e}")))?;
    Capturer::new(display)
        .map_err(|e| CaptureError::DeviceUnavailable(format!("cannot open capturer: {e}")))
}

fn grab(capturer: &mut Capturer, display: DisplayGeometry) -> Result<RgbImage, CaptureError> {
    let deadline = Instant::now() + READY_TIMEOUT;
    loop {
        match capturer.frame() {
            Ok(frame) => return bgra_to_rgb(&frame, display),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(CaptureError::Capture(format!(
                        "no frame ready within {READY_TIMEOUT:?}"
                    )));
                }
                thread::sleep(RETRY_INTERVAL);
            }
            Err(e) => return Err(CaptureError::Capture(e.to_string())),
        }
    }
}

/// Packs a strided BGRA buffer into an RGB image.
fn bgra_to_rgb(buffer: &[u8], display: DisplayGeometry) -> Result<RgbImage, CaptureError> {
    let (width, height) = (display.width as usize, display.height as usize);
    let stride = buffer.len() / height.max(1);
    if stride < width * 4 {
        return Err(CaptureError::InvalidFrame(format!(
            "{} bytes for {width}x{height}",
            buffer.len()
        )));
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in buffer.chunks_exact(stride).take(height) {
        for px in row[..width * 4].chunks_exact(4) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }

    RgbImage::from_raw(display.width, display.height, rgb)
        .ok_or_else(|| CaptureError::InvalidFrame("short RGB buffer".into()))
}
