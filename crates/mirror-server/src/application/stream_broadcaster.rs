//! The screen loop.
//!
//! One [`StreamBroadcaster::run`] call serves one screen connection:
//!
//! 1. ask the capture device for the display geometry,
//! 2. establish the shared [`SharedMapper`] (the only write to it),
//! 3. send the config message, always the first message on the channel,
//! 4. every `frame_delay`: capture → send one binary frame.
//!
//! # Pacing and backpressure
//!
//! Each send is awaited before the next capture starts, so at most one frame
//! is ever in flight and nothing queues up behind a slow viewer.  The ticker
//! uses [`MissedTickBehavior::Delay`]: if a send overruns the period, the
//! next frame is simply later rather than a burst of catch-up frames.  A slow
//! consumer therefore lowers the frame rate instead of growing latency.
//!
//! # Termination
//!
//! The channel reporting closed (or the shutdown flag) ends the loop with
//! `Ok`; any capture, geometry, or transport error ends it with `Err`.
//! Either way only this connection is affected; a later connection starts
//! over from step 1.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::{GeometryError, ScreenMessage, SharedMapper};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::application::frame_source::{CaptureError, EncodedFrame, FrameSource};

/// Transport failures reported by a [`ScreenChannel`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The peer went away; the expected way for a session to end.
    #[error("channel closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Why a screen session ended with an error.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("cannot establish stream geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to serialize config message: {0}")]
    Config(#[from] serde_json::Error),

    #[error("send failed: {0}")]
    Channel(ChannelError),
}

/// How a screen session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The viewer disconnected.
    ChannelClosed { frames_sent: u64 },
    /// The process is shutting down.
    Shutdown { frames_sent: u64 },
}

/// Outgoing half of a screen connection.
#[async_trait]
pub trait ScreenChannel: Send {
    /// Sends a structured text message.
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Sends one binary frame.
    async fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), ChannelError>;
}

/// Settings the screen loop needs from [`ServerConfig`](crate::domain::ServerConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub stream_width: u32,
    pub frame_delay: Duration,
}

/// Drives a [`FrameSource`] into a [`ScreenChannel`].
pub struct StreamBroadcaster {
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    mapper: SharedMapper,
    settings: StreamSettings,
}

impl StreamBroadcaster {
    pub fn new(
        source: Arc<Mutex<Box<dyn FrameSource>>>,
        mapper: SharedMapper,
        settings: StreamSettings,
    ) -> Self {
        Self {
            source,
            mapper,
            settings,
        }
    }

    /// Serves one screen connection until it closes or fails.
    ///
    /// # Errors
    ///
    /// [`StreamError`] for anything other than the channel closing or
    /// `running` being cleared.
    pub async fn run<C>(
        &self,
        channel: &mut C,
        running: &AtomicBool,
    ) -> Result<StreamEnd, StreamError>
    where
        C: ScreenChannel + ?Sized,
    {
        let mut source = self.source.lock().await;

        let display = source.display_geometry().await?;
        let stream = self.mapper.establish(display, self.settings.stream_width)?;

        let config = ScreenMessage::config(stream, display).to_json()?;
        match channel.send_text(config).await {
            Ok(()) => {}
            Err(ChannelError::Closed) => return Ok(StreamEnd::ChannelClosed { frames_sent: 0 }),
            Err(e) => return Err(StreamError::Channel(e)),
        }

        let mut ticker = interval(self.settings.frame_delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames_sent: u64 = 0;

        loop {
            ticker.tick().await;

            if !running.load(Ordering::Relaxed) {
                return Ok(StreamEnd::Shutdown { frames_sent });
            }

            let frame = source.capture(stream).await?;
            let size = frame.len();

            match channel.send_frame(frame).await {
                Ok(()) => {
                    frames_sent += 1;
                    debug!("frame {frames_sent} sent ({size} bytes)");
                }
                Err(ChannelError::Closed) => return Ok(StreamEnd::ChannelClosed { frames_sent }),
                Err(e) => return Err(StreamError::Channel(e)),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::{DisplayGeometry, Point, StreamGeometry};
    use std::time::Instant;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Debug, PartialEq)]
    enum Sent {
        Text(String),
        Frame(usize),
    }

    /// Records what was sent; fails with `failure` once `accept` messages
    /// have gone through.
    struct RecordingChannel {
        sent: Vec<Sent>,
        accept: usize,
        failure: ChannelError,
    }

    impl RecordingChannel {
        fn closing_after(accept: usize) -> Self {
            Self {
                sent: Vec::new(),
                accept,
                failure: ChannelError::Closed,
            }
        }

        fn failing_after(accept: usize, reason: &str) -> Self {
            Self {
                sent: Vec::new(),
                accept,
                failure: ChannelError::Transport(reason.to_string()),
            }
        }

        fn push(&mut self, item: Sent) -> Result<(), ChannelError> {
            if self.sent.len() >= self.accept {
                return Err(self.failure.clone());
            }
            self.sent.push(item);
            Ok(())
        }
    }

    #[async_trait]
    impl ScreenChannel for RecordingChannel {
        async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
            self.push(Sent::Text(text))
        }

        async fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), ChannelError> {
            self.push(Sent::Frame(frame.len()))
        }
    }

    /// Returns canned 3-byte frames; fails capture number `fail_on` if set.
    struct ScriptedSource {
        display: DisplayGeometry,
        captures: usize,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn display_geometry(&mut self) -> Result<DisplayGeometry, CaptureError> {
            Ok(self.display)
        }

        async fn capture(&mut self, target: StreamGeometry) -> Result<EncodedFrame, CaptureError> {
            self.captures += 1;
            if self.fail_on == Some(self.captures) {
                return Err(CaptureError::Capture("device vanished".into()));
            }
            Ok(EncodedFrame::new(vec![0xFF, 0xD8, self.captures as u8], target))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Capture,
        SendStart,
        SendEnd,
    }

    type Timeline = Arc<std::sync::Mutex<Vec<(Step, Instant)>>>;

    fn record(timeline: &Timeline, step: Step) {
        timeline.lock().unwrap().push((step, Instant::now()));
    }

    /// Frame source that logs each capture on a shared timeline.
    struct TimelineSource {
        display: DisplayGeometry,
        timeline: Timeline,
    }

    #[async_trait]
    impl FrameSource for TimelineSource {
        async fn display_geometry(&mut self) -> Result<DisplayGeometry, CaptureError> {
            Ok(self.display)
        }

        async fn capture(&mut self, target: StreamGeometry) -> Result<EncodedFrame, CaptureError> {
            record(&self.timeline, Step::Capture);
            Ok(EncodedFrame::new(vec![0xFF, 0xD8], target))
        }
    }

    /// Viewer whose first frame send stalls for `stall`; closes after `accept`
    /// frames.
    struct StallingChannel {
        timeline: Timeline,
        stall: Duration,
        frames: usize,
        accept: usize,
    }

    #[async_trait]
    impl ScreenChannel for StallingChannel {
        async fn send_text(&mut self, _text: String) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_frame(&mut self, _frame: EncodedFrame) -> Result<(), ChannelError> {
            if self.frames == self.accept {
                return Err(ChannelError::Closed);
            }
            record(&self.timeline, Step::SendStart);
            if self.frames == 0 {
                tokio::time::sleep(self.stall).await;
            }
            self.frames += 1;
            record(&self.timeline, Step::SendEnd);
            Ok(())
        }
    }

    fn broadcaster(
        display: DisplayGeometry,
        fail_on: Option<usize>,
    ) -> (StreamBroadcaster, SharedMapper) {
        let source: Box<dyn FrameSource> = Box::new(ScriptedSource {
            display,
            captures: 0,
            fail_on,
        });
        let mapper = SharedMapper::new();
        let b = StreamBroadcaster::new(
            Arc::new(Mutex::new(source)),
            mapper.clone(),
            StreamSettings {
                stream_width: 960,
                frame_delay: Duration::from_millis(1),
            },
        );
        (b, mapper)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_config_is_first_message_and_describes_stream_geometry() {
        // Arrange
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), None);
        let mut channel = RecordingChannel::closing_after(3);
        let running = AtomicBool::new(true);

        // Act
        let end = b.run(&mut channel, &running).await.unwrap();

        // Assert
        assert_eq!(end, StreamEnd::ChannelClosed { frames_sent: 2 });
        let Sent::Text(config) = &channel.sent[0] else {
            panic!("first message must be the config, got {:?}", channel.sent[0]);
        };
        let json: serde_json::Value = serde_json::from_str(config).unwrap();
        assert_eq!(json["type"], "config");
        assert_eq!(json["width"], 960);
        assert_eq!(json["height"], 600);
        assert_eq!(channel.sent[1], Sent::Frame(3));
        assert_eq!(channel.sent[2], Sent::Frame(3));
    }

    #[tokio::test]
    async fn test_run_establishes_shared_mapper() {
        let (b, mapper) = broadcaster(DisplayGeometry::new(1920, 1080), None);
        let mut channel = RecordingChannel::closing_after(1);
        b.run(&mut channel, &AtomicBool::new(true)).await.unwrap();
        assert_eq!(
            mapper.to_display(Point::new(200, 200)).unwrap(),
            Point::new(400, 400)
        );
    }

    #[tokio::test]
    async fn test_closed_before_config_is_clean_exit() {
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), None);
        let mut channel = RecordingChannel::closing_after(0);
        let end = b.run(&mut channel, &AtomicBool::new(true)).await.unwrap();
        assert_eq!(end, StreamEnd::ChannelClosed { frames_sent: 0 });
    }

    #[tokio::test]
    async fn test_transport_error_ends_session_with_error() {
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), None);
        let mut channel = RecordingChannel::failing_after(2, "broken pipe");
        let result = b.run(&mut channel, &AtomicBool::new(true)).await;
        assert!(matches!(
            result,
            Err(StreamError::Channel(ChannelError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_capture_error_ends_session_without_retry() {
        // Arrange: the second capture fails
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), Some(2));
        let mut channel = RecordingChannel::closing_after(100);

        // Act
        let result = b.run(&mut channel, &AtomicBool::new(true)).await;

        // Assert: config + one frame went out, then the loop stopped
        assert!(matches!(result, Err(StreamError::Capture(_))));
        assert_eq!(channel.sent.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_display_geometry_is_rejected_before_config() {
        let (b, _) = broadcaster(DisplayGeometry::new(0, 900), None);
        let mut channel = RecordingChannel::closing_after(100);
        let result = b.run(&mut channel, &AtomicBool::new(true)).await;
        assert!(matches!(result, Err(StreamError::Geometry(_))));
        assert!(channel.sent.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_flag_stops_before_capturing() {
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), None);
        let mut channel = RecordingChannel::closing_after(100);
        let end = b.run(&mut channel, &AtomicBool::new(false)).await.unwrap();
        assert_eq!(end, StreamEnd::Shutdown { frames_sent: 0 });
        assert_eq!(channel.sent.len(), 1, "only the config goes out");
    }

    #[tokio::test]
    async fn test_fresh_connection_after_disconnect_resends_config() {
        // Arrange
        let (b, _) = broadcaster(DisplayGeometry::new(1440, 900), None);
        let running = AtomicBool::new(true);
        let mut first = RecordingChannel::failing_after(2, "reset by peer");

        // Act: first session dies mid-stream, second one starts fresh
        let first_result = b.run(&mut first, &running).await;
        let mut second = RecordingChannel::closing_after(2);
        let second_end = b.run(&mut second, &running).await.unwrap();

        // Assert
        assert!(first_result.is_err());
        assert!(matches!(second.sent[0], Sent::Text(_)));
        assert_eq!(second_end, StreamEnd::ChannelClosed { frames_sent: 1 });
    }

    #[tokio::test]
    async fn test_slow_send_delays_next_frame_without_catch_up_burst() {
        // Arrange: 20 ms period, the first frame send stalls for 70 ms
        let timeline = Timeline::default();
        let source: Box<dyn FrameSource> = Box::new(TimelineSource {
            display: DisplayGeometry::new(960, 600),
            timeline: timeline.clone(),
        });
        let b = StreamBroadcaster::new(
            Arc::new(Mutex::new(source)),
            SharedMapper::new(),
            StreamSettings {
                stream_width: 960,
                frame_delay: Duration::from_millis(20),
            },
        );
        let mut channel = StallingChannel {
            timeline: timeline.clone(),
            stall: Duration::from_millis(70),
            frames: 0,
            accept: 5,
        };

        // Act
        let end = b.run(&mut channel, &AtomicBool::new(true)).await.unwrap();

        // Assert: strictly capture, send, capture, send... never two in flight
        assert_eq!(end, StreamEnd::ChannelClosed { frames_sent: 5 });
        let timeline = timeline.lock().unwrap();
        let steps: Vec<Step> = timeline.iter().map(|(step, _)| *step).collect();
        let mut expected = [Step::Capture, Step::SendStart, Step::SendEnd].repeat(5);
        expected.push(Step::Capture);
        assert_eq!(steps, expected);

        // The overdue tick fires once, then the period resumes from there.
        let starts: Vec<Instant> = timeline
            .iter()
            .filter(|(step, _)| *step == Step::SendStart)
            .map(|(_, at)| *at)
            .collect();
        assert!(starts[1] - starts[0] >= Duration::from_millis(70));
        for pair in starts[1..].windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(15),
                "frames burst after the stall: gap of {gap:?}"
            );
        }
    }
}
