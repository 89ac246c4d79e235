//! WebSocket servers for the screen and input channels.
//!
//! This module is responsible for:
//!
//! 1. Binding one TCP listener per channel.
//! 2. Accepting connections and upgrading them to WebSocket sessions.
//! 3. Admitting at most one session per channel ([`SessionSlot`]); a second
//!    viewer gets the handshake and then close code 1013 ("try again later").
//! 4. Running the screen loop ([`StreamBroadcaster`]) or the input loop
//!    ([`GestureTracker`]) for the admitted session.
//! 5. Stopping when the shared `running` flag is cleared.
//!
//! Both channels share one [`SharedMapper`]: the screen session writes it
//! when it starts, every input message reads it.
//!
//! A session ending, for whatever reason, never affects the listener or the
//! other channel.  Each termination is logged once, by the per-session
//! `handle_*` wrapper.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use mirror_core::SharedMapper;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::{
    ChannelError, EncodedFrame, FrameSource, GestureTracker, PointerActuator, ScreenChannel,
    StreamBroadcaster, StreamEnd, StreamSettings,
};
use crate::domain::config::ServerConfig;

/// How often idle loops wake up to look at the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Upper bound on waiting for the peer's close reply after rejecting it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<TcpStream>;

// ── Admission ─────────────────────────────────────────────────────────────────

/// Single-occupancy flag for one channel.
#[derive(Debug, Default)]
pub struct SessionSlot {
    busy: AtomicBool,
}

/// Holds a [`SessionSlot`] until dropped.
#[derive(Debug)]
pub struct SessionGuard {
    slot: Arc<SessionSlot>,
}

impl SessionSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot, or returns `None` if a session already holds it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionGuard {
                slot: Arc::clone(self),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

// ── Screen channel adapter ────────────────────────────────────────────────────

/// [`ScreenChannel`] over the write half of a WebSocket.
struct WsScreenChannel {
    sink: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl ScreenChannel for WsScreenChannel {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.sink.send(WsMessage::Text(text)).await.map_err(channel_error)
    }

    async fn send_frame(&mut self, frame: EncodedFrame) -> Result<(), ChannelError> {
        self.sink
            .send(WsMessage::Binary(frame.into_bytes()))
            .await
            .map_err(channel_error)
    }
}

fn channel_error(e: WsError) -> ChannelError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ChannelError::Closed,
        WsError::Io(ref io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) =>
        {
            ChannelError::Closed
        }
        other => ChannelError::Transport(other.to_string()),
    }
}

// ── Input loop dependencies ───────────────────────────────────────────────────

/// What each input session needs to build its [`GestureTracker`].
#[derive(Clone)]
pub struct InputContext {
    pub actuator: Arc<dyn PointerActuator>,
    pub mapper: SharedMapper,
    pub click_hold: Duration,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds both channels and serves them until `running` is cleared.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound (port in use, no
/// permission).  Session failures are logged, never returned.
pub async fn run_server(
    config: ServerConfig,
    frame_source: Box<dyn FrameSource>,
    actuator: Arc<dyn PointerActuator>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let screen_listener = TcpListener::bind(config.screen_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind screen listener on {}",
                config.screen_bind_addr
            )
        })?;
    let input_listener = TcpListener::bind(config.input_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind input listener on {}",
                config.input_bind_addr
            )
        })?;

    info!("screen channel listening on {}", config.screen_bind_addr);
    info!("input channel listening on {}", config.input_bind_addr);

    let mapper = SharedMapper::new();
    let broadcaster = StreamBroadcaster::new(
        Arc::new(Mutex::new(frame_source)),
        mapper.clone(),
        StreamSettings {
            stream_width: config.stream_width,
            frame_delay: config.frame_delay,
        },
    );
    let input = InputContext {
        actuator,
        mapper,
        click_hold: config.click_hold,
    };

    tokio::try_join!(
        serve_screen(screen_listener, broadcaster, Arc::clone(&running)),
        serve_input(input_listener, input, running),
    )?;
    Ok(())
}

/// Accept loop for the screen channel on an already-bound listener.
///
/// # Errors
///
/// Currently always `Ok`; accept errors are logged and the loop continues.
pub async fn serve_screen(
    listener: TcpListener,
    broadcaster: StreamBroadcaster,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let slot = SessionSlot::new();
    let broadcaster = Arc::new(broadcaster);

    accept_loop(&listener, &running, "screen", |stream, peer| {
        let slot = Arc::clone(&slot);
        let broadcaster = Arc::clone(&broadcaster);
        let running = Arc::clone(&running);
        tokio::spawn(handle_screen_session(stream, peer, slot, broadcaster, running));
    })
    .await;
    Ok(())
}

/// Accept loop for the input channel on an already-bound listener.
///
/// # Errors
///
/// Currently always `Ok`; accept errors are logged and the loop continues.
pub async fn serve_input(
    listener: TcpListener,
    input: InputContext,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let slot = SessionSlot::new();

    accept_loop(&listener, &running, "input", |stream, peer| {
        let slot = Arc::clone(&slot);
        let input = input.clone();
        let running = Arc::clone(&running);
        tokio::spawn(handle_input_session(stream, peer, slot, input, running));
    })
    .await;
    Ok(())
}

async fn accept_loop(
    listener: &TcpListener,
    running: &AtomicBool,
    channel: &'static str,
    mut on_accept: impl FnMut(TcpStream, SocketAddr),
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("{channel} channel: shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(SHUTDOWN_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!("{channel} channel: connection from {peer}");
                on_accept(stream, peer);
            }
            Ok(Err(e)) => error!("{channel} channel: accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-session handlers ──────────────────────────────────────────────────────

/// Outcome of a session that did not fail.
enum SessionEnd {
    Stream(StreamEnd),
    ViewerClosed,
    Shutdown,
    Rejected,
}

async fn handle_screen_session(
    stream: TcpStream,
    peer: SocketAddr,
    slot: Arc<SessionSlot>,
    broadcaster: Arc<StreamBroadcaster>,
    running: Arc<AtomicBool>,
) {
    let id = Uuid::new_v4();
    match run_screen_session(stream, peer, id, &slot, &broadcaster, &running).await {
        Ok(SessionEnd::Rejected) => {
            warn!("screen session {id} ({peer}) rejected: another viewer is connected")
        }
        Ok(SessionEnd::Stream(StreamEnd::ChannelClosed { frames_sent })) => {
            info!("screen session {id} ({peer}) closed by viewer after {frames_sent} frames")
        }
        Ok(SessionEnd::Stream(StreamEnd::Shutdown { frames_sent })) => {
            info!("screen session {id} ({peer}) stopped for shutdown after {frames_sent} frames")
        }
        Ok(_) => info!("screen session {id} ({peer}) closed by viewer"),
        Err(e) => warn!("screen session {id} ({peer}) ended with error: {e:#}"),
    }
}

async fn run_screen_session(
    stream: TcpStream,
    peer: SocketAddr,
    id: Uuid,
    slot: &Arc<SessionSlot>,
    broadcaster: &StreamBroadcaster,
    running: &AtomicBool,
) -> anyhow::Result<SessionEnd> {
    let ws = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let Some(_guard) = slot.try_acquire() else {
        reject(ws).await;
        return Ok(SessionEnd::Rejected);
    };
    info!("screen session {id} started for {peer}");

    let (sink, mut incoming) = ws.split();
    let mut channel = WsScreenChannel { sink };

    // Drained so control frames get answered and a close is seen.
    let viewer_gone = async {
        while let Some(message) = incoming.next().await {
            match message {
                Ok(WsMessage::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    tokio::select! {
        result = broadcaster.run(&mut channel, running) => {
            Ok(SessionEnd::Stream(result.context("screen loop failed")?))
        }
        _ = viewer_gone => Ok(SessionEnd::ViewerClosed),
    }
}

async fn handle_input_session(
    stream: TcpStream,
    peer: SocketAddr,
    slot: Arc<SessionSlot>,
    input: InputContext,
    running: Arc<AtomicBool>,
) {
    let id = Uuid::new_v4();
    match run_input_session(stream, peer, id, &slot, input, &running).await {
        Ok(SessionEnd::Rejected) => {
            warn!("input session {id} ({peer}) rejected: another viewer is connected")
        }
        Ok(SessionEnd::Shutdown) => info!("input session {id} ({peer}) stopped for shutdown"),
        Ok(_) => info!("input session {id} ({peer}) closed by viewer"),
        Err(e) => warn!("input session {id} ({peer}) ended with error: {e:#}"),
    }
}

async fn run_input_session(
    stream: TcpStream,
    peer: SocketAddr,
    id: Uuid,
    slot: &Arc<SessionSlot>,
    input: InputContext,
    running: &AtomicBool,
) -> anyhow::Result<SessionEnd> {
    let mut ws = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let Some(_guard) = slot.try_acquire() else {
        reject(ws).await;
        return Ok(SessionEnd::Rejected);
    };
    info!("input session {id} started for {peer}");

    let mut tracker = GestureTracker::new(input.actuator, input.mapper, input.click_hold);

    loop {
        if !running.load(Ordering::Relaxed) {
            return Ok(SessionEnd::Shutdown);
        }

        let message = match timeout(SHUTDOWN_POLL, ws.next()).await {
            Err(_) => continue,
            Ok(None) => return Ok(SessionEnd::ViewerClosed),
            Ok(Some(Err(WsError::ConnectionClosed | WsError::Protocol(_)))) => {
                return Ok(SessionEnd::ViewerClosed)
            }
            Ok(Some(Err(e))) => return Err(e).context("input channel read failed"),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            WsMessage::Text(text) => {
                // No actuation once shutdown has begun.
                if !running.load(Ordering::Relaxed) {
                    return Ok(SessionEnd::Shutdown);
                }
                match tracker.handle_message(&text).await {
                    Ok(_) => {}
                    Err(e) if e.is_recoverable() => {
                        warn!("input session {id}: dropped {text:?}: {e}")
                    }
                    Err(e) => return Err(e).context("pointer injection failed"),
                }
            }
            WsMessage::Binary(data) => {
                warn!(
                    "input session {id}: unexpected binary message ({} bytes, ignored)",
                    data.len()
                );
            }
            WsMessage::Close(_) => return Ok(SessionEnd::ViewerClosed),
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
        }
    }
}

/// Closes a surplus connection with 1013 "try again later".
async fn reject(mut ws: WsStream) {
    let frame = CloseFrame {
        code: CloseCode::Again,
        reason: "another viewer is connected".into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!("close of rejected connection failed: {e}");
        return;
    }
    // Let the peer's close reply arrive so the handshake ends cleanly.
    let _ = timeout(CLOSE_TIMEOUT, async {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
