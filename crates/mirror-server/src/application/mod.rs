//! Application layer for mirror-server.
//!
//! Both long-lived loops live here, written against traits so neither knows
//! which capture device, transport, or pointer API sits underneath:
//!
//! - **`stream_broadcaster`** – the screen loop: establish geometry, send the
//!   config message, then capture → encode → send at a fixed cadence.
//! - **`gesture_tracker`** – the input loop body: parse one message, step the
//!   gesture state machine, drive the pointer.
//! - **`frame_source`** – the capture + encode abstraction and the shared
//!   JPEG encoder.
//! - **`pointer`** – the pointer-injection abstraction.
//!
//! # What does NOT belong here?
//!
//! - Sockets, WebSocket framing, or task spawning (infrastructure)
//! - OS capture or injection calls (infrastructure)

pub mod frame_source;
pub mod gesture_tracker;
pub mod pointer;
pub mod stream_broadcaster;

pub use frame_source::{CaptureError, EncodedFrame, FrameEncoder, FrameSource};
pub use gesture_tracker::{GestureTracker, TrackError};
pub use pointer::{ActuationError, PointerActuator};
pub use stream_broadcaster::{
    ChannelError, ScreenChannel, StreamBroadcaster, StreamEnd, StreamError, StreamSettings,
};
