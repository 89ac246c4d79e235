//! # mirror-core
//!
//! Shared library for Desk Mirror containing the pure logic behind the two
//! server loops: the geometry that relates the streamed image to the host
//! display, the pointer-gesture state machine, and the two wire protocols.
//!
//! It has no dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview
//!
//! Desk Mirror streams the host screen to a remote viewer (typically a tablet
//! browser) and replays the viewer's pointer gestures on the host.  Two
//! independent channels carry the traffic:
//!
//! - **screen channel** (host → viewer): one JSON config message, then a
//!   stream of JPEG frames.
//! - **input channel** (viewer → host): one text message per pointer event,
//!   e.g. `"down:120,48"`.
//!
//! This crate defines:
//!
//! - **`domain`** – [`CoordinateMapper`] (viewer space ↔ display space) and
//!   the [`GestureSession`] state machine that turns a stream of discrete
//!   events into strokes and clicks.
//!
//! - **`protocol`** – parsing/formatting of input-channel messages and the
//!   screen-channel config payload.

pub mod domain;
pub mod protocol;

pub use domain::geometry::{
    CoordinateMapper, DisplayGeometry, GeometryError, Point, SharedMapper, StreamGeometry,
};
pub use domain::gesture::{GestureError, GestureSession, GestureState, PointerCommand};
pub use protocol::input::{InputCommand, InputEvent, MalformedInput};
pub use protocol::screen::ScreenMessage;
