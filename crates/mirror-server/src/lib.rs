//! mirror-server library crate.
//!
//! Streams the host screen to a remote viewer over one WebSocket channel and
//! replays the viewer's pointer gestures on the host from a second one.
//!
//! # Architecture
//!
//! ```text
//! capture device ─► FrameSource ─► StreamBroadcaster ─► screen channel ─► viewer
//! viewer ─► input channel ─► GestureTracker ─► CoordinateMapper ─► PointerActuator ─► OS
//!
//! [mirror-server]
//!   ├── domain/           ServerConfig and its file/CLI sources
//!   ├── application/      The two loops and the traits they drive
//!   └── infrastructure/
//!         ├── ws_server/  Accept loops for both channels (tokio-tungstenite)
//!         ├── capture/    FrameSource back-ends (synthetic, scrap)
//!         └── pointer/    PointerActuator back-ends (mock, dry-run, XTest, CoreGraphics)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O beyond reading its own config file.
//! - `application` depends on `domain` and `mirror-core`; it sees capture,
//!   transport, and pointer injection only through traits.
//! - `infrastructure` implements those traits and owns all sockets.

/// Domain layer: configuration.
pub mod domain;

/// Application layer: screen broadcast and gesture tracking loops.
pub mod application;

/// Infrastructure layer: WebSocket servers and platform adapters.
pub mod infrastructure;
