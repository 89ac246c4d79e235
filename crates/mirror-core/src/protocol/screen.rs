//! Screen-channel messages.
//!
//! The screen channel carries exactly one text message, the geometry
//! config, followed by binary JPEG frames.  Frames need no envelope: one
//! WebSocket binary message is one image, and channel order is frame order.
//!
//! ```json
//! {"type":"config","width":960,"height":600,"display_width":1440,"display_height":900}
//! ```
//!
//! `width`/`height` are the stream geometry the viewer should size its
//! canvas to; `display_width`/`display_height` describe the host display and
//! are informational.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::{DisplayGeometry, StreamGeometry};

/// Structured (text) messages sent host → viewer on the screen channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScreenMessage {
    /// Negotiated geometry; always the first message of a screen session.
    Config {
        width: u32,
        height: u32,
        display_width: u32,
        display_height: u32,
    },
}

impl ScreenMessage {
    pub fn config(stream: StreamGeometry, display: DisplayGeometry) -> Self {
        ScreenMessage::Config {
            width: stream.width,
            height: stream.height,
            display_width: display.width,
            display_height: display.height,
        }
    }

    /// Serializes to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
