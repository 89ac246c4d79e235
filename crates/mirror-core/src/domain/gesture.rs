//! Pointer gesture state machine.
//!
//! The viewer reports a touch stroke as a sequence of discrete events
//! (`down`, any number of `move`, `up`) plus standalone `click`s.  This
//! module reconstructs strokes from that stream and decides which pointer
//! command, if any, each event produces.
//!
//! | State  | Event     | Command        | Next state            |
//! |--------|-----------|----------------|-----------------------|
//! | Idle   | down(p)   | `Down(p)`      | Active(anchor=p, last=p) |
//! | Idle   | move(p)   | none           | Idle (last-known = p) |
//! | Idle   | up        | none           | Idle                  |
//! | Idle   | click(p)  | `Click(p)`     | Idle                  |
//! | Active | move(p)   | `Drag(p)`      | Active(anchor, last=p) |
//! | Active | up        | `Up`           | Idle                  |
//! | Active | down(p)   | `Down(p)`      | Active(anchor=p, last=p) |
//! | Active | click(p)  | `Click(p)`     | Idle                  |
//!
//! All positions are mapped to display space before they reach a command.
//! [`PointerCommand::Up`] carries no position on purpose: the release is
//! issued wherever the OS cursor actually is, because drag events may have
//! been coalesced on the way.
//!
//! The session is a plain `Copy` value owned by one input connection and
//! threaded through [`GestureSession::apply`]; nothing is shared between
//! connections.

use thiserror::Error;

use crate::domain::geometry::{CoordinateMapper, GeometryError, Point};
use crate::protocol::input::{InputEvent, MalformedInput};

/// Errors that reject a single event.  The session is left unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GestureError {
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInput),

    #[error("cannot map event: {0}")]
    Mapping(#[from] GeometryError),
}

/// Stroke state of one input connection.  Points are in display space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Active { anchor: Point, last: Point },
}

/// A host-space pointer action produced by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerCommand {
    /// Press the primary button at a point.
    Down(Point),
    /// Move with the button held.
    Drag(Point),
    /// Release at the current OS cursor position.
    Up,
    /// Press and release at a point.
    Click(Point),
}

/// Per-connection gesture state plus the last position seen from the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureSession {
    state: GestureState,
    last_known: Option<Point>,
}

impl GestureSession {
    /// A fresh session, `Idle`, created when an input connection opens.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Last display-space position received, cleared when a stroke or click
    /// finishes.
    pub fn last_known(&self) -> Option<Point> {
        self.last_known
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GestureState::Active { .. })
    }

    /// Parses one wire message and applies it.  See [`apply`](Self::apply).
    ///
    /// # Errors
    ///
    /// [`GestureError::Malformed`] if `text` does not parse.
    pub fn apply_message(
        self,
        text: &str,
        mapper: &CoordinateMapper,
    ) -> Result<(Self, Option<PointerCommand>), GestureError> {
        let event: InputEvent = text.parse()?;
        self.apply(event, mapper)
    }

    /// Computes the next session and the command to issue for `event`.
    ///
    /// # Errors
    ///
    /// [`GestureError::Mapping`] if the event carries a position and the
    /// mapper has no geometry yet.  The caller keeps the old session.
    pub fn apply(
        self,
        event: InputEvent,
        mapper: &CoordinateMapper,
    ) -> Result<(Self, Option<PointerCommand>), GestureError> {
        let mapped = match event.position() {
            Some(viewer) => Some(mapper.to_display(viewer)?),
            None => None,
        };

        let (state, last_known, command) = match (self.state, event, mapped) {
            (_, InputEvent::Down(_), Some(p)) => (
                GestureState::Active { anchor: p, last: p },
                Some(p),
                Some(PointerCommand::Down(p)),
            ),
            (GestureState::Idle, InputEvent::Move(_), Some(p)) => {
                (GestureState::Idle, Some(p), None)
            }
            (GestureState::Active { anchor, .. }, InputEvent::Move(_), Some(p)) => (
                GestureState::Active { anchor, last: p },
                Some(p),
                Some(PointerCommand::Drag(p)),
            ),
            (GestureState::Idle, InputEvent::Up, _) => (GestureState::Idle, None, None),
            (GestureState::Active { .. }, InputEvent::Up, _) => {
                (GestureState::Idle, None, Some(PointerCommand::Up))
            }
            (_, InputEvent::Click(_), Some(p)) => {
                (GestureState::Idle, None, Some(PointerCommand::Click(p)))
            }
            // Positioned events always carry a mapped point by now.
            (state, _, None) => (state, self.last_known, None),
        };

        Ok((Self { state, last_known }, command))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
