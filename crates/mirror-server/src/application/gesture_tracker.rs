//! The input loop body.
//!
//! [`GestureTracker`] owns the [`GestureSession`] of one input connection.
//! For every text message it parses the event, steps the state machine
//! against the shared mapper, and turns the resulting [`PointerCommand`]
//! into [`PointerActuator`] calls.
//!
//! A click becomes a press, a `click_hold` pause, then a release at the actual
//! cursor position.
//!
//! Malformed or unmappable messages are rejected one at a time and leave the
//! session untouched; see [`TrackError::is_recoverable`].

use std::sync::Arc;
use std::time::Duration;

use mirror_core::{
    GestureError, GestureSession, GestureState, InputEvent, PointerCommand, SharedMapper,
};
use thiserror::Error;
use tracing::debug;

use crate::application::pointer::{ActuationError, PointerActuator};

/// Error type for handling one input message.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Bad message or no geometry yet.  The message is dropped.
    #[error(transparent)]
    Rejected(#[from] GestureError),

    /// The pointer back-end failed.  Ends the input connection.
    #[error("pointer injection failed: {0}")]
    Actuation(#[from] ActuationError),
}

impl TrackError {
    /// `true` if the connection should carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrackError::Rejected(_))
    }
}

/// Per-connection gesture tracker.
pub struct GestureTracker {
    actuator: Arc<dyn PointerActuator>,
    mapper: SharedMapper,
    click_hold: Duration,
    session: GestureSession,
}

impl GestureTracker {
    /// Creates a tracker in the `Idle` state.
    pub fn new(
        actuator: Arc<dyn PointerActuator>,
        mapper: SharedMapper,
        click_hold: Duration,
    ) -> Self {
        Self {
            actuator,
            mapper,
            click_hold,
            session: GestureSession::new(),
        }
    }

    pub fn session(&self) -> GestureSession {
        self.session
    }

    pub fn state(&self) -> GestureState {
        self.session.state()
    }

    /// Parses and handles one input-channel message.
    ///
    /// # Errors
    ///
    /// See [`handle_event`](Self::handle_event); additionally
    /// [`TrackError::Rejected`] if `text` is malformed.
    pub async fn handle_message(
        &mut self,
        text: &str,
    ) -> Result<Option<PointerCommand>, TrackError> {
        let event: InputEvent = text.parse().map_err(GestureError::from)?;
        self.handle_event(event).await
    }

    /// Steps the state machine and actuates the resulting command.
    ///
    /// Returns the command that was issued, if any.
    ///
    /// # Errors
    ///
    /// [`TrackError::Rejected`] if the event needs mapping before geometry is
    /// established (session unchanged); [`TrackError::Actuation`] if the
    /// pointer back-end fails.
    pub async fn handle_event(
        &mut self,
        event: InputEvent,
    ) -> Result<Option<PointerCommand>, TrackError> {
        let session = self.session;
        let (next, command) = self.mapper.with(|mapper| session.apply(event, mapper))?;
        self.session = next;

        if let Some(command) = command {
            debug!("{event} → {command:?}");
            self.actuate(command).await?;
        }
        Ok(command)
    }

    async fn actuate(&self, command: PointerCommand) -> Result<(), ActuationError> {
        match command {
            PointerCommand::Down(p) => self.actuator.down(p),
            PointerCommand::Drag(p) => self.actuator.drag(p),
            PointerCommand::Up => self.actuator.up(),
            PointerCommand::Click(p) => {
                self.actuator.down(p)?;
                tokio::time::sleep(self.click_hold).await;
                self.actuator.up()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
