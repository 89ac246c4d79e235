//! Pointer injection abstraction.
//!
//! [`PointerActuator`] wraps whatever the platform offers for synthesizing
//! primary-button mouse events.  Implementations live in
//! `infrastructure::pointer`; the gesture tracker is the only caller and it
//! guarantees `drag` is only issued between a `down` and the matching `up`.

use mirror_core::Point;
use thiserror::Error;

/// Error type for pointer injection.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("pointer back-end not initialized")]
    NotInitialized,
}

/// Synthesizes primary-button pointer events in display space.
///
/// Calls are expected to be fast and non-blocking.
pub trait PointerActuator: Send + Sync {
    /// Moves the cursor to `at` and presses the primary button.
    fn down(&self, at: Point) -> Result<(), ActuationError>;

    /// Moves the cursor to `to` with the button held.
    fn drag(&self, to: Point) -> Result<(), ActuationError>;

    /// Releases the primary button wherever the OS cursor currently is.
    ///
    /// The position is read from the OS at call time rather than taken from
    /// the viewer, since drag events may have been coalesced on the way.
    fn up(&self) -> Result<(), ActuationError>;
}
