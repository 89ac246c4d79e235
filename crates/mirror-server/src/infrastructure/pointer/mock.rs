//! Recording pointer actuator for tests.
//!
//! `MockPointerActuator` performs no OS calls.  Every call is pushed into a
//! `Mutex<Vec<ActuatorCall>>` so assertions can inspect exactly what was
//! issued and in what order.
//!
//! It also keeps a simulated cursor: `down` and `drag` move it, and `up`
//! records wherever it currently is.  Tests can move it with
//! [`set_cursor`](MockPointerActuator::set_cursor) to model the OS cursor
//! drifting away from the last viewer position.
//!
//! Set `should_fail` (or build with [`failing`](MockPointerActuator::failing))
//! to make every call return [`ActuationError::Platform`].

use std::sync::{Mutex, PoisonError};

use mirror_core::Point;

use crate::application::pointer::{ActuationError, PointerActuator};

/// One recorded actuator call.  `Up` carries the cursor position at release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Down(Point),
    Drag(Point),
    Up(Point),
}

#[derive(Default)]
pub struct MockPointerActuator {
    pub calls: Mutex<Vec<ActuatorCall>>,
    pub cursor: Mutex<Point>,
    /// When `true`, every method returns an error without recording.
    pub should_fail: bool,
}

impl MockPointerActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the calls recorded so far.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_cursor(&self, at: Point) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    fn record(&self, call: ActuatorCall) -> Result<(), ActuationError> {
        if self.should_fail {
            return Err(ActuationError::Platform("mock failure".into()));
        }
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        Ok(())
    }
}

impl PointerActuator for MockPointerActuator {
    fn down(&self, at: Point) -> Result<(), ActuationError> {
        self.record(ActuatorCall::Down(at))?;
        self.set_cursor(at);
        Ok(())
    }

    fn drag(&self, to: Point) -> Result<(), ActuationError> {
        self.record(ActuatorCall::Drag(to))?;
        self.set_cursor(to);
        Ok(())
    }

    fn up(&self) -> Result<(), ActuationError> {
        let at = *self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        self.record(ActuatorCall::Up(at))
    }
}
