//! Pointer actuator that only logs.
//!
//! Used when the server is built without the `native` feature, or when the
//! native back-end cannot be opened (headless host).  The full input path
//! still runs (parsing, mapping, gesture tracking), so a viewer can be
//! exercised end to end without touching the real pointer.

use std::sync::{Mutex, PoisonError};

use mirror_core::Point;
use tracing::info;

use crate::application::pointer::{ActuationError, PointerActuator};

#[derive(Debug, Default)]
pub struct DryRunPointerActuator {
    cursor: Mutex<Point>,
}

impl DryRunPointerActuator {
    pub fn new() -> Self {
        Self::default()
    }

    fn move_to(&self, at: Point) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl PointerActuator for DryRunPointerActuator {
    fn down(&self, at: Point) -> Result<(), ActuationError> {
        self.move_to(at);
        info!("[dry-run] button down at ({}, {})", at.x, at.y);
        Ok(())
    }

    fn drag(&self, to: Point) -> Result<(), ActuationError> {
        self.move_to(to);
        info!("[dry-run] drag to ({}, {})", to.x, to.y);
        Ok(())
    }

    fn up(&self) -> Result<(), ActuationError> {
        let at = *self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        info!("[dry-run] button up at ({}, {})", at.x, at.y);
        Ok(())
    }
}
