//! macOS CoreGraphics pointer injection.
//!
//! Each call creates a `CGEvent` from an HID-state event source and posts it
//! at the HID tap, the same level as physical mouse input.
//!
//! CoreGraphics global display coordinates have their origin at the top-left
//! of the main display, matching the coordinates the mapper produces, so no
//! flip is needed.
//!
//! # Accessibility permission
//!
//! Posting at `CGEventTapLocation::HID` requires the Accessibility permission.
//! Without it the events are silently dropped by the OS.

use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use mirror_core::Point;

use crate::application::pointer::{ActuationError, PointerActuator};

pub struct CoreGraphicsPointerActuator;

impl CoreGraphicsPointerActuator {
    /// # Errors
    ///
    /// [`ActuationError::Platform`] if no event source can be created.
    pub fn new() -> Result<Self, ActuationError> {
        source()?;
        Ok(Self)
    }

    fn post(kind: CGEventType, at: CGPoint) -> Result<(), ActuationError> {
        let event = CGEvent::new_mouse_event(source()?, kind, at, CGMouseButton::Left)
            .map_err(|()| ActuationError::Platform("cannot create mouse event".into()))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    /// The OS cursor position, read from an empty event.
    fn cursor() -> Result<CGPoint, ActuationError> {
        let event = CGEvent::new(source()?)
            .map_err(|()| ActuationError::Platform("cannot query cursor".into()))?;
        Ok(event.location())
    }
}

fn source() -> Result<CGEventSource, ActuationError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|()| ActuationError::Platform("cannot create CGEventSource".into()))
}

fn cg_point(p: Point) -> CGPoint {
    CGPoint::new(f64::from(p.x), f64::from(p.y))
}

impl PointerActuator for CoreGraphicsPointerActuator {
    fn down(&self, at: Point) -> Result<(), ActuationError> {
        Self::post(CGEventType::LeftMouseDown, cg_point(at))
    }

    fn drag(&self, to: Point) -> Result<(), ActuationError> {
        Self::post(CGEventType::LeftMouseDragged, cg_point(to))
    }

    fn up(&self) -> Result<(), ActuationError> {
        Self::post(CGEventType::LeftMouseUp, Self::cursor()?)
    }
}
