//! Linux X11 pointer injection via the XTest extension.
//!
//! `XTestFakeMotionEvent` moves the cursor to absolute screen coordinates and
//! `XTestFakeButtonEvent` presses or releases button 1.  Synthesized events
//! reach the focused window exactly like hardware input.
//!
//! # Permissions
//!
//! The process needs access to the X display named by `DISPLAY`.  If it is
//! unset or the server refuses the connection, [`XTestPointerActuator::open`]
//! fails with [`ActuationError::Platform`].
//!
//! # Threading
//!
//! Xlib is not thread-safe without `XInitThreads`.  The display pointer is
//! kept behind a `Mutex` so only one call talks to the server at a time.

use std::os::raw::{c_int, c_uint};
use std::ptr;
use std::sync::Mutex;

use mirror_core::Point;
use tracing::{debug, info};
use x11::{xlib, xtest};

use crate::application::pointer::{ActuationError, PointerActuator};

/// `CurrentTime`: let the server timestamp the synthesized event.
const CURRENT_TIME: xlib::Time = 0;

/// `-1` selects the screen that currently contains the pointer.
const SCREEN_DEFAULT: c_int = -1;

const PRIMARY_BUTTON: c_uint = 1;

struct DisplayHandle(*mut xlib::Display);

// SAFETY: the pointer is only dereferenced by Xlib while the owning Mutex is
// held, so it is never used from two threads at once.
unsafe impl Send for DisplayHandle {}

pub struct XTestPointerActuator {
    display: Mutex<DisplayHandle>,
}

impl XTestPointerActuator {
    /// Connects to the X display and checks the XTest extension is present.
    ///
    /// # Errors
    ///
    /// Returns [`ActuationError::Platform`] if the display cannot be opened or
    /// lacks XTest.
    pub fn open() -> Result<Self, ActuationError> {
        // SAFETY: a null name means "use $DISPLAY"; the result is checked.
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            return Err(ActuationError::Platform(
                "cannot open X display (is DISPLAY set?)".into(),
            ));
        }

        let (mut event_base, mut error_base, mut major, mut minor): (c_int, c_int, c_int, c_int) =
            (0, 0, 0, 0);
        // SAFETY: display is non-null and the out-pointers are valid locals.
        let has_xtest = unsafe {
            xtest::XTestQueryExtension(
                display,
                &mut event_base,
                &mut error_base,
                &mut major,
                &mut minor,
            )
        };
        if has_xtest == 0 {
            // SAFETY: display came from XOpenDisplay and is not used again.
            unsafe { xlib::XCloseDisplay(display) };
            return Err(ActuationError::Platform(
                "X server has no XTest extension".into(),
            ));
        }

        info!("XTest {major}.{minor} pointer back-end ready");
        Ok(Self {
            display: Mutex::new(DisplayHandle(display)),
        })
    }

    fn with_display<R>(
        &self,
        f: impl FnOnce(*mut xlib::Display) -> R,
    ) -> Result<R, ActuationError> {
        let guard = self
            .display
            .lock()
            .map_err(|_| ActuationError::Platform("X display lock poisoned".into()))?;
        let result = f(guard.0);
        // SAFETY: the display is open for the lifetime of self.
        unsafe { xlib::XFlush(guard.0) };
        Ok(result)
    }

    fn motion(display: *mut xlib::Display, at: Point) {
        // SAFETY: display is open; coordinates are absolute root pixels.
        unsafe { xtest::XTestFakeMotionEvent(display, SCREEN_DEFAULT, at.x, at.y, CURRENT_TIME) };
    }

    fn button(display: *mut xlib::Display, pressed: bool) {
        // SAFETY: display is open.
        unsafe {
            xtest::XTestFakeButtonEvent(
                display,
                PRIMARY_BUTTON,
                if pressed { xlib::True } else { xlib::False },
                CURRENT_TIME,
            )
        };
    }

    /// Reads the cursor position from the server.
    fn cursor(display: *mut xlib::Display) -> Option<Point> {
        let (mut root, mut child): (xlib::Window, xlib::Window) = (0, 0);
        let (mut root_x, mut root_y, mut win_x, mut win_y): (c_int, c_int, c_int, c_int) =
            (0, 0, 0, 0);
        let mut mask: c_uint = 0;
        // SAFETY: display is open and every out-pointer is a valid local.
        let ok = unsafe {
            xlib::XQueryPointer(
                display,
                xlib::XDefaultRootWindow(display),
                &mut root,
                &mut child,
                &mut root_x,
                &mut root_y,
                &mut win_x,
                &mut win_y,
                &mut mask,
            )
        };
        (ok != 0).then(|| Point::new(root_x, root_y))
    }
}

impl Drop for XTestPointerActuator {
    fn drop(&mut self) {
        if let Ok(guard) = self.display.lock() {
            // SAFETY: the display was opened in `open` and is closed once.
            unsafe { xlib::XCloseDisplay(guard.0) };
        }
    }
}

impl PointerActuator for XTestPointerActuator {
    fn down(&self, at: Point) -> Result<(), ActuationError> {
        self.with_display(|d| {
            Self::motion(d, at);
            Self::button(d, true);
        })
    }

    fn drag(&self, to: Point) -> Result<(), ActuationError> {
        self.with_display(|d| Self::motion(d, to))
    }

    fn up(&self) -> Result<(), ActuationError> {
        self.with_display(|d| {
            if let Some(at) = Self::cursor(d) {
                debug!("releasing at ({}, {})", at.x, at.y);
            }
            Self::button(d, false);
        })
    }
}
