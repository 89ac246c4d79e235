//! Pointer injection back-ends.
//!
//! The platform implementation is selected at compile time via
//! `#[cfg(target_os = ...)]` and only built with the `native` feature.
//! [`native_actuator`] picks it for the running platform.

use std::sync::Arc;

use crate::application::pointer::{ActuationError, PointerActuator};

pub mod dry_run;
pub mod mock;

#[cfg(all(feature = "native", target_os = "linux"))]
pub mod linux;

#[cfg(all(feature = "native", target_os = "macos"))]
pub mod macos;

/// Opens the OS pointer back-end for this platform.
///
/// # Errors
///
/// [`ActuationError::Platform`] if the back-end cannot be opened (no X
/// display, missing permission) or the platform has no back-end.
#[cfg(feature = "native")]
pub fn native_actuator() -> Result<Arc<dyn PointerActuator>, ActuationError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(linux::XTestPointerActuator::open()?))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::CoreGraphicsPointerActuator::new()?))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(ActuationError::Platform(format!(
            "no pointer back-end for {}",
            std::env::consts::OS
        )))
    }
}

/// Without the `native` feature there is nothing to open.
#[cfg(not(feature = "native"))]
pub fn native_actuator() -> Result<Arc<dyn PointerActuator>, ActuationError> {
    Err(ActuationError::NotInitialized)
}
