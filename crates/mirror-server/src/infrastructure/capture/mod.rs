//! [`FrameSource`](crate::application::FrameSource) back-ends.
//!
//! - [`synthetic::SyntheticFrameSource`] renders a moving test pattern and
//!   needs no display server.  It is the default.
//! - `scrap::ScrapFrameSource` grabs the primary display; only built with
//!   the `native` feature.

pub mod synthetic;

#[cfg(feature = "native")]
pub mod scrap;
