//! Infrastructure layer for mirror-server.
//!
//! Everything that touches the OS or the network lives here.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `mirror_core`, but MUST NOT be imported by the `application` or `domain`
//! layers.
//!
//! # Sub-modules
//!
//! - **`ws_server`** – the two accept loops.  One screen connection and one
//!   input connection are served at a time; extra connections are refused.
//! - **`capture`** – [`FrameSource`](crate::application::FrameSource)
//!   back-ends: a synthetic test pattern and, with the `native` feature, the
//!   primary display via `scrap`.
//! - **`pointer`** – [`PointerActuator`](crate::application::PointerActuator)
//!   back-ends.  The real ones are selected at compile time with
//!   `#[cfg(target_os)]`; a recording mock and a dry-run logger are always
//!   available.

pub mod capture;
pub mod pointer;
pub mod ws_server;
