//! Domain entities for Desk Mirror.
//!
//! Pure logic only: nothing in this module performs I/O, spawns tasks, or
//! talks to the operating system.  The server crate wraps these types with
//! the capture, network, and pointer-injection adapters.

/// Viewer-space ↔ display-space coordinate mapping.
///
/// See [`geometry::CoordinateMapper`] for the main type.
pub mod geometry;

/// Pointer gesture state machine.
pub mod gesture;
