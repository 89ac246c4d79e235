//! Wire formats for the screen and input channels.

pub mod input;
pub mod screen;
