//! Output rendering.

pub mod render;

pub use render::*;
