//! Application layer: the rendering pipeline and process-level errors.

pub mod error;
pub mod render;
