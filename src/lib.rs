//! figrender turns plotting scripts and TikZ sources into PNG images.
//!
//! The [`application::render`] module holds the rendering pipeline, [`infra`]
//! wires it to HTTP and telemetry, and [`config`] resolves layered settings.

pub mod application;
pub mod config;
pub mod infra;
