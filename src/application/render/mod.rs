//! Rendering pipeline.
//!
//! Two independent backends turn caller-supplied source into PNG bytes: the
//! script renderer evaluates Rhai drawing code against an owned figure, and the
//! toolchain renderer compiles TikZ with external tools inside a scratch
//! workspace. [`RenderDispatcher`] validates requests, picks a backend and folds
//! every outcome into a [`RenderResult`].

mod dispatch;
pub mod script;
pub mod toolchain;
mod types;

pub use dispatch::{METRIC_RENDER_MS, METRIC_RENDER_TOTAL, RenderDispatcher};
pub use script::{ScriptOptions, ScriptRenderer, init_fonts};
pub use toolchain::{ToolchainOptions, ToolchainRenderer};
pub use types::{RenderError, RenderMode, RenderRequest, RenderResult};
