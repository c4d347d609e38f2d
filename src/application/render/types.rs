use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend selected by a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Run a Rhai drawing script against an owned figure.
    Script,
    /// Compile a TikZ document with the external TeX toolchain.
    Compiled,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Script => "script",
            RenderMode::Compiled => "compiled",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = RenderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "script" => Ok(RenderMode::Script),
            "compiled" => Ok(RenderMode::Compiled),
            other => Err(RenderError::UnknownMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Rendering request handed to the dispatcher.
///
/// `mode` stays textual so that unknown modes reach the dispatcher and are
/// reported like every other failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub mode: String,
    pub code: String,
}

impl RenderRequest {
    pub fn new(mode: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            code: code.into(),
        }
    }

    pub fn script(code: impl Into<String>) -> Self {
        Self::new(RenderMode::Script.as_str(), code)
    }

    pub fn compiled(code: impl Into<String>) -> Self {
        Self::new(RenderMode::Compiled.as_str(), code)
    }
}

/// Uniform outcome of a render.
///
/// Built only through [`RenderResult::succeeded`] and [`RenderResult::failed`],
/// so `success` always agrees with which of `image` / `error` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    success: bool,
    image: Option<Vec<u8>>,
    error: Option<String>,
    diagnostic: Option<String>,
    error_code: Option<&'static str>,
}

impl RenderResult {
    pub fn succeeded(image: Vec<u8>) -> Self {
        Self {
            success: true,
            image: Some(image),
            error: None,
            diagnostic: None,
            error_code: None,
        }
    }

    pub fn failed(error: &RenderError) -> Self {
        Self {
            success: false,
            image: None,
            error: Some(error.to_string()),
            diagnostic: error.diagnostic().map(str::to_string),
            error_code: Some(error.code()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn into_image(self) -> Option<Vec<u8>> {
        self.image
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn error_code(&self) -> Option<&'static str> {
        self.error_code
    }
}

/// Failures surfaced by the rendering pipeline. The dispatcher converts every
/// variant into a [`RenderResult`]; none of them reach callers as faults.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("No code provided")]
    EmptyInput,
    #[error("Unknown mode: {mode}")]
    UnknownMode { mode: String },
    #[error("{message}")]
    CodeExecution { message: String, trace: String },
    #[error("{message}")]
    ToolchainUnavailable { message: String },
    #[error("{message}")]
    Compilation { message: String, log_tail: String },
    #[error("{message}")]
    Conversion { message: String },
    #[error("internal render failure: {message}")]
    Internal { message: String },
}

impl RenderError {
    pub fn code_execution(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self::CodeExecution {
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn toolchain_unavailable(message: impl Into<String>) -> Self {
        Self::ToolchainUnavailable {
            message: message.into(),
        }
    }

    pub fn compilation(message: impl Into<String>, log_tail: impl Into<String>) -> Self {
        Self::Compilation {
            message: message.into(),
            log_tail: log_tail.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable identifier for the failure class.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::EmptyInput => "empty_input",
            RenderError::UnknownMode { .. } => "unknown_mode",
            RenderError::CodeExecution { .. } => "code_execution",
            RenderError::ToolchainUnavailable { .. } => "toolchain_unavailable",
            RenderError::Compilation { .. } => "compilation",
            RenderError::Conversion { .. } => "conversion",
            RenderError::Internal { .. } => "internal",
        }
    }

    /// Extended trace for debugging, when the failure carries one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderError::CodeExecution { trace, .. } => Some(trace.as_str()),
            RenderError::Compilation { log_tail, .. } => Some(log_tail.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("script".parse::<RenderMode>().ok(), Some(RenderMode::Script));
        assert_eq!(
            "compiled".parse::<RenderMode>().ok(),
            Some(RenderMode::Compiled)
        );
    }

    #[test]
    fn unknown_mode_names_the_mode() {
        let err = "svg".parse::<RenderMode>().expect_err("unknown mode");
        assert_eq!(err.to_string(), "Unknown mode: svg");
        assert_eq!(err.code(), "unknown_mode");
    }

    #[test]
    fn failed_result_carries_message_and_trace() {
        let err = RenderError::code_execution("Runtime error: boom", "at draw (line 2)");
        let result = RenderResult::failed(&err);

        assert!(!result.success());
        assert!(result.image().is_none());
        assert_eq!(result.error(), Some("Runtime error: boom"));
        assert_eq!(result.diagnostic(), Some("at draw (line 2)"));
        assert_eq!(result.error_code(), Some("code_execution"));
    }

    #[test]
    fn succeeded_result_has_no_error() {
        let result = RenderResult::succeeded(vec![1, 2, 3]);
        assert!(result.success());
        assert_eq!(result.image(), Some(&[1u8, 2, 3][..]));
        assert!(result.error().is_none());
        assert!(result.error_code().is_none());
    }
}
