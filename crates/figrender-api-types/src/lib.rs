//! Wire types for the figrender HTTP API.
//!
//! These are shared between the server and any Rust client so both sides agree
//! on field names and defaults. Images travel as base64 text.

use serde::{Deserialize, Serialize};

/// Mode used when a request omits `mode`.
pub const DEFAULT_MODE: &str = "script";

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

/// Body accepted by `POST /render`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequestBody {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub code: String,
}

impl Default for RenderRequestBody {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            code: String::new(),
        }
    }
}

/// Body returned by `POST /render`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponseBody {
    pub success: bool,
    /// Base64-encoded PNG, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extended trace (script backtrace or compiler log tail).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponseBody {
    pub status: String,
    pub script: bool,
    pub compiled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_script_mode() {
        let body: RenderRequestBody =
            serde_json::from_str(r#"{"code":"fn draw(fig, ax) {}"}"#).expect("valid body");
        assert_eq!(body.mode, "script");
        assert_eq!(body.code, "fn draw(fig, ax) {}");
    }

    #[test]
    fn missing_code_defaults_to_empty() {
        let body: RenderRequestBody =
            serde_json::from_str(r#"{"mode":"compiled"}"#).expect("valid body");
        assert_eq!(body.mode, "compiled");
        assert!(body.code.is_empty());
    }

    #[test]
    fn failure_response_omits_image() {
        let body = RenderResponseBody {
            success: false,
            image: None,
            error: Some("No code provided".to_string()),
            diagnostic: None,
            error_code: Some("empty_input".to_string()),
        };
        let json = serde_json::to_value(&body).expect("serializable");
        assert!(json.get("image").is_none());
        assert_eq!(json["error"], "No code provided");
        assert_eq!(json["error_code"], "empty_input");
    }
}
