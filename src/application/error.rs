use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError};

/// Diagnostic carried on a response so the logging middleware can report
/// failures without the handler logging them itself.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failures: startup, configuration, binding, one-shot command I/O.
/// Per-request render failures never take this path.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let error = AppError::from(InfraError::from(io::Error::new(
            io::ErrorKind::AddrInUse,
            "address in use",
        )));
        let report = ErrorReport::from_error(
            "application::error::tests",
            StatusCode::INTERNAL_SERVER_ERROR,
            &error,
        );

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[0], "io error: address in use");
        assert_eq!(report.messages[1], "address in use");
    }

    #[test]
    fn report_attaches_to_response() {
        let mut response = Response::new(axum::body::Body::empty());
        ErrorReport::from_message("tests", StatusCode::BAD_REQUEST, "bad body").attach(&mut response);

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(report.messages, vec!["bad body".to_string()]);
    }
}
