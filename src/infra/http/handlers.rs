use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use figrender_api_types::{HealthResponseBody, RenderRequestBody, RenderResponseBody};

use crate::application::{
    error::ErrorReport,
    render::{RenderRequest, RenderResult},
};

use super::HttpState;

const INVALID_REQUEST: &str = "invalid_request";

pub(super) async fn render(
    State(state): State<HttpState>,
    payload: Result<Json<RenderRequestBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return invalid_request(&rejection),
    };

    let request = RenderRequest::new(body.mode, body.code);
    let result = state.dispatcher.dispatch(&request).await;
    Json(response_body(result)).into_response()
}

pub(super) async fn health(State(state): State<HttpState>) -> Json<HealthResponseBody> {
    Json(HealthResponseBody {
        status: "ok".to_string(),
        script: true,
        compiled: state.dispatcher.compiled_available(),
    })
}

fn response_body(result: RenderResult) -> RenderResponseBody {
    RenderResponseBody {
        success: result.success(),
        error: result.error().map(str::to_string),
        diagnostic: result.diagnostic().map(str::to_string),
        error_code: result.error_code().map(str::to_string),
        image: result.into_image().map(|png| STANDARD.encode(png)),
    }
}

fn invalid_request(rejection: &JsonRejection) -> Response {
    let status = StatusCode::BAD_REQUEST;
    let body = RenderResponseBody {
        success: false,
        image: None,
        error: Some(format!("Invalid request body: {}", rejection.body_text())),
        diagnostic: None,
        error_code: Some(INVALID_REQUEST.to_string()),
    };
    let mut response = (status, Json(body)).into_response();
    ErrorReport::from_error("infra::http::handlers::render", status, rejection)
        .attach(&mut response);
    response
}
