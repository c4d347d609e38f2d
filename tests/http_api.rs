use std::num::NonZeroUsize;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use figrender::{
    application::render::{RenderDispatcher, ScriptOptions, ToolchainOptions},
    infra::http::{HttpState, REQUEST_ID_HEADER, build_router},
};
use figrender_api_types::{HealthResponseBody, RenderResponseBody};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

struct TestApp {
    router: Router,
    _tools: TempDir,
}

fn app() -> TestApp {
    let tools = TempDir::new().expect("tools dir");
    let dispatcher = RenderDispatcher::new(
        ScriptOptions {
            dpi: 40.0,
            ..ScriptOptions::default()
        },
        ToolchainOptions {
            search_path: Some(tools.path().as_os_str().to_os_string()),
            ..ToolchainOptions::default()
        },
        NonZeroUsize::new(2).expect("non-zero"),
    );
    TestApp {
        router: build_router(HttpState::new(dispatcher)),
        _tools: tools,
    }
}

fn render_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/render")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, headers, bytes)
}

async fn render(app: &TestApp, body: &str) -> (StatusCode, RenderResponseBody) {
    let (status, _, bytes) = send(app, render_request(body)).await;
    let parsed = serde_json::from_slice(&bytes).expect("render response json");
    (status, parsed)
}

#[tokio::test]
async fn health_reports_capabilities() {
    let app = app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, headers, bytes) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    let body: HealthResponseBody = serde_json::from_slice(&bytes).expect("health json");
    assert_eq!(body.status, "ok");
    assert!(body.script);
    assert!(!body.compiled);
}

#[tokio::test]
async fn script_render_returns_base64_png() {
    let app = app();
    let (status, body) = render(
        &app,
        r#"{"mode":"script","code":"fn draw(fig, ax) { ax.plot([0, 1, 2], [0, 1, 4]); }"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.success, "error: {:?}", body.error);
    assert!(body.error.is_none());
    let image = STANDARD
        .decode(body.image.expect("image present"))
        .expect("valid base64");
    assert_eq!(&image[..8], &PNG_SIGNATURE);
}

#[tokio::test]
async fn mode_defaults_to_script() {
    let app = app();
    let (_, body) = render(&app, r#"{"code":"fn draw(fig, ax) { }"}"#).await;
    assert!(body.success, "error: {:?}", body.error);
}

#[tokio::test]
async fn missing_code_is_empty_input() {
    let app = app();
    let (status, body) = render(&app, r#"{"mode":"script"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.success);
    assert!(body.image.is_none());
    assert_eq!(body.error.as_deref(), Some("No code provided"));
    assert_eq!(body.error_code.as_deref(), Some("empty_input"));
}

#[tokio::test]
async fn unknown_mode_is_reported() {
    let app = app();
    let (status, body) = render(&app, r#"{"mode":"svg","code":"x"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.success);
    assert_eq!(body.error.as_deref(), Some("Unknown mode: svg"));
    assert_eq!(body.error_code.as_deref(), Some("unknown_mode"));
}

#[tokio::test]
async fn script_error_carries_diagnostic() {
    let app = app();
    let (_, body) = render(
        &app,
        r#"{"code":"fn draw(fig, ax) { throw \"bad data\"; }"}"#,
    )
    .await;

    assert!(!body.success);
    assert!(body.error.as_deref().is_some_and(|e| e.contains("bad data")));
    assert!(body.diagnostic.is_some_and(|d| !d.is_empty()));
    assert_eq!(body.error_code.as_deref(), Some("code_execution"));
}

#[tokio::test]
async fn compiled_without_toolchain_is_unavailable() {
    let app = app();
    let (_, body) = render(&app, r#"{"mode":"compiled","code":"\\draw (0,0) -- (1,1);"}"#).await;

    assert!(!body.success);
    assert_eq!(body.error_code.as_deref(), Some("toolchain_unavailable"));
    assert!(
        body.error
            .as_deref()
            .is_some_and(|e| e.contains("pdflatex not found"))
    );
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = app();
    let (status, body) = render(&app, "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body.success);
    assert!(body.image.is_none());
    assert_eq!(body.error_code.as_deref(), Some("invalid_request"));
}

#[tokio::test]
async fn preflight_is_answered_with_cors_headers() {
    let app = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/render")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .expect("request");
    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn preflight_allows_requested_headers() {
    let app = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/render")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-custom, content-type")
        .body(Body::empty())
        .expect("request");
    let (status, headers, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|v| v.to_str().ok()),
        Some("x-custom, content-type")
    );
}

#[tokio::test]
async fn render_responses_allow_any_origin() {
    let app = app();
    let (_, headers, _) = send(&app, render_request(r#"{"code":""}"#)).await;
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
