//! HTTP surface: `POST /render` and `GET /health` over the render dispatcher.

mod handlers;
mod middleware;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::render::RenderDispatcher;

use self::middleware::{cors, log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<RenderDispatcher>,
}

impl HttpState {
    pub fn new(dispatcher: RenderDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/render", post(handlers::render))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(cors))
        .layer(axum_middleware::from_fn(set_request_context))
}
