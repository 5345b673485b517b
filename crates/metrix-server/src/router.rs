//! Axum router wiring.
//!
//! Layers run outermost first: request log, response gzip, request gunzip,
//! body cap. Handlers never see compressed bytes.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, decompression::RequestDecompressionLayer};

use crate::{app_state::AppState, http, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::index))
        .route("/ping", get(ops::ping))
        .route("/update/", post(http::update::update_json))
        .route("/updates/", post(http::update::update_json))
        .route("/update/:kind/:name/:value", post(http::update::update_text))
        .route("/value/", post(http::value::value_json))
        .route("/value/:kind/:name", get(http::value::value_text))
        // Applies to the inflated body, so a small gzip bomb is still capped.
        .layer(DefaultBodyLimit::max(http::middleware::MAX_BODY_BYTES))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(http::middleware::log_request))
        .with_state(state)
}
