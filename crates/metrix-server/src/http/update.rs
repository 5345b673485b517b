//! Update endpoints.
//!
//! Both wire forms are decoded into `MetricUpdate` here and nowhere else;
//! everything past this point works on the tagged union.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use bytes::Bytes;

use metrix_core::protocol::json::{Metrics, UpdateBody};
use metrix_core::protocol::path;
use metrix_core::MetrixError;

use crate::app_state::AppState;
use crate::http::ApiError;

/// `POST /update/{kind}/{name}/{value}`
pub async fn update_text(
    State(state): State<AppState>,
    Path((kind, name, raw)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let update = path::decode(&kind, &name, &raw)?;
    let merged = state.store().apply(&update)?;
    tracing::debug!(
        kind = %merged.kind(),
        metric = %merged.name(),
        value = %merged.value_text(),
        "update"
    );

    state.after_update(std::slice::from_ref(&merged)).await;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
    )
        .into_response())
}

/// `POST /update/` and `POST /updates/`
///
/// Accepts one object or an array. Arrays are applied atomically; the
/// response mirrors the request shape with post-merge values.
pub async fn update_json(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let parsed: UpdateBody = serde_json::from_slice(&body)
        .map_err(|e| MetrixError::BadRequest(format!("invalid json body: {e}")))?;
    let batch = parsed.is_batch();
    let updates = parsed.into_updates()?;

    let merged = state.store().apply_batch(&updates)?;
    tracing::debug!(count = merged.len(), batch, "json update");

    state.after_update(&merged).await;

    let mut echo: Vec<Metrics> = merged.iter().map(Metrics::from).collect();
    if !batch {
        if let Some(one) = echo.pop() {
            return Ok(Json(one).into_response());
        }
    }
    Ok(Json(echo).into_response())
}
