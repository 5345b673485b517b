//! Query endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use bytes::Bytes;

use metrix_core::protocol::json::Metrics;
use metrix_core::{MetricKind, MetrixError};

use crate::app_state::AppState;
use crate::http::ApiError;

/// `GET /value/{kind}/{name}`: plain-text value, 404 when absent.
pub async fn value_text(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let kind: MetricKind = kind.parse()?;
    let value = state
        .store()
        .get(kind, &name)
        .ok_or_else(|| MetrixError::NotFound(format!("{kind}/{name}")))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        value.value_text(),
    )
        .into_response())
}

/// `POST /value/` with `{"id", "type"}`: echoes the stored metric.
pub async fn value_json(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let req: Metrics = serde_json::from_slice(&body)
        .map_err(|e| MetrixError::BadRequest(format!("invalid json body: {e}")))?;
    let (kind, name) = req.key()?;
    let value = state
        .store()
        .get(kind, name)
        .ok_or_else(|| MetrixError::NotFound(format!("{kind}/{name}")))?;

    Ok(Json(Metrics::from(&value)).into_response())
}
