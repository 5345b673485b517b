//! Operational HTTP endpoints.
//!
//! - `/`     : HTML listing of every stored metric
//! - `/ping` : durable backend liveness (500 when absent or unreachable)

use std::fmt::Write as _;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use metrix_core::metric::format_gauge;
use metrix_core::MetrixError;

use crate::app_state::AppState;
use crate::http::ApiError;

pub async fn ping(State(state): State<AppState>) -> Result<Response, ApiError> {
    let backend = state
        .backend()
        .ok_or_else(|| MetrixError::Connect("no durable backend configured".into()))?;
    backend.ping().await?;
    Ok((StatusCode::OK, "ok").into_response())
}

pub async fn index(State(state): State<AppState>) -> Response {
    let snap = state.store().snapshot();

    let mut html = String::from("<html><body><h1>Gauge Metrics</h1><ul>");
    for (name, value) in &snap.gauges {
        let _ = write!(html, "<li>{}: {}</li>", escape(name), format_gauge(*value));
    }
    html.push_str("</ul><h1>Counter Metrics</h1><ul>");
    for (name, total) in &snap.counters {
        let _ = write!(html, "<li>{}: {}</li>", escape(name), total);
    }
    html.push_str("</ul></body></html>");

    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
