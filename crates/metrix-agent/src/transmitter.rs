//! Concurrent metric transmission.
//!
//! One future per metric, at most `max_in_flight` in flight. Every send is
//! bounded by the request timeout and raced against the cancellation token.
//! Outcomes are joined, never short-circuited: one failing metric does not
//! cancel its siblings.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use futures_util::{stream, StreamExt};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

use metrix_core::error::{MetrixError, Result};
use metrix_core::protocol::{json::Metrics, path};
use metrix_core::{MetricKind, MetricUpdate, Snapshot};

use crate::config::{AgentConfig, Encoding};

/// Destination for a single metric update.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn send(&self, update: &MetricUpdate) -> Result<()>;
}

/// A fully encoded request, ready to hand to the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRequest {
    pub url: String,
    pub content_type: &'static str,
    pub gzip: bool,
    pub body: Bytes,
}

/// Production sink: POSTs to the collector with reqwest.
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
    encoding: Encoding,
    gzip: bool,
}

impl HttpSink {
    pub fn new(base_url: &str, encoding: Encoding, gzip: bool, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MetrixError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            encoding,
            gzip,
        })
    }

    pub fn from_config(cfg: &AgentConfig) -> Result<Self> {
        Self::new(
            &cfg.agent.base_url(),
            cfg.transport.encoding,
            cfg.transport.gzip,
            cfg.transport.request_timeout(),
        )
    }

    pub fn encode(&self, update: &MetricUpdate) -> Result<EncodedRequest> {
        let (url, content_type, raw) = match self.encoding {
            Encoding::Text => (
                format!("{}/update/{}", self.base_url, path::encode(update)),
                "text/plain",
                update.value_text().into_bytes(),
            ),
            Encoding::Json => (
                format!("{}/update/", self.base_url),
                "application/json",
                serde_json::to_vec(&Metrics::from(update))
                    .map_err(|e| MetrixError::Internal(format!("encode {}: {e}", update.name())))?,
            ),
        };
        let body = if self.gzip { gzip(&raw)? } else { raw };
        Ok(EncodedRequest {
            url,
            content_type,
            gzip: self.gzip,
            body: Bytes::from(body),
        })
    }
}

fn gzip(raw: &[u8]) -> Result<Vec<u8>> {
    let encode_err = |e: std::io::Error| MetrixError::Internal(format!("gzip encode failed: {e}"));
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(raw).map_err(encode_err)?;
    enc.finish().map_err(encode_err)
}

#[async_trait]
impl MetricSink for HttpSink {
    async fn send(&self, update: &MetricUpdate) -> Result<()> {
        let req = self.encode(update)?;

        let mut builder = self.client.post(&req.url).header(CONTENT_TYPE, req.content_type);
        if req.gzip {
            builder = builder.header(CONTENT_ENCODING, "gzip");
        }
        let resp = builder
            .body(req.body)
            .send()
            .await
            .map_err(|e| MetrixError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let msg = resp.text().await.unwrap_or_default();
            return Err(MetrixError::Application { status: status.as_u16(), msg });
        }
        Ok(())
    }
}

/// Result of one metric's delivery attempt.
#[derive(Debug)]
pub struct SendOutcome {
    pub name: String,
    pub kind: MetricKind,
    pub result: Result<()>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub sent: usize,
    pub failed: usize,
}

impl ReportSummary {
    pub fn from_outcomes(outcomes: &[SendOutcome]) -> Self {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        Self { sent: outcomes.len() - failed, failed }
    }
}

/// Turn a store snapshot into the updates sent in one report.
///
/// Counters carry their accumulated total as the delta.
pub fn updates_from_snapshot(snap: &Snapshot) -> Vec<MetricUpdate> {
    let gauges = snap.gauges.iter().map(|(n, v)| MetricUpdate::gauge(n.clone(), *v));
    let counters = snap.counters.iter().map(|(n, d)| MetricUpdate::counter(n.clone(), *d));
    gauges.chain(counters).collect()
}

pub struct Transmitter {
    sink: Arc<dyn MetricSink>,
    max_in_flight: usize,
    timeout: Duration,
}

impl Transmitter {
    pub fn new(sink: Arc<dyn MetricSink>, max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            sink,
            max_in_flight: max_in_flight.max(1),
            timeout,
        }
    }

    /// Send every update; returns one outcome per update (in completion order).
    pub async fn transmit(
        &self,
        updates: Vec<MetricUpdate>,
        cancel: &CancellationToken,
    ) -> Vec<SendOutcome> {
        let sink = &self.sink;
        let timeout = self.timeout;

        stream::iter(updates)
            .map(move |update| async move {
                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(MetrixError::Transport("cancelled".into())),
                    r = tokio::time::timeout(timeout, sink.send(&update)) => match r {
                        Ok(r) => r,
                        Err(_) => Err(MetrixError::Transport(format!(
                            "timed out after {timeout:?}"
                        ))),
                    },
                };
                if let Err(e) = &result {
                    tracing::warn!(
                        metric = %update.name(),
                        kind = %update.kind(),
                        error = %e,
                        "send failed"
                    );
                }
                SendOutcome {
                    name: update.name().to_string(),
                    kind: update.kind(),
                    result,
                }
            })
            .buffer_unordered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await
    }
}
