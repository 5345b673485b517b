//! Structured JSON form (`POST /update/`, `POST /value/`).

use serde::{Deserialize, Serialize};

use crate::error::{MetrixError, Result};
use crate::metric::{validate_name, MetricKind, MetricUpdate, MetricValue};

/// JSON metric body.
///
/// Gauges carry `value`, counters carry `delta`. In responses a counter's
/// `delta` holds the post-merge total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Metric name.
    pub id: String,
    /// `"gauge"` or `"counter"` (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub mtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metrics {
    /// Resolve `(kind, name)` for lookups; `value`/`delta` are ignored.
    pub fn key(&self) -> Result<(MetricKind, &str)> {
        let kind: MetricKind = self.mtype.parse()?;
        validate_name(&self.id)?;
        Ok((kind, self.id.as_str()))
    }

    /// Convert to a validated update. The field matching the kind is required.
    pub fn into_update(self) -> Result<MetricUpdate> {
        let kind: MetricKind = self.mtype.parse()?;
        let update = match kind {
            MetricKind::Gauge => {
                let value = self.value.ok_or_else(|| {
                    MetrixError::BadRequest(format!("gauge {}: missing value", self.id))
                })?;
                MetricUpdate::Gauge { name: self.id, value }
            }
            MetricKind::Counter => {
                let delta = self.delta.ok_or_else(|| {
                    MetrixError::BadRequest(format!("counter {}: missing delta", self.id))
                })?;
                MetricUpdate::Counter { name: self.id, delta }
            }
        };
        update.validate()?;
        Ok(update)
    }
}

impl From<&MetricUpdate> for Metrics {
    fn from(u: &MetricUpdate) -> Self {
        match u {
            MetricUpdate::Gauge { name, value } => Metrics {
                id: name.clone(),
                mtype: MetricKind::Gauge.as_str().to_string(),
                delta: None,
                value: Some(*value),
            },
            MetricUpdate::Counter { name, delta } => Metrics {
                id: name.clone(),
                mtype: MetricKind::Counter.as_str().to_string(),
                delta: Some(*delta),
                value: None,
            },
        }
    }
}

impl From<&MetricValue> for Metrics {
    fn from(v: &MetricValue) -> Self {
        match v {
            MetricValue::Gauge { name, value } => Metrics {
                id: name.clone(),
                mtype: MetricKind::Gauge.as_str().to_string(),
                delta: None,
                value: Some(*value),
            },
            MetricValue::Counter { name, total } => Metrics {
                id: name.clone(),
                mtype: MetricKind::Counter.as_str().to_string(),
                delta: Some(*total),
                value: None,
            },
        }
    }
}

/// `POST /update/` accepts either one object or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpdateBody {
    Many(Vec<Metrics>),
    One(Metrics),
}

impl UpdateBody {
    pub fn into_updates(self) -> Result<Vec<MetricUpdate>> {
        match self {
            UpdateBody::One(m) => Ok(vec![m.into_update()?]),
            UpdateBody::Many(ms) => {
                if ms.is_empty() {
                    return Err(MetrixError::BadRequest("empty metrics batch".into()));
                }
                ms.into_iter().map(Metrics::into_update).collect()
            }
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, UpdateBody::Many(_))
    }
}
