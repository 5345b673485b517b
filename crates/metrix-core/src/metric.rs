//! Metric model: kinds, updates and post-merge values.
//!
//! The wire carries kinds as strings; they are resolved into [`MetricKind`]
//! exactly once, at the request boundary, and every later stage works with the
//! tagged [`MetricUpdate`] / [`MetricValue`] types.

use std::fmt;
use std::str::FromStr;

use crate::error::{MetrixError, Result};

/// Metric kind. Gauges overwrite, counters accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    /// Wire name (`"gauge"` / `"counter"`).
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetrixError::BadRequest(format!("unknown metric kind: {other}"))),
        }
    }
}

/// One incoming write, already resolved to its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricUpdate {
    Gauge { name: String, value: f64 },
    Counter { name: String, delta: i64 },
}

impl MetricUpdate {
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        MetricUpdate::Gauge { name: name.into(), value }
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        MetricUpdate::Counter { name: name.into(), delta }
    }

    pub fn name(&self) -> &str {
        match self {
            MetricUpdate::Gauge { name, .. } | MetricUpdate::Counter { name, .. } => name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricUpdate::Gauge { .. } => MetricKind::Gauge,
            MetricUpdate::Counter { .. } => MetricKind::Counter,
        }
    }

    /// Decimal text of the carried value, as used in the path encoding.
    pub fn value_text(&self) -> String {
        match self {
            MetricUpdate::Gauge { value, .. } => format_gauge(*value),
            MetricUpdate::Counter { delta, .. } => delta.to_string(),
        }
    }

    /// Boundary checks shared by every wire form.
    ///
    /// Gauges must be finite (JSON has no NaN/inf); counters are monotonic so
    /// deltas must be non-negative.
    pub fn validate(&self) -> Result<()> {
        validate_name(self.name())?;
        match self {
            MetricUpdate::Gauge { name, value } if !value.is_finite() => Err(
                MetrixError::BadRequest(format!("gauge {name}: value must be finite")),
            ),
            MetricUpdate::Counter { name, delta } if *delta < 0 => Err(MetrixError::BadRequest(
                format!("counter {name}: delta must be non-negative, got {delta}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Post-merge state of one metric (what a query or an update echo returns).
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Gauge { name: String, value: f64 },
    Counter { name: String, total: i64 },
}

impl MetricValue {
    pub fn name(&self) -> &str {
        match self {
            MetricValue::Gauge { name, .. } | MetricValue::Counter { name, .. } => name,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge { .. } => MetricKind::Gauge,
            MetricValue::Counter { .. } => MetricKind::Counter,
        }
    }

    /// Plain-text rendering used by `GET /value/{kind}/{name}`.
    pub fn value_text(&self) -> String {
        match self {
            MetricValue::Gauge { value, .. } => format_gauge(*value),
            MetricValue::Counter { total, .. } => total.to_string(),
        }
    }
}

/// Shortest decimal form that round-trips (`123.45`, `7`, never exponent).
pub fn format_gauge(v: f64) -> String {
    format!("{v}")
}

/// Names are path segments on the text wire form.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MetrixError::BadRequest("metric name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(MetrixError::BadRequest(format!(
            "metric name must not contain '/': {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn kind_parses_only_lowercase_wire_names() {
        assert_eq!("gauge".parse::<MetricKind>().unwrap(), MetricKind::Gauge);
        assert_eq!("counter".parse::<MetricKind>().unwrap(), MetricKind::Counter);
        let err = "Gauge".parse::<MetricKind>().unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn gauge_text_has_no_trailing_zeros() {
        assert_eq!(format_gauge(123.45), "123.45");
        assert_eq!(format_gauge(7.0), "7");
        assert_eq!(format_gauge(0.5), "0.5");
    }

    #[test]
    fn validate_rejects_negative_delta_and_nan() {
        assert!(MetricUpdate::counter("c", -1).validate().is_err());
        assert!(MetricUpdate::counter("c", 0).validate().is_ok());
        assert!(MetricUpdate::gauge("g", f64::NAN).validate().is_err());
        assert!(MetricUpdate::gauge("g", f64::INFINITY).validate().is_err());
        assert!(MetricUpdate::gauge("", 1.0).validate().is_err());
        assert!(MetricUpdate::gauge("a/b", 1.0).validate().is_err());
    }
}
