//! Path-encoded text form: `{kind}/{name}/{value}`.

use crate::error::{MetrixError, Result};
use crate::metric::{MetricKind, MetricUpdate};

/// Encode an update as the path tail after `/update/`.
pub fn encode(update: &MetricUpdate) -> String {
    format!("{}/{}/{}", update.kind(), update.name(), update.value_text())
}

/// Decode the three path segments of `POST /update/{kind}/{name}/{value}`.
///
/// Gauge values parse as `f64`, counter values as `i64`; anything else is a
/// `BadRequest`.
pub fn decode(kind: &str, name: &str, raw: &str) -> Result<MetricUpdate> {
    let kind: MetricKind = kind.parse()?;
    let update = match kind {
        MetricKind::Gauge => {
            let value = raw.trim().parse::<f64>().map_err(|e| {
                MetrixError::BadRequest(format!("gauge {name}: invalid value {raw:?}: {e}"))
            })?;
            MetricUpdate::gauge(name, value)
        }
        MetricKind::Counter => {
            let delta = raw.trim().parse::<i64>().map_err(|e| {
                MetrixError::BadRequest(format!("counter {name}: invalid value {raw:?}: {e}"))
            })?;
            MetricUpdate::counter(name, delta)
        }
    };
    update.validate()?;
    Ok(update)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn encode_gauge_and_counter() {
        assert_eq!(encode(&MetricUpdate::gauge("Alloc", 123.45)), "gauge/Alloc/123.45");
        assert_eq!(encode(&MetricUpdate::counter("PollCount", 3)), "counter/PollCount/3");
    }

    #[test]
    fn counter_rejects_fractional_value() {
        let err = decode("counter", "PollCount", "1.5").unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn unknown_kind_is_bad_request() {
        let err = decode("histogram", "x", "1").unwrap_err();
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
    }

    #[test]
    fn gauge_accepts_integer_text() {
        assert_eq!(decode("gauge", "Alloc", "5").unwrap(), MetricUpdate::gauge("Alloc", 5.0));
    }
}
