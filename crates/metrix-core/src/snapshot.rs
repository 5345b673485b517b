//! Serializable point-in-time copy of the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MetrixError, Result};

/// Both metric maps at one instant.
///
/// `BTreeMap` keeps the persisted file ordered by name, so consecutive saves of
/// an unchanged store are byte-identical. Unknown top-level keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "GaugeMetrics", default)]
    pub gauges: BTreeMap<String, f64>,
    #[serde(rename = "CounterMetrics", default)]
    pub counters: BTreeMap<String, i64>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty() && self.counters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    /// Pretty JSON used for the snapshot file.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| MetrixError::Persistence(format!("encode snapshot failed: {e}")))
    }

    /// Parse a snapshot file. Empty (or whitespace-only) input is "no prior
    /// state" and yields `None`; anything else must be a valid snapshot.
    pub fn from_json(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let snap: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| MetrixError::Persistence(format!("corrupt snapshot: {e}")))?;
        if let Some((name, _)) = snap.counters.iter().find(|(_, v)| **v < 0) {
            return Err(MetrixError::Persistence(format!(
                "corrupt snapshot: counter {name} is negative"
            )));
        }
        Ok(Some(snap))
    }
}
