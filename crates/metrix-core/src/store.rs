//! Concurrent metric store.
//!
//! Two maps, one `Mutex` each. Every mutation and every copy-producing read is
//! a single critical section, so callers observe a linearizable history without
//! depending on request arrival order. Locks are never held across I/O: callers
//! that persist take a [`Snapshot`] first and write it afterwards.
//!
//! When both locks are needed (`snapshot`, `apply_batch`, `restore`) they are
//! taken in the fixed order gauges → counters.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{MetrixError, Result};
use crate::metric::{MetricKind, MetricUpdate, MetricValue};
use crate::snapshot::Snapshot;

#[derive(Debug, Default)]
pub struct MetricStore {
    gauges: Mutex<HashMap<String, f64>>,
    counters: Mutex<HashMap<String, i64>>,
}

// Every critical section is a single map operation, so a panic elsewhere can
// not leave a map half-written; recovering the guard is safe.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn add_delta(name: &str, current: i64, delta: i64) -> Result<i64> {
    if delta < 0 {
        return Err(MetrixError::BadRequest(format!(
            "counter {name}: delta must be non-negative, got {delta}"
        )));
    }
    current
        .checked_add(delta)
        .ok_or_else(|| MetrixError::BadRequest(format!("counter {name}: overflow")))
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from a snapshot.
    pub fn from_snapshot(snap: Snapshot) -> Self {
        let store = Self::new();
        store.restore(snap);
        store
    }

    /// Unconditional overwrite.
    pub fn set_gauge(&self, name: &str, value: f64) {
        lock(&self.gauges).insert(name.to_string(), value);
    }

    /// Add `delta` to the counter and return the new total.
    ///
    /// Negative deltas and overflow are rejected without touching the stored
    /// total.
    pub fn increment_counter(&self, name: &str, delta: i64) -> Result<i64> {
        let mut counters = lock(&self.counters);
        let current = counters.get(name).copied().unwrap_or(0);
        let total = add_delta(name, current, delta)?;
        counters.insert(name.to_string(), total);
        Ok(total)
    }

    pub fn get_gauge(&self, name: &str) -> Option<f64> {
        lock(&self.gauges).get(name).copied()
    }

    pub fn get_counter(&self, name: &str) -> Option<i64> {
        lock(&self.counters).get(name).copied()
    }

    /// Kind-dispatched lookup.
    pub fn get(&self, kind: MetricKind, name: &str) -> Option<MetricValue> {
        match kind {
            MetricKind::Gauge => self.get_gauge(name).map(|value| MetricValue::Gauge {
                name: name.to_string(),
                value,
            }),
            MetricKind::Counter => self.get_counter(name).map(|total| MetricValue::Counter {
                name: name.to_string(),
                total,
            }),
        }
    }

    /// Independent copy of all gauges.
    pub fn list_gauges(&self) -> HashMap<String, f64> {
        lock(&self.gauges).clone()
    }

    /// Independent copy of all counters.
    pub fn list_counters(&self) -> HashMap<String, i64> {
        lock(&self.counters).clone()
    }

    /// Validate and merge one update; returns the post-merge value.
    pub fn apply(&self, update: &MetricUpdate) -> Result<MetricValue> {
        update.validate()?;
        match update {
            MetricUpdate::Gauge { name, value } => {
                self.set_gauge(name, *value);
                Ok(MetricValue::Gauge { name: name.clone(), value: *value })
            }
            MetricUpdate::Counter { name, delta } => {
                let total = self.increment_counter(name, *delta)?;
                Ok(MetricValue::Counter { name: name.clone(), total })
            }
        }
    }

    /// Merge a batch atomically: either every update is applied, in order,
    /// or none is. Returns the value after each update.
    pub fn apply_batch(&self, updates: &[MetricUpdate]) -> Result<Vec<MetricValue>> {
        for u in updates {
            u.validate()?;
        }

        let mut gauges = lock(&self.gauges);
        let mut counters = lock(&self.counters);

        // Stage counter totals first so an overflow late in the batch leaves
        // the store untouched.
        let mut staged: HashMap<&str, i64> = HashMap::new();
        let mut out = Vec::with_capacity(updates.len());
        for u in updates {
            match u {
                MetricUpdate::Gauge { name, value } => {
                    out.push(MetricValue::Gauge { name: name.clone(), value: *value });
                }
                MetricUpdate::Counter { name, delta } => {
                    let current = match staged.get(name.as_str()) {
                        Some(v) => *v,
                        None => counters.get(name).copied().unwrap_or(0),
                    };
                    let total = add_delta(name, current, *delta)?;
                    staged.insert(name.as_str(), total);
                    out.push(MetricValue::Counter { name: name.clone(), total });
                }
            }
        }

        for u in updates {
            if let MetricUpdate::Gauge { name, value } = u {
                gauges.insert(name.clone(), *value);
            }
        }
        for (name, total) in staged {
            counters.insert(name.to_string(), total);
        }
        Ok(out)
    }

    /// Swap the whole gauge map in one critical section.
    pub fn replace_gauges(&self, next: HashMap<String, f64>) {
        *lock(&self.gauges) = next;
    }

    /// Consistent copy of both maps.
    pub fn snapshot(&self) -> Snapshot {
        let gauges = lock(&self.gauges);
        let counters = lock(&self.counters);
        Snapshot {
            gauges: gauges.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            counters: counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    /// Replace both maps with the snapshot contents.
    pub fn restore(&self, snap: Snapshot) {
        let mut gauges = lock(&self.gauges);
        let mut counters = lock(&self.counters);
        *gauges = snap.gauges.into_iter().collect();
        *counters = snap.counters.into_iter().collect();
        tracing::debug!(gauges = gauges.len(), counters = counters.len(), "store restored");
    }

    pub fn len(&self) -> usize {
        let gauges = lock(&self.gauges);
        let counters = lock(&self.counters);
        gauges.len() + counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
