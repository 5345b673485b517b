//! Wire formats (path-encoded text + structured JSON).
//!
//! The collector accepts both forms independently of each other:
//! - Text form: `kind/name/value` embedded in the request path.
//! - JSON form: `{id, type, value?, delta?}` bodies, single or batched.
//!
//! Both decoders end in [`MetricUpdate::validate`](crate::MetricUpdate::validate),
//! so the merge engine never sees an update that one form would reject and the
//! other would accept.

pub mod json;
pub mod path;
