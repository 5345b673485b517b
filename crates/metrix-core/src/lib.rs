//! metrix core: metric model, wire formats, the concurrent store and the
//! shared error type.
//!
//! This crate is used by both the collector (`metrix-server`) and the agent
//! (`metrix-agent`). It carries no transport or runtime dependencies, so the
//! merge rules and encodings are identical on both ends of the wire.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `MetrixError`/`Result` so a malformed
//! request can never take the collector down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metric;
pub mod protocol;
pub mod snapshot;
pub mod store;

/// Shared result type.
pub use error::{MetrixError, Result};
pub use metric::{MetricKind, MetricUpdate, MetricValue};
pub use snapshot::Snapshot;
pub use store::MetricStore;
