//! Collector HTTP handlers.
//!
//! - `update`: text (path) and JSON update endpoints
//! - `value`: text and JSON queries
//! - `middleware`: request logging and the body cap
//! - `error`: `MetrixError` -> HTTP response mapping

pub mod error;
pub mod middleware;
pub mod update;
pub mod value;

pub use error::ApiError;
