//! Observability for the VK client.
//!
//! Provides tracing, metrics, and log redaction.

pub mod logging;
pub mod metrics;
pub mod tracing_utils;

pub use logging::*;
pub use metrics::*;
pub use tracing_utils::*;
