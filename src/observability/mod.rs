//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! rpc / events / engine produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Key/value fields on every event (`account = %account`)
//! - Secrets never reach a log line
//! - Metrics are cheap atomic updates

pub mod logging;
pub mod metrics;
