//! Metrics and tracing for the account escrow platform
//!
//! Prometheus counters for transfers, monitoring checks, alerts and vault
//! access, an HTTP endpoint to scrape them, and the tracing subscriber setup
//! shared by every binary.
//!
//! # Example
//!
//! ```no_run
//! use account_escrow_metrics::{MetricsCollector, MetricsServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let collector = Arc::new(MetricsCollector::new());
//!     collector.record_transfer_created();
//!
//!     let server = MetricsServer::new(collector.clone(), "0.0.0.0:9090".to_string());
//!     server.serve().await.unwrap();
//! }
//! ```

pub mod collector;
pub mod http;
pub mod metrics;
pub mod tracing;

pub use collector::{MetricsCollector, MetricsError};
pub use http::{MetricsServer, MetricsServerError};
pub use tracing::{init_tracing, CorrelationId, ErrorContext, TracingError, TransferSpan};
