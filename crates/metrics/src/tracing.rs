use tracing::Instrument;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor a configured level is present
pub const DEFAULT_FILTER: &str = "info,account_escrow=debug";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; an empty `level` falls back to
/// [`DEFAULT_FILTER`]. Calling this twice returns [`TracingError::InitError`].
pub fn init_tracing(level: &str, json: bool) -> Result<(), TracingError> {
    let fallback = if level.trim().is_empty() {
        DEFAULT_FILTER
    } else {
        level
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| TracingError::InvalidFilter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init()
    };

    result.map_err(|e| TracingError::InitError(e.to_string()))
}

/// Correlation ID for tracking one operation across components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span context for one operation on a transfer
#[derive(Debug, Clone)]
pub struct TransferSpan {
    pub correlation_id: CorrelationId,
    pub transfer_id: String,
    pub operation: &'static str,
}

impl TransferSpan {
    pub fn new(transfer_id: impl Into<String>, operation: &'static str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            transfer_id: transfer_id.into(),
            operation,
        }
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "transfer",
            correlation_id = %self.correlation_id,
            transfer_id = %self.transfer_id,
            operation = self.operation,
        )
    }

    /// Enter the span on the current thread
    pub fn enter(&self) -> tracing::span::EnteredSpan {
        self.span().entered()
    }

    /// Run `fut` inside the span; use this across `.await` points
    pub fn instrument<F: std::future::Future>(&self, fut: F) -> tracing::instrument::Instrumented<F> {
        fut.instrument(self.span())
    }
}

/// Log an error with context before passing it on
pub trait ErrorContext {
    fn with_correlation_id(self, correlation_id: CorrelationId) -> Self;

    fn with_transfer_id(self, transfer_id: &str) -> Self;
}

impl<T, E> ErrorContext for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_correlation_id(self, correlation_id: CorrelationId) -> Self {
        self.map_err(|e| {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "error occurred"
            );
            e
        })
    }

    fn with_transfer_id(self, transfer_id: &str) -> Self {
        self.map_err(|e| {
            tracing::error!(
                transfer_id = %transfer_id,
                error = %e,
                "error occurred"
            );
            e
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("tracing initialization error: {0}")]
    InitError(String),
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_generation() {
        let id1 = CorrelationId::new();
        let id2 = CorrelationId::new();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_transfer_span_creation() {
        let span = TransferSpan::new("transfer-1", "monitoring_tick");

        assert_eq!(span.transfer_id, "transfer-1");
        assert_eq!(span.operation, "monitoring_tick");
    }

    #[test]
    fn test_error_context_passes_error_through() {
        let result: Result<(), String> = Err("boom".to_string());
        let result = result.with_transfer_id("transfer-1");
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn test_instrument_preserves_output() {
        let span = TransferSpan::new("transfer-1", "complete");
        let value = TransferSpan::instrument(&span, async { 7 }).await;
        assert_eq!(value, 7);
    }
}
