use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::collector::MetricsCollector;

/// Prometheus scrape endpoint (`/metrics`) plus a liveness probe (`/health`)
pub struct MetricsServer {
    collector: Arc<MetricsCollector>,
    addr: String,
}

impl MetricsServer {
    pub fn new(collector: Arc<MetricsCollector>, addr: String) -> Self {
        Self { collector, addr }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .route("/health", get(|| async { "OK" }))
            .with_state(self.collector.clone())
    }

    /// Serve forever
    pub async fn serve(self) -> Result<(), MetricsServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), MetricsServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| MetricsServerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), MetricsServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.addr.clone());
        tracing::info!(addr = %local, "Metrics endpoint listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(MetricsServerError::Serve)?;

        tracing::info!(addr = %local, "Metrics endpoint stopped");
        Ok(())
    }
}

async fn scrape(State(collector): State<Arc<MetricsCollector>>) -> impl IntoResponse {
    match collector.export_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("failed to bind metrics endpoint to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics endpoint failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_scrape_and_health() {
        let collector = Arc::new(MetricsCollector::new());
        collector.record_transfer_created();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = MetricsServer::new(collector, addr.to_string());
        let task = tokio::spawn(server.serve_on(listener, async move {
            let _ = stop_rx.await;
        }));

        let health = get(addr, "/health").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.ends_with("OK"));

        let metrics = get(addr, "/metrics").await;
        assert!(metrics.starts_with("HTTP/1.1 200"));
        assert!(metrics.contains("account_escrow_transfers_created_total"));

        stop_tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let collector = Arc::new(MetricsCollector::new());
        let server = MetricsServer::new(collector, "not-an-address".to_string());
        assert_eq!(server.addr(), "not-an-address");

        let result = server.serve_with_shutdown(async {}).await;
        assert!(matches!(result, Err(MetricsServerError::Bind { .. })));
    }
}
