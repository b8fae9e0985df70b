//! Health probe logic.
//!
//! Probes run concurrently across the fleet, one per server per cycle,
//! each with its own timeout so one slow instance cannot stall the phase.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use flock_core::HealthReport;

/// A failed health probe. The caller must treat all variants identically:
/// keep the server's last-known state and do not evict the server.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("request to {address} failed: {reason}")]
    Request { address: String, reason: String },

    #[error("{address} returned status {status}")]
    Status { address: String, status: u16 },

    #[error("malformed health body from {address}: {reason}")]
    Body { address: String, reason: String },

    #[error("probe of {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },
}

/// Probes instance health endpoints over http1.
#[derive(Debug, Clone)]
pub struct HealthProber {
    /// HTTP path of the health endpoint, e.g. "/health/".
    path: String,
    /// Timeout per probe.
    timeout: Duration,
}

impl HealthProber {
    /// Create a prober for the given health path and per-probe timeout.
    pub fn new(path: String, timeout: Duration) -> Self {
        Self { path, timeout }
    }

    /// Probe one server's health endpoint.
    pub async fn probe(&self, address: &str) -> Result<HealthReport, ProbeError> {
        let attempt = self.probe_inner(address);

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%address, timeout = ?self.timeout, "health probe timed out");
                Err(ProbeError::Timeout {
                    address: address.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn probe_inner(&self, address: &str) -> Result<HealthReport, ProbeError> {
        let uri = format!("http://{address}{}", self.path);

        let stream = tokio::net::TcpStream::connect(address).await.map_err(|e| {
            debug!(error = %e, %uri, "health probe connection failed");
            ProbeError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) =
            hyper::client::conn::http1::handshake(io).await.map_err(|e| {
                debug!(error = %e, %uri, "health probe handshake failed");
                ProbeError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                }
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "flock-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .unwrap();

        let resp = sender.send_request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "health probe request failed");
            ProbeError::Request {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            debug!(status = %status, %uri, "health probe non-2xx");
            return Err(ProbeError::Status {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        let body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| ProbeError::Body {
                address: address.to_string(),
                reason: e.to_string(),
            })?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|e| {
            debug!(error = %e, %uri, "health probe body malformed");
            ProbeError::Body {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    /// Serve one canned HTTP response, then close.
    async fn one_shot_server(response: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });
        addr
    }

    #[tokio::test]
    async fn probe_decodes_health_report() {
        let body = r#"{"available_capacity": 7, "ready_to_close": false}"#;
        let addr = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 50\r\n\r\n{\"available_capacity\": 7, \"ready_to_close\": false}",
        )
        .await;
        assert_eq!(body.len(), 50);

        let prober = HealthProber::new("/health/".to_string(), Duration::from_secs(1));
        let report = prober.probe(&addr).await.unwrap();
        assert_eq!(report.available_capacity, 7);
        assert!(!report.ready_to_close);
    }

    #[tokio::test]
    async fn probe_rejects_non_2xx() {
        let addr =
            one_shot_server("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n").await;

        let prober = HealthProber::new("/health/".to_string(), Duration::from_secs(1));
        let err = prober.probe(&addr).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn probe_rejects_malformed_body() {
        let addr = one_shot_server(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 14\r\n\r\n{\"nonsense\":1}",
        )
        .await;

        let prober = HealthProber::new("/health/".to_string(), Duration::from_secs(1));
        let err = prober.probe(&addr).await.unwrap_err();
        assert!(matches!(err, ProbeError::Body { .. }));
    }

    #[tokio::test]
    async fn probe_fails_on_closed_port() {
        // Bind and immediately drop to get an address nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let prober = HealthProber::new("/health/".to_string(), Duration::from_secs(1));
        let err = prober.probe(&addr).await.unwrap_err();
        assert!(matches!(err, ProbeError::Connect { .. }));
    }

    #[tokio::test]
    async fn probe_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let prober = HealthProber::new("/health/".to_string(), Duration::from_millis(50));
        let err = prober.probe(&addr).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }));
    }
}
