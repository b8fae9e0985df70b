//! Compute provider trait and the HTTP provisioner client.
//!
//! `HttpProvider` speaks plain http1 to a provisioner service:
//!
//! ```text
//! POST   /instances       → 201 {"id": "...", "address": "host:port"}
//! DELETE /instances/{id}  → 204   (JSON body: {"reason": "..."})
//! GET    /instances       → 200 [{"id": "...", "address": "..."}, ...]
//! ```
//!
//! The deprovision reason travels in the request body, not the URI: reasons
//! are free-form operator text and must never be able to produce an invalid
//! request.
//!
//! The provisioner itself is expected to block the POST until the instance
//! is confirmed running, so a successful `provision()` always yields a
//! usable address. The client bounds that wait with `provision_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flock_core::ServerId;

use crate::error::ComputeError;

/// A freshly confirmed-running instance: handle plus resolved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launched {
    pub id: ServerId,
    /// `host:port` at which the instance accepts traffic and exposes health.
    pub address: String,
}

/// Contract for the compute provisioning backend.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Launch one instance and wait until it is confirmed running.
    async fn provision(&self) -> Result<Launched, ComputeError>;

    /// Request termination of an instance.
    async fn deprovision(&self, id: &ServerId, reason: &str) -> Result<(), ComputeError>;

    /// Enumerate instances already running, for startup adoption.
    async fn list_running(&self) -> Result<Vec<Launched>, ComputeError>;
}

/// HTTP client for a provisioner service.
pub struct HttpProvider {
    /// Base URL, e.g. "http://127.0.0.1:9090".
    endpoint: String,
    provision_timeout: Duration,
}

impl HttpProvider {
    /// Create a provider for the given base URL.
    pub fn new(endpoint: String, provision_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            provision_timeout,
        }
    }

    /// `host:port` to dial, derived from the endpoint URL.
    fn authority(&self) -> Result<String, String> {
        let uri: http::Uri = self
            .endpoint
            .parse()
            .map_err(|e| format!("bad endpoint {}: {e}", self.endpoint))?;
        let host = uri.host().ok_or_else(|| format!("no host in {}", self.endpoint))?;
        let port = uri.port_u16().unwrap_or(80);
        Ok(format!("{host}:{port}"))
    }

    /// One http1 request against the provisioner; returns status and body.
    async fn call(
        &self,
        method: &str,
        path: &str,
        body: Option<bytes::Bytes>,
    ) -> Result<(u16, bytes::Bytes), String> {
        let authority = self.authority()?;
        let uri = format!("{}{path}", self.endpoint);

        let stream = tokio::net::TcpStream::connect(&authority)
            .await
            .map_err(|e| format!("connect {authority}: {e}"))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake {authority}: {e}"))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", &authority)
            .header("user-agent", "flock-compute/0.1");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(http_body_util::Full::new(body.unwrap_or_default()))
            .map_err(|e| format!("build request {uri}: {e}"))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request {uri}: {e}"))?;

        let status = resp.status().as_u16();
        let body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| format!("body {uri}: {e}"))?
            .to_bytes();

        debug!(%uri, method, status, "provisioner call");
        Ok((status, body))
    }
}

#[async_trait]
impl ComputeProvider for HttpProvider {
    async fn provision(&self) -> Result<Launched, ComputeError> {
        let call = self.call("POST", "/instances", None);

        let (status, body) = tokio::time::timeout(self.provision_timeout, call)
            .await
            .map_err(|_| ComputeError::ProvisionTimeout(self.provision_timeout))?
            .map_err(ComputeError::Provision)?;

        if !(200..300).contains(&status) {
            return Err(ComputeError::Provision(format!(
                "provisioner returned status {status}"
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ComputeError::Provision(format!("malformed provisioner response: {e}")))
    }

    async fn deprovision(&self, id: &ServerId, reason: &str) -> Result<(), ComputeError> {
        let body = serde_json::to_vec(&serde_json::json!({ "reason": reason }))
            .map_err(|e| ComputeError::Deprovision(e.to_string()))?;

        let (status, _body) = self
            .call("DELETE", &format!("/instances/{id}"), Some(body.into()))
            .await
            .map_err(ComputeError::Deprovision)?;

        if !(200..300).contains(&status) {
            return Err(ComputeError::Deprovision(format!(
                "provisioner returned status {status}"
            )));
        }
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<Launched>, ComputeError> {
        let (status, body) = self
            .call("GET", "/instances", None)
            .await
            .map_err(ComputeError::List)?;

        if !(200..300).contains(&status) {
            return Err(ComputeError::List(format!(
                "provisioner returned status {status}"
            )));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ComputeError::List(format!("malformed provisioner response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_from_endpoint() {
        let p = HttpProvider::new("http://10.0.0.5:9090".to_string(), Duration::from_secs(1));
        assert_eq!(p.authority().unwrap(), "10.0.0.5:9090");
    }

    #[test]
    fn authority_defaults_to_port_80() {
        let p = HttpProvider::new("http://provisioner".to_string(), Duration::from_secs(1));
        assert_eq!(p.authority().unwrap(), "provisioner:80");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let p = HttpProvider::new("http://provisioner:9090/".to_string(), Duration::from_secs(1));
        assert_eq!(p.endpoint, "http://provisioner:9090");
    }

    #[test]
    fn launched_decodes_from_json() {
        let launched: Launched =
            serde_json::from_str(r#"{"id": "task-42", "address": "10.0.0.9:7777"}"#).unwrap();
        assert_eq!(launched.id, "task-42");
        assert_eq!(launched.address, "10.0.0.9:7777");
    }

    /// Serve one canned response after reading the full request, and hand
    /// the raw request bytes back for inspection.
    async fn capture_server(
        response: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                        .and_then(|l| l.split(':').nth(1))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });

        (addr, rx)
    }

    #[tokio::test]
    async fn deprovision_carries_free_form_reason_in_the_body() {
        // The reason the reap phase actually sends contains spaces; it must
        // never end up in the request URI, where it would be rejected.
        let (addr, captured) =
            capture_server("HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n").await;

        let p = HttpProvider::new(format!("http://{addr}"), Duration::from_secs(1));
        p.deprovision(&"task-1".to_string(), "drained after downscale")
            .await
            .unwrap();

        let request = captured.await.unwrap();
        assert!(request.starts_with("DELETE /instances/task-1 HTTP/1.1"), "{request}");
        assert!(request.contains(r#"{"reason":"drained after downscale"}"#), "{request}");
    }

    #[tokio::test]
    async fn deprovision_surfaces_backend_refusal() {
        let (addr, _captured) =
            capture_server("HTTP/1.1 409 Conflict\r\ncontent-length: 0\r\n\r\n").await;

        let p = HttpProvider::new(format!("http://{addr}"), Duration::from_secs(1));
        let err = p
            .deprovision(&"task-1".to_string(), "drained after downscale")
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::Deprovision(_)));
    }

    #[tokio::test]
    async fn provision_times_out_against_unresponsive_backend() {
        // A listener that accepts but never responds.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let p = HttpProvider::new(format!("http://{addr}"), Duration::from_millis(50));
        let result = p.provision().await;
        assert!(matches!(result, Err(ComputeError::ProvisionTimeout(_))));
    }
}
