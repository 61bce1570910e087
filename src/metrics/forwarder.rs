//! Best-effort delivery of samples to the remote metrics endpoint
//!
//! Delivery failures are logged and dropped: a lost remote point must never
//! interrupt the streaming session or the local record.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{HttpConfig, MetricsConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{Credential, Sample};
use crate::utils::time::format_iso8601;
use crate::utils::url::UrlUtils;

/// Destination for samples after they were recorded locally
#[async_trait]
pub trait SampleForwarder: Send + Sync {
    /// Deliver one sample. Never fails from the caller's point of view.
    async fn forward(&self, sample: &Sample, credential: &Credential);
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MetricTags<'a> {
    pub slug: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MetricFields {
    pub viewers: i64,
}

/// One point as the ingestion endpoint expects it
#[derive(Debug, Serialize, PartialEq)]
pub struct MetricPoint<'a> {
    pub tags: MetricTags<'a>,
    pub fields: MetricFields,
    pub timestamp: String,
}

/// Request body for a sample: a one-element array
pub fn build_payload(sample: &Sample) -> Vec<MetricPoint<'_>> {
    vec![MetricPoint {
        tags: MetricTags {
            slug: &sample.thread_id,
            name: &sample.title,
        },
        fields: MetricFields {
            viewers: sample.viewer_count,
        },
        timestamp: format_iso8601(sample.observed_at),
    }]
}

/// HTTP implementation of SampleForwarder
pub struct MetricsForwarder {
    client: Client,
    endpoint: String,
    credential_header: String,
}

impl MetricsForwarder {
    pub fn new(metrics: &MetricsConfig, http: &HttpConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(http.user_agent.clone())
            .connect_timeout(http.connect_timeout)
            .timeout(metrics.timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create metrics client: {e}")))?;

        Ok(Self {
            client,
            endpoint: metrics.endpoint.clone(),
            credential_header: metrics.credential_header.clone(),
        })
    }
}

#[async_trait]
impl SampleForwarder for MetricsForwarder {
    async fn forward(&self, sample: &Sample, credential: &Credential) {
        let payload = build_payload(sample);

        let result = self
            .client
            .post(&self.endpoint)
            .header(self.credential_header.as_str(), credential.expose())
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "Forwarded {} viewers for thread {} (status {})",
                    sample.viewer_count,
                    sample.thread_id,
                    response.status()
                );
            }
            Ok(response) => {
                warn!(
                    "Metrics endpoint {} rejected sample for thread {}: {}",
                    UrlUtils::obfuscate_credentials(&self.endpoint),
                    sample.thread_id,
                    response.status()
                );
            }
            Err(e) => {
                warn!(
                    "Failed to forward sample for thread {}: {}",
                    sample.thread_id,
                    UrlUtils::obfuscate_credentials(&e.to_string())
                );
            }
        }
    }
}

/// Forwarder used when remote metrics are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopForwarder;

#[async_trait]
impl SampleForwarder for NoopForwarder {
    async fn forward(&self, sample: &Sample, _credential: &Credential) {
        debug!(
            "Metrics forwarding disabled, skipping sample for thread {}",
            sample.thread_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample() -> Sample {
        Sample {
            thread_id: "abc".to_string(),
            title: "Event X".to_string(),
            viewer_count: 42,
            observed_at: Utc.with_ymd_and_hms(2016, 5, 1, 14, 3, 22).unwrap(),
        }
    }

    /// Reads a full HTTP/1.1 request (headers plus content-length body)
    async fn read_request(socket: &mut tokio::net::TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let head = text[..split].to_string();
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                let body = &text[split + 4..];
                if body.len() >= content_length {
                    return (head, body.to_string());
                }
            }
        }
        panic!("connection closed before request was complete");
    }

    #[test]
    fn test_payload_shape() {
        let sample = sample();
        let payload = serde_json::to_value(build_payload(&sample)).unwrap();
        assert_eq!(
            payload,
            serde_json::json!([{
                "tags": {"slug": "abc", "name": "Event X"},
                "fields": {"viewers": 42},
                "timestamp": "2016-05-01T14:03:22Z"
            }])
        );
    }

    #[tokio::test]
    async fn test_forward_posts_json_with_credential_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            request
        });

        let metrics = MetricsConfig {
            endpoint: format!("http://{addr}/influx/"),
            ..MetricsConfig::default()
        };
        let forwarder = MetricsForwarder::new(&metrics, &HttpConfig::default()).unwrap();
        forwarder.forward(&sample(), &Credential::new("k3y")).await;

        let (head, body) = server.await.unwrap();
        let head = head.to_lowercase();
        assert!(head.starts_with("post /influx/ http/1.1"));
        assert!(head.contains("content-type: application/json"));
        assert!(head.contains("api-key: k3y"));

        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body[0]["fields"]["viewers"], 42);
        assert_eq!(body[0]["tags"]["slug"], "abc");
    }

    #[tokio::test]
    async fn test_forward_swallows_delivery_failure() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let metrics = MetricsConfig {
            endpoint: format!("http://{addr}/influx/"),
            timeout: Duration::from_secs(2),
            ..MetricsConfig::default()
        };
        let forwarder = MetricsForwarder::new(&metrics, &HttpConfig::default()).unwrap();

        // Returns unit; reaching the end of the test is the assertion
        forwarder.forward(&sample(), &Credential::new("k3y")).await;
    }
}
