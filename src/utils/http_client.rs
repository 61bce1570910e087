use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::HttpConfig;
use crate::errors::{AppError, AppResult, FetchError};
use crate::utils::url::UrlUtils;

/// Read-only HTTP access used by the feed scanner and endpoint resolver
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch URL and return the body as text
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Default implementation of HttpFetcher using reqwest
///
/// Every request carries the configured identifying user agent.
#[derive(Clone)]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    pub fn new(config: &HttpConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

/// Classify a reqwest failure that happened before a response arrived
pub(crate) fn transport_error(url: &str, e: &reqwest::Error) -> FetchError {
    let message = UrlUtils::obfuscate_credentials(&e.to_string());
    FetchError::transport(UrlUtils::obfuscate_credentials(url), message, !e.is_builder())
}

#[async_trait]
impl HttpFetcher for StandardHttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching text content from: {}", UrlUtils::obfuscate_credentials(url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(
                status.as_u16(),
                UrlUtils::obfuscate_credentials(url),
            ));
        }

        let content = response
            .text()
            .await
            .map_err(|e| FetchError::body(UrlUtils::obfuscate_credentials(url), e.to_string()))?;

        debug!("Successfully fetched {} characters of text content", content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{addr}/live/abc/about.json"), handle)
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        )
        .await;

        let client = StandardHttpClient::new(&HttpConfig::default()).unwrap();
        let body = client.fetch_text(&url).await.unwrap();
        assert_eq!(body, "{}");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /live/abc/about.json"));
        assert!(request.contains("user-agent: desktop:com.camr12.viewerstats"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_transient() {
        let (url, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let client = StandardHttpClient::new(&HttpConfig::default()).unwrap();
        let err = client.fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }
}
