//! Endpoint resolver
//!
//! Turns a thread identifier into its streaming endpoint by reading the
//! thread's metadata document. Transient HTTP failures are retried a fixed
//! number of times with a fixed delay; running out of attempts yields
//! [`ResolveError::Exhausted`], which callers treat as fatal.

use serde::Deserialize;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ResolverConfig;
use crate::errors::{ResolveError, ResolveResult};
use crate::models::ResolvedEndpoint;
use crate::storage::RecordStore;
use crate::utils::http_client::HttpFetcher;
use crate::utils::url::UrlUtils;

#[derive(Debug, Deserialize)]
struct AboutDocument {
    data: AboutData,
}

#[derive(Debug, Deserialize)]
struct AboutData {
    #[serde(default)]
    websocket_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Clone)]
pub struct EndpointResolver {
    fetcher: Arc<dyn HttpFetcher>,
    store: RecordStore,
    config: ResolverConfig,
}

impl EndpointResolver {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, store: RecordStore, config: ResolverConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Metadata document URL for a thread
    pub fn metadata_url(&self, thread_id: &str) -> String {
        UrlUtils::expand_template(&self.config.metadata_url_template, thread_id)
    }

    /// Resolve a thread through the configured metadata URL template
    pub async fn resolve(&self, thread_id: &str) -> ResolveResult<ResolvedEndpoint> {
        let url = self.metadata_url(thread_id);
        self.resolve_at(thread_id, &url).await
    }

    /// Resolve a thread whose metadata URL is already known (feed candidates)
    ///
    /// When the thread is still live, its record log is created with the
    /// header row before returning.
    pub async fn resolve_at(
        &self,
        thread_id: &str,
        metadata_url: &str,
    ) -> ResolveResult<ResolvedEndpoint> {
        let body = self.fetch_with_retry(thread_id, metadata_url).await?;
        let document: AboutDocument = serde_json::from_str(&body)?;

        let title = document.data.title.unwrap_or_default();
        let streaming_url = document
            .data
            .websocket_url
            .filter(|url| !url.trim().is_empty());

        let endpoint = ResolvedEndpoint {
            thread_id: thread_id.to_string(),
            title,
            streaming_url,
        };

        if endpoint.is_over() {
            info!("The live thread {} is over", thread_id);
            return Ok(endpoint);
        }

        info!("Found live thread with ID {} - \"{}\"", thread_id, endpoint.title);
        self.store.ensure_log(thread_id).await?;
        Ok(endpoint)
    }

    async fn fetch_with_retry(&self, thread_id: &str, url: &str) -> ResolveResult<String> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetcher.fetch_text(url).await {
                Ok(body) => {
                    if attempts > 1 {
                        info!(
                            "Metadata fetch for thread {} succeeded on attempt {}",
                            thread_id, attempts
                        );
                    }
                    return Ok(body);
                }
                Err(e) if e.is_transient() => {
                    if attempts >= max_attempts {
                        error!("Exiting after {} attempts: {}", attempts, e);
                        return Err(ResolveError::Exhausted {
                            thread_id: thread_id.to_string(),
                            attempts,
                            last_error: e,
                        });
                    }

                    warn!(
                        "{} - Sleeping {} and retrying, attempt {}/{}",
                        e,
                        humantime::format_duration(self.config.retry_delay),
                        attempts,
                        max_attempts
                    );
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    error!("Metadata fetch for thread {} failed: {}", thread_id, e);
                    return Err(ResolveError::Fetch(e));
                }
            }
        }
    }
}
