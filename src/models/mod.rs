//! Core data types shared by the scanner, resolver and streaming session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::url::UrlUtils;

/// A feed entry whose title carries the `[live]` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateThread {
    pub title: String,
    /// First hyperlink of the feed entry
    pub link: String,
    /// `link` with the metadata suffix appended
    pub metadata_url: String,
    /// Publish/update time of the entry, seconds since the epoch
    pub observed_timestamp: f64,
}

impl CandidateThread {
    /// Thread identifier taken from the entry link
    pub fn thread_id(&self) -> Option<String> {
        UrlUtils::thread_id_from_link(&self.link)
    }
}

/// Boundary between already-seen and newly-started threads
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ThreadWatermark(f64);

impl ThreadWatermark {
    pub fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self(crate::utils::time::epoch_seconds(time))
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }

    /// True when `timestamp` lies strictly after the watermark
    pub fn is_exceeded_by(&self, timestamp: f64) -> bool {
        timestamp > self.0
    }

    pub fn advance_to(&mut self, seconds: f64) {
        self.0 = seconds;
    }
}

/// Result of resolving a thread identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub thread_id: String,
    pub title: String,
    /// `None` means the thread has already ended
    pub streaming_url: Option<String>,
}

impl ResolvedEndpoint {
    pub fn is_over(&self) -> bool {
        self.streaming_url.is_none()
    }
}

/// One viewer-count observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub thread_id: String,
    pub title: String,
    pub viewer_count: i64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
    Reconnecting,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Opaque token attached to metrics requests. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_is_strict() {
        let watermark = ThreadWatermark::new(100.0);
        assert!(watermark.is_exceeded_by(100.5));
        assert!(!watermark.is_exceeded_by(100.0));
        assert!(!watermark.is_exceeded_by(99.0));
    }

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("s3cret");
        assert_eq!(format!("{credential:?}"), "Credential(****)");
        assert_eq!(credential.to_string(), "****");
        assert_eq!(credential.expose(), "s3cret");
    }

    #[test]
    fn test_endpoint_without_url_is_over() {
        let endpoint = ResolvedEndpoint {
            thread_id: "abc".to_string(),
            title: "Event".to_string(),
            streaming_url: None,
        };
        assert!(endpoint.is_over());
    }
}
