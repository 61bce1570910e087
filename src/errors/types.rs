//! Error type definitions for livestats
//!
//! This module defines all error types used throughout the crate,
//! providing a hierarchical error system that keeps the transient/fatal
//! distinction explicit at every layer.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can reach the caller of
/// the pipeline. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Feed scanning errors
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Endpoint resolution errors
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Record store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Streaming session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Failure of a single HTTP fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP error: {status} - URL: {url}")]
    Status { status: u16, url: String },

    /// The request never produced a response (connect failure, timeout, ...)
    #[error("Request failed: {url} - {message}")]
    Transport {
        url: String,
        message: String,
        transient: bool,
    },

    /// The response body could not be read or decoded
    #[error("Failed to read response body: {url} - {message}")]
    Body { url: String, message: String },
}

/// Feed scanning errors
#[derive(Error, Debug)]
pub enum FeedError {
    /// The feed document could not be fetched; retry on the next scan
    #[error("Feed fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The feed document is not well-formed
    #[error("Feed parse error: {message}")]
    Parse { message: String },

    /// An entry carried a date we could not interpret
    #[error("Invalid entry timestamp: {value}")]
    InvalidTimestamp { value: String },
}

/// Endpoint resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Every attempt failed with a transient error. Callers treat this as
    /// fatal for the process.
    #[error("Gave up resolving thread {thread_id} after {attempts} attempts: {last_error}")]
    Exhausted {
        thread_id: String,
        attempts: u32,
        last_error: FetchError,
    },

    /// A non-transient fetch failure, propagated unchanged
    #[error(transparent)]
    Fetch(FetchError),

    /// The metadata document is not the JSON we expect
    #[error("Malformed thread metadata: {0}")]
    Parse(#[from] serde_json::Error),

    /// The record log for the thread could not be prepared
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Record store errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure on a thread log
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Streaming session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Opening the streaming connection failed
    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// The open connection reported an error
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// An inbound frame was not the structured data we expect
    #[error("Malformed inbound message: {message}")]
    MalformedMessage {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A sample could not be written to the local record log
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The sample worker went away while the session was still running
    #[error("Sample worker stopped unexpectedly")]
    WorkerStopped,
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl FetchError {
    /// Create a status error
    pub fn status<U: Into<String>>(status: u16, url: U) -> Self {
        Self::Status {
            status,
            url: url.into(),
        }
    }

    /// Create a transport error
    pub fn transport<U: Into<String>, M: Into<String>>(url: U, message: M, transient: bool) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
            transient,
        }
    }

    /// Create a body error
    pub fn body<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Body {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { .. } => true,
            Self::Transport { transient, .. } => *transient,
            Self::Body { .. } => false,
        }
    }
}

impl FeedError {
    /// Create a parse error
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an invalid timestamp error
    pub fn invalid_timestamp<V: Into<String>>(value: V) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
        }
    }

    /// Fetch failures are retried on the next scan; a malformed feed is not
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(_) => true,
            Self::Parse { .. } | Self::InvalidTimestamp { .. } => false,
        }
    }
}

impl ResolveError {
    /// Whether the caller should stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

impl StorageError {
    /// Create an I/O error for a path
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl SessionError {
    /// Create a connect error
    pub fn connect<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport<M: Into<String>>(message: M) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a malformed message error, keeping the offending frame text
    pub fn malformed<M: Into<String>>(message: M, source: serde_json::Error) -> Self {
        Self::MalformedMessage {
            message: message.into(),
            source,
        }
    }
}
