//! Centralized error handling for livestats
//!
//! Every layer has its own error enum; `AppError` aggregates them for
//! callers that drive the whole pipeline.
//!
//! # Error Categories
//!
//! - **Fetch Errors**: HTTP failures while talking to the feed or metadata endpoints
//! - **Feed Errors**: feed document fetch and parsing
//! - **Resolve Errors**: thread metadata resolution, including retry exhaustion
//! - **Storage Errors**: local record log I/O
//! - **Session Errors**: streaming connection and inbound message handling
//!
//! # Usage
//!
//! ```rust
//! use livestats::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Feed Results
pub type FeedResult<T> = Result<T, FeedError>;

/// Convenience type alias for Resolver Results
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = Result<T, StorageError>;

/// Convenience type alias for Session Results
pub type SessionResult<T> = Result<T, SessionError>;
