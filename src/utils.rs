//! Utility modules for livestats
//!
//! Reusable helpers shared by the scanner, resolver, record store and
//! streaming session:
//! - `http_client` for identified, read-only HTTP fetches
//! - `jitter` for reconnect delay randomisation
//! - `time` for feed date parsing and output timestamp formats
//! - `url` for link/metadata URL handling and log-safe URLs

pub mod http_client;
pub mod jitter;
pub mod time;
pub mod url;

pub use http_client::{HttpFetcher, StandardHttpClient};
