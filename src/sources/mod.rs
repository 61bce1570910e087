//! Upstream sources: the live-thread feed and the per-thread metadata endpoint.

pub mod feed;
pub mod resolver;

pub use feed::{detect_new, is_live_title, parse_feed, FeedScanner};
pub use resolver::EndpointResolver;
