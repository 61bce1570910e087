//! Feed-driven discovery of newly started live threads.

pub mod scheduler;

pub use scheduler::{create_discovery_channel, DiscoveryReceiver, DiscoverySender, FeedWatcher};
