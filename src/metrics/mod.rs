//! Remote metrics delivery
//!
//! Each recorded sample is also pushed, fire-and-forget, to an HTTP
//! ingestion endpoint with the caller's credential attached.

pub mod forwarder;

use std::sync::Arc;

use crate::config::{HttpConfig, MetricsConfig};
use crate::errors::AppResult;

pub use forwarder::{build_payload, MetricsForwarder, NoopForwarder, SampleForwarder};

/// Build the forwarder selected by configuration
pub fn forwarder_from_config(
    metrics: &MetricsConfig,
    http: &HttpConfig,
) -> AppResult<Arc<dyn SampleForwarder>> {
    if metrics.enabled {
        Ok(Arc::new(MetricsForwarder::new(metrics, http)?))
    } else {
        Ok(Arc::new(NoopForwarder))
    }
}
