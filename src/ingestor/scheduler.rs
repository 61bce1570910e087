use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::FeedConfig;
use crate::errors::FeedResult;
use crate::models::{CandidateThread, ThreadWatermark};
use crate::sources::{detect_new, FeedScanner};
use crate::utils::time::epoch_seconds;

pub type DiscoverySender = mpsc::Sender<CandidateThread>;
pub type DiscoveryReceiver = mpsc::Receiver<CandidateThread>;

pub fn create_discovery_channel(capacity: usize) -> (DiscoverySender, DiscoveryReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Periodically scans the feed and announces newly started threads
///
/// The watermark moves to the start time of every successful scan, whether
/// or not a new thread was found. A failed scan leaves it untouched so the
/// next tick covers the same window again.
pub struct FeedWatcher {
    scanner: FeedScanner,
    scan_interval: Duration,
    watermark: ThreadWatermark,
}

impl FeedWatcher {
    pub fn new(scanner: FeedScanner, config: &FeedConfig) -> Self {
        let lookback = chrono::Duration::from_std(config.initial_lookback)
            .unwrap_or_else(|_| chrono::Duration::zero());
        Self::with_watermark(
            scanner,
            config.scan_interval,
            ThreadWatermark::at(Utc::now() - lookback),
        )
    }

    pub fn with_watermark(
        scanner: FeedScanner,
        scan_interval: Duration,
        watermark: ThreadWatermark,
    ) -> Self {
        Self {
            scanner,
            scan_interval,
            watermark,
        }
    }

    pub fn watermark(&self) -> ThreadWatermark {
        self.watermark
    }

    /// Scan once, treating `scan_started` as the invocation time
    pub async fn check_at(
        &mut self,
        scan_started: DateTime<Utc>,
    ) -> FeedResult<Option<CandidateThread>> {
        let candidates = self.scanner.scan().await?;
        let found = detect_new(&candidates, &self.watermark).cloned();

        match &found {
            Some(candidate) => info!(
                "New live thread \"{}\" started at {}",
                candidate.title, candidate.observed_timestamp
            ),
            None => debug!("No new live thread since {}", self.watermark.seconds()),
        }

        self.watermark.advance_to(epoch_seconds(scan_started));
        Ok(found)
    }

    pub async fn check(&mut self) -> FeedResult<Option<CandidateThread>> {
        self.check_at(Utc::now()).await
    }

    /// Scan on every tick until the receiving side goes away
    ///
    /// Fetch failures are retried on the next tick. A feed that cannot be
    /// parsed stops the watcher with that error.
    pub async fn start(mut self, discoveries: DiscoverySender) -> FeedResult<()> {
        info!(
            "Starting feed watcher for {} (every {})",
            self.scanner.feed_url(),
            humantime::format_duration(self.scan_interval)
        );

        let mut ticker = interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    trace!("Feed watcher tick");

                    match self.check().await {
                        Ok(Some(candidate)) => {
                            if discoveries.send(candidate).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) if e.is_retryable() => {
                            warn!("Feed scan failed, retrying on next tick: {}", e);
                        }
                        Err(e) => {
                            error!("Feed scan failed, stopping feed watcher: {}", e);
                            return Err(e);
                        }
                    }
                }
                _ = discoveries.closed() => break,
            }
        }

        info!("Feed watcher stopped");
        Ok(())
    }
}
