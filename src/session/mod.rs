//! Streaming session
//!
//! Holds the connection to a live thread's streaming endpoint, reconnects to
//! the same URL whenever it closes, and turns every `activity` frame into a
//! [`Sample`] handed to the sample worker. The session ends on a `complete`
//! frame, on a local storage failure, on a malformed frame, or when the
//! caller's stop signal fires.
//!
//! ```text
//! Connecting ──▶ Open ──▶ Closed ──▶ Reconnecting ──▶ Connecting ...
//!                  │
//!                  └──▶ Terminated (on "complete")
//! ```

pub mod backoff;
pub mod connector;
pub mod message;
pub mod worker;

use chrono::Utc;
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::errors::SessionResult;
use crate::metrics::SampleForwarder;
use crate::models::{Credential, ResolvedEndpoint, Sample, SessionState};
use crate::storage::RecordStore;
use crate::utils::url::UrlUtils;

pub use backoff::ReconnectPolicy;
pub use connector::{FrameStream, StreamConnector, WebSocketConnector};
pub use message::InboundMessage;
pub use worker::{FailureReceiver, SampleWorker};

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A `complete` frame was received
    Completed,
    /// The endpoint had no streaming URL; nothing was connected
    AlreadyOver,
    /// The stop signal fired before the thread completed
    Stopped,
}

enum Dispatch {
    Continue,
    Complete,
}

pub struct StreamingSession {
    endpoint: ResolvedEndpoint,
    connector: Arc<dyn StreamConnector>,
    store: RecordStore,
    forwarder: Arc<dyn SampleForwarder>,
    credential: Credential,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl StreamingSession {
    pub fn new(
        endpoint: ResolvedEndpoint,
        connector: Arc<dyn StreamConnector>,
        store: RecordStore,
        forwarder: Arc<dyn SampleForwarder>,
        credential: Credential,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            endpoint,
            connector,
            store,
            forwarder,
            credential,
            config,
            state,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(
                "Session for thread {}: {} -> {}",
                self.endpoint.thread_id, previous, next
            );
        }
    }

    /// Run until the thread completes or an error ends the session
    pub async fn run(self) -> SessionResult<SessionOutcome> {
        self.run_until(std::future::pending()).await
    }

    /// Run until the thread completes, an error ends the session, or `stop`
    /// resolves
    ///
    /// Every sample accepted before the session ended has been appended to
    /// the record log (and offered to the forwarder) when this returns.
    pub async fn run_until<F>(self, stop: F) -> SessionResult<SessionOutcome>
    where
        F: Future<Output = ()>,
    {
        let Some(url) = self.endpoint.streaming_url.clone() else {
            info!(
                "The live thread {} is over, not connecting",
                self.endpoint.thread_id
            );
            self.set_state(SessionState::Terminated);
            return Ok(SessionOutcome::AlreadyOver);
        };

        let (worker, mut failures) = SampleWorker::spawn(
            self.store.clone(),
            Arc::clone(&self.forwarder),
            self.credential.clone(),
            self.config.worker_queue_capacity,
        );

        tokio::pin!(stop);
        let result = self.drive(&url, &worker, &mut failures, stop.as_mut()).await;
        let drained = worker.shutdown().await;

        match result {
            Ok(outcome) => {
                drained?;
                if let Ok(e) = failures.try_recv() {
                    return Err(e.into());
                }
                Ok(outcome)
            }
            Err(e) => {
                self.set_state(SessionState::Closed);
                Err(e)
            }
        }
    }

    async fn drive<F>(
        &self,
        url: &str,
        worker: &SampleWorker,
        failures: &mut FailureReceiver,
        mut stop: Pin<&mut F>,
    ) -> SessionResult<SessionOutcome>
    where
        F: Future<Output = ()>,
    {
        let display_url = UrlUtils::obfuscate_credentials(url);
        let mut policy = ReconnectPolicy::from_config(&self.config);

        loop {
            self.set_state(SessionState::Connecting);

            let connected = tokio::select! {
                connected = self.connector.connect(url) => connected,
                _ = stop.as_mut() => return Ok(self.stopped()),
            };

            match connected {
                Ok(mut frames) => {
                    self.set_state(SessionState::Open);
                    info!(
                        "Connected to live thread {} ({})",
                        self.endpoint.thread_id, display_url
                    );

                    // Only a connection that delivered frames clears the backoff
                    let mut delivered = false;
                    loop {
                        tokio::select! {
                            frame = frames.next() => match frame {
                                Some(Ok(text)) => {
                                    delivered = true;
                                    if let Dispatch::Complete = self.dispatch(&text, worker).await? {
                                        self.set_state(SessionState::Terminated);
                                        return Ok(SessionOutcome::Completed);
                                    }
                                }
                                Some(Err(e)) => {
                                    warn!("Connection to live thread {} failed: {}", self.endpoint.thread_id, e);
                                    break;
                                }
                                None => {
                                    info!("Connection to live thread {} closed", self.endpoint.thread_id);
                                    break;
                                }
                            },
                            Some(e) = failures.recv() => return Err(e.into()),
                            _ = stop.as_mut() => return Ok(self.stopped()),
                        }
                    }

                    if delivered {
                        policy.reset();
                    } else {
                        warn!(
                            "Connection to live thread {} closed before delivering any frame",
                            self.endpoint.thread_id
                        );
                        policy.record_failure();
                    }
                }
                Err(e) => {
                    warn!("{}", e);
                    policy.record_failure();
                }
            }

            self.set_state(SessionState::Closed);
            self.set_state(SessionState::Reconnecting);

            let delay = policy.next_delay();
            if delay.is_zero() {
                info!("Reconnecting to {}", display_url);
                tokio::task::yield_now().await;
            } else {
                info!(
                    "Reconnecting to {} in {} ({} failed attempt(s))",
                    display_url,
                    humantime::format_duration(delay),
                    policy.consecutive_failures()
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    Some(e) = failures.recv() => return Err(e.into()),
                    _ = stop.as_mut() => return Ok(self.stopped()),
                }
            }
        }
    }

    fn stopped(&self) -> SessionOutcome {
        info!("Stopping session for live thread {}", self.endpoint.thread_id);
        self.set_state(SessionState::Closed);
        SessionOutcome::Stopped
    }

    async fn dispatch(&self, frame: &str, worker: &SampleWorker) -> SessionResult<Dispatch> {
        match InboundMessage::parse(frame)? {
            InboundMessage::Activity { viewer_count } => {
                let sample = Sample {
                    thread_id: self.endpoint.thread_id.clone(),
                    title: self.endpoint.title.clone(),
                    viewer_count,
                    observed_at: Utc::now(),
                };
                trace!("Queueing sample of {} viewers", viewer_count);
                worker.submit(sample).await?;
                Ok(Dispatch::Continue)
            }
            InboundMessage::Complete => {
                info!("The live thread {} is complete", self.endpoint.thread_id);
                Ok(Dispatch::Complete)
            }
            InboundMessage::Update => {
                debug!("Live thread {} updated", self.endpoint.thread_id);
                Ok(Dispatch::Continue)
            }
            InboundMessage::Unknown { kind } => {
                debug!(
                    "Ignoring message of type {} on thread {}",
                    kind.as_deref().unwrap_or("<none>"),
                    self.endpoint.thread_id
                );
                Ok(Dispatch::Continue)
            }
        }
    }
}
