//! Sample worker
//!
//! Persists and forwards samples off the session's dispatch path. Samples
//! are processed one at a time in arrival order: the record-store append
//! always completes before the forward for the same sample starts.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::{SessionError, SessionResult, StorageError};
use crate::metrics::SampleForwarder;
use crate::models::{Credential, Sample};
use crate::storage::RecordStore;
use crate::utils::time::format_status_timestamp;

/// Storage failures reported back to the session
pub type FailureReceiver = mpsc::UnboundedReceiver<StorageError>;

pub struct SampleWorker {
    sender: mpsc::Sender<Sample>,
    handle: JoinHandle<()>,
}

impl SampleWorker {
    pub fn spawn(
        store: RecordStore,
        forwarder: Arc<dyn SampleForwarder>,
        credential: Credential,
        capacity: usize,
    ) -> (Self, FailureReceiver) {
        let (sender, mut receiver) = mpsc::channel::<Sample>(capacity.max(1));
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(sample) = receiver.recv().await {
                let appended = store.append(&sample).await;
                if appended.is_ok() {
                    info!(
                        "Number of viewers on {}: {}",
                        format_status_timestamp(sample.observed_at),
                        sample.viewer_count
                    );
                }

                forwarder.forward(&sample, &credential).await;

                if let Err(e) = appended {
                    error!("Failed to record sample for thread {}: {}", sample.thread_id, e);
                    let _ = failure_tx.send(e);
                }
            }
            debug!("Sample worker drained");
        });

        (Self { sender, handle }, failure_rx)
    }

    /// Queue a sample, waiting while the queue is full
    pub async fn submit(&self, sample: Sample) -> SessionResult<()> {
        self.sender
            .send(sample)
            .await
            .map_err(|_| SessionError::WorkerStopped)
    }

    /// Close the queue and wait until every accepted sample was processed
    pub async fn shutdown(self) -> SessionResult<()> {
        drop(self.sender);
        self.handle.await.map_err(|e| {
            error!("Sample worker task failed: {}", e);
            SessionError::WorkerStopped
        })
    }
}
