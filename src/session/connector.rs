//! Streaming connection establishment
//!
//! The session only needs a stream of text frames; the end of the stream
//! (or an error item) means the connection closed.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::errors::{SessionError, SessionResult};
use crate::utils::url::UrlUtils;

/// Inbound text frames of one open connection
pub type FrameStream = Pin<Box<dyn Stream<Item = SessionResult<String>> + Send>>;

#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> SessionResult<FrameStream>;
}

/// Websocket implementation of StreamConnector
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> SessionResult<FrameStream> {
        let display_url = UrlUtils::obfuscate_credentials(url);

        let (socket, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                SessionError::connect(
                    &display_url,
                    format!("timed out after {}", humantime::format_duration(self.connect_timeout)),
                )
            })?
            .map_err(|e| SessionError::connect(&display_url, e.to_string()))?;

        debug!(
            "Websocket handshake with {} completed ({})",
            display_url,
            response.status()
        );

        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        trace!("Ignoring non UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!("Server sent close frame: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(SessionError::transport(e.to_string()))),
            }
        });

        Ok(Box::pin(frames))
    }
}
