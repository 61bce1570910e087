//! Classification of inbound streaming frames
//!
//! Frames are JSON objects carrying a `type` discriminator. Only
//! `activity`, `complete` and `update` have a meaning for the session;
//! anything else is reported as [`InboundMessage::Unknown`] so the caller can
//! log and ignore it.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::{SessionError, SessionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Current viewer count of the thread
    Activity { viewer_count: i64 },
    /// The thread has ended
    Complete,
    /// Thread content changed; informational only
    Update,
    Unknown { kind: Option<String> },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct ActivityPayload {
    #[serde(deserialize_with = "deserialize_count")]
    count: i64,
}

/// Accepts counts sent as integers, floats or numeric strings
fn deserialize_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Integer(i64),
        Float(f64),
        Text(String),
    }

    match RawCount::deserialize(deserializer)? {
        RawCount::Integer(count) => Ok(count),
        RawCount::Float(count) if count.is_finite() => Ok(count.trunc() as i64),
        RawCount::Float(count) => Err(de::Error::custom(format!(
            "viewer count is not a finite number: {count}"
        ))),
        RawCount::Text(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .or_else(|_| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|count| count.is_finite())
                        .map(|count| count.trunc() as i64)
                        .ok_or(())
                })
                .map_err(|_| de::Error::custom(format!("viewer count is not numeric: {text:?}")))
        }
    }
}

impl InboundMessage {
    /// Parse one text frame
    pub fn parse(frame: &str) -> SessionResult<Self> {
        let envelope: Envelope =
            serde_json::from_str(frame).map_err(|e| SessionError::malformed(truncate(frame), e))?;

        match envelope.kind.as_deref() {
            Some("activity") => {
                let payload: ActivityPayload = serde_json::from_value(envelope.payload)
                    .map_err(|e| SessionError::malformed(truncate(frame), e))?;
                Ok(Self::Activity {
                    viewer_count: payload.count,
                })
            }
            Some("complete") => Ok(Self::Complete),
            Some("update") => Ok(Self::Update),
            other => Ok(Self::Unknown {
                kind: other.map(str::to_string),
            }),
        }
    }
}

fn truncate(frame: &str) -> String {
    const MAX_CHARS: usize = 200;
    if frame.chars().count() <= MAX_CHARS {
        frame.to_string()
    } else {
        let head: String = frame.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}
