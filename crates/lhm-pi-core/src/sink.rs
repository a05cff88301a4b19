use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("outbound channel closed")]
    Closed,
    #[error("message encode failed: {0}")]
    Encode(String),
}

/// Write half of the message channel as seen by the session.
pub trait MessageSink {
    fn send_text(&mut self, text: String) -> Result<(), SendError>;
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn send_text(&mut self, text: String) -> Result<(), SendError> {
        self.send(text).map_err(|_| SendError::Closed)
    }
}

/// Sink that keeps every frame, for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub sent: Vec<String>,
    pub fail_sends: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.sent
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|message| message.get("event").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    /// Messages whose `event` matches and, when `payload_key` is given, whose payload has that key.
    pub fn matching(&self, event: &str, payload_key: Option<&str>) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter(|message| message.get("event").and_then(Value::as_str) == Some(event))
            .filter(|message| match payload_key {
                Some(key) => message
                    .get("payload")
                    .and_then(|payload| payload.get(key))
                    .is_some(),
                None => true,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl MessageSink for RecordingSink {
    fn send_text(&mut self, text: String) -> Result<(), SendError> {
        if self.fail_sends {
            return Err(SendError::Closed);
        }
        self.sent.push(text);
        Ok(())
    }
}
