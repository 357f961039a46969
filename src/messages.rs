use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single chat message, immutable once appended to the log.
///
/// Wire field names follow the polling protocol: the sender travels as
/// `username`, the body as `message`, the optional recipient as `toUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub index: u64,
    #[serde(rename = "username")]
    pub sender: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "toUser", skip_serializing_if = "Option::is_none", default)]
    pub recipient: Option<String>,
}

/// The requested offset lies beyond the end of the log.
///
/// `offset == total` is not an error (an empty poll); anything larger asks
/// for messages that do not exist at that position, and since the log only
/// grows, never will.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid offset {offset}: log has {total} messages")]
pub struct InvalidOffset {
    pub offset: u64,
    pub total: u64,
}

/// Append-only, in-memory message log.
///
/// Indices are assigned at append time, monotonically, and never reused;
/// messages are never edited, removed or reordered, so any later read is an
/// extension of any earlier one. The log performs no recipient filtering:
/// directed messages occupy normal slots so every reader shares the same
/// offset counter, and consumers decide what to display.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Number of messages, which is also the next index to be assigned.
    pub fn len(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, assigning it the next index.
    /// Returns the assigned index and the new total length.
    pub fn append(
        &mut self,
        sender: impl Into<String>,
        body: impl Into<String>,
        recipient: Option<String>,
    ) -> (u64, u64) {
        let index = self.len();
        self.messages.push(Message {
            index,
            sender: sender.into(),
            body: body.into(),
            recipient,
        });
        (index, self.len())
    }

    /// All messages with index >= `offset`, in index order, plus the
    /// current total length.
    pub fn read_from(&self, offset: u64) -> Result<(Vec<Message>, u64), InvalidOffset> {
        let total = self.len();
        if offset > total {
            return Err(InvalidOffset { offset, total });
        }
        Ok((self.messages[offset as usize..].to_vec(), total))
    }
}
