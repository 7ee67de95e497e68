use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a chat entry, derived from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Message,
    FileTransfer,
    Notice,
}

/// Which entries a chat view exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryFilter {
    /// Generic filter, every entry matches
    #[default]
    All,
    Only(EntryKind),
}

impl EntryFilter {
    pub fn accepts(&self, entry: &ChatEntry) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::Only(kind) => entry.kind() == *kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryPayload {
    Text(String),
    File {
        name: String,
        size: u64,
        url: Option<String>,
    },
    /// System notice, e.g. a call that started or ended
    Notice(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub payload: EntryPayload,
}

impl ChatEntry {
    pub fn new(direction: Direction, payload: EntryPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            direction,
            payload,
        }
    }

    pub fn text(direction: Direction, text: impl Into<String>) -> Self {
        Self::new(direction, EntryPayload::Text(text.into()))
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::new(Direction::Incoming, EntryPayload::Notice(text.into()))
    }

    pub fn kind(&self) -> EntryKind {
        match self.payload {
            EntryPayload::Text(_) => EntryKind::Message,
            EntryPayload::File { .. } => EntryKind::FileTransfer,
            EntryPayload::Notice(_) => EntryKind::Notice,
        }
    }

    /// One-line rendering used by list views and logs
    pub fn summary(&self) -> String {
        match &self.payload {
            EntryPayload::Text(text) => text.clone(),
            EntryPayload::File { name, size, .. } => format!("{} ({} bytes)", name, size),
            EntryPayload::Notice(text) => format!("[{}]", text),
        }
    }
}
