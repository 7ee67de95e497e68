// Conversation history and the filtered/windowed view used by chat screens

pub mod conversations;
pub mod entry;
pub mod log;
pub mod proxy;

pub use conversations::{ConversationEvent, ConversationsModel, SipAddressEntry};
pub use entry::{ChatEntry, Direction, EntryFilter, EntryKind, EntryPayload};
pub use log::ChatLog;
pub use proxy::{ChatProxyModel, ProxyEvent, ENTRIES_CHUNK_SIZE};
