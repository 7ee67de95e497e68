use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::{broadcast, RwLock};

use super::entry::ChatEntry;
use super::log::ChatLog;

/// Mutations of a conversation log, published to chat views
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    EntryAppended { sip_address: String, index: usize },
    EntryRemoved { sip_address: String, index: usize },
    Cleared { sip_address: String },
}

impl ConversationEvent {
    pub fn sip_address(&self) -> &str {
        match self {
            ConversationEvent::EntryAppended { sip_address, .. }
            | ConversationEvent::EntryRemoved { sip_address, .. }
            | ConversationEvent::Cleared { sip_address } => sip_address,
        }
    }
}

/// A known peer, for the SIP address list
#[derive(Debug, Clone, PartialEq)]
pub struct SipAddressEntry {
    pub sip_address: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub entry_count: usize,
}

/// Chat logs of every conversation, keyed by peer SIP address
#[derive(Clone)]
pub struct ConversationsModel {
    logs: Arc<RwLock<HashMap<String, ChatLog>>>,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationsModel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            logs: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub async fn append(&self, sip_address: &str, entry: ChatEntry) -> usize {
        let index = {
            let mut logs = self.logs.write().await;
            logs.entry(sip_address.to_string())
                .or_insert_with(|| ChatLog::new(sip_address))
                .push(entry)
        };

        debug!("Appended entry #{} to conversation with {}", index, sip_address);
        self.publish(ConversationEvent::EntryAppended {
            sip_address: sip_address.to_string(),
            index,
        });
        index
    }

    pub async fn remove_entry(&self, sip_address: &str, index: usize) -> Option<ChatEntry> {
        let removed = self
            .logs
            .write()
            .await
            .get_mut(sip_address)
            .and_then(|log| log.remove(index));

        if removed.is_some() {
            self.publish(ConversationEvent::EntryRemoved {
                sip_address: sip_address.to_string(),
                index,
            });
        } else {
            warn!("No entry #{} in conversation with {}", index, sip_address);
        }
        removed
    }

    pub async fn remove_all_entries(&self, sip_address: &str) {
        if let Some(log) = self.logs.write().await.get_mut(sip_address) {
            log.clear();
        }
        self.publish(ConversationEvent::Cleared {
            sip_address: sip_address.to_string(),
        });
    }

    /// Copy of the log, empty when nothing was exchanged yet
    pub async fn snapshot(&self, sip_address: &str) -> ChatLog {
        self.logs
            .read()
            .await
            .get(sip_address)
            .cloned()
            .unwrap_or_else(|| ChatLog::new(sip_address))
    }

    /// Known peers, most recent activity first
    pub async fn sip_addresses(&self) -> Vec<SipAddressEntry> {
        let logs = self.logs.read().await;
        let mut entries: Vec<SipAddressEntry> = logs
            .values()
            .map(|log| SipAddressEntry {
                sip_address: log.sip_address().to_string(),
                last_activity: log.last().map(|entry| entry.timestamp),
                entry_count: log.len(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.sip_address.cmp(&b.sip_address))
        });
        entries
    }

    fn publish(&self, event: ConversationEvent) {
        // No chat view open is not an error.
        let _ = self.events.send(event);
    }
}

impl Default for ConversationsModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::entry::Direction;
    use crate::chat::proxy::ChatProxyModel;

    const ALICE: &str = "sip:alice@example.org";

    #[tokio::test]
    async fn append_publishes_index() {
        let model = ConversationsModel::new();
        let mut events = model.subscribe();

        model.append(ALICE, ChatEntry::text(Direction::Incoming, "hi")).await;
        model.append(ALICE, ChatEntry::text(Direction::Outgoing, "hello")).await;

        assert_eq!(
            events.recv().await.unwrap(),
            ConversationEvent::EntryAppended { sip_address: ALICE.into(), index: 0 }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ConversationEvent::EntryAppended { sip_address: ALICE.into(), index: 1 }
        );
        assert_eq!(model.snapshot(ALICE).await.len(), 2);
    }

    #[tokio::test]
    async fn proxy_follows_conversation_events() {
        let model = ConversationsModel::new();
        let mut events = model.subscribe();
        let mut proxy = ChatProxyModel::new(&model.snapshot(ALICE).await);

        for n in 0..3 {
            model
                .append(ALICE, ChatEntry::text(Direction::Incoming, format!("m{}", n)))
                .await;
        }
        while let Ok(event) = events.try_recv() {
            if let ConversationEvent::EntryAppended { .. } = event {
                proxy.on_entry_appended(&model.snapshot(event.sip_address()).await);
            }
        }

        assert_eq!(proxy.row_count(), 3);
        assert_eq!(proxy.max_displayed_entries(), 53);

        let index = proxy.map_to_source(0).unwrap();
        assert!(model.remove_entry(ALICE, index).await.is_some());
        proxy.invalidate(&model.snapshot(ALICE).await);
        assert_eq!(proxy.row_count(), 2);
    }

    #[tokio::test]
    async fn sip_addresses_sorted_by_activity() {
        let model = ConversationsModel::new();
        model.append("sip:bob@example.org", ChatEntry::notice("missed call")).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        model.append(ALICE, ChatEntry::text(Direction::Incoming, "ping")).await;

        let addresses: Vec<String> = model
            .sip_addresses()
            .await
            .into_iter()
            .map(|entry| entry.sip_address)
            .collect();
        assert_eq!(addresses, vec![ALICE.to_string(), "sip:bob@example.org".to_string()]);
    }

    #[tokio::test]
    async fn remove_all_entries_clears_log() {
        let model = ConversationsModel::new();
        model.append(ALICE, ChatEntry::text(Direction::Incoming, "hi")).await;
        model.remove_all_entries(ALICE).await;

        assert!(model.snapshot(ALICE).await.is_empty());
        assert!(model.remove_entry(ALICE, 0).await.is_none());
    }
}
