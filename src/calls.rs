use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::RwLock;

use crate::engine::CallState;

#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub id: String,
    pub remote_uri: String,
    pub state: CallState,
    pub is_incoming: bool,
    pub started_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl CallInfo {
    pub fn duration(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.connected_at.map(|connected| now - connected)
    }
}

/// Calls known to the engine, ended ones removed
#[derive(Clone, Default)]
pub struct CallsModel {
    calls: Arc<RwLock<Vec<CallInfo>>>,
}

impl CallsModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a state change, returns the call as it is now
    pub async fn update(&self, id: &str, remote_uri: &str, state: CallState, is_incoming: bool) -> CallInfo {
        let mut calls = self.calls.write().await;
        let now = Utc::now();

        let position = calls.iter().position(|call| call.id == id);
        let mut call = match position {
            Some(position) => calls[position].clone(),
            None => CallInfo {
                id: id.to_string(),
                remote_uri: remote_uri.to_string(),
                state,
                is_incoming,
                started_at: now,
                connected_at: None,
            },
        };

        call.state = state;
        if state == CallState::Connected && call.connected_at.is_none() {
            call.connected_at = Some(now);
        }
        info!("Call {} with {} is now {:?}", call.id, call.remote_uri, state);

        match (position, state) {
            (Some(position), CallState::Ended) => {
                calls.remove(position);
            }
            (Some(position), _) => calls[position] = call.clone(),
            (None, CallState::Ended) => {}
            (None, _) => calls.push(call.clone()),
        }
        call
    }

    pub async fn calls(&self) -> Vec<CallInfo> {
        self.calls.read().await.clone()
    }
}

/// Notice appended to the peer's conversation for a call transition
pub fn call_notice(call: &CallInfo) -> Option<String> {
    let direction = if call.is_incoming { "Incoming" } else { "Outgoing" };
    match call.state {
        CallState::Connected => Some(format!("{} call started", direction)),
        CallState::Ended => match call.duration(Utc::now()) {
            Some(duration) => Some(format!(
                "{} call ended ({})",
                direction,
                format_duration(duration)
            )),
            None if call.is_incoming => Some("Missed call".to_string()),
            None => Some("Call not answered".to_string()),
        },
        _ => None,
    }
}

/// `mm:ss` of a call duration, negative durations shown as zero
pub fn format_duration(duration: chrono::Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Largest square avatar fitting the container, capped at `max_size`
pub fn avatar_size(container_width: u32, container_height: u32, max_size: u32) -> u32 {
    let size = if container_height < max_size && container_height > 0 {
        container_height
    } else {
        max_size
    };
    size.min(container_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn calls_follow_state_changes() {
        let model = CallsModel::new();
        model.update("c1", "sip:alice@example.org", CallState::Ringing, true).await;
        let call = model.update("c1", "sip:alice@example.org", CallState::Connected, true).await;

        assert!(call.connected_at.is_some());
        assert_eq!(model.calls().await.len(), 1);
        assert_eq!(call_notice(&call).as_deref(), Some("Incoming call started"));

        let ended = model.update("c1", "sip:alice@example.org", CallState::Ended, true).await;
        assert!(model.calls().await.is_empty());
        assert!(call_notice(&ended).unwrap().starts_with("Incoming call ended"));
    }

    #[tokio::test]
    async fn unanswered_incoming_call_is_missed() {
        let model = CallsModel::new();
        model.update("c2", "sip:bob@example.org", CallState::Ringing, true).await;
        let ended = model.update("c2", "sip:bob@example.org", CallState::Ended, true).await;
        assert_eq!(call_notice(&ended).as_deref(), Some("Missed call"));
    }

    #[test]
    fn duration_counts_from_connection() {
        let now = Utc::now();
        let mut call = CallInfo {
            id: "c3".into(),
            remote_uri: "sip:carol@example.org".into(),
            state: CallState::Ringing,
            is_incoming: false,
            started_at: now - chrono::Duration::seconds(30),
            connected_at: None,
        };
        assert_eq!(call.duration(now), None);

        call.connected_at = Some(now - chrono::Duration::seconds(75));
        assert_eq!(call.duration(now).map(|d| d.num_seconds()), Some(75));
        assert_eq!(format_duration(call.duration(now).unwrap()), "01:15");
    }

    #[test]
    fn avatar_fits_container() {
        assert_eq!(avatar_size(500, 80, 100), 80);
        assert_eq!(avatar_size(500, 0, 100), 100);
        assert_eq!(avatar_size(60, 300, 100), 60);
    }
}
