use dioxus::prelude::*;
use log::{debug, error, warn};
use tokio::sync::broadcast::error::RecvError;

use super::{button_style, CoreHandle, CARD_STYLE, INPUT_STYLE};
use crate::chat::{
    ChatEntry, ChatLog, ChatProxyModel, ConversationEvent, Direction, EntryFilter, EntryKind,
    ProxyEvent,
};

fn filter_value(filter: EntryFilter) -> &'static str {
    match filter {
        EntryFilter::All => "all",
        EntryFilter::Only(EntryKind::Message) => "messages",
        EntryFilter::Only(EntryKind::FileTransfer) => "files",
        EntryFilter::Only(EntryKind::Notice) => "notices",
    }
}

fn parse_filter(value: &str) -> EntryFilter {
    match value {
        "messages" => EntryFilter::Only(EntryKind::Message),
        "files" => EntryFilter::Only(EntryKind::FileTransfer),
        "notices" => EntryFilter::Only(EntryKind::Notice),
        _ => EntryFilter::All,
    }
}

/// Conversation with one peer, showing the newest entries first loaded
#[component]
pub fn ChatView(core: CoreHandle, peer: String) -> Element {
    let mut log = use_signal(|| ChatLog::new(peer.clone()));
    let mut proxy = use_signal(|| ChatProxyModel::new(&ChatLog::new(peer.clone())));
    let mut draft = use_signal(String::new);
    let mut send_error = use_signal(|| None::<String>);

    // Keep the snapshot and the proxy in step with the conversation
    use_future({
        let core = core.clone();
        let peer = peer.clone();
        move || {
            let core = core.clone();
            let peer = peer.clone();
            async move {
                let conversations = core.conversations().clone();
                let mut events = conversations.subscribe();
                let snapshot = conversations.snapshot(&peer).await;
                proxy.with_mut(|proxy| proxy.invalidate(&snapshot));
                log.set(snapshot);

                loop {
                    let event = match events.recv().await {
                        Ok(event) => Some(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Chat view of {} skipped {} events", peer, skipped);
                            None
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if event.as_ref().is_some_and(|event| event.sip_address() != peer) {
                        continue;
                    }

                    let snapshot = conversations.snapshot(&peer).await;
                    match event {
                        Some(ConversationEvent::EntryAppended { .. }) => {
                            proxy.with_mut(|proxy| proxy.on_entry_appended(&snapshot))
                        }
                        Some(_) => proxy.with_mut(|proxy| proxy.invalidate(&snapshot)),
                        None => proxy.with_mut(|proxy| proxy.catch_up(&snapshot)),
                    }
                    log.set(snapshot);
                }
            }
        }
    });

    let on_send = {
        let core = core.clone();
        let peer = peer.clone();
        move |_| {
            let text = draft.read().trim().to_string();
            if text.is_empty() {
                return;
            }
            match core.send_message(&peer, &text) {
                Ok(()) => {
                    draft.set(String::new());
                    send_error.set(None);
                }
                Err(e) => {
                    error!("Failed to send message to {}: {}", peer, e);
                    send_error.set(Some(e.to_string()));
                }
            }
        }
    };

    let on_load_more = move |_| {
        let event = proxy.with_mut(|proxy| proxy.load_more_entries(&log.read()));
        if let Some(ProxyEvent::MoreEntriesLoaded(count)) = event {
            debug!("{} older entries shown", count);
        }
    };

    let on_filter = move |evt: FormEvent| {
        let filter = parse_filter(&evt.value());
        proxy.with_mut(|proxy| proxy.set_entry_filter(filter, &log.read()));
    };

    let on_remove = {
        let core = core.clone();
        let peer = peer.clone();
        move |row: usize| {
            let Some(index) = proxy.read().map_to_source(row) else {
                return;
            };
            let conversations = core.conversations().clone();
            let peer = peer.clone();
            spawn(async move {
                conversations.remove_entry(&peer, index).await;
            });
        }
    };

    let on_clear = {
        let core = core.clone();
        let peer = peer.clone();
        move |_| {
            let conversations = core.conversations().clone();
            let peer = peer.clone();
            spawn(async move {
                conversations.remove_all_entries(&peer).await;
            });
        }
    };

    let (rows, has_more, filter): (Vec<ChatEntry>, bool, EntryFilter) = {
        let proxy = proxy.read();
        let log = log.read();
        (
            proxy.rows(&log).into_iter().cloned().collect(),
            proxy.row_count() < proxy.available_count(),
            proxy.entry_filter(),
        )
    };

    rsx! {
        div {
            style: format!("{} display: flex; flex-direction: column; gap: 16px;", CARD_STYLE),

            div {
                style: "display: flex; justify-content: space-between; align-items: center;",
                h2 { style: "font-size: 1.25rem; font-weight: 500; color: #1E293B; margin: 0;", "{peer}" }
                button {
                    style: button_style("white", "#DC2626"),
                    onclick: on_clear,
                    "Clear history"
                }
                select {
                    style: "padding: 8px 12px; border: 1px solid #D1D5DB; border-radius: 6px;",
                    value: filter_value(filter),
                    onchange: on_filter,
                    option { value: "all", "All" }
                    option { value: "messages", "Messages" }
                    option { value: "files", "Files" }
                    option { value: "notices", "Calls" }
                }
            }

            if has_more {
                button {
                    style: button_style("white", "#374151"),
                    onclick: on_load_more,
                    "Load older entries"
                }
            }

            div {
                style: "display: flex; flex-direction: column; gap: 8px; overflow-y: auto; max-height: 60vh;",
                for (row, entry) in rows.into_iter().enumerate() {
                    ChatRow {
                        key: "{entry.id}",
                        entry: entry,
                        on_remove: {
                            let on_remove = on_remove.clone();
                            move |_| on_remove(row)
                        },
                    }
                }
            }

            if let Some(message) = send_error() {
                p { style: "font-size: 0.875rem; color: #DC2626; margin: 0;", "{message}" }
            }

            div {
                style: "display: flex; gap: 12px;",
                input {
                    style: INPUT_STYLE,
                    r#type: "text",
                    placeholder: "Write a message",
                    value: "{draft}",
                    oninput: move |evt| draft.set(evt.value()),
                }
                button {
                    style: button_style("#1E293B", "white"),
                    onclick: on_send,
                    "Send"
                }
            }
        }
    }
}

#[component]
fn ChatRow(entry: ChatEntry, on_remove: EventHandler<()>) -> Element {
    let time = entry.timestamp.format("%H:%M").to_string();
    let summary = entry.summary();
    let (align, background) = match (entry.kind(), entry.direction) {
        (EntryKind::Notice, _) => ("center", "#F1F5F9"),
        (_, Direction::Outgoing) => ("flex-end", "#DBEAFE"),
        (_, Direction::Incoming) => ("flex-start", "#F8FAFC"),
    };

    rsx! {
        div {
            style: format!("display: flex; justify-content: {};", align),
            div {
                style: format!("background: {}; border-radius: 8px; padding: 8px 12px; max-width: 70%;", background),
                p { style: "margin: 0; font-size: 0.875rem; color: #1E293B;", "{summary}" }
                p {
                    style: "margin: 4px 0 0 0; font-size: 0.75rem; color: #94A3B8;",
                    "{time} "
                    span {
                        style: "cursor: pointer; color: #CBD5E1;",
                        title: "Remove",
                        onclick: move |_| on_remove.call(()),
                        "×"
                    }
                }
            }
        }
    }
}
