use std::time::Duration;

use chrono::{DateTime, Utc};
use dioxus::prelude::*;
use log::error;

use super::{button_style, CoreHandle, IncomingCallScreen, CARD_STYLE, INPUT_STYLE};
use crate::calls::{avatar_size, format_duration, CallInfo};
use crate::engine::CallState;

const REFRESH_INTERVAL: Duration = Duration::from_millis(500);
const AVATAR_MAX_SIZE: u32 = 48;

fn state_label(state: CallState) -> &'static str {
    match state {
        CallState::Calling => "Calling...",
        CallState::Ringing => "Ringing",
        CallState::Connected => "Connected",
        CallState::OnHold => "On hold",
        CallState::Transferring => "Transferring",
        CallState::Ended => "Ended",
    }
}

#[component]
pub fn CallsPanel(core: CoreHandle) -> Element {
    let mut calls = use_signal(Vec::<CallInfo>::new);
    let mut call_target = use_signal(String::new);
    let mut call_error = use_signal(|| None::<String>);
    let mut now = use_signal(Utc::now);

    use_future({
        let core = core.clone();
        move || {
            let core = core.clone();
            async move {
                let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
                loop {
                    ticker.tick().await;
                    now.set(Utc::now());
                    let current = core.calls().calls().await;
                    if *calls.peek() != current {
                        calls.set(current);
                    }
                }
            }
        }
    });

    let on_call = {
        let core = core.clone();
        move |_| {
            let target = call_target.read().trim().to_string();
            if target.is_empty() {
                return;
            }
            match core.invite(&target) {
                Ok(()) => call_error.set(None),
                Err(e) => {
                    error!("Failed to make call: {}", e);
                    call_error.set(Some(format!("Failed to make call: {}", e)));
                }
            }
        }
    };

    rsx! {
        div {
            style: format!("{} display: flex; flex-direction: column; gap: 16px;", CARD_STYLE),

            div {
                style: "display: flex; gap: 12px;",
                input {
                    style: INPUT_STYLE,
                    r#type: "text",
                    placeholder: "sip:bob@example.org",
                    value: "{call_target}",
                    oninput: move |evt| call_target.set(evt.value()),
                }
                button {
                    style: button_style("#059669", "white"),
                    onclick: on_call,
                    "Call"
                }
            }

            if let Some(message) = call_error() {
                p { style: "font-size: 0.875rem; color: #DC2626; margin: 0;", "{message}" }
            }

            if calls.read().is_empty() {
                p { style: "font-size: 0.875rem; color: #64748B; margin: 0;", "No active call" }
            }

            for call in calls.read().iter().cloned() {
                CallRow { key: "{call.id}", core: core.clone(), call: call, now: now() }
            }
        }
    }
}

#[component]
fn CallRow(core: CoreHandle, call: CallInfo, now: DateTime<Utc>) -> Element {
    // Width and height of the avatar slot once laid out
    let mut slot = use_signal(|| None::<(u32, u32)>);
    let size = match slot() {
        Some((width, height)) => avatar_size(width, height, AVATAR_MAX_SIZE),
        None => AVATAR_MAX_SIZE,
    };
    let duration = call.duration(now).map(format_duration);
    let initial = call
        .remote_uri
        .trim_start_matches("sip:")
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?');

    if call.is_incoming && call.state == CallState::Ringing {
        let answer_core = core.clone();
        let answer_id = call.id.clone();
        let ignore_id = call.id.clone();
        return rsx! {
            IncomingCallScreen {
                caller_id: call.remote_uri.clone(),
                on_answer: move |_| {
                    if let Err(e) = answer_core.accept_call(&answer_id) {
                        error!("Failed to answer call: {}", e);
                    }
                },
                on_ignore: move |_| {
                    if let Err(e) = core.terminate_call(&ignore_id) {
                        error!("Failed to reject call: {}", e);
                    }
                },
            }
        };
    }

    let hangup_id = call.id.clone();
    rsx! {
        div {
            style: "display: flex; align-items: center; gap: 16px; padding: 12px; border: 1px solid #E2E8F0; border-radius: 8px;",
            div {
                style: "flex: 0 1 96px; min-width: 0; height: 64px; display: flex; align-items: center; justify-content: center;",
                onmounted: move |evt: MountedEvent| async move {
                    if let Ok(rect) = evt.get_client_rect().await {
                        slot.set(Some((rect.width() as u32, rect.height() as u32)));
                    }
                },
                div {
                    style: format!(
                        "width: {0}px; height: {0}px; border-radius: 50%; background: #CBD5E1; display: flex; align-items: center; justify-content: center; font-weight: 600; color: #1E293B;",
                        size
                    ),
                    "{initial}"
                }
            }
            div {
                style: "flex-grow: 1;",
                p { style: "margin: 0; font-weight: 500; color: #1E293B;", "{call.remote_uri}" }
                p {
                    style: "margin: 4px 0 0 0; font-size: 0.75rem; color: #64748B;",
                    "{state_label(call.state)}"
                    if let Some(duration) = duration {
                        " {duration}"
                    }
                }
            }
            button {
                style: button_style("#DC2626", "white"),
                onclick: move |_| {
                    if let Err(e) = core.terminate_call(&hangup_id) {
                        error!("Failed to hangup: {}", e);
                    }
                },
                "Hang up"
            }
        }
    }
}
