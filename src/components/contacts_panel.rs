use dioxus::prelude::*;
use log::error;
use tokio::sync::broadcast::error::RecvError;

use super::{button_style, CoreHandle, CARD_STYLE, INPUT_STYLE};
use crate::contacts::Contact;

#[component]
pub fn ContactsPanel(core: CoreHandle, on_open: EventHandler<String>) -> Element {
    let mut contacts = use_signal(Vec::<Contact>::new);
    let mut address = use_signal(String::new);
    let mut name = use_signal(String::new);
    let mut save_error = use_signal(|| None::<String>);

    use_future({
        let core = core.clone();
        move || {
            let core = core.clone();
            async move {
                let model = core.contacts().clone();
                let mut events = model.subscribe();
                loop {
                    contacts.set(model.contacts().await);
                    if let Err(RecvError::Closed) = events.recv().await {
                        break;
                    }
                }
            }
        }
    });

    let on_save = {
        let core = core.clone();
        move |_| {
            let model = core.contacts().clone();
            let sip_address = address.read().clone();
            let display_name = name.read().clone();
            spawn(async move {
                match model.save_contact(&sip_address, &display_name).await {
                    Ok(_) => {
                        address.set(String::new());
                        name.set(String::new());
                        save_error.set(None);
                    }
                    Err(e) => {
                        error!("Failed to save contact: {}", e);
                        save_error.set(Some(e.to_string()));
                    }
                }
            });
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
                    value: "{address}",
                    oninput: move |evt| address.set(evt.value()),
                }
                input {
                    style: INPUT_STYLE,
                    r#type: "text",
                    placeholder: "Name",
                    value: "{name}",
                    oninput: move |evt| name.set(evt.value()),
                }
                button {
                    style: button_style("#1E293B", "white"),
                    onclick: on_save,
                    "Save"
                }
            }

            if let Some(message) = save_error() {
                p { style: "font-size: 0.875rem; color: #DC2626; margin: 0;", "{message}" }
            }

            if contacts.read().is_empty() {
                p { style: "font-size: 0.875rem; color: #64748B; margin: 0;", "No contact yet" }
            }

            for contact in contacts.read().iter().cloned() {
                div {
                    key: "{contact.sip_address}",
                    style: "display: flex; align-items: center; gap: 16px; padding: 12px; border: 1px solid #E2E8F0; border-radius: 8px;",
                    div {
                        style: "flex-grow: 1;",
                        p { style: "margin: 0; font-weight: 500; color: #1E293B;", "{contact.display_name}" }
                        p { style: "margin: 4px 0 0 0; font-size: 0.75rem; color: #64748B;", "{contact.sip_address}" }
                    }
                    button {
                        style: button_style("white", "#374151"),
                        onclick: {
                            let sip_address = contact.sip_address.clone();
                            move |_| on_open.call(sip_address.clone())
                        },
                        "Chat"
                    }
                    button {
                        style: button_style("white", "#DC2626"),
                        onclick: {
                            let model = core.contacts().clone();
                            let sip_address = contact.sip_address.clone();
                            move |_| {
                                let model = model.clone();
                                let sip_address = sip_address.clone();
                                spawn(async move {
                                    if let Err(e) = model.remove_contact(&sip_address).await {
                                        error!("Failed to remove contact {}: {}", sip_address, e);
                                    }
                                });
                            }
                        },
                        "Remove"
                    }
                }
            }
        }
    }
}
