use dioxus::prelude::*;

use super::{INPUT_STYLE, LABEL_STYLE};
use crate::network_utils::get_available_interfaces;
use crate::settings::{AccountSettings, ConnectionMode};

#[component]
pub fn AccountForm(mut account: Signal<AccountSettings>, ipv6_enabled: bool) -> Element {
    let current = account.read().clone();

    // Smart detection: if the URI contains @, it's P2P mode
    let mode = current.connection_mode();
    let is_server_mode = matches!(mode, ConnectionMode::Server { .. });

    // Get available network interfaces
    let interfaces = use_memo(move || get_available_interfaces(ipv6_enabled));

    let mode_text = match mode {
        ConnectionMode::Receiver => "Receiver Mode: Will listen for incoming calls",
        ConnectionMode::PeerToPeer { .. } => "P2P Mode: Connecting directly to peer",
        ConnectionMode::Server { .. } => "Server Mode: Will connect to SIP server",
    };

    rsx! {
        div {
            style: "display: flex; flex-direction: column; gap: 20px;",

            div {
                label { style: LABEL_STYLE, "Your Name" }
                input {
                    style: INPUT_STYLE,
                    r#type: "text",
                    placeholder: "Alice",
                    value: "{current.display_name}",
                    oninput: move |evt| account.write().display_name = evt.value(),
                }
            }

            div {
                label { style: LABEL_STYLE, "Connect To" }
                input {
                    style: INPUT_STYLE,
                    r#type: "text",
                    placeholder: "sip.example.com or alice@192.168.1.100",
                    value: "{current.server_uri}",
                    oninput: move |evt| account.write().server_uri = evt.value(),
                }
                p {
                    style: "font-size: 0.75rem; color: #6B7280; margin: 4px 0 0 0;",
                    "{mode_text}"
                }
            }

            // Credentials only matter when registering with a server
            if is_server_mode {
                div {
                    label { style: LABEL_STYLE, "Username" }
                    input {
                        style: INPUT_STYLE,
                        r#type: "text",
                        value: "{current.username}",
                        oninput: move |evt| account.write().username = evt.value(),
                    }
                }
                div {
                    label { style: LABEL_STYLE, "Password" }
                    input {
                        style: INPUT_STYLE,
                        r#type: "password",
                        placeholder: "Your password",
                        value: "{current.password}",
                        oninput: move |evt| account.write().password = evt.value(),
                    }
                }
            }

            div {
                label { style: LABEL_STYLE, "Network Interface" }
                select {
                    style: INPUT_STYLE,
                    value: current.local_ip.clone().unwrap_or_default(),
                    oninput: move |evt| {
                        let value = evt.value();
                        account.write().local_ip = (!value.is_empty()).then_some(value);
                    },
                    option { value: "", selected: current.local_ip.is_none(), "Automatic" }
                    for iface in interfaces.read().iter() {
                        option {
                            value: "{iface.ip}",
                            selected: current.local_ip.as_deref() == Some(iface.ip.to_string().as_str()),
                            "{iface.display_name}"
                        }
                    }
                }
            }

            div {
                label { style: LABEL_STYLE, "Port" }
                input {
                    style: INPUT_STYLE,
                    r#type: "number",
                    value: "{current.local_port}",
                    min: "1024",
                    max: "65535",
                    oninput: move |evt| {
                        if let Ok(port) = evt.value().parse::<u16>() {
                            account.write().local_port = port;
                        }
                    },
                }
                p {
                    style: "font-size: 0.75rem; color: #6B7280; margin: 4px 0 0 0;",
                    "Port number between 1024-65535"
                }
            }
        }
    }
}
