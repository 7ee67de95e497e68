use dioxus::prelude::*;

use super::{button_style, CARD_STYLE};

/// Shown until the engine has started, or with the reason it could not
#[component]
pub fn StartupScreen(
    failure: Option<String>,
    on_restart: EventHandler<()>,
    on_quit: EventHandler<()>,
) -> Element {
    rsx! {
        div {
            style: format!("{} text-align: center;", CARD_STYLE),

            match failure {
                None => rsx! {
                    h2 { style: "font-size: 1.5rem; font-weight: 500; color: #1E293B; margin: 0 0 8px 0;", "Starting" }
                    p { style: "font-size: 0.875rem; color: #64748B; margin: 0;", "Waiting for the SIP engine..." }
                },
                Some(reason) => rsx! {
                    h2 { style: "font-size: 1.5rem; font-weight: 500; color: #DC2626; margin: 0 0 8px 0;", "The SIP engine could not start" }
                    p { style: "font-size: 0.875rem; color: #64748B; margin: 0 0 24px 0;", "{reason}" }
                    div {
                        style: "display: flex; gap: 12px; justify-content: center;",
                        button {
                            style: button_style("#1E293B", "white"),
                            onclick: move |_| on_restart.call(()),
                            "Restart"
                        }
                        button {
                            style: button_style("white", "#374151"),
                            onclick: move |_| on_quit.call(()),
                            "Quit"
                        }
                    }
                },
            }
        }
    }
}
