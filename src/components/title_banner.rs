use dioxus::prelude::*;

use crate::engine::RegistrationState;

#[component]
pub fn TitleBanner(registration: RegistrationState, version: Option<String>) -> Element {
    let (status_text, status_color) = match &registration {
        RegistrationState::None => ("Not registered".to_string(), "#94A3B8"),
        RegistrationState::Progress => ("Registering...".to_string(), "#FBBF24"),
        RegistrationState::Ok => ("Registered".to_string(), "#34D399"),
        RegistrationState::Failed(reason) => (reason.clone(), "#F87171"),
    };

    rsx! {
        div {
            style: "
                background: #1E293B;
                color: white;
                padding: 16px 20px;
                display: flex;
                align-items: center;
                justify-content: space-between;
                box-shadow: 0 1px 3px rgba(0, 0, 0, 0.2);
            ",
            div {
                span { style: "font-weight: 600; font-size: 1.25rem; letter-spacing: 0.025em;", "SIP Desktop" }
                if let Some(version) = version {
                    span { style: "margin-left: 12px; font-size: 0.75rem; color: #94A3B8;", "{version}" }
                }
            }
            span {
                style: format!("font-size: 0.875rem; color: {};", status_color),
                "{status_text}"
            }
        }
    }
}
