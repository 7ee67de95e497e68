pub mod account_form;
pub mod app;
pub mod calls_panel;
pub mod chat_view;
pub mod contacts_panel;
pub mod incoming_call_screen;
pub mod settings_screen;
pub mod startup_screen;
pub mod title_banner;

use std::ops::Deref;
use std::sync::Arc;

use crate::core_manager::CoreContext;

pub use account_form::AccountForm;
pub use app::{App, Launch};
pub use calls_panel::CallsPanel;
pub use chat_view::ChatView;
pub use contacts_panel::ContactsPanel;
pub use incoming_call_screen::IncomingCallScreen;
pub use settings_screen::SettingsScreen;
pub use startup_screen::StartupScreen;
pub use title_banner::TitleBanner;

/// Started engine as a component property, equal only to itself
#[derive(Clone)]
pub struct CoreHandle(pub Arc<CoreContext>);

impl PartialEq for CoreHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for CoreHandle {
    type Target = CoreContext;

    fn deref(&self) -> &CoreContext {
        &self.0
    }
}

const LABEL_STYLE: &str = "
    display: block;
    font-size: 0.875rem;
    font-weight: 500;
    color: #374151;
    margin-bottom: 8px;
";

const INPUT_STYLE: &str = "
    width: 100%;
    padding: 12px 16px;
    border: 1px solid #D1D5DB;
    border-radius: 6px;
    font-size: 0.875rem;
    background: white;
    color: #374151;
    box-sizing: border-box;
";

const CARD_STYLE: &str = "
    background: white;
    border-radius: 12px;
    padding: 32px;
    box-shadow: 0 1px 3px rgba(0, 0, 0, 0.1);
    border: 1px solid #E2E8F0;
";

fn button_style(background: &str, color: &str) -> String {
    format!(
        "
        padding: 12px 16px;
        background: {};
        color: {};
        border: 1px solid #D1D5DB;
        border-radius: 6px;
        font-size: 0.875rem;
        font-weight: 500;
        cursor: pointer;
        ",
        background, color
    )
}
