use std::path::PathBuf;
use std::sync::Arc;

use dioxus::prelude::*;
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;

use super::{CallsPanel, ChatView, ContactsPanel, CoreHandle, SettingsScreen, StartupScreen, TitleBanner, INPUT_STYLE};
use crate::bootstrap::{run_sessions, RESTART_EXIT_CODE};
use crate::chat::SipAddressEntry;
use crate::config::ConfigStore;
use crate::core_manager::{CoreEvent, CoreManager, CoreOptions};
use crate::engine::{normalize_sip_address, EngineFactory, RegistrationState};
use crate::instance::{AppCommand, CommandListener};
use crate::paths::Paths;

/// What the window gets from process startup
#[derive(Clone)]
pub struct Launch {
    pub paths: Arc<Paths>,
    pub custom_config: Option<PathBuf>,
    pub factory: Arc<dyn EngineFactory>,
    /// Commands forwarded by later instances
    pub commands: Arc<Mutex<Option<CommandListener>>>,
    /// Command given to this process, run once the first engine started
    pub initial_command: Option<AppCommand>,
    pub user_agent: String,
}

#[derive(Clone, PartialEq)]
enum CoreState {
    Starting,
    Failed(String),
    Ready(CoreHandle),
}

#[derive(Debug, Clone, Copy)]
enum UiCommand {
    Restart,
    Quit,
}

#[derive(Clone, Copy, PartialEq)]
enum Screen {
    Chat,
    Calls,
    Contacts,
    Settings,
}

type UiCommands = Arc<Mutex<UnboundedReceiver<UiCommand>>>;

pub fn App() -> Element {
    let launch = use_context::<Launch>();
    let core_state = use_signal(|| CoreState::Starting);
    let registration = use_signal(|| RegistrationState::None);

    // The coroutine owns the engine of the current session and starts a
    // new one whenever the previous session asked for a restart
    let sessions = use_coroutine(move |rx: UnboundedReceiver<UiCommand>| {
        let launch = launch.clone();
        async move {
            let ui_commands: UiCommands = Arc::new(Mutex::new(rx));
            let code = run_sessions(|generation| {
                run_session(
                    generation,
                    launch.clone(),
                    ui_commands.clone(),
                    core_state,
                    registration,
                )
            })
            .await;
            info!("Closing window, exit code {}", code);
            dioxus::desktop::window().close();
        }
    });

    let version = match &*core_state.read() {
        CoreState::Ready(core) => Some(core.version()),
        _ => None,
    };

    rsx! {
        div {
            style: "font-family: inherit; min-height: 100vh; background: #F8FAFC; margin: 0; display: flex; flex-direction: column;",

            TitleBanner { registration: registration(), version: version }

            div {
                style: "padding: 24px 20px; flex-grow: 1; display: flex; flex-direction: column;",
                match core_state() {
                    CoreState::Starting => rsx! {
                        StartupScreen {
                            failure: None,
                            on_restart: move |_| sessions.send(UiCommand::Restart),
                            on_quit: move |_| sessions.send(UiCommand::Quit),
                        }
                    },
                    CoreState::Failed(reason) => rsx! {
                        StartupScreen {
                            failure: Some(reason),
                            on_restart: move |_| sessions.send(UiCommand::Restart),
                            on_quit: move |_| sessions.send(UiCommand::Quit),
                        }
                    },
                    CoreState::Ready(core) => rsx! {
                        MainScreen {
                            core: core,
                            on_restart: move |_| sessions.send(UiCommand::Restart),
                        }
                    },
                }
            }
        }
    }
}

async fn run_session(
    generation: u32,
    launch: Launch,
    ui_commands: UiCommands,
    mut core_state: Signal<CoreState>,
    mut registration: Signal<RegistrationState>,
) -> i32 {
    info!("Starting session #{}", generation);
    core_state.set(CoreState::Starting);
    registration.set(RegistrationState::None);

    let mut ui_commands = ui_commands.lock().await;
    let mut instance_commands = launch.commands.lock().await;

    let custom_config = launch.custom_config.as_deref();
    let factory_path = launch.paths.factory_config_file_path();
    let store = match ConfigStore::open(
        launch.paths.config_file_path(custom_config),
        factory_path.exists().then_some(factory_path.as_path()),
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open configuration: {}", e);
            core_state.set(CoreState::Failed(e.to_string()));
            return exit_code(ui_commands.next().await);
        }
    };

    let security = store.read(|settings| settings.security.clone());
    let config = launch
        .paths
        .engine_config(custom_config, &security, launch.user_agent.clone());
    let mut core = CoreManager::launch(launch.factory.clone(), config, store, CoreOptions::default());
    let mut context: Option<CoreHandle> = None;

    loop {
        tokio::select! {
            Some(event) = core.next_event() => match event {
                CoreEvent::Created => info!("Engine created, waiting for start"),
                CoreEvent::Started(started) => {
                    let handle = CoreHandle(started);
                    context = Some(handle.clone());
                    core_state.set(CoreState::Ready(handle));
                    if generation == 0 {
                        if let Some(command) = launch.initial_command.clone() {
                            handle_instance_command(command, context.as_ref());
                        }
                    }
                }
                CoreEvent::Failed(reason) => {
                    context = None;
                    core_state.set(CoreState::Failed(reason));
                }
                CoreEvent::RegistrationChanged(state) => registration.set(state),
            },
            command = ui_commands.next() => {
                let code = exit_code(command);
                core.shutdown().await;
                return code;
            }
            Some(command) = next_instance_command(&mut instance_commands) => {
                handle_instance_command(command, context.as_ref());
            }
        }
    }
}

fn exit_code(command: Option<UiCommand>) -> i32 {
    match command {
        Some(UiCommand::Restart) => RESTART_EXIT_CODE,
        Some(UiCommand::Quit) | None => 0,
    }
}

async fn next_instance_command(listener: &mut Option<CommandListener>) -> Option<AppCommand> {
    match listener {
        Some(listener) => listener.next().await,
        None => std::future::pending().await,
    }
}

fn handle_instance_command(command: AppCommand, core: Option<&CoreHandle>) {
    let window = dioxus::desktop::window();
    match command {
        AppCommand::Show => {
            window.set_visible(true);
            window.set_minimized(false);
            window.set_focus();
        }
        AppCommand::Call(address) => match core {
            Some(core) => {
                window.set_focus();
                if let Err(e) = core.invite(&address) {
                    error!("Failed to call {}: {}", address, e);
                }
            }
            None => warn!("Cannot call {} before the engine started", address),
        },
        AppCommand::Unknown(text) => warn!("Ignoring unknown command `{}`", text),
    }
}

#[component]
fn MainScreen(core: CoreHandle, on_restart: EventHandler<()>) -> Element {
    let mut screen = use_signal(|| Screen::Chat);
    let mut peers = use_signal(Vec::<(String, SipAddressEntry)>::new);
    let mut selected_peer = use_signal(|| None::<String>);
    let mut new_peer = use_signal(String::new);

    use_future({
        let core = core.clone();
        move || {
            let core = core.clone();
            async move {
                let conversations = core.conversations().clone();
                let contacts = core.contacts().clone();
                let mut conversation_events = conversations.subscribe();
                let mut contact_events = contacts.subscribe();
                loop {
                    let mut named = Vec::new();
                    for entry in conversations.sip_addresses().await {
                        named.push((contacts.display_name(&entry.sip_address).await, entry));
                    }
                    peers.set(named);

                    // A lagged receiver catches up with the refresh above
                    let closed = tokio::select! {
                        event = conversation_events.recv() => matches!(event, Err(RecvError::Closed)),
                        event = contact_events.recv() => matches!(event, Err(RecvError::Closed)),
                    };
                    if closed {
                        break;
                    }
                }
            }
        }
    });

    let tab = move |target: Screen, label: &'static str| {
        let active = screen() == target;
        rsx! {
            button {
                style: format!(
                    "padding: 10px 16px; border: none; border-bottom: 2px solid {}; background: none; font-size: 0.875rem; font-weight: 500; color: {}; cursor: pointer;",
                    if active { "#1E293B" } else { "transparent" },
                    if active { "#1E293B" } else { "#64748B" },
                ),
                onclick: move |_| screen.set(target),
                "{label}"
            }
        }
    };

    rsx! {
        div {
            style: "display: flex; gap: 8px; margin-bottom: 16px; border-bottom: 1px solid #E2E8F0;",
            {tab(Screen::Chat, "Chat")}
            {tab(Screen::Calls, "Calls")}
            {tab(Screen::Contacts, "Contacts")}
            {tab(Screen::Settings, "Settings")}
        }

        match screen() {
            Screen::Chat => rsx! {
                div {
                    style: "display: flex; gap: 16px;",
                    div {
                        style: "width: 240px; display: flex; flex-direction: column; gap: 8px;",
                        input {
                            style: INPUT_STYLE,
                            r#type: "text",
                            placeholder: "New conversation",
                            value: "{new_peer}",
                            oninput: move |evt| new_peer.set(evt.value()),
                            onkeydown: move |evt| {
                                if evt.key() == Key::Enter && !new_peer.read().trim().is_empty() {
                                    selected_peer.set(Some(normalize_sip_address(&new_peer.read())));
                                    new_peer.set(String::new());
                                }
                            },
                        }
                        for (name, peer) in peers.read().iter().cloned() {
                            button {
                                key: "{peer.sip_address}",
                                style: "text-align: left; padding: 8px 12px; border: 1px solid #E2E8F0; border-radius: 6px; background: white; cursor: pointer;",
                                onclick: {
                                    let address = peer.sip_address.clone();
                                    move |_| selected_peer.set(Some(address.clone()))
                                },
                                title: "{peer.sip_address}",
                                "{name} ({peer.entry_count})"
                            }
                        }
                    }
                    div {
                        style: "flex-grow: 1;",
                        if let Some(peer) = selected_peer() {
                            ChatView { key: "{peer}", core: core.clone(), peer: peer }
                        } else {
                            p { style: "font-size: 0.875rem; color: #64748B;", "Select a conversation" }
                        }
                    }
                }
            },
            Screen::Calls => rsx! { CallsPanel { core: core.clone() } },
            Screen::Contacts => rsx! {
                ContactsPanel {
                    core: core.clone(),
                    on_open: move |address: String| {
                        selected_peer.set(Some(address));
                        screen.set(Screen::Chat);
                    },
                }
            },
            Screen::Settings => rsx! { SettingsScreen { core: core.clone(), on_restart: on_restart } },
        }
    }
}
