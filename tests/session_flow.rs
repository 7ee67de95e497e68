use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use sip_desktop::bootstrap::{run_sessions, RESTART_EXIT_CODE};
use sip_desktop::chat::{
    ChatEntry, ChatProxyModel, ConversationEvent, Direction, EntryFilter, EntryKind, ENTRIES_CHUNK_SIZE,
};
use sip_desktop::config::ConfigStore;
use sip_desktop::core_manager::{CoreManager, CoreOptions};
use sip_desktop::engine::{
    CallState, Engine, EngineConfig, EngineEvent, EngineFactory, EngineHandlers,
};
use sip_desktop::error::EngineError;
use sip_desktop::paths::Paths;
use sip_desktop::settings::{PortRange, SettingChange};

const PEER: &str = "sip:alice@example.org";

/// Starts on the first iteration and echoes sent messages back
struct EchoEngine {
    handlers: EngineHandlers,
    started: bool,
    outbox: Arc<Mutex<Vec<EngineEvent>>>,
}

impl Engine for EchoEngine {
    fn iterate(&mut self) {
        if !self.started {
            self.started = true;
            self.handlers.emit(EngineEvent::Started);
        }
        for event in self.outbox.lock().unwrap().drain(..) {
            self.handlers.emit(event);
        }
    }

    fn refresh_registrations(&mut self) {}

    fn version(&self) -> String {
        "echo".to_string()
    }

    fn send_message(&mut self, peer: &str, text: &str) -> Result<(), EngineError> {
        let mut outbox = self.outbox.lock().unwrap();
        outbox.push(EngineEvent::MessageSent {
            peer: peer.to_string(),
            entry: ChatEntry::text(Direction::Outgoing, text),
        });
        outbox.push(EngineEvent::MessageReceived {
            peer: peer.to_string(),
            entry: ChatEntry::text(Direction::Incoming, format!("re: {}", text)),
        });
        Ok(())
    }

    fn invite(&mut self, address: &str) -> Result<(), EngineError> {
        self.outbox.lock().unwrap().push(EngineEvent::CallStateChanged {
            call_id: "call-1".to_string(),
            peer: address.to_string(),
            state: CallState::Ended,
            incoming: false,
        });
        Ok(())
    }

    fn accept_call(&mut self, _call_id: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn terminate_call(&mut self, call_id: &str) -> Result<(), EngineError> {
        Err(EngineError::UnknownCall(call_id.to_string()))
    }
}

fn echo_factory() -> Arc<dyn EngineFactory> {
    Arc::new(
        |_: &EngineConfig, handlers: EngineHandlers| -> Result<Box<dyn Engine>, EngineError> {
            Ok(Box::new(EchoEngine {
                handlers,
                started: false,
                outbox: Arc::new(Mutex::new(Vec::new())),
            }))
        },
    )
}

fn options() -> CoreOptions {
    CoreOptions {
        iterate_interval: Duration::from_millis(2),
        start_timeout: Some(Duration::from_secs(5)),
    }
}

fn paths(dir: &tempfile::TempDir) -> Paths {
    Paths::new(
        dir.path().join("config"),
        dir.path().join("data"),
        dir.path().join("share"),
    )
}

fn launch(paths: &Paths) -> CoreManager {
    let store = Arc::new(ConfigStore::open(paths.config_file_path(None), None).unwrap());
    let security = store.read(|settings| settings.security.clone());
    let config = paths.engine_config(None, &security, "session-test");
    CoreManager::launch(echo_factory(), config, store, options())
}

async fn wait_appended(events: &mut tokio::sync::broadcast::Receiver<ConversationEvent>, count: usize) {
    let mut seen = 0;
    while seen < count {
        if let ConversationEvent::EntryAppended { .. } = events.recv().await.unwrap() {
            seen += 1;
        }
    }
}

#[tokio::test]
async fn conversation_window_follows_new_entries() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(&dir);
    paths.ensure_dirs().unwrap();

    let mut core = launch(&paths);
    let context = core.wait_started().await.unwrap();
    let conversations = context.conversations().clone();
    let mut events = conversations.subscribe();

    for i in 0..ENTRIES_CHUNK_SIZE {
        context.send_message(PEER, &format!("message {}", i)).unwrap();
    }
    wait_appended(&mut events, ENTRIES_CHUNK_SIZE * 2).await;

    let log = conversations.snapshot(PEER).await;
    let mut proxy = ChatProxyModel::new(&log);
    assert_eq!(proxy.available_count(), 100);
    assert_eq!(proxy.row_count(), ENTRIES_CHUNK_SIZE);
    assert_eq!(proxy.rows(&log).last().unwrap().summary(), "re: message 49");

    // A call ending without answer leaves a notice, which stays visible
    context.invite(PEER).unwrap();
    wait_appended(&mut events, 1).await;
    let log = conversations.snapshot(PEER).await;
    proxy.on_entry_appended(&log);
    assert_eq!(proxy.row_count(), ENTRIES_CHUNK_SIZE + 1);
    assert_eq!(proxy.rows(&log).last().unwrap().summary(), "[Call not answered]");

    proxy.set_entry_filter(EntryFilter::Only(EntryKind::Notice), &log);
    assert_eq!(proxy.row_count(), 1);
    assert_eq!(proxy.load_more_entries(&log), None);

    proxy.set_entry_filter(EntryFilter::All, &log);
    proxy.load_more_entries(&log);
    assert_eq!(proxy.row_count(), 101);

    assert!(matches!(
        context.terminate_call("call-1"),
        Err(EngineError::UnknownCall(_))
    ));
    core.shutdown().await;
}

#[tokio::test]
async fn restart_picks_up_saved_settings() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(&dir);
    paths.ensure_dirs().unwrap();
    let ports = PortRange::new(20000, 20100);
    let seen = Mutex::new(Vec::new());

    let code = run_sessions(|generation| {
        let paths = paths.clone();
        let seen = &seen;
        async move {
            let mut core = launch(&paths);
            let context = core.wait_started().await.unwrap();
            seen.lock()
                .unwrap()
                .push(context.settings().settings().network.audio_ports);

            let code = if generation == 0 {
                let change = SettingChange::AudioPortRange(ports);
                assert!(change.requires_restart());
                context.settings().apply(vec![change]).unwrap();
                RESTART_EXIT_CODE
            } else {
                0
            };
            core.shutdown().await;
            code
        }
    })
    .await;

    assert_eq!(code, 0);
    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0], ports);
    assert_eq!(seen[1], ports);
}
