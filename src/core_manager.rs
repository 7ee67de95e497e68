//! Engine lifecycle.
//!
//! [`CoreManager::launch`] builds the engine on a blocking worker, then pumps
//! it every [`ITERATE_INTERVAL`] from a single task. Models that depend on a
//! running engine are only built once the engine reports it has started, and
//! are only reachable through the [`CoreContext`] handed out at that point.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::calls::{call_notice, CallsModel};
use crate::chat::{ChatEntry, ConversationsModel};
use crate::config::ConfigStore;
use crate::contacts::ContactsModel;
use crate::engine::{
    CallState, Engine, EngineConfig, EngineEvent, EngineFactory, EngineHandlers, RegistrationState,
};
use crate::error::EngineError;
use crate::settings::{SettingChange, SettingsModel};

pub const ITERATE_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CoreOptions {
    pub iterate_interval: Duration,
    /// Give up when the engine has not started by then
    pub start_timeout: Option<Duration>,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            iterate_interval: ITERATE_INTERVAL,
            start_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Clone)]
pub enum CoreEvent {
    /// The engine object exists and is being pumped
    Created,
    /// The engine started, dependent models are ready
    Started(Arc<CoreContext>),
    Failed(String),
    RegistrationChanged(RegistrationState),
}

impl std::fmt::Debug for CoreEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreEvent::Created => write!(f, "Created"),
            CoreEvent::Started(_) => write!(f, "Started"),
            CoreEvent::Failed(reason) => write!(f, "Failed({})", reason),
            CoreEvent::RegistrationChanged(state) => write!(f, "RegistrationChanged({:?})", state),
        }
    }
}

struct EngineHandle {
    engine: Mutex<Box<dyn Engine>>,
    video_render: Mutex<()>,
}

impl EngineHandle {
    fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            engine: Mutex::new(engine),
            video_render: Mutex::new(()),
        }
    }

    fn engine(&self) -> MutexGuard<'_, Box<dyn Engine>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_video_render(&self) -> MutexGuard<'_, ()> {
        self.video_render.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn iterate(&self) {
        let _render = self.lock_video_render();
        self.engine().iterate();
    }
}

/// Access to a started engine and the models built on top of it
pub struct CoreContext {
    engine: Arc<EngineHandle>,
    settings: SettingsModel,
    calls: CallsModel,
    contacts: ContactsModel,
    conversations: ConversationsModel,
}

impl CoreContext {
    pub fn settings(&self) -> &SettingsModel {
        &self.settings
    }

    pub fn calls(&self) -> &CallsModel {
        &self.calls
    }

    pub fn contacts(&self) -> &ContactsModel {
        &self.contacts
    }

    pub fn conversations(&self) -> &ConversationsModel {
        &self.conversations
    }

    pub fn version(&self) -> String {
        self.engine.engine().version()
    }

    pub fn refresh_registrations(&self) {
        info!("Refresh registers.");
        self.engine.engine().refresh_registrations();
    }

    pub fn send_message(&self, peer: &str, text: &str) -> Result<(), EngineError> {
        self.engine.engine().send_message(peer, text)
    }

    pub fn invite(&self, address: &str) -> Result<(), EngineError> {
        self.engine.engine().invite(address)
    }

    pub fn accept_call(&self, call_id: &str) -> Result<(), EngineError> {
        self.engine.engine().accept_call(call_id)
    }

    pub fn terminate_call(&self, call_id: &str) -> Result<(), EngineError> {
        self.engine.engine().terminate_call(call_id)
    }

    /// Held by video renderers while they touch frame buffers shared with the engine
    pub fn lock_video_render(&self) -> MutexGuard<'_, ()> {
        self.engine.lock_video_render()
    }
}

/// Owner of the engine task. Dropping it stops the engine.
pub struct CoreManager {
    events: mpsc::UnboundedReceiver<CoreEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CoreManager {
    pub fn launch(
        factory: Arc<dyn EngineFactory>,
        config: EngineConfig,
        store: Arc<ConfigStore>,
        options: CoreOptions,
    ) -> Self {
        let (event_sender, events) = mpsc::unbounded_channel();
        let (shutdown, shutdown_receiver) = oneshot::channel();

        let task = tokio::spawn(run_core(
            factory,
            config,
            store,
            options,
            event_sender,
            shutdown_receiver,
        ));

        Self {
            events,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub async fn next_event(&mut self) -> Option<CoreEvent> {
        self.events.recv().await
    }

    /// Waits for the context, or for the reason the engine could not start
    pub async fn wait_started(&mut self) -> Result<Arc<CoreContext>, String> {
        while let Some(event) = self.next_event().await {
            match event {
                CoreEvent::Started(context) => return Ok(context),
                CoreEvent::Failed(reason) => return Err(reason),
                other => debug!("Core event while starting: {:?}", other),
            }
        }
        Err("engine task stopped".to_string())
    }

    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Engine task ended abnormally: {}", e);
            }
        }
        info!("Engine stopped");
    }
}

impl Drop for CoreManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_core(
    factory: Arc<dyn EngineFactory>,
    config: EngineConfig,
    store: Arc<ConfigStore>,
    options: CoreOptions,
    events: mpsc::UnboundedSender<CoreEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("Launch async engine creation.");
    let (handlers, mut engine_events) = EngineHandlers::channel();
    let friends_database = config.friends_database.clone();
    let build = tokio::task::spawn_blocking(move || factory.create(&config, handlers));

    let engine = match build.await {
        Ok(Ok(engine)) => engine,
        Ok(Err(e)) => {
            error!("Failed to create engine: {}", e);
            let _ = events.send(CoreEvent::Failed(e.to_string()));
            return;
        }
        Err(e) => {
            error!("Engine creation aborted: {}", e);
            let _ = events.send(CoreEvent::Failed(format!("engine creation aborted: {}", e)));
            return;
        }
    };

    let engine = Arc::new(EngineHandle::new(engine));
    info!("Engine created. Enable iterate.");
    if events.send(CoreEvent::Created).is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(options.iterate_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start_deadline = options.start_timeout.map(|timeout| Instant::now() + timeout);

    let mut dispatcher = Dispatcher {
        engine: engine.clone(),
        store,
        friends_database,
        events,
        context: None,
        settings_changes: None,
    };

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                engine.iterate();
                let mut running = true;
                while let Ok(event) = engine_events.try_recv() {
                    if !dispatcher.dispatch(event).await {
                        running = false;
                        break;
                    }
                }
                if !running {
                    break;
                }
                if dispatcher.context.is_none() && start_deadline.is_some_and(|d| Instant::now() >= d) {
                    error!("Engine did not start in time");
                    let _ = dispatcher.events.send(CoreEvent::Failed("engine did not start in time".to_string()));
                    break;
                }
            }
            Some(change) = next_change(&mut dispatcher.settings_changes) => {
                engine.engine().settings_changed(&change);
            }
        }
    }
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<SettingChange>>,
) -> Option<SettingChange> {
    let Some(changes) = changes else {
        return std::future::pending().await;
    };
    loop {
        match changes.recv().await {
            Ok(change) => return Some(change),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Engine missed {} settings changes", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

struct Dispatcher {
    engine: Arc<EngineHandle>,
    store: Arc<ConfigStore>,
    friends_database: PathBuf,
    events: mpsc::UnboundedSender<CoreEvent>,
    context: Option<Arc<CoreContext>>,
    settings_changes: Option<broadcast::Receiver<SettingChange>>,
}

impl Dispatcher {
    /// Returns false once the core loop must stop
    async fn dispatch(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Started => {
                if self.context.is_some() {
                    warn!("Engine reported started twice");
                    return true;
                }
                let settings = SettingsModel::new(self.store.clone());
                self.settings_changes = Some(settings.subscribe());
                let contacts = ContactsModel::open(&self.friends_database).unwrap_or_else(|e| {
                    error!("Contacts unavailable, keeping them in memory: {}", e);
                    ContactsModel::in_memory()
                });
                let context = Arc::new(CoreContext {
                    engine: self.engine.clone(),
                    settings,
                    calls: CallsModel::new(),
                    contacts,
                    conversations: ConversationsModel::new(),
                });
                self.context = Some(context.clone());
                info!("Engine started.");
                self.events.send(CoreEvent::Started(context)).is_ok()
            }
            EngineEvent::StartFailed(reason) => {
                error!("Engine failed to start: {}", reason);
                let _ = self.events.send(CoreEvent::Failed(reason));
                false
            }
            EngineEvent::RegistrationChanged(state) => {
                info!("Registration state: {:?}", state);
                self.events.send(CoreEvent::RegistrationChanged(state)).is_ok()
            }
            EngineEvent::MessageReceived { peer, entry } | EngineEvent::MessageSent { peer, entry } => {
                match &self.context {
                    Some(context) => {
                        context.conversations().append(&peer, entry).await;
                    }
                    None => warn!("Dropping message of {} received before start", peer),
                }
                true
            }
            EngineEvent::CallStateChanged {
                call_id,
                peer,
                state,
                incoming,
            } => {
                let Some(context) = self.context.clone() else {
                    warn!("Dropping call event of {} received before start", peer);
                    return true;
                };
                let call = context.calls().update(&call_id, &peer, state, incoming).await;

                let auto_answer = context.settings().store().read(|s| s.misc.auto_answer);
                if incoming && state == CallState::Ringing && auto_answer {
                    info!("Auto answering call {} from {}", call_id, peer);
                    let result = self.engine.engine().accept_call(&call_id);
                    if let Err(e) = result {
                        error!("Failed to auto answer {}: {}", call_id, e);
                    }
                }

                if let Some(notice) = call_notice(&call) {
                    context
                        .conversations()
                        .append(&peer, ChatEntry::notice(notice))
                        .await;
                }
                true
            }
        }
    }
}
