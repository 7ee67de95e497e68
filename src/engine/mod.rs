//! Façade over the telephony engine.
//!
//! The shell never talks SIP itself. An [`EngineFactory`] builds the engine
//! from its configuration files, and the engine reports back through the
//! [`EngineHandlers`] it was given. Events are only delivered from inside
//! [`Engine::iterate`], so everything the engine reports is observed on the
//! task that pumps it.

#[cfg(feature = "rvoip-engine")]
pub mod rvoip;

use std::path::PathBuf;

use log::error;
use tokio::sync::mpsc;

use crate::chat::ChatEntry;
use crate::error::EngineError;
use crate::settings::SettingChange;

/// Paths and identity handed to the engine at creation
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub config_path: PathBuf,
    pub factory_config_path: Option<PathBuf>,
    pub zrtp_secrets_file: PathBuf,
    pub user_certificates_dir: PathBuf,
    pub root_ca: PathBuf,
    pub friends_database: PathBuf,
    pub call_history_database: PathBuf,
    pub message_history_database: PathBuf,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Calling,
    Ringing,
    Connected,
    OnHold,
    Transferring,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    None,
    Progress,
    Ok,
    Failed(String),
}

/// Callbacks of the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Startup completed, the engine accepts commands
    Started,
    StartFailed(String),
    MessageReceived { peer: String, entry: ChatEntry },
    MessageSent { peer: String, entry: ChatEntry },
    CallStateChanged {
        call_id: String,
        peer: String,
        state: CallState,
        incoming: bool,
    },
    RegistrationChanged(RegistrationState),
}

/// Sink the engine reports its events to
#[derive(Clone)]
pub struct EngineHandlers {
    event_sender: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandlers {
    pub fn new(event_sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { event_sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.event_sender.send(event) {
            error!("Failed to deliver engine event: {}", e);
        }
    }
}

/// Commands are requests: results arrive later as [`EngineEvent`]s.
pub trait Engine: Send {
    /// Processes pending work and delivers callbacks. Must be called regularly.
    fn iterate(&mut self);

    fn refresh_registrations(&mut self);

    fn version(&self) -> String;

    fn send_message(&mut self, peer: &str, text: &str) -> Result<(), EngineError>;

    fn invite(&mut self, address: &str) -> Result<(), EngineError>;

    fn accept_call(&mut self, call_id: &str) -> Result<(), EngineError>;

    fn terminate_call(&mut self, call_id: &str) -> Result<(), EngineError>;

    fn settings_changed(&mut self, _change: &SettingChange) {}
}

/// Builds the engine. Runs on a blocking worker and may take its time.
pub trait EngineFactory: Send + Sync + 'static {
    fn create(
        &self,
        config: &EngineConfig,
        handlers: EngineHandlers,
    ) -> Result<Box<dyn Engine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn(&EngineConfig, EngineHandlers) -> Result<Box<dyn Engine>, EngineError>
        + Send
        + Sync
        + 'static,
{
    fn create(
        &self,
        config: &EngineConfig,
        handlers: EngineHandlers,
    ) -> Result<Box<dyn Engine>, EngineError> {
        self(config, handlers)
    }
}

/// SIP URI form of a user supplied address
pub fn normalize_sip_address(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("sip:") || address.starts_with("sips:") {
        address.to_string()
    } else {
        format!("sip:{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sip_addresses_get_scheme() {
        assert_eq!(normalize_sip_address("alice@example.org"), "sip:alice@example.org");
        assert_eq!(normalize_sip_address(" sip:bob@example.org "), "sip:bob@example.org");
        assert_eq!(normalize_sip_address("sips:carol@example.org"), "sips:carol@example.org");
    }

    #[test]
    fn handlers_forward_events() {
        let (handlers, mut events) = EngineHandlers::channel();
        handlers.emit(EngineEvent::Started);
        assert_eq!(events.try_recv().unwrap(), EngineEvent::Started);
    }
}
