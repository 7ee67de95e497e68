use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// Import rvoip sip-client types
use rvoip::sip_client::{
    CallId, CallState as SipCallState, SipClient, SipClientBuilder, SipClientEvent,
};

use super::{
    normalize_sip_address, CallState, Engine, EngineConfig, EngineEvent, EngineFactory,
    EngineHandlers, RegistrationState,
};
use crate::config::ConfigStore;
use crate::error::EngineError;
use crate::network_utils::default_identity_ip;
use crate::settings::{AccountSettings, ConnectionMode, SettingChange};

impl From<SipCallState> for CallState {
    fn from(state: SipCallState) -> Self {
        match state {
            SipCallState::Initiating => CallState::Calling,
            SipCallState::Ringing => CallState::Ringing,
            SipCallState::IncomingRinging => CallState::Ringing,
            SipCallState::Connected => CallState::Connected,
            SipCallState::OnHold => CallState::OnHold,
            SipCallState::Transferring => CallState::Transferring,
            SipCallState::Terminated => CallState::Ended,
        }
    }
}

#[derive(Debug, Clone)]
struct CallPeer {
    remote_uri: String,
    incoming: bool,
}

enum Update {
    Client(SipClientEvent),
    Engine(EngineEvent),
}

/// Builds [`RvoipEngine`]s on the given runtime
pub struct RvoipFactory {
    runtime: Handle,
}

impl RvoipFactory {
    /// `runtime` must have worker threads of its own, client tasks live there
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl EngineFactory for RvoipFactory {
    fn create(
        &self,
        config: &EngineConfig,
        handlers: EngineHandlers,
    ) -> Result<Box<dyn Engine>, EngineError> {
        let store = ConfigStore::open(&config.config_path, config.factory_config_path.as_deref())
            .map_err(|e| EngineError::Creation(e.to_string()))?;
        let account = store.read(|settings| settings.account.clone());
        info!("Initializing SIP client in {:?} mode", account.connection_mode());

        let client = self
            .runtime
            .block_on(build_client(&account))
            .map_err(|e| EngineError::Creation(format!("{:#}", e)))?;

        let (updates, receiver) = mpsc::unbounded_channel();
        let mut events = client.event_iter();
        let forwarder = {
            let updates = updates.clone();
            self.runtime.spawn(async move {
                while let Some(event) = events.next().await {
                    if updates.send(Update::Client(event)).is_err() {
                        break;
                    }
                }
            })
        };

        info!("SIP client initialized successfully");
        Ok(Box::new(RvoipEngine {
            client,
            runtime: self.runtime.clone(),
            handlers,
            updates,
            receiver,
            pending: VecDeque::from([EngineEvent::Started]),
            calls: Arc::new(Mutex::new(HashMap::new())),
            forwarder,
        }))
    }
}

async fn build_client(account: &AccountSettings) -> Result<SipClient> {
    let local_addr = if let Some(ip) = &account.local_ip {
        format!("{}:{}", ip, account.local_port)
    } else {
        format!("0.0.0.0:{}", account.local_port)
    };

    let client = match account.connection_mode() {
        ConnectionMode::Server {
            server_uri,
            username,
            password,
        } => {
            let server_host = server_uri.strip_prefix("sip:").unwrap_or(&server_uri);
            let sip_identity = format!("sip:{}@{}", username, server_host);

            SipClientBuilder::new()
                .sip_identity(sip_identity)
                .local_address(local_addr.parse()?)
                .register(|reg| reg.credentials(username.clone(), password.clone()).expires(3600))
                .build()
                .await?
        }
        ConnectionMode::PeerToPeer { .. } | ConnectionMode::Receiver => {
            let identity_ip = account.local_ip.clone().unwrap_or_else(default_identity_ip);
            let sip_identity = format!(
                "sip:{}@{}:{}",
                account.display_name, identity_ip, account.local_port
            );

            SipClientBuilder::new()
                .sip_identity(sip_identity)
                .local_address(local_addr.parse()?)
                .build()
                .await?
        }
    };

    client.start().await?;
    Ok(client)
}

fn call_event(calls: &mut HashMap<String, CallPeer>, call_id: String, state: CallState) -> EngineEvent {
    let peer = calls.get(&call_id).cloned().unwrap_or(CallPeer {
        remote_uri: "unknown".to_string(),
        incoming: false,
    });
    if state == CallState::Ended {
        calls.remove(&call_id);
    }
    EngineEvent::CallStateChanged {
        call_id,
        peer: peer.remote_uri,
        state,
        incoming: peer.incoming,
    }
}

/// Engine over an rvoip [`SipClient`].
///
/// Client events are queued by a forwarding task and only handed to the
/// handlers from [`Engine::iterate`].
pub struct RvoipEngine {
    client: SipClient,
    runtime: Handle,
    handlers: EngineHandlers,
    updates: mpsc::UnboundedSender<Update>,
    receiver: mpsc::UnboundedReceiver<Update>,
    pending: VecDeque<EngineEvent>,
    calls: Arc<Mutex<HashMap<String, CallPeer>>>,
    forwarder: JoinHandle<()>,
}

impl RvoipEngine {
    fn translate(&mut self, event: SipClientEvent) -> Option<EngineEvent> {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            SipClientEvent::IncomingCall { call, from, .. } => {
                let call_id = call.id.to_string();
                calls.insert(
                    call_id.clone(),
                    CallPeer {
                        remote_uri: from,
                        incoming: true,
                    },
                );
                Some(call_event(&mut calls, call_id, CallState::Ringing))
            }
            SipClientEvent::CallStateChanged { call, new_state, .. } => Some(call_event(
                &mut calls,
                call.id.to_string(),
                CallState::from(new_state),
            )),
            SipClientEvent::CallEnded { call } => {
                Some(call_event(&mut calls, call.id.to_string(), CallState::Ended))
            }
            SipClientEvent::CallOnHold { call } => {
                Some(call_event(&mut calls, call.id.to_string(), CallState::OnHold))
            }
            SipClientEvent::CallResumed { call } => {
                Some(call_event(&mut calls, call.id.to_string(), CallState::Connected))
            }
            SipClientEvent::RegistrationStatusChanged { status, .. } => {
                let state = match status.as_str() {
                    "pending" => RegistrationState::Progress,
                    "active" => RegistrationState::Ok,
                    "failed" => RegistrationState::Failed("Registration failed".to_string()),
                    _ => RegistrationState::None,
                };
                Some(EngineEvent::RegistrationChanged(state))
            }
            other => {
                debug!("Unhandled event: {:?}", other);
                None
            }
        }
    }

    fn parse_call_id(call_id: &str) -> Result<CallId, EngineError> {
        CallId::parse_str(call_id).map_err(|_| EngineError::UnknownCall(call_id.to_string()))
    }
}

impl Engine for RvoipEngine {
    fn iterate(&mut self) {
        while let Some(event) = self.pending.pop_front() {
            self.handlers.emit(event);
        }
        while let Ok(update) = self.receiver.try_recv() {
            let event = match update {
                Update::Client(event) => self.translate(event),
                Update::Engine(event) => Some(event),
            };
            if let Some(event) = event {
                self.handlers.emit(event);
            }
        }
    }

    fn refresh_registrations(&mut self) {
        info!("Registration is refreshed automatically by the SIP client");
    }

    fn version(&self) -> String {
        format!("rvoip sip-client (sip_desktop {})", env!("CARGO_PKG_VERSION"))
    }

    fn send_message(&mut self, _peer: &str, _text: &str) -> Result<(), EngineError> {
        Err(EngineError::Unsupported("instant messaging"))
    }

    fn invite(&mut self, address: &str) -> Result<(), EngineError> {
        let uri = normalize_sip_address(address);
        info!("Making call to: {}", uri);

        let client = self.client.clone();
        let calls = self.calls.clone();
        let updates = self.updates.clone();
        self.runtime.spawn(async move {
            match client.call(&uri).await {
                Ok(call) => {
                    let call_id = call.id.to_string();
                    calls.lock().unwrap_or_else(PoisonError::into_inner).insert(
                        call_id.clone(),
                        CallPeer {
                            remote_uri: uri.clone(),
                            incoming: false,
                        },
                    );
                    let _ = updates.send(Update::Engine(EngineEvent::CallStateChanged {
                        call_id,
                        peer: uri,
                        state: CallState::Calling,
                        incoming: false,
                    }));
                }
                Err(e) => error!("Make call to {} failed: {}", uri, e),
            }
        });
        Ok(())
    }

    fn accept_call(&mut self, call_id: &str) -> Result<(), EngineError> {
        let id = Self::parse_call_id(call_id)?;
        let client = self.client.clone();
        self.runtime.spawn(async move {
            if let Err(e) = client.answer(&id).await {
                error!("Answer call failed: {}", e);
            }
        });
        Ok(())
    }

    fn terminate_call(&mut self, call_id: &str) -> Result<(), EngineError> {
        let id = Self::parse_call_id(call_id)?;
        let client = self.client.clone();
        self.runtime.spawn(async move {
            if let Err(e) = client.hangup(&id).await {
                error!("Hangup failed: {}", e);
            }
        });
        Ok(())
    }

    fn settings_changed(&mut self, change: &SettingChange) {
        if change.requires_restart() {
            info!("{:?} takes effect after a restart", change);
        }
    }
}

impl Drop for RvoipEngine {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
