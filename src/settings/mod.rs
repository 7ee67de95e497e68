// Application settings: the persisted structure and the model the UI edits

pub mod model;

pub use model::{SettingChange, SettingsModel};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How DTMF tones are signalled during calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtmfProtocol {
    /// Out of band, SIP INFO requests
    SipInfo,
    /// In RTP, telephone-event payloads
    Rfc2833,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    pub fn is_valid(&self) -> bool {
        self.low > 0 && self.low <= self.high
    }
}

/// How the account reaches its peers, derived from the server field
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionMode {
    Server {
        server_uri: String,
        username: String,
        password: String,
    },
    PeerToPeer {
        target_uri: String,
    },
    Receiver, // Just listening for incoming calls
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub display_name: String,
    pub username: String,
    pub password: String,
    pub server_uri: String,
    pub local_port: u16,
    pub local_ip: Option<String>,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            display_name: "User".to_string(),
            username: String::new(),
            password: String::new(),
            server_uri: String::new(),
            local_port: 5060,
            local_ip: None,
        }
    }
}

impl AccountSettings {
    pub fn connection_mode(&self) -> ConnectionMode {
        if self.server_uri.is_empty() {
            ConnectionMode::Receiver
        } else if self.server_uri.contains('@') {
            ConnectionMode::PeerToPeer {
                target_uri: self.server_uri.clone(),
            }
        } else {
            ConnectionMode::Server {
                server_uri: self.server_uri.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub dtmf_protocol: DtmfProtocol,
    pub ipv6_enabled: bool,
    /// kbps, -1 for unlimited
    pub upload_bandwidth: i32,
    /// kbps, -1 for unlimited
    pub download_bandwidth: i32,
    pub adaptive_rate_control: bool,
    pub audio_ports: PortRange,
    pub video_ports: PortRange,
    pub ice_enabled: bool,
    pub turn_enabled: bool,
    pub stun_server: String,
    pub turn_user: String,
    pub turn_password: String,
    pub dscp_sip: u8,
    pub dscp_audio: u8,
    pub dscp_video: u8,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            dtmf_protocol: DtmfProtocol::Rfc2833,
            ipv6_enabled: false,
            upload_bandwidth: UNLIMITED_BANDWIDTH,
            download_bandwidth: UNLIMITED_BANDWIDTH,
            adaptive_rate_control: true,
            audio_ports: PortRange::new(7078, 7098),
            video_ports: PortRange::new(9078, 9098),
            ice_enabled: false,
            turn_enabled: false,
            stun_server: String::new(),
            turn_user: String::new(),
            turn_password: String::new(),
            dscp_sip: 0x1a,
            dscp_audio: 0x2e,
            dscp_video: 0x22,
        }
    }
}

pub const UNLIMITED_BANDWIDTH: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiscSettings {
    pub auto_answer: bool,
    pub file_transfer_url: String,
    pub saved_screenshots_folder: PathBuf,
    pub saved_videos_folder: PathBuf,
}

impl Default for MiscSettings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            auto_answer: false,
            file_transfer_url: String::new(),
            saved_screenshots_folder: dirs::picture_dir().unwrap_or_else(|| home.clone()),
            saved_videos_folder: dirs::video_dir().unwrap_or(home),
        }
    }
}

/// Files handed to the engine; empty or missing ones fall back to packaged paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub zrtp_secrets_file: Option<PathBuf>,
    pub user_certificates_dir: Option<PathBuf>,
    pub root_ca: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub account: AccountSettings,
    pub network: NetworkSettings,
    pub misc: MiscSettings,
    pub security: SecuritySettings,
}
