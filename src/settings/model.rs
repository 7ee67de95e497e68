use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::broadcast;

use super::{AccountSettings, DtmfProtocol, PortRange, Settings, UNLIMITED_BANDWIDTH};
use crate::config::ConfigStore;
use crate::error::ConfigError;

const MAX_DSCP: u8 = 63;

/// One edit of the settings, also the payload of change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    Account(AccountSettings),
    DtmfProtocol(DtmfProtocol),
    Ipv6Enabled(bool),
    UploadBandwidth(i32),
    DownloadBandwidth(i32),
    AdaptiveRateControl(bool),
    AudioPortRange(PortRange),
    VideoPortRange(PortRange),
    IceEnabled(bool),
    TurnEnabled(bool),
    StunServer(String),
    TurnUser(String),
    TurnPassword(String),
    DscpSip(u8),
    DscpAudio(u8),
    DscpVideo(u8),
    AutoAnswer(bool),
    FileTransferUrl(String),
    SavedScreenshotsFolder(PathBuf),
    SavedVideosFolder(PathBuf),
}

impl SettingChange {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SettingChange::Account(account) => {
                if account.local_port == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: "local port",
                        value: account.local_port.to_string(),
                    });
                }
                Ok(())
            }
            SettingChange::UploadBandwidth(value) => check_bandwidth("upload", *value),
            SettingChange::DownloadBandwidth(value) => check_bandwidth("download", *value),
            SettingChange::AudioPortRange(range) => check_port_range("audio", range),
            SettingChange::VideoPortRange(range) => check_port_range("video", range),
            SettingChange::DscpSip(value) => check_dscp("SIP", *value),
            SettingChange::DscpAudio(value) => check_dscp("audio", *value),
            SettingChange::DscpVideo(value) => check_dscp("video", *value),
            SettingChange::FileTransferUrl(url) => {
                if url.is_empty() || url.starts_with("https://") || url.starts_with("http://") {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidValue {
                        name: "file transfer URL",
                        value: url.clone(),
                    })
                }
            }
            SettingChange::SavedScreenshotsFolder(path) if path.as_os_str().is_empty() => {
                Err(ConfigError::Empty("screenshots folder"))
            }
            SettingChange::SavedVideosFolder(path) if path.as_os_str().is_empty() => {
                Err(ConfigError::Empty("videos folder"))
            }
            _ => Ok(()),
        }
    }

    fn apply_to(&self, settings: &mut Settings) {
        let network = &mut settings.network;
        let misc = &mut settings.misc;
        match self.clone() {
            SettingChange::Account(account) => settings.account = account,
            SettingChange::DtmfProtocol(protocol) => network.dtmf_protocol = protocol,
            SettingChange::Ipv6Enabled(enabled) => network.ipv6_enabled = enabled,
            SettingChange::UploadBandwidth(value) => network.upload_bandwidth = value,
            SettingChange::DownloadBandwidth(value) => network.download_bandwidth = value,
            SettingChange::AdaptiveRateControl(enabled) => network.adaptive_rate_control = enabled,
            SettingChange::AudioPortRange(range) => network.audio_ports = range,
            SettingChange::VideoPortRange(range) => network.video_ports = range,
            SettingChange::IceEnabled(enabled) => network.ice_enabled = enabled,
            SettingChange::TurnEnabled(enabled) => network.turn_enabled = enabled,
            SettingChange::StunServer(server) => network.stun_server = server,
            SettingChange::TurnUser(user) => network.turn_user = user,
            SettingChange::TurnPassword(password) => network.turn_password = password,
            SettingChange::DscpSip(value) => network.dscp_sip = value,
            SettingChange::DscpAudio(value) => network.dscp_audio = value,
            SettingChange::DscpVideo(value) => network.dscp_video = value,
            SettingChange::AutoAnswer(enabled) => misc.auto_answer = enabled,
            SettingChange::FileTransferUrl(url) => misc.file_transfer_url = url,
            SettingChange::SavedScreenshotsFolder(path) => misc.saved_screenshots_folder = path,
            SettingChange::SavedVideosFolder(path) => misc.saved_videos_folder = path,
        }
    }

    /// Whether the engine only picks the change up after a restart
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            SettingChange::Account(_)
                | SettingChange::Ipv6Enabled(_)
                | SettingChange::AudioPortRange(_)
                | SettingChange::VideoPortRange(_)
        )
    }

    /// Whether registrations must be refreshed for the change to reach the proxy
    pub fn affects_registration(&self) -> bool {
        matches!(
            self,
            SettingChange::IceEnabled(_)
                | SettingChange::TurnEnabled(_)
                | SettingChange::StunServer(_)
                | SettingChange::TurnUser(_)
                | SettingChange::TurnPassword(_)
                | SettingChange::DscpSip(_)
        )
    }
}

fn check_bandwidth(name: &'static str, value: i32) -> Result<(), ConfigError> {
    if value < UNLIMITED_BANDWIDTH {
        return Err(ConfigError::InvalidBandwidth { name, value });
    }
    Ok(())
}

fn check_port_range(name: &'static str, range: &PortRange) -> Result<(), ConfigError> {
    if !range.is_valid() {
        return Err(ConfigError::InvalidPortRange {
            name,
            low: range.low,
            high: range.high,
        });
    }
    Ok(())
}

fn check_dscp(name: &'static str, value: u8) -> Result<(), ConfigError> {
    if value > MAX_DSCP {
        return Err(ConfigError::InvalidDscp { name, value });
    }
    Ok(())
}

/// Settings backed by the configuration store.
///
/// Reads always go to the store. [`SettingsModel::apply`] validates a whole
/// batch before touching anything, persists it, then notifies subscribers once
/// per change.
#[derive(Clone)]
pub struct SettingsModel {
    store: Arc<ConfigStore>,
    changes: broadcast::Sender<SettingChange>,
}

impl SettingsModel {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { store, changes }
    }

    pub fn settings(&self) -> Settings {
        self.store.get()
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }

    pub fn apply(&self, changes: Vec<SettingChange>) -> Result<(), ConfigError> {
        for change in &changes {
            change.validate()?;
        }

        // The last edit of a setting wins, announced at its position
        let mut latest: Vec<SettingChange> = Vec::with_capacity(changes.len());
        for change in changes {
            latest.retain(|kept| mem::discriminant(kept) != mem::discriminant(&change));
            latest.push(change);
        }

        let current = self.store.get();
        let effective: Vec<SettingChange> = latest
            .into_iter()
            .filter(|change| {
                let mut updated = current.clone();
                change.apply_to(&mut updated);
                updated != current
            })
            .collect();
        if effective.is_empty() {
            return Ok(());
        }

        self.store.update(|settings| {
            for change in &effective {
                change.apply_to(settings);
            }
        })?;

        for change in effective {
            info!("Setting changed: {}", describe(&change));
            if self.changes.send(change).is_err() {
                warn!("No subscriber for settings changes");
            }
        }
        Ok(())
    }
}

// Never logs secrets
fn describe(change: &SettingChange) -> String {
    match change {
        SettingChange::TurnPassword(_) => "TurnPassword(***)".to_string(),
        SettingChange::Account(account) => format!(
            "Account({} on {:?})",
            account.username, account.server_uri
        ),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model() -> (tempfile::TempDir, SettingsModel) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("sip_desktop.toml"), None).unwrap();
        (dir, SettingsModel::new(Arc::new(store)))
    }

    #[test]
    fn apply_persists_and_notifies() {
        let (dir, model) = model();
        let mut changes = model.subscribe();

        model
            .apply(vec![
                SettingChange::DtmfProtocol(DtmfProtocol::SipInfo),
                SettingChange::AudioPortRange(PortRange::new(10000, 10100)),
            ])
            .unwrap();

        assert_eq!(model.settings().network.dtmf_protocol, DtmfProtocol::SipInfo);
        assert_eq!(
            changes.try_recv().unwrap(),
            SettingChange::DtmfProtocol(DtmfProtocol::SipInfo)
        );
        assert_eq!(
            changes.try_recv().unwrap(),
            SettingChange::AudioPortRange(PortRange::new(10000, 10100))
        );

        let reopened = ConfigStore::open(dir.path().join("sip_desktop.toml"), None).unwrap();
        assert_eq!(reopened.get().network.audio_ports, PortRange::new(10000, 10100));
    }

    #[test]
    fn invalid_batch_changes_nothing() {
        let (_dir, model) = model();
        let mut changes = model.subscribe();

        let err = model
            .apply(vec![
                SettingChange::Ipv6Enabled(true),
                SettingChange::DscpVideo(64),
            ])
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidDscp { value: 64, .. }));
        assert!(!model.settings().network.ipv6_enabled);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn validation_rules() {
        assert!(SettingChange::UploadBandwidth(-1).validate().is_ok());
        assert!(SettingChange::UploadBandwidth(-2).validate().is_err());
        assert!(SettingChange::VideoPortRange(PortRange::new(9100, 9000)).validate().is_err());
        assert!(SettingChange::DscpSip(63).validate().is_ok());
        assert!(SettingChange::FileTransferUrl("ftp://files".into()).validate().is_err());
        assert!(SettingChange::SavedVideosFolder(PathBuf::new()).validate().is_err());
    }

    #[test]
    fn unchanged_values_are_not_announced() {
        let (_dir, model) = model();
        let mut changes = model.subscribe();
        let current = model.settings().network.ice_enabled;

        model.apply(vec![SettingChange::IceEnabled(current)]).unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn nat_changes_refresh_registrations() {
        assert!(SettingChange::StunServer("stun.example.org".into()).affects_registration());
        assert!(SettingChange::TurnEnabled(true).affects_registration());
        assert!(!SettingChange::AutoAnswer(true).affects_registration());
        // Applied on restart instead
        assert!(!SettingChange::Ipv6Enabled(true).affects_registration());
    }

    #[test]
    fn last_edit_of_a_setting_wins() {
        let (dir, model) = model();
        let mut changes = model.subscribe();

        model
            .apply(vec![
                SettingChange::IceEnabled(true),
                SettingChange::AutoAnswer(true),
                SettingChange::IceEnabled(false),
                SettingChange::StunServer("stun.example.org".into()),
                SettingChange::StunServer("stun2.example.org".into()),
            ])
            .unwrap();

        assert!(!model.settings().network.ice_enabled);
        assert_eq!(model.settings().network.stun_server, "stun2.example.org");
        assert_eq!(changes.try_recv().unwrap(), SettingChange::AutoAnswer(true));
        assert_eq!(
            changes.try_recv().unwrap(),
            SettingChange::StunServer("stun2.example.org".into())
        );
        assert!(changes.try_recv().is_err());

        let reopened = ConfigStore::open(dir.path().join("sip_desktop.toml"), None).unwrap();
        assert!(!reopened.get().network.ice_enabled);
        assert_eq!(reopened.get().network.stun_server, "stun2.example.org");
    }
}
