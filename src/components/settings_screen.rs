use std::path::PathBuf;

use dioxus::prelude::*;
use log::{error, info};

use super::{button_style, AccountForm, CoreHandle, CARD_STYLE, INPUT_STYLE, LABEL_STYLE};
use crate::settings::{DtmfProtocol, PortRange, SettingChange, Settings};

#[derive(Debug, Clone, PartialEq)]
enum SaveStatus {
    Idle,
    Saved { restart_needed: bool },
    Invalid(String),
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a number, got `{}`", name, value))
}

#[derive(Debug, Clone, PartialEq)]
struct NetworkForm {
    dtmf_protocol: DtmfProtocol,
    ipv6_enabled: bool,
    upload_bandwidth: String,
    download_bandwidth: String,
    adaptive_rate_control: bool,
    audio_ports: (String, String),
    video_ports: (String, String),
    ice_enabled: bool,
    turn_enabled: bool,
    stun_server: String,
    turn_user: String,
    turn_password: String,
    auto_answer: bool,
    file_transfer_url: String,
    screenshots_folder: String,
    videos_folder: String,
}

impl NetworkForm {
    fn from_settings(settings: &Settings) -> Self {
        let network = &settings.network;
        Self {
            dtmf_protocol: network.dtmf_protocol,
            ipv6_enabled: network.ipv6_enabled,
            upload_bandwidth: network.upload_bandwidth.to_string(),
            download_bandwidth: network.download_bandwidth.to_string(),
            adaptive_rate_control: network.adaptive_rate_control,
            audio_ports: (network.audio_ports.low.to_string(), network.audio_ports.high.to_string()),
            video_ports: (network.video_ports.low.to_string(), network.video_ports.high.to_string()),
            ice_enabled: network.ice_enabled,
            turn_enabled: network.turn_enabled,
            stun_server: network.stun_server.clone(),
            turn_user: network.turn_user.clone(),
            turn_password: network.turn_password.clone(),
            auto_answer: settings.misc.auto_answer,
            file_transfer_url: settings.misc.file_transfer_url.clone(),
            screenshots_folder: settings.misc.saved_screenshots_folder.display().to_string(),
            videos_folder: settings.misc.saved_videos_folder.display().to_string(),
        }
    }

    fn changes(&self) -> Result<Vec<SettingChange>, String> {
        let port_range = |name: &str, (low, high): &(String, String)| -> Result<PortRange, String> {
            Ok(PortRange::new(parse_number(name, low)?, parse_number(name, high)?))
        };

        Ok(vec![
            SettingChange::DtmfProtocol(self.dtmf_protocol),
            SettingChange::Ipv6Enabled(self.ipv6_enabled),
            SettingChange::UploadBandwidth(parse_number("Upload bandwidth", &self.upload_bandwidth)?),
            SettingChange::DownloadBandwidth(parse_number("Download bandwidth", &self.download_bandwidth)?),
            SettingChange::AdaptiveRateControl(self.adaptive_rate_control),
            SettingChange::AudioPortRange(port_range("Audio port", &self.audio_ports)?),
            SettingChange::VideoPortRange(port_range("Video port", &self.video_ports)?),
            SettingChange::IceEnabled(self.ice_enabled),
            SettingChange::TurnEnabled(self.turn_enabled),
            SettingChange::StunServer(self.stun_server.trim().to_string()),
            SettingChange::TurnUser(self.turn_user.clone()),
            SettingChange::TurnPassword(self.turn_password.clone()),
            SettingChange::AutoAnswer(self.auto_answer),
            SettingChange::FileTransferUrl(self.file_transfer_url.trim().to_string()),
            SettingChange::SavedScreenshotsFolder(PathBuf::from(&self.screenshots_folder)),
            SettingChange::SavedVideosFolder(PathBuf::from(&self.videos_folder)),
        ])
    }
}

#[component]
pub fn SettingsScreen(core: CoreHandle, on_restart: EventHandler<()>) -> Element {
    let initial = use_hook(|| core.settings().settings());
    let account = use_signal(|| initial.account.clone());
    let mut form = use_signal(|| NetworkForm::from_settings(&initial));
    let mut status = use_signal(|| SaveStatus::Idle);

    let on_save = {
        let core = core.clone();
        move |_| {
            let mut changes = match form.read().changes() {
                Ok(changes) => changes,
                Err(message) => {
                    status.set(SaveStatus::Invalid(message));
                    return;
                }
            };
            changes.insert(0, SettingChange::Account(account.read().clone()));

            // Only effective changes are broadcast
            let mut applied = core.settings().subscribe();
            match core.settings().apply(changes) {
                Ok(()) => {
                    let mut restart_needed = false;
                    let mut refresh_needed = false;
                    while let Ok(change) = applied.try_recv() {
                        restart_needed |= change.requires_restart();
                        refresh_needed |= change.affects_registration();
                    }
                    info!("Settings saved");
                    if refresh_needed && !restart_needed {
                        core.refresh_registrations();
                    }
                    status.set(SaveStatus::Saved { restart_needed });
                }
                Err(e) => {
                    error!("Rejected settings: {}", e);
                    status.set(SaveStatus::Invalid(e.to_string()));
                }
            }
        }
    };

    let current = form.read().clone();

    rsx! {
        div {
            style: format!("{} display: flex; flex-direction: column; gap: 24px;", CARD_STYLE),

            h2 { style: "font-size: 1.5rem; font-weight: 500; color: #1E293B; margin: 0;", "Settings" }

            h3 { style: "font-size: 1rem; color: #1E293B; margin: 0;", "Account" }
            AccountForm { account: account, ipv6_enabled: current.ipv6_enabled }

            h3 { style: "font-size: 1rem; color: #1E293B; margin: 0;", "Network" }
            div {
                style: "display: grid; grid-template-columns: 1fr 1fr; gap: 16px;",

                Toggle { label: "IPv6", checked: current.ipv6_enabled, on_change: move |v| form.write().ipv6_enabled = v }
                Toggle { label: "Adaptive rate control", checked: current.adaptive_rate_control, on_change: move |v| form.write().adaptive_rate_control = v }
                Toggle { label: "ICE", checked: current.ice_enabled, on_change: move |v| form.write().ice_enabled = v }
                Toggle { label: "TURN", checked: current.turn_enabled, on_change: move |v| form.write().turn_enabled = v }
                Toggle { label: "Auto answer", checked: current.auto_answer, on_change: move |v| form.write().auto_answer = v }

                div {
                    label { style: LABEL_STYLE, "DTMF" }
                    select {
                        style: INPUT_STYLE,
                        onchange: move |evt| {
                            form.write().dtmf_protocol = if evt.value() == "sip-info" {
                                DtmfProtocol::SipInfo
                            } else {
                                DtmfProtocol::Rfc2833
                            };
                        },
                        option { value: "rfc2833", selected: current.dtmf_protocol == DtmfProtocol::Rfc2833, "RFC 2833" }
                        option { value: "sip-info", selected: current.dtmf_protocol == DtmfProtocol::SipInfo, "SIP INFO" }
                    }
                }

                TextField { label: "Upload bandwidth (kbps, -1 unlimited)", value: current.upload_bandwidth.clone(), on_change: move |v| form.write().upload_bandwidth = v }
                TextField { label: "Download bandwidth (kbps, -1 unlimited)", value: current.download_bandwidth.clone(), on_change: move |v| form.write().download_bandwidth = v }
                TextField { label: "Audio ports from", value: current.audio_ports.0.clone(), on_change: move |v| form.write().audio_ports.0 = v }
                TextField { label: "Audio ports to", value: current.audio_ports.1.clone(), on_change: move |v| form.write().audio_ports.1 = v }
                TextField { label: "Video ports from", value: current.video_ports.0.clone(), on_change: move |v| form.write().video_ports.0 = v }
                TextField { label: "Video ports to", value: current.video_ports.1.clone(), on_change: move |v| form.write().video_ports.1 = v }
                TextField { label: "STUN server", value: current.stun_server.clone(), on_change: move |v| form.write().stun_server = v }
                TextField { label: "TURN user", value: current.turn_user.clone(), on_change: move |v| form.write().turn_user = v }
                TextField { label: "TURN password", value: current.turn_password.clone(), password: true, on_change: move |v| form.write().turn_password = v }
            }

            h3 { style: "font-size: 1rem; color: #1E293B; margin: 0;", "Files" }
            div {
                style: "display: grid; grid-template-columns: 1fr 1fr; gap: 16px;",
                TextField { label: "File transfer server", value: current.file_transfer_url.clone(), on_change: move |v| form.write().file_transfer_url = v }
                TextField { label: "Screenshots folder", value: current.screenshots_folder.clone(), on_change: move |v| form.write().screenshots_folder = v }
                TextField { label: "Videos folder", value: current.videos_folder.clone(), on_change: move |v| form.write().videos_folder = v }
            }

            match status() {
                SaveStatus::Idle => rsx! {},
                SaveStatus::Invalid(message) => rsx! {
                    p { style: "font-size: 0.875rem; color: #DC2626; margin: 0;", "{message}" }
                },
                SaveStatus::Saved { restart_needed: false } => rsx! {
                    p { style: "font-size: 0.875rem; color: #059669; margin: 0;", "Settings saved" }
                },
                SaveStatus::Saved { restart_needed: true } => rsx! {
                    div {
                        style: "display: flex; align-items: center; gap: 12px;",
                        p { style: "font-size: 0.875rem; color: #D97706; margin: 0;", "Settings saved, restart to apply them" }
                        button {
                            style: button_style("white", "#374151"),
                            onclick: move |_| on_restart.call(()),
                            "Restart now"
                        }
                    }
                },
            }

            button {
                style: button_style("#1E293B", "white"),
                onclick: on_save,
                "Save"
            }
        }
    }
}

#[component]
fn Toggle(label: &'static str, checked: bool, on_change: EventHandler<bool>) -> Element {
    rsx! {
        label {
            style: "display: flex; align-items: center; gap: 8px; font-size: 0.875rem; color: #374151;",
            input {
                r#type: "checkbox",
                checked: checked,
                onchange: move |evt| on_change.call(evt.checked()),
            }
            "{label}"
        }
    }
}

#[component]
fn TextField(
    label: &'static str,
    value: String,
    #[props(default)] password: bool,
    on_change: EventHandler<String>,
) -> Element {
    rsx! {
        div {
            label { style: LABEL_STYLE, "{label}" }
            input {
                style: INPUT_STYLE,
                r#type: if password { "password" } else { "text" },
                value: "{value}",
                oninput: move |evt| on_change.call(evt.value()),
            }
        }
    }
}
