//! Where the application keeps its files.
//!
//! User writable files live under the platform config and data directories,
//! packaged resources (factory configuration, root CA, assets) under the
//! package data directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::engine::EngineConfig;
use crate::error::PathsError;
use crate::settings::SecuritySettings;

// Must be unique. Used by the instance socket and directory names.
pub const APPLICATION_NAME: &str = "sip_desktop";

const CONFIG_FILE: &str = "sip_desktop.toml";
const FACTORY_CONFIG_FILE: &str = "factory.toml";
const FRIENDS_LIST_FILE: &str = "friends.toml";
const CALL_HISTORY_FILE: &str = "call-history.db";
const MESSAGE_HISTORY_FILE: &str = "message-history.db";
const ZRTP_SECRETS_FILE: &str = "zidcache";
const USER_CERTIFICATES_DIR: &str = "usr-crt";
const ROOT_CA_FILE: &str = "rootca.pem";
const INSTANCE_SOCKET: &str = "sip_desktop.sock";

#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    config_dir: PathBuf,
    data_dir: PathBuf,
    package_data_dir: PathBuf,
}

impl Paths {
    pub fn new(
        config_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        package_data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
            package_data_dir: package_data_dir.into(),
        }
    }

    /// Platform directories, packaged data next to the executable
    pub fn from_platform() -> Result<Self, PathsError> {
        let config_dir = dirs::config_dir()
            .ok_or(PathsError::MissingDirectory("config"))?
            .join(APPLICATION_NAME);
        let data_dir = dirs::data_dir()
            .ok_or(PathsError::MissingDirectory("data"))?
            .join(APPLICATION_NAME);
        let package_data_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("share").join(APPLICATION_NAME)))
            .filter(|dir| dir.exists())
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"));

        Ok(Self::new(config_dir, data_dir, package_data_dir))
    }

    pub fn ensure_dirs(&self) -> Result<(), PathsError> {
        for dir in [&self.config_dir, &self.data_dir, &self.user_certificates_dir_path()] {
            fs::create_dir_all(dir).map_err(|source| PathsError::Create {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// User configuration file, or `custom` when given on the command line
    pub fn config_file_path(&self, custom: Option<&Path>) -> PathBuf {
        custom
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.join(CONFIG_FILE))
    }

    pub fn factory_config_file_path(&self) -> PathBuf {
        self.package_data_dir.join(FACTORY_CONFIG_FILE)
    }

    pub fn friends_list_file_path(&self) -> PathBuf {
        self.data_dir.join(FRIENDS_LIST_FILE)
    }

    pub fn call_history_file_path(&self) -> PathBuf {
        self.data_dir.join(CALL_HISTORY_FILE)
    }

    pub fn message_history_file_path(&self) -> PathBuf {
        self.data_dir.join(MESSAGE_HISTORY_FILE)
    }

    pub fn zrtp_secrets_file_path(&self) -> PathBuf {
        self.data_dir.join(ZRTP_SECRETS_FILE)
    }

    pub fn user_certificates_dir_path(&self) -> PathBuf {
        self.data_dir.join(USER_CERTIFICATES_DIR)
    }

    pub fn root_ca_file_path(&self) -> PathBuf {
        self.package_data_dir.join(ROOT_CA_FILE)
    }

    pub fn assets_dir_path(&self) -> PathBuf {
        self.package_data_dir.clone()
    }

    pub fn instance_socket_path(&self) -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(|| self.data_dir.clone())
            .join(INSTANCE_SOCKET)
    }

    /// Copies files of the legacy `~/.sip_desktop` layout that have no
    /// counterpart yet. Existing files are never overwritten.
    pub fn migrate(&self, legacy_dir: &Path) -> Result<Vec<PathBuf>, PathsError> {
        let moves = [
            (legacy_dir.join("config.toml"), self.config_file_path(None)),
            (legacy_dir.join(FRIENDS_LIST_FILE), self.friends_list_file_path()),
            (legacy_dir.join(CALL_HISTORY_FILE), self.call_history_file_path()),
            (legacy_dir.join(MESSAGE_HISTORY_FILE), self.message_history_file_path()),
            (legacy_dir.join(ZRTP_SECRETS_FILE), self.zrtp_secrets_file_path()),
        ];

        let mut migrated = Vec::new();
        for (from, to) in moves {
            if !from.is_file() || to.exists() {
                continue;
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|source| PathsError::Create {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::copy(&from, &to).map_err(|source| PathsError::Migrate {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
            info!("Migrated `{}` to `{}`", from.display(), to.display());
            migrated.push(to);
        }
        Ok(migrated)
    }

    pub fn legacy_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(format!(".{}", APPLICATION_NAME)))
    }

    /// Engine configuration with unusable security paths replaced by defaults
    pub fn engine_config(
        &self,
        custom_config: Option<&Path>,
        security: &SecuritySettings,
        user_agent: impl Into<String>,
    ) -> EngineConfig {
        let factory = self.factory_config_file_path();
        EngineConfig {
            config_path: self.config_file_path(custom_config),
            factory_config_path: factory.exists().then_some(factory),
            zrtp_secrets_file: resolve_or_default(
                security.zrtp_secrets_file.as_deref(),
                self.zrtp_secrets_file_path(),
            ),
            user_certificates_dir: resolve_or_default(
                security.user_certificates_dir.as_deref(),
                self.user_certificates_dir_path(),
            ),
            root_ca: resolve_or_default(security.root_ca.as_deref(), self.root_ca_file_path()),
            friends_database: self.friends_list_file_path(),
            call_history_database: self.call_history_file_path(),
            message_history_database: self.message_history_file_path(),
            user_agent: user_agent.into(),
        }
    }
}

/// `configured` when it names an existing path, `default` otherwise
pub fn resolve_or_default(configured: Option<&Path>, default: PathBuf) -> PathBuf {
    match configured {
        Some(path) if !path.as_os_str().is_empty() && path.exists() => path.to_path_buf(),
        Some(path) => {
            if !path.as_os_str().is_empty() {
                warn!("`{}` does not exist, using `{}`", path.display(), default.display());
            }
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(root: &Path) -> Paths {
        Paths::new(root.join("config"), root.join("data"), root.join("share"))
    }

    #[test]
    fn missing_security_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths(dir.path());
        let existing_ca = dir.path().join("custom-ca.pem");
        fs::write(&existing_ca, "---").unwrap();

        let security = SecuritySettings {
            zrtp_secrets_file: Some(dir.path().join("missing")),
            user_certificates_dir: Some(PathBuf::new()),
            root_ca: Some(existing_ca.clone()),
        };
        let config = paths.engine_config(None, &security, "sip_desktop/0.2.0");

        assert_eq!(config.zrtp_secrets_file, paths.zrtp_secrets_file_path());
        assert_eq!(config.user_certificates_dir, paths.user_certificates_dir_path());
        assert_eq!(config.root_ca, existing_ca);
        assert_eq!(config.factory_config_path, None);
        assert_eq!(config.config_path, dir.path().join("config").join(CONFIG_FILE));
    }

    #[test]
    fn custom_config_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("other.toml");
        assert_eq!(paths(dir.path()).config_file_path(Some(&custom)), custom);
    }

    #[test]
    fn migrate_copies_only_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("legacy");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("config.toml"), "[misc]\nauto_answer = true\n").unwrap();
        fs::write(legacy.join(CALL_HISTORY_FILE), "old").unwrap();

        let paths = paths(dir.path());
        paths.ensure_dirs().unwrap();
        fs::write(paths.call_history_file_path(), "new").unwrap();

        let migrated = paths.migrate(&legacy).unwrap();
        assert_eq!(migrated, vec![paths.config_file_path(None)]);
        assert_eq!(fs::read_to_string(paths.call_history_file_path()).unwrap(), "new");

        // Second run has nothing left to do.
        assert!(paths.migrate(&legacy).unwrap().is_empty());
    }
}
