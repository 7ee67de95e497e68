//! TOML configuration store.
//!
//! The store reads an optional read-only factory file first and overlays the
//! user file on top of it, table by table. Only the user file is ever written,
//! and only with the values that differ from the defaults and factory layer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::{debug, info};

use crate::error::ConfigError;
use crate::settings::Settings;

pub struct ConfigStore {
    path: PathBuf,
    /// Defaults overlaid with the factory file
    base: toml::Table,
    settings: RwLock<Settings>,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>, factory_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut table = toml::Table::new();

        if let Some(factory) = factory_path {
            if let Some(factory_table) = read_table(factory)? {
                debug!("Loaded factory configuration {}", factory.display());
                table = factory_table;
            }
        }
        let base = to_table(&parse_settings(&table, factory_path.unwrap_or(&path))?)?;

        if let Some(user_table) = read_table(&path)? {
            merge_tables(&mut table, user_table);
        }
        let settings = parse_settings(&table, &path)?;

        info!("Configuration store opened at {}", path.display());
        Ok(Self {
            path,
            base,
            settings: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Settings {
        self.read(Settings::clone)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        f(&settings)
    }

    /// Applies `f` to a copy, persists it, then makes it current
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<(), ConfigError> {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let mut updated = settings.clone();
        f(&mut updated);
        self.write_file(&updated)?;
        *settings = updated;
        Ok(())
    }

    fn write_file(&self, settings: &Settings) -> Result<(), ConfigError> {
        let overrides = difference(&self.base, to_table(settings)?);
        let text = toml::to_string_pretty(&overrides)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("Configuration written to {}", self.path.display());
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(table))
}

fn parse_settings(table: &toml::Table, path: &Path) -> Result<Settings, ConfigError> {
    toml::Value::Table(table.clone())
        .try_into()
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn to_table(settings: &Settings) -> Result<toml::Table, ConfigError> {
    match toml::Value::try_from(settings)? {
        toml::Value::Table(table) => Ok(table),
        _ => Ok(toml::Table::new()),
    }
}

/// Entries of `table` that are absent from `base` or hold another value
fn difference(base: &toml::Table, table: toml::Table) -> toml::Table {
    let mut overrides = toml::Table::new();
    for (key, value) in table {
        match (base.get(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(table)) => {
                let nested = difference(base_table, table);
                if !nested.is_empty() {
                    overrides.insert(key, toml::Value::Table(nested));
                }
            }
            (Some(base_value), value) if *base_value == value => {}
            (_, value) => {
                overrides.insert(key, value);
            }
        }
    }
    overrides
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DtmfProtocol;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("sip_desktop.toml"), None).unwrap();
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn user_file_overrides_factory_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = dir.path().join("factory.toml");
        let user = dir.path().join("user.toml");
        fs::write(
            &factory,
            "[network]\nipv6_enabled = true\ndscp_sip = 10\n\n[misc]\nauto_answer = true\n",
        )
        .unwrap();
        fs::write(&user, "[network]\ndscp_sip = 12\n").unwrap();

        let store = ConfigStore::open(&user, Some(&factory)).unwrap();
        let settings = store.get();
        assert!(settings.network.ipv6_enabled);
        assert_eq!(settings.network.dscp_sip, 12);
        assert!(settings.misc.auto_answer);
        assert_eq!(settings.network.dtmf_protocol, DtmfProtocol::Rfc2833);
    }

    #[test]
    fn update_persists_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sip_desktop.toml");
        let store = ConfigStore::open(&path, None).unwrap();

        store
            .update(|settings| settings.network.turn_user = "relay".to_string())
            .unwrap();

        let reopened = ConfigStore::open(&path, None).unwrap();
        assert_eq!(reopened.get().network.turn_user, "relay");
    }

    #[test]
    fn factory_values_stay_out_of_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = dir.path().join("factory.toml");
        let user = dir.path().join("user.toml");
        fs::write(&factory, "[network]\nstun_server = \"stun.factory.org\"\n").unwrap();

        let store = ConfigStore::open(&user, Some(&factory)).unwrap();
        store
            .update(|settings| settings.misc.auto_answer = true)
            .unwrap();

        let written: toml::Table = toml::from_str(&fs::read_to_string(&user).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written["misc"].as_table().unwrap().len(), 1);

        // A later factory update still reaches the user
        fs::write(&factory, "[network]\nstun_server = \"stun2.factory.org\"\n").unwrap();
        let reopened = ConfigStore::open(&user, Some(&factory)).unwrap();
        assert_eq!(reopened.get().network.stun_server, "stun2.factory.org");
        assert!(reopened.get().misc.auto_answer);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[network\n").unwrap();

        let err = ConfigStore::open(&path, None).err().unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
