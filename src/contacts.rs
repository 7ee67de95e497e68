//! Friend list.
//!
//! Contacts pair a SIP address with the name shown for it. The list lives in
//! a TOML file under the data directory and is rewritten on every change.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::engine::normalize_sip_address;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub sip_address: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactEvent {
    Added(Contact),
    Updated(Contact),
    Removed { sip_address: String },
}

#[derive(Default, Serialize, Deserialize)]
struct FriendsFile {
    #[serde(default)]
    friends: Vec<Contact>,
}

/// User part of a SIP address, the name shown when no contact matches
pub fn username_of(sip_address: &str) -> &str {
    let address = sip_address
        .strip_prefix("sips:")
        .or_else(|| sip_address.strip_prefix("sip:"))
        .unwrap_or(sip_address);
    address.split('@').next().unwrap_or(address)
}

#[derive(Clone)]
pub struct ContactsModel {
    path: Option<PathBuf>,
    contacts: Arc<RwLock<Vec<Contact>>>,
    events: broadcast::Sender<ContactEvent>,
}

impl ContactsModel {
    /// Loads the friend list at `path`, empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let friends = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<FriendsFile>(&text)
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?
                .friends
        } else {
            Vec::new()
        };

        info!("Loaded {} contacts from {}", friends.len(), path.display());
        Ok(Self::with_contacts(Some(path), friends))
    }

    /// List kept in memory only
    pub fn in_memory() -> Self {
        Self::with_contacts(None, Vec::new())
    }

    fn with_contacts(path: Option<PathBuf>, contacts: Vec<Contact>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            path,
            contacts: Arc::new(RwLock::new(contacts)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContactEvent> {
        self.events.subscribe()
    }

    /// Contacts ordered by display name
    pub async fn contacts(&self) -> Vec<Contact> {
        let mut contacts = self.contacts.read().await.clone();
        contacts.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.sip_address.cmp(&b.sip_address))
        });
        contacts
    }

    pub async fn find(&self, sip_address: &str) -> Option<Contact> {
        self.contacts
            .read()
            .await
            .iter()
            .find(|contact| contact.sip_address == sip_address)
            .cloned()
    }

    pub async fn display_name(&self, sip_address: &str) -> String {
        match self.find(sip_address).await {
            Some(contact) => contact.display_name,
            None => username_of(sip_address).to_string(),
        }
    }

    /// Adds the contact, or renames the one with the same address
    pub async fn save_contact(&self, sip_address: &str, display_name: &str) -> Result<Contact, ConfigError> {
        let sip_address = normalize_sip_address(sip_address);
        if username_of(&sip_address).is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SIP address",
                value: sip_address,
            });
        }
        let display_name = match display_name.trim() {
            "" => username_of(&sip_address).to_string(),
            name => name.to_string(),
        };
        let contact = Contact {
            sip_address,
            display_name,
        };

        let event = {
            let mut contacts = self.contacts.write().await;
            let mut updated = contacts.clone();
            let event = match updated.iter_mut().find(|c| c.sip_address == contact.sip_address) {
                Some(existing) if *existing == contact => return Ok(contact),
                Some(existing) => {
                    *existing = contact.clone();
                    ContactEvent::Updated(contact.clone())
                }
                None => {
                    updated.push(contact.clone());
                    ContactEvent::Added(contact.clone())
                }
            };
            self.persist(&updated)?;
            *contacts = updated;
            event
        };

        debug!("Contact event: {:?}", event);
        self.publish(event);
        Ok(contact)
    }

    pub async fn remove_contact(&self, sip_address: &str) -> Result<Option<Contact>, ConfigError> {
        let removed = {
            let mut contacts = self.contacts.write().await;
            let Some(position) = contacts.iter().position(|c| c.sip_address == sip_address) else {
                warn!("No contact {} to remove", sip_address);
                return Ok(None);
            };
            let mut updated = contacts.clone();
            let removed = updated.remove(position);
            self.persist(&updated)?;
            *contacts = updated;
            removed
        };

        self.publish(ContactEvent::Removed {
            sip_address: removed.sip_address.clone(),
        });
        Ok(Some(removed))
    }

    fn persist(&self, contacts: &[Contact]) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = toml::to_string_pretty(&FriendsFile {
            friends: contacts.to_vec(),
        })?;
        write_file(path, &text)
    }

    fn publish(&self, event: ContactEvent) {
        let _ = self.events.send(event);
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn contacts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("friends.toml");
        let model = ContactsModel::open(&path).unwrap();
        let mut events = model.subscribe();

        model.save_contact("bob@example.org", "Bob").await.unwrap();
        model.save_contact("sip:alice@example.org", "").await.unwrap();
        model.save_contact("sip:bob@example.org", "Robert").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            ContactEvent::Added(Contact {
                sip_address: "sip:bob@example.org".into(),
                display_name: "Bob".into(),
            })
        );
        events.recv().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), ContactEvent::Updated(_)));

        let reopened = ContactsModel::open(&path).unwrap();
        let names: Vec<String> = reopened
            .contacts()
            .await
            .into_iter()
            .map(|contact| contact.display_name)
            .collect();
        assert_eq!(names, vec!["alice".to_string(), "Robert".to_string()]);
    }

    #[tokio::test]
    async fn unknown_address_shows_username() {
        let model = ContactsModel::in_memory();
        assert_eq!(model.display_name("sip:carol@example.org").await, "carol");

        model.save_contact("sip:carol@example.org", "Carol").await.unwrap();
        assert_eq!(model.display_name("sip:carol@example.org").await, "Carol");

        let removed = model.remove_contact("sip:carol@example.org").await.unwrap();
        assert!(removed.is_some());
        assert!(model.remove_contact("sip:carol@example.org").await.unwrap().is_none());
        assert_eq!(model.display_name("sip:carol@example.org").await, "carol");
    }

    #[tokio::test]
    async fn empty_address_is_rejected() {
        let model = ContactsModel::in_memory();
        let err = model.save_contact("  ", "Nobody").await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "SIP address", .. }));
        assert!(model.contacts().await.is_empty());
    }

    #[test]
    fn malformed_list_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("friends.toml");
        fs::write(&path, "friends = 3\n").unwrap();
        assert!(matches!(
            ContactsModel::open(&path).err().unwrap(),
            ConfigError::Parse { .. }
        ));
    }
}
