//! User persistence.
//!
//! The booking flow reads users with their stored calendar credentials and
//! writes back token refreshes. [`JsonFileStore`] keeps everything in a
//! single JSON document.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use slotbook_calendar::{Credential, CredentialRefresh};

use crate::error::StoreError;

fn default_time_zone() -> String {
    "UTC".to_string()
}

/// A booking page owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// IANA time zone used for events created on this user's calendar
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub event_types: Vec<EventType>,
}

impl User {
    /// Name shown to visitors: display name, else username.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Duration in minutes
    pub length: u32,
    #[serde(default)]
    pub hidden: bool,
}

/// Persistence interface for the booking flow.
pub trait UserStore: Send + Sync {
    fn find_user(&self, username: &str) -> Result<User, StoreError>;

    /// Write a refreshed token back into the stored credential.
    fn apply_token_refresh(
        &self,
        username: &str,
        refresh: &CredentialRefresh,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    users: Vec<User>,
}

impl StoreDocument {
    /// Give credentials without an id a unique one so refreshes can find them again.
    fn assign_credential_ids(&mut self) -> bool {
        let mut next = self
            .users
            .iter()
            .flat_map(|u| u.credentials.iter().map(|c| c.id))
            .max()
            .unwrap_or(0);

        let mut changed = false;
        for credential in self
            .users
            .iter_mut()
            .flat_map(|u| u.credentials.iter_mut())
            .filter(|c| c.id <= 0)
        {
            next += 1;
            credential.id = next;
            changed = true;
        }
        changed
    }
}

/// File-backed [`UserStore`]. The whole document is rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    document: RwLock<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut document = if path.exists() {
            let json = fs::read_to_string(path)?;
            serde_json::from_str::<StoreDocument>(&json)?
        } else {
            tracing::warn!("User store {:?} does not exist, starting empty", path);
            StoreDocument::default()
        };

        let store_needs_ids = document.assign_credential_ids();
        let store = Self {
            path: path.to_path_buf(),
            document: RwLock::new(document),
        };

        if store_needs_ids {
            let document = store.document.read();
            store.persist(&document)?;
        }

        tracing::info!(
            "Opened user store at {:?} ({} users)",
            path,
            store.document.read().users.len()
        );
        Ok(store)
    }

    fn persist(&self, document: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl UserStore for JsonFileStore {
    fn find_user(&self, username: &str) -> Result<User, StoreError> {
        self.document
            .read()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    fn apply_token_refresh(
        &self,
        username: &str,
        refresh: &CredentialRefresh,
    ) -> Result<(), StoreError> {
        let mut document = self.document.write();

        let user = document
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;

        let credential = user
            .credentials
            .iter_mut()
            .find(|c| c.id == refresh.credential_id && c.kind == refresh.kind)
            .ok_or_else(|| StoreError::CredentialNotFound {
                username: username.to_string(),
                credential_id: refresh.credential_id,
            })?;

        credential.apply_refresh(&refresh.refresh);
        self.persist(&document)?;

        tracing::info!(
            username,
            credential_id = refresh.credential_id,
            kind = %refresh.kind,
            "Persisted refreshed calendar token"
        );
        Ok(())
    }
}
