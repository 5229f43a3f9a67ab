//! Settings store: the admin settings record and the append-only user log,
//! both kept as JSON text under fixed keys of a [`Storage`] backend.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{AdminSettings, UserProfile};

pub const ADMIN_SETTINGS_KEY: &str = "lumina_admin_settings";
pub const USER_LOG_KEY: &str = "lumina_user_logs";

/// Key/value text storage; a missing key reads as `None`.
pub trait Storage: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temp file and rename over the target
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        debug!(target: "lumina_tutor::store", path = %target.display(), bytes = value.len(), "Wrote record");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    storage: Box<dyn Storage>,
}

impl SettingsStore {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileStorage::new(dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Read and decode a record; absent, unreadable and malformed records all
    /// come back as `None`.
    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.storage.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(target: "lumina_tutor::store", key, error = %e, "Could not read stored record");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target: "lumina_tutor::store", key, error = %e, "Ignoring malformed stored record");
                None
            }
        }
    }

    /// Stored admin settings, or defaults
    pub fn load(&self) -> AdminSettings {
        self.read_record(ADMIN_SETTINGS_KEY).unwrap_or_default()
    }

    /// Replace the stored admin settings
    pub fn save(&self, settings: &AdminSettings) -> Result<(), StoreError> {
        let text = serde_json::to_string(settings)?;
        self.storage.set(ADMIN_SETTINGS_KEY, &text)?;
        info!(target: "lumina_tutor::store", "Saved admin settings");
        Ok(())
    }

    /// Registered users in first-seen order
    pub fn users(&self) -> Vec<UserProfile> {
        self.read_record(USER_LOG_KEY).unwrap_or_default()
    }

    /// Append `profile` unless a profile with the same email is already
    /// logged. Returns whether it was added; existing entries are never
    /// updated.
    ///
    /// Read faults and a malformed log are returned as errors and the log is
    /// left untouched.
    pub fn append_user_if_absent(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        let mut users: Vec<UserProfile> = match self.storage.get(USER_LOG_KEY)? {
            Some(text) => serde_json::from_str(&text)?,
            None => Vec::new(),
        };
        if users.iter().any(|u| u.email == profile.email) {
            debug!(target: "lumina_tutor::store", "User already logged");
            return Ok(false);
        }
        users.push(profile.clone());
        self.storage.set(USER_LOG_KEY, &serde_json::to_string(&users)?)?;
        info!(target: "lumina_tutor::store", users = users.len(), "Logged new user");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_malformed_settings_load_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::file(dir.path());
        assert_eq!(store.load(), AdminSettings::default());

        std::fs::write(dir.path().join("lumina_admin_settings.json"), "{not json").unwrap();
        assert_eq!(store.load(), AdminSettings::default());
    }

    #[test]
    fn saved_settings_survive_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AdminSettings {
            global_announcement: "Exams start Monday".to_string(),
            ai_modifier: "Use South African examples".to_string(),
        };
        SettingsStore::file(dir.path()).save(&settings).unwrap();

        assert_eq!(SettingsStore::file(dir.path()).load(), settings);
        assert!(!dir.path().join("lumina_admin_settings.json.tmp").exists());
    }

    #[test]
    fn stored_settings_use_camel_case_keys() {
        let store = SettingsStore::in_memory();
        store
            .save(&AdminSettings { global_announcement: "hi".into(), ai_modifier: String::new() })
            .unwrap();
        let raw = store.storage.get(ADMIN_SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"globalAnnouncement":"hi","aiModifier":""}"#);
    }

    #[test]
    fn first_profile_for_an_email_wins() {
        let store = SettingsStore::in_memory();
        let first = UserProfile::new("Thandi", "thandi@example.com", "South Africa");
        let second = UserProfile::new("Thandi M", "thandi@example.com", "Canada");

        assert!(store.append_user_if_absent(&first).unwrap());
        assert!(!store.append_user_if_absent(&second).unwrap());

        let users = store.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0], first);
    }

    /// Storage whose reads always fail; writes land in `inner`
    #[derive(Debug, Default)]
    struct UnreadableStorage {
        inner: std::sync::Arc<MemoryStorage>,
    }

    impl Storage for UnreadableStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied, "locked").into())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }
    }

    #[test]
    fn read_failure_never_overwrites_the_user_log() {
        let storage = UnreadableStorage::default();
        let backing = storage.inner.clone();
        let logged = vec![
            UserProfile::new("A", "a@x.com", "Canada"),
            UserProfile::new("B", "b@x.com", "Other"),
        ];
        let original = serde_json::to_string(&logged).unwrap();
        backing.set(USER_LOG_KEY, &original).unwrap();
        let store = SettingsStore::new(Box::new(storage));

        let result = store.append_user_if_absent(&UserProfile::new("C", "c@x.com", "Other"));

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(backing.get(USER_LOG_KEY).unwrap().unwrap(), original);
    }

    #[test]
    fn malformed_user_log_is_not_replaced() {
        let store = SettingsStore::in_memory();
        store.storage.set(USER_LOG_KEY, "[{\"oops\"").unwrap();

        let result = store.append_user_if_absent(&UserProfile::new("C", "c@x.com", "Other"));

        assert!(matches!(result, Err(StoreError::Serialize(_))));
        assert_eq!(store.storage.get(USER_LOG_KEY).unwrap().unwrap(), "[{\"oops\"");
    }

    #[test]
    fn malformed_user_log_reads_as_empty() {
        let store = SettingsStore::in_memory();
        store.storage.set(USER_LOG_KEY, "[{\"oops\"").unwrap();
        assert!(store.users().is_empty());
    }
}
