mod errors;
pub mod settings;
pub mod storage;

pub use crate::errors::Error;

use crate::settings::{Setting, SettingInfo};
use crate::storage::MemoryStorageAdapter;
use lazy_static::lazy_static;
use log::warn;
use serde_derive::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::mem;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stylesync_shared::types::Result;
use wildmatch::WildMatch;

/// Settings are stored in a json file, but this is included in the binary so defaults are
/// always available.
const SETTINGS_JSON: &str = include_str!("./settings.json");

/// `StorageAdapter` is the interface for storing and retrieving settings. It must be `Send` so
/// the store can live in a global.
pub trait StorageAdapter: Send + Sync {
    /// Retrieves a setting from the storage
    fn get(&self, key: &str) -> Option<Setting>;

    /// Stores a given setting to the storage. Implementations use interior mutability.
    fn set(&self, key: &str, value: Setting);

    /// Retrieves all the settings in the storage in one go. Used for preloading.
    fn all(&self) -> Result<HashMap<String, Setting>>;
}

lazy_static! {
    // Initial config store will have a memory storage adapter. It will save within the session,
    // but not persist this on disk.
    static ref CONFIG_STORE: RwLock<ConfigStore> = RwLock::new(ConfigStore::default());
}

/// Returns a read guard on the global config store.
/// Any callers can just do `config_store().get("collapse.padding")`
pub fn config_store() -> RwLockReadGuard<'static, ConfigStore> {
    CONFIG_STORE.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn config_store_write() -> RwLockWriteGuard<'static, ConfigStore> {
    CONFIG_STORE.write().unwrap_or_else(PoisonError::into_inner)
}

/// This macro simplifies reads from the config store:
///
/// `let threshold = config!(uint "collapse.scope_threshold");`
///
/// When the key cannot be found, a default value for the type is returned. Test for existence
/// with `config_store().has("key")`.
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! config {
    (string $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_string(),
            None => String::new(),
        }
    };
    (bool $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_bool(),
            None => false,
        }
    };
    (uint $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_uint(),
            None => 0,
        }
    };
    (map $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_map(),
            None => Vec::new(),
        }
    };
}

/// `JsonEntry` is used for parsing the settings.json file
#[derive(Debug, Deserialize)]
struct JsonEntry {
    key: String,
    #[serde(rename = "type")]
    _entry_type: String,
    default: String,
    description: String,
}

/// Configuration storage is the place where the engine finds all configurable options
pub struct ConfigStore {
    /// All current settings. The mutex allows `set()` on a shared reference.
    settings: Mutex<HashMap<String, Setting>>,
    /// Descriptions, default values and type information of every known setting
    settings_info: HashMap<String, SettingInfo>,
    /// Keys of all settings in declaration order
    setting_keys: Vec<String>,
    /// The storage adapter used for persisting and loading keys
    storage: Box<dyn StorageAdapter>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        let mut store = Self {
            settings: Mutex::new(HashMap::new()),
            settings_info: HashMap::new(),
            setting_keys: Vec::new(),
            storage: Box::new(MemoryStorageAdapter::new()),
        };

        // Populate the store with the default settings. They may be overwritten by the storage
        // as soon as one is added with set_storage()
        if let Err(err) = store.populate_default_settings() {
            warn!("config: could not load default settings: {err}");
        }
        store
    }
}

impl ConfigStore {
    fn settings(&self) -> std::sync::MutexGuard<'_, HashMap<String, Setting>> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a new storage engine and loads every setting found in it. Current settings with
    /// the same key are overwritten.
    pub fn set_storage(&mut self, storage: Box<dyn StorageAdapter>) {
        self.storage = storage;

        match self.storage.all() {
            Ok(all_settings) => {
                let mut settings = self.settings();
                for (key, value) in all_settings {
                    settings.insert(key, value);
                }
            }
            Err(err) => warn!("config: could not read settings from storage: {err}"),
        }
    }

    /// Returns true when the store knows about the given key
    pub fn has(&self, key: &str) -> bool {
        self.settings().contains_key(key)
    }

    /// Returns a list of keys that matches the given search string (can use ? and * as
    /// wildcards).
    pub fn find(&self, search: &str) -> Vec<String> {
        let search = WildMatch::new(search);

        self.setting_keys
            .iter()
            .filter(|key| search.matches(key))
            .cloned()
            .collect()
    }

    /// Retrieves information about the given key, or returns None when key is unknown
    pub fn get_info(&self, key: &str) -> Option<SettingInfo> {
        self.settings_info.get(key).cloned()
    }

    /// Returns the setting with the given key. If the setting is not loaded yet, it is read
    /// from the storage, then from the defaults. Unknown keys return None.
    pub fn get(&self, key: &str) -> Option<Setting> {
        if let Some(setting) = self.settings().get(key) {
            return Some(setting.clone());
        }

        if let Some(setting) = self.storage.get(key) {
            self.settings().insert(key.to_string(), setting.clone());
            return Some(setting);
        }

        if let Some(info) = self.settings_info.get(key) {
            return Some(info.default.clone());
        }

        warn!("config: Setting {key} is not known");
        None
    }

    /// Sets the given setting to the given value and persists it to the storage. The setting
    /// MUST have a settings-info entry and be of the same type as its default.
    pub fn set(&self, key: &str, value: Setting) {
        let Some(info) = self.settings_info.get(key) else {
            warn!("config: Setting {key} is not known");
            return;
        };

        if mem::discriminant(&info.default) != mem::discriminant(&value) {
            warn!("config: Setting {key} is of different type than setting expects");
            return;
        }

        self.settings().insert(key.to_owned(), value.clone());
        self.storage.set(key, value);
    }

    /// Populates the settings from the embedded settings.json file
    fn populate_default_settings(&mut self) -> Result<()> {
        let json_data: Value = serde_json::from_str(SETTINGS_JSON).map_err(Error::from)?;

        if let Value::Object(data) = json_data {
            for (section_prefix, section_entries) in data {
                let section_entries: Vec<JsonEntry> =
                    serde_json::from_value(section_entries).map_err(Error::from)?;

                for entry in section_entries {
                    let key = format!("{}.{}", section_prefix, entry.key);

                    let info = SettingInfo {
                        key: key.clone(),
                        description: entry.description,
                        default: Setting::from_str(&entry.default)?,
                    };

                    self.setting_keys.push(key.clone());
                    self.settings().insert(key.clone(), info.default.clone());
                    self.settings_info.insert(key, info);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_loaded() {
        let store = ConfigStore::default();
        assert_eq!(
            store.get("canvas.id_attribute"),
            Some(Setting::String("data-id".into()))
        );
        assert_eq!(
            store.get("collapse.scope_threshold"),
            Some(Setting::UInt(50))
        );
        assert!(store
            .get("collapse.skipped_tags")
            .map(|s| s.to_map().contains(&"img".to_string()))
            .unwrap_or(false));
        assert_eq!(store.find("canvas.*").len(), 3);
    }

    #[test]
    fn info_carries_default_and_description() {
        let store = ConfigStore::default();
        store.set("collapse.scope_threshold", Setting::UInt(10));

        let info = store.get_info("collapse.scope_threshold");
        assert!(info.is_some());
        if let Some(info) = info {
            assert_eq!(info.key, "collapse.scope_threshold");
            assert_eq!(info.default, Setting::UInt(50));
            assert!(!info.description.is_empty());
        }
        assert_eq!(store.get("collapse.scope_threshold"), Some(Setting::UInt(10)));
        assert!(store.get_info("collapse.nope").is_none());
    }

    #[test]
    fn set_and_get() {
        let store = ConfigStore::default();
        store.set("collapse.padding", Setting::String("10px".into()));
        assert_eq!(
            store.get("collapse.padding"),
            Some(Setting::String("10px".into()))
        );
    }

    #[test]
    fn invalid_setting() {
        testing_logger::setup();
        let store = ConfigStore::default();

        store.set(
            "collapse.scope_threshold",
            Setting::String("wont accept strings".into()),
        );

        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(captured_logs[0].level, log::Level::Warn);
        });
        assert_eq!(
            store.get("collapse.scope_threshold"),
            Some(Setting::UInt(50))
        );
    }

    #[test]
    fn unknown_key_returns_none() {
        let store = ConfigStore::default();
        assert_eq!(store.get("this.key.doesnt.exist"), None);
        assert!(!store.has("this.key.doesnt.exist"));
    }

    #[test]
    fn macro_usage() {
        config_store_write().set_storage(Box::new(MemoryStorageAdapter::new()));

        config_store().set("overlay.property_prefix", Setting::String("--ws-".into()));
        assert_eq!(config!(string "overlay.property_prefix"), "--ws-");
        assert_eq!(config!(uint "does.not.exist"), 0);
        config_store().set("overlay.property_prefix", Setting::String("--".into()));
    }
}
