use crate::errors::Error;
use crate::settings::Setting;
use crate::StorageAdapter;
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use stylesync_shared::types::Result;

/// Stores settings in a flat json object (`{"collapse.padding": "s:40px"}`). Every `set()`
/// writes the whole file back.
pub struct JsonStorageAdapter {
    path: PathBuf,
    elements: Mutex<HashMap<String, Setting>>,
}

impl TryFrom<&Path> for JsonStorageAdapter {
    type Error = anyhow::Error;

    fn try_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, "{}").map_err(Error::from)?;
        } else if !path.is_file() {
            return Err(Error::Config(format!("{} is not a regular file", path.display())).into());
        }

        let adapter = JsonStorageAdapter {
            path: path.to_path_buf(),
            elements: Mutex::new(read_file(path)?),
        };

        Ok(adapter)
    }
}

impl StorageAdapter for JsonStorageAdapter {
    fn get(&self, key: &str) -> Option<Setting> {
        let lock = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
        lock.get(key).cloned()
    }

    fn set(&self, key: &str, value: Setting) {
        let mut lock = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
        lock.insert(key.to_owned(), value);

        if let Err(err) = write_file(&self.path, &lock) {
            warn!("config: could not write {}: {err}", self.path.display());
        }
    }

    fn all(&self) -> Result<HashMap<String, Setting>> {
        let lock = self.elements.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(lock.clone())
    }
}

/// Reads the whole json file. Entries that cannot be parsed as a setting are skipped.
fn read_file(path: &Path) -> Result<HashMap<String, Setting>> {
    let buf = fs::read_to_string(path).map_err(Error::from)?;
    let parsed_json: Value = serde_json::from_str(&buf).map_err(Error::from)?;

    let mut elements = HashMap::new();
    if let Value::Object(settings) = parsed_json {
        for (key, value) in settings {
            match serde_json::from_value(value) {
                Ok(setting) => {
                    elements.insert(key, setting);
                }
                Err(err) => {
                    warn!("problem reading setting {key} from json: {err}");
                }
            }
        }
    }

    Ok(elements)
}

fn write_file(path: &Path, elements: &HashMap<String, Setting>) -> Result<()> {
    // sorted so the file stays diffable
    let sorted: BTreeMap<_, _> = elements.iter().collect();
    let json = serde_json::to_string_pretty(&sorted).map_err(Error::from)?;
    fs::write(path, json).map_err(Error::from)?;
    Ok(())
}
