//! INI-file preference store.

use std::path::{Path, PathBuf};

use ini::Ini;

use super::{PreferenceError, PreferenceStore};

/// Preferences persisted to an INI file.
///
/// Keys are `section.key`; every `set` rewrites the file.
#[derive(Debug)]
pub struct IniPreferenceStore {
    path: PathBuf,
    ini: Ini,
}

impl IniPreferenceStore {
    /// Open the store at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let ini = if path.exists() {
            Ini::load_from_file(&path).map_err(|e| PreferenceError::Parse(e.to_string()))?
        } else {
            Ini::new()
        };
        Ok(Self { path, ini })
    }

    /// Default location: `<data dir>/reelfeed/preferences.ini`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reelfeed")
            .join("preferences.ini")
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn split(key: &str) -> Result<(&str, &str), PreferenceError> {
        match key.split_once('.') {
            Some((section, name)) if !section.is_empty() && !name.is_empty() => Ok((section, name)),
            _ => Err(PreferenceError::InvalidKey(key.to_string())),
        }
    }
}

impl PreferenceStore for IniPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        let (section, name) = Self::split(key)?;
        Ok(self.ini.get_from(Some(section), name).map(str::to_string))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let (section, name) = Self::split(key)?;
        self.ini.with_section(Some(section)).set(name, value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.ini.write_to_file(&self.path)?;
        Ok(())
    }
}
