//! TOML-backed settings store for the standalone host
//!
//! The whole store is a flat TOML table. Writes go to a temp file that is
//! renamed over the real one, under an exclusive lock on a sidecar lock file
//! so concurrent `bwtctl` invocations do not interleave.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use bwtctl_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "bwtctl";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config_dir>/bwtctl/config.toml`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::config("Could not determine the user config directory"))?;
        Ok(Self::new(dir.join(APP_DIR).join(CONFIG_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the table. A missing file is an empty table.
    pub fn load(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            debug!("No settings file at {:?}, starting empty", self.path);
            return Ok(toml::Table::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::config(format!("Failed to read {:?}: {}", self.path, e)))?;
        let table: toml::Table = toml::from_str(&content)?;
        debug!("Loaded {} settings from {:?}", table.len(), self.path);
        Ok(table)
    }

    /// Replace the file with `table`
    pub fn save(&self, table: &toml::Table) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::config(format!("Invalid settings path {:?}", self.path)))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e)))?;

        let lock_path = dir.join(format!(".{}.lock", CONFIG_FILENAME));
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::config(format!("Failed to open {:?}: {}", lock_path, e)))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| Error::config(format!("Failed to lock settings: {}", e)))?;

        let content = format!("{}{}", generate_header(), toml::to_string_pretty(table)?);

        let temp_path = dir.join(format!(".{}.tmp", CONFIG_FILENAME));
        std::fs::write(&temp_path, content)
            .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

        // lock released when lock_file drops
        info!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

fn generate_header() -> &'static str {
    "# bwtctl settings\n# Written by `bwtctl config set`; bwt_* keys configure the daemon\n\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("config.toml"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("config.toml"));

        let mut table = toml::Table::new();
        table.insert("bwt_enabled".to_string(), toml::Value::Boolean(true));
        table.insert("bwt_verbose".to_string(), toml::Value::Integer(2));
        table.insert(
            "bwt_bitcoind_url".to_string(),
            toml::Value::String("http://localhost:8332/".to_string()),
        );
        store.save(&table).unwrap();

        assert_eq!(store.load().unwrap(), table);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("# bwtctl settings"));
        assert!(raw.contains("bwt_enabled = true"));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("config.toml"));
        store.save(&toml::Table::new()).unwrap();
        assert!(!dir.path().join(".config.toml.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "bwt_enabled = = true").unwrap();
        let store = SettingsStore::new(path);
        assert!(matches!(store.load(), Err(Error::TomlDe(_))));
    }
}
