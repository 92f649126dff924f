//! Settings persistence.
//!
//! The core treats storage as an opaque key-value collaborator: one JSON
//! blob under a fixed key. The file-backed implementation keeps the blob in
//! the user config directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Settings;
use crate::error::{Error, Result};

/// Fixed key the settings blob is stored under.
pub const SETTINGS_KEY: &str = "promptsmith-settings";

/// Opaque get/set collaborator for the settings blob.
pub trait SettingsStore: Send + Sync {
    /// Load the stored snapshot, or None when nothing was saved yet.
    fn load(&self) -> Result<Option<Settings>>;

    /// Replace the stored snapshot atomically.
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// File-backed store: `<config_dir>/promptsmith/<SETTINGS_KEY>.json`.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted in the platform config directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Storage("no config directory available".into()))?;
        Ok(Self::new(
            base.join("promptsmith").join(format!("{SETTINGS_KEY}.json")),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Option<Settings>> {
        let blob = match fs::read_to_string(&self.path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("read {}: {e}", self.path.display()))),
        };

        let settings = serde_json::from_str(&blob)
            .map_err(|e| Error::Storage(format!("decode settings blob: {e}")))?;
        debug!(path = %self.path.display(), "loaded settings snapshot");
        Ok(Some(settings))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("create {}: {e}", parent.display())))?;
        }

        let blob = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Storage(format!("encode settings blob: {e}")))?;

        // Write-then-rename so a crash never leaves a torn blob behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob).map_err(|e| Error::Storage(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Storage(format!("rename {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "saved settings snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Feature, ProviderKind};

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("nested").join("settings.json"));

        let mut settings = Settings::default();
        settings.default_api_key = Some("key-123".into());
        settings
            .provider_keys
            .insert(ProviderKind::GeminiLike, "gk".into());
        settings.routing.assign(Feature::Mentor, "gemini-pro");

        store.save(&settings).unwrap();
        let loaded = store.load().unwrap().expect("saved blob");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_save_replaces_previous_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.json"));

        let first = Settings::default();
        store.save(&first).unwrap();

        let mut second = Settings::default();
        second.default_api_key = Some("rotated".into());
        store.save(&second).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.default_api_key.as_deref(), Some("rotated"));
    }
}
