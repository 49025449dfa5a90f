//! Per-user interface preferences.
//!
//! A handful of accessibility and appearance flags the shell persists
//! locally, next to the session. Stored as one JSON document through
//! the same store pattern the session uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

use crate::error::Error;

/// Color theme of the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

/// Interface preferences for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,

    /// Interface language code
    #[serde(default = "default_language")]
    pub language: String,

    /// Render text in a dyslexia-friendly font
    #[serde(default)]
    pub dyslexia_font: bool,

    /// Use an enlarged pointer cursor
    #[serde(default)]
    pub pointer_cursor: bool,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: default_language(),
            dyslexia_font: false,
            pointer_cursor: false,
        }
    }
}

/// Persists interface preferences between portal launches
#[async_trait]
pub trait PrefsStore: Send + Sync {
    /// Load the stored preferences, if any
    async fn load(&self) -> Result<Option<Preferences>, Error>;

    /// Store preferences, replacing any previous ones
    async fn save(&self, prefs: &Preferences) -> Result<(), Error>;

    /// Remove the stored preferences
    async fn clear(&self) -> Result<(), Error>;
}

/// Preference store backed by a JSON file
pub struct FilePrefsStore {
    path: PathBuf,
}

impl FilePrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PrefsStore for FilePrefsStore {
    async fn load(&self) -> Result<Option<Preferences>, Error> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, prefs: &Preferences) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(prefs)?).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory preference store for tests
#[derive(Default)]
pub struct MemoryPrefsStore {
    inner: Mutex<Option<Preferences>>,
}

impl MemoryPrefsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrefsStore for MemoryPrefsStore {
    async fn load(&self) -> Result<Option<Preferences>, Error> {
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn save(&self, prefs: &Preferences) -> Result<(), Error> {
        *self.inner.lock().unwrap() = Some(prefs.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_accessible_baseline() {
        let prefs = Preferences::default();
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(prefs.language, "en");
        assert!(!prefs.dyslexia_font);
        assert!(!prefs.pointer_cursor);
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"theme": "dark"}"#).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.language, "en");
        assert!(!prefs.dyslexia_font);
    }

    #[tokio::test]
    async fn file_store_round_trips_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePrefsStore::new(dir.path().join("prefs.json"));

        assert!(store.load().await.unwrap().is_none());

        let prefs = Preferences {
            theme: Theme::Dark,
            language: "kn".to_string(),
            dyslexia_font: true,
            pointer_cursor: false,
        };
        store.save(&prefs).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap(), prefs);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_round_trips_preferences() {
        let store = MemoryPrefsStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut prefs = Preferences::default();
        prefs.pointer_cursor = true;
        store.save(&prefs).await.unwrap();
        assert!(store.load().await.unwrap().unwrap().pointer_cursor);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
