//! Session persistence between portal launches

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::fs;

use crate::auth::Session;
use crate::error::Error;

/// Persists the signed-in session so a restart does not force a new
/// login. A browser shell backs this with its local storage; the
/// default implementations cover files and tests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any
    async fn load(&self) -> Result<Option<Session>, Error>;

    /// Store a session, replacing any previous one
    async fn save(&self, session: &Session) -> Result<(), Error>;

    /// Remove the stored session
    async fn clear(&self) -> Result<(), Error>;
}

/// Session store backed by a JSON file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>, Error> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?).await?;
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

/// In-memory session store for tests and short-lived tools
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, Error> {
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn save(&self, session: &Session) -> Result<(), Error> {
        *self.inner.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        *self.inner.lock().unwrap() = None;
        Ok(())
    }
}
