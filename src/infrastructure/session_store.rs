//! Persisted session credentials.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::errors::StorageError;

const APP_QUALIFIER: &str = "chat";
const APP_ORGANIZATION: &str = "rivulet";
const APP_NAME: &str = "rivulet";
const SESSION_FILE_NAME: &str = "session.toml";

/// A stored session: who we are and the token that proves it.
///
/// The token is wiped from memory on drop and masked in debug output.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Session {
    /// Id of the user the token belongs to.
    #[zeroize(skip)]
    pub user_id: String,
    /// Session token presented to the API and gateway.
    pub token: String,
}

impl Session {
    /// Creates a session record.
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    /// Masked token for display.
    #[must_use]
    pub fn masked_token(&self) -> String {
        if self.token.len() <= 10 {
            return "*".repeat(self.token.len());
        }
        format!(
            "{}...{}",
            &self.token[..4],
            &self.token[self.token.len() - 4..]
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &self.masked_token())
            .finish()
    }
}

/// Loads and saves the session file.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted in the platform data directory.
    #[must_use]
    pub fn new() -> Option<Self> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map(|dirs| Self {
            dir: dirs.data_dir().to_path_buf(),
        })
    }

    /// Creates a store rooted in a specific directory (useful for testing).
    #[must_use]
    pub const fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_NAME)
    }

    /// Loads the stored session, if any. A malformed file is treated as
    /// absent rather than fatal.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<Session>, StorageError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        match toml::from_str::<Session>(&content) {
            Ok(session) => {
                debug!(user_id = %session.user_id, "loaded stored session");
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "session file is malformed, ignoring it");
                Ok(None)
            }
        }
    }

    /// Saves the session atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;

        let content =
            toml::to_string_pretty(session).map_err(|e| StorageError::serialize(e.to_string()))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.persist(self.path()).map_err(|e| e.error)?;

        debug!(user_id = %session.user_id, "session saved");
        Ok(())
    }

    /// Removes the stored session. Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StorageError> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
