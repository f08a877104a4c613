//! Persistence for the authenticated session's cookie jar.
//!
//! The jar is written as JSON to `~/.crosstie/cookies.json` after a
//! successful handshake. Session cookies are saved along with the
//! persistent ones: the server keys the whole session on a cookie that
//! carries no expiry, and dropping it would force a fresh login on
//! every invocation.
//!
//! Nothing here validates the session. A stale jar is loaded as-is and
//! found out at connect time, when the authenticated probe fails.

use std::{fs, io, path::{Path, PathBuf}};

use reqwest_cookie_store::CookieStore;

/// Errors that can occur while loading or saving the cookie jar.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cookie jar format error: {0}")]
    Format(String),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// File-backed storage for one cookie jar.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default jar location: `~/.crosstie/cookies.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".crosstie").join("cookies.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved jar. A missing file is an empty jar, not an
    /// error; the first run has nothing saved yet.
    pub fn load(&self) -> Result<CookieStore> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CookieStore::default()),
            Err(e) => return Err(e.into()),
        };
        CookieStore::load_json_all(io::BufReader::new(file))
            .map_err(|e| StoreError::Format(e.to_string()))
    }

    /// Saves the jar, session cookies included, creating parent
    /// directories as needed.
    pub fn save(&self, jar: &CookieStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::new();
        jar.save_incl_expired_and_nonpersistent_json(&mut buf)
            .map_err(|e| StoreError::Format(e.to_string()))?;
        fs::write(&self.path, buf)?;
        Ok(())
    }
}
