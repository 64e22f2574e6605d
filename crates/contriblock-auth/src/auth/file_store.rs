/*
[INPUT]:  Session directory and sessions to persist
[OUTPUT]: Session file under a well-known name, readable across restarts
[POS]:    Auth layer - on-disk session persistence
[UPDATE]: When the session file format or location conventions change
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::auth::session::{Session, SessionStore};
use crate::http::{AuthError, Result};

/// Well-known key the session is stored under
pub const SESSION_FILE_NAME: &str = "access_token.json";

/// Persists the current session as JSON in a directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the session file
    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_NAME)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(storage_err)?;
        }

        let path = self.path();
        let encoded = serde_json::to_vec_pretty(session)?;
        fs::write(&path, encoded).map_err(storage_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&path).map_err(storage_err)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms).map_err(storage_err)?;
        }

        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let path = self.path();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read session file");
                return None;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt session file");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

fn storage_err(err: io::Error) -> AuthError {
    AuthError::Storage(err.to_string())
}
