//! Persistent storage for the bearer token.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// The name of the slot the bearer token is kept under.
pub const TOKEN_KEY: &str = "token";

/// A durable slot holding the bearer token.
///
/// Implementations hold exactly what was last written. There is no expiry
/// logic and an empty value reads back as "no token".
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, StoreError>;
    fn set(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// A [`CredentialStore`] which only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self { MemoryStore::default() }

    pub fn with_token<S: Into<String>>(token: S) -> Self {
        MemoryStore {
            slot: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // the slot is a plain value, a panic elsewhere can't leave it torn
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot().clone().filter(|t| !t.is_empty()))
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}

/// A [`CredentialStore`] backed by a file called [`TOKEN_KEY`] inside some
/// directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        FileStore {
            path: directory.as_ref().join(TOKEN_KEY),
        }
    }

    /// The per-user location, `$CONFIG_DIR/dashboard-client/token`.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir()
            .map(|dir| FileStore::new(dir.join(env!("CARGO_PKG_NAME"))))
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        log::debug!("Saving the token to {}", self.path.display());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(&self.path, token).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: e,
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        log::debug!("Removing {}", self.path.display());

        match fs::remove_file(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Write {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// Errors raised by a [`CredentialStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unable to read the token from \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to update \"{}\"", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
