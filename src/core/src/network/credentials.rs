//! Credential sources.
//!
//! Acquiring and persisting the bearer token is someone else's job (the
//! login redirect flow). The controller only needs to read the current token
//! and to report it invalid when the server answers 401.

use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, info, warn};

pub trait CredentialSource: Send + Sync {
    /// Current bearer token, `None` when unauthenticated.
    fn current_token(&self) -> Option<String>;

    /// Called after the server rejected the token.
    fn invalidate(&self);
}

/// Token held in memory, typically from a command-line flag or the environment.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self {
            token: Mutex::new(token),
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn current_token(&self) -> Option<String> {
        match self.token.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn invalidate(&self) {
        info!("Discarding rejected credential");
        match self.token.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

/// Token stored in a file, read lazily and cached.
///
/// Invalidation forgets the cached value and removes the file so the next run starts logged
/// out.
#[derive(Debug)]
pub struct FileCredentials {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl FileCredentials {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: Mutex::new(None),
        }
    }

    fn read_token(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) => {
                debug!("No token at {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl CredentialSource for FileCredentials {
    fn current_token(&self) -> Option<String> {
        let mut guard = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_none() {
            *guard = self.read_token();
        }
        guard.clone()
    }

    fn invalidate(&self) {
        match self.cached.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove rejected token file {}: {}",
                    self.path.display(),
                    e
                );
            }
        } else {
            info!("Removed rejected token file {}", self.path.display());
        }
    }
}
