use crate::{AuthError, Credential};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persistence for the single credential of this application.
///
/// Only `CredentialManager` talks to a store; everything else asks the
/// manager for a credential.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing is stored, `Err(CorruptCredential)` when
    /// something is stored but cannot be read back.
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
    fn delete(&self) -> Result<(), AuthError>;
}

/// JSON file at a fixed path
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    token_file_path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(token_file_path: impl Into<PathBuf>) -> Self {
        FileCredentialStore {
            token_file_path: token_file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.token_file_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .token_file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.token_file_path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.token_file_path.exists() {
            tracing::debug!("No token file at {:?}", self.token_file_path);
            return Ok(None);
        }

        let token_json = fs::read_to_string(&self.token_file_path)?;

        if token_json.trim().is_empty() {
            tracing::debug!("Token file {:?} is empty", self.token_file_path);
            return Ok(None);
        }

        let credential: Credential =
            serde_json::from_str(&token_json).map_err(|e| AuthError::CorruptCredential {
                reason: e.to_string(),
            })?;

        tracing::debug!("Token loaded from file: {:?}", self.token_file_path);
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.token_file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let token_json = serde_json::to_string_pretty(credential)?;

        // Write beside the target and rename so a crash never leaves half a file
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(token_json.as_bytes())?;
            file.sync_all()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, &self.token_file_path)?;

        tracing::info!("Token saved to file: {:?}", self.token_file_path);
        Ok(())
    }

    fn delete(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.token_file_path) {
            Ok(()) => {
                tracing::info!("Token file deleted: {:?}", self.token_file_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No token file to delete at {:?}", self.token_file_path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
