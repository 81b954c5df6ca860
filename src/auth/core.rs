use crate::auth::{Authorizer, OAuthAuthorizer};
use crate::token_storage::CredentialStore;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub struct CredentialManager<A: Authorizer = OAuthAuthorizer> {
    pub(in crate::auth) store: Box<dyn CredentialStore>,
    pub(in crate::auth) authorizer: A,
    pub(in crate::auth) refresh_margin: chrono::Duration,
    client_secret_path: RwLock<Option<PathBuf>>,
    // Held for the whole load/refresh/authorize/save sequence
    pub(in crate::auth) lifecycle_lock: tokio::sync::Mutex<()>,
}

impl<A: Authorizer> CredentialManager<A> {
    /// Creates a manager over `store`; tokens within `refresh_margin` of
    /// their expiry are treated as expired.
    pub fn new(
        store: Box<dyn CredentialStore>,
        authorizer: A,
        refresh_margin: chrono::Duration,
    ) -> Self {
        CredentialManager {
            store,
            authorizer,
            refresh_margin,
            client_secret_path: RwLock::new(None),
            lifecycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Selects the application-identity descriptor used by the next
    /// interactive authorization.
    pub fn set_client_secret_path(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        tracing::info!("Credentials file selected: {:?}", path);
        match self.client_secret_path.write() {
            Ok(mut guard) => *guard = Some(path),
            Err(poisoned) => *poisoned.into_inner() = Some(path),
        }
    }

    pub fn client_secret_path(&self) -> Option<PathBuf> {
        match self.client_secret_path.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }
}
