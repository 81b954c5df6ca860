use crate::auth::{Authorizer, CredentialState, StoredCredential, classify};
use crate::models::DRIVE_SCOPE;
use crate::{AuthError, ClientSecret, Credential};
use chrono::{Duration, Utc};

impl<A: Authorizer> super::CredentialManager<A> {
    /// Returns a credential that is valid for at least the refresh margin.
    ///
    /// Concurrent callers are serialized: the second caller sees whatever
    /// the first one persisted instead of refreshing or authorizing again.
    pub async fn get_credential(&self) -> Result<Credential, AuthError> {
        let _guard = self.lifecycle_lock.lock().await;

        let stored = self.load_stored()?;
        match classify(stored, Utc::now(), self.refresh_margin) {
            StoredCredential::Valid(credential) => {
                tracing::debug!("Using stored credential");
                Ok(credential)
            }
            StoredCredential::Expired(credential) => self.refresh_or_reauthorize(credential).await,
            StoredCredential::Missing => {
                tracing::info!("No stored credential. Starting authorization flow...");
                self.authorize_and_store().await
            }
            StoredCredential::MissingScope(_) => {
                tracing::warn!(
                    "Stored credential lacks scope {}. Discarding and re-authorizing...",
                    DRIVE_SCOPE
                );
                self.store.delete()?;
                self.authorize_and_store().await
            }
        }
    }

    /// Describes the persisted credential without refreshing or prompting.
    pub fn state(&self) -> CredentialState {
        match self.store.load() {
            Ok(stored) => classify(stored, Utc::now(), self.refresh_margin).state(),
            Err(e) => CredentialState::Unusable {
                reason: e.to_string(),
            },
        }
    }

    /// Forgets the persisted credential. The next `get_credential` call
    /// runs the interactive flow.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let _guard = self.lifecycle_lock.lock().await;
        self.store.delete()?;
        tracing::info!("Signed out, stored credential removed");
        Ok(())
    }

    /// Loads the stored credential; an unreadable file is discarded and
    /// treated as absent.
    fn load_stored(&self) -> Result<Option<Credential>, AuthError> {
        match self.store.load() {
            Ok(stored) => Ok(stored),
            Err(AuthError::CorruptCredential { reason }) => {
                tracing::warn!(
                    "Stored credential is unreadable ({}). Discarding it.",
                    reason
                );
                self.store.delete()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_or_reauthorize(&self, expired: Credential) -> Result<Credential, AuthError> {
        if !expired.has_refresh_token() {
            tracing::warn!("Stored credential expired and has no refresh token. Re-authorizing...");
            self.store.delete()?;
            return self.authorize_and_store().await;
        }

        tracing::info!("Access token expired, refreshing...");
        match self.authorizer.refresh(&expired).await {
            Ok(refreshed) if !is_usable(&refreshed) => {
                tracing::warn!(
                    "Refreshed credential lacks scope {} or is already expired. Re-authorizing...",
                    DRIVE_SCOPE
                );
                self.store.delete()?;
                self.authorize_and_store().await
            }
            Ok(refreshed) => {
                if let Err(e) = self.store.save(&refreshed) {
                    tracing::error!("Failed to save refreshed credential: {}", e);
                }
                tracing::info!("Access token refreshed");
                Ok(refreshed)
            }
            Err(e) if e.is_refresh_rejection() => {
                tracing::warn!("Refresh rejected ({}). Discarding token and re-authorizing...", e);
                self.store.delete()?;
                self.authorize_and_store().await
            }
            Err(e) => {
                // Transport failures leave the stored refresh token untouched
                tracing::error!("Token refresh failed: {}", e);
                Err(e)
            }
        }
    }

    async fn authorize_and_store(&self) -> Result<Credential, AuthError> {
        let path = self
            .client_secret_path()
            .ok_or(AuthError::MissingClientSecret)?;
        let client_secret = ClientSecret::from_file(&path)?;

        let credential = self
            .authorizer
            .authorize(&client_secret, &[DRIVE_SCOPE])
            .await?;

        if !credential.covers_scope(DRIVE_SCOPE) {
            return Err(AuthError::InsufficientScope {
                required: DRIVE_SCOPE.to_string(),
            });
        }
        if !is_usable(&credential) {
            return Err(AuthError::Generic {
                reason: "Authorization returned an already expired token".to_string(),
            });
        }

        if let Err(e) = self.store.save(&credential) {
            tracing::error!("Failed to save new credential: {}", e);
            tracing::warn!("Authentication token will not persist between sessions.");
        }

        tracing::info!("Authorization completed");
        Ok(credential)
    }
}

/// Covers the Drive scope and has not expired yet.
fn is_usable(credential: &Credential) -> bool {
    credential.covers_scope(DRIVE_SCOPE) && credential.is_valid_at(Utc::now(), Duration::zero())
}
