//! Credential lifecycle for the Drive API
//!
//! `CredentialManager` owns the persisted token and hands out a valid
//! credential on demand: stored and fresh tokens are returned as-is, expired
//! ones are refreshed, and a missing, unreadable or revoked token sends the
//! user through the interactive loopback authorization flow.

mod core;
mod flow;
mod refresh;
mod token_management;
mod validation;

pub use self::core::CredentialManager;
pub use flow::{AuthorizationCallback, CallbackServer, OAuthAuthorizer};
pub use validation::{CredentialState, StoredCredential, classify};

use crate::{AuthError, ClientSecret, Credential};
use std::future::Future;

/// Talks to the provider's OAuth endpoints on behalf of `CredentialManager`.
pub trait Authorizer: Send + Sync {
    /// Runs the interactive consent flow and exchanges the resulting code.
    fn authorize(
        &self,
        client_secret: &ClientSecret,
        scopes: &[&str],
    ) -> impl Future<Output = Result<Credential, AuthError>> + Send;

    /// Trades the refresh token of `credential` for a new access token.
    fn refresh(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Credential, AuthError>> + Send;
}
