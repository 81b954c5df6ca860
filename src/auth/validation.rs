use crate::Credential;
use crate::models::DRIVE_SCOPE;
use chrono::{DateTime, Duration, Utc};

/// What the persisted credential means for the next remote call.
#[derive(Debug, Clone)]
pub enum StoredCredential {
    /// Nothing persisted
    Missing,
    /// Usable as-is
    Valid(Credential),
    /// Past (or close to) its expiry, or without one
    Expired(Credential),
    /// Issued without full Drive access; cannot be repaired by refreshing
    MissingScope(Credential),
}

/// Sorts a loaded credential into the lifecycle states.
pub fn classify(
    stored: Option<Credential>,
    now: DateTime<Utc>,
    refresh_margin: Duration,
) -> StoredCredential {
    let Some(credential) = stored else {
        return StoredCredential::Missing;
    };

    if !credential.covers_scope(DRIVE_SCOPE) {
        tracing::debug!(
            "Stored credential scopes {:?} do not include {}",
            credential.granted_scopes,
            DRIVE_SCOPE
        );
        return StoredCredential::MissingScope(credential);
    }

    if credential.is_valid_at(now, refresh_margin) {
        tracing::debug!(
            "Stored credential valid until {:?}",
            credential.expiry.map(|e| e.to_rfc3339())
        );
        StoredCredential::Valid(credential)
    } else {
        tracing::debug!(
            "Stored credential expired or expiring: expiry={:?}, now={}",
            credential.expiry.map(|e| e.to_rfc3339()),
            now.to_rfc3339()
        );
        StoredCredential::Expired(credential)
    }
}

/// Read-only summary of the persisted credential, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    NoToken,
    Valid { expiry: DateTime<Utc> },
    Expired { refreshable: bool },
    Unusable { reason: String },
}

impl std::fmt::Display for CredentialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialState::NoToken => write!(f, "not signed in"),
            CredentialState::Valid { expiry } => {
                write!(f, "signed in, token valid until {}", expiry.to_rfc3339())
            }
            CredentialState::Expired { refreshable: true } => {
                write!(f, "token expired, will refresh on next use")
            }
            CredentialState::Expired { refreshable: false } => {
                write!(f, "token expired, sign-in required")
            }
            CredentialState::Unusable { reason } => {
                write!(f, "stored token unusable ({}), sign-in required", reason)
            }
        }
    }
}

impl StoredCredential {
    pub fn state(&self) -> CredentialState {
        match self {
            StoredCredential::Missing => CredentialState::NoToken,
            StoredCredential::Valid(c) => match c.expiry {
                Some(expiry) => CredentialState::Valid { expiry },
                None => CredentialState::Expired {
                    refreshable: c.has_refresh_token(),
                },
            },
            StoredCredential::Expired(c) => CredentialState::Expired {
                refreshable: c.has_refresh_token(),
            },
            StoredCredential::MissingScope(_) => CredentialState::Unusable {
                reason: format!("scope {} not granted", DRIVE_SCOPE),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn credential(expiry: Option<DateTime<Utc>>, scopes: &[&str], refresh: bool) -> Credential {
        Credential {
            access_token: SecretString::new("access".to_string()),
            refresh_token: refresh.then(|| SecretString::new("refresh".to_string())),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "client".to_string(),
            client_secret: None,
            granted_scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expiry,
        }
    }

    #[test]
    fn test_classify_missing() {
        let state = classify(None, Utc::now(), Duration::seconds(60));
        assert!(matches!(state, StoredCredential::Missing));
        assert_eq!(state.state(), CredentialState::NoToken);
    }

    #[test]
    fn test_classify_valid_and_expired() {
        let now = Utc::now();
        let margin = Duration::seconds(60);

        let valid = classify(
            Some(credential(Some(now + Duration::hours(1)), &[DRIVE_SCOPE], true)),
            now,
            margin,
        );
        assert!(matches!(valid, StoredCredential::Valid(_)));

        let expiring = classify(
            Some(credential(Some(now + Duration::seconds(10)), &[DRIVE_SCOPE], true)),
            now,
            margin,
        );
        assert!(matches!(expiring, StoredCredential::Expired(_)));
        assert_eq!(
            expiring.state(),
            CredentialState::Expired { refreshable: true }
        );

        let no_expiry = classify(Some(credential(None, &[DRIVE_SCOPE], false)), now, margin);
        assert_eq!(
            no_expiry.state(),
            CredentialState::Expired { refreshable: false }
        );
    }

    #[test]
    fn test_classify_missing_scope_wins_over_validity() {
        let now = Utc::now();
        let state = classify(
            Some(credential(
                Some(now + Duration::hours(1)),
                &["https://www.googleapis.com/auth/drive.readonly"],
                true,
            )),
            now,
            Duration::seconds(60),
        );
        assert!(matches!(state, StoredCredential::MissingScope(_)));
        assert!(matches!(state.state(), CredentialState::Unusable { .. }));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CredentialState::NoToken.to_string(), "not signed in");
        assert_eq!(
            CredentialState::Expired { refreshable: false }.to_string(),
            "token expired, sign-in required"
        );
    }
}
