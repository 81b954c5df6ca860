use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::AuthError;

/// Full read/write access to the user's Drive.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Bearer-token bundle persisted between sessions.
///
/// Serialized in the provider's "authorized user" layout so files written by
/// other Google client libraries load unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(
        rename = "token",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub access_token: SecretString,
    #[serde(
        default,
        serialize_with = "serialize_secret_option",
        deserialize_with = "deserialize_secret_option"
    )]
    pub refresh_token: Option<SecretString>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(
        default,
        serialize_with = "serialize_secret_option",
        deserialize_with = "deserialize_secret_option"
    )]
    pub client_secret: Option<SecretString>,
    #[serde(rename = "scopes", default)]
    pub granted_scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl Credential {
    /// True when the access token is usable for at least `margin` more.
    /// A credential without an expiry is never considered valid, so it is
    /// refreshed into one that has one.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expiry {
            Some(expiry) => expiry - margin > now,
            None => false,
        }
    }

    pub fn covers_scope(&self, scope: &str) -> bool {
        self.granted_scopes.iter().any(|s| s == scope)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }

    /// Builds a credential from a token endpoint response.
    ///
    /// `previous` supplies the refresh token and scopes when the response
    /// omits them, which is what refresh responses usually do. A lifetime
    /// that is not positive is an error; one beyond a day is cut to a day.
    pub fn from_token_response(
        response: TokenResponse,
        client: &ClientIdentity,
        requested_scopes: &[&str],
        previous: Option<&Credential>,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let expiry = token_expiry(response.expires_in, now)?;

        let granted_scopes = match response.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => previous
                .map(|p| p.granted_scopes.clone())
                .unwrap_or_else(|| requested_scopes.iter().map(|s| s.to_string()).collect()),
        };

        let refresh_token = response
            .refresh_token
            .map(SecretString::new)
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        Ok(Credential {
            access_token: SecretString::new(response.access_token),
            refresh_token,
            token_uri: client.token_uri.clone(),
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            granted_scopes,
            expiry: Some(expiry),
        })
    }

    /// The client coordinates needed to refresh this credential.
    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_uri: self.token_uri.clone(),
        }
    }
}

/// Lifetime assumed when the token endpoint does not report one
pub const DEFAULT_TOKEN_LIFETIME_SEC: i64 = 3600;
/// Longest lifetime trusted from a token endpoint
pub const MAX_TOKEN_LIFETIME_SEC: i64 = 24 * 3600;

/// Absolute expiry for a token issued at `now` with `expires_in` seconds left.
pub fn token_expiry(
    expires_in: Option<i64>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AuthError> {
    let seconds = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SEC);
    if seconds <= 0 {
        return Err(AuthError::Generic {
            reason: format!("Token endpoint returned a non-positive expires_in: {}", seconds),
        });
    }

    Duration::try_seconds(seconds.min(MAX_TOKEN_LIFETIME_SEC))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::Generic {
            reason: format!("Token expiry out of range: {}", seconds),
        })
}

/// The minimum a token endpoint needs to know about the calling application.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: Option<SecretString>,
    pub token_uri: String,
}

/// Application-identity descriptor issued by the provider's developer console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    #[serde(default, deserialize_with = "deserialize_secret_option")]
    pub client_secret: Option<SecretString>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Reads an "installed" or "web" client descriptor.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let invalid = |reason: String| AuthError::InvalidClientSecret {
            path: path.display().to_string(),
            reason,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::from_json(&contents).map_err(|e| match e {
            AuthError::InvalidClientSecret { reason, .. } => invalid(reason),
            other => invalid(other.to_string()),
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, AuthError> {
        let file: ClientSecretFile = serde_json::from_str(contents)?;
        let secret = file
            .installed
            .or(file.web)
            .ok_or_else(|| AuthError::InvalidClientSecret {
                path: String::new(),
                reason: "expected an \"installed\" or \"web\" client section".to_string(),
            })?;

        if secret.client_id.trim().is_empty() {
            return Err(AuthError::InvalidClientSecret {
                path: String::new(),
                reason: "client_id is empty".to_string(),
            });
        }

        Ok(secret)
    }

    pub fn identity(&self) -> ClientIdentity {
        ClientIdentity {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_uri: self.token_uri.clone(),
        }
    }
}

/// Successful token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Error body returned by OAuth endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

// Custom serialization for SecretString
pub fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

pub fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

// Custom serialization for Option<SecretString>
pub fn serialize_secret_option<S>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize_secret_option<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(SecretString::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_credential(expiry: Option<DateTime<Utc>>) -> Credential {
        Credential {
            access_token: SecretString::new("ya29.access".to_string()),
            refresh_token: Some(SecretString::new("1//refresh".to_string())),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: Some(SecretString::new("shh".to_string())),
            granted_scopes: vec![DRIVE_SCOPE.to_string()],
            expiry,
        }
    }

    #[test]
    fn test_credential_uses_authorized_user_layout() {
        let expiry = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let credential = sample_credential(Some(expiry));

        let value: serde_json::Value = serde_json::to_value(&credential).unwrap();
        assert_eq!(value["token"], "ya29.access");
        assert_eq!(value["refresh_token"], "1//refresh");
        assert_eq!(value["scopes"][0], DRIVE_SCOPE);
        assert_eq!(value["expiry"], "2030-01-01T00:00:00Z");
    }

    #[test]
    fn test_credential_reads_python_client_file() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "GOCSPX-abc",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-05-01T10:20:30.123456Z"
        }"#;

        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token.expose_secret(), "ya29.a0");
        assert!(credential.has_refresh_token());
        assert!(credential.covers_scope(DRIVE_SCOPE));
        assert!(credential.expiry.is_some());
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let margin = Duration::seconds(60);

        assert!(sample_credential(Some(now + Duration::hours(1))).is_valid_at(now, margin));
        assert!(!sample_credential(Some(now + Duration::seconds(30))).is_valid_at(now, margin));
        assert!(!sample_credential(Some(now - Duration::hours(1))).is_valid_at(now, margin));
        assert!(!sample_credential(None).is_valid_at(now, margin));
    }

    #[test]
    fn test_refresh_response_keeps_previous_refresh_token_and_scopes() {
        let now = Utc::now();
        let previous = sample_credential(Some(now - Duration::hours(1)));
        let response = TokenResponse {
            access_token: "ya29.new".to_string(),
            expires_in: Some(3599),
            refresh_token: None,
            scope: None,
            token_type: Some("Bearer".to_string()),
        };

        let refreshed = Credential::from_token_response(
            response,
            &previous.identity(),
            &[DRIVE_SCOPE],
            Some(&previous),
            now,
        )
        .unwrap();

        assert_eq!(refreshed.access_token.expose_secret(), "ya29.new");
        assert_eq!(
            refreshed.refresh_token.as_ref().unwrap().expose_secret(),
            "1//refresh"
        );
        assert_eq!(refreshed.granted_scopes, vec![DRIVE_SCOPE.to_string()]);
        assert_eq!(refreshed.expiry, Some(now + Duration::seconds(3599)));
    }

    #[test]
    fn test_token_response_scope_string_is_split() {
        let now = Utc::now();
        let secret = ClientSecret::from_json(
            r#"{"installed": {"client_id": "id", "client_secret": "s"}}"#,
        )
        .unwrap();
        let response = TokenResponse {
            access_token: "a".to_string(),
            expires_in: None,
            refresh_token: Some("r".to_string()),
            scope: Some(format!("openid {}", DRIVE_SCOPE)),
            token_type: None,
        };

        let credential =
            Credential::from_token_response(response, &secret.identity(), &[], None, now).unwrap();
        assert_eq!(credential.granted_scopes.len(), 2);
        assert!(credential.covers_scope(DRIVE_SCOPE));
        assert_eq!(credential.expiry, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_token_lifetime_is_range_checked() {
        let now = Utc::now();
        let secret = ClientSecret::from_json(r#"{"installed": {"client_id": "id"}}"#).unwrap();
        let response = |expires_in: i64| TokenResponse {
            access_token: "a".to_string(),
            expires_in: Some(expires_in),
            refresh_token: None,
            scope: None,
            token_type: None,
        };

        let huge = Credential::from_token_response(
            response(i64::MAX),
            &secret.identity(),
            &[DRIVE_SCOPE],
            None,
            now,
        )
        .unwrap();
        assert_eq!(
            huge.expiry,
            Some(now + Duration::seconds(MAX_TOKEN_LIFETIME_SEC))
        );

        for bad in [0, -30, i64::MIN] {
            let err = Credential::from_token_response(
                response(bad),
                &secret.identity(),
                &[DRIVE_SCOPE],
                None,
                now,
            )
            .unwrap_err();
            assert!(matches!(err, AuthError::Generic { .. }));
        }
    }

    #[test]
    fn test_client_secret_installed_and_web() {
        let installed = ClientSecret::from_json(
            r#"{"installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "client_secret": "GOCSPX-x",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();
        assert_eq!(installed.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(installed.redirect_uris, vec!["http://localhost"]);

        let web = ClientSecret::from_json(r#"{"web": {"client_id": "w"}}"#).unwrap();
        assert_eq!(web.token_uri, GOOGLE_TOKEN_URI);
        assert!(web.client_secret.is_none());
    }

    #[test]
    fn test_client_secret_rejects_unknown_layout() {
        let err = ClientSecret::from_json(r#"{"service_account": {}}"#).unwrap_err();
        assert!(matches!(err, AuthError::InvalidClientSecret { .. }));

        let err = ClientSecret::from_json("not json").unwrap_err();
        assert!(matches!(err, AuthError::JsonError { .. }));
    }

    #[test]
    fn test_client_secret_from_missing_file() {
        let err = ClientSecret::from_file(Path::new("/nonexistent/client.json")).unwrap_err();
        match err {
            AuthError::InvalidClientSecret { path, .. } => {
                assert_eq!(path, "/nonexistent/client.json")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
