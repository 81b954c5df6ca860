use crate::auth::OAuthAuthorizer;
use crate::models::{ErrorResponse, TokenResponse};
use crate::{AuthError, Credential};
use chrono::Utc;
use secrecy::ExposeSecret;

impl OAuthAuthorizer {
    /// Trades the stored refresh token for a new access token.
    pub(in crate::auth) async fn refresh_credential(
        &self,
        credential: &Credential,
    ) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or_else(|| AuthError::RefreshRejected {
                reason: "no refresh token stored".to_string(),
            })?;

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.expose_secret().clone()),
            ("client_id", credential.client_id.clone()),
        ];
        if let Some(secret) = &credential.client_secret {
            params.push(("client_secret", secret.expose_secret().clone()));
        }

        let response = self.token_request(&credential.token_uri, &params).await?;

        Credential::from_token_response(
            response,
            &credential.identity(),
            &[],
            Some(credential),
            Utc::now(),
        )
    }

    async fn token_request(
        &self,
        token_uri: &str,
        params: &[(&str, String)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(token_uri)
            .header("Accept", "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        // 4xx with an OAuth error body means the grant itself was refused
        if status.is_client_error()
            && let Ok(error) = serde_json::from_str::<ErrorResponse>(&body)
        {
            tracing::warn!(
                "Token endpoint returned {}: {}",
                status.as_u16(),
                error.error
            );
            return Err(AuthError::OAuthError {
                code: error.error,
                description: error.error_description,
            });
        }

        Err(AuthError::Generic {
            reason: format!("Token endpoint returned {}: {}", status.as_u16(), body),
        })
    }
}
