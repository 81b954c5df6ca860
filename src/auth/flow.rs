use crate::auth::Authorizer;
use crate::models::TokenResponse;
use crate::traits::ConsentPresenter;
use crate::{AuthError, ClientSecret, Credential};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use rand::RngCore;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use url::Url;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You may close this window and return to the application.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the application for details.</p></body></html>";

/// What the provider sent back to the loopback redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    /// Space-separated scopes the user actually granted, when reported
    pub granted_scope: Option<String>,
}

type CallbackOutcome = Result<AuthorizationCallback, AuthError>;
type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// Loopback HTTP server that receives the provider's authorization redirect.
///
/// Listens on an ephemeral `127.0.0.1` port. Each connection is served on its
/// own task, so a browser's idle pre-connection cannot hold up the callback.
pub struct CallbackServer {
    redirect_uri: String,
    outcome: oneshot::Receiver<CallbackOutcome>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    /// Binds the listener; `expected_state` is checked on every callback.
    pub fn start(expected_state: &str) -> Result<Self, AuthError> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();

        let (outcome_tx, outcome) = oneshot::channel();
        let sender: CallbackSender = Arc::new(Mutex::new(Some(outcome_tx)));
        let expected_state = Arc::new(expected_state.to_string());

        let make_service = make_service_fn(move |_| {
            let sender = Arc::clone(&sender);
            let expected_state = Arc::clone(&expected_state);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_callback(req, Arc::clone(&sender), Arc::clone(&expected_state))
                }))
            }
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = Server::from_tcp(listener)
            .map_err(|e| AuthError::Generic {
                reason: format!("Failed to start callback server: {}", e),
            })?
            .serve(make_service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

        tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::warn!("Callback server stopped with error: {}", e);
            }
        });

        tracing::debug!("Callback server listening on port {}", port);
        Ok(CallbackServer {
            redirect_uri: format!("http://127.0.0.1:{}/", port),
            outcome,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the first callback carrying a code or an error.
    pub async fn wait(&mut self) -> Result<AuthorizationCallback, AuthError> {
        let outcome = (&mut self.outcome).await.unwrap_or_else(|_| {
            Err(AuthError::Generic {
                reason: "Callback server stopped before the redirect arrived".to_string(),
            })
        });
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        outcome
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn handle_callback(
    req: Request<Body>,
    sender: CallbackSender,
    expected_state: Arc<String>,
) -> Result<Response<Body>, Infallible> {
    if req.uri().path() != "/" {
        tracing::debug!("Ignoring callback request for {}", req.uri().path());
        return Ok(page(StatusCode::NOT_FOUND, ""));
    }

    let params: HashMap<String, String> =
        url::form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
            .into_owned()
            .collect();
    if !params.contains_key("code") && !params.contains_key("error") {
        return Ok(page(StatusCode::BAD_REQUEST, "No authorization code in request"));
    }

    let outcome = parse_callback(&params, &expected_state);
    let response = if outcome.is_ok() {
        page(StatusCode::OK, SUCCESS_PAGE)
    } else {
        page(StatusCode::OK, FAILURE_PAGE)
    };

    if let Some(tx) = lock(&sender).take() {
        let _ = tx.send(outcome);
    }
    Ok(response)
}

fn page(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn parse_callback(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> Result<AuthorizationCallback, AuthError> {
    if let Some(error) = params.get("error") {
        let reason = match params.get("error_description") {
            Some(description) => format!("{} ({})", error, description),
            None => error.clone(),
        };
        return Err(AuthError::ConsentDenied { reason });
    }

    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    let code = params
        .get("code")
        .filter(|code| !code.is_empty())
        .cloned()
        .ok_or_else(|| AuthError::Generic {
            reason: "Authorization callback did not include a code".to_string(),
        })?;

    Ok(AuthorizationCallback {
        code,
        granted_scope: params.get("scope").cloned(),
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn random_state() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Adds the anti-forgery `state` and forces the consent screen, so the
/// provider issues a refresh token even for a returning user.
fn with_flow_params(consent_url: &str, state: &str) -> Result<Url, AuthError> {
    let mut url = Url::parse(consent_url).map_err(|e| AuthError::Generic {
        reason: format!("Invalid consent URL: {}", e),
    })?;
    url.query_pairs_mut()
        .append_pair("state", state)
        .append_pair("prompt", "consent");
    Ok(url)
}

/// Results of one interactive flow that the authenticator does not return.
#[derive(Default)]
struct FlowCapture {
    failure: Option<AuthError>,
    granted_scope: Option<String>,
    token: Option<TokenInfo>,
}

type SharedCapture = Arc<Mutex<FlowCapture>>;

/// Hands the consent URL to the presenter and the redirect's code back to
/// the installed flow.
struct LoopbackDelegate {
    presenter: Arc<dyn ConsentPresenter>,
    state: String,
    redirect_uri: String,
    server: tokio::sync::Mutex<CallbackServer>,
    capture: SharedCapture,
}

impl InstalledFlowDelegate for LoopbackDelegate {
    fn redirect_uri(&self) -> Option<&str> {
        Some(&self.redirect_uri)
    }

    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            let outcome = match with_flow_params(url, &self.state) {
                Ok(consent_url) => {
                    tracing::info!("Waiting for authorization callback on {}", self.redirect_uri);
                    self.presenter.present(consent_url.as_str());
                    self.server.lock().await.wait().await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(callback) => {
                    lock(&self.capture).granted_scope = callback.granted_scope;
                    tracing::debug!("Authorization code received, exchanging for tokens");
                    Ok(callback.code)
                }
                Err(e) => {
                    let message = e.to_string();
                    lock(&self.capture).failure = Some(e);
                    Err(message)
                }
            }
        })
    }
}

/// Keeps the token the flow produced instead of caching it, so every
/// `authorize` call runs a fresh consent.
struct CapturingStorage(SharedCapture);

#[async_trait::async_trait]
impl TokenStorage for CapturingStorage {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        lock(&self.0).token = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

fn application_secret(client_secret: &ClientSecret) -> ApplicationSecret {
    ApplicationSecret {
        client_id: client_secret.client_id.clone(),
        client_secret: client_secret
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().clone())
            .unwrap_or_default(),
        token_uri: client_secret.token_uri.clone(),
        auth_uri: client_secret.auth_uri.clone(),
        redirect_uris: client_secret.redirect_uris.clone(),
        ..Default::default()
    }
}

fn map_flow_error(error: yup_oauth2::Error) -> AuthError {
    match error {
        yup_oauth2::Error::AuthError(e) => AuthError::OAuthError {
            code: e.error.as_str().to_string(),
            description: e.error_description,
        },
        other => AuthError::Generic {
            reason: format!("Authorization failed: {}", other),
        },
    }
}

/// Authorizer backed by the provider's real OAuth endpoints.
///
/// The interactive consent and code exchange run through yup-oauth2's
/// installed flow; refresh is a plain form post.
pub struct OAuthAuthorizer {
    pub(in crate::auth) client: reqwest::Client,
    presenter: Arc<dyn ConsentPresenter>,
}

impl OAuthAuthorizer {
    pub fn new(presenter: Arc<dyn ConsentPresenter>) -> Self {
        Self::with_client(reqwest::Client::new(), presenter)
    }

    pub fn with_client(client: reqwest::Client, presenter: Arc<dyn ConsentPresenter>) -> Self {
        OAuthAuthorizer { client, presenter }
    }

    async fn run_installed_flow(
        &self,
        client_secret: &ClientSecret,
        scopes: &[&str],
    ) -> Result<Credential, AuthError> {
        let state = random_state();
        let server = CallbackServer::start(&state)?;
        let capture = SharedCapture::default();

        let delegate = LoopbackDelegate {
            presenter: Arc::clone(&self.presenter),
            state,
            redirect_uri: server.redirect_uri().to_string(),
            server: tokio::sync::Mutex::new(server),
            capture: Arc::clone(&capture),
        };

        let authenticator = InstalledFlowAuthenticator::builder(
            application_secret(client_secret),
            InstalledFlowReturnMethod::Interactive,
        )
        .flow_delegate(Box::new(delegate))
        .with_storage(Box::new(CapturingStorage(Arc::clone(&capture))))
        .build()
        .await?;

        if let Err(e) = authenticator.token(scopes).await {
            return Err(lock(&capture).failure.take().unwrap_or_else(|| map_flow_error(e)));
        }

        let (token, granted_scope) = {
            let mut capture = lock(&capture);
            (capture.token.take(), capture.granted_scope.take())
        };
        let token = token.ok_or_else(|| AuthError::Generic {
            reason: "Authorization finished without a token".to_string(),
        })?;

        let now = Utc::now();
        let access_token = token.access_token.ok_or_else(|| AuthError::Generic {
            reason: "Token endpoint returned no access token".to_string(),
        })?;
        let response = TokenResponse {
            access_token,
            expires_in: token
                .expires_at
                .map(|at| at.unix_timestamp().saturating_sub(now.timestamp())),
            refresh_token: token.refresh_token,
            scope: granted_scope,
            token_type: None,
        };

        Credential::from_token_response(response, &client_secret.identity(), scopes, None, now)
    }
}

impl Authorizer for OAuthAuthorizer {
    async fn authorize(
        &self,
        client_secret: &ClientSecret,
        scopes: &[&str],
    ) -> Result<Credential, AuthError> {
        self.run_installed_flow(client_secret, scopes).await
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        self.refresh_credential(credential).await
    }
}
