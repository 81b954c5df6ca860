use crate::auth::{CredentialManager, OAuthAuthorizer};
use crate::cli::{Cli, Commands, handle_command};
use crate::drive::DriveClient;
use crate::logger::{LogTarget, setup_logging};
use crate::session::{ChannelConsentPresenter, Session};
use crate::token_storage::FileCredentialStore;
use crate::traits::{
    BrowserConsentPresenter, ConfigProvider, ConsentPresenter, DefaultConfigProvider,
    DefaultExitHandler, DefaultMessageHandler, ExitHandler, MessageHandler,
};
use crate::tui::TuiApp;
use crate::{AppError, Config};
use std::sync::Arc;

/// Main application structure
pub struct Application;

impl Application {
    /// Run the application with default implementations
    pub async fn run(cli: Cli) -> Result<(), AppError> {
        let config_provider = DefaultConfigProvider {
            path: cli.config.clone(),
        };
        Self::run_with_deps(
            cli,
            &config_provider,
            &DefaultExitHandler,
            Arc::new(DefaultMessageHandler),
        )
        .await
    }

    /// Run the application with dependency injection
    pub async fn run_with_deps(
        cli: Cli,
        config_provider: &dyn ConfigProvider,
        exit_handler: &dyn ExitHandler,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Result<(), AppError> {
        let mut config = match config_provider.load_config() {
            Ok(config) => config,
            Err(e) => {
                message_handler.eprint(&format!("Failed to load config: {}", e));
                exit_handler.exit(1);
                return Err(e.into());
            }
        };

        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }

        let command = cli.command();
        let target = if command == Commands::Tui {
            LogTarget::File
        } else {
            LogTarget::Console
        };
        let _guard = setup_logging(&config, target);

        tracing::info!("Drive Manager starting ({:?})", command);

        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();

        let presenter: Arc<dyn ConsentPresenter> = if command == Commands::Tui {
            Arc::new(ChannelConsentPresenter::new(events_tx.clone()))
        } else {
            Arc::new(BrowserConsentPresenter::new(Arc::clone(&message_handler)))
        };

        let session = build_session(&config, presenter, events_tx)?;
        if let Some(path) = &cli.client_secret {
            session.select_credentials(path);
        }

        let result = if command == Commands::Tui {
            tokio::task::spawn_blocking(move || TuiApp::new(session, events_rx).run())
                .await
                .map_err(|e| AppError::Generic {
                    message: format!("TUI thread failed: {}", e),
                })?
                .map_err(|e| AppError::Generic {
                    message: format!("Terminal error: {}", e),
                })
        } else {
            handle_command(command, &session, message_handler.as_ref()).await
        };

        match &result {
            Ok(()) => tracing::info!("Drive Manager shutdown complete"),
            Err(e) => tracing::error!("Drive Manager exited with error: {}", e),
        }
        result
    }
}

/// Wires the credential manager and Drive client for one run
pub fn build_session(
    config: &Config,
    presenter: Arc<dyn ConsentPresenter>,
    events: tokio::sync::mpsc::UnboundedSender<crate::session::TaskEvent>,
) -> Result<Session<OAuthAuthorizer>, AppError> {
    let store = FileCredentialStore::new(config.token_file_path());
    tracing::debug!("Credential file: {:?}", store.path());

    let credentials = Arc::new(CredentialManager::new(
        Box::new(store),
        OAuthAuthorizer::new(presenter),
        config.refresh_margin(),
    ));
    let drive = DriveClient::new(config.drive.clone())?;

    Ok(Session::new(
        tokio::runtime::Handle::current(),
        credentials,
        drive,
        events,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use crate::auth::CredentialState;
    use clap::Parser;
    use std::sync::Mutex;

    struct MockConfigProvider {
        config: Option<Config>,
    }

    impl ConfigProvider for MockConfigProvider {
        fn load_config(&self) -> Result<Config, ConfigError> {
            self.config.clone().ok_or(ConfigError::ValidationError {
                reason: "broken".to_string(),
            })
        }
    }

    struct MockExitHandler {
        code: Mutex<Option<i32>>,
    }

    impl ExitHandler for MockExitHandler {
        fn exit(&self, code: i32) {
            *self.code.lock().unwrap() = Some(code);
        }
    }

    #[derive(Default)]
    struct MockMessageHandler {
        printed: Mutex<Vec<String>>,
        eprinted: Mutex<Vec<String>>,
    }

    impl MessageHandler for MockMessageHandler {
        fn print(&self, message: &str) {
            self.printed.lock().unwrap().push(message.to_string());
        }

        fn eprint(&self, message: &str) {
            self.eprinted.lock().unwrap().push(message.to_string());
        }
    }

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.auth.token_path = Some(dir.join("token.json").to_string_lossy().into_owned());
        config
    }

    #[tokio::test]
    async fn test_config_error_exits_with_code_1() {
        let exit_handler = MockExitHandler {
            code: Mutex::new(None),
        };
        let messages = Arc::new(MockMessageHandler::default());

        let result = Application::run_with_deps(
            Cli::parse_from(["drive-manager", "status"]),
            &MockConfigProvider { config: None },
            &exit_handler,
            messages.clone(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(*exit_handler.code.lock().unwrap(), Some(1));
        assert!(messages.eprinted.lock().unwrap()[0].starts_with("Failed to load config"));
    }

    #[tokio::test]
    async fn test_status_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let exit_handler = MockExitHandler {
            code: Mutex::new(None),
        };
        let messages = Arc::new(MockMessageHandler::default());

        Application::run_with_deps(
            Cli::parse_from(["drive-manager", "status"]),
            &MockConfigProvider {
                config: Some(config_in(dir.path())),
            },
            &exit_handler,
            messages.clone(),
        )
        .await
        .unwrap();

        let printed = messages.printed.lock().unwrap();
        assert_eq!(printed[0], "Credential: not signed in");
        assert_eq!(printed[1], "Credentials file: not selected");
        assert_eq!(*exit_handler.code.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_without_client_secret_fails_before_any_flow() {
        let dir = tempfile::tempdir().unwrap();
        let messages = Arc::new(MockMessageHandler::default());

        let result = Application::run_with_deps(
            Cli::parse_from(["drive-manager", "list"]),
            &MockConfigProvider {
                config: Some(config_in(dir.path())),
            },
            &DefaultExitHandler,
            messages,
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::Auth(crate::AuthError::MissingClientSecret))
        ));
        assert!(!dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_build_session_uses_configured_token_path() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let presenter: Arc<dyn ConsentPresenter> =
            Arc::new(ChannelConsentPresenter::new(tx.clone()));

        let session = build_session(&config_in(dir.path()), presenter, tx).unwrap();
        assert_eq!(session.credential_state(), CredentialState::NoToken);
    }
}
