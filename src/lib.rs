pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod drive;
pub mod errors;
pub mod logger;
pub mod models;
pub mod session;
pub mod token_storage;
pub mod traits;
pub mod tui;

pub use app::Application;
pub use auth::{Authorizer, CredentialManager, CredentialState, OAuthAuthorizer};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use drive::{DriveClient, FileListing, RemoteFile};
pub use errors::{AppError, AuthError, ConfigError, TransferError, UnsupportedExportError};
pub use models::{ClientSecret, Credential, ErrorResponse, TokenResponse};
pub use session::{Session, TaskEvent};
pub use token_storage::{CredentialStore, FileCredentialStore};
pub use traits::{
    BrowserConsentPresenter, ConfigProvider, ConsentPresenter, DefaultConfigProvider,
    DefaultExitHandler, DefaultMessageHandler, ExitHandler, MessageHandler,
};
