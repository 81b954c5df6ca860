use crate::auth::{Authorizer, CredentialManager, CredentialState, OAuthAuthorizer};
use crate::drive::{DriveClient, FileListing};
use crate::traits::ConsentPresenter;
use crate::{AppError, AuthError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Outcome of a background task, delivered to the interactive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    ListingReady(FileListing),
    ListingFailed { message: String },
    UploadCompleted { path: PathBuf, file_id: String },
    UploadFailed { path: PathBuf, message: String },
    DownloadCompleted { path: PathBuf },
    DownloadFailed { file_id: String, message: String },
    ConsentRequested { url: String },
}

/// Everything one run of the application shares: the credential manager,
/// the Drive client and the channel background tasks report through.
pub struct Session<A: Authorizer + 'static = OAuthAuthorizer> {
    runtime: Handle,
    credentials: Arc<CredentialManager<A>>,
    drive: DriveClient,
    events: UnboundedSender<TaskEvent>,
}

impl<A: Authorizer + 'static> Clone for Session<A> {
    fn clone(&self) -> Self {
        Session {
            runtime: self.runtime.clone(),
            credentials: Arc::clone(&self.credentials),
            drive: self.drive.clone(),
            events: self.events.clone(),
        }
    }
}

impl<A: Authorizer + 'static> Session<A> {
    pub fn new(
        runtime: Handle,
        credentials: Arc<CredentialManager<A>>,
        drive: DriveClient,
        events: UnboundedSender<TaskEvent>,
    ) -> Self {
        Session {
            runtime,
            credentials,
            drive,
            events,
        }
    }

    pub fn credentials(&self) -> &CredentialManager<A> {
        &self.credentials
    }

    pub fn select_credentials(&self, path: impl AsRef<Path>) {
        self.credentials.set_client_secret_path(path);
    }

    pub fn credential_state(&self) -> CredentialState {
        self.credentials.state()
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.credentials.sign_out().await
    }

    pub async fn list_files(&self) -> Result<FileListing, AppError> {
        let credential = self.credentials.get_credential().await?;
        Ok(self.drive.list_files(&credential).await?)
    }

    pub async fn upload(&self, path: &Path) -> Result<String, AppError> {
        let credential = self.credentials.get_credential().await?;
        Ok(self.drive.upload_file(&credential, path).await?)
    }

    pub async fn download(&self, file_id: &str, dir: &Path) -> Result<PathBuf, AppError> {
        let credential = self.credentials.get_credential().await?;
        Ok(self.drive.download_file(&credential, file_id, dir).await?)
    }

    pub fn spawn_list(&self) -> JoinHandle<()> {
        let session = self.clone();
        self.runtime.spawn(async move {
            let event = match session.list_files().await {
                Ok(listing) => TaskEvent::ListingReady(listing),
                Err(e) => {
                    tracing::error!("Error listing files: {}", e);
                    TaskEvent::ListingFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.report(event);
        })
    }

    pub fn spawn_upload(&self, path: PathBuf) -> JoinHandle<()> {
        let session = self.clone();
        self.runtime.spawn(async move {
            let event = match session.upload(&path).await {
                Ok(file_id) => TaskEvent::UploadCompleted { path, file_id },
                Err(e) => {
                    tracing::error!("Error uploading {}: {}", path.display(), e);
                    TaskEvent::UploadFailed {
                        path,
                        message: e.to_string(),
                    }
                }
            };
            session.report(event);
        })
    }

    pub fn spawn_download(&self, file_id: String, dir: PathBuf) -> JoinHandle<()> {
        let session = self.clone();
        self.runtime.spawn(async move {
            let event = match session.download(&file_id, &dir).await {
                Ok(path) => TaskEvent::DownloadCompleted { path },
                Err(e) => {
                    tracing::error!("Error downloading file {}: {}", file_id, e);
                    TaskEvent::DownloadFailed {
                        file_id,
                        message: e.to_string(),
                    }
                }
            };
            session.report(event);
        })
    }

    fn report(&self, event: TaskEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Task finished after the interactive loop exited");
        }
    }
}

/// Routes the consent URL to the interactive loop instead of the terminal,
/// which is in raw mode while the TUI runs.
pub struct ChannelConsentPresenter {
    events: UnboundedSender<TaskEvent>,
}

impl ChannelConsentPresenter {
    pub fn new(events: UnboundedSender<TaskEvent>) -> Self {
        Self { events }
    }
}

impl ConsentPresenter for ChannelConsentPresenter {
    fn present(&self, url: &str) {
        tracing::info!("Authorization required, opening browser");
        let _ = self.events.send(TaskEvent::ConsentRequested {
            url: url.to_string(),
        });

        if let Err(e) = open::that(url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }
}
