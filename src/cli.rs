use crate::auth::Authorizer;
use crate::drive::FileListing;
use crate::session::Session;
use crate::{AppError, MessageHandler};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Drive Manager - browse, upload and download Google Drive files
#[derive(Parser)]
#[command(name = "drive-manager")]
#[command(about = "A Google Drive client with a terminal UI", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (overrides the config file)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// OAuth client JSON used when signing in
    #[arg(long, value_name = "FILE", global = true)]
    pub client_secret: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Launch the interactive terminal UI (default)
    Tui,

    /// List the first page of files
    List,

    /// Upload a local file to the Drive root
    Upload(UploadArgs),

    /// Download or export a file by id
    Download(DownloadArgs),

    /// Show the state of the stored credential
    Status,

    /// Delete the stored credential
    Logout,
}

#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct UploadArgs {
    /// File to upload
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct DownloadArgs {
    /// Drive file id
    #[arg(value_name = "FILE_ID")]
    pub file_id: String,

    /// Directory to write the file into
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Tui)
    }
}

/// Runs one non-interactive command to completion.
pub async fn handle_command<A: Authorizer + 'static>(
    command: Commands,
    session: &Session<A>,
    message_handler: &dyn MessageHandler,
) -> Result<(), AppError> {
    match command {
        Commands::Tui => {
            return Err(AppError::Generic {
                message: "The TUI is not started through handle_command".to_string(),
            });
        }
        Commands::List => {
            let listing = session.list_files().await?;
            print_listing(&listing, message_handler);
        }
        Commands::Upload(args) => {
            let file_id = session.upload(&args.path).await?;
            message_handler.print(&format!("File uploaded: {}", file_id));
        }
        Commands::Download(args) => match session.download(&args.file_id, &args.dir).await {
            Ok(path) => message_handler.print(&format!(
                "File downloaded successfully! {}",
                path.display()
            )),
            Err(e) => {
                message_handler.eprint(&format!("Error downloading file: {}", e));
                return Err(e);
            }
        },
        Commands::Status => {
            let state = session.credential_state();
            message_handler.print(&format!("Credential: {}", state));
            match session.credentials().client_secret_path() {
                Some(path) => {
                    message_handler.print(&format!("Credentials file: {}", path.display()))
                }
                None => message_handler.print("Credentials file: not selected"),
            }
        }
        Commands::Logout => {
            session.sign_out().await?;
            message_handler.print("Signed out.");
        }
    }

    Ok(())
}

fn print_listing(listing: &FileListing, message_handler: &dyn MessageHandler) {
    if listing.is_empty() {
        message_handler.print("No files found.");
        return;
    }

    message_handler.print("Files:");
    for row in listing.rows() {
        message_handler.print(&row.to_string());
    }
    if listing.has_more {
        message_handler.print(&format!(
            "(showing the first {} files)",
            listing.files.len()
        ));
    }
}
