use clap::Parser;
use drive_manager::{Application, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = Application::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
