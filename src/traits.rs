use crate::config::Config;
use crate::errors::ConfigError;
use std::path::PathBuf;
use std::sync::Arc;

/// Trait for handling process exits, allowing for testable exit behavior
pub trait ExitHandler: Send + Sync {
    fn exit(&self, code: i32);
}

/// Default implementation that calls std::process::exit
pub struct DefaultExitHandler;

impl ExitHandler for DefaultExitHandler {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Trait for handling printing messages to console, allowing for testable output
pub trait MessageHandler: Send + Sync {
    fn print(&self, message: &str);
    fn eprint(&self, message: &str);
}

/// Default implementation that calls println!/eprintln!
pub struct DefaultMessageHandler;

impl MessageHandler for DefaultMessageHandler {
    fn print(&self, message: &str) {
        println!("{}", message);
    }

    fn eprint(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Trait for configuration loading, allowing for testable configuration
pub trait ConfigProvider: Send + Sync {
    fn load_config(&self) -> Result<Config, ConfigError>;
}

/// Loads from `--config` when given, otherwise from the default location
#[derive(Default)]
pub struct DefaultConfigProvider {
    pub path: Option<PathBuf>,
}

impl ConfigProvider for DefaultConfigProvider {
    fn load_config(&self) -> Result<Config, ConfigError> {
        match &self.path {
            Some(path) => crate::config::load_config_from(path),
            None => crate::config::load_config(),
        }
    }
}

/// Shows the consent URL of the interactive authorization flow to the user
pub trait ConsentPresenter: Send + Sync {
    fn present(&self, url: &str);
}

/// Opens the system browser and echoes the URL in case that fails
pub struct BrowserConsentPresenter {
    message_handler: Arc<dyn MessageHandler>,
}

impl BrowserConsentPresenter {
    pub fn new(message_handler: Arc<dyn MessageHandler>) -> Self {
        Self { message_handler }
    }
}

impl ConsentPresenter for BrowserConsentPresenter {
    fn present(&self, url: &str) {
        self.message_handler
            .eprint("Please visit this URL to authorize this application:");
        self.message_handler.eprint(url);

        if let Err(e) = open::that(url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingMessageHandler {
        printed: Mutex<Vec<String>>,
        eprinted: Mutex<Vec<String>>,
    }

    impl MessageHandler for RecordingMessageHandler {
        fn print(&self, message: &str) {
            self.printed.lock().unwrap().push(message.to_string());
        }

        fn eprint(&self, message: &str) {
            self.eprinted.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_default_message_handler() {
        let handler: Box<dyn MessageHandler> = Box::new(DefaultMessageHandler);
        handler.print("Test message");
        handler.eprint("Test error message");
    }

    #[test]
    fn test_mock_exit_handler() {
        struct MockExitHandler {
            code: Mutex<Option<i32>>,
        }

        impl ExitHandler for MockExitHandler {
            fn exit(&self, code: i32) {
                *self.code.lock().unwrap() = Some(code);
            }
        }

        let handler = MockExitHandler {
            code: Mutex::new(None),
        };
        handler.exit(42);
        assert_eq!(*handler.code.lock().unwrap(), Some(42));
    }

    #[test]
    fn test_config_provider_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[drive]\npage_size = 10\n").unwrap();

        let provider = DefaultConfigProvider {
            path: Some(path),
        };
        let config = provider.load_config().unwrap();
        assert_eq!(config.drive.page_size, 10);
    }

    #[test]
    fn test_recording_handler_collects_messages() {
        let handler = RecordingMessageHandler {
            printed: Mutex::new(Vec::new()),
            eprinted: Mutex::new(Vec::new()),
        };
        handler.print("Hello");
        handler.eprint("World");

        assert_eq!(handler.printed.lock().unwrap().as_slice(), ["Hello"]);
        assert_eq!(handler.eprinted.lock().unwrap().as_slice(), ["World"]);
    }
}
