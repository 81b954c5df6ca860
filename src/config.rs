use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// アップロードのチャンクはこの倍数でなければならない（Drive APIの制約）
pub const UPLOAD_CHUNK_ALIGNMENT: usize = 256 * 1024;

/// リフレッシュマージンの上限（秒）
pub const MAX_REFRESH_MARGIN_SEC: u64 = 3600;

/// 認証設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// トークンファイルのパス（省略可、デフォルト: 設定ディレクトリ下の token.json）
    #[serde(default)]
    pub token_path: Option<String>,

    /// 有効期限のこの秒数前からトークンを期限切れとみなしてリフレッシュする
    #[serde(default = "default_refresh_margin_sec")]
    pub refresh_margin_sec: u64,
}

fn default_refresh_margin_sec() -> u64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path: None,
            refresh_margin_sec: default_refresh_margin_sec(),
        }
    }
}

/// Drive API設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// APIベースURL（省略可、デフォルト: https://www.googleapis.com/drive/v3）
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// アップロード用ベースURL（省略可、デフォルト: https://www.googleapis.com/upload/drive/v3）
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,

    /// 一覧取得時のページサイズ（最初の1ページのみ取得する）
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// レジューム可能アップロードのチャンクサイズ（バイト）
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: usize,
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_upload_base_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_upload_chunk_size() -> usize {
    32 * UPLOAD_CHUNK_ALIGNMENT // 8 MiB
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
            page_size: default_page_size(),
            upload_chunk_size: default_upload_chunk_size(),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// ログレベル（省略可、デフォルト: info）
    #[serde(default = "default_log_level")]
    pub level: String,

    /// ログファイルのパス（省略可、デフォルト: データディレクトリ下の logs/drive-manager.log）
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// 認証設定
    #[serde(default)]
    pub auth: AuthConfig,

    /// Drive API設定
    #[serde(default)]
    pub drive: DriveConfig,

    /// ログ設定
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn log_file_path(&self) -> &Option<String> {
        &self.logging.file_path
    }

    /// 上限を超える値は上限に丸める（validate済みなら発生しない）
    pub fn refresh_margin(&self) -> chrono::Duration {
        let seconds = self.auth.refresh_margin_sec.min(MAX_REFRESH_MARGIN_SEC);
        i64::try_from(seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(chrono::Duration::zero)
    }

    /// トークンファイルのパスを取得
    pub fn token_file_path(&self) -> PathBuf {
        match &self.auth.token_path {
            Some(path) => PathBuf::from(path),
            None => app_config_dir().join("token.json"),
        }
    }

    /// 設定値のバリデーション
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.refresh_margin_sec > MAX_REFRESH_MARGIN_SEC {
            return Err(ConfigError::ValidationError {
                reason: format!(
                    "auth.refresh_margin_sec must be at most {}, got {}",
                    MAX_REFRESH_MARGIN_SEC, self.auth.refresh_margin_sec
                ),
            });
        }

        if self.drive.page_size == 0 || self.drive.page_size > 1000 {
            return Err(ConfigError::ValidationError {
                reason: format!(
                    "drive.page_size must be between 1 and 1000, got {}",
                    self.drive.page_size
                ),
            });
        }

        let chunk = self.drive.upload_chunk_size;
        if chunk == 0 || chunk % UPLOAD_CHUNK_ALIGNMENT != 0 {
            return Err(ConfigError::ValidationError {
                reason: format!(
                    "drive.upload_chunk_size must be a positive multiple of {} bytes, got {}",
                    UPLOAD_CHUNK_ALIGNMENT, chunk
                ),
            });
        }

        for url in [&self.drive.api_base_url, &self.drive.upload_base_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError {
                    reason: format!("URL must start with http:// or https://: {}", url),
                });
            }
        }

        Ok(())
    }
}

/// アプリケーションの設定ディレクトリ
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drive-manager")
}

/// 設定ファイルのパスを取得
pub fn config_file_path() -> PathBuf {
    app_config_dir().join("config.toml")
}

/// 設定ファイルを読み込む
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_file_path())
}

/// 指定パスから設定ファイルを読み込む（存在しない場合はデフォルト設定）
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = if path.exists() {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}
