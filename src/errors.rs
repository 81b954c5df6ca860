use thiserror::Error;

/// アプリケーション全体のエラー型
#[derive(Error, Debug)]
pub enum AppError {
    /// 認証関連エラー
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// 転送（一覧・アップロード・ダウンロード）関連エラー
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// 設定関連エラー
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 汎用エラー
    #[error("{message}")]
    Generic { message: String },
}

/// 認証関連エラー
#[derive(Error, Debug)]
pub enum AuthError {
    /// クライアントシークレットのファイルが未選択
    #[error("No credentials file selected. Select the OAuth client JSON before signing in.")]
    MissingClientSecret,

    /// クライアントシークレットのファイルが読めない、または形式が不正
    #[error("Invalid credentials file {path}: {reason}")]
    InvalidClientSecret { path: String, reason: String },

    /// 同意画面で拒否された、またはコールバックにエラーが返された
    #[error("Authorization was denied: {reason}")]
    ConsentDenied { reason: String },

    /// コールバックの state がこのフローのものと一致しない
    #[error("OAuth state mismatch on callback")]
    StateMismatch,

    /// トークンエンドポイントがOAuthエラーを返した
    #[error("OAuth error: {code} - {}", description.as_deref().unwrap_or("no description"))]
    OAuthError {
        code: String,
        description: Option<String>,
    },

    /// リフレッシュトークンが無い、または拒否された
    #[error("Token refresh rejected: {reason}")]
    RefreshRejected { reason: String },

    /// 必要なスコープを含まないトークンが発行された
    #[error("Credential does not grant the required scope {required}")]
    InsufficientScope { required: String },

    /// 保存済みトークンのパースに失敗
    #[error("Stored credential is unreadable: {reason}")]
    CorruptCredential { reason: String },

    /// HTTPリクエストエラー
    #[error("Request error: {source}")]
    RequestError {
        #[source]
        source: reqwest::Error,
    },

    /// JSONパースエラー
    #[error("JSON parsing error: {source}")]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    /// トークンファイルやコールバック待ち受けのI/Oエラー
    #[error("I/O error: {source}")]
    IoError {
        #[source]
        source: std::io::Error,
    },

    /// 汎用認証エラー
    #[error("{reason}")]
    Generic { reason: String },
}

/// エクスポート先の形式が定義されていないネイティブドキュメント
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("File type '{mime_type}' is not exportable.")]
pub struct UnsupportedExportError {
    pub mime_type: String,
}

/// 転送関連エラー
#[derive(Error, Debug)]
pub enum TransferError {
    /// HTTPリクエストエラー
    #[error("HTTP request failed: {source}")]
    RequestError {
        #[source]
        source: reqwest::Error,
    },

    /// ローカルファイルのI/Oエラー
    #[error("I/O error: {source}")]
    IoError {
        #[source]
        source: std::io::Error,
    },

    /// レスポンスのパースエラー
    #[error("Response parsing failed: {source}")]
    ParseError {
        #[source]
        source: serde_json::Error,
    },

    /// Drive APIがエラーステータスを返した
    #[error("Drive API error: {status} {message}")]
    ApiError { status: u16, message: String },

    /// エクスポートできないネイティブドキュメント
    #[error(transparent)]
    UnsupportedExport(#[from] UnsupportedExportError),

    /// 汎用転送エラー
    #[error("{message}")]
    Generic { message: String },
}

/// 設定関連エラー
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 設定ファイル読み込みエラー
    #[error("Failed to load config file: {source}")]
    LoadError {
        #[source]
        source: std::io::Error,
    },

    /// 設定ファイルパースエラー
    #[error("Failed to parse config file: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    /// 設定値バリデーションエラー
    #[error("Configuration validation failed: {reason}")]
    ValidationError { reason: String },
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        AuthError::RequestError { source: error }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::JsonError { source: error }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        AuthError::IoError { source: error }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(error: reqwest::Error) -> Self {
        TransferError::RequestError { source: error }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(error: std::io::Error) -> Self {
        TransferError::IoError { source: error }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(error: serde_json::Error) -> Self {
        TransferError::ParseError { source: error }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::LoadError { source: error }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError { source: error }
    }
}

impl AuthError {
    /// リフレッシュトークン自体が拒否されたか（通信失敗とは区別する）
    pub fn is_refresh_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshRejected { .. } | AuthError::OAuthError { .. }
        )
    }
}
