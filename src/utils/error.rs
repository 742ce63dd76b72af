use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("{entity} '{name}' not found")]
    NotFound { entity: String, name: String },

    #[error("subdomain '{name}' not found or already {state}")]
    NoStateChange { name: String, state: String },

    #[error("TLS check failed for: {}", names.join(", "))]
    ValidationError { names: Vec<String> },

    #[error("'{name}' already exists under domain '{domain}'")]
    Duplicate { domain: String, name: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("Probe of {host} failed: {reason}")]
    ProbeError { host: String, reason: String },

    #[error("Notification error: {message}")]
    NotificationError { message: String },

    #[error("External source error: {message}")]
    SourceError { message: String },

    #[error("Usage: {usage}")]
    UsageError { usage: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML rendering error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Persistence,
    Network,
    Configuration,
    Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MonitorError {
    pub fn not_found(entity: &str, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            name: name.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError {
            message: message.into(),
        }
    }

    pub fn probe(host: &str, reason: impl std::fmt::Display) -> Self {
        Self::ProbeError {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn usage(usage: impl Into<String>) -> Self {
        Self::UsageError {
            usage: usage.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::NoStateChange { .. } => ErrorCategory::NotFound,
            Self::ValidationError { .. } | Self::Duplicate { .. } | Self::InvalidValue { .. } => {
                ErrorCategory::Validation
            }
            Self::PersistenceError { .. }
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::YamlError(_) => ErrorCategory::Persistence,
            Self::ProbeError { .. }
            | Self::NotificationError { .. }
            | Self::SourceError { .. }
            | Self::ApiError(_) => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::UsageError { .. } => ErrorCategory::Usage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Usage => ErrorSeverity::Low,
            ErrorCategory::Validation | ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Persistence => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// 給聊天室/終端使用者看的訊息，不洩漏儲存層細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::NotFound { entity, name } => format!("未找到 {} '{}' 的訊息。", entity, name),
            Self::NoStateChange { name, state } => {
                format!("未找到指定的 subdomain '{}' 或已 {}", name, state)
            }
            Self::ValidationError { names } => format!(
                "以下 domain 證書檢查失敗，請檢查輸入是否正確：{}",
                names.join(", ")
            ),
            Self::Duplicate { domain, name } => {
                format!("subdomain '{}' 已存在於 domain '{}' 下。", name, domain)
            }
            Self::InvalidValue { field, value, reason } => {
                format!("輸入的 {} 不正確 ('{}')：{}", field, value, reason)
            }
            Self::UsageError { usage } => format!("使用方式不正確。請按照以下格式輸入：\n{}", usage),
            Self::PersistenceError { .. }
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::YamlError(_) => "資料存取失敗，請稍後再試。".to_string(),
            Self::ProbeError { host, .. } => format!("無法取得 {} 的 SSL 證書資訊。", host),
            Self::NotificationError { .. } => "通知發送失敗。".to_string(),
            Self::SourceError { .. } | Self::ApiError(_) => "外部服務請求失敗。".to_string(),
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::ConfigValidationError { .. } => format!("設定錯誤：{}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotFound => "Check the name with /get_all or /get_subdomain",
            ErrorCategory::Validation => {
                "Make sure the host resolves and serves TLS on port 443, then retry"
            }
            ErrorCategory::Persistence => "Check the storage path permissions and free disk space",
            ErrorCategory::Network => "Check network connectivity and external API credentials",
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
            ErrorCategory::Usage => "Send /help to list the available commands",
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
