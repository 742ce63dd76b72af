use crate::core::expiry::{ExpiryPolicy, DEFAULT_THRESHOLD_DAYS};
use crate::core::scheduler::{Schedule, ScheduleTimezone};
use crate::core::sweep::{DEFAULT_SOURCE_TAG, DEFAULT_SWEEP_CONCURRENCY};
use crate::utils::error::{MonitorError, Result};
use crate::utils::validation::{
    validate_positive_number, validate_range, validate_required_field, validate_trigger_time,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub notification: NotificationConfig,
    pub schedule: ScheduleConfig,
    pub probe: ProbeConfig,
    pub expiry: ExpiryConfig,
    pub cloudflare: Option<CloudflareConfig>,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `domains/<domain>.json` 所在的根目錄
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Telegram,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub kind: NotifierKind,
    /// 未設定時使用 `telegram.group_id`
    pub destination: Option<String>,
    pub source_tag: String,
    pub webhook_url: Option<String>,
    pub webhook_username: Option<String>,
    pub webhook_password: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Telegram,
            destination: None,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            webhook_url: None,
            webhook_username: None,
            webhook_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 每日觸發時間 `HH:MM`
    pub trigger_time: String,
    pub timezone: ScheduleTimezoneConfig,
    /// 設定後改為固定間隔執行
    pub interval_minutes: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            trigger_time: "09:00".to_string(),
            timezone: ScheduleTimezoneConfig::Utc,
            interval_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleTimezoneConfig {
    #[default]
    Utc,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_seconds: u64,
    pub port: u16,
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 3,
            port: 443,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    pub threshold_days: i64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareConfig {
    pub email: String,
    pub api_key: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub group_id: String,
    pub api_base: Option<String>,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MonitorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MonitorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MonitorError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 用行程環境變數覆寫檔案中的值
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup("SSL_MONITOR_STORAGE_PATH") {
            self.storage.path = path;
        }

        let token = lookup("TELEGRAM_BOT_TOKEN");
        let group_id = lookup("TELEGRAM_GROUP_ID");
        if token.is_some() || group_id.is_some() {
            let telegram = self.telegram.get_or_insert_with(TelegramConfig::default);
            if let Some(token) = token {
                telegram.bot_token = token;
            }
            if let Some(group_id) = group_id {
                telegram.group_id = group_id;
            }
        }

        let email = lookup("CLOUDFLARE_EMAIL");
        let api_key = lookup("CLOUDFLARE_API_KEY");
        if email.is_some() || api_key.is_some() {
            let cloudflare = self.cloudflare.get_or_insert_with(CloudflareConfig::default);
            if let Some(email) = email {
                cloudflare.email = email;
            }
            if let Some(api_key) = api_key {
                cloudflare.api_key = api_key;
            }
        }
    }

    pub fn schedule(&self) -> Result<Schedule> {
        if let Some(minutes) = self.schedule.interval_minutes {
            return Ok(Schedule::Interval(Duration::from_secs(minutes * 60)));
        }

        let at = validate_trigger_time("schedule.trigger_time", &self.schedule.trigger_time)?;
        let timezone = match self.schedule.timezone {
            ScheduleTimezoneConfig::Utc => ScheduleTimezone::Utc,
            ScheduleTimezoneConfig::Local => ScheduleTimezone::Local,
        };
        Ok(Schedule::Daily { at, timezone })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_seconds)
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::new(self.expiry.threshold_days)
    }

    /// 通知目的地：明確設定優先，否則為 Telegram 群組
    pub fn destination(&self) -> Result<String> {
        if let Some(destination) = &self.notification.destination {
            return Ok(destination.clone());
        }
        self.telegram
            .as_ref()
            .map(|t| t.group_id.clone())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MonitorError::MissingConfigError {
                field: "notification.destination or telegram.group_id".to_string(),
            })
    }

    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_path("storage.path", &self.storage.path)?;

        validate_range("probe.timeout_seconds", self.probe.timeout_seconds, 1, 60)?;
        validate_range("probe.port", self.probe.port, 1, u16::MAX)?;
        validate_positive_number("probe.concurrency", self.probe.concurrency, 1)?;
        validate_range("expiry.threshold_days", self.expiry.threshold_days, 0, 365)?;

        match self.schedule.interval_minutes {
            Some(minutes) => validate_range("schedule.interval_minutes", minutes, 1, 7 * 24 * 60)?,
            None => {
                validate_trigger_time("schedule.trigger_time", &self.schedule.trigger_time)?;
            }
        }

        match self.notification.kind {
            NotifierKind::Telegram => {
                let telegram = validate_required_field("telegram", &self.telegram)?;
                if telegram.bot_token.trim().is_empty() {
                    return Err(MonitorError::MissingConfigError {
                        field: "telegram.bot_token".to_string(),
                    });
                }
            }
            NotifierKind::Webhook => {
                let url = validate_required_field("notification.webhook_url", &self.notification.webhook_url)?;
                validate_url("notification.webhook_url", url)?;
            }
        }
        self.destination()?;

        if let Some(api_base) = self.telegram.as_ref().and_then(|t| t.api_base.as_ref()) {
            validate_url("telegram.api_base", api_base)?;
        }
        if let Some(cloudflare) = &self.cloudflare {
            if let Some(api_base) = &cloudflare.api_base {
                validate_url("cloudflare.api_base", api_base)?;
            }
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
