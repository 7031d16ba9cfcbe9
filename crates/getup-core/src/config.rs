//! GetUp notifier configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GetUpError, Result};

/// Environment variable that overrides `push.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "GETUP_FCM_ACCESS_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl NotifierConfig {
    /// Load config from the default path (~/.getup/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default().with_env_overrides())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GetUpError::Config(format!("Failed to read config: {e}")))?;
        tracing::debug!("⚙️ Loaded config from {}", path.display());
        Self::parse(&content)
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| GetUpError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
            && !token.is_empty()
        {
            self.push.access_token = token;
        }
        self
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the GetUp home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".getup")
    }
}

/// What happens to a pending job when its task is written again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPolicy {
    /// Every qualifying write schedules its own job; earlier jobs still fire.
    #[default]
    Independent,
    /// A new write replaces the task's pending job, and an ineligible write
    /// (delete, timer cleared, past date) cancels it.
    ReplacePerTask,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub policy: JobPolicy,
}

/// Push service configuration (FCM HTTP v1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// API base URL; requests go to `{endpoint}/v1/projects/{project_id}/messages:send`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub project_id: String,
    /// OAuth2 bearer token for the messaging scope.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Log pushes instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_endpoint() -> String { "https://fcm.googleapis.com".into() }
fn default_timeout_secs() -> u64 { 10 }

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            project_id: String::new(),
            access_token: String::new(),
            timeout_secs: default_timeout_secs(),
            dry_run: false,
        }
    }
}

impl PushConfig {
    /// Whether real delivery can be attempted.
    pub fn is_configured(&self) -> bool {
        !self.dry_run
            && !self.endpoint.is_empty()
            && !self.project_id.is_empty()
            && !self.access_token.is_empty()
    }

    /// Full `messages:send` URL.
    pub fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint.trim_end_matches('/'),
            self.project_id
        )
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String { "~/.getup/data".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StoreConfig {
    /// `data_dir` with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }
}

/// Delivery priority of a due-task push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPriority {
    Normal,
    #[default]
    High,
}

impl NotifyPriority {
    /// Value of the `apns-priority` header.
    pub fn apns_value(&self) -> &'static str {
        match self {
            NotifyPriority::Normal => "5",
            NotifyPriority::High => "10",
        }
    }
}

/// Notification text and APNs options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,
    #[serde(default = "default_body")]
    pub default_body: String,
    #[serde(default = "default_alert_title_prefix")]
    pub alert_title_prefix: String,
    #[serde(default = "default_alert_body")]
    pub alert_default_body: String,
    #[serde(default = "default_sound")]
    pub sound: String,
    #[serde(default = "default_badge")]
    pub badge: u32,
    #[serde(default)]
    pub priority: NotifyPriority,
}

fn default_title_prefix() -> String { "Task due: ".into() }
fn default_body() -> String { "It's time to GET UP!!".into() }
fn default_alert_title_prefix() -> String { "Reminder: ".into() }
fn default_alert_body() -> String { "You have a task coming up.".into() }
fn default_sound() -> String { "default".into() }
fn default_badge() -> u32 { 1 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title_prefix: default_title_prefix(),
            default_body: default_body(),
            alert_title_prefix: default_alert_title_prefix(),
            alert_default_body: default_alert_body(),
            sound: default_sound(),
            badge: default_badge(),
            priority: NotifyPriority::default(),
        }
    }
}
