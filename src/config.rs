//! Quarantine bot configuration
//!
//! TOML file holding everything the operator controls: quarantine timing,
//! which groups are gated, operator ids, message templates, platform endpoint,
//! HTTP bind address, database path and logging.
//!
//! Durations are human-readable strings ("15days", "5s") parsed with humantime.

use crate::gateway::{GroupId, MemberId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_BAN_DURATION: Duration = Duration::from_secs(15 * 24 * 60 * 60);
const DEFAULT_WAIT_DURATION: Duration = Duration::from_secs(3 * 24 * 60 * 60);
const DEFAULT_SWEEP_PACING: Duration = Duration::from_secs(5);

/// Platform mutes have one-second resolution.
const MIN_BAN_DURATION: Duration = Duration::from_secs(1);

/// Unlock ids must be strictly greater than this.
pub const DEFAULT_MIN_MEMBER_ID: u64 = 10_000;

const DEFAULT_WELCOME: &str =
    "欢迎小伙伴入群~请认真阅读群公告，阅读后点击公告中的「参与讨论」即可解禁哦~";
const DEFAULT_BAN_REMINDER: &str =
    "小伙伴你好~提问和发言前请先看群公告哦~不看群公告就发言会导致你被踢出本群，还请注意~";
const DEFAULT_UNBAN_CONFIRMATION: &str =
    "已成功解禁，小伙伴现在可以开始参与交流了~聊天时注意热情、友善哦~";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config file '{path}': {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Full bot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarantineConfig {
    #[serde(default)]
    pub verify: VerifySettings,

    #[serde(default)]
    pub groups: GroupPolicy,

    #[serde(default)]
    pub messages: MessageTemplates,

    #[serde(default)]
    pub onebot: OneBotConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quarantine timing, unlock paths and operator authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySettings {
    /// Mute applied on join and on manual ban
    #[serde(default = "default_ban_duration", with = "humantime_duration")]
    pub ban_duration: Duration,

    /// Grace period before a quarantined member is swept
    #[serde(default = "default_wait_duration", with = "humantime_duration")]
    pub wait_duration: Duration,

    /// Delay before each removal in a confirmed sweep
    #[serde(default = "default_sweep_pacing", with = "humantime_duration")]
    pub sweep_pacing: Duration,

    /// Unlock requests must name an id strictly above this
    #[serde(default = "default_min_member_id")]
    pub min_member_id: u64,

    /// Accept self-unlock over `GET /unban`
    #[serde(default = "default_true")]
    pub allow_http: bool,

    /// Accept self-unlock over the in-process signal
    #[serde(default = "default_true")]
    pub allow_event: bool,

    /// Members allowed to run operator commands
    #[serde(default)]
    pub operators: Vec<MemberId>,
}

/// Which groups quarantine new members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    /// Every group
    #[default]
    All,
    /// Only listed groups
    Allow,
    /// Every group except listed ones
    Deny,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPolicy {
    #[serde(default)]
    pub mode: GroupMode,

    #[serde(default)]
    pub list: Vec<GroupId>,
}

impl GroupPolicy {
    /// Whether joining `group` puts the member in quarantine
    pub fn quarantines(&self, group: GroupId) -> bool {
        match self.mode {
            GroupMode::All => true,
            GroupMode::Allow => self.list.contains(&group),
            GroupMode::Deny => !self.list.contains(&group),
        }
    }
}

/// Opaque notice texts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplates {
    /// Sent to a member quarantined on join
    #[serde(default = "default_welcome")]
    pub welcome: String,

    /// Rule reminder sent after a manual ban
    #[serde(default = "default_ban_reminder")]
    pub ban: String,

    /// Confirmation sent after a self-unlock
    #[serde(default = "default_unban_confirmation")]
    pub unban: String,
}

/// OneBot HTTP API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    pub access_token: Option<String>,

    /// Shared secret for `X-Signature` on the event webhook. The webhook is
    /// not served without it.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_ban_duration() -> Duration {
    DEFAULT_BAN_DURATION
}

fn default_wait_duration() -> Duration {
    DEFAULT_WAIT_DURATION
}

fn default_sweep_pacing() -> Duration {
    DEFAULT_SWEEP_PACING
}

fn default_min_member_id() -> u64 {
    DEFAULT_MIN_MEMBER_ID
}

fn default_true() -> bool {
    true
}

fn default_welcome() -> String {
    DEFAULT_WELCOME.to_string()
}

fn default_ban_reminder() -> String {
    DEFAULT_BAN_REMINDER.to_string()
}

fn default_unban_confirmation() -> String {
    DEFAULT_UNBAN_CONFIRMATION.to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:5700".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("quarantine.db")
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            ban_duration: DEFAULT_BAN_DURATION,
            wait_duration: DEFAULT_WAIT_DURATION,
            sweep_pacing: DEFAULT_SWEEP_PACING,
            min_member_id: DEFAULT_MIN_MEMBER_ID,
            allow_http: true,
            allow_event: true,
            operators: Vec::new(),
        }
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            ban: default_ban_reminder(),
            unban: default_unban_confirmation(),
        }
    }
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            access_token: None,
            secret: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl QuarantineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Reject values the platform cannot honor.
    ///
    /// Mutes are applied in whole seconds, so a ban shorter than one second
    /// would lift the mute while the record still says quarantined.
    pub fn validate(&self) -> Result<(), String> {
        if self.verify.ban_duration < MIN_BAN_DURATION {
            return Err(format!(
                "ban_duration must be at least {}, got {}",
                humantime::format_duration(MIN_BAN_DURATION),
                humantime::format_duration(self.verify.ban_duration)
            ));
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(database: &Path) -> String {
        format!(
            r#"# Quarantine Bot Configuration
#
# New members are muted on join until they open the self-unlock link.
# Members still muted after `wait_duration` are removed by `/verify clean -y`.

[verify]
# Mute applied on join and by /verify ban
ban_duration = "15days"

# Grace period before a quarantined member can be swept
wait_duration = "3days"

# Delay before each removal during a confirmed sweep (platform rate limits)
sweep_pacing = "5s"

# Self-unlock ids must be strictly greater than this
min_member_id = 10000

# Self-unlock paths
allow_http = true
allow_event = true

# Members allowed to run /verify ban, /verify unban and /verify clean
operators = []

[groups]
# all: every group, allow: only listed groups, deny: all but listed groups
mode = "all"
list = []

[messages]
welcome = "{welcome}"
ban = "{ban}"
unban = "{unban}"

[onebot]
# OneBot v11 HTTP API
api_url = "http://127.0.0.1:5700"
# access_token = "..."
# Secret shared with the OneBot implementation; events posted to /onebot
# must be signed with it (X-Signature). Leave unset to disable the webhook.
# secret = "..."

[http]
# Serves GET /unban?qq=<id> and the POST /onebot event webhook
bind = "127.0.0.1:8080"

[storage]
database = "{database}"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/quarantine/quarantine.log"
"#,
            welcome = DEFAULT_WELCOME,
            ban = DEFAULT_BAN_REMINDER,
            unban = DEFAULT_UNBAN_CONFIRMATION,
            database = database.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path, database: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml(database))
    }

    /// Whether `member` may run operator commands
    pub fn is_operator(&self, member: MemberId) -> bool {
        self.verify.operators.contains(&member)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Default data directory (`~/.local/share/quarantine` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quarantine")
}

/// Default config file path, next to the database
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("Invalid duration '{}': {}", raw, e)))
    }
}
