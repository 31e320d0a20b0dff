//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Placeholder shipped in the default config for values the user must fill.
pub const PLACEHOLDER: &str = "fill_me_in";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where and how the index is scraped
    #[serde(default)]
    pub source: SourceConfig,

    /// How many items to deliver per run
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Digest wording
    #[serde(default)]
    pub digest: DigestConfig,

    /// Mail transport settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Persisted state location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Render as TOML, e.g. to seed a fresh config file.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.validate_source()?;
        self.validate_mail()
    }

    /// Validate what a catalog sync needs.
    pub fn validate_source(&self) -> Result<()> {
        let source = &self.source;
        if source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if source.page_size == 0 {
            return Err(AppError::validation("source.page_size must be > 0"));
        }
        if !source.range_page.contains("{start}") || !source.range_page.contains("{end}") {
            return Err(AppError::validation(
                "source.range_page must contain {start} and {end}",
            ));
        }
        url::Url::parse(&source.base_url)?;
        if self.selection.batch_size == 0 {
            return Err(AppError::validation("selection.batch_size must be > 0"));
        }
        if self.storage.history_key == self.storage.details_key {
            return Err(AppError::validation(
                "storage.history_key and storage.details_key must differ",
            ));
        }
        Ok(())
    }

    /// Validate what sending a digest needs.
    pub fn validate_mail(&self) -> Result<()> {
        let mail = &self.mail;
        for (field, value) in [("mail.sender", &mail.sender), ("mail.receiver", &mail.receiver)] {
            if value.trim().is_empty() || value == PLACEHOLDER {
                return Err(AppError::validation(format!("{field} is not set")));
            }
        }
        if mail.smtp_host.trim().is_empty() {
            return Err(AppError::validation("mail.smtp_host is empty"));
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BATCH_SIZE") {
            match value.parse() {
                Ok(n) => self.selection.batch_size = n,
                Err(_) => log::warn!("Ignoring invalid BATCH_SIZE: {value}"),
            }
        }
        if let Some(value) = lookup("REQUEST_DELAY_MS") {
            match value.parse() {
                Ok(ms) => self.source.request_delay_ms = ms,
                Err(_) => log::warn!("Ignoring invalid REQUEST_DELAY_MS: {value}"),
            }
        }
        if let Some(value) = lookup("MAIL_SENDER") {
            self.mail.sender = value;
        }
        if let Some(value) = lookup("MAIL_RECEIVER") {
            self.mail.receiver = value;
        }
        if let Some(value) = lookup("SMTP_HOST") {
            self.mail.smtp_host = value;
        }
        if let Some(value) = lookup("S3_BUCKET") {
            self.storage.bucket = value;
        }
        if let Some(value) = lookup("S3_PREFIX") {
            self.storage.prefix = value;
        }
    }
}

/// Index location, HTTP behaviour and table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL the page names are joined onto
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Page listing the newest items
    #[serde(default = "defaults::latest_page")]
    pub latest_page: String,

    /// Archive page name template with `{start}` and `{end}` placeholders
    #[serde(default = "defaults::range_page")]
    pub range_page: String,

    /// Number of ids covered by one archive page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Which table columns hold which fields
    #[serde(default)]
    pub columns: ColumnLayout,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            latest_page: defaults::latest_page(),
            range_page: defaults::range_page(),
            page_size: defaults::page_size(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            columns: ColumnLayout::default(),
        }
    }
}

impl SourceConfig {
    /// Archive page name covering ids `start..=end`.
    pub fn range_page_name(&self, start: u32, end: u32) -> String {
        self.range_page
            .replace("{start}", &start.to_string())
            .replace("{end}", &end.to_string())
    }
}

/// Zero-based column positions within an index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Column holding the locator; the id is its first integer
    #[serde(default = "defaults::id_column")]
    pub id: usize,

    #[serde(default = "defaults::title_column")]
    pub title: usize,

    #[serde(default = "defaults::date_column")]
    pub date: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            id: defaults::id_column(),
            title: defaults::title_column(),
            date: defaults::date_column(),
        }
    }
}

impl ColumnLayout {
    /// Minimum number of cells a row needs.
    pub fn width(&self) -> usize {
        self.id.max(self.title).max(self.date) + 1
    }
}

/// Selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Items delivered per run
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
        }
    }
}

/// Where the "you are up to date" notice goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticePlacement {
    /// Repeat the notice under every item
    #[default]
    PerItem,
    /// Emit the notice once after the last item
    Once,
}

/// Digest wording.
///
/// Supported placeholders: `{date}` in `subject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "defaults::subject")]
    pub subject: String,

    #[serde(default = "defaults::heading")]
    pub heading: String,

    /// Label prefixed to each item, e.g. "Comic 1: ..."
    #[serde(default = "defaults::item_label")]
    pub item_label: String,

    #[serde(default = "defaults::caught_up_message")]
    pub caught_up_message: String,

    #[serde(default)]
    pub caught_up_notice: NoticePlacement,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            subject: defaults::subject(),
            heading: defaults::heading(),
            item_label: defaults::item_label(),
            caught_up_message: defaults::caught_up_message(),
            caught_up_notice: NoticePlacement::default(),
        }
    }
}

/// SMTP settings. The password is read from `password_env` at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "defaults::placeholder")]
    pub sender: String,

    #[serde(default = "defaults::placeholder")]
    pub receiver: String,

    /// Login name; the sender address when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Environment variable holding the SMTP password
    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    /// Directory used by the outbox mailer
    #[serde(default = "defaults::outbox_dir")]
    pub outbox_dir: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            sender: defaults::placeholder(),
            receiver: defaults::placeholder(),
            username: None,
            password_env: defaults::password_env(),
            outbox_dir: defaults::outbox_dir(),
        }
    }
}

/// Blob keys and backend locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key of the read-state ledger blob
    #[serde(default = "defaults::history_key")]
    pub history_key: String,

    /// Key of the catalog blob
    #[serde(default = "defaults::details_key")]
    pub details_key: String,

    /// S3 bucket (s3 feature only)
    #[serde(default = "defaults::bucket")]
    pub bucket: String,

    /// S3 key prefix (s3 feature only)
    #[serde(default = "defaults::prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_key: defaults::history_key(),
            details_key: defaults::details_key(),
            bucket: defaults::bucket(),
            prefix: defaults::prefix(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::PLACEHOLDER;

    // Source defaults
    pub fn base_url() -> String {
        "https://www.explainxkcd.com/wiki/index.php/".into()
    }
    pub fn latest_page() -> String {
        "List_of_all_comics".into()
    }
    pub fn range_page() -> String {
        "List_of_all_comics_({start}-{end})".into()
    }
    pub fn page_size() -> u32 {
        500
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; comic-mailer/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn id_column() -> usize {
        0
    }
    pub fn title_column() -> usize {
        1
    }
    pub fn date_column() -> usize {
        4
    }

    // Selection defaults
    pub fn batch_size() -> usize {
        5
    }

    // Digest defaults
    pub fn subject() -> String {
        "Your XKCD comics for {date}".into()
    }
    pub fn heading() -> String {
        "Your daily XKCD comics are here!".into()
    }
    pub fn item_label() -> String {
        "Comic".into()
    }
    pub fn caught_up_message() -> String {
        "You are now up-to-date on XKCD comics!".into()
    }

    // Mail defaults
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        465
    }
    pub fn placeholder() -> String {
        PLACEHOLDER.into()
    }
    pub fn password_env() -> String {
        "MAILER_PASSWORD".into()
    }
    pub fn outbox_dir() -> String {
        "outbox".into()
    }

    // Storage defaults
    pub fn history_key() -> String {
        "history.json".into()
    }
    pub fn details_key() -> String {
        "details.json".into()
    }
    pub fn bucket() -> String {
        "mailer_storage".into()
    }
    pub fn prefix() -> String {
        "comic-mailer".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
