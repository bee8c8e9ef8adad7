//! Configuration types.
//!
//! One YAML document describes the whole run. Each stage reads its own
//! typed section; everything is validated once in [`AppConfig::load`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Default configuration location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./NavReporter/config.yaml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "NAV_REPORT_CONFIG";

/// Root configuration document.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub calendar: CalendarConfig,
    pub mailbox: MailboxConfig,
    pub paths: PathsConfig,
    pub products: Vec<ProductConfig>,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub report: ReportConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Trading calendar source.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// CSV file with a `tradedate` column (yyyymmdd).
    pub file: PathBuf,
    /// Overrides the system date, for reruns of a past day.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Inbound mailbox (POP3) settings.
#[derive(Debug, Deserialize)]
pub struct MailboxConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_true")]
    pub tls: bool,
    pub user: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Acceptable sender identifiers, substring-matched against `From`.
    pub senders: Vec<String>,
}

impl MailboxConfig {
    /// Configured port, or the POP3 default for the chosen transport.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(if self.tls { 995 } else { 110 })
    }
}

/// Working directories.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Where attachments are saved.
    pub download_dir: PathBuf,
    /// Where data files are read from; defaults to `download_dir`.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
}

impl PathsConfig {
    pub fn input_dir(&self) -> &Path {
        self.input_dir.as_deref().unwrap_or(&self.download_dir)
    }
}

/// Date rendering rule used in data file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "yyyymmdd")]
    Compact,
    #[serde(rename = "yyyy-mm-dd")]
    Dashed,
}

impl DateFormat {
    pub fn render(self, date: NaiveDate) -> String {
        match self {
            DateFormat::Compact => date.format("%Y%m%d").to_string(),
            DateFormat::Dashed => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFormat::Compact => write!(f, "yyyymmdd"),
            DateFormat::Dashed => write!(f, "yyyy-mm-dd"),
        }
    }
}

/// One reported product and the data file it comes from.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    /// Product name as it appears in the report template.
    pub name: String,
    pub file_prefix: String,
    pub date_format: DateFormat,
    #[serde(default = "default_extension")]
    pub extension: String,
    pub unit_nav_label: String,
    pub accum_return_label: String,
    pub total_nav_label: String,
}

impl ProductConfig {
    /// Data file name expected for `date`, e.g. `FundA20190918.xls`.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}{}.{}",
            self.file_prefix,
            self.date_format.render(date),
            self.extension
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Header whose column holds the total NAV figure.
    #[serde(default = "default_market_value_label")]
    pub market_value_label: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            market_value_label: default_market_value_label(),
        }
    }
}

/// Report template settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub template: PathBuf,
    #[serde(default = "default_unit_nav_item")]
    pub unit_nav_item: String,
    #[serde(default = "default_total_nav_item")]
    pub total_nav_item: String,
    #[serde(default = "default_accum_return_item")]
    pub accum_return_item: String,
    /// Columns between a product name and its return cell.
    #[serde(default = "default_return_column_offset")]
    pub return_column_offset: u32,
}

/// SMTP transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    None,
    StartTls,
    Tls,
}

/// Outbound mail settings.
#[derive(Debug, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_smtp_security")]
    pub security: SmtpSecurity,
    pub user: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Sender address; defaults to `user`.
    #[serde(default)]
    pub from: Option<String>,
    pub report_recipients: Vec<String>,
    pub error_recipients: Vec<String>,
}

impl SmtpConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.security {
            SmtpSecurity::None => 25,
            SmtpSecurity::StartTls => 587,
            SmtpSecurity::Tls => 465,
        })
    }

    pub fn from_address(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.user)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the daily rolling log file; stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    "xls".to_string()
}

fn default_market_value_label() -> String {
    "市值".to_string()
}

fn default_unit_nav_item() -> String {
    "单位净值".to_string()
}

fn default_total_nav_item() -> String {
    "规模".to_string()
}

fn default_accum_return_item() -> String {
    "收益率".to_string()
}

fn default_return_column_offset() -> u32 {
    2
}

fn default_smtp_security() -> SmtpSecurity {
    SmtpSecurity::None
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Resolve the configuration path from the environment.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), products = config.products.len(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
                path: PathBuf::new(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.products.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "products".into(),
                hint: "List at least one product with its data file prefix.".into(),
            });
        }

        let mut names = HashSet::new();
        for (i, product) in self.products.iter().enumerate() {
            let key = |field: &str| format!("products[{i}].{field}");
            for (field, value) in [
                ("name", &product.name),
                ("file_prefix", &product.file_prefix),
                ("extension", &product.extension),
                ("unit_nav_label", &product.unit_nav_label),
                ("accum_return_label", &product.accum_return_label),
                ("total_nav_label", &product.total_nav_label),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: key(field),
                        message: "must not be empty".into(),
                    });
                }
            }
            if product.file_prefix.contains(['/', '\\'])
                || product.extension.contains(['/', '\\', '.'])
            {
                return Err(ConfigError::InvalidValue {
                    key: key("file_prefix/extension"),
                    message: "file names must not contain path separators".into(),
                });
            }
            if !names.insert(product.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: key("name"),
                    message: format!("duplicate product '{}'", product.name),
                });
            }
        }

        if self.mailbox.senders.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                key: "mailbox.senders".into(),
                hint: "Name at least one data provider sender.".into(),
            });
        }
        if self.smtp.report_recipients.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "smtp.report_recipients".into(),
                hint: "The report needs at least one recipient.".into(),
            });
        }
        if self.smtp.error_recipients.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "smtp.error_recipients".into(),
                hint: "Error notifications need at least one recipient.".into(),
            });
        }
        if self.report.return_column_offset == 0 {
            return Err(ConfigError::InvalidValue {
                key: "report.return_column_offset".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.extraction.market_value_label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "extraction.market_value_label".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
