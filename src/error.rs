//! Error types for the NAV report pipeline.

use std::path::PathBuf;

use chrono::NaiveDate;

/// Top-level error type for one report run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Fallback error: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Trading calendar errors.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("Cannot read calendar file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Invalid trade date '{value}' in calendar (expected yyyymmdd)")]
    InvalidDate { value: String },

    #[error("Calendar {path} contains no trading dates")]
    Empty { path: PathBuf },

    #[error("No previous trading day for {date}")]
    NoPreviousTradingDay { date: NaiveDate },
}

/// Mailbox session errors.
///
/// Only `connect`/`list`/`close` failures escape the scan; per-message
/// failures are counted and skipped by the matcher.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Cannot connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Mailbox authentication failed for {user}")]
    AuthFailed { user: String },

    #[error("Mailbox protocol error: {0}")]
    Protocol(String),

    #[error("Mailbox holds no copy of required data files: {missing}")]
    Incomplete { missing: String },

    #[error("Message {id} could not be parsed")]
    Unparsable { id: u32 },

    #[error("Cannot save attachment {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stale-file fallback errors.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("No product is configured for data file {name}")]
    UnknownProduct { name: String },

    #[error("Fallback source {path} does not exist")]
    MissingFallbackSource { path: PathBuf },

    #[error("Fallback source {path} failed integrity check: {reason}")]
    CorruptFallbackSource { path: PathBuf, reason: String },

    #[error("Cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source workbook extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Cannot open data file {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Data file {path} has no worksheet")]
    NoWorksheet { path: PathBuf },

    #[error("Label '{label}' for {metric} not found in data file of {product}")]
    LabelNotFound {
        product: String,
        metric: String,
        label: String,
    },

    #[error("No number in '{text}' for {metric} of {product}")]
    NumberNotFound {
        product: String,
        metric: String,
        text: String,
    },
}

/// Report template errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Cannot open report template {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Report template {path} has no worksheet")]
    NoWorksheet { path: PathBuf },

    #[error("Anchor not found ({stage}): '{anchor}'")]
    AnchorNotFound { stage: String, anchor: String },

    #[error("Product '{product}' found {offset} rows past its section, likely another section")]
    AmbiguousMatch { product: String, offset: u32 },

    #[error("No extracted value for {metric} of {product}")]
    MissingValue { product: String, metric: String },

    #[error("Cannot save report template {path}: {reason}")]
    Save { path: PathBuf, reason: String },
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
