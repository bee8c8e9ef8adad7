//! Outbound notification: the filled report, or an error notice.
//!
//! Messages are built by plain functions so they can be inspected without
//! a server; [`SmtpNotifier`] only adds the transport.

use std::path::Path;

use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::NotifyError;

const REPORT_BODY: &str = "数据每日汇总";

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";
const OCTET_MIME: &str = "application/octet-stream";

/// Where run results go.
pub trait Notifier {
    /// Send the filled report for `date`.
    fn send_report(&self, date: NaiveDate, report: &Path) -> Result<(), NotifyError>;

    /// Tell operators the run for `date` failed.
    fn send_error(&self, date: NaiveDate, error: &str) -> Result<(), NotifyError>;
}

pub fn report_subject(date: NaiveDate) -> String {
    format!("数据每日汇总-{}", date.format("%Y%m%d"))
}

pub fn error_subject(date: NaiveDate) -> String {
    format!("[错误报告]：每日汇总-{}-出现错误，请检查", date.format("%Y%m%d"))
}

pub fn error_body(error: &str) -> String {
    format!("程序运行出现异常，相关信息:{error}。请检查报告程序")
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn attachment_type(file_name: &str) -> &'static str {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => XLSX_MIME,
        Some(ext) if ext.eq_ignore_ascii_case("xls") => XLS_MIME,
        _ => OCTET_MIME,
    }
}

fn headers(config: &SmtpConfig, recipients: &[String], subject: String) -> Result<lettre::message::MessageBuilder, NotifyError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(config.from_address())?)
        .subject(subject);
    for to in recipients {
        builder = builder.to(parse_mailbox(to)?);
    }
    Ok(builder)
}

/// Report mail: short body plus the workbook as attachment.
pub fn report_message(
    config: &SmtpConfig,
    date: NaiveDate,
    file_name: &str,
    content: Vec<u8>,
) -> Result<Message, NotifyError> {
    let content_type =
        ContentType::parse(attachment_type(file_name)).map_err(|e| NotifyError::Build(e.to_string()))?;
    let attachment = Attachment::new(file_name.to_string()).body(content, content_type);

    headers(config, &config.report_recipients, report_subject(date))?
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(REPORT_BODY.to_string()))
                .singlepart(attachment),
        )
        .map_err(|e| NotifyError::Build(e.to_string()))
}

/// Plain-text error notice.
pub fn error_message(config: &SmtpConfig, date: NaiveDate, error: &str) -> Result<Message, NotifyError> {
    headers(config, &config.error_recipients, error_subject(date))?
        .header(ContentType::TEXT_PLAIN)
        .body(error_body(error))
        .map_err(|e| NotifyError::Build(e.to_string()))
}

// ── SMTP ────────────────────────────────────────────────────────────

/// Sends through the configured SMTP server.
pub struct SmtpNotifier<'a> {
    config: &'a SmtpConfig,
}

impl<'a> SmtpNotifier<'a> {
    pub fn new(config: &'a SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let host = self.config.host.as_str();
        let builder = match self.config.security {
            SmtpSecurity::None => SmtpTransport::builder_dangerous(host),
            SmtpSecurity::StartTls => SmtpTransport::starttls_relay(host)
                .map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?,
            SmtpSecurity::Tls => {
                SmtpTransport::relay(host).map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?
            }
        };
        let creds = Credentials::new(
            self.config.user.clone(),
            self.config.password.expose_secret().to_string(),
        );
        Ok(builder.port(self.config.port()).credentials(creds).build())
    }

    fn deliver(&self, message: &Message) -> Result<(), NotifyError> {
        self.transport()?
            .send(message)
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        Ok(())
    }
}

impl Notifier for SmtpNotifier<'_> {
    fn send_report(&self, date: NaiveDate, report: &Path) -> Result<(), NotifyError> {
        let content = std::fs::read(report).map_err(|source| NotifyError::Attachment {
            path: report.to_path_buf(),
            source,
        })?;
        let file_name = report
            .file_name()
            .map_or_else(|| "report.xlsx".to_string(), |n| n.to_string_lossy().into_owned());

        let message = report_message(self.config, date, &file_name, content)?;
        self.deliver(&message)?;
        tracing::info!(
            recipients = self.config.report_recipients.len(),
            subject = %report_subject(date),
            "Report sent"
        );
        Ok(())
    }

    fn send_error(&self, date: NaiveDate, error: &str) -> Result<(), NotifyError> {
        let message = error_message(self.config, date, error)?;
        self.deliver(&message)?;
        tracing::info!(
            recipients = self.config.error_recipients.len(),
            "Error report sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::config::tests::SAMPLE;
    use mail_parser::{MessageParser, MimeHeaders};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 9, 18).unwrap()
    }

    fn config() -> AppConfig {
        AppConfig::from_yaml(SAMPLE).unwrap()
    }

    // ── Subjects and bodies ─────────────────────────────────────────

    #[test]
    fn subjects_carry_compact_date() {
        assert_eq!(report_subject(date()), "数据每日汇总-20190918");
        assert_eq!(error_subject(date()), "[错误报告]：每日汇总-20190918-出现错误，请检查");
    }

    #[test]
    fn error_body_embeds_message() {
        assert_eq!(
            error_body("missing file"),
            "程序运行出现异常，相关信息:missing file。请检查报告程序"
        );
    }

    // ── Message building ────────────────────────────────────────────

    #[test]
    fn report_message_has_attachment() {
        let config = config();
        let message = report_message(&config.smtp, date(), "report.xlsx", b"PK\x03\x04data".to_vec()).unwrap();

        assert_eq!(message.envelope().to().len(), 1);
        let raw = message.formatted();
        let parsed = MessageParser::default().parse(&raw).unwrap();
        assert_eq!(parsed.subject(), Some("数据每日汇总-20190918"));
        let attachment = parsed.attachments().next().unwrap();
        assert_eq!(attachment.attachment_name(), Some("report.xlsx"));
        assert_eq!(attachment.contents(), b"PK\x03\x04data");
    }

    #[test]
    fn error_message_goes_to_error_recipients() {
        let config = config();
        let message = error_message(&config.smtp, date(), "boom").unwrap();

        let to: Vec<String> = message.envelope().to().iter().map(|a| a.to_string()).collect();
        assert_eq!(to, vec!["ops@example.com".to_string()]);
        let raw = message.formatted();
        let parsed = MessageParser::default().parse(&raw).unwrap();
        assert!(parsed.body_text(0).unwrap().contains("boom"));
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let mut config = config();
        config.smtp.error_recipients = vec!["not an address".into()];
        let err = error_message(&config.smtp, date(), "boom").unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }

    #[test]
    fn attachment_type_follows_extension() {
        assert_eq!(attachment_type("a.XLSX"), XLSX_MIME);
        assert_eq!(attachment_type("a.xls"), XLS_MIME);
        assert_eq!(attachment_type("a"), OCTET_MIME);
    }
}
