//! End-to-end runs over real workbook files, with an in-memory mailbox and
//! a recording notifier standing in for the network.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use tempfile::TempDir;

use nav_report::config::AppConfig;
use nav_report::error::{MailboxError, NotifyError};
use nav_report::mailbox::{Mailbox, MailboxConnector, MessageId};
use nav_report::notify::Notifier;
use nav_report::pipeline::{Pipeline, RunOutcome};

// ── Fakes ───────────────────────────────────────────────────────────

struct Inbox {
    messages: Vec<Vec<u8>>,
}

impl Mailbox for Inbox {
    fn message_ids(&mut self) -> Result<Vec<MessageId>, MailboxError> {
        Ok((1..=self.messages.len() as MessageId).collect())
    }

    fn fetch_header(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        let raw = self.fetch_message(id)?;
        let end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map_or(raw.len(), |p| p + 2);
        Ok(raw[..end].to_vec())
    }

    fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        self.messages
            .get(id as usize - 1)
            .cloned()
            .ok_or_else(|| MailboxError::Protocol(format!("no message {id}")))
    }

    fn close(&mut self) -> Result<(), MailboxError> {
        Ok(())
    }
}

struct InboxConnector {
    messages: Vec<Vec<u8>>,
}

impl MailboxConnector for InboxConnector {
    fn connect(&self) -> Result<Box<dyn Mailbox>, MailboxError> {
        Ok(Box::new(Inbox {
            messages: self.messages.clone(),
        }))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    reports: RefCell<Vec<(NaiveDate, PathBuf)>>,
    errors: RefCell<Vec<(NaiveDate, String)>>,
}

impl Notifier for RecordingNotifier {
    fn send_report(&self, date: NaiveDate, report: &Path) -> Result<(), NotifyError> {
        self.reports.borrow_mut().push((date, report.to_path_buf()));
        Ok(())
    }

    fn send_error(&self, date: NaiveDate, error: &str) -> Result<(), NotifyError> {
        self.errors.borrow_mut().push((date, error.to_string()));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

const SENDER: &str = "custody@bank.com";

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 9, day).unwrap()
}

fn attachment_mail(from: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    format!(
        "From: Custody <{from}>\r\nTo: nav@example.com\r\nSubject: NAV\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n\
         --XX\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nsee attachment\r\n\
         --XX\r\nContent-Type: application/octet-stream\r\n\
         Content-Transfer-Encoding: base64\r\n\
         Content-Disposition: attachment; filename=\"{file_name}\"\r\n\r\n\
         {}\r\n--XX--\r\n",
        STANDARD.encode(data)
    )
    .into_bytes()
}

fn noise_mail(i: usize) -> Vec<u8> {
    format!(
        "From: news@example.org\r\nTo: nav@example.com\r\nSubject: digest {i}\r\n\r\nhello\r\n"
    )
    .into_bytes()
}

/// Valuation statement in the custodian's layout.
fn statement(unit_nav: &str, accum: &str, total: &str) -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();
    let sheet = book.add_worksheet();
    let unit_line = format!("单位净值: {unit_nav}");
    let rows: [&[&str]; 6] = [
        &["估值表"],
        &[unit_line.as_str()],
        &["科目代码", "科目名称", "市值"],
        &["1002", "银行存款", "5,000.00"],
        &["资产净值", "", total],
        &["累计收益率", accum],
    ];
    for (r, row) in rows.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *text).unwrap();
        }
    }
    book.save_to_buffer().unwrap()
}

/// Report template with three sections; returns the path.
fn template(dir: &Path) -> PathBuf {
    let path = dir.join("report.xlsx");
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_sheet_collection_mut().first_mut().unwrap();
    // (row, col, text) 1-based
    let cells: &[(u32, u32, &str)] = &[
        (1, 1, "一、单位净值"),
        (2, 1, "产品"),
        (2, 3, "9月17日"),
        (2, 4, "9月18日"),
        (3, 1, "FundA"),
        (5, 1, "FundB"),
        (8, 1, "二、规模"),
        (9, 1, "产品"),
        (9, 3, "9月17日"),
        (9, 4, "9月18日"),
        (10, 1, "FundA"),
        (12, 1, "FundB"),
        (15, 1, "三、收益率"),
        (16, 1, "产品"),
        (17, 1, "FundA"),
        (19, 1, "FundB"),
    ];
    for &(row, col, text) in cells {
        sheet.get_cell_mut((col, row)).set_value(text.to_string());
    }
    umya_spreadsheet::writer::xlsx::write(&book, &path).unwrap();
    path
}

fn cell(path: &Path, row: u32, col: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    let sheet = book.get_sheet_collection().first().unwrap();
    sheet
        .get_cell((col, row))
        .map(|c| c.get_value().to_string())
        .unwrap_or_default()
}

/// Numeric cells may come back as numbers, so compare values.
fn number(path: &Path, row: u32, col: u32) -> f64 {
    let text = cell(path, row, col);
    text.parse()
        .unwrap_or_else(|_| panic!("cell ({row}, {col}) is not a number: {text:?}"))
}

fn config(dir: &Path, template: &Path) -> AppConfig {
    std::fs::write(
        dir.join("calendar.csv"),
        "tradedate\n20190916\n20190917\n20190918\n20190919\n20190920\n",
    )
    .unwrap();
    let yaml = format!(
        r#"
calendar:
  file: {calendar}
  today: 2019-09-19
mailbox:
  host: pop.example.com
  user: nav@example.com
  password: secret
  senders: ["{SENDER}"]
paths:
  download_dir: {data}
products:
  - name: FundA
    file_prefix: FundA
    date_format: yyyymmdd
    extension: xlsx
    unit_nav_label: 单位净值
    accum_return_label: 累计收益率
    total_nav_label: 资产净值
  - name: FundB
    file_prefix: FundB
    date_format: yyyymmdd
    extension: xlsx
    unit_nav_label: 单位净值
    accum_return_label: 累计收益率
    total_nav_label: 资产净值
report:
  template: {template}
smtp:
  host: smtp.example.com
  user: nav@example.com
  password: secret
  report_recipients: ["boss@example.com"]
  error_recipients: ["ops@example.com"]
"#,
        calendar = dir.join("calendar.csv").display(),
        data = dir.join("data").display(),
        template = template.display(),
    );
    AppConfig::from_yaml(&yaml).unwrap()
}

// ── Runs ────────────────────────────────────────────────────────────

#[test]
fn full_run_fills_and_sends_report() {
    let dir = TempDir::new().unwrap();
    let template = template(dir.path());
    let config = config(dir.path(), &template);

    let mut messages: Vec<Vec<u8>> = (0..5).map(noise_mail).collect();
    messages.push(attachment_mail(SENDER, "FundB20190918.xlsx", &statement("0.9876", "1.5", "1,200,000.00")));
    messages.push(noise_mail(5));
    messages.push(attachment_mail(SENDER, "FundA20190918.xlsx", &statement("1.2345", "-3.21", "25000.50")));
    messages.push(attachment_mail("spam@elsewhere.com", "FundA20190918.xlsx", b"not a workbook"));
    let connector = InboxConnector { messages };
    let notifier = RecordingNotifier::default();

    let outcome = Pipeline::new(&config, &connector, &notifier).run();

    assert_eq!(
        outcome,
        RunOutcome::Reported {
            date: d(18),
            fallback_used: false
        }
    );
    // Unit NAV and scale go under the 9月18日 column, one row below the product.
    assert_eq!(number(&template, 4, 4), 1.2345);
    assert_eq!(number(&template, 6, 4), 0.9876);
    assert_eq!(number(&template, 11, 4), 25000.50);
    assert_eq!(number(&template, 13, 4), 1_200_000.0);
    // Returns sit two columns right of the product name.
    assert_eq!(cell(&template, 18, 3), "-3.21%");
    assert_eq!(cell(&template, 20, 3), "1.5%");
    // Previous day's column stays as it was.
    assert_eq!(cell(&template, 4, 3), "");

    assert_eq!(notifier.reports.borrow().as_slice(), &[(d(18), template.clone())]);
    assert!(notifier.errors.borrow().is_empty());
    assert!(dir.path().join("data/FundA20190918.xlsx").exists());
}

#[test]
fn scan_budget_exceeded_falls_back_to_previous_day() {
    let dir = TempDir::new().unwrap();
    let template = template(dir.path());
    let config = config(dir.path(), &template);
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(
        dir.path().join("data/FundB20190917.xlsx"),
        statement("0.9800", "1.1", "1,100,000.00"),
    )
    .unwrap();

    // Newest first: FundA, then noise until the budget of two runs out.
    let mut messages: Vec<Vec<u8>> = (0..3).map(noise_mail).collect();
    messages.push(attachment_mail(SENDER, "FundA20190918.xlsx", &statement("1.2345", "-3.21", "25000.50")));
    let connector = InboxConnector { messages };
    let notifier = RecordingNotifier::default();

    let outcome = Pipeline::new(&config, &connector, &notifier)
        .with_scan_budget(2)
        .run();

    assert_eq!(
        outcome,
        RunOutcome::Reported {
            date: d(18),
            fallback_used: true
        }
    );
    assert!(dir.path().join("data/FundA20190918.xlsx").exists());
    assert!(dir.path().join("data/FundB20190918.xlsx").exists());
    assert_eq!(number(&template, 4, 4), 1.2345);
    assert_eq!(number(&template, 6, 4), 0.98);
    assert_eq!(cell(&template, 20, 3), "1.1%");
    assert_eq!(notifier.reports.borrow().len(), 1);
    assert!(notifier.errors.borrow().is_empty());
}

#[test]
fn drained_mailbox_fails_without_fallback() {
    let dir = TempDir::new().unwrap();
    let template = template(dir.path());
    let config = config(dir.path(), &template);
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(
        dir.path().join("data/FundB20190917.xlsx"),
        statement("0.9800", "1.1", "1,100,000.00"),
    )
    .unwrap();

    let messages = vec![attachment_mail(SENDER, "FundA20190918.xlsx", &statement("1.2345", "-3.21", "25000.50"))];
    let connector = InboxConnector { messages };
    let notifier = RecordingNotifier::default();

    let outcome = Pipeline::new(&config, &connector, &notifier).run();

    assert!(matches!(outcome, RunOutcome::Failed { notified: true, .. }), "{outcome:?}");
    assert!(notifier.reports.borrow().is_empty());
    let errors = notifier.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, d(18));
    assert!(errors[0].1.contains("FundB20190918.xlsx"), "{}", errors[0].1);
    assert!(!errors[0].1.contains("FundA20190918.xlsx"), "{}", errors[0].1);
    assert!(!dir.path().join("data/FundB20190918.xlsx").exists());
    assert_eq!(cell(&template, 4, 4), "");
}

#[test]
fn unrecoverable_failure_sends_error_report() {
    let dir = TempDir::new().unwrap();
    let template = template(dir.path());
    let config = config(dir.path(), &template);
    let connector = InboxConnector {
        messages: vec![noise_mail(0)],
    };
    let notifier = RecordingNotifier::default();

    let outcome = Pipeline::new(&config, &connector, &notifier)
        .with_scan_budget(0)
        .run();

    assert!(matches!(outcome, RunOutcome::Failed { notified: true, .. }));
    assert!(notifier.reports.borrow().is_empty());
    let errors = notifier.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, d(18));
    assert!(errors[0].1.contains("FundA20190917.xlsx"), "{}", errors[0].1);
    assert_eq!(cell(&template, 4, 4), "");
}
