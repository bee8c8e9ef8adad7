//! Run orchestrator.
//!
//! Stages run strictly in order: calendar, mailbox scan (with the stale
//! file fallback), extraction, template fill, delivery. Any failure past
//! the calendar check ends the run and is reported by error mail instead.

use chrono::{Local, NaiveDate};

use crate::calendar::TradingCalendar;
use crate::config::AppConfig;
use crate::context::RunContext;
use crate::error::{Error, MailboxError, Result};
use crate::extract::TableExtractor;
use crate::mailbox::MailboxConnector;
use crate::notify::Notifier;
use crate::report::TemplateWriter;
use crate::scanner::{AttachmentMatcher, ExhaustCause, FallbackResolver, MAX_SCAN, RequiredFileSet, ScanOutcome};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Today is not a trading day; nothing was done.
    NotTradingDay { today: NaiveDate },
    Reported {
        date: NaiveDate,
        /// At least one data file is the previous trading day's copy.
        fallback_used: bool,
    },
    Failed {
        message: String,
        /// Whether the error mail went out.
        notified: bool,
    },
}

impl RunOutcome {
    /// Process exit code: non-zero only when a failure went unreported.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Failed { notified: false, .. } => 1,
            _ => 0,
        }
    }
}

/// One configured report pipeline.
pub struct Pipeline<'a> {
    config: &'a AppConfig,
    connector: &'a dyn MailboxConnector,
    notifier: &'a dyn Notifier,
    scan_budget: u32,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a AppConfig,
        connector: &'a dyn MailboxConnector,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            connector,
            notifier,
            scan_budget: MAX_SCAN,
        }
    }

    /// Override the mailbox scan budget (defaults to [`MAX_SCAN`]).
    pub fn with_scan_budget(mut self, budget: u32) -> Self {
        self.scan_budget = budget;
        self
    }

    fn today(&self) -> NaiveDate {
        self.config
            .calendar
            .today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run once. Never panics on pipeline errors; they end up in the outcome.
    pub fn run(&self) -> RunOutcome {
        let today = self.today();
        let calendar = match TradingCalendar::load(&self.config.calendar.file, today) {
            Ok(calendar) => calendar,
            Err(e) => return self.fail(today, e.into()),
        };
        if !calendar.is_trading_day(today) {
            tracing::info!(%today, "Not a trading day, nothing to report");
            return RunOutcome::NotTradingDay { today };
        }

        let ctx = match RunContext::new(self.config, calendar) {
            Ok(ctx) => ctx,
            Err(e) => return self.fail(today, e.into()),
        };
        let span = tracing::info_span!("run", run_id = %ctx.run_id, date = %ctx.date);
        let _guard = span.enter();
        tracing::info!(%today, products = self.config.products.len(), "Report run started");

        match self.produce(&ctx) {
            Ok(fallback_used) => {
                tracing::info!(fallback_used, "Report run finished");
                RunOutcome::Reported {
                    date: ctx.date,
                    fallback_used,
                }
            }
            Err(e) => self.fail(ctx.date, e),
        }
    }

    /// Acquire, extract, fill, send. Returns whether the fallback was used.
    fn produce(&self, ctx: &RunContext<'_>) -> Result<bool> {
        let config = self.config;
        let mut required = RequiredFileSet::for_date(&config.products, ctx.date);
        let fallback_used = self.acquire(ctx, &mut required)?;
        ensure_complete(&required)?;

        let file_names: Vec<String> = required.files().iter().map(|f| f.name.clone()).collect();
        let records = TableExtractor::new(config.paths.input_dir(), &config.extraction.market_value_label)
            .extract_all(&config.products, &file_names)?;

        TemplateWriter::new(&config.report, ctx.date_tag()).fill(&records)?;
        self.notifier.send_report(ctx.date, &config.report.template)?;
        Ok(fallback_used)
    }

    /// Fill `required` from the mailbox, then from the previous day's files
    /// if the scan ran out of budget. A drained mailbox gets no fallback.
    fn acquire(&self, ctx: &RunContext<'_>, required: &mut RequiredFileSet) -> Result<bool> {
        let download_dir = &self.config.paths.download_dir;
        std::fs::create_dir_all(download_dir).map_err(|source| MailboxError::Persist {
            path: download_dir.clone(),
            source,
        })?;

        let matcher =
            AttachmentMatcher::new(&self.config.mailbox.senders, download_dir).with_budget(self.scan_budget);
        let mut mailbox = self.connector.connect()?;
        let scanned = matcher.scan(mailbox.as_mut(), required);
        if let Err(e) = mailbox.close() {
            tracing::warn!(error = %e, "Failed to close mailbox session");
        }

        match scanned? {
            ScanOutcome::Completed { inspected } => {
                tracing::info!(inspected, "Data files downloaded");
                Ok(false)
            }
            ScanOutcome::Exhausted {
                inspected,
                cause: ExhaustCause::MailboxDrained,
                ..
            } => {
                tracing::warn!(
                    inspected,
                    missing = required.missing().count(),
                    "Data files missing after mailbox scan"
                );
                Ok(false)
            }
            ScanOutcome::Exhausted {
                inspected,
                scanned,
                cause: ExhaustCause::ScanBudgetExceeded,
            } => {
                let prev = ctx.fallback_date()?;
                tracing::warn!(
                    inspected,
                    scanned,
                    missing = required.missing().count(),
                    fallback_date = %prev,
                    "Scan budget exceeded, using previous trading day's files"
                );
                FallbackResolver::new(&self.config.products, download_dir).resolve(required, prev)?;
                Ok(true)
            }
        }
    }

    fn fail(&self, date: NaiveDate, error: Error) -> RunOutcome {
        let message = error.to_string();
        tracing::error!(error = %message, "Report run failed");
        let notified = match self.notifier.send_error(date, &message) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send error report");
                false
            }
        };
        RunOutcome::Failed { message, notified }
    }
}

/// Extraction only starts once every required file is on disk.
fn ensure_complete(required: &RequiredFileSet) -> std::result::Result<(), MailboxError> {
    if required.is_complete() {
        return Ok(());
    }
    let missing: Vec<&str> = required.missing().map(|f| f.name.as_str()).collect();
    Err(MailboxError::Incomplete {
        missing: missing.join(", "),
    })
}
