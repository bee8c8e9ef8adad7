//! Attachment matcher — walks the mailbox newest-first and saves the
//! required data files.
//!
//! Header first, body only for accepted senders. A per-message failure
//! never stops the scan; it just counts against the scan budget.

use std::path::{Path, PathBuf};

use mail_parser::{MessageParser, MimeHeaders};

use super::required::RequiredFileSet;
use crate::error::MailboxError;
use crate::mailbox::{Mailbox, MessageId, decode_encoded_words};

/// Candidates that may fail to complete the set before the scan gives up.
pub const MAX_SCAN: u32 = 500;

/// Why a scan stopped without completing the required-file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustCause {
    /// The scan counter passed its cap.
    ScanBudgetExceeded,
    /// Every message was inspected.
    MailboxDrained,
}

/// Result of one mailbox scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed {
        /// Header inspections performed.
        inspected: u32,
    },
    Exhausted {
        inspected: u32,
        /// Final scan counter value.
        scanned: u32,
        cause: ExhaustCause,
    },
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanOutcome::Completed { .. })
    }

    pub fn inspected(&self) -> u32 {
        match self {
            ScanOutcome::Completed { inspected } | ScanOutcome::Exhausted { inspected, .. } => {
                *inspected
            }
        }
    }
}

/// Failure while looking at one candidate.
enum CandidateError {
    /// Counted and skipped.
    Skip(String),
    /// Aborts the scan (the download directory is unusable).
    Fatal(MailboxError),
}

impl From<MailboxError> for CandidateError {
    fn from(e: MailboxError) -> Self {
        CandidateError::Skip(e.to_string())
    }
}

/// Matches mailbox attachments against a [`RequiredFileSet`].
#[derive(Debug, Clone)]
pub struct AttachmentMatcher {
    senders: Vec<String>,
    save_dir: PathBuf,
    budget: u32,
}

impl AttachmentMatcher {
    pub fn new(senders: &[String], save_dir: &Path) -> Self {
        Self {
            senders: senders
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            save_dir: save_dir.to_path_buf(),
            budget: MAX_SCAN,
        }
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Whether a `From` header text names an acceptable sender.
    pub fn is_accepted_sender(&self, from: &str) -> bool {
        let from = from.to_lowercase();
        self.senders.iter().any(|s| from.contains(s.as_str()))
    }

    /// Scan newest-first until `required` is complete or the budget runs out.
    ///
    /// Only listing the mailbox and saving to disk can fail the scan.
    pub fn scan(
        &self,
        mailbox: &mut dyn Mailbox,
        required: &mut RequiredFileSet,
    ) -> Result<ScanOutcome, MailboxError> {
        if required.is_complete() {
            return Ok(ScanOutcome::Completed { inspected: 0 });
        }

        let ids = mailbox.message_ids()?;
        tracing::info!(messages = ids.len(), missing = required.missing().count(), "Scanning mailbox");

        let mut inspected = 0;
        let mut scanned = 0;

        for &id in ids.iter().rev() {
            inspected += 1;
            match self.inspect(mailbox, id, required) {
                Ok(saved) if saved > 0 && required.is_complete() => {
                    tracing::info!(inspected, "All required data files found");
                    return Ok(ScanOutcome::Completed { inspected });
                }
                Ok(_) => {}
                Err(CandidateError::Skip(reason)) => {
                    tracing::warn!(msg_id = id, %reason, "Skipping unreadable message");
                }
                Err(CandidateError::Fatal(e)) => return Err(e),
            }

            scanned += 1;
            if scanned > self.budget {
                tracing::warn!(scanned, budget = self.budget, "Scan budget exceeded");
                return Ok(ScanOutcome::Exhausted {
                    inspected,
                    scanned,
                    cause: ExhaustCause::ScanBudgetExceeded,
                });
            }
        }

        tracing::warn!(inspected, "Mailbox drained before all data files were found");
        Ok(ScanOutcome::Exhausted {
            inspected,
            scanned,
            cause: ExhaustCause::MailboxDrained,
        })
    }

    /// Look at one message; returns how many required files it supplied.
    fn inspect(
        &self,
        mailbox: &mut dyn Mailbox,
        id: MessageId,
        required: &mut RequiredFileSet,
    ) -> Result<usize, CandidateError> {
        let header = mailbox.fetch_header(id)?;
        let parsed = MessageParser::default()
            .parse(&header[..])
            .ok_or(MailboxError::Unparsable { id })?;
        let from = sender_text(&parsed);
        if !self.is_accepted_sender(&from) {
            tracing::debug!(msg_id = id, from = %from, "Sender not accepted");
            return Ok(0);
        }

        let raw = mailbox.fetch_message(id)?;
        let parsed = MessageParser::default()
            .parse(&raw[..])
            .ok_or(MailboxError::Unparsable { id })?;

        let mut saved = 0;
        for part in parsed.attachments() {
            let Some(name) = MimeHeaders::attachment_name(part) else {
                continue;
            };
            let name = decode_encoded_words(name)
                .map_err(|e| CandidateError::Skip(format!("attachment name '{name}': {e}")))?;
            if !required.contains(&name) {
                tracing::debug!(msg_id = id, file = %name, "Attachment not required");
                continue;
            }
            if required.is_found(&name) {
                // A newer message already supplied it.
                continue;
            }

            let path = self.save_dir.join(&*name);
            if let Err(source) = std::fs::write(&path, part.contents()) {
                return Err(CandidateError::Fatal(MailboxError::Persist { path, source }));
            }
            required.mark_found(&name);
            saved += 1;
            tracing::info!(msg_id = id, file = %name, "Saved data file");
        }
        Ok(saved)
    }
}

/// `name <address>` for every From address, joined by `, `.
pub fn sender_text(message: &mail_parser::Message<'_>) -> String {
    let Some(from) = message.from() else {
        return String::new();
    };
    let render = |addr: &mail_parser::Addr<'_>| {
        let name = addr.name.as_deref().unwrap_or_default();
        let address = addr.address.as_deref().unwrap_or_default();
        format!("{name} <{address}>")
    };
    match from {
        mail_parser::Address::List(addrs) => addrs.iter().map(render).collect::<Vec<_>>().join(", "),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().map(render))
            .collect::<Vec<_>>()
            .join(", "),
    }
}
