//! Mailbox access — the primitives the attachment scan needs.
//!
//! The protocol itself lives behind [`Mailbox`]; [`pop3`] provides the
//! production implementation and tests use in-memory mailboxes.

pub mod encoded_word;
pub mod pop3;

pub use encoded_word::decode_encoded_words;
pub use pop3::{Pop3Connector, Pop3Mailbox};

use crate::error::MailboxError;

/// Server-assigned message number (1-based, oldest first).
pub type MessageId = u32;

/// An open, authenticated mailbox session.
pub trait Mailbox {
    /// All message ids currently in the mailbox, oldest first.
    fn message_ids(&mut self) -> Result<Vec<MessageId>, MailboxError>;

    /// Raw header block of one message, without the body.
    fn fetch_header(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError>;

    /// Full raw message.
    fn fetch_message(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError>;

    /// End the session.
    fn close(&mut self) -> Result<(), MailboxError>;
}

/// Opens mailbox sessions; the orchestrator connects only when a scan is due.
pub trait MailboxConnector {
    fn connect(&self) -> Result<Box<dyn Mailbox>, MailboxError>;
}
