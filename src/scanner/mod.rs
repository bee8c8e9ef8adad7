//! Data file acquisition: required-file bookkeeping, mailbox matching and
//! the previous-day fallback.

pub mod fallback;
pub mod matcher;
pub mod required;

pub use fallback::{FallbackResolver, Substitution};
pub use matcher::{AttachmentMatcher, ExhaustCause, MAX_SCAN, ScanOutcome};
pub use required::{RequiredFile, RequiredFileSet};
