//! NAV report: daily net-asset-value collection and reporting.

pub mod calendar;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mailbox;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod sheet;
