//! Report template: anchor search, the writable sheet seam and the writer.

pub mod anchor;
pub mod template;
pub mod writer;

pub use anchor::{AnchorQuery, CellAnchor, ColumnRule, MAX_ROW_OFFSET};
pub use template::{ReportSheet, XlsxTemplate};
pub use writer::{TemplateWriter, write_preserving_style};
