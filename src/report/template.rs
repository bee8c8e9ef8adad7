//! Writable report template.
//!
//! Setting a cell value through the workbook layer is allowed to reset the
//! cell's formatting, so the trait exposes style capture and reapplication
//! separately from the write itself.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use umya_spreadsheet::{Spreadsheet, Style, Worksheet};

use crate::error::TemplateError;
use crate::sheet::SheetView;

/// A worksheet that can be searched, written and saved.
pub trait ReportSheet: SheetView {
    type Style: Clone;

    /// Formatting of the cell, `None` when the cell does not exist yet.
    fn style_at(&self, row: u32, col: u32) -> Option<Self::Style>;

    /// Set cell text. May drop the cell's formatting.
    fn write_text(&mut self, row: u32, col: u32, value: &str);

    fn apply_style(&mut self, row: u32, col: u32, style: Self::Style);

    fn save(&self) -> Result<(), TemplateError>;
}

// ── xlsx backend ────────────────────────────────────────────────────

/// First worksheet of an `.xlsx` template, held in memory until saved.
pub struct XlsxTemplate {
    path: PathBuf,
    book: Spreadsheet,
}

impl XlsxTemplate {
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| TemplateError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if book.get_sheet_collection().is_empty() {
            return Err(TemplateError::NoWorksheet {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            book,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sheet(&self) -> Option<&Worksheet> {
        self.book.get_sheet_collection().first()
    }

    fn sheet_mut(&mut self) -> Option<&mut Worksheet> {
        self.book.get_sheet_collection_mut().first_mut()
    }
}

/// umya coordinates are 1-based `(column, row)`.
fn coord(row: u32, col: u32) -> (u32, u32) {
    (col + 1, row + 1)
}

impl SheetView for XlsxTemplate {
    fn row_count(&self) -> u32 {
        self.sheet().map_or(0, |s| s.get_highest_column_and_row().1)
    }

    fn col_count(&self) -> u32 {
        self.sheet().map_or(0, |s| s.get_highest_column_and_row().0)
    }

    fn text(&self, row: u32, col: u32) -> Cow<'_, str> {
        self.sheet()
            .and_then(|s| s.get_cell(coord(row, col)))
            .map_or(Cow::Borrowed(""), |cell| Cow::Owned(cell.get_value().to_string()))
    }
}

impl ReportSheet for XlsxTemplate {
    type Style = Style;

    fn style_at(&self, row: u32, col: u32) -> Option<Style> {
        self.sheet()
            .and_then(|s| s.get_cell(coord(row, col)))
            .map(|cell| cell.get_style().clone())
    }

    fn write_text(&mut self, row: u32, col: u32, value: &str) {
        if let Some(sheet) = self.sheet_mut() {
            sheet.get_cell_mut(coord(row, col)).set_value(value.to_string());
        }
    }

    fn apply_style(&mut self, row: u32, col: u32, style: Style) {
        if let Some(sheet) = self.sheet_mut() {
            sheet.get_cell_mut(coord(row, col)).set_style(style);
        }
    }

    fn save(&self) -> Result<(), TemplateError> {
        umya_spreadsheet::writer::xlsx::write(&self.book, &self.path).map_err(|e| TemplateError::Save {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}
