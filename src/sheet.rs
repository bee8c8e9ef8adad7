//! Read-only text view over a worksheet.
//!
//! Both the data-file extractor and the template anchor search only ever
//! look at cell text by (row, column); this trait is that common ground.

use std::borrow::Cow;

use calamine::{Data, Range};

/// Zero-based, row-major text access to one worksheet.
pub trait SheetView {
    /// Number of rows that may hold data.
    fn row_count(&self) -> u32;

    /// Number of columns that may hold data.
    fn col_count(&self) -> u32;

    /// Cell text; empty for blank or out-of-range cells.
    fn text(&self, row: u32, col: u32) -> Cow<'_, str>;
}

/// Owned grid of cell texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextGrid {
    rows: Vec<Vec<String>>,
    width: u32,
}

impl TextGrid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        Self { rows, width }
    }

    /// Convenience for tests and fixtures.
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    /// Render a calamine range; the grid is anchored at A1 so positions
    /// match what a user sees in the workbook.
    pub fn from_range(range: &Range<Data>) -> Self {
        let (row_off, col_off) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_off as usize];
        for row in range.rows() {
            let mut cells = vec![String::new(); col_off as usize];
            cells.extend(row.iter().map(cell_text));
            rows.push(cells);
        }
        Self::from_rows(rows)
    }
}

impl SheetView for TextGrid {
    fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    fn col_count(&self) -> u32 {
        self.width
    }

    fn text(&self, row: u32, col: u32) -> Cow<'_, str> {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .map_or(Cow::Borrowed(""), |s| Cow::Borrowed(s.as_str()))
    }
}

/// Text of a calamine cell as a user would read it.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// First position, in row-major order, whose text contains `needle`.
pub fn find_text(sheet: &dyn SheetView, needle: &str) -> Option<(u32, u32)> {
    (0..sheet.row_count()).find_map(|row| {
        (0..sheet.col_count())
            .find(|&col| sheet.text(row, col).contains(needle))
            .map(|col| (row, col))
    })
}
