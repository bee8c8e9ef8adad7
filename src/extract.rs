//! Table extractor — pulls the three NAV metrics out of a provider's data
//! file by searching for label text instead of fixed cells.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use calamine::Reader;
use regex::Regex;

use crate::config::ProductConfig;
use crate::error::ExtractError;
use crate::sheet::{SheetView, TextGrid, find_text};

/// First signed decimal, optionally with thousands separators.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|-?\d+(?:\.\d*)?").expect("number pattern is valid")
});

/// The reported figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    UnitNav,
    AccumReturn,
    TotalNav,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::UnitNav, Metric::AccumReturn, Metric::TotalNav];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::UnitNav => write!(f, "unit NAV"),
            Metric::AccumReturn => write!(f, "accumulated return"),
            Metric::TotalNav => write!(f, "total NAV"),
        }
    }
}

/// Extracted figures for one product.
///
/// Values are kept as the decimal text found in the data file; the
/// accumulated return carries a trailing `%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavRecord {
    pub product: String,
    pub source_file: String,
    unit_nav: Option<String>,
    accum_return: Option<String>,
    total_nav: Option<String>,
}

impl NavRecord {
    pub fn new(product: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            source_file: source_file.into(),
            unit_nav: None,
            accum_return: None,
            total_nav: None,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut Option<String> {
        match metric {
            Metric::UnitNav => &mut self.unit_nav,
            Metric::AccumReturn => &mut self.accum_return,
            Metric::TotalNav => &mut self.total_nav,
        }
    }

    /// Set a metric unless it already has a value; returns whether it was set.
    pub fn set(&mut self, metric: Metric, value: impl Into<String>) -> bool {
        let slot = self.slot(metric);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value.into());
        true
    }

    pub fn get(&self, metric: Metric) -> Option<&str> {
        match metric {
            Metric::UnitNav => self.unit_nav.as_deref(),
            Metric::AccumReturn => self.accum_return.as_deref(),
            Metric::TotalNav => self.total_nav.as_deref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        Metric::ALL.iter().all(|m| self.get(*m).is_some())
    }
}

/// First signed decimal number in `text`, without grouping commas.
pub fn first_number(text: &str) -> Option<String> {
    NUMBER.find(text).map(|m| m.as_str().replace(',', ""))
}

/// Reads data files from one directory.
#[derive(Debug)]
pub struct TableExtractor<'a> {
    input_dir: &'a Path,
    market_value_label: &'a str,
}

impl<'a> TableExtractor<'a> {
    pub fn new(input_dir: &'a Path, market_value_label: &'a str) -> Self {
        Self {
            input_dir,
            market_value_label,
        }
    }

    /// Extract every product's record, in product order.
    pub fn extract_all(
        &self,
        products: &[ProductConfig],
        file_names: &[String],
    ) -> Result<Vec<NavRecord>, ExtractError> {
        products
            .iter()
            .zip(file_names)
            .map(|(product, file)| self.extract_file(product, file))
            .collect()
    }

    /// Open one data file and extract its record.
    pub fn extract_file(
        &self,
        product: &ProductConfig,
        file_name: &str,
    ) -> Result<NavRecord, ExtractError> {
        let path = self.input_dir.join(file_name);
        let grid = open_first_sheet(&path)?;
        let record = self.extract(product, file_name, &grid)?;
        tracing::info!(
            product = %record.product,
            unit_nav = record.get(Metric::UnitNav).unwrap_or_default(),
            accum_return = record.get(Metric::AccumReturn).unwrap_or_default(),
            total_nav = record.get(Metric::TotalNav).unwrap_or_default(),
            "Extracted NAV figures"
        );
        Ok(record)
    }

    /// Run the three label searches over an already opened sheet.
    pub fn extract(
        &self,
        product: &ProductConfig,
        file_name: &str,
        sheet: &dyn SheetView,
    ) -> Result<NavRecord, ExtractError> {
        let mut record = NavRecord::new(&product.name, file_name);

        let unit_nav = unit_nav(sheet, &product.unit_nav_label)
            .map_err(|e| e.into_error(product, Metric::UnitNav))?;
        record.set(Metric::UnitNav, unit_nav);

        let accum = accum_return(sheet, &product.accum_return_label)
            .map_err(|e| e.into_error(product, Metric::AccumReturn))?;
        record.set(Metric::AccumReturn, format!("{accum}%"));

        let total = total_nav(sheet, &product.total_nav_label, self.market_value_label)
            .map_err(|e| e.into_error(product, Metric::TotalNav))?;
        record.set(Metric::TotalNav, total);

        Ok(record)
    }
}

/// Why one label search failed, before product context is attached.
#[derive(Debug, PartialEq, Eq)]
enum Miss {
    Label(String),
    Number(String),
}

impl Miss {
    fn into_error(self, product: &ProductConfig, metric: Metric) -> ExtractError {
        match self {
            Miss::Label(label) => ExtractError::LabelNotFound {
                product: product.name.clone(),
                metric: metric.to_string(),
                label,
            },
            Miss::Number(text) => ExtractError::NumberNotFound {
                product: product.name.clone(),
                metric: metric.to_string(),
                text,
            },
        }
    }
}

fn number_in(text: &str) -> Result<String, Miss> {
    first_number(text).ok_or_else(|| Miss::Number(text.to_string()))
}

/// The number sits inside the label cell itself: `单位净值: 1.2345`.
fn unit_nav(sheet: &dyn SheetView, label: &str) -> Result<String, Miss> {
    let (row, col) = find_text(sheet, label).ok_or_else(|| Miss::Label(label.to_string()))?;
    number_in(&sheet.text(row, col))
}

/// The number sits one column to the right of the label.
fn accum_return(sheet: &dyn SheetView, label: &str) -> Result<String, Miss> {
    let (row, col) = find_text(sheet, label).ok_or_else(|| Miss::Label(label.to_string()))?;
    number_in(&sheet.text(row, col + 1))
}

/// The number sits in the label's row, under the last market-value header
/// seen before the label.
fn total_nav(sheet: &dyn SheetView, label: &str, marker: &str) -> Result<String, Miss> {
    let mut market_col = 0;
    for row in 0..sheet.row_count() {
        for col in 0..sheet.col_count() {
            let text = sheet.text(row, col);
            if text.trim() == marker {
                market_col = col;
            } else if text.contains(label) {
                return number_in(&sheet.text(row, market_col));
            }
        }
    }
    Err(Miss::Label(label.to_string()))
}

/// Open a workbook (legacy `.xls` or `.xlsx`, detected from content) and
/// render its first sheet.
pub fn open_first_sheet(path: &Path) -> Result<TextGrid, ExtractError> {
    let open_err = |reason: String| ExtractError::Open {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| open_err(e.to_string()))?;
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| open_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractError::NoWorksheet {
            path: PathBuf::from(path),
        })?
        .map_err(|e| open_err(e.to_string()))?;
    Ok(TextGrid::from_range(&range))
}
