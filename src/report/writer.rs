//! Fills extracted values into the report template.

use super::anchor::{self, AnchorQuery, CellAnchor, ColumnRule};
use super::template::{ReportSheet, XlsxTemplate};
use crate::config::ReportConfig;
use crate::error::TemplateError;
use crate::extract::{Metric, NavRecord};

/// Writes every record's metrics at searched anchors, keeping each target
/// cell's formatting.
#[derive(Debug)]
pub struct TemplateWriter<'a> {
    report: &'a ReportConfig,
    date_tag: String,
}

impl<'a> TemplateWriter<'a> {
    pub fn new(report: &'a ReportConfig, date_tag: impl Into<String>) -> Self {
        Self {
            report,
            date_tag: date_tag.into(),
        }
    }

    /// Open the configured template, write all records, save once.
    ///
    /// Nothing is saved when any write fails.
    pub fn fill(&self, records: &[NavRecord]) -> Result<(), TemplateError> {
        let mut template = XlsxTemplate::open(&self.report.template)?;
        self.write_all(&mut template, records)?;
        template.save()?;
        tracing::info!(
            template = %template.path().display(),
            records = records.len(),
            "Report template updated"
        );
        Ok(())
    }

    pub fn write_all<S: ReportSheet>(&self, sheet: &mut S, records: &[NavRecord]) -> Result<(), TemplateError> {
        for record in records {
            self.write_record(sheet, record)?;
        }
        Ok(())
    }

    pub fn write_record<S: ReportSheet>(&self, sheet: &mut S, record: &NavRecord) -> Result<(), TemplateError> {
        for metric in Metric::ALL {
            let value = record.get(metric).ok_or_else(|| TemplateError::MissingValue {
                product: record.product.clone(),
                metric: metric.to_string(),
            })?;
            let anchor = self.locate(sheet, metric, &record.product)?;
            write_preserving_style(sheet, anchor, value);
            tracing::debug!(
                product = %record.product,
                metric = %metric,
                row = anchor.row,
                col = anchor.col,
                value,
                "Wrote report cell"
            );
        }
        Ok(())
    }

    /// Searched fresh on every call; earlier writes never shift anchors.
    pub fn locate<S: ReportSheet>(&self, sheet: &S, metric: Metric, product: &str) -> Result<CellAnchor, TemplateError> {
        let query = match metric {
            Metric::UnitNav => AnchorQuery {
                item_label: &self.report.unit_nav_item,
                product,
                column: ColumnRule::DateTag(&self.date_tag),
            },
            Metric::TotalNav => AnchorQuery {
                item_label: &self.report.total_nav_item,
                product,
                column: ColumnRule::DateTag(&self.date_tag),
            },
            Metric::AccumReturn => AnchorQuery {
                item_label: &self.report.accum_return_item,
                product,
                column: ColumnRule::ProductOffset(self.report.return_column_offset),
            },
        };
        anchor::locate(sheet, &query)
    }
}

/// Capture the target's style, write, then restore the style.
pub fn write_preserving_style<S: ReportSheet>(sheet: &mut S, anchor: CellAnchor, value: &str) {
    let style = sheet.style_at(anchor.row, anchor.col);
    sheet.write_text(anchor.row, anchor.col, value);
    if let Some(style) = style {
        sheet.apply_style(anchor.row, anchor.col, style);
    }
}
