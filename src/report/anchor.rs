//! Anchor search in the report template.
//!
//! The template has no fixed grid: every value is found by walking from an
//! item label, across a date-tag header row, down to the product's row.

use crate::error::TemplateError;
use crate::sheet::SheetView;

/// Rows that may sit between the header row and the product row before
/// the match is assumed to belong to another section.
pub const MAX_ROW_OFFSET: u32 = 10;

/// A write target discovered by search. Never cached across writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAnchor {
    pub row: u32,
    pub col: u32,
}

/// How the target column is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule<'a> {
    /// Column of the header cell containing this date tag.
    DateTag(&'a str),
    /// Fixed offset to the right of the product-name cell.
    ProductOffset(u32),
}

/// What to look for.
#[derive(Debug, Clone, Copy)]
pub struct AnchorQuery<'a> {
    pub item_label: &'a str,
    pub product: &'a str,
    pub column: ColumnRule<'a>,
}

fn not_found(stage: &str, anchor: &str) -> TemplateError {
    TemplateError::AnchorNotFound {
        stage: stage.to_string(),
        anchor: anchor.to_string(),
    }
}

/// First row, top to bottom, with a cell containing `label`.
pub fn find_label_row(sheet: &dyn SheetView, label: &str) -> Option<u32> {
    (0..sheet.row_count()).find(|&row| {
        (0..sheet.col_count()).any(|col| sheet.text(row, col).contains(label))
    })
}

/// Column of the first cell in `row` containing `tag`.
pub fn find_tag_column(sheet: &dyn SheetView, row: u32, tag: &str) -> Option<u32> {
    (0..sheet.col_count()).find(|&col| sheet.text(row, col).contains(tag))
}

/// Column of the first non-empty cell in `row` containing `product`.
fn find_product_column(sheet: &dyn SheetView, row: u32, product: &str) -> Option<u32> {
    (0..sheet.col_count()).find(|&col| {
        let text = sheet.text(row, col);
        !text.is_empty() && text.contains(product)
    })
}

/// Locate the cell a value for `query` is written to.
///
/// 1. item-label row;
/// 2. the next row is the header row, searched for the date tag when the
///    column is date-keyed;
/// 3. rows below the header are searched for the product name;
/// 4. the value goes one row below the product-name row.
pub fn locate(sheet: &dyn SheetView, query: &AnchorQuery<'_>) -> Result<CellAnchor, TemplateError> {
    let item_row =
        find_label_row(sheet, query.item_label).ok_or_else(|| not_found("item label", query.item_label))?;
    let header_row = item_row + 1;

    let date_col = match query.column {
        ColumnRule::DateTag(tag) => {
            Some(find_tag_column(sheet, header_row, tag).ok_or_else(|| not_found("date tag", tag))?)
        }
        ColumnRule::ProductOffset(_) => None,
    };

    for (offset, row) in (header_row + 1..sheet.row_count()).enumerate() {
        let Some(product_col) = find_product_column(sheet, row, query.product) else {
            continue;
        };
        let offset = offset as u32;
        if offset > MAX_ROW_OFFSET {
            return Err(TemplateError::AmbiguousMatch {
                product: query.product.to_string(),
                offset,
            });
        }
        let col = match (query.column, date_col) {
            (ColumnRule::ProductOffset(n), _) => product_col + n,
            (ColumnRule::DateTag(_), Some(col)) => col,
            (ColumnRule::DateTag(tag), None) => return Err(not_found("date tag", tag)),
        };
        return Ok(CellAnchor { row: row + 1, col });
    }

    Err(not_found("product name", query.product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::TextGrid;

    /// Rows 0..=11; label row 5, tag row 6 (col 3), product row 8.
    fn template() -> TextGrid {
        let mut rows: Vec<Vec<String>> = vec![vec![String::new(); 6]; 12];
        rows[0][0] = "产品日报".into();
        rows[5][0] = "一、单位净值".into();
        rows[6][0] = "产品".into();
        rows[6][2] = "9月17日".into();
        rows[6][3] = "9月18日".into();
        rows[8][0] = "FundA".into();
        rows[10][0] = "FundB".into();
        TextGrid::from_rows(rows)
    }

    fn query<'a>(product: &'a str, column: ColumnRule<'a>) -> AnchorQuery<'a> {
        AnchorQuery {
            item_label: "单位净值",
            product,
            column,
        }
    }

    // ── Happy path ──────────────────────────────────────────────────

    #[test]
    fn date_keyed_target() {
        let anchor = locate(&template(), &query("FundA", ColumnRule::DateTag("9月18日"))).unwrap();
        assert_eq!(anchor, CellAnchor { row: 9, col: 3 });
    }

    #[test]
    fn product_offset_target() {
        let anchor = locate(&template(), &query("FundB", ColumnRule::ProductOffset(2))).unwrap();
        assert_eq!(anchor, CellAnchor { row: 11, col: 2 });
    }

    #[test]
    fn first_label_row_wins() {
        let mut grid = template();
        // A second section further down must not be used.
        let mut rows: Vec<Vec<String>> = (0..grid.row_count())
            .map(|r| (0..6).map(|c| grid.text(r, c).into_owned()).collect())
            .collect();
        rows.push(vec!["二、单位净值".into()]);
        grid = TextGrid::from_rows(rows);
        assert_eq!(find_label_row(&grid, "单位净值"), Some(5));
    }

    // ── Failures ────────────────────────────────────────────────────

    #[test]
    fn missing_item_label() {
        let err = locate(&template(), &AnchorQuery {
            item_label: "规模",
            product: "FundA",
            column: ColumnRule::DateTag("9月18日"),
        })
        .unwrap_err();
        assert!(matches!(err, TemplateError::AnchorNotFound { ref stage, .. } if stage == "item label"));
    }

    #[test]
    fn missing_date_tag() {
        let err = locate(&template(), &query("FundA", ColumnRule::DateTag("9月19日"))).unwrap_err();
        assert!(matches!(err, TemplateError::AnchorNotFound { ref stage, .. } if stage == "date tag"));
    }

    #[test]
    fn missing_product() {
        let err = locate(&template(), &query("FundC", ColumnRule::DateTag("9月18日"))).unwrap_err();
        assert!(matches!(err, TemplateError::AnchorNotFound { ref stage, .. } if stage == "product name"));
    }

    #[test]
    fn product_too_far_below_is_ambiguous() {
        let mut rows: Vec<Vec<String>> = vec![vec![String::new(); 2]; 20];
        rows[0][0] = "单位净值".into();
        rows[1][1] = "9月18日".into();
        rows[2 + MAX_ROW_OFFSET as usize + 1][0] = "FundA".into();
        let grid = TextGrid::from_rows(rows);

        let err = locate(&grid, &query("FundA", ColumnRule::DateTag("9月18日"))).unwrap_err();
        assert!(matches!(err, TemplateError::AmbiguousMatch { offset: 11, .. }));
    }

    #[test]
    fn product_at_offset_limit_is_accepted() {
        let mut rows: Vec<Vec<String>> = vec![vec![String::new(); 2]; 20];
        rows[0][0] = "单位净值".into();
        rows[1][1] = "9月18日".into();
        rows[2 + MAX_ROW_OFFSET as usize][0] = "FundA".into();
        let grid = TextGrid::from_rows(rows);

        let anchor = locate(&grid, &query("FundA", ColumnRule::DateTag("9月18日"))).unwrap();
        assert_eq!(anchor, CellAnchor { row: 13, col: 1 });
    }
}
