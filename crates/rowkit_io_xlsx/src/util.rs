//! Stateless helper utilities used by the export pipeline.

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_WIDTH_CELL_PADDING, N_WIDTH_WIDE_CHAR_FACTOR, TUP_EXCEL_ILLEGAL,
};
use crate::error::SinkError;
use crate::spec::EnumCellValue;

////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate display width of one rendered cell string.
///
/// A string holding any non-ASCII character is weighted as a whole:
/// `chars * 1.5 + 2`; otherwise `chars + 2`.
pub fn estimate_cell_width(text: &str) -> f64 {
    let n_chars = text.chars().count();
    if n_chars != text.len() {
        n_chars as f64 * N_WIDTH_WIDE_CHAR_FACTOR + N_WIDTH_CELL_PADDING
    } else {
        n_chars as f64 + N_WIDTH_CELL_PADDING
    }
}

/// Column width: max of per-string estimates.
pub fn estimate_column_width<'a>(texts: impl IntoIterator<Item = &'a str>) -> f64 {
    texts
        .into_iter()
        .map(estimate_cell_width)
        .fold(0.0, f64::max)
}

/// Per-column widths over header and rows (header included).
pub fn estimate_column_widths(header: &[String], rows: &[Vec<EnumCellValue>]) -> Vec<f64> {
    let mut l_widths: Vec<f64> = header.iter().map(|c| estimate_cell_width(c)).collect();
    for row in rows {
        for (n_idx_col, value) in row.iter().enumerate() {
            let n_width = estimate_cell_width(&value.to_text());
            match l_widths.get_mut(n_idx_col) {
                Some(n_width_col) => *n_width_col = f64::max(*n_width_col, n_width),
                None => l_widths.push(n_width),
            }
        }
    }
    l_widths
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    c_name = c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    // Excel rejects names that start or end with an apostrophe.
    c_name = c_name
        .trim_matches(|c: char| c == '\'' || c.is_whitespace())
        .to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }
    c_name
}

/// Zero-based column index to A1 letters (`0 -> A`, `26 -> AA`).
pub fn derive_column_name(col_idx: usize) -> String {
    let mut l_letters = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_letters.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_letters.iter().rev().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasting

pub fn cast_row_num(value: usize) -> Result<u32, SinkError> {
    u32::try_from(value).map_err(|_| SinkError::LimitExceeded(format!("row index overflow: {value}")))
}

pub fn cast_col_num(value: usize) -> Result<u16, SinkError> {
    u16::try_from(value)
        .map_err(|_| SinkError::LimitExceeded(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_column_width_is_max_of_len_plus_two() {
        assert_eq!(estimate_column_width(["X", "ab", "abcd"]), 6.0);
    }

    #[test]
    fn test_wide_branch_is_selected_per_string() {
        assert_eq!(estimate_cell_width("中文"), 5.0);
        assert_eq!(estimate_column_width(["X", "ab", "中文"]), 5.0);
        // One wide char weights the whole string, ASCII included.
        assert_eq!(estimate_cell_width("ab中"), 3.0 * 1.5 + 2.0);
        assert_eq!(estimate_cell_width(""), 2.0);
    }

    #[test]
    fn test_estimate_column_widths_include_header() {
        let header = vec!["Name".to_string(), "V".to_string()];
        let rows = vec![
            vec![
                EnumCellValue::String("A".to_string()),
                EnumCellValue::String("12.50".to_string()),
            ],
            vec![EnumCellValue::String("张三".to_string()), EnumCellValue::None],
        ];
        assert_eq!(estimate_column_widths(&header, &rows), vec![6.0, 7.0]);
    }

    #[test]
    fn test_sanitize_sheet_name_replaces_and_truncates() {
        assert_eq!(sanitize_sheet_name("a:b", "_"), "a_b");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
        assert_eq!(sanitize_sheet_name("报表2", "_"), "报表2");
    }

    #[test]
    fn test_sanitize_sheet_name_strips_edge_apostrophes() {
        assert_eq!(sanitize_sheet_name("'Q1'", "_"), "Q1");
        assert_eq!(sanitize_sheet_name("'abc", "_"), "abc");
        assert_eq!(sanitize_sheet_name("it's", "_"), "it's");
        assert_eq!(sanitize_sheet_name("''", "_"), "Sheet");
        let c_name = format!("{}''", "x".repeat(30));
        assert_eq!(sanitize_sheet_name(&c_name, "_"), "x".repeat(30));
    }

    #[test]
    fn test_derive_column_name() {
        assert_eq!(derive_column_name(0), "A");
        assert_eq!(derive_column_name(25), "Z");
        assert_eq!(derive_column_name(26), "AA");
        assert_eq!(derive_column_name(701), "ZZ");
        assert_eq!(derive_column_name(702), "AAA");
    }
}
