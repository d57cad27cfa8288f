//! Export constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecExportOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel column width maximum (character units).
pub const N_WIDTH_EXCEL_COLUMN_MAX: f64 = 255.0;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Sheet name used when none is configured.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";
/// Fractional digits used for decimal fields when none is configured.
pub const N_DECIMAL_DIGITS_DEFAULT: u32 = 2;
/// `chrono` strftime pattern used for timestamp fields when none is configured.
pub const C_DATETIME_FORMAT_DEFAULT: &str = "%Y-%m-%d %H:%M:%S";

/// Padding added to every estimated cell width.
pub const N_WIDTH_CELL_PADDING: f64 = 2.0;
/// Per-character multiplier for strings holding any non-ASCII character.
pub const N_WIDTH_WIDE_CHAR_FACTOR: f64 = 1.5;

/// Build the header cell format applied when options do not override it.
pub fn derive_default_header_format() -> SpecCellFormat {
    SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}

/// Build default export options.
pub fn derive_default_export_options() -> SpecExportOptions {
    SpecExportOptions::default()
}
