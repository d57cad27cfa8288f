//! `rowkit_io_xlsx`:
//! metadata-driven export of uniformly-typed records to a single xlsx sheet.
//!
//! Each field carries an annotation string (`title=姓名;width=12`, `omit`,
//! `timestamp`, ...) that decides its header, rendering and column layout.
//!
//! Modules:
//! - `conf`     : constants and default presets
//! - `spec`     : options/settings/descriptor/report models
//! - `error`    : export and sink error types
//! - `meta`     : field annotation parser
//! - `value`    : record model and record sources
//! - `render`   : field value formatter
//! - `tabulate` : field discovery, row emission, column layout
//! - `util`     : width estimation and small helpers
//! - `sink`     : sheet sink trait and in-memory sink
//! - `writer`   : `rust_xlsxwriter`-backed sink
//! - `export`   : exporter driving the sink
pub mod conf;
pub mod error;
pub mod export;
pub mod meta;
pub mod render;
pub mod sink;
pub mod spec;
pub mod tabulate;
pub mod util;
pub mod value;
pub mod writer;

pub use conf::{
    C_DATETIME_FORMAT_DEFAULT, C_SHEET_NAME_DEFAULT, N_DECIMAL_DIGITS_DEFAULT,
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use error::{ExportError, SinkError};
pub use export::RecordExporter;
pub use meta::{parse_field_annotation, parse_field_annotation_with_issues};
pub use render::{format_decimal_fixed, render_field_value};
pub use sink::{MemorySheetSink, SheetSink};
pub use spec::{
    EnumCellValue, EnumOmitStrategy, EnumTimezone, EnumValidationKind, EnumValidationOperand,
    EnumValidationOperator, SpecCellFormat, SpecExportOptions, SpecExportReport,
    SpecExportSettings, SpecFieldDescriptor, SpecFieldSchema, SpecValidationRule,
};
pub use tabulate::{SpecColumnLayout, SpecColumnSlot, SpecTablePlan};
pub use util::{estimate_cell_width, estimate_column_width, sanitize_sheet_name};
pub use value::{CellExport, EnumFieldValue, ExportRecord, JsonRecords, RecordSource};
pub use writer::XlsxSheetSink;
