//! Sheet sink seam and the in-memory recording sink.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SinkError;
use crate::spec::{EnumCellValue, SpecCellFormat, SpecValidationRule};
use crate::util::derive_column_name;

/// Destination of one exported sheet.
///
/// Column indices are zero-based positions in the sheet as it stands when the
/// directive is issued. Data row `0` is the first row below the header.
pub trait SheetSink {
    fn set_sheet_name(&mut self, name: &str) -> Result<(), SinkError>;
    fn write_header_row(
        &mut self,
        titles: &[String],
        fmt_header: &SpecCellFormat,
    ) -> Result<(), SinkError>;
    fn write_data_row(&mut self, idx_row: usize, values: &[EnumCellValue])
    -> Result<(), SinkError>;
    /// Delete one column; columns to its right shift left by one.
    fn remove_column(&mut self, idx_col: usize) -> Result<(), SinkError>;
    fn set_column_width(&mut self, idx_col: usize, width: f64) -> Result<(), SinkError>;
    fn set_column_format(&mut self, idx_col: usize, fmt: &SpecCellFormat)
    -> Result<(), SinkError>;
    fn set_column_visible(&mut self, idx_col: usize, if_visible: bool) -> Result<(), SinkError>;
    /// Apply `rule` to every data cell of the column.
    fn attach_validation(
        &mut self,
        idx_col: usize,
        rule: &SpecValidationRule,
    ) -> Result<(), SinkError>;
    /// Freeze the first `n_rows` rows and `n_cols` columns.
    fn set_freeze_panes(&mut self, n_rows: usize, n_cols: usize) -> Result<(), SinkError>;
    /// Auto-filter over the header and all data rows.
    fn set_autofilter(&mut self) -> Result<(), SinkError>;
    fn protect(&mut self, password: &str) -> Result<(), SinkError>;
    fn set_active(&mut self, if_active: bool) -> Result<(), SinkError>;
    /// Produce the final document bytes.
    fn serialize(&mut self) -> Result<Vec<u8>, SinkError>;
}

/// Sink that keeps every directive in memory.
///
/// `serialize` emits a JSON snapshot of the sheet state; the protection
/// password itself is never part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheetSink {
    /// Worksheet name.
    pub sheet_name: String,
    /// Header titles.
    pub header: Vec<String>,
    /// Header cell format.
    pub fmt_header: SpecCellFormat,
    /// Data rows, in write order.
    pub rows: Vec<Vec<EnumCellValue>>,
    /// Column widths.
    pub widths: BTreeMap<usize, f64>,
    /// Column cell formats.
    pub formats: BTreeMap<usize, SpecCellFormat>,
    /// Hidden columns.
    pub hidden: BTreeSet<usize>,
    /// Column validation rules.
    pub validations: BTreeMap<usize, SpecValidationRule>,
    /// Frozen `(rows, columns)`.
    pub freeze_panes: Option<(usize, usize)>,
    /// Auto-filter requested.
    pub if_autofilter: bool,
    /// Sheet protection requested.
    pub if_protected: bool,
    /// Protection password.
    pub password: Option<String>,
    /// Active sheet flag.
    pub if_active: bool,
    /// Directive log, in call order.
    pub directives: Vec<String>,
}

impl MemorySheetSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of columns currently in the sheet.
    pub fn n_columns(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .fold(self.header.len(), usize::max)
    }

    fn check_column(&self, idx_col: usize) -> Result<(), SinkError> {
        if idx_col >= self.n_columns() {
            return Err(SinkError::ColumnOutOfRange(idx_col));
        }
        Ok(())
    }

    fn log(&mut self, directive: String) {
        self.directives.push(directive);
    }

    fn derive_snapshot(&self) -> SpecSheetSnapshot<'_> {
        SpecSheetSnapshot {
            sheet_name: &self.sheet_name,
            header: &self.header,
            fmt_header: &self.fmt_header,
            rows: &self.rows,
            widths: &self.widths,
            formats: &self.formats,
            hidden: &self.hidden,
            validations: &self.validations,
            freeze_panes: self.freeze_panes,
            if_autofilter: self.if_autofilter,
            if_protected: self.if_protected,
            if_active: self.if_active,
            directives: &self.directives,
        }
    }
}

/// Serialized view of a [`MemorySheetSink`], without the password.
#[derive(serde::Serialize)]
struct SpecSheetSnapshot<'a> {
    sheet_name: &'a str,
    header: &'a [String],
    fmt_header: &'a SpecCellFormat,
    rows: &'a [Vec<EnumCellValue>],
    widths: &'a BTreeMap<usize, f64>,
    formats: &'a BTreeMap<usize, SpecCellFormat>,
    hidden: &'a BTreeSet<usize>,
    validations: &'a BTreeMap<usize, SpecValidationRule>,
    freeze_panes: Option<(usize, usize)>,
    if_autofilter: bool,
    if_protected: bool,
    if_active: bool,
    directives: &'a [String],
}

impl SheetSink for MemorySheetSink {
    fn set_sheet_name(&mut self, name: &str) -> Result<(), SinkError> {
        self.sheet_name = name.to_string();
        self.log(format!("set_sheet_name {name}"));
        Ok(())
    }

    fn write_header_row(
        &mut self,
        titles: &[String],
        fmt_header: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        self.header = titles.to_vec();
        self.fmt_header = fmt_header.clone();
        self.log("write_header_row".to_string());
        Ok(())
    }

    fn write_data_row(
        &mut self,
        idx_row: usize,
        values: &[EnumCellValue],
    ) -> Result<(), SinkError> {
        if self.rows.len() <= idx_row {
            self.rows.resize(idx_row + 1, Vec::new());
        }
        self.rows[idx_row] = values.to_vec();
        self.log(format!("write_data_row {idx_row}"));
        Ok(())
    }

    fn remove_column(&mut self, idx_col: usize) -> Result<(), SinkError> {
        self.check_column(idx_col)?;
        if idx_col < self.header.len() {
            self.header.remove(idx_col);
        }
        for row in &mut self.rows {
            if idx_col < row.len() {
                row.remove(idx_col);
            }
        }
        self.widths = shift_left_after(std::mem::take(&mut self.widths), idx_col);
        self.formats = shift_left_after(std::mem::take(&mut self.formats), idx_col);
        self.validations = shift_left_after(std::mem::take(&mut self.validations), idx_col);
        self.hidden = self
            .hidden
            .iter()
            .filter(|&&n| n != idx_col)
            .map(|&n| if n > idx_col { n - 1 } else { n })
            .collect();
        self.log(format!("remove_column {}", derive_column_name(idx_col)));
        Ok(())
    }

    fn set_column_width(&mut self, idx_col: usize, width: f64) -> Result<(), SinkError> {
        self.check_column(idx_col)?;
        self.widths.insert(idx_col, width);
        self.log(format!("set_column_width {}", derive_column_name(idx_col)));
        Ok(())
    }

    fn set_column_format(
        &mut self,
        idx_col: usize,
        fmt: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        self.check_column(idx_col)?;
        self.formats.insert(idx_col, fmt.clone());
        self.log(format!("set_column_format {}", derive_column_name(idx_col)));
        Ok(())
    }

    fn set_column_visible(&mut self, idx_col: usize, if_visible: bool) -> Result<(), SinkError> {
        self.check_column(idx_col)?;
        if if_visible {
            self.hidden.remove(&idx_col);
        } else {
            self.hidden.insert(idx_col);
        }
        self.log(format!("set_column_visible {}", derive_column_name(idx_col)));
        Ok(())
    }

    fn attach_validation(
        &mut self,
        idx_col: usize,
        rule: &SpecValidationRule,
    ) -> Result<(), SinkError> {
        self.check_column(idx_col)?;
        self.validations.insert(idx_col, rule.clone());
        self.log(format!("attach_validation {}", derive_column_name(idx_col)));
        Ok(())
    }

    fn set_freeze_panes(&mut self, n_rows: usize, n_cols: usize) -> Result<(), SinkError> {
        self.freeze_panes = Some((n_rows, n_cols));
        self.log("set_freeze_panes".to_string());
        Ok(())
    }

    fn set_autofilter(&mut self) -> Result<(), SinkError> {
        self.if_autofilter = true;
        self.log("set_autofilter".to_string());
        Ok(())
    }

    fn protect(&mut self, password: &str) -> Result<(), SinkError> {
        self.if_protected = true;
        self.password = Some(password.to_string());
        self.log("protect".to_string());
        Ok(())
    }

    fn set_active(&mut self, if_active: bool) -> Result<(), SinkError> {
        self.if_active = if_active;
        self.log("set_active".to_string());
        Ok(())
    }

    fn serialize(&mut self) -> Result<Vec<u8>, SinkError> {
        self.log("serialize".to_string());
        Ok(serde_json::to_vec_pretty(&self.derive_snapshot())?)
    }
}

fn shift_left_after<T>(dict_by_col: BTreeMap<usize, T>, idx_col: usize) -> BTreeMap<usize, T> {
    dict_by_col
        .into_iter()
        .filter(|(n, _)| *n != idx_col)
        .map(|(n, v)| if n > idx_col { (n - 1, v) } else { (n, v) })
        .collect()
}
