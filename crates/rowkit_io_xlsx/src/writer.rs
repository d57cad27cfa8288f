//! XLSX sheet sink backed by `rust_xlsxwriter`.
//!
//! Directives are buffered in a [`MemorySheetSink`] so columns can still be
//! removed after rows are written; the worksheet is materialized on
//! [`SheetSink::serialize`].

use chrono::{Datelike, Timelike};
use rust_xlsxwriter::{
    DataValidation, DataValidationRule, ExcelDateTime, Format, FormatAlign, FormatBorder,
    IntoDataValidationValue, Workbook, Worksheet,
};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, N_WIDTH_EXCEL_COLUMN_MAX};
use crate::error::SinkError;
use crate::sink::{MemorySheetSink, SheetSink};
use crate::spec::{
    EnumCellValue, EnumValidationKind, EnumValidationOperand, EnumValidationOperator,
    SpecCellFormat, SpecValidationRule,
};
use crate::util::{cast_col_num, cast_row_num};

/// Single-worksheet workbook sink.
#[derive(Debug, Clone, Default)]
pub struct XlsxSheetSink {
    grid: MemorySheetSink,
}

impl XlsxSheetSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered sheet state.
    pub fn grid(&self) -> &MemorySheetSink {
        &self.grid
    }

    fn build_worksheet(&self) -> Result<Worksheet, SinkError> {
        let grid = &self.grid;
        let mut worksheet = Worksheet::new();
        if !grid.sheet_name.is_empty() {
            worksheet.set_name(grid.sheet_name.as_str())?;
        }

        let fmt_header = derive_rust_xlsx_format(&grid.fmt_header);
        for (col_idx, title) in grid.header.iter().enumerate() {
            if title.is_empty() {
                worksheet.write_blank(0, cast_col_num(col_idx)?, &fmt_header)?;
            } else {
                worksheet.write_string_with_format(0, cast_col_num(col_idx)?, title, &fmt_header)?;
            }
        }

        let n_ncols = grid.n_columns();
        let l_fmt_by_col: Vec<Format> = (0..n_ncols)
            .map(|col_idx| {
                grid.formats
                    .get(&col_idx)
                    .map(derive_rust_xlsx_format)
                    .unwrap_or_default()
            })
            .collect();
        for (row_idx, row_values) in grid.rows.iter().enumerate() {
            for (col_idx, value) in row_values.iter().enumerate() {
                write_cell_with_format(
                    &mut worksheet,
                    row_idx + 1,
                    col_idx,
                    value,
                    &l_fmt_by_col[col_idx],
                )?;
            }
        }

        for (&col_idx, &width) in &grid.widths {
            worksheet.set_column_width(
                cast_col_num(col_idx)?,
                width.clamp(0.0, N_WIDTH_EXCEL_COLUMN_MAX),
            )?;
        }
        for &col_idx in &grid.hidden {
            worksheet.set_column_hidden(cast_col_num(col_idx)?)?;
        }

        let n_row_last = cast_row_num(grid.rows.len())?;
        if n_row_last > 0 {
            for (&col_idx, rule) in &grid.validations {
                let col_num = cast_col_num(col_idx)?;
                worksheet.add_data_validation(
                    1,
                    col_num,
                    n_row_last,
                    col_num,
                    &derive_data_validation(rule)?,
                )?;
            }
        }

        if let Some((n_rows, n_cols)) = grid.freeze_panes
            && (n_rows > 0 || n_cols > 0)
        {
            worksheet.set_freeze_panes(cast_row_num(n_rows)?, cast_col_num(n_cols)?)?;
        }
        if grid.if_autofilter && n_ncols > 0 {
            worksheet.autofilter(0, 0, n_row_last, cast_col_num(n_ncols - 1)?)?;
        }
        if let Some(password) = &grid.password {
            worksheet.protect_with_password(password);
        }
        worksheet.set_active(grid.if_active);

        Ok(worksheet)
    }
}

impl SheetSink for XlsxSheetSink {
    fn set_sheet_name(&mut self, name: &str) -> Result<(), SinkError> {
        if !name.is_empty() {
            Worksheet::new().set_name(name)?;
        }
        self.grid.set_sheet_name(name)
    }

    fn write_header_row(
        &mut self,
        titles: &[String],
        fmt_header: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        check_column_count(titles.len())?;
        self.grid.write_header_row(titles, fmt_header)
    }

    fn write_data_row(
        &mut self,
        idx_row: usize,
        values: &[EnumCellValue],
    ) -> Result<(), SinkError> {
        // Header occupies the first sheet row.
        if idx_row + 1 >= N_NROWS_EXCEL_MAX {
            return Err(SinkError::LimitExceeded(format!(
                "Excel row limit exceeded: {} > {}",
                idx_row + 2,
                N_NROWS_EXCEL_MAX
            )));
        }
        check_column_count(values.len())?;
        self.grid.write_data_row(idx_row, values)
    }

    fn remove_column(&mut self, idx_col: usize) -> Result<(), SinkError> {
        self.grid.remove_column(idx_col)
    }

    fn set_column_width(&mut self, idx_col: usize, width: f64) -> Result<(), SinkError> {
        self.grid
            .set_column_width(idx_col, width.clamp(0.0, N_WIDTH_EXCEL_COLUMN_MAX))
    }

    fn set_column_format(
        &mut self,
        idx_col: usize,
        fmt: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        self.grid.set_column_format(idx_col, fmt)
    }

    fn set_column_visible(&mut self, idx_col: usize, if_visible: bool) -> Result<(), SinkError> {
        self.grid.set_column_visible(idx_col, if_visible)
    }

    fn attach_validation(
        &mut self,
        idx_col: usize,
        rule: &SpecValidationRule,
    ) -> Result<(), SinkError> {
        // Fail at attach time rather than at serialize.
        derive_data_validation(rule)?;
        self.grid.attach_validation(idx_col, rule)
    }

    fn set_freeze_panes(&mut self, n_rows: usize, n_cols: usize) -> Result<(), SinkError> {
        self.grid.set_freeze_panes(n_rows, n_cols)
    }

    fn set_autofilter(&mut self) -> Result<(), SinkError> {
        self.grid.set_autofilter()
    }

    fn protect(&mut self, password: &str) -> Result<(), SinkError> {
        self.grid.protect(password)
    }

    fn set_active(&mut self, if_active: bool) -> Result<(), SinkError> {
        self.grid.set_active(if_active)
    }

    fn serialize(&mut self) -> Result<Vec<u8>, SinkError> {
        let worksheet = self.build_worksheet()?;
        let mut workbook = Workbook::new();
        workbook.push_worksheet(worksheet);
        Ok(workbook.save_to_buffer()?)
    }
}

fn check_column_count(n_ncols: usize) -> Result<(), SinkError> {
    if n_ncols > N_NCOLS_EXCEL_MAX {
        return Err(SinkError::LimitExceeded(format!(
            "Excel column limit exceeded: {n_ncols} > {N_NCOLS_EXCEL_MAX}"
        )));
    }
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), SinkError> {
    let row_num = cast_row_num(row_idx)?;
    let col_num = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(row_num, col_num, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(row_num, col_num, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(row_num, col_num, *val, format)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean_with_format(row_num, col_num, *val, format)?;
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// #region DataValidation

fn derive_data_validation(rule: &SpecValidationRule) -> Result<DataValidation, SinkError> {
    let mut validation = DataValidation::new();
    validation = match rule.kind {
        EnumValidationKind::List => validation.allow_list_strings(rule.values.as_slice())?,
        EnumValidationKind::Whole => {
            validation.allow_whole_number(derive_validation_rule(rule, EnumValidationOperand::to_i32)?)
        }
        EnumValidationKind::Decimal => {
            validation.allow_decimal_number(derive_validation_rule(rule, EnumValidationOperand::to_f64)?)
        }
        EnumValidationKind::TextLength => {
            validation.allow_text_length(derive_validation_rule(rule, EnumValidationOperand::to_u32)?)
        }
        EnumValidationKind::Date => {
            validation.allow_date(derive_validation_rule(rule, derive_excel_date)?)
        }
        EnumValidationKind::Time => {
            validation.allow_time(derive_validation_rule(rule, derive_excel_time)?)
        }
    };

    if let Some(if_ignore_blank) = rule.ignore_blank {
        validation = validation.ignore_blank(if_ignore_blank);
    }
    if let Some(title) = &rule.error_title {
        validation = validation.set_error_title(title.as_str())?;
    }
    if let Some(message) = &rule.error_message {
        validation = validation.set_error_message(message.as_str())?;
    }
    Ok(validation)
}

fn derive_validation_rule<T: IntoDataValidationValue>(
    rule: &SpecValidationRule,
    cast: impl Fn(&EnumValidationOperand) -> Option<T>,
) -> Result<DataValidationRule<T>, SinkError> {
    let derive_operand = |operand: Option<&EnumValidationOperand>, c_slot: &str| {
        operand.and_then(&cast).ok_or_else(|| {
            SinkError::InvalidValidation(format!(
                "{c_slot} does not fit {:?} validation",
                rule.kind
            ))
        })
    };

    let value1 = derive_operand(rule.value1.as_ref(), "value1")?;
    let value_rule = match rule.operator {
        EnumValidationOperator::Between => {
            DataValidationRule::Between(value1, derive_operand(rule.value2.as_ref(), "value2")?)
        }
        EnumValidationOperator::NotBetween => {
            DataValidationRule::NotBetween(value1, derive_operand(rule.value2.as_ref(), "value2")?)
        }
        EnumValidationOperator::EqualTo => DataValidationRule::EqualTo(value1),
        EnumValidationOperator::NotEqualTo => DataValidationRule::NotEqualTo(value1),
        EnumValidationOperator::GreaterThan => DataValidationRule::GreaterThan(value1),
        EnumValidationOperator::LessThan => DataValidationRule::LessThan(value1),
        EnumValidationOperator::GreaterThanOrEqualTo => {
            DataValidationRule::GreaterThanOrEqualTo(value1)
        }
        EnumValidationOperator::LessThanOrEqualTo => DataValidationRule::LessThanOrEqualTo(value1),
    };
    Ok(value_rule)
}

fn derive_excel_date(operand: &EnumValidationOperand) -> Option<ExcelDateTime> {
    let date = operand.to_naive_date()?;
    ExcelDateTime::from_ymd(
        u16::try_from(date.year()).ok()?,
        date.month() as u8,
        date.day() as u8,
    )
    .ok()
}

fn derive_excel_time(operand: &EnumValidationOperand) -> Option<ExcelDateTime> {
    let time = operand.to_naive_time()?;
    ExcelDateTime::from_hms(time.hour() as u16, time.minute() as u8, time.second()).ok()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormat

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(align) = spec.align.as_deref().and_then(derive_format_align) {
        format = format.set_align(align);
    }
    if let Some(align) = spec.valign.as_deref().and_then(derive_format_valign) {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if let Some(val) = spec.left {
        format = format.set_border_left(derive_format_border(val));
    }
    if let Some(val) = spec.right {
        format = format.set_border_right(derive_format_border(val));
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

/// Border styles by integer code; codes outside the table mean no border.
const TUP_FORMAT_BORDER: [FormatBorder; 14] = [
    FormatBorder::None,
    FormatBorder::Thin,
    FormatBorder::Medium,
    FormatBorder::Dashed,
    FormatBorder::Dotted,
    FormatBorder::Thick,
    FormatBorder::Double,
    FormatBorder::Hair,
    FormatBorder::MediumDashed,
    FormatBorder::DashDot,
    FormatBorder::MediumDashDot,
    FormatBorder::DashDotDot,
    FormatBorder::MediumDashDotDot,
    FormatBorder::SlantDashDot,
];

fn derive_format_border(code: i64) -> FormatBorder {
    usize::try_from(code)
        .ok()
        .and_then(|idx| TUP_FORMAT_BORDER.get(idx).copied())
        .unwrap_or(FormatBorder::None)
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

fn derive_format_valign(valign: &str) -> Option<FormatAlign> {
    match valign.trim().to_ascii_lowercase().as_str() {
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "center" | "vcenter" => Some(FormatAlign::VerticalCenter),
        "justify" | "vjustify" => Some(FormatAlign::VerticalJustify),
        "distributed" | "vdistributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
