//! Shared export specification models.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conf::{
    C_DATETIME_FORMAT_DEFAULT, C_SHEET_NAME_DEFAULT, N_DECIMAL_DIGITS_DEFAULT,
    derive_default_header_format,
};
use crate::util::sanitize_sheet_name;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification, decoded from `style=` annotations and options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment: `general`, `left`, `center`, `right`, `fill`,
    /// `justify`, `center_across` or `distributed`.
    pub align: Option<String>,
    /// Vertical alignment: `top`, `bottom`, `center`, `justify` or `distributed`.
    pub valign: Option<String>,
    /// Border style for all sides, by code: 0 none, 1 thin, 2 medium,
    /// 3 dashed, 4 dotted, 5 thick, 6 double, 7 hair, 8 medium dashed,
    /// 9 dash-dot, 10 medium dash-dot, 11 dash-dot-dot,
    /// 12 medium dash-dot-dot, 13 slant dash-dot.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Top border override, same codes as `border`.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        *self == SpecCellFormat::default()
    }
}

/// Rendered cell value handed to a sheet sink.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum EnumCellValue {
    /// Blank cell.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
}

impl EnumCellValue {
    /// Text shown for this value; the width estimator measures this.
    pub fn to_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(s) => s.clone(),
            EnumCellValue::Number(n) => n.to_string(),
            EnumCellValue::Boolean(true) => "TRUE".to_string(),
            EnumCellValue::Boolean(false) => "FALSE".to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValidationSpecification

/// Data validation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumValidationKind {
    /// Any decimal number.
    Decimal,
    /// Whole number.
    Whole,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Time of day (`HH:MM:SS`).
    Time,
    /// Text length bound.
    TextLength,
    /// Explicit allow-list.
    List,
}

/// Comparison operator for non-list validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumValidationOperator {
    #[default]
    Between,
    NotBetween,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    LessThan,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
}

impl EnumValidationOperator {
    /// Whether the operator takes two operands.
    pub fn if_binary(&self) -> bool {
        matches!(
            self,
            EnumValidationOperator::Between | EnumValidationOperator::NotBetween
        )
    }
}

/// One comparison operand, written either as a JSON number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValidationOperand {
    Number(f64),
    Text(String),
}

impl EnumValidationOperand {
    /// Operand as plain text.
    pub fn to_text(&self) -> String {
        match self {
            EnumValidationOperand::Number(n) => n.to_string(),
            EnumValidationOperand::Text(s) => s.trim().to_string(),
        }
    }

    /// Operand as a finite number, if it is one.
    pub fn to_f64(&self) -> Option<f64> {
        let n_value = match self {
            EnumValidationOperand::Number(n) => *n,
            EnumValidationOperand::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n_value.is_finite().then_some(n_value)
    }

    /// Operand as an `i32` whole number.
    pub fn to_i32(&self) -> Option<i32> {
        let n_value = self.to_f64()?;
        if n_value.fract() != 0.0 || n_value < i32::MIN as f64 || n_value > i32::MAX as f64 {
            return None;
        }
        Some(n_value as i32)
    }

    /// Operand as a `u32` length.
    pub fn to_u32(&self) -> Option<u32> {
        let n_value = self.to_f64()?;
        if n_value.fract() != 0.0 || n_value < 0.0 || n_value > u32::MAX as f64 {
            return None;
        }
        Some(n_value as u32)
    }

    /// Operand as a calendar date (`YYYY-MM-DD`).
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.to_text(), "%Y-%m-%d").ok()
    }

    /// Operand as a time of day (`HH:MM:SS`).
    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.to_text(), "%H:%M:%S").ok()
    }
}

/// Validation rule declared on a field and passed through to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecValidationRule {
    /// Rule category.
    #[serde(rename = "type")]
    pub kind: EnumValidationKind,
    /// Comparison operator; ignored for lists.
    #[serde(default)]
    pub operator: EnumValidationOperator,
    /// First operand.
    #[serde(default)]
    pub value1: Option<EnumValidationOperand>,
    /// Second operand for `between`/`not_between`.
    #[serde(default)]
    pub value2: Option<EnumValidationOperand>,
    /// Allow-list for list rules.
    #[serde(default)]
    pub values: Vec<String>,
    /// Whether blank cells pass validation.
    #[serde(default)]
    pub ignore_blank: Option<bool>,
    /// Title of the error dialog.
    #[serde(default)]
    pub error_title: Option<String>,
    /// Body of the error dialog.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl SpecValidationRule {
    /// Check that operands fit the rule category.
    pub fn check(&self) -> Result<(), String> {
        if self.kind == EnumValidationKind::List {
            if self.values.is_empty() {
                return Err("list validation requires a non-empty `values`.".to_string());
            }
            return Ok(());
        }

        let mut l_operands = vec![self.value1.as_ref()];
        if self.operator.if_binary() {
            l_operands.push(self.value2.as_ref());
        }

        for (n_idx, operand) in l_operands.into_iter().enumerate() {
            let Some(operand) = operand else {
                return Err(format!("validation operand value{} is missing.", n_idx + 1));
            };
            let if_ok = match self.kind {
                EnumValidationKind::Decimal => operand.to_f64().is_some(),
                EnumValidationKind::Whole => operand.to_i32().is_some(),
                EnumValidationKind::TextLength => operand.to_u32().is_some(),
                EnumValidationKind::Date => operand.to_naive_date().is_some(),
                EnumValidationKind::Time => operand.to_naive_time().is_some(),
                EnumValidationKind::List => true,
            };
            if !if_ok {
                return Err(format!(
                    "validation operand value{} {:?} does not fit {:?}.",
                    n_idx + 1,
                    operand.to_text(),
                    self.kind
                ));
            }
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldSpecification

/// Declared field: name plus its raw annotation string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldSchema {
    /// Declared field name.
    pub name: String,
    /// Raw annotation; empty means no metadata.
    pub annotation: String,
}

impl SpecFieldSchema {
    /// Create a schema entry.
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
        }
    }
}

/// Parsed presentation metadata for one field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecFieldDescriptor {
    /// Declared field name.
    pub name: String,
    /// Header title; falls back to `name`.
    pub title: String,
    /// Excluded from header, rows and layout.
    pub if_omit: bool,
    /// Render integers/calendar values as zoned datetimes.
    pub if_timestamp: bool,
    /// Freeze panes through this column.
    pub if_freeze: bool,
    /// Hide this column.
    pub if_hidden: bool,
    /// Explicit column width.
    pub width: Option<f64>,
    /// Excel number format code.
    pub num_format: Option<String>,
    /// Column cell style.
    pub style: Option<SpecCellFormat>,
    /// Validation rule passed through to the sink.
    pub validation: Option<SpecValidationRule>,
    /// Raw value text to display text substitutions.
    pub value_map: Option<BTreeMap<String, String>>,
}

impl SpecFieldDescriptor {
    /// Column format: default style, then field style, then number format.
    pub fn derive_column_format(&self, fmt_default: Option<&SpecCellFormat>) -> SpecCellFormat {
        let mut fmt_column = fmt_default.cloned().unwrap_or_default();
        if let Some(style) = &self.style {
            fmt_column = fmt_column.merge(style);
        }
        if let Some(num_format) = &self.num_format {
            fmt_column = fmt_column.with_(SpecCellFormat {
                num_format: Some(num_format.clone()),
                ..Default::default()
            });
        }
        fmt_column
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// How omitted columns are kept out of the final sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumOmitStrategy {
    /// Never write omitted columns (default).
    #[default]
    Excise,
    /// Write full-width rows, then remove omitted columns from the sink.
    Remove,
}

/// Caller-facing export configuration; `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecExportOptions {
    /// IANA timezone identifier; `None` means system local.
    pub timezone: Option<String>,
    /// Worksheet name.
    pub sheet_name: String,
    /// Fractional digits for decimal fields.
    pub decimal_digits: u32,
    /// `chrono` strftime pattern for timestamp fields.
    pub datetime_format: String,
    /// Header cell format override.
    pub fmt_header: Option<SpecCellFormat>,
    /// Base format for body cells.
    pub fmt_default: Option<SpecCellFormat>,
    /// Sheet protection password.
    pub password: Option<String>,
    /// Add an auto-filter over header and rows.
    pub if_autofilter: bool,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Mark the sheet as active.
    pub if_active_sheet: bool,
    /// Omitted-column strategy.
    pub rule_omit: EnumOmitStrategy,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            timezone: None,
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            decimal_digits: N_DECIMAL_DIGITS_DEFAULT,
            datetime_format: C_DATETIME_FORMAT_DEFAULT.to_string(),
            fmt_header: None,
            fmt_default: None,
            password: None,
            if_autofilter: false,
            if_freeze_header: false,
            if_active_sheet: true,
            rule_omit: EnumOmitStrategy::Excise,
        }
    }
}

impl SpecExportOptions {
    /// Resolve options into immutable settings; fallbacks are reported, never fatal.
    pub fn resolve(&self, report: &mut SpecExportReport) -> SpecExportSettings {
        let timezone = match self.timezone.as_deref() {
            None => EnumTimezone::Local,
            Some(c_name) => EnumTimezone::parse(c_name).unwrap_or_else(|| {
                report.warn(format!(
                    "Unknown timezone {c_name:?}; falling back to system local time."
                ));
                EnumTimezone::Local
            }),
        };

        let datetime_format = if validate_datetime_format(&self.datetime_format) {
            self.datetime_format.clone()
        } else {
            report.warn(format!(
                "Invalid datetime format {:?}; falling back to {C_DATETIME_FORMAT_DEFAULT:?}.",
                self.datetime_format
            ));
            C_DATETIME_FORMAT_DEFAULT.to_string()
        };

        let sheet_name = sanitize_sheet_name(&self.sheet_name, "_");
        if sheet_name != self.sheet_name {
            report.warn(format!(
                "Sheet name {:?} is not valid in Excel; using {sheet_name:?}.",
                self.sheet_name
            ));
        }

        let fmt_header = match &self.fmt_header {
            Some(fmt) => derive_default_header_format().merge(fmt),
            None => derive_default_header_format(),
        };

        SpecExportSettings {
            timezone,
            sheet_name,
            decimal_digits: self.decimal_digits,
            datetime_format,
            fmt_header,
            fmt_default: self.fmt_default.clone(),
            password: self.password.clone().filter(|pw| !pw.is_empty()),
            if_autofilter: self.if_autofilter,
            if_freeze_header: self.if_freeze_header,
            if_active_sheet: self.if_active_sheet,
            rule_omit: self.rule_omit,
        }
    }
}

/// Whether `pattern` is a non-empty strftime pattern `chrono` can format with.
pub fn validate_datetime_format(pattern: &str) -> bool {
    !pattern.is_empty() && StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error))
}

/// Timezone used to display timestamp fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTimezone {
    /// System local time.
    Local,
    /// IANA timezone.
    Named(Tz),
}

impl EnumTimezone {
    /// Parse an IANA identifier; `local` selects system local time.
    pub fn parse(name: &str) -> Option<Self> {
        let c_name = name.trim();
        if c_name.eq_ignore_ascii_case("local") {
            return Some(EnumTimezone::Local);
        }
        c_name.parse::<Tz>().ok().map(EnumTimezone::Named)
    }

    /// Convert `instant` into this zone and format it with `pattern`.
    pub fn format_instant(&self, instant: &DateTime<Utc>, pattern: &str) -> Option<String> {
        match self {
            EnumTimezone::Local => write_formatted(instant.with_timezone(&Local), pattern),
            EnumTimezone::Named(tz) => write_formatted(instant.with_timezone(tz), pattern),
        }
    }
}

fn write_formatted<Z>(instant: DateTime<Z>, pattern: &str) -> Option<String>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    let mut c_out = String::new();
    write!(c_out, "{}", instant.format(pattern)).ok()?;
    Some(c_out)
}

/// Immutable per-call settings resolved from [`SpecExportOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportSettings {
    /// Display timezone for timestamp fields.
    pub timezone: EnumTimezone,
    /// Sanitized worksheet name.
    pub sheet_name: String,
    /// Fractional digits for decimal fields.
    pub decimal_digits: u32,
    /// Validated strftime pattern.
    pub datetime_format: String,
    /// Header cell format.
    pub fmt_header: SpecCellFormat,
    /// Base format for body cells.
    pub fmt_default: Option<SpecCellFormat>,
    /// Sheet protection password.
    pub password: Option<String>,
    /// Add an auto-filter.
    pub if_autofilter: bool,
    /// Freeze the header row.
    pub if_freeze_header: bool,
    /// Mark the sheet as active.
    pub if_active_sheet: bool,
    /// Omitted-column strategy.
    pub rule_omit: EnumOmitStrategy,
}

impl Default for SpecExportSettings {
    fn default() -> Self {
        SpecExportOptions::default().resolve(&mut SpecExportReport::default())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-export call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Final worksheet name.
    pub sheet_name: String,
    /// Data rows written.
    pub n_rows: usize,
    /// Columns in the final layout.
    pub n_columns: usize,
    /// Fields dropped by `omit`.
    pub n_columns_omitted: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

impl Display for SpecExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[XLSX] sheet={:?} rows={} columns={} omitted={} warnings={}",
            self.sheet_name,
            self.n_rows,
            self.n_columns,
            self.n_columns_omitted,
            self.warnings.len()
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_options_resolve_to_defaults() {
        let options: SpecExportOptions = serde_json::from_str("{}").expect("parse options");
        assert_eq!(options, SpecExportOptions::default());

        let mut report = SpecExportReport::default();
        let settings = options.resolve(&mut report);
        assert!(report.warnings.is_empty());
        assert_eq!(settings.sheet_name, "Sheet1");
        assert_eq!(settings.decimal_digits, 2);
        assert_eq!(settings.datetime_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(settings.timezone, EnumTimezone::Local);
        assert_eq!(settings.fmt_header.bold, Some(true));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_local_with_warning() {
        let options = SpecExportOptions {
            timezone: Some("Mars/Olympus_Mons".to_string()),
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let settings = options.resolve(&mut report);
        assert_eq!(settings.timezone, EnumTimezone::Local);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_named_timezone_formats_instant() {
        let tz = EnumTimezone::parse("Asia/Hong_Kong").expect("known zone");
        let instant = DateTime::from_timestamp(0, 0).expect("epoch");
        assert_eq!(
            tz.format_instant(&instant, "%Y-%m-%d %H:%M:%S").as_deref(),
            Some("1970-01-01 08:00:00")
        );
    }

    #[test]
    fn test_invalid_datetime_format_and_sheet_name_are_reported() {
        let options = SpecExportOptions {
            datetime_format: "%Y-%Q".to_string(),
            sheet_name: "Q1/Q2 [draft]".to_string(),
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let settings = options.resolve(&mut report);
        assert_eq!(settings.datetime_format, C_DATETIME_FORMAT_DEFAULT);
        assert_eq!(settings.sheet_name, "Q1_Q2 _draft_");
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_apostrophe_sheet_name_is_sanitized_with_warning() {
        let options = SpecExportOptions {
            sheet_name: "'Q1'".to_string(),
            ..Default::default()
        };
        let mut report = SpecExportReport::default();
        let settings = options.resolve(&mut report);
        assert_eq!(settings.sheet_name, "Q1");
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_validation_rule_check_by_kind() {
        let rule: SpecValidationRule =
            serde_json::from_str(r#"{"type":"whole","operator":"between","value1":1,"value2":"10"}"#)
                .expect("parse rule");
        assert!(rule.check().is_ok());

        let rule: SpecValidationRule =
            serde_json::from_str(r#"{"type":"whole","value1":1.5,"value2":3}"#).expect("parse rule");
        assert!(rule.check().is_err());

        let rule: SpecValidationRule =
            serde_json::from_str(r#"{"type":"date","operator":"greater_than","value1":"2024-02-30"}"#)
                .expect("parse rule");
        assert!(rule.check().is_err());

        let rule: SpecValidationRule =
            serde_json::from_str(r#"{"type":"list","values":[]}"#).expect("parse rule");
        assert!(rule.check().is_err());

        let rule: SpecValidationRule =
            serde_json::from_str(r#"{"type":"time","operator":"less_than","value1":"18:00:00"}"#)
                .expect("parse rule");
        assert!(rule.check().is_ok());
    }

    #[test]
    fn test_column_format_overlays_style_then_num_format() {
        let descriptor = SpecFieldDescriptor {
            style: Some(SpecCellFormat {
                bold: Some(true),
                num_format: Some("0".to_string()),
                ..Default::default()
            }),
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        };
        let fmt_default = SpecCellFormat {
            font_name: Some("Arial".to_string()),
            ..Default::default()
        };
        let fmt = descriptor.derive_column_format(Some(&fmt_default));
        assert_eq!(fmt.font_name.as_deref(), Some("Arial"));
        assert_eq!(fmt.bold, Some(true));
        assert_eq!(fmt.num_format.as_deref(), Some("0.00%"));
    }
}
