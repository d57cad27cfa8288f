//! Record exporter: drives discovery, emission and the sheet sink in fixed order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::conf::derive_default_export_options;
use crate::error::ExportError;
use crate::sink::SheetSink;
use crate::spec::{
    EnumCellValue, EnumOmitStrategy, SpecExportOptions, SpecExportReport, SpecExportSettings,
};
use crate::tabulate::{SpecTablePlan, apply_column_widths, discover_fields, emit_rows};
use crate::util::derive_column_name;
use crate::value::{ExportRecord, JsonRecords, RecordSource};
use crate::writer::XlsxSheetSink;

/// Stateful exporter bound to one resolved configuration.
///
/// Every export call is independent; only reports accumulate.
#[derive(Debug, Clone)]
pub struct RecordExporter {
    settings: SpecExportSettings,
    l_warnings_settings: Vec<String>,
    l_reports: Vec<SpecExportReport>,
}

impl Default for RecordExporter {
    fn default() -> Self {
        Self::new(&derive_default_export_options())
    }
}

impl RecordExporter {
    /// Resolve `options`; fallbacks are logged and carried into every report.
    pub fn new(options: &SpecExportOptions) -> Self {
        let mut report = SpecExportReport::default();
        let settings = options.resolve(&mut report);
        for c_warning in &report.warnings {
            tracing::warn!(sheet_name = %settings.sheet_name, "{c_warning}");
        }
        Self {
            settings,
            l_warnings_settings: report.warnings,
            l_reports: Vec::new(),
        }
    }

    /// Resolved settings.
    pub fn settings(&self) -> &SpecExportSettings {
        &self.settings
    }

    /// Return immutable snapshot of per-export reports.
    pub fn report(&self) -> Vec<SpecExportReport> {
        self.l_reports.clone()
    }

    /// Export typed records to xlsx bytes.
    pub fn export<R: ExportRecord>(&mut self, records: &[R]) -> Result<Vec<u8>, ExportError> {
        let mut sink = XlsxSheetSink::new();
        self.export_to_sink(records, &mut sink)
    }

    /// Export a JSON array of flat objects to xlsx bytes.
    pub fn export_json(
        &mut self,
        data: &Value,
        dict_annotations: BTreeMap<String, String>,
    ) -> Result<Vec<u8>, ExportError> {
        let source = JsonRecords::new(data).with_annotations(dict_annotations);
        let mut sink = XlsxSheetSink::new();
        self.export_to_sink(&source, &mut sink)
    }

    /// Export any record source into any sink; returns the sink's bytes.
    pub fn export_to_sink<S, K>(&mut self, source: &S, sink: &mut K) -> Result<Vec<u8>, ExportError>
    where
        S: RecordSource + ?Sized,
        K: SheetSink + ?Sized,
    {
        let mut plan = discover_fields(source)?;
        for c_issue in &plan.warnings {
            tracing::debug!(sheet_name = %self.settings.sheet_name, "dropped annotation option: {c_issue}");
        }
        let n_warnings_discovery = plan.warnings.len();
        let rows = emit_rows(source, &mut plan, &self.settings);
        for c_warning in &plan.warnings[n_warnings_discovery..] {
            tracing::warn!(sheet_name = %self.settings.sheet_name, "{c_warning}");
        }

        let settings = &self.settings;
        sink.set_sheet_name(&settings.sheet_name)
            .map_err(ExportError::sink("set sheet name"))?;
        match settings.rule_omit {
            EnumOmitStrategy::Excise => write_rows_excised(sink, &plan, &rows, settings)?,
            EnumOmitStrategy::Remove => write_rows_then_remove(sink, &plan, &rows, settings)?,
        }

        apply_column_widths(&mut plan, &rows);
        write_column_layout(sink, &plan, settings)?;
        write_sheet_options(sink, &plan, settings)?;

        let v_bytes = sink
            .serialize()
            .map_err(ExportError::sink("serialize workbook"))?;

        let mut warnings = self.l_warnings_settings.clone();
        warnings.extend(plan.warnings.iter().cloned());
        let report = SpecExportReport {
            sheet_name: self.settings.sheet_name.clone(),
            n_rows: rows.len(),
            n_columns: plan.layout.n_columns(),
            n_columns_omitted: plan.set_idx_omitted.len(),
            warnings,
        };
        tracing::debug!(n_bytes = v_bytes.len(), "{report}");
        self.l_reports.push(report);

        Ok(v_bytes)
    }
}

fn write_rows_excised<K: SheetSink + ?Sized>(
    sink: &mut K,
    plan: &SpecTablePlan,
    rows: &[Vec<EnumCellValue>],
    settings: &SpecExportSettings,
) -> Result<(), ExportError> {
    sink.write_header_row(&plan.header, &settings.fmt_header)
        .map_err(ExportError::sink("write header row"))?;
    for (idx_row, row) in rows.iter().enumerate() {
        sink.write_data_row(idx_row, row)
            .map_err(ExportError::sink(format!("write data row {idx_row}")))?;
    }
    Ok(())
}

/// Full-width header and rows, then omitted columns removed one at a time.
fn write_rows_then_remove<K: SheetSink + ?Sized>(
    sink: &mut K,
    plan: &SpecTablePlan,
    rows: &[Vec<EnumCellValue>],
    settings: &SpecExportSettings,
) -> Result<(), ExportError> {
    let l_titles_full: Vec<String> = plan
        .l_descriptors
        .iter()
        .map(|descriptor| descriptor.title.clone())
        .collect();
    sink.write_header_row(&l_titles_full, &settings.fmt_header)
        .map_err(ExportError::sink("write header row"))?;
    for (idx_row, row) in rows.iter().enumerate() {
        sink.write_data_row(idx_row, &plan.layout.expand_row(row))
            .map_err(ExportError::sink(format!("write data row {idx_row}")))?;
    }
    for idx_col in plan.layout.derive_removal_sequence() {
        sink.remove_column(idx_col).map_err(ExportError::sink(format!(
            "remove column {}",
            derive_column_name(idx_col)
        )))?;
    }
    Ok(())
}

fn write_column_layout<K: SheetSink + ?Sized>(
    sink: &mut K,
    plan: &SpecTablePlan,
    settings: &SpecExportSettings,
) -> Result<(), ExportError> {
    for slot in &plan.layout.slots {
        sink.set_column_width(slot.idx_column, slot.width)
            .map_err(ExportError::sink(format!(
                "set width of column {}",
                derive_column_name(slot.idx_column)
            )))?;
    }

    for slot in &plan.layout.slots {
        let Some(descriptor) = plan.l_descriptors.get(slot.idx_field) else {
            continue;
        };
        let c_col = derive_column_name(slot.idx_column);

        let fmt_column = descriptor.derive_column_format(settings.fmt_default.as_ref());
        if !fmt_column.is_empty() {
            sink.set_column_format(slot.idx_column, &fmt_column)
                .map_err(ExportError::sink(format!("set format of column {c_col}")))?;
        }
        if descriptor.if_hidden {
            sink.set_column_visible(slot.idx_column, false)
                .map_err(ExportError::sink(format!("hide column {c_col}")))?;
        }
        if let Some(rule) = &descriptor.validation {
            sink.attach_validation(slot.idx_column, rule)
                .map_err(ExportError::sink(format!("attach validation to column {c_col}")))?;
        }
    }
    Ok(())
}

fn write_sheet_options<K: SheetSink + ?Sized>(
    sink: &mut K,
    plan: &SpecTablePlan,
    settings: &SpecExportSettings,
) -> Result<(), ExportError> {
    let n_rows_freeze = usize::from(settings.if_freeze_header);
    let n_cols_freeze = plan.layout.derive_freeze_columns(&plan.l_descriptors);
    if n_rows_freeze > 0 || n_cols_freeze > 0 {
        sink.set_freeze_panes(n_rows_freeze, n_cols_freeze)
            .map_err(ExportError::sink("freeze panes"))?;
    }
    if settings.if_autofilter {
        sink.set_autofilter()
            .map_err(ExportError::sink("set autofilter"))?;
    }
    if let Some(password) = &settings.password {
        sink.protect(password)
            .map_err(ExportError::sink("protect sheet"))?;
    }
    sink.set_active(settings.if_active_sheet)
        .map_err(ExportError::sink("set active sheet"))?;
    Ok(())
}
