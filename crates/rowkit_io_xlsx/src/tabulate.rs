//! Record tabulator: field discovery, row emission and the surviving-column layout.

use std::collections::BTreeSet;

use crate::error::ExportError;
use crate::meta::parse_field_annotation_with_issues;
use crate::render::render_field_value;
use crate::spec::{EnumCellValue, SpecExportSettings, SpecFieldDescriptor};
use crate::util::estimate_column_widths;
use crate::value::{EnumFieldValue, RecordSource};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnLayout

/// One surviving column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnSlot {
    /// Position of the field in declaration order.
    pub idx_field: usize,
    /// Position of the column in the final sheet.
    pub idx_column: usize,
    /// Resolved display width.
    pub width: f64,
}

/// Final physical column order, built once after all omissions are known.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecColumnLayout {
    /// Surviving columns in final order.
    pub slots: Vec<SpecColumnSlot>,
    /// Declared field count, omitted fields included.
    pub n_fields: usize,
}

impl SpecColumnLayout {
    pub fn from_descriptors(l_descriptors: &[SpecFieldDescriptor]) -> Self {
        let slots = l_descriptors
            .iter()
            .enumerate()
            .filter(|(_, descriptor)| !descriptor.if_omit)
            .enumerate()
            .map(|(idx_column, (idx_field, _))| SpecColumnSlot {
                idx_field,
                idx_column,
                width: 0.0,
            })
            .collect();
        Self {
            slots,
            n_fields: l_descriptors.len(),
        }
    }

    pub fn n_columns(&self) -> usize {
        self.slots.len()
    }

    /// Field indices without a slot, ascending.
    pub fn derive_omitted_fields(&self) -> Vec<usize> {
        let set_kept: BTreeSet<usize> = self.slots.iter().map(|slot| slot.idx_field).collect();
        (0..self.n_fields)
            .filter(|idx| !set_kept.contains(idx))
            .collect()
    }

    /// Physical indices to remove, one at a time, from a full-width sheet.
    ///
    /// Each entry is `field index - removals already made`.
    pub fn derive_removal_sequence(&self) -> Vec<usize> {
        self.derive_omitted_fields()
            .into_iter()
            .enumerate()
            .map(|(n_removed, idx_field)| idx_field - n_removed)
            .collect()
    }

    /// Spread a surviving-column row back to full width; omitted cells are blank.
    pub fn expand_row(&self, row: &[EnumCellValue]) -> Vec<EnumCellValue> {
        let mut l_full = vec![EnumCellValue::None; self.n_fields];
        for (slot, value) in self.slots.iter().zip(row) {
            l_full[slot.idx_field] = value.clone();
        }
        l_full
    }

    /// Set widths from estimates; an explicit `width=` wins.
    pub fn apply_widths(&mut self, l_estimated: &[f64], l_descriptors: &[SpecFieldDescriptor]) {
        for slot in &mut self.slots {
            let n_estimated = l_estimated.get(slot.idx_column).copied().unwrap_or(0.0);
            slot.width = l_descriptors
                .get(slot.idx_field)
                .and_then(|descriptor| descriptor.width)
                .unwrap_or(n_estimated);
        }
    }

    /// Column count to freeze: through the last `freeze` column.
    pub fn derive_freeze_columns(&self, l_descriptors: &[SpecFieldDescriptor]) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                l_descriptors
                    .get(slot.idx_field)
                    .is_some_and(|descriptor| descriptor.if_freeze)
            })
            .map(|slot| slot.idx_column + 1)
            .max()
            .unwrap_or(0)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Tabulation

/// Result of the discovery phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTablePlan {
    /// One descriptor per declared field.
    pub l_descriptors: Vec<SpecFieldDescriptor>,
    /// Declaration indices of omitted fields.
    pub set_idx_omitted: BTreeSet<usize>,
    /// Titles of surviving fields, in declaration order.
    pub header: Vec<String>,
    /// Surviving-column layout; widths unset until [`apply_column_widths`].
    pub layout: SpecColumnLayout,
    /// Record count found during discovery.
    pub n_records: usize,
    /// Dropped annotation sub-options.
    pub warnings: Vec<String>,
}

/// Discovery phase: validate the collection and parse every field annotation.
pub fn discover_fields<S: RecordSource + ?Sized>(source: &S) -> Result<SpecTablePlan, ExportError> {
    let n_records = source.count_records()?;
    if n_records == 0 {
        return Err(ExportError::EmptyInput);
    }
    let l_schema = source.derive_field_schema()?;

    let mut l_descriptors = Vec::with_capacity(l_schema.len());
    let mut warnings = Vec::new();
    for field in &l_schema {
        let (descriptor, l_issues) =
            parse_field_annotation_with_issues(&field.name, &field.annotation);
        warnings.extend(l_issues);
        l_descriptors.push(descriptor);
    }

    let set_idx_omitted = l_descriptors
        .iter()
        .enumerate()
        .filter(|(_, descriptor)| descriptor.if_omit)
        .map(|(idx, _)| idx)
        .collect();
    let header = l_descriptors
        .iter()
        .filter(|descriptor| !descriptor.if_omit)
        .map(|descriptor| descriptor.title.clone())
        .collect();
    let layout = SpecColumnLayout::from_descriptors(&l_descriptors);

    Ok(SpecTablePlan {
        l_descriptors,
        set_idx_omitted,
        header,
        layout,
        n_records,
        warnings,
    })
}

/// Render one record's surviving fields, in declaration order.
///
/// The record is read as exactly one value per declared field: missing
/// trailing values render blank and extra values are ignored.
pub fn render_record<S: RecordSource + ?Sized>(
    source: &S,
    idx_record: usize,
    plan: &SpecTablePlan,
    settings: &SpecExportSettings,
) -> Vec<EnumCellValue> {
    let (l_values, _) = derive_aligned_values(source, idx_record, plan.l_descriptors.len());
    render_aligned_values(&l_values, plan, settings)
}

/// Emission phase: every record in input order.
///
/// Records whose value count differs from the field count are aligned as in
/// [`render_record`] and reported in `plan.warnings`.
pub fn emit_rows<S: RecordSource + ?Sized>(
    source: &S,
    plan: &mut SpecTablePlan,
    settings: &SpecExportSettings,
) -> Vec<Vec<EnumCellValue>> {
    let n_fields = plan.l_descriptors.len();
    let mut l_warnings = Vec::new();
    let rows = (0..plan.n_records)
        .map(|idx_record| {
            let (l_values, n_values) = derive_aligned_values(source, idx_record, n_fields);
            if n_values != n_fields {
                l_warnings.push(format!(
                    "Record {idx_record} has {n_values} values for {n_fields} fields; row aligned to the fields."
                ));
            }
            render_aligned_values(&l_values, plan, settings)
        })
        .collect();
    plan.warnings.extend(l_warnings);
    rows
}

fn derive_aligned_values<S: RecordSource + ?Sized>(
    source: &S,
    idx_record: usize,
    n_fields: usize,
) -> (Vec<EnumFieldValue<'_>>, usize) {
    let mut l_values = source.derive_record_values(idx_record);
    let n_values = l_values.len();
    l_values.resize_with(n_fields, || EnumFieldValue::None);
    (l_values, n_values)
}

fn render_aligned_values(
    l_values: &[EnumFieldValue<'_>],
    plan: &SpecTablePlan,
    settings: &SpecExportSettings,
) -> Vec<EnumCellValue> {
    l_values
        .iter()
        .zip(&plan.l_descriptors)
        .enumerate()
        .filter(|(idx_field, _)| !plan.set_idx_omitted.contains(idx_field))
        .map(|(_, (value, descriptor))| render_field_value(value, descriptor, settings))
        .collect()
}

/// Width pass over header and emitted rows.
pub fn apply_column_widths(plan: &mut SpecTablePlan, rows: &[Vec<EnumCellValue>]) {
    let l_estimated = estimate_column_widths(&plan.header, rows);
    plan.layout.apply_widths(&l_estimated, &plan.l_descriptors);
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
