//! Export error taxonomy.

use rust_xlsxwriter::XlsxError;
use thiserror::Error;

/// Fatal export failures.
///
/// The first three are raised only while discovering fields; nothing is
/// written when they occur.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Input is not an ordered collection of records.
    #[error("data must be a sequence of records")]
    NotASequence,
    /// Input collection has no records.
    #[error("data is empty")]
    EmptyInput,
    /// Collection elements are not flat field-bearing records.
    #[error("element of data must be a flat record")]
    ElementNotRecord,
    /// A sheet sink directive failed.
    #[error("error {context}: {source}")]
    Sink {
        /// Operation and row/column that failed.
        context: String,
        /// Underlying sink failure.
        #[source]
        source: SinkError,
    },
}

impl ExportError {
    /// Wrap a sink failure with the operation that produced it.
    pub fn sink(context: impl Into<String>) -> impl FnOnce(SinkError) -> ExportError {
        let context = context.into();
        move |source| ExportError::Sink { context, source }
    }
}

/// Failures reported by a [`crate::sink::SheetSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// Workbook encoder failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
    /// Snapshot encoding failure.
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),
    /// Excel row/column limit exceeded.
    #[error("{0}")]
    LimitExceeded(String),
    /// Validation rule the encoder cannot express.
    #[error("invalid validation rule: {0}")]
    InvalidValidation(String),
    /// Directive names a column the sheet does not have.
    #[error("column index {0} is out of range")]
    ColumnOutOfRange(usize),
}
