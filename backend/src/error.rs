//! Error types for the statement-to-claims pipeline.
//!
//! The hierarchy follows the pipeline stages:
//!
//! - [`FormatError`] - the statement could not be read as a table
//! - [`SchemaError`] - a required column could not be resolved
//! - [`ArchiveError`] - claim files or the archive could not be written
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP adapter errors
//!
//! Non-fatal conditions (skipped rows, nulled amounts, policy exclusions)
//! are never errors; they are counted in [`crate::models::ConversionReport`].

use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors raised while turning raw bytes into a table.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Statement file could not be read.
    #[error("cannot read statement: {0}")]
    Io(#[from] std::io::Error),

    /// The declared or inferred file kind is not supported.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Spreadsheet could not be opened or read.
    #[error("cannot read spreadsheet: {0}")]
    Spreadsheet(String),

    /// Workbook contains no worksheet.
    #[error("spreadsheet has no worksheet")]
    NoWorksheet,

    /// No bytes, or nothing but blank lines.
    #[error("statement is empty")]
    EmptyStatement,

    /// The statement ends before the expected header row.
    #[error("header row {header_row} not found: statement only has {rows} non-blank rows")]
    HeaderNotFound { header_row: usize, rows: usize },

    /// Delimited reader failure outside of a single data row.
    #[error("cannot read delimited text: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Column Resolution Errors
// =============================================================================

/// Errors raised while mapping semantic roles onto statement columns.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required role matched no column. Carries every available column name.
    #[error(
        "could not detect a '{expected}' column ({role}); available columns: {}",
        available.join(", ")
    )]
    MissingColumn {
        role: String,
        expected: String,
        available: Vec<String>,
    },

    /// A claim schema supplied by configuration is unusable.
    #[error("invalid claim schema: {0}")]
    InvalidClaimSchema(String),
}

impl SchemaError {
    /// Column names available when resolution failed, if any.
    pub fn available_columns(&self) -> &[String] {
        match self {
            SchemaError::MissingColumn { available, .. } => available,
            SchemaError::InvalidClaimSchema(_) => &[],
        }
    }
}

// =============================================================================
// Archive Errors
// =============================================================================

/// Errors raised while serializing claim files or packing the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Returned by [`crate::transform::pipeline::convert`]. Any of these means no
/// archive was produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Every row was excluded, so there is no claim file to produce.
    #[error("no claims to export: {excluded} of {rows} rows were excluded")]
    NoClaims { rows: usize, excluded: usize },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP adapter errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type FormatResult<T> = Result<T, FormatError>;

pub type SchemaResult<T> = Result<T, SchemaError>;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let format_err = FormatError::UnsupportedFileType("statement.pdf".into());
        let pipeline_err: PipelineError = format_err.into();
        assert!(pipeline_err.to_string().contains("unsupported file type"));

        let schema_err = SchemaError::MissingColumn {
            role: "employee_key".into(),
            expected: "Supplemental Cardmember Last Name".into(),
            available: vec!["Date".into(), "Amount".into()],
        };
        let pipeline_err: PipelineError = schema_err.into();
        assert!(pipeline_err.to_string().contains("Supplemental Cardmember Last Name"));
    }

    #[test]
    fn test_missing_column_lists_every_column() {
        let err = SchemaError::MissingColumn {
            role: "amount".into(),
            expected: "Transaction Amount USD".into(),
            available: vec!["Date".into(), "Description".into(), "Card Last Name".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Date, Description, Card Last Name"));
        assert_eq!(err.available_columns().len(), 3);
    }

    #[test]
    fn test_no_claims_message() {
        let err = PipelineError::NoClaims { rows: 4, excluded: 4 };
        assert_eq!(err.to_string(), "no claims to export: 4 of 4 rows were excluded");
    }
}
