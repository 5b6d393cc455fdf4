//! High-level pipeline API: statement in, claim archive out.
//!
//! [`convert`] runs every stage in order on one thread:
//!
//! 1. Load the statement and locate its header
//! 2. Resolve the employee-key, amount and optional columns
//! 3. Clean amounts and scrub descriptions
//! 4. Partition rows by employee
//! 5. Project each group onto the claim schema and pack the archive
//!
//! A fatal error at any stage returns before an archive exists. Skipped and
//! excluded rows are counted in the [`ConversionReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use amex_claims::{convert_file, ExportFormat, PipelineOptions};
//! use std::path::Path;
//!
//! let outcome = convert_file(Path::new("March.csv"), ExportFormat::Csv, &PipelineOptions::default())?;
//! std::fs::write("Amex_Output.zip", &outcome.archive.bytes)?;
//! ```

use serde::Serialize;
use std::path::Path;

use super::cleaner::clean;
use super::grouper::partition;
use super::resolver::{is_header_row, resolve};
use crate::api::logs::{LogEntry, RunLog};
use crate::archive::emit;
use crate::config::PipelineOptions;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ColumnRoles, ConversionReport, ExportFormat, LoadInfo, OutputArchive, RawStatement};
use crate::parser::{load, LoadedTable};

/// Archive and report of a successful run.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub archive: OutputArchive,
    pub report: ConversionReport,
}

/// What the loader and resolver make of a statement, without converting it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementPreview {
    pub filename: String,
    pub load: LoadInfo,
    pub columns: Vec<String>,
    pub row_count: usize,
    /// `None` when a required role is missing; see `role_error`.
    pub roles: Option<ColumnRoles>,
    pub role_error: Option<String>,
    /// First rows as text, in column order.
    pub rows: Vec<Vec<String>>,
    pub notices: Vec<LogEntry>,
}

/// Convert a statement into per-employee claim files.
pub fn convert(
    statement: &RawStatement,
    format: ExportFormat,
    options: &PipelineOptions,
) -> PipelineResult<ConversionOutcome> {
    let mut log = RunLog::new();
    match run(statement, format, options, &mut log) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log.error(e.to_string());
            Err(e)
        }
    }
}

/// Read a statement from disk and convert it.
pub fn convert_file(
    path: &Path,
    format: ExportFormat,
    options: &PipelineOptions,
) -> PipelineResult<ConversionOutcome> {
    let statement = RawStatement::from_path(path)?;
    convert(&statement, format, options)
}

fn run(
    statement: &RawStatement,
    format: ExportFormat,
    options: &PipelineOptions,
    log: &mut RunLog,
) -> PipelineResult<ConversionOutcome> {
    options.schema.validate()?;

    log.info(format!("Reading statement {}", statement.filename));
    let LoadedTable { table, info } = load(statement, options, is_header_row, log)?;

    let roles = resolve(&table.columns)?;
    log_roles(&roles, log);

    log.info(format!("Cleaning {} rows...", table.row_count()));
    let (rows, cleaning) = clean(&table, &roles, options.drop_unparseable_amounts, log);

    let partition = partition(rows, &roles.employee_key);
    let empty_key_rows = partition.unkeyed.len();
    if empty_key_rows > 0 {
        log.warning(format!("Excluded {} rows with no cardmember last name", empty_key_rows));
    }

    if partition.groups.is_empty() {
        return Err(PipelineError::NoClaims {
            rows: table.row_count(),
            excluded: cleaning.input_rows - cleaning.retained + empty_key_rows,
        });
    }
    log.success(format!("Found {} employees", partition.groups.len()));

    log.info(format!("Writing {} claim files...", format));
    let archive = emit(&partition.groups, format, &options.schema, &roles, log)?;

    let report = ConversionReport {
        filename: statement.filename.clone(),
        generated_at: chrono::Utc::now(),
        load: info,
        row_count: table.row_count(),
        column_count: table.column_count(),
        roles,
        cleaning,
        empty_key_rows,
        files: archive.entries.clone(),
        notices: Vec::new(),
    };
    if report.excluded_rows() > 0 {
        log.info(format!("{} rows excluded in total", report.excluded_rows()));
    }

    let report = ConversionReport { notices: log.entries().to_vec(), ..report };
    Ok(ConversionOutcome { archive, report })
}

fn log_roles(roles: &ColumnRoles, log: &mut RunLog) {
    log.success(format!("Detected employee last name column: {}", roles.employee_key.name));
    log.success(format!("Detected amount column: {}", roles.amount.name));
    match &roles.date {
        Some(c) => log.info_indent(format!("Date column: {}", c.name), 1),
        None => log.warning("No transaction date column, Date will be blank"),
    }
    match &roles.description {
        Some(c) => log.info_indent(format!("Description column: {}", c.name), 1),
        None => log.warning("No description column, Description will be blank"),
    }
    if let Some(c) = &roles.reference {
        log.info_indent(format!("Reference column: {}", c.name), 1);
    }
}

/// Load a statement and resolve its roles without converting it.
///
/// Only unreadable input is an error; a failed role resolution is reported
/// in the preview.
pub fn inspect(statement: &RawStatement, options: &PipelineOptions) -> PipelineResult<StatementPreview> {
    let mut log = RunLog::new();
    let LoadedTable { table, info } = load(statement, options, is_header_row, &mut log)?;

    let (roles, role_error) = match resolve(&table.columns) {
        Ok(roles) => {
            log_roles(&roles, &mut log);
            (Some(roles), None)
        }
        Err(e) => {
            log.error(e.to_string());
            (None, Some(e.to_string()))
        }
    };

    let rows = table
        .rows
        .iter()
        .take(options.max_preview_rows)
        .map(|r| r.cells.iter().map(|c| c.as_text()).collect())
        .collect();

    Ok(StatementPreview {
        filename: statement.filename.clone(),
        load: info,
        row_count: table.row_count(),
        columns: table.columns,
        roles,
        role_error,
        rows,
        notices: log.into_entries(),
    })
}
