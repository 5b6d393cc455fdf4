//! Domain models for the statement-to-claims pipeline.
//!
//! This module contains the data structures passed between pipeline stages:
//!
//! - [`RawStatement`] - uploaded bytes plus the declared [`FileKind`]
//! - [`NormalizedTable`] - header-normalized rows of [`CellValue`]
//! - [`ColumnRoles`] - semantic roles resolved to concrete columns
//! - [`CleanedRow`] - a row with its amount coerced to a number
//! - [`EmployeeGroup`] - rows sharing one employee key
//! - [`ClaimRecord`] - one destination row of a claim file
//! - [`OutputArchive`] - the zipped claim files
//! - [`ConversionReport`] - counts and notices for one run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::api::logs::LogEntry;
use crate::error::{FormatError, FormatResult};

// =============================================================================
// Input
// =============================================================================

/// Kind of statement export, inferred from the file name suffix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// `.csv` and other delimited text.
    Delimited,
    /// `.xls` / `.xlsx` workbooks.
    Spreadsheet,
}

impl FileKind {
    /// Infer the kind from a file name.
    pub fn from_filename(name: &str) -> FormatResult<Self> {
        let extension = Path::new(name.trim())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(FileKind::Delimited),
            Some("xls") | Some("xlsx") => Ok(FileKind::Spreadsheet),
            _ => Err(FormatError::UnsupportedFileType(name.to_string())),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Delimited => write!(f, "delimited text"),
            FileKind::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

/// An uploaded statement. Supplied once by the caller and never mutated.
#[derive(Debug, Clone)]
pub struct RawStatement {
    pub filename: String,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

impl RawStatement {
    /// Build a statement, inferring the kind from `filename`.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> FormatResult<Self> {
        let filename = filename.into();
        let kind = FileKind::from_filename(&filename)?;
        Ok(Self { filename, kind, bytes })
    }

    /// Read a statement from disk.
    pub fn from_path(path: &Path) -> FormatResult<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self::new(filename, bytes)
    }
}

// =============================================================================
// Table
// =============================================================================

/// A single cell as read from the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// Wrap raw text, mapping whitespace-only strings to [`CellValue::Empty`].
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }

    /// Text form of the cell. Integral numbers print without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
            CellValue::Empty => true,
        }
    }
}

/// One data row together with its position in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based row number in the statement, for diagnostics.
    pub line: usize,
    pub cells: Vec<CellValue>,
}

/// Header-normalized table.
///
/// Column names are unique and every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl NormalizedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

// =============================================================================
// Column Roles
// =============================================================================

/// Semantic meaning of a statement column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EmployeeKey,
    Amount,
    Description,
    Date,
    Reference,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::EmployeeKey => "employee_key",
            Role::Amount => "amount",
            Role::Description => "description",
            Role::Date => "date",
            Role::Reference => "reference",
        }
    }

    /// Human-readable column name the role usually carries.
    pub fn expected_name(&self) -> &'static str {
        match self {
            Role::EmployeeKey => "Supplemental Cardmember Last Name",
            Role::Amount => "Transaction Amount USD",
            Role::Description => "Transaction Description",
            Role::Date => "Transaction Date",
            Role::Reference => "Reference",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role bound to a concrete column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    pub name: String,
    pub index: usize,
}

/// Roles resolved for one statement. Derived once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRoles {
    pub employee_key: ResolvedColumn,
    pub amount: ResolvedColumn,
    pub description: Option<ResolvedColumn>,
    pub date: Option<ResolvedColumn>,
    pub reference: Option<ResolvedColumn>,
}

impl ColumnRoles {
    pub fn get(&self, role: Role) -> Option<&ResolvedColumn> {
        match role {
            Role::EmployeeKey => Some(&self.employee_key),
            Role::Amount => Some(&self.amount),
            Role::Description => self.description.as_ref(),
            Role::Date => self.date.as_ref(),
            Role::Reference => self.reference.as_ref(),
        }
    }
}

// =============================================================================
// Cleaned Rows and Groups
// =============================================================================

/// A row after amount coercion and description scrubbing.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRow {
    pub line: usize,
    pub cells: Vec<CellValue>,
    /// `None` when the amount cell could not be parsed.
    pub amount: Option<f64>,
}

impl CleanedRow {
    pub fn cell(&self, column: &ResolvedColumn) -> &CellValue {
        self.cells.get(column.index).unwrap_or(&CellValue::Empty)
    }
}

/// All rows belonging to one employee key.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeGroup {
    /// Exact key value as extracted; never empty.
    pub key: String,
    pub rows: Vec<CleanedRow>,
}

// =============================================================================
// Claims
// =============================================================================

/// One destination cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Text(String),
    Amount(f64),
    Blank,
}

impl ClaimValue {
    /// Text form used in delimited output. Whole cents are written with two
    /// decimals; finer amounts are written in full.
    pub fn to_field(&self) -> String {
        match self {
            ClaimValue::Text(s) => s.clone(),
            ClaimValue::Amount(a) => {
                let cents = format!("{:.2}", a);
                if cents.parse::<f64>().ok() == Some(*a) {
                    cents
                } else {
                    a.to_string()
                }
            }
            ClaimValue::Blank => String::new(),
        }
    }
}

/// One claim file row, ordered like the claim schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimRecord {
    pub values: Vec<ClaimValue>,
}

/// Claim file format selected by the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format '{}' (expected csv or excel)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// =============================================================================
// Output
// =============================================================================

/// One file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub key: String,
    pub file_name: String,
    pub rows: usize,
}

/// Zipped claim files, held in memory.
#[derive(Debug, Clone)]
pub struct OutputArchive {
    pub bytes: Vec<u8>,
    pub entries: Vec<ArchiveEntry>,
}

impl OutputArchive {
    pub fn file_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.file_name.as_str()).collect()
    }
}

/// How the statement was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadInfo {
    pub kind: FileKind,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    /// 0-based index of the header among the statement's non-blank rows.
    pub header_row: usize,
    pub header_detected: bool,
    pub malformed_rows: usize,
}

/// Row accounting for the cleaning stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    pub input_rows: usize,
    pub unparseable_amounts: usize,
    /// Unparseable rows removed because of the drop policy.
    pub unparseable_dropped: usize,
    pub negative_amounts: usize,
    pub retained: usize,
}

/// Summary of one conversion run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub filename: String,
    pub generated_at: DateTime<Utc>,
    pub load: LoadInfo,
    pub row_count: usize,
    pub column_count: usize,
    pub roles: ColumnRoles,
    pub cleaning: CleaningReport,
    pub empty_key_rows: usize,
    pub files: Vec<ArchiveEntry>,
    pub notices: Vec<LogEntry>,
}

impl ConversionReport {
    /// Rows that reached no claim file.
    pub fn excluded_rows(&self) -> usize {
        self.load.malformed_rows
            + self.cleaning.unparseable_dropped
            + self.cleaning.negative_amounts
            + self.empty_key_rows
    }
}
