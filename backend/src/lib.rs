//! # amex-claims - Corporate card statement to per-employee expense claims
//!
//! Reads an Amex corporate card statement export (CSV or Excel), finds the
//! real header under the statement's metadata block, and writes one
//! Acumatica expense-claim file per supplemental cardmember, zipped.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Statement  │──▶│   Parser    │──▶│  Resolver   │──▶│  Cleaner +  │──▶│   Archive   │
//! │ (csv/xlsx)  │   │ (enc, hdr)  │   │   (roles)   │   │   Grouper   │   │    (zip)    │
//! └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amex_claims::{convert_file, ExportFormat, PipelineOptions};
//! use std::path::Path;
//!
//! let outcome = convert_file(Path::new("March.csv"), ExportFormat::Csv, &PipelineOptions::default())?;
//! println!("Wrote {} claim files", outcome.archive.entries.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (RawStatement, NormalizedTable, ClaimRecord)
//! - [`config`] - Pipeline options
//! - [`parser`] - Statement loading with encoding, delimiter and header detection
//! - [`transform`] - Role resolution, cleaning, grouping, and the pipeline
//! - [`archive`] - Claim file writers and zip packing
//! - [`api`] - HTTP API server and notice stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod archive;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ArchiveError,
    FormatError,
    PipelineError,
    SchemaError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CellValue,
    ClaimRecord,
    ClaimValue,
    ColumnRoles,
    ConversionReport,
    EmployeeGroup,
    ExportFormat,
    FileKind,
    NormalizedTable,
    OutputArchive,
    RawStatement,
    Role,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{HeaderLocator, PipelineOptions};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    load,
    detect_encoding,
    decode_content,
    sniff_delimiter,
    normalize_header,
    normalize_headers,
    LoadedTable,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    clean,
    partition,
    project,
    resolve,
    ClaimSchema,
    ClaimField,
    FieldSource,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert,
    convert_file,
    inspect,
    ConversionOutcome,
    StatementPreview,
};

// =============================================================================
// Re-exports - Archive
// =============================================================================

pub use archive::emit;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::logs::{LogEntry, LogLevel, RunLog};

// Server
pub mod server {
    pub use crate::api::server::{start_server, ServerConfig};
}
