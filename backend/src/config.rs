//! Pipeline configuration.
//!
//! [`PipelineOptions`] carries every tunable of a run. Defaults match the
//! statement revisions seen so far; the CLI and server build options from
//! flags and `CLAIMS_*` environment variables, or from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::transform::schema::ClaimSchema;

/// Metadata rows above the header in current statement exports.
pub const DEFAULT_PREAMBLE_ROWS: usize = 13;

/// Rows searched for a recognizable header in detect mode.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 50;

/// Bytes sampled when sniffing the delimiter.
pub const DEFAULT_SNIFF_WINDOW: usize = 2048;

/// Rows returned by statement inspection.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Upload limit for the HTTP server.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// How the loader finds the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HeaderLocator {
    /// Header follows exactly `preamble_rows` non-blank rows.
    Fixed { preamble_rows: usize },
    /// First row (within `max_scan_rows`) holding an employee-key column;
    /// `fallback_preamble_rows` when none does.
    Detect {
        max_scan_rows: usize,
        fallback_preamble_rows: usize,
    },
}

impl Default for HeaderLocator {
    fn default() -> Self {
        HeaderLocator::Detect {
            max_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            fallback_preamble_rows: DEFAULT_PREAMBLE_ROWS,
        }
    }
}

/// Options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub header: HeaderLocator,

    /// Force a delimiter instead of sniffing.
    pub delimiter: Option<char>,

    pub sniff_window: usize,

    /// Remove rows whose amount cannot be parsed. When false they are kept
    /// with a blank amount.
    pub drop_unparseable_amounts: bool,

    pub schema: ClaimSchema,

    pub max_preview_rows: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            header: HeaderLocator::default(),
            delimiter: None,
            sniff_window: DEFAULT_SNIFF_WINDOW,
            drop_unparseable_amounts: true,
            schema: ClaimSchema::default(),
            max_preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl PipelineOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(
            opts.header,
            HeaderLocator::Detect { max_scan_rows: 50, fallback_preamble_rows: 13 }
        );
        assert_eq!(opts.sniff_window, 2048);
        assert!(opts.drop_unparseable_amounts);
        assert!(opts.delimiter.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts = PipelineOptions::from_json(
            r#"{ "header": { "mode": "fixed", "preamble_rows": 12 }, "delimiter": ";" }"#,
        )
        .unwrap();
        assert_eq!(opts.header, HeaderLocator::Fixed { preamble_rows: 12 });
        assert_eq!(opts.delimiter, Some(';'));
        assert_eq!(opts.schema, ClaimSchema::default());
    }

    #[test]
    fn test_options_file_round_trip() {
        let opts = PipelineOptions {
            header: HeaderLocator::Fixed { preamble_rows: 12 },
            drop_unparseable_amounts: false,
            ..PipelineOptions::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(opts.to_json().unwrap().as_bytes()).unwrap();

        let loaded = PipelineOptions::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, opts);
    }
}
