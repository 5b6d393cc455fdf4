//! Statement loader.
//!
//! Turns a [`RawStatement`] into a [`NormalizedTable`]:
//!
//! ```text
//! bytes ──▶ decode / open workbook ──▶ non-blank rows ──▶ locate header ──▶ table
//! ```
//!
//! Delimited text is decoded (UTF-8 first, then detected legacy encodings),
//! its delimiter sniffed from a leading window. Spreadsheets are read from the
//! first worksheet. Both paths then share header location and normalization.

pub mod delimited;
pub mod header;
pub mod spreadsheet;

use crate::api::logs::RunLog;
use crate::config::{HeaderLocator, PipelineOptions};
use crate::error::{FormatError, FormatResult};
use crate::models::{CellValue, FileKind, LoadInfo, NormalizedTable, RawStatement, TableRow};

pub use delimited::{read_delimited, sniff_delimiter, DelimitedRows};
pub use header::{locate_header, normalize_header, normalize_headers};
pub use spreadsheet::read_spreadsheet;

/// A non-blank row before the header has been located.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based row number in the source.
    pub line: usize,
    pub cells: Vec<CellValue>,
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

/// A loaded statement with the details of how it was read.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: NormalizedTable,
    pub info: LoadInfo,
}

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 wins outright; otherwise chardet picks between the western
/// single-byte encodings statement exports use.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        _ => "windows-1252".to_string(),
    }
}

/// Decode bytes with the given encoding. Never fails: undecodable sequences
/// become replacement characters.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Load a statement into a header-normalized table.
///
/// `is_header_row` recognizes the real header when the locator is in detect
/// mode; it receives the normalized cell texts of a candidate row.
pub fn load<F>(
    statement: &RawStatement,
    options: &PipelineOptions,
    is_header_row: F,
    log: &mut RunLog,
) -> FormatResult<LoadedTable>
where
    F: Fn(&[String]) -> bool,
{
    if statement.bytes.is_empty() {
        return Err(FormatError::EmptyStatement);
    }

    let (rows, encoding, delimiter, skipped) = match statement.kind {
        FileKind::Delimited => {
            let encoding = detect_encoding(&statement.bytes);
            let content = decode_content(&statement.bytes, &encoding);
            let delimiter = match options.delimiter {
                Some(d) => d,
                None => sniff_delimiter(&content, options.sniff_window).unwrap_or(','),
            };
            log.success(format!("Detected encoding: {}", encoding));
            log.info(format!("Detected delimiter: '{}'", format_delimiter(delimiter)));

            let DelimitedRows { rows, unreadable } = read_delimited(&content, delimiter);
            (rows, Some(encoding), Some(delimiter), unreadable)
        }
        FileKind::Spreadsheet => {
            log.info("Detected file type: spreadsheet");
            (read_spreadsheet(&statement.bytes)?, None, None, 0)
        }
    };

    if rows.is_empty() {
        return Err(FormatError::EmptyStatement);
    }

    let (header_row, header_detected) = locate_header(&rows, &options.header, is_header_row)?;
    if header_detected {
        log.success(format!(
            "Found header on row {} ({} preamble rows skipped)",
            rows[header_row].line, header_row
        ));
    } else if let HeaderLocator::Detect { .. } = options.header {
        log.warning(format!(
            "Header not recognized, using fixed preamble of {} rows",
            header_row
        ));
    }

    let width_is_strict = statement.kind == FileKind::Delimited;
    let (table, malformed) = build_table(&rows, header_row, width_is_strict);
    let malformed_rows = malformed + skipped;
    if malformed_rows > 0 {
        log.warning(format!("Skipped {} malformed rows", malformed_rows));
    }

    log.success(format!(
        "Loaded {} rows with {} columns",
        table.row_count(),
        table.column_count()
    ));

    Ok(LoadedTable {
        table,
        info: LoadInfo {
            kind: statement.kind,
            encoding,
            delimiter,
            header_row,
            header_detected,
            malformed_rows,
        },
    })
}

/// Split located rows into normalized header and data.
///
/// With `strict_width`, rows carrying non-blank cells beyond the header width
/// are malformed and skipped. Otherwise the table widens and the extra
/// columns get placeholder names. Short rows are padded with empty cells.
fn build_table(rows: &[RawRow], header_row: usize, strict_width: bool) -> (NormalizedTable, usize) {
    let header_cells = &rows[header_row].cells;
    let data = &rows[header_row + 1..];

    let width = if strict_width {
        header_cells.len()
    } else {
        data.iter()
            .map(|r| last_filled(&r.cells))
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0)
    };

    let raw_headers: Vec<String> = (0..width)
        .map(|i| header_cells.get(i).map(CellValue::as_text).unwrap_or_default())
        .collect();
    let columns = normalize_headers(&raw_headers);

    let mut malformed = 0;
    let mut table_rows = Vec::with_capacity(data.len());
    for row in data {
        if last_filled(&row.cells) > width {
            malformed += 1;
            continue;
        }
        let mut cells: Vec<CellValue> = row.cells.iter().take(width).cloned().collect();
        cells.resize(width, CellValue::Empty);
        table_rows.push(TableRow { line: row.line, cells });
    }

    (NormalizedTable { columns, rows: table_rows }, malformed)
}

/// Number of cells up to and including the last non-blank one.
fn last_filled(cells: &[CellValue]) -> usize {
    cells.iter().rposition(|c| !c.is_blank()).map_or(0, |i| i + 1)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: usize, cells: &[&str]) -> RawRow {
        RawRow { line, cells: cells.iter().map(|c| CellValue::from_text(c)).collect() }
    }

    fn statement(name: &str, content: &str) -> RawStatement {
        RawStatement::new(name, content.as_bytes().to_vec()).unwrap()
    }

    fn fixed(preamble_rows: usize) -> PipelineOptions {
        PipelineOptions {
            header: HeaderLocator::Fixed { preamble_rows },
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let encoding = detect_encoding(bytes);
        assert_ne!(encoding, "utf-8");
        let decoded = decode_content(bytes, &encoding);
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let bytes = "\u{feff}Date,Amount".as_bytes();
        assert_eq!(detect_encoding(bytes), "utf-8");
        assert_eq!(decode_content(bytes, "utf-8"), "Date,Amount");
    }

    #[test]
    fn test_build_table_pads_short_rows() {
        let rows = vec![row(1, &["Name", "Amount", "Note"]), row(2, &["Smith", "5"])];
        let (table, malformed) = build_table(&rows, 0, true);
        assert_eq!(malformed, 0);
        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells[2], CellValue::Empty);
    }

    #[test]
    fn test_build_table_skips_long_rows() {
        let rows = vec![
            row(1, &["Name", "Amount"]),
            row(2, &["Smith", "5", "extra"]),
            row(3, &["Jones", "7", ""]),
        ];
        let (table, malformed) = build_table(&rows, 0, true);
        assert_eq!(malformed, 1);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0].line, 3);
    }

    #[test]
    fn test_build_table_widens_spreadsheets() {
        let rows = vec![row(1, &["Name", "Amount"]), row(2, &["Smith", "5", "memo"])];
        let (table, malformed) = build_table(&rows, 0, false);
        assert_eq!(malformed, 0);
        assert_eq!(table.columns, vec!["Name", "Amount", "Unnamed: 2"]);
    }

    #[test]
    fn test_load_with_fixed_preamble() {
        let csv = "Statement,March\nAccount,123\nLast Name,Amount\nSmith,$5.00\n";
        let mut log = RunLog::new();
        let loaded = load(&statement("s.csv", csv), &fixed(2), |_| false, &mut log).unwrap();

        assert_eq!(loaded.table.columns, vec!["Last Name", "Amount"]);
        assert_eq!(loaded.table.row_count(), 1);
        assert_eq!(loaded.info.delimiter, Some(','));
        assert!(!loaded.info.header_detected);
        assert!(log.entries().iter().any(|e| e.message.contains("Detected delimiter")));
    }

    #[test]
    fn test_load_header_past_end() {
        let csv = "a,b\n1,2\n";
        let mut log = RunLog::new();
        let err = load(&statement("s.csv", csv), &fixed(13), |_| false, &mut log).unwrap_err();
        assert!(matches!(err, FormatError::HeaderNotFound { header_row: 13, rows: 2 }));
    }

    #[test]
    fn test_load_empty_statement() {
        let mut log = RunLog::new();
        let err = load(&statement("s.csv", ""), &fixed(0), |_| false, &mut log).unwrap_err();
        assert!(matches!(err, FormatError::EmptyStatement));

        let err = load(&statement("s.csv", "\n\n"), &fixed(0), |_| false, &mut log).unwrap_err();
        assert!(matches!(err, FormatError::EmptyStatement));
    }

    #[test]
    fn test_explicit_delimiter_overrides_sniffing() {
        let csv = "a;b\n1;2\n";
        let options = PipelineOptions { delimiter: Some(','), ..fixed(0) };
        let mut log = RunLog::new();
        let loaded = load(&statement("s.csv", csv), &options, |_| false, &mut log).unwrap();
        assert_eq!(loaded.table.columns, vec!["a;b"]);
    }
}
