//! Header normalization and header-row location.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::RawRow;
use crate::config::HeaderLocator;
use crate::error::{FormatError, FormatResult};
use crate::models::CellValue;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Canonicalize one column name.
///
/// Newlines become spaces, whitespace runs collapse to one space, and the
/// result is trimmed. Case is preserved.
pub fn normalize_header(raw: &str) -> String {
    let flattened = raw.replace(['\r', '\n'], " ");
    WHITESPACE.replace_all(&flattened, " ").trim().to_string()
}

/// Normalize a header row, keeping names unique and in order.
///
/// Empty names become `Unnamed: <index>`; a name seen before gets a `.1`,
/// `.2`, … suffix. Already-normalized input comes back unchanged.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for (index, name) in raw.iter().enumerate() {
        let mut normalized = normalize_header(name);
        if normalized.is_empty() {
            normalized = format!("Unnamed: {}", index);
        }

        let mut candidate = normalized.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", normalized, suffix);
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// Find the header among the non-blank `rows`.
///
/// Returns the header's index and whether it was recognized by
/// `is_header_row` (as opposed to taken from a fixed preamble count).
pub fn locate_header<F>(
    rows: &[RawRow],
    locator: &HeaderLocator,
    is_header_row: F,
) -> FormatResult<(usize, bool)>
where
    F: Fn(&[String]) -> bool,
{
    let (index, detected) = match *locator {
        HeaderLocator::Fixed { preamble_rows } => (preamble_rows, false),
        HeaderLocator::Detect { max_scan_rows, fallback_preamble_rows } => {
            let found = rows.iter().take(max_scan_rows).position(|row| {
                let names: Vec<String> = row
                    .cells
                    .iter()
                    .map(|c| normalize_header(&CellValue::as_text(c)))
                    .collect();
                is_header_row(&names)
            });
            match found {
                Some(i) => (i, true),
                None => (fallback_preamble_rows, false),
            }
        }
    };

    if index >= rows.len() {
        return Err(FormatError::HeaderNotFound { header_row: index, rows: rows.len() });
    }
    Ok((index, detected))
}
