//! Delimited-text reading and delimiter sniffing.

use super::RawRow;
use crate::models::CellValue;

/// Delimiters considered by [`sniff_delimiter`], in tie-break order.
pub const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Rows read from delimited text.
#[derive(Debug, Clone, Default)]
pub struct DelimitedRows {
    /// Non-blank rows in source order.
    pub rows: Vec<RawRow>,
    /// Records the reader could not decode at all.
    pub unreadable: usize,
}

/// Guess the delimiter from the first `window` bytes of `content`.
///
/// For each candidate, count its occurrences (outside double quotes) on every
/// complete line of the sample. The candidate whose most common non-zero
/// count is shared by the most lines wins. Returns `None` when no candidate
/// appears at all.
pub fn sniff_delimiter(content: &str, window: usize) -> Option<char> {
    let sample = sample_window(content, window);
    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    // A cut-off last line would skew the counts.
    if sample.len() < content.len() && lines.len() > 1 {
        lines.pop();
    }

    let mut best: Option<(char, usize, usize)> = None;
    for &candidate in &CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines.iter().map(|l| count_unquoted(l, candidate)).collect();
        let Some((mode, support)) = modal_count(&counts) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, best_support, best_mode)) => {
                support > best_support || (support == best_support && mode > best_mode)
            }
        };
        if better {
            best = Some((candidate, support, mode));
        }
    }

    best.map(|(delimiter, _, _)| delimiter)
}

/// Largest char-boundary prefix of `content` not longer than `window` bytes.
fn sample_window(content: &str, window: usize) -> &str {
    if content.len() <= window {
        return content;
    }
    let mut end = window;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

fn count_unquoted(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Most frequent non-zero value and how many times it occurs.
/// Ties go to the larger value.
fn modal_count(counts: &[usize]) -> Option<(usize, usize)> {
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for &c in counts.iter().filter(|&&c| c > 0) {
        match tally.iter_mut().find(|(value, _)| *value == c) {
            Some((_, n)) => *n += 1,
            None => tally.push((c, 1)),
        }
    }
    tally.into_iter().max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
}

/// Read every non-blank record of `content`.
///
/// Records are returned with their raw widths; width checks happen once the
/// header is known. Blank records (no content in any field) are dropped.
pub fn read_delimited(content: &str, delimiter: char) -> DelimitedRows {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter_byte(delimiter))
        .from_reader(content.as_bytes());

    let mut out = DelimitedRows::default();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(record = index, error = %e, "skipping unreadable record");
                out.unreadable += 1;
                continue;
            }
        };

        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        let row = RawRow {
            line,
            cells: record.iter().map(CellValue::from_text).collect(),
        };
        if !row.is_blank() {
            out.rows.push(row);
        }
    }

    out
}

fn delimiter_byte(delimiter: char) -> u8 {
    if delimiter.is_ascii() {
        delimiter as u8
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "Corporate Card Statement\nPrepared For,ACME\nAccount Number,XXXX-1234\n";

    #[test]
    fn test_sniff_comma() {
        let content = "a,b,c\n1,2,3\n4,5,6";
        assert_eq!(sniff_delimiter(content, 2048), Some(','));
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_text() {
        let content = "Name;Description;Amount\nSmith;Lunch, client;1,50\nJones;Taxi;12,00\n";
        assert_eq!(sniff_delimiter(content, 2048), Some(';'));
    }

    #[test]
    fn test_sniff_tab() {
        let content = "a\tb\tc\n1\t2\t3";
        assert_eq!(sniff_delimiter(content, 2048), Some('\t'));
    }

    #[test]
    fn test_sniff_pipe() {
        let content = "a|b|c\n1|2|3";
        assert_eq!(sniff_delimiter(content, 2048), Some('|'));
    }

    #[test]
    fn test_sniff_ignores_quoted_delimiters() {
        let content = "name;note\n\"Smith\";\"a,b,c,d\"\n\"Jones\";\"e,f,g,h\"\n";
        assert_eq!(sniff_delimiter(content, 2048), Some(';'));
    }

    #[test]
    fn test_sniff_inconclusive() {
        assert_eq!(sniff_delimiter("just one field\nanother", 2048), None);
        assert_eq!(sniff_delimiter("", 2048), None);
    }

    #[test]
    fn test_sniff_window_respects_char_boundaries() {
        let content = "é,é,é\né,é,é\n";
        // Window ends inside a two-byte character.
        assert_eq!(sniff_delimiter(content, 4), Some(','));
        assert_eq!(sniff_delimiter(content, 2), None);
        assert_eq!(sniff_delimiter(content, 64), Some(','));
    }

    #[test]
    fn test_read_delimited_skips_blank_lines() {
        let content = "a,b\n\n,\n1,2\n";
        let rows = read_delimited(content, ',').rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].cells, vec![CellValue::Text("1".into()), CellValue::Text("2".into())]);
    }

    #[test]
    fn test_read_delimited_quoted_fields() {
        let content = "name,amount\n\"Smith, Jr\",\"$1,234.56\"\n";
        let rows = read_delimited(content, ',').rows;
        assert_eq!(rows[1].cells[0], CellValue::Text("Smith, Jr".into()));
        assert_eq!(rows[1].cells[1], CellValue::Text("$1,234.56".into()));
    }

    #[test]
    fn test_sniffed_split_matches_explicit_delimiter() {
        for delimiter in [',', ';', '\t'] {
            let body = ["Last Name", "Amount", "Description"].join(&delimiter.to_string())
                + "\n"
                + &["Smith", "5.00", "Taxi"].join(&delimiter.to_string())
                + "\n"
                + &["Jones", "7.25", "Hotel"].join(&delimiter.to_string())
                + "\n";
            let content = format!("{}{}", PREAMBLE.replace(',', &delimiter.to_string()), body);

            let sniffed = sniff_delimiter(&content, 2048).unwrap();
            assert_eq!(sniffed, delimiter);
            assert_eq!(
                read_delimited(&content, sniffed).rows,
                read_delimited(&content, delimiter).rows
            );
        }
    }
}
