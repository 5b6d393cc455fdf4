//! Amount coercion and description scrubbing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::logs::RunLog;
use crate::models::{CellValue, CleanedRow, CleaningReport, ColumnRoles, NormalizedTable};

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Parse a currency cell. `$` and `,` are stripped before parsing; anything
/// that still isn't a finite number yields `None`. Zero is always positive.
pub fn parse_amount(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.replace(['$', ','], "").trim().parse::<f64>().ok()?,
        CellValue::Empty => return None,
    };
    let value = if value == 0.0 { 0.0 } else { value };
    value.is_finite().then_some(value)
}

/// Remove every run of digits, leaving all other characters in place.
pub fn scrub_digits(text: &str) -> String {
    DIGIT_RUN.replace_all(text, "").into_owned()
}

/// Clean every table row.
///
/// Rows with a negative amount are excluded. Rows whose amount does not parse
/// are excluded when `drop_unparseable` is set and kept with no amount
/// otherwise. Text in the description column has its digits scrubbed.
pub fn clean(
    table: &NormalizedTable,
    roles: &ColumnRoles,
    drop_unparseable: bool,
    log: &mut RunLog,
) -> (Vec<CleanedRow>, CleaningReport) {
    let mut report = CleaningReport { input_rows: table.row_count(), ..CleaningReport::default() };
    let mut rows = Vec::with_capacity(table.row_count());

    for row in &table.rows {
        let amount = parse_amount(row.cells.get(roles.amount.index).unwrap_or(&CellValue::Empty));
        match amount {
            None => {
                report.unparseable_amounts += 1;
                tracing::debug!(line = row.line, "unparseable amount");
                if drop_unparseable {
                    report.unparseable_dropped += 1;
                    continue;
                }
            }
            Some(a) if a < 0.0 => {
                report.negative_amounts += 1;
                continue;
            }
            Some(_) => {}
        }

        let mut cells = row.cells.clone();
        if let Some(description) = &roles.description {
            if let Some(CellValue::Text(text)) = cells.get_mut(description.index) {
                *text = scrub_digits(text);
            }
        }
        rows.push(CleanedRow { line: row.line, cells, amount });
    }

    report.retained = rows.len();

    if report.unparseable_amounts > 0 {
        let action = if drop_unparseable { "excluded" } else { "kept with a blank amount" };
        log.warning(format!(
            "{} rows with an unparseable amount {}",
            report.unparseable_amounts, action
        ));
    }
    if report.negative_amounts > 0 {
        log.warning(format!("Excluded {} negative-amount rows", report.negative_amounts));
    }
    log.info(format!("{} of {} rows retained after cleaning", report.retained, report.input_rows));

    (rows, report)
}
