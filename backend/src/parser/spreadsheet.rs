//! Spreadsheet reading via calamine.
//!
//! Only the first worksheet is read. Row numbers are absolute sheet rows, so
//! a sheet whose used range starts below row 1 still reports the rows a user
//! would see in Excel.

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;

use super::RawRow;
use crate::error::{FormatError, FormatResult};
use crate::models::CellValue;

/// Date format written for spreadsheet date cells.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Read the non-blank rows of the first worksheet.
pub fn read_spreadsheet(bytes: &[u8]) -> FormatResult<Vec<RawRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| FormatError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(FormatError::NoWorksheet)?
        .map_err(|e| FormatError::Spreadsheet(e.to_string()))?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let first_col = range.start().map_or(0, |(_, col)| col as usize);

    let rows = range
        .rows()
        .enumerate()
        .map(|(offset, cells)| {
            let mut values = vec![CellValue::Empty; first_col];
            values.extend(cells.iter().map(cell_value));
            RawRow { line: first_row + offset + 1, cells: values }
        })
        .filter(|row| !row.is_blank())
        .collect();

    Ok(rows)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => CellValue::Text(date.format(DATE_FORMAT).to_string()),
            None => CellValue::from_text(&cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::from_text(s),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn workbook_bytes(build: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        build(sheet);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_reads_first_sheet_with_absolute_rows() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(2, 0, "Statement").unwrap();
            sheet.write_string(4, 0, "Last Name").unwrap();
            sheet.write_string(4, 1, "Amount").unwrap();
            sheet.write_string(5, 0, "Smith").unwrap();
            sheet.write_number(5, 1, 12.5).unwrap();
        });

        let rows = read_spreadsheet(&bytes).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 3);
        assert_eq!(rows[1].line, 5);
        assert_eq!(rows[2].cells, vec![CellValue::Text("Smith".into()), CellValue::Number(12.5)]);
    }

    #[test]
    fn test_date_cells_become_text() {
        let bytes = workbook_bytes(|sheet| {
            let date = ExcelDateTime::from_ymd(2025, 3, 14).unwrap();
            let format = Format::new().set_num_format("yyyy-mm-dd");
            sheet.write_datetime_with_format(0, 0, &date, &format).unwrap();
        });

        let rows = read_spreadsheet(&bytes).unwrap();
        assert_eq!(rows[0].cells[0], CellValue::Text("03/14/2025".into()));
    }

    #[test]
    fn test_leading_columns_are_kept() {
        let bytes = workbook_bytes(|sheet| {
            sheet.write_string(0, 2, "Header").unwrap();
        });

        let rows = read_spreadsheet(&bytes).unwrap();
        assert_eq!(rows[0].cells.len(), 3);
        assert_eq!(rows[0].cells[2], CellValue::Text("Header".into()));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = read_spreadsheet(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, FormatError::Spreadsheet(_)));
    }
}
