//! Claim file serialization and archive packing.
//!
//! Each employee group becomes one claim file, `<key>_AMEX_Claim.<ext>`,
//! written in the schema's column order. All files go into one zip held in
//! memory. A failure on any file aborts the whole archive.

use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::api::logs::RunLog;
use crate::error::{ArchiveError, ArchiveResult};
use crate::models::{ArchiveEntry, ClaimRecord, ClaimValue, ColumnRoles, EmployeeGroup, ExportFormat, OutputArchive};
use crate::transform::grouper::project;
use crate::transform::schema::ClaimSchema;

/// Appended to the employee key in every claim file name.
pub const CLAIM_SUFFIX: &str = "_AMEX_Claim";

/// Download name of the archive.
pub const ARCHIVE_NAME: &str = "Amex_Output.zip";

const SHEET_NAME: &str = "Claims";
const AMOUNT_FORMAT: &str = "#,##0.00";

/// Hands out unique claim file names.
///
/// Names are compared case-insensitively since archives are commonly
/// extracted onto case-insensitive file systems. A taken name gets `_2`,
/// `_3`, … after the key.
#[derive(Debug, Default)]
pub struct FileNamer {
    taken: HashSet<String>,
}

impl FileNamer {
    /// Returns the name and whether it had to be disambiguated.
    pub fn allocate(&mut self, key: &str, extension: &str) -> (String, bool) {
        let base = sanitize_key(key);
        let mut name = format!("{}{}.{}", base, CLAIM_SUFFIX, extension);
        let mut n = 2;
        let mut collided = false;
        while !self.taken.insert(name.to_lowercase()) {
            collided = true;
            name = format!("{}_{}{}.{}", base, n, CLAIM_SUFFIX, extension);
            n += 1;
        }
        (name, collided)
    }
}

/// Make a key safe to use as a file name.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Serialize records as delimited text with a header row.
pub fn write_csv(headers: &[&str], records: &[ClaimRecord]) -> ArchiveResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for record in records {
        writer.write_record(record.values.iter().map(ClaimValue::to_field))?;
    }
    writer.into_inner().map_err(|e| ArchiveError::Io(e.into_error()))
}

/// Serialize records as a single-sheet workbook. Amounts are numeric cells.
pub fn write_xlsx(headers: &[&str], records: &[ClaimRecord]) -> ArchiveResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format(AMOUNT_FORMAT);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in record.values.iter().enumerate() {
            let col = col as u16;
            match value {
                ClaimValue::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
                ClaimValue::Amount(amount) => {
                    sheet.write_number_with_format(row, col, *amount, &money)?;
                }
                ClaimValue::Blank => {}
            }
        }
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

/// Build the archive: one claim file per group, in group order.
pub fn emit(
    groups: &[EmployeeGroup],
    format: ExportFormat,
    schema: &ClaimSchema,
    roles: &ColumnRoles,
    log: &mut RunLog,
) -> ArchiveResult<OutputArchive> {
    let headers = schema.headers();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut namer = FileNamer::default();
    let mut entries = Vec::with_capacity(groups.len());

    for group in groups {
        let records = project(group, schema, roles);
        let content = match format {
            ExportFormat::Csv => write_csv(&headers, &records)?,
            ExportFormat::Xlsx => write_xlsx(&headers, &records)?,
        };

        let (file_name, collided) = namer.allocate(&group.key, format.extension());
        if collided {
            log.warning(format!(
                "Employee key '{}' collides with an earlier file name, writing {}",
                group.key, file_name
            ));
        }

        zip.start_file(file_name.as_str(), entry_options())?;
        zip.write_all(&content)?;

        log.info_indent(format!("{} ({} rows)", file_name, records.len()), 1);
        entries.push(ArchiveEntry { key: group.key.clone(), file_name, rows: records.len() });
    }

    let bytes = zip.finish()?.into_inner();
    log.success(format!("Packed {} claim files into {}", entries.len(), ARCHIVE_NAME));

    Ok(OutputArchive { bytes, entries })
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, CleanedRow, ResolvedColumn};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Read;

    fn roles() -> ColumnRoles {
        ColumnRoles {
            employee_key: ResolvedColumn { name: "Last Name".into(), index: 0 },
            amount: ResolvedColumn { name: "Amount".into(), index: 1 },
            description: Some(ResolvedColumn { name: "Description".into(), index: 2 }),
            date: Some(ResolvedColumn { name: "Date".into(), index: 3 }),
            reference: None,
        }
    }

    fn group(key: &str, amounts: &[f64]) -> EmployeeGroup {
        EmployeeGroup {
            key: key.to_string(),
            rows: amounts
                .iter()
                .enumerate()
                .map(|(i, a)| CleanedRow {
                    line: i + 2,
                    cells: vec![
                        CellValue::from_text(key),
                        CellValue::Number(*a),
                        CellValue::from_text("HOTEL, DOWNTOWN"),
                        CellValue::from_text("03/14/2025"),
                    ],
                    amount: Some(*a),
                })
                .collect(),
        }
    }

    fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key(" O'Brien "), "O'Brien");
        assert_eq!(sanitize_key("Smith/Jones"), "Smith_Jones");
        assert_eq!(sanitize_key("a:b*c?"), "a_b_c_");
        assert_eq!(sanitize_key(".."), "_");
    }

    #[test]
    fn test_file_names_never_collide() {
        let mut namer = FileNamer::default();
        assert_eq!(namer.allocate("Smith", "csv"), ("Smith_AMEX_Claim.csv".to_string(), false));
        assert_eq!(namer.allocate("Smith ", "csv"), ("Smith_2_AMEX_Claim.csv".to_string(), true));
        assert_eq!(namer.allocate("SMITH", "csv"), ("SMITH_3_AMEX_Claim.csv".to_string(), true));
        assert_eq!(namer.allocate("Jones", "csv"), ("Jones_AMEX_Claim.csv".to_string(), false));
    }

    #[test]
    fn test_csv_claim_file() {
        let schema = ClaimSchema::default();
        let records = project(&group("Smith", &[12.5]), &schema, &roles());
        let bytes = write_csv(&schema.headers(), &records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Branch,Date,Ref. Nbr.,Expense Item,Expense Account,Description,Amount,Claim Amount,Paid With,Corporate Card,AR Reference Nbr."
        );
        assert_eq!(
            lines.next().unwrap(),
            "KEC,03/14/2025,\"HOTEL, DOWNTOWN\",,,\"HOTEL, DOWNTOWN\",12.50,12.50,\"Corporate Card, Company Expense\",,"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_xlsx_claim_file() {
        let schema = ClaimSchema::default();
        let records = project(&group("Smith", &[12.5, 3.0]), &schema, &roles());
        let bytes = write_xlsx(&schema.headers(), &records).unwrap();

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range("Claims").unwrap();
        assert_eq!(range.get_size(), (3, 11));
        assert_eq!(range.get_value((0, 6)), Some(&Data::String("Amount".into())));
        assert_eq!(range.get_value((1, 6)), Some(&Data::Float(12.5)));
        assert_eq!(range.get_value((2, 7)), Some(&Data::Float(3.0)));
    }

    #[test]
    fn test_emit_archive() {
        let groups = vec![group("Smith", &[1.0, 2.0, 3.0]), group("Jones", &[4.0, 5.0])];
        let mut log = RunLog::new();
        let archive = emit(&groups, ExportFormat::Csv, &ClaimSchema::default(), &roles(), &mut log).unwrap();

        assert_eq!(archive.file_names(), vec!["Smith_AMEX_Claim.csv", "Jones_AMEX_Claim.csv"]);
        let smith = String::from_utf8(read_entry(&archive.bytes, "Smith_AMEX_Claim.csv")).unwrap();
        assert_eq!(smith.lines().count(), 4);
        let jones = String::from_utf8(read_entry(&archive.bytes, "Jones_AMEX_Claim.csv")).unwrap();
        assert_eq!(jones.lines().count(), 3);
    }

    #[test]
    fn test_emit_disambiguates_collisions() {
        let groups = vec![group("Smith", &[1.0]), group("Smith ", &[2.0])];
        let mut log = RunLog::new();
        let archive = emit(&groups, ExportFormat::Xlsx, &ClaimSchema::default(), &roles(), &mut log).unwrap();

        assert_eq!(archive.file_names(), vec!["Smith_AMEX_Claim.xlsx", "Smith_2_AMEX_Claim.xlsx"]);
        let zip = zip::ZipArchive::new(Cursor::new(&archive.bytes)).unwrap();
        assert_eq!(zip.len(), 2);
        assert!(log.entries().iter().any(|e| e.message.contains("collides")));
    }
}
