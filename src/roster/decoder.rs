//! Spreadsheet decoding.
//!
//! Turns an uploaded roster blob into [`RawRow`]s keyed by the header labels
//! found in the first row. Binary workbooks (xlsx, xlsm, xlsb, xls, ods) go
//! through `calamine`, delimited text through `csv`. The declared MIME type
//! picks the reader; when it is missing or unknown the workbook formats are
//! auto-detected first and CSV is tried last.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use calamine::{
    Data, DataType, Ods, Range, Reader, Xls, Xlsb, Xlsx, open_workbook_auto_from_rs,
    open_workbook_from_rs,
};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

type Blob = Cursor<Vec<u8>>;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No readable sheet or table in the blob.
    #[error("corrupt roster file: {0}")]
    Corrupt(String),

    /// A header row exists but no data rows follow it.
    #[error("roster file has a header row but no data rows")]
    Empty,

    #[error("unsupported MIME type for a roster: {0}")]
    UnsupportedMimeType(String),
}

/// Reader selected for a declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xlsb,
    /// Legacy Excel. Browsers also send this type for `.csv` uploads.
    Xls,
    Ods,
    Csv,
    Unknown,
}

impl SheetFormat {
    pub fn from_mime(declared: Option<&str>) -> Result<Self, DecodeError> {
        let Some(declared) = declared else {
            return Ok(SheetFormat::Unknown);
        };

        // Drop parameters such as `; charset=utf-8`
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let format = match essence.as_str() {
            "" => SheetFormat::Unknown,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel.sheet.macroenabled.12" => SheetFormat::Xlsx,
            "application/vnd.ms-excel.sheet.binary.macroenabled.12" => SheetFormat::Xlsb,
            "application/vnd.ms-excel" | "application/msexcel" | "application/x-msexcel" => {
                SheetFormat::Xls
            }
            "application/vnd.oasis.opendocument.spreadsheet" => SheetFormat::Ods,
            "text/csv"
            | "application/csv"
            | "text/comma-separated-values"
            | "text/x-csv"
            | "application/x-csv"
            | "text/plain"
            | "text/tab-separated-values" => SheetFormat::Csv,
            other
                if other.starts_with("image/")
                    || other.starts_with("audio/")
                    || other.starts_with("video/")
                    || other == "application/pdf" =>
            {
                return Err(DecodeError::UnsupportedMimeType(declared.to_string()));
            }
            _ => SheetFormat::Unknown,
        };

        Ok(format)
    }
}

/// One data row of a roster, keyed by the literal header label of its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based line in the sheet; the header row is line 1 for sheets that start at the top.
    pub line: usize,
    pub cells: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(line: usize, cells: BTreeMap<String, String>) -> Self {
        Self { line, cells }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }
}

/// The decoded rows of one file. Consumed once; rows are materialized on demand.
#[derive(Debug)]
pub struct RawRows {
    columns: Vec<(usize, String)>,
    records: std::vec::IntoIter<(usize, Vec<String>)>,
}

impl RawRows {
    /// Header labels in column order, blank and repeated labels removed.
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|(_, h)| h.as_str()).collect()
    }
}

impl Iterator for RawRows {
    type Item = RawRow;

    fn next(&mut self) -> Option<Self::Item> {
        for (line, values) in self.records.by_ref() {
            if is_blank_record(&values) {
                continue;
            }

            let cells = self
                .columns
                .iter()
                .map(|(idx, header)| {
                    let value = values.get(*idx).cloned().unwrap_or_default();
                    (header.clone(), value)
                })
                .collect();

            return Some(RawRow::new(line, cells));
        }

        None
    }
}

/// Decode a stored roster blob into raw rows.
pub fn decode(blob: &[u8], declared_mime: Option<&str>) -> Result<RawRows, DecodeError> {
    if blob.is_empty() {
        return Err(DecodeError::Corrupt("file is empty".to_string()));
    }

    match SheetFormat::from_mime(declared_mime)? {
        SheetFormat::Xlsx => decode_workbook::<Xlsx<Blob>>(blob),
        SheetFormat::Xlsb => decode_workbook::<Xlsb<Blob>>(blob),
        SheetFormat::Ods => decode_workbook::<Ods<Blob>>(blob),
        SheetFormat::Xls => {
            decode_workbook::<Xls<Blob>>(blob).or_else(|err| fall_back_to_csv(blob, err))
        }
        SheetFormat::Csv => decode_csv(blob),
        SheetFormat::Unknown => decode_any_workbook(blob).or_else(|err| fall_back_to_csv(blob, err)),
    }
}

fn fall_back_to_csv(blob: &[u8], workbook_error: DecodeError) -> Result<RawRows, DecodeError> {
    tracing::debug!(error = %workbook_error, "Workbook parse failed, trying CSV");
    match decode_csv(blob) {
        Ok(rows) => Ok(rows),
        Err(DecodeError::Empty) => Err(DecodeError::Empty),
        Err(_) => Err(workbook_error),
    }
}

fn decode_workbook<R>(blob: &[u8]) -> Result<RawRows, DecodeError>
where
    R: Reader<Blob>,
    R::Error: Display,
{
    let mut workbook: R = open_workbook_from_rs(Cursor::new(blob.to_vec()))
        .map_err(|e| DecodeError::Corrupt(format!("failed to open workbook: {e}")))?;
    let range = first_sheet(&mut workbook)?;
    rows_from_range(&range)
}

fn decode_any_workbook(blob: &[u8]) -> Result<RawRows, DecodeError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(blob.to_vec()))
        .map_err(|e| DecodeError::Corrupt(format!("not a recognised workbook: {e}")))?;
    let range = first_sheet(&mut workbook)?;
    rows_from_range(&range)
}

fn first_sheet<RS, R>(workbook: &mut R) -> Result<Range<Data>, DecodeError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(DecodeError::Corrupt(format!(
            "failed to read first worksheet: {e}"
        ))),
        None => Err(DecodeError::Corrupt("workbook has no worksheets".to_string())),
    }
}

/// Build rows from a worksheet range; the first row of the range is the header.
pub fn rows_from_range(range: &Range<Data>) -> Result<RawRows, DecodeError> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| DecodeError::Corrupt("worksheet is empty".to_string()))?;
    let headers: Vec<String> = header.iter().map(cell_to_string).collect();

    let header_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let records = rows
        .enumerate()
        .map(|(idx, cells)| {
            (
                header_line + idx + 1,
                cells.iter().map(cell_to_string).collect(),
            )
        })
        .collect();

    build_rows(headers, records)
}

fn decode_csv(blob: &[u8]) -> Result<RawRows, DecodeError> {
    let data = blob.strip_prefix(UTF8_BOM).unwrap_or(blob);
    let text = std::str::from_utf8(data)
        .map_err(|_| DecodeError::Corrupt("CSV content is not valid UTF-8".to_string()))?;
    if text.trim().is_empty() {
        return Err(DecodeError::Corrupt("file is empty".to_string()));
    }
    if text.contains('\0') {
        return Err(DecodeError::Corrupt("CSV content contains binary data".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DecodeError::Corrupt(format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            DecodeError::Corrupt(format!("malformed CSV record {}: {e}", idx + 1))
        })?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx + 2);
        records.push((line, record.iter().map(str::to_string).collect()));
    }

    build_rows(headers, records)
}

/// Pick the delimiter that occurs most often on the header line.
fn sniff_delimiter(text: &str) -> u8 {
    let header_line = text.lines().next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, header_line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn build_rows(
    headers: Vec<String>,
    records: Vec<(usize, Vec<String>)>,
) -> Result<RawRows, DecodeError> {
    let mut columns: Vec<(usize, String)> = Vec::new();
    for (idx, header) in headers.into_iter().enumerate() {
        if header.trim().is_empty() || columns.iter().any(|(_, seen)| *seen == header) {
            continue;
        }
        columns.push((idx, header));
    }

    if columns.is_empty() {
        return Err(DecodeError::Corrupt("header row is blank".to_string()));
    }

    if records.iter().all(|(_, values)| is_blank_record(values)) {
        return Err(DecodeError::Empty);
    }

    Ok(RawRows {
        columns,
        records: records.into_iter(),
    })
}

fn is_blank_record(values: &[String]) -> bool {
    values.iter().all(|v| v.trim().is_empty())
}

/// Render a cell the same way regardless of locale.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(format_datetime)
            .unwrap_or_else(|| cell.to_string()),
        Data::DurationIso(s) => s.clone(),
    }
}

fn format_float(value: f64) -> String {
    // Spreadsheets store every number as a float; phone numbers and credit
    // counts must not come out as "9876543210.0".
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    if value.time() == NaiveTime::MIN {
        value.format("%Y-%m-%d").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(rows: RawRows) -> Vec<RawRow> {
        rows.collect()
    }

    #[test]
    fn test_decode_csv_by_mime() {
        let csv = b"Name,Email,Credits\nAsha Rao,asha@college.edu,5\nVikram Das,vikram@college.edu,\n";
        let rows = collect(decode(csv, Some("text/csv")).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get("Name"), Some("Asha Rao"));
        assert_eq!(rows[0].get("Credits"), Some("5"));
        assert_eq!(rows[1].get("Credits"), Some(""));
    }

    #[test]
    fn test_decode_csv_with_bom_and_charset_parameter() {
        let mut csv = UTF8_BOM.to_vec();
        csv.extend_from_slice(b"Email\nasha@college.edu\n");
        let rows = collect(decode(&csv, Some("text/csv; charset=utf-8")).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Email"), Some("asha@college.edu"));
    }

    #[test]
    fn test_decode_csv_semicolon_delimiter() {
        let csv = b"Student Name;Email\nAsha Rao;asha@college.edu\n";
        let rows = collect(decode(csv, Some("text/csv")).unwrap());
        assert_eq!(rows[0].get("Student Name"), Some("Asha Rao"));
    }

    #[test]
    fn test_unknown_mime_falls_back_to_csv() {
        let csv = b"Email,Name\nasha@college.edu,Asha\n";
        assert_eq!(collect(decode(csv, None).unwrap()).len(), 1);
        assert_eq!(
            collect(decode(csv, Some("application/octet-stream")).unwrap()).len(),
            1
        );
    }

    #[test]
    fn test_ms_excel_mime_accepts_csv_payload() {
        let csv = b"Email,Name\nasha@college.edu,Asha\n";
        let rows = collect(decode(csv, Some("application/vnd.ms-excel")).unwrap());
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_header_only_is_empty() {
        assert_eq!(
            decode(b"Name,Email\n", Some("text/csv")).unwrap_err(),
            DecodeError::Empty
        );
        assert_eq!(
            decode(b"Name,Email\n,\n , \n", None).unwrap_err(),
            DecodeError::Empty
        );
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let garbage = [0xFFu8, 0xFE, 0x00, 0x13, 0x37, 0x80, 0x81];
        assert!(matches!(
            decode(&garbage, None),
            Err(DecodeError::Corrupt(_))
        ));
        assert!(matches!(
            decode(&garbage, Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")),
            Err(DecodeError::Corrupt(_))
        ));
        assert!(matches!(decode(b"", Some("text/csv")), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_non_tabular_mime_is_unsupported() {
        assert!(matches!(
            decode(b"%PDF-1.7", Some("application/pdf")),
            Err(DecodeError::UnsupportedMimeType(_))
        ));
        assert!(matches!(
            decode(b"\x89PNG", Some("image/png")),
            Err(DecodeError::UnsupportedMimeType(_))
        ));
    }

    #[test]
    fn test_blank_rows_and_headers_are_dropped() {
        let csv = b"Name,,Email,Name\nAsha,x,asha@college.edu,Shadow\n,,,\nRavi,y,ravi@college.edu,Other\n";
        let rows = decode(csv, Some("text/csv")).unwrap();
        assert_eq!(rows.headers(), vec!["Name", "Email"]);
        let rows = collect(rows);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Name"), Some("Asha"));
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn test_short_records_pad_missing_cells() {
        let csv = b"Name,Email,Phone\nAsha,asha@college.edu\n";
        let rows = collect(decode(csv, Some("text/csv")).unwrap());
        assert_eq!(rows[0].get("Phone"), Some(""));
    }

    #[test]
    fn test_rows_from_worksheet_range() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 2));
        range.set_value((0, 0), Data::String("Candidate Name".to_string()));
        range.set_value((0, 1), Data::String("Email".to_string()));
        range.set_value((0, 2), Data::String("Phone".to_string()));
        range.set_value((1, 0), Data::String("Asha Rao".to_string()));
        range.set_value((1, 1), Data::String("asha@college.edu".to_string()));
        range.set_value((1, 2), Data::Float(9876543210.0));
        range.set_value((2, 0), Data::String("Ravi Kumar".to_string()));
        range.set_value((2, 1), Data::String("ravi@college.edu".to_string()));
        range.set_value((2, 2), Data::Int(12345));

        let rows = collect(rows_from_range(&range).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].get("Phone"), Some("9876543210"));
        assert_eq!(rows[1].get("Phone"), Some("12345"));
    }

    #[test]
    fn test_range_with_only_header_is_empty() {
        let mut range: Range<Data> = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), Data::String("Name".to_string()));
        range.set_value((0, 1), Data::String("Email".to_string()));
        assert_eq!(rows_from_range(&range).unwrap_err(), DecodeError::Empty);
    }

    #[test]
    fn test_cell_formatting_is_stable() {
        assert_eq!(cell_to_string(&Data::Float(5.0)), "5");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(-3)), "-3");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::Empty), "");
        let midnight = Data::DateTimeIso("2023-03-15T00:00:00".to_string());
        assert_eq!(cell_to_string(&midnight), "2023-03-15");
        let iso = Data::DateTimeIso("2024-06-01T09:30:00".to_string());
        assert_eq!(cell_to_string(&iso), "2024-06-01T09:30:00");
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(
            SheetFormat::from_mime(Some(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ))
            .unwrap(),
            SheetFormat::Xlsx
        );
        assert_eq!(
            SheetFormat::from_mime(Some("TEXT/CSV")).unwrap(),
            SheetFormat::Csv
        );
        assert_eq!(SheetFormat::from_mime(None).unwrap(), SheetFormat::Unknown);
        assert_eq!(
            SheetFormat::from_mime(Some("application/zip")).unwrap(),
            SheetFormat::Unknown
        );
    }
}
