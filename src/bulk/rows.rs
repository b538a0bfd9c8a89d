// Upload parsing for bulk import: one strategy per file extension, both
// producing the same trimmed row-mapping contract.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::bulk::BulkError;

/// One parsed upload row: column name -> trimmed cell value. Transient,
/// consumed by the import executor and discarded.
pub type ImportRow = HashMap<String, String>;

/// Columns every import file must declare.
pub const REQUIRED_COLUMNS: [&str; 4] = ["pg_username", "case_title", "date", "status"];

type ParseFn = fn(&[u8]) -> Result<Vec<ImportRow>, BulkError>;

/// Strategy table keyed by declared file extension.
fn strategy_for(filename: &str) -> Option<ParseFn> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Some(parse_csv),
        Some("xlsx") => Some(parse_xlsx),
        _ => None,
    }
}

/// Parse an uploaded file into rows, validating the required header set once
/// before any row is produced. Unrecognized extensions are rejected outright.
pub fn parse_rows(filename: &str, bytes: &[u8]) -> Result<Vec<ImportRow>, BulkError> {
    let parse = strategy_for(filename)
        .ok_or_else(|| BulkError::Validation("Unsupported file format".to_string()))?;
    parse(bytes)
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<ImportRow>, BulkError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BulkError::Validation(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    validate_headers(&headers)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| BulkError::Validation(format!("Failed to read CSV row: {e}")))?;
        let mut row = ImportRow::new();
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(idx).unwrap_or("").trim().to_string();
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_xlsx(bytes: &[u8]) -> Result<Vec<ImportRow>, BulkError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| BulkError::Validation(format!("Failed to read workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BulkError::Validation("Workbook has no sheets".to_string()))?
        .map_err(|e| BulkError::Validation(format!("Failed to read worksheet: {e}")))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|cells| cells.iter().map(cell_to_string).collect())
        .unwrap_or_default();
    validate_headers(&headers)?;

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let mut row = ImportRow::new();
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = cells.get(idx).map(cell_to_string).unwrap_or_default();
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn validate_headers(headers: &[String]) -> Result<(), BulkError> {
    if headers.iter().all(|h| h.is_empty()) {
        return Err(BulkError::Validation("No headers found in file".to_string()));
    }
    let mut missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .copied()
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(BulkError::Validation(format!(
            "Missing columns: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
