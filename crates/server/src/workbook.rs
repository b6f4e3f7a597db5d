//! Reads the first sheet of an exported quotes workbook into JSON rows.
//!
//! The header row names the fields. Blank cells become `""` and fully blank
//! rows are skipped, so rows keep the shape the export API documents.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use quotesearch_core::{QuoteRecord, RetrievalError};
use serde_json::{Map, Number, Value};

pub fn first_sheet_records(
    status: u16,
    bytes: &[u8],
) -> Result<Vec<QuoteRecord>, RetrievalError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).map_err(|error| {
        RetrievalError::malformed(status, format!("export download is not a workbook: {error}"))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RetrievalError::malformed(status, "export workbook has no sheets"))?
        .map_err(|error| {
            RetrievalError::malformed(status, format!("export sheet could not be read: {error}"))
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => {
            header_row.iter().map(|cell| cell.to_string().trim().to_string()).collect()
        }
        None => return Ok(Vec::new()),
    };

    let records = rows
        .filter(|row| !row.iter().all(is_blank))
        .map(|row| {
            let mut fields = Map::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if !header.is_empty() {
                    fields.insert(header.clone(), cell_value(cell));
                }
            }
            QuoteRecord::from(Value::Object(fields))
        })
        .collect();

    Ok(records)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            Value::String(text.clone())
        }
        Data::Int(number) => Value::from(*number),
        Data::Float(number) => float_value(*number),
        Data::Bool(flag) => Value::Bool(*flag),
        Data::DateTime(serial) => float_value(serial.as_f64()),
        Data::Error(error) => Value::String(error.to_string()),
    }
}

fn float_value(number: f64) -> Value {
    Number::from_f64(number).map(Value::Number).unwrap_or_else(|| Value::String(number.to_string()))
}
