//! Maps spreadsheet rows to tracking records and back.
//!
//! The sheet has no fixed schema: the first row names the columns, every row
//! below it is one record. Rows are addressed by their position in the whole
//! sheet, so the first data row sits at position 2.

use crate::history;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column whose cell holds a JSON encoded history.
pub const HISTORY_COLUMN: &str = "history";

/// Sheet position of the first row below the header.
pub const FIRST_DATA_ROW: usize = 2;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("identifier column `{0}` is missing from the header row")]
    MissingIdentifierColumn(String),
}

/// Ordered column names taken from the header row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    columns: Vec<String>,
}

impl Header {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Header {
            columns: columns
                .into_iter()
                .map(|c| c.as_ref().trim().to_string())
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        let column = column.trim();
        self.columns.iter().position(|c| c == column)
    }
}

/// A single row keyed by column name, in header order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingRecord(IndexMap<String, Value>);

impl TrackingRecord {
    pub fn new() -> Self {
        TrackingRecord(IndexMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert<K: Into<String>>(&mut self, field: K, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The decoded history of this record, empty when the field is absent.
    pub fn history(&self) -> history::History {
        self.get(HISTORY_COLUMN)
            .map(history::decode)
            .unwrap_or_default()
    }
}

impl FromIterator<(String, Value)> for TrackingRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        TrackingRecord(iter.into_iter().collect())
    }
}

impl From<IndexMap<String, Value>> for TrackingRecord {
    fn from(fields: IndexMap<String, Value>) -> Self {
        TrackingRecord(fields)
    }
}

/// Text written to a cell for a field value.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Canonical form used to compare identifiers. Sheets like to hand back
/// non-breaking spaces from pasted values.
pub fn normalize_identifier(text: &str) -> String {
    text.replace('\u{00A0}', " ").trim().to_uppercase()
}

/// Builds a record from a data row. Missing trailing cells are empty.
pub fn map_row(header: &Header, row: &[String]) -> TrackingRecord {
    header
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let cell = row.get(index).map(String::as_str).unwrap_or("");
            let value = if column == HISTORY_COLUMN {
                Value::Array(history::decode_str(cell))
            } else {
                Value::String(cell.to_string())
            };
            (column.clone(), value)
        })
        .collect()
}

/// Finds the first data row whose identifier matches `needle`.
///
/// Returns the sheet position of the row along with the mapped record, or
/// `None` when nothing matches. Identifiers are not required to be unique;
/// the earliest row in storage order wins.
pub fn find_by_identifier(
    header: &Header,
    rows: &[Vec<String>],
    identifier_column: &str,
    needle: &str,
) -> Result<Option<(usize, TrackingRecord)>, RecordError> {
    let column = header
        .position(identifier_column)
        .ok_or_else(|| RecordError::MissingIdentifierColumn(identifier_column.trim().to_string()))?;
    let needle = normalize_identifier(needle);

    let found = rows
        .iter()
        .enumerate()
        .find(|(_, row)| {
            let cell = row.get(column).map(String::as_str).unwrap_or("");
            normalize_identifier(cell) == needle
        })
        .map(|(index, row)| (index + FIRST_DATA_ROW, map_row(header, row)));

    Ok(found)
}

/// Lays a record out as one cell per header column, in header order.
/// Fields the header does not name are dropped.
pub fn build_payload(header: &Header, record: &TrackingRecord) -> Vec<String> {
    header
        .columns()
        .iter()
        .map(|column| {
            if column == HISTORY_COLUMN {
                record
                    .get(column)
                    .map(history::encode)
                    .unwrap_or_else(|| history::EMPTY.to_string())
            } else {
                record.get(column).map(cell_text).unwrap_or_default()
            }
        })
        .collect()
}

/// True when every cell of the row is blank.
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
