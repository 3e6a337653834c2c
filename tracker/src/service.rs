use crate::metrics_defs::{TRACKING_DELETE, TRACKING_LOOKUP, TRACKING_UPSERT};
use crate::record::{self, FIRST_DATA_ROW, Header, RecordError, TrackingRecord};
use crate::store::{SheetStore, StoreError};
use crate::counter;
use serde_json::Value;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("no tracking record found for `{0}`")]
    NotFound(String),

    #[error("record has no `{0}` value")]
    MissingIdentifier(String),

    #[error("sheet store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of an upsert: where the row landed and what is now stored there.
#[derive(Debug, PartialEq)]
pub struct Upserted {
    pub created: bool,
    pub position: usize,
    pub record: TrackingRecord,
}

/// Lookup, upsert, list and delete on top of a sheet store. Every call reads
/// the sheet afresh; nothing is cached between requests.
#[derive(Clone)]
pub struct TrackingService {
    store: Arc<dyn SheetStore>,
    identifier_column: String,
}

impl TrackingService {
    pub fn new(store: Arc<dyn SheetStore>, identifier_column: &str) -> Self {
        TrackingService {
            store,
            identifier_column: identifier_column.trim().to_string(),
        }
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    pub async fn get(&self, id: &str) -> Result<TrackingRecord, ServiceError> {
        let id = self.require_identifier(id)?;
        let (header, rows) = self.load().await?;
        let found = record::find_by_identifier(&header, &rows, &self.identifier_column, id)?;

        let outcome = if found.is_some() { "found" } else { "not_found" };
        counter!(TRACKING_LOOKUP, "outcome" => outcome).increment(1);

        found
            .map(|(_, record)| record)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Overwrites the first row carrying the record's identifier, or appends
    /// a new row when there is none.
    pub async fn upsert(&self, mut record: TrackingRecord) -> Result<Upserted, ServiceError> {
        let id = record
            .get(&self.identifier_column)
            .map(record::cell_text)
            .unwrap_or_default();
        let id = self.require_identifier(&id)?.to_string();
        record.insert(self.identifier_column.clone(), Value::String(id.clone()));

        let (header, rows) = self.load().await?;
        let existing = record::find_by_identifier(&header, &rows, &self.identifier_column, &id)?;
        let payload = record::build_payload(&header, &record);

        let (created, position) = match existing {
            Some((position, _)) => {
                self.store.update_row(position, payload.clone()).await?;
                (false, position)
            }
            None => {
                self.store.append_row(payload.clone()).await?;
                (true, rows.len() + FIRST_DATA_ROW)
            }
        };

        let action = if created { "created" } else { "updated" };
        counter!(TRACKING_UPSERT, "action" => action).increment(1);
        tracing::info!(id = %id, position, action, "Upserted tracking record");

        Ok(Upserted {
            created,
            position,
            record: record::map_row(&header, &payload),
        })
    }

    /// All records in storage order. Blank rows are skipped.
    pub async fn list(&self) -> Result<Vec<TrackingRecord>, ServiceError> {
        let (header, rows) = self.load().await?;
        if header.position(&self.identifier_column).is_none() {
            return Err(RecordError::MissingIdentifierColumn(self.identifier_column.clone()).into());
        }

        Ok(rows
            .iter()
            .filter(|row| !record::is_blank_row(row))
            .map(|row| record::map_row(&header, row))
            .collect())
    }

    /// Removes the first row carrying `id` and returns what it held.
    pub async fn delete(&self, id: &str) -> Result<TrackingRecord, ServiceError> {
        let id = self.require_identifier(id)?;
        let (header, rows) = self.load().await?;
        let (position, record) =
            record::find_by_identifier(&header, &rows, &self.identifier_column, id)?
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        self.store.delete_row(position).await?;
        counter!(TRACKING_DELETE).increment(1);
        tracing::info!(id = %id, position, "Deleted tracking record");

        Ok(record)
    }

    async fn load(&self) -> Result<(Header, Vec<Vec<String>>), StoreError> {
        let (header, rows) = tokio::try_join!(self.store.read_header(), self.store.read_rows())?;
        Ok((Header::new(header), rows))
    }

    fn require_identifier<'a>(&self, id: &'a str) -> Result<&'a str, ServiceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ServiceError::MissingIdentifier(self.identifier_column.clone()));
        }
        Ok(id)
    }
}
