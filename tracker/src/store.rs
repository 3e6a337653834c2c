//! Storage backends for the tracking sheet. Positions are 1-based sheet rows
//! including the header row, so the first data row is at position 2.

use crate::record::FIRST_DATA_ROW;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sheets request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sheets API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed sheets response: {0}")]
    Malformed(String),

    #[error("invalid sheets URL: {0}")]
    InvalidUrl(String),

    #[error("sheet tab `{0}` not found")]
    TabNotFound(String),

    #[error("row {0} is outside the sheet")]
    RowOutOfRange(usize),
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    /// The header row, one entry per column.
    async fn read_header(&self) -> Result<Vec<String>, StoreError>;

    /// Every row below the header, in storage order.
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError>;

    async fn update_row(&self, position: usize, cells: Vec<String>) -> Result<(), StoreError>;

    async fn append_row(&self, cells: Vec<String>) -> Result<(), StoreError>;

    /// Removes the row, shifting the rows below it up by one.
    async fn delete_row(&self, position: usize) -> Result<(), StoreError>;

    fn describe(&self) -> String;
}

/// Sheet kept in process memory. Used for local runs and tests.
pub struct MemorySheet {
    header: Vec<String>,
    rows: RwLock<Vec<Vec<String>>>,
}

impl MemorySheet {
    pub fn new(header: Vec<String>) -> Self {
        Self::with_rows(header, Vec::new())
    }

    pub fn with_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        MemorySheet {
            header,
            rows: RwLock::new(rows),
        }
    }

    /// Copy of the data rows as currently stored.
    pub async fn snapshot(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }

    fn index(position: usize, len: usize) -> Result<usize, StoreError> {
        position
            .checked_sub(FIRST_DATA_ROW)
            .filter(|index| *index < len)
            .ok_or(StoreError::RowOutOfRange(position))
    }
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn read_header(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.header.clone())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn update_row(&self, position: usize, cells: Vec<String>) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let index = Self::index(position, rows.len())?;
        rows[index] = cells;
        Ok(())
    }

    async fn append_row(&self, cells: Vec<String>) -> Result<(), StoreError> {
        self.rows.write().await.push(cells);
        Ok(())
    }

    async fn delete_row(&self, position: usize) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let index = Self::index(position, rows.len())?;
        rows.remove(index);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory ({} columns)", self.header.len())
    }
}
