//! Google Sheets v4 backed store. The tab is resolved once in `connect` and
//! never changes for the lifetime of the store.

use crate::config::GoogleSheetsConfig;
use crate::metrics_defs::{SHEETS_REQUEST_DURATION, SHEETS_REQUEST_FAILED};
use crate::record::cell_text;
use crate::store::{SheetStore, StoreError};
use crate::{counter, histogram};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;
use url::Url;

#[derive(Clone, Debug, PartialEq)]
pub struct SheetTab {
    pub title: String,
    pub sheet_id: i64,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Thin client over the Sheets REST API for a single spreadsheet.
struct SheetsClient {
    client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: Option<String>,
    api_key: Option<String>,
}

impl SheetsClient {
    fn new(config: &GoogleSheetsConfig) -> Self {
        SheetsClient {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// `{base}/v4/spreadsheets/{segments..}`, with the API key attached.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);

        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, StoreError> {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn execute(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let started = Instant::now();
        let result = request.send().await;
        histogram!(SHEETS_REQUEST_DURATION, "op" => op).record(started.elapsed().as_secs_f64());

        let response = result.inspect_err(|err| {
            counter!(SHEETS_REQUEST_FAILED, "op" => op).increment(1);
            tracing::warn!(op, error = %err, "Sheets request could not be sent");
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        counter!(SHEETS_REQUEST_FAILED, "op" => op).increment(1);
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
        tracing::warn!(op, status = status.as_u16(), %message, "Sheets request failed");

        Err(StoreError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let request = self
            .client
            .get(self.values_url(range)?)
            .query(&[("majorDimension", "ROWS")]);
        let response = self.execute("values.get", request).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn resolve_tab(&self, sheet_name: Option<&str>) -> Result<SheetTab, StoreError> {
        let request = self
            .client
            .get(self.url(&[self.spreadsheet_id.as_str()])?)
            .query(&[("fields", "sheets.properties(sheetId,title)")]);
        let response = self.execute("metadata", request).await?;
        let metadata: SpreadsheetMetadata = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let mut tabs = metadata.sheets.into_iter().map(|s| SheetTab {
            title: s.properties.title,
            sheet_id: s.properties.sheet_id,
        });

        match sheet_name {
            Some(name) => tabs
                .find(|tab| tab.title == name)
                .ok_or_else(|| StoreError::TabNotFound(name.to_string())),
            None => tabs
                .next()
                .ok_or_else(|| StoreError::Malformed("spreadsheet has no tabs".into())),
        }
    }
}

/// A1 notation for a tab, optionally narrowed to `cells`. Tab names other
/// than plain identifiers are single-quoted.
pub fn a1_range(tab: &str, cells: Option<&str>) -> String {
    let plain = !tab.is_empty() && tab.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let tab = if plain {
        tab.to_string()
    } else {
        format!("'{}'", tab.replace('\'', "''"))
    };

    match cells {
        Some(cells) => format!("{tab}!{cells}"),
        None => tab,
    }
}

pub struct GoogleSheets {
    client: SheetsClient,
    tab: SheetTab,
}

impl GoogleSheets {
    /// Resolves the configured tab (or the first one) and returns a store
    /// bound to it.
    pub async fn connect(config: &GoogleSheetsConfig) -> Result<Self, StoreError> {
        let client = SheetsClient::new(config);
        let tab = client.resolve_tab(config.sheet_name.as_deref()).await?;
        tracing::info!(
            spreadsheet = %config.spreadsheet_id,
            tab = %tab.title,
            sheet_id = tab.sheet_id,
            "Resolved sheet tab"
        );

        Ok(GoogleSheets { client, tab })
    }

    pub fn tab(&self) -> &SheetTab {
        &self.tab
    }

    fn range(&self, cells: Option<&str>) -> String {
        a1_range(&self.tab.title, cells)
    }
}

#[async_trait]
impl SheetStore for GoogleSheets {
    /// Reads row 1. If that read fails or comes back empty, reads the whole
    /// tab once and takes its first row instead.
    async fn read_header(&self) -> Result<Vec<String>, StoreError> {
        match self.client.get_values(&self.range(Some("1:1"))).await {
            Ok(rows) if !rows.is_empty() => return Ok(rows.into_iter().next().unwrap_or_default()),
            Ok(_) => tracing::debug!(tab = %self.tab.title, "Header range empty, reading full tab"),
            Err(err) => {
                tracing::warn!(tab = %self.tab.title, error = %err, "Header read failed, reading full tab")
            }
        }

        let rows = self.client.get_values(&self.range(None)).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let rows = self.client.get_values(&self.range(None)).await?;
        Ok(rows.into_iter().skip(1).collect())
    }

    async fn update_row(&self, position: usize, cells: Vec<String>) -> Result<(), StoreError> {
        let range = self.range(Some(&format!("A{position}")));
        let request = self
            .client
            .client
            .put(self.client.values_url(&range)?)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [cells],
            }));
        self.client.execute("values.update", request).await?;
        Ok(())
    }

    async fn append_row(&self, cells: Vec<String>) -> Result<(), StoreError> {
        let range = self.range(Some("A1"));
        let request = self
            .client
            .client
            .post(self.client.values_url(&format!("{range}:append"))?)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [cells],
            }));
        self.client.execute("values.append", request).await?;
        Ok(())
    }

    async fn delete_row(&self, position: usize) -> Result<(), StoreError> {
        if position < 2 {
            return Err(StoreError::RowOutOfRange(position));
        }

        let batch = format!("{}:batchUpdate", self.client.spreadsheet_id);
        let request = self
            .client
            .client
            .post(self.client.url(&[batch.as_str()])?)
            .json(&json!({
                "requests": [{
                    "deleteDimension": {
                        "range": {
                            "sheetId": self.tab.sheet_id,
                            "dimension": "ROWS",
                            "startIndex": position - 1,
                            "endIndex": position,
                        }
                    }
                }]
            }));
        self.client.execute("batch_update", request).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "google sheets {} tab `{}`",
            self.client.spreadsheet_id, self.tab.title
        )
    }
}
