use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Identifier column cannot be empty")]
    EmptyIdentifierColumn,

    #[error("Spreadsheet id cannot be empty")]
    EmptySpreadsheetId,

    #[error("Memory store header must name the identifier column `{0}`")]
    MemoryHeaderMissingIdentifier(String),

    #[error("Admin {0} cannot be empty")]
    EmptyAdminField(&'static str),

    #[error("Admin token TTL cannot be 0")]
    InvalidTokenTtl,
}

/// Network listener configuration
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Where tracking records live.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    GoogleSheets(GoogleSheetsConfig),
    Memory(MemoryConfig),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct GoogleSheetsConfig {
    pub spreadsheet_id: String,
    /// Tab holding the records. The first tab is used when unset.
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default = "default_sheets_base_url")]
    pub base_url: Url,
    /// OAuth access token sent as a bearer credential.
    #[serde(default)]
    pub access_token: Option<String>,
    /// API key sent as the `key` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_header")]
    pub header: Vec<String>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    /// Key used to sign admin bearer tokens.
    pub token_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl AdminConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::EmptyAdminField("username"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyAdminField("password"));
        }
        if self.token_secret.is_empty() {
            return Err(ValidationError::EmptyAdminField("token_secret"));
        }
        if self.token_ttl_secs == 0 {
            return Err(ValidationError::InvalidTokenTtl);
        }
        Ok(())
    }
}

/// Tracker service configuration
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Header column used to look records up.
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,
    pub store: StoreConfig,
    pub admin: AdminConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        let identifier_column = self.identifier_column.trim();
        if identifier_column.is_empty() {
            return Err(ValidationError::EmptyIdentifierColumn);
        }

        match &self.store {
            StoreConfig::GoogleSheets(sheets) => {
                if sheets.spreadsheet_id.trim().is_empty() {
                    return Err(ValidationError::EmptySpreadsheetId);
                }
            }
            StoreConfig::Memory(memory) => {
                if !memory.header.iter().any(|c| c.trim() == identifier_column) {
                    return Err(ValidationError::MemoryHeaderMissingIdentifier(
                        identifier_column.to_string(),
                    ));
                }
            }
        }

        self.admin.validate()
    }
}

fn default_identifier_column() -> String {
    "trackingId".into()
}

fn default_sheets_base_url() -> Url {
    Url::parse("https://sheets.googleapis.com").expect("static URL is valid")
}

fn default_memory_header() -> Vec<String> {
    [
        "trackingId",
        "status",
        "origin",
        "destination",
        "lastUpdated",
        "estimatedDelivery",
        "history",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_token_ttl_secs() -> u64 {
    3600
}
