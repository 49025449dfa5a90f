//! Configuration options for the portal core

use std::time::Duration;

/// Default endpoint for the hosted spreadsheet API
pub const DEFAULT_SHEET_ENDPOINT: &str = "https://sheets.googleapis.com";

/// Configuration options for the portal core.
///
/// The backend URL and anon key are passed to [`crate::Portal::new`]
/// directly; everything else lives here. The sheet and report settings
/// are optional because not every deployment wires up intake or report
/// generation.
#[derive(Debug, Clone)]
pub struct PortalOptions {
    /// Whether a session obtained at login should be written to the
    /// configured session store
    pub persist_session: bool,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema queried through the REST interface
    pub db_schema: String,

    /// Base URL of the spreadsheet API
    pub sheet_endpoint: String,

    /// Identifier of the intake spreadsheet
    pub sheet_id: Option<String>,

    /// API key for the spreadsheet API
    pub sheet_key: Option<String>,

    /// Endpoint of the report generation service
    pub report_url: Option<String>,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self {
            persist_session: true,
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            sheet_endpoint: DEFAULT_SHEET_ENDPOINT.to_string(),
            sheet_id: None,
            sheet_key: None,
            report_url: None,
        }
    }
}

impl PortalOptions {
    /// Keep or skip writing the session to browser storage
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the spreadsheet API endpoint
    pub fn with_sheet_endpoint(mut self, value: &str) -> Self {
        self.sheet_endpoint = value.to_string();
        self
    }

    /// Set the intake spreadsheet id and API key
    pub fn with_sheet(mut self, sheet_id: &str, sheet_key: &str) -> Self {
        self.sheet_id = Some(sheet_id.to_string());
        self.sheet_key = Some(sheet_key.to_string());
        self
    }

    /// Set the report generation endpoint
    pub fn with_report_url(mut self, value: &str) -> Self {
        self.report_url = Some(value.to_string());
        self
    }

    /// Read the optional service settings from the environment.
    ///
    /// Reads `PORTAL_SHEET_ID`, `PORTAL_SHEET_KEY` and `PORTAL_REPORT_URL`.
    /// Missing variables leave the corresponding option unset.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let (Ok(id), Ok(key)) = (
            std::env::var("PORTAL_SHEET_ID"),
            std::env::var("PORTAL_SHEET_KEY"),
        ) {
            options.sheet_id = Some(id);
            options.sheet_key = Some(key);
        }
        if let Ok(url) = std::env::var("PORTAL_REPORT_URL") {
            options.report_url = Some(url);
        }
        options
    }
}
