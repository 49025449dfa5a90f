//! Spreadsheet API client for the application form responses.
//!
//! The admission form writes one row per application into a hosted
//! spreadsheet. The portal reads rows from the review cursor down and
//! rewrites single rows when a reviewer corrects a field before
//! accepting.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;
use crate::fetch::Fetch;

/// Tab holding form responses
pub const RESPONSES_TAB: &str = "Responses";

/// Last column the form writes
const LAST_COLUMN: &str = "J";

/// One spreadsheet row with its absolute row index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row index within the tab
    pub index: u32,

    /// Cell values, in column order, as rendered text
    pub values: Vec<String>,
}

/// Wire shape of the values endpoints
#[derive(Debug, Serialize, Deserialize)]
struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<String>,

    #[serde(rename = "majorDimension", skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,

    /// Absent entirely when the requested range is empty
    #[serde(default)]
    values: Option<Vec<Vec<String>>>,
}

/// Client for the hosted spreadsheet API
pub struct SheetClient {
    /// Base URL of the spreadsheet API
    endpoint: String,

    /// Identifier of the intake spreadsheet
    sheet_id: String,

    /// API key passed as a query parameter
    api_key: String,

    /// Connection pool for spreadsheet calls
    client: Client,
}

impl SheetClient {
    /// Create a new SheetClient
    pub(crate) fn new(endpoint: &str, sheet_id: &str, api_key: &str, client: Client) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            sheet_id: sheet_id.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.endpoint, self.sheet_id, range
        )
    }

    /// Read every response row from `start_row` down.
    ///
    /// The service stops at the last non-empty row, so the range is
    /// left open below.
    pub async fn read_rows(&self, start_row: u32) -> Result<Vec<SheetRow>, Error> {
        let range = format!("{}!A{}:{}", RESPONSES_TAB, start_row, LAST_COLUMN);

        let mut params = HashMap::new();
        params.insert("key".to_string(), self.api_key.clone());

        let range_data = Fetch::get(&self.client, &self.values_url(&range))
            .query(params)
            .execute::<ValueRange>()
            .await
            .map_err(|e| Error::sheet(format!("reading {} failed: {}", range, e)))?;

        let rows = range_data
            .values
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(offset, values)| SheetRow {
                index: start_row + offset as u32,
                values,
            })
            .collect();

        Ok(rows)
    }

    /// Rewrite one row in place with corrected values
    pub async fn write_row(&self, row_index: u32, values: &[String]) -> Result<(), Error> {
        let range = format!(
            "{}!A{}:{}{}",
            RESPONSES_TAB, row_index, LAST_COLUMN, row_index
        );

        let mut params = HashMap::new();
        params.insert("key".to_string(), self.api_key.clone());
        params.insert("valueInputOption".to_string(), "RAW".to_string());

        let body = ValueRange {
            range: Some(range.clone()),
            major_dimension: Some("ROWS".to_string()),
            values: Some(vec![values.to_vec()]),
        };

        Fetch::put(&self.client, &self.values_url(&range))
            .query(params)
            .json(&body)?
            .execute::<serde_json::Value>()
            .await
            .map_err(|e| Error::sheet(format!("writing row {} failed: {}", row_index, e)))?;

        Ok(())
    }
}
