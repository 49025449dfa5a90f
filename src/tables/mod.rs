//! Database operations through the backend REST interface

mod filter;
mod query;
mod types;

use reqwest::Client;
use serde::Serialize;

use crate::error::Error;

pub use filter::FilterOperator;
pub use query::{
    CountBuilder, DeleteBuilder, InsertBuilder, QueryBuilder, RpcBuilder, SelectBuilder,
    UpdateBuilder, UpsertBuilder,
};
pub use types::{CountOption, ReturnOption};

pub(crate) use query::Credentials;

/// Client for operations against one table or view.
///
/// Created through [`crate::Portal::entity`]; carries the caller's
/// access token so row level security sees the signed-in user.
pub struct TableClient {
    /// The base URL for the backend project
    url: String,

    /// Authentication material for requests
    credentials: Credentials,

    /// The table or view name
    table: String,

    /// HTTP client
    client: Client,
}

impl TableClient {
    /// Create a new TableClient
    pub(crate) fn new(
        url: &str,
        credentials: Credentials,
        table: &str,
        client: Client,
    ) -> Self {
        Self {
            url: url.to_string(),
            credentials,
            table: table.to_string(),
            client,
        }
    }

    /// REST route for this table
    fn get_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    /// Replace the bearer token used for requests
    pub fn with_auth(mut self, token: &str) -> Self {
        self.credentials.token = Some(token.to_string());
        self
    }

    /// Start a read over the named columns
    pub fn select(&self, columns: &str) -> SelectBuilder {
        SelectBuilder::new(
            self.get_url(),
            self.credentials.clone(),
            columns,
            self.client.clone(),
        )
    }

    /// Start an insert of `values`
    pub fn insert<T: Serialize>(&self, values: T) -> InsertBuilder<T> {
        InsertBuilder::new(
            self.get_url(),
            self.credentials.clone(),
            values,
            self.client.clone(),
        )
    }

    /// Start an update applying `values` to matching rows
    pub fn update<T: Serialize>(&self, values: T) -> UpdateBuilder<T> {
        UpdateBuilder::new(
            self.get_url(),
            self.credentials.clone(),
            values,
            self.client.clone(),
        )
    }

    /// Start a write that merges with an existing row on conflict
    pub fn upsert<T: Serialize>(&self, values: T) -> UpsertBuilder<T> {
        UpsertBuilder::new(
            self.get_url(),
            self.credentials.clone(),
            values,
            self.client.clone(),
        )
    }

    /// Start a delete over matching rows
    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self.get_url(), self.credentials.clone(), self.client.clone())
    }

    /// Count rows in the table without fetching them
    pub fn count(&self) -> CountBuilder {
        CountBuilder::new(self.get_url(), self.credentials.clone(), self.client.clone())
    }

    /// Invoke a database function under the `/rpc` route
    pub fn rpc<T: Serialize>(&self, function: &str, params: T) -> RpcBuilder<T> {
        let url = format!("{}/rest/v1/rpc/{}", self.url, function);
        RpcBuilder::new(url, self.credentials.clone(), params, self.client.clone())
    }
}

/// Render a JSON scalar the way filter expressions expect it.
///
/// Strings are used verbatim, numbers and booleans via their display
/// form. Nulls map to the literal `null` for use with the `is`
/// operator.
pub fn filter_value(value: &serde_json::Value) -> Result<String, Error> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok("null".to_string()),
        other => Err(Error::database(format!(
            "cannot build a filter from a non-scalar value: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_values_render_scalars() {
        assert_eq!(filter_value(&json!("s-204")).unwrap(), "s-204");
        assert_eq!(filter_value(&json!(31)).unwrap(), "31");
        assert_eq!(filter_value(&json!(true)).unwrap(), "true");
        assert_eq!(filter_value(&json!(null)).unwrap(), "null");
        assert!(filter_value(&json!({"id": 1})).is_err());
        assert!(filter_value(&json!([1, 2])).is_err());
    }
}
