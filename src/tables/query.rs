//! Query builders for table access

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder, CLIENT_INFO};
use crate::tables::filter::FilterOperator;
use crate::tables::types::{CountOption, ReturnOption};

/// Query string parameters shared by every builder
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    /// Query parameters
    params: HashMap<String, String>,
}

impl QueryBuilder {
    /// Start an empty parameter set
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Set one query string parameter
    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Add a filter expression for a column
    pub fn add_filter(&mut self, column: &str, op: FilterOperator, value: &str) {
        self.params
            .insert(column.to_string(), format!("{}.{}", op.as_str(), value));
    }

    /// The collected query parameters
    pub fn get_params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// Authentication material shared by all builders
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub key: String,
    pub token: Option<String>,
    /// Database schema, sent as a profile header when not the default
    pub schema: Option<String>,
}

impl Credentials {
    fn apply<'a>(&self, fetch: FetchBuilder<'a>) -> FetchBuilder<'a> {
        let mut fetch = fetch
            .api_key(&self.key, self.token.as_deref())
            .header("X-Client-Info", CLIENT_INFO);
        if let Some(ref schema) = self.schema {
            fetch = fetch
                .header("Accept-Profile", schema)
                .header("Content-Profile", schema);
        }
        fetch
    }
}

async fn expect_success(response: reqwest::Response) -> Result<(), Error> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(Error::database(format!(
        "write failed with status {}: {}",
        status, text
    )))
}

/// Read query over one table or view
pub struct SelectBuilder {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,
}

impl SelectBuilder {
    pub(crate) fn new(url: String, credentials: Credentials, columns: &str, client: Client) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", columns);

        Self {
            url,
            credentials,
            client,
            query,
        }
    }

    /// Filter rows with an explicit operator
    pub fn filter<T: ToString>(&mut self, column: &str, op: FilterOperator, value: T) -> &mut Self {
        self.query.add_filter(column, op, &value.to_string());
        self
    }

    /// Keep rows whose `column` equals `value`
    pub fn eq<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Eq, value)
    }

    /// Keep rows whose `column` differs from `value`
    pub fn neq<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Neq, value)
    }

    /// Keep rows whose `column` is greater than `value`
    pub fn gt<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Gt, value)
    }

    /// Keep rows whose `column` is at least `value`
    pub fn gte<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Gte, value)
    }

    /// Keep rows whose `column` is less than `value`
    pub fn lt<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Lt, value)
    }

    /// Keep rows whose `column` is at most `value`
    pub fn lte<T: ToString>(&mut self, column: &str, value: T) -> &mut Self {
        self.filter(column, FilterOperator::Lte, value)
    }

    /// Keep rows whose `column` matches `pattern`, ignoring case
    pub fn ilike(&mut self, column: &str, pattern: &str) -> &mut Self {
        self.filter(column, FilterOperator::ILike, pattern)
    }

    /// Keep rows whose `column` is one of `values`
    pub fn in_list<T: ToString>(&mut self, column: &str, values: &[T]) -> &mut Self {
        let values_str: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.filter(column, FilterOperator::In, format!("({})", values_str.join(",")))
    }

    /// Cap the number of rows returned
    pub fn limit(&mut self, count: i32) -> &mut Self {
        self.query.add_param("limit", &count.to_string());
        self
    }

    /// Skip `count` rows before returning any
    pub fn offset(&mut self, count: i32) -> &mut Self {
        self.query.add_param("offset", &count.to_string());
        self
    }

    /// Sort the results by `column`
    pub fn order(&mut self, column: &str, ascending: bool) -> &mut Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.query
            .add_param("order", &format!("{}.{}", column, direction));
        self
    }

    /// Run the query and return the matching rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::get(&self.client, &self.url))
            .query(self.query.get_params().clone());

        let result = fetch.execute::<Vec<T>>().await?;
        Ok(result)
    }

    /// Run the query and return only the first row
    pub async fn execute_one<T: DeserializeOwned>(&mut self) -> Result<Option<T>, Error> {
        self.limit(1);

        let results = self.execute::<T>().await?;
        Ok(results.into_iter().next())
    }
}

/// Insert of one or more rows
pub struct InsertBuilder<T: Serialize> {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// Rows to write
    values: T,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,
}

impl<T: Serialize> InsertBuilder<T> {
    pub(crate) fn new(url: String, credentials: Credentials, values: T, client: Client) -> Self {
        Self {
            url,
            credentials,
            values,
            client,
            query: QueryBuilder::new(),
        }
    }

    /// Run the insert and return the rows as stored
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::post(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Representation.prefer())
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        let result = fetch.execute::<R>().await?;
        Ok(result)
    }

    /// Run the insert without reading anything back
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = self
            .credentials
            .apply(Fetch::post(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Minimal.prefer())
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        expect_success(fetch.execute_raw().await?).await
    }
}

/// Update of every row matching the filters
pub struct UpdateBuilder<T: Serialize> {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// Changed fields to apply
    values: T,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,
}

impl<T: Serialize> UpdateBuilder<T> {
    pub(crate) fn new(url: String, credentials: Credentials, values: T, client: Client) -> Self {
        Self {
            url,
            credentials,
            values,
            client,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows with an explicit operator
    pub fn filter<V: ToString>(&mut self, column: &str, op: FilterOperator, value: V) -> &mut Self {
        self.query.add_filter(column, op, &value.to_string());
        self
    }

    /// Keep rows whose `column` equals `value`
    pub fn eq<V: ToString>(&mut self, column: &str, value: V) -> &mut Self {
        self.filter(column, FilterOperator::Eq, value)
    }

    /// Run the update and return the rows as stored
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::patch(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Representation.prefer())
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        let result = fetch.execute::<R>().await?;
        Ok(result)
    }

    /// Run the update without reading anything back
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = self
            .credentials
            .apply(Fetch::patch(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Minimal.prefer())
            .query(self.query.get_params().clone())
            .json(&self.values)?;

        expect_success(fetch.execute_raw().await?).await
    }
}

/// Insert that merges with the existing row on a key conflict
pub struct UpsertBuilder<T: Serialize> {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// Rows to write or merge
    values: T,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,

    /// On conflict columns
    on_conflict: Option<String>,
}

impl<T: Serialize> UpsertBuilder<T> {
    pub(crate) fn new(url: String, credentials: Credentials, values: T, client: Client) -> Self {
        Self {
            url,
            credentials,
            values,
            client,
            query: QueryBuilder::new(),
            on_conflict: None,
        }
    }

    /// Detect conflicts on `column` instead of the primary key
    pub fn on_conflict(&mut self, column: &str) -> &mut Self {
        self.on_conflict = Some(column.to_string());
        self
    }

    fn prefer(&self, return_option: ReturnOption) -> String {
        match &self.on_conflict {
            Some(_) => format!(
                "resolution=merge-duplicates,{}",
                return_option.prefer()
            ),
            None => return_option.prefer(),
        }
    }

    fn apply_conflict(&self, query: &mut QueryBuilder) {
        if let Some(ref conflict) = self.on_conflict {
            query.add_param("on_conflict", conflict);
        }
    }

    /// Run the upsert and return the rows as stored
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let mut query = self.query.clone();
        self.apply_conflict(&mut query);

        let fetch = self
            .credentials
            .apply(Fetch::post(&self.client, &self.url))
            .header("Prefer", &self.prefer(ReturnOption::Representation))
            .query(query.get_params().clone())
            .json(&self.values)?;

        let result = fetch.execute::<R>().await?;
        Ok(result)
    }

    /// Run the upsert without reading anything back
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let mut query = self.query.clone();
        self.apply_conflict(&mut query);

        let fetch = self
            .credentials
            .apply(Fetch::post(&self.client, &self.url))
            .header("Prefer", &self.prefer(ReturnOption::Minimal))
            .query(query.get_params().clone())
            .json(&self.values)?;

        expect_success(fetch.execute_raw().await?).await
    }
}

/// Delete of every row matching the filters
pub struct DeleteBuilder {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,
}

impl DeleteBuilder {
    pub(crate) fn new(url: String, credentials: Credentials, client: Client) -> Self {
        Self {
            url,
            credentials,
            client,
            query: QueryBuilder::new(),
        }
    }

    /// Filter rows with an explicit operator
    pub fn filter<V: ToString>(&mut self, column: &str, op: FilterOperator, value: V) -> &mut Self {
        self.query.add_filter(column, op, &value.to_string());
        self
    }

    /// Keep rows whose `column` equals `value`
    pub fn eq<V: ToString>(&mut self, column: &str, value: V) -> &mut Self {
        self.filter(column, FilterOperator::Eq, value)
    }

    /// Run the delete and return the removed rows
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::delete(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Representation.prefer())
            .query(self.query.get_params().clone());

        let result = fetch.execute::<R>().await?;
        Ok(result)
    }

    /// Run the delete without reading anything back
    pub async fn execute_no_return(&self) -> Result<(), Error> {
        let fetch = self
            .credentials
            .apply(Fetch::delete(&self.client, &self.url))
            .header("Prefer", &ReturnOption::Minimal.prefer())
            .query(self.query.get_params().clone());

        expect_success(fetch.execute_raw().await?).await
    }
}

/// Builder for row count queries.
///
/// Issues a HEAD request with a count preference and reads the total
/// from the Content-Range response header, so no rows travel over the
/// wire.
pub struct CountBuilder {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// HTTP client
    client: Client,

    /// Query builder
    query: QueryBuilder,

    /// Count precision
    option: CountOption,
}

impl CountBuilder {
    pub(crate) fn new(url: String, credentials: Credentials, client: Client) -> Self {
        let mut query = QueryBuilder::new();
        query.add_param("select", "*");

        Self {
            url,
            credentials,
            client,
            query,
            option: CountOption::Exact,
        }
    }

    /// Use a planned or estimated count instead of an exact one
    pub fn precision(&mut self, option: CountOption) -> &mut Self {
        self.option = option;
        self
    }

    /// Filter rows with an explicit operator
    pub fn filter<V: ToString>(&mut self, column: &str, op: FilterOperator, value: V) -> &mut Self {
        self.query.add_filter(column, op, &value.to_string());
        self
    }

    /// Keep rows whose `column` equals `value`
    pub fn eq<V: ToString>(&mut self, column: &str, value: V) -> &mut Self {
        self.filter(column, FilterOperator::Eq, value)
    }

    /// Execute the query and return the total row count
    pub async fn execute(&self) -> Result<u64, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::head(&self.client, &self.url))
            .header("Prefer", &format!("count={}", self.option.as_str()))
            .query(self.query.get_params().clone());

        let response = fetch.execute_raw().await?;
        if !response.status().is_success() {
            return Err(Error::database(format!(
                "count failed with status {}",
                response.status()
            )));
        }

        let header = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::database("count response missing content-range header"))?;

        parse_content_range(header)
            .ok_or_else(|| Error::database(format!("unparseable content-range: {}", header)))
    }
}

/// Extract the total from a Content-Range value such as `0-24/3573` or `*/57`
fn parse_content_range(value: &str) -> Option<u64> {
    let total = value.rsplit('/').next()?;
    if total == "*" {
        return None;
    }
    total.trim().parse().ok()
}

/// Call to a backend database function
pub struct RpcBuilder<T: Serialize> {
    /// Endpoint the request goes to
    url: String,

    /// Authentication material
    credentials: Credentials,

    /// Arguments passed to the function
    params: T,

    /// HTTP client
    client: Client,
}

impl<T: Serialize> RpcBuilder<T> {
    pub(crate) fn new(url: String, credentials: Credentials, params: T, client: Client) -> Self {
        Self {
            url,
            credentials,
            params,
            client,
        }
    }

    /// Call the function and decode what it returns
    pub async fn execute<R: DeserializeOwned>(&self) -> Result<R, Error> {
        let fetch = self
            .credentials
            .apply(Fetch::post(&self.client, &self.url))
            .json(&self.params)?;

        let result = fetch.execute::<R>().await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_as_operator_prefixed_params() {
        let mut query = QueryBuilder::new();
        query.add_filter("center_id", FilterOperator::Eq, "4");
        query.add_filter("name", FilterOperator::ILike, "*rao*");

        let params = query.get_params();
        assert_eq!(params.get("center_id").unwrap(), "eq.4");
        assert_eq!(params.get("name").unwrap(), "ilike.*rao*");
    }

    #[test]
    fn content_range_totals_parse() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/57"), Some(57));
        assert_eq!(parse_content_range("*/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }
}
