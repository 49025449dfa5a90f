//! HTTP client abstraction for talking to the hosted backend services

use crate::error::Error;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, Method, RequestBuilder,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use url::Url;

/// Client identification header value sent with every backend request
pub(crate) const CLIENT_INFO: &str = "beacon-portal/0.1.0";

/// One backend request under construction
pub struct FetchBuilder<'a> {
    client: &'a Client,
    url: String,
    method: Method,
    headers: HeaderMap,
    query_params: Option<HashMap<String, String>>,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Start a request; the content type defaults to JSON
    pub fn new(client: &'a Client, url: &str, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Self {
            client,
            url: url.to_string(),
            method,
            headers,
            query_params: None,
            body: None,
        }
    }

    /// Set a header; names or values that do not parse are skipped
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            if let Ok(name) = reqwest::header::HeaderName::from_bytes(name.as_bytes()) {
                self.headers.insert(name, value);
            }
        }
        self
    }

    /// Authenticate the request with a bearer token
    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    /// Add the backend api key and a bearer token in one step.
    ///
    /// Every call against the hosted backend carries the project key;
    /// the bearer token is the anon key until a user signs in.
    pub fn api_key(self, key: &str, token: Option<&str>) -> Self {
        let bearer = token.unwrap_or(key).to_string();
        self.header("apikey", key).bearer_auth(&bearer)
    }

    /// Attach query parameters, replacing any set earlier
    pub fn query(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Serialize a value as the JSON request body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(body)?;
        self.body = Some(bytes);
        Ok(self)
    }

    fn build(&self) -> Result<RequestBuilder, Error> {
        let mut url = Url::parse(&self.url)?;

        if let Some(params) = &self.query_params {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let mut request = self.client.request(self.method.clone(), url.as_str());
        request = request.headers(self.headers.clone());

        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        Ok(request)
    }

    /// Send the request, turning non-success statuses into errors
    async fn send_checked(&self) -> Result<reqwest::Response, Error> {
        let response = self.build()?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(Error::general(format!(
                "Request failed with status {}: {}",
                status, text
            )));
        }

        Ok(response)
    }

    /// Send the request and decode a JSON response
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let response = self.send_checked().await?;
        Ok(response.json::<T>().await?)
    }

    /// Send the request and hand back the raw body, for downloads
    pub async fn execute_bytes(&self) -> Result<Vec<u8>, Error> {
        let response = self.send_checked().await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Send the request and return the response untouched.
    ///
    /// The caller is responsible for status handling; used where
    /// response headers matter, such as row counts.
    pub async fn execute_raw(&self) -> Result<reqwest::Response, Error> {
        Ok(self.build()?.send().await?)
    }
}

/// Request constructors, one per method
pub struct Fetch;

impl Fetch {
    /// Start a GET request
    pub fn get<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::GET)
    }

    /// Start a HEAD request
    pub fn head<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::HEAD)
    }

    /// Start a POST request
    pub fn post<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::POST)
    }

    /// Start a PUT request
    pub fn put<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::PUT)
    }

    /// Start a PATCH request
    pub fn patch<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::PATCH)
    }

    /// Start a DELETE request
    pub fn delete<'a>(client: &'a Client, url: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, url, Method::DELETE)
    }
}
