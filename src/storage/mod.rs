//! Storage operations for photos, scanned documents and generated reports

mod types;

use reqwest::{multipart, Client};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::fetch::{Fetch, CLIENT_INFO};
use crate::tables::Credentials;

pub use types::*;

/// Bucket names used by the portal
pub mod buckets {
    /// Student profile photos
    pub const PHOTOS: &str = "photos";

    /// Scanned assessments and guardian paperwork
    pub const DOCUMENTS: &str = "documents";

    /// Generated quarterly reports
    pub const REPORTS: &str = "reports";
}

/// Path prefix holding every object that belongs to one student
pub fn student_prefix(student_id: i64) -> String {
    format!("students/{}", student_id)
}

/// Object path for a named file under a student's prefix
pub fn student_object(student_id: i64, file_name: &str) -> String {
    format!("students/{}/{}", student_id, file_name)
}

/// Client for the hosted object storage
pub struct StorageClient {
    /// The base URL for the backend project
    url: String,

    /// Authentication material for requests
    credentials: Credentials,

    /// Connection pool shared with the rest of the portal
    client: Client,
}

/// Handle for operations inside one bucket
pub struct BucketClient<'a> {
    /// Parent client holding credentials and the connection pool
    storage: &'a StorageClient,

    /// Name of the bucket being addressed
    bucket_id: String,
}

impl StorageClient {
    pub(crate) fn new(url: &str, credentials: Credentials, client: Client) -> Self {
        Self {
            url: url.to_string(),
            credentials,
            client,
        }
    }

    /// Full URL for a storage route
    fn get_url(&self, path: &str) -> String {
        format!("{}/storage/v1{}", self.url, path)
    }

    /// Scope the client to one bucket
    pub fn from(&self, bucket_id: &str) -> BucketClient {
        BucketClient {
            storage: self,
            bucket_id: bucket_id.to_string(),
        }
    }
}

impl<'a> BucketClient<'a> {
    /// Store a file body at `path`, optionally replacing what is there
    pub async fn upload(
        &self,
        path: &str,
        file_data: Vec<u8>,
        options: FileOptions,
    ) -> Result<UploadResponse, Error> {
        let url = self
            .storage
            .get_url(&format!("/object/{}/{}", self.bucket_id, path));

        let file_name = Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        let mut part = multipart::Part::bytes(file_data).file_name(file_name);
        if let Some(ref content_type) = options.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| Error::storage(format!("invalid content type: {}", e)))?;
        }
        let form = multipart::Form::new().part("file", part);

        let credentials = &self.storage.credentials;
        let bearer = credentials
            .token
            .as_deref()
            .unwrap_or(&credentials.key)
            .to_string();
        let response = self
            .storage
            .client
            .post(&url)
            .header("apikey", &credentials.key)
            .bearer_auth(bearer)
            .header("X-Client-Info", CLIENT_INFO)
            .header(
                "Cache-Control",
                options.cache_control.unwrap_or_else(|| "3600".to_string()),
            )
            .header("x-upsert", options.upsert.to_string())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(Error::storage(format!(
                "Upload failed with status {}: {}",
                status, text
            )));
        }

        let uploaded = response.json::<UploadResponse>().await?;
        Ok(uploaded)
    }

    /// Fetch the raw bytes of one object
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, Error> {
        let url = self
            .storage
            .get_url(&format!("/object/{}/{}", self.bucket_id, path));

        let bytes = Fetch::get(&self.storage.client, &url)
            .api_key(
                &self.storage.credentials.key,
                self.storage.credentials.token.as_deref(),
            )
            .header("X-Client-Info", CLIENT_INFO)
            .execute_bytes()
            .await
            .map_err(|e| Error::storage(format!("Download failed: {}", e)))?;

        Ok(bytes)
    }

    /// List files in the bucket under a path prefix
    pub async fn list(
        &self,
        prefix: Option<&str>,
        options: ListOptions,
    ) -> Result<Vec<FileObject>, Error> {
        let url = self
            .storage
            .get_url(&format!("/object/list/{}", self.bucket_id));

        let mut params = HashMap::new();
        if let Some(prefix) = prefix {
            params.insert("prefix".to_string(), prefix.to_string());
        }
        if let Some(limit) = options.limit {
            params.insert("limit".to_string(), limit.to_string());
        }
        if let Some(offset) = options.offset {
            params.insert("offset".to_string(), offset.to_string());
        }
        if let Some(sort_by) = options.sort_by {
            params.insert("sortBy".to_string(), sort_by);
        }
        if let Some(sort_order) = options.sort_order {
            params.insert("order".to_string(), sort_order.to_string());
        }

        let files = Fetch::get(&self.storage.client, &url)
            .api_key(
                &self.storage.credentials.key,
                self.storage.credentials.token.as_deref(),
            )
            .header("X-Client-Info", CLIENT_INFO)
            .query(params)
            .execute::<Vec<FileObject>>()
            .await?;

        Ok(files)
    }

    /// Remove the listed objects
    pub async fn delete(&self, paths: &[&str]) -> Result<(), Error> {
        let url = self.storage.get_url(&format!("/object/{}", self.bucket_id));

        let body = serde_json::json!({
            "prefixes": paths
        });

        let response = Fetch::delete(&self.storage.client, &url)
            .api_key(
                &self.storage.credentials.key,
                self.storage.credentials.token.as_deref(),
            )
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute_raw()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::storage(format!(
                "Delete failed with status {}",
                status
            )));
        }

        Ok(())
    }

    /// Sign a short-lived URL for a private object
    pub async fn create_signed_url(
        &self,
        path: &str,
        expires_in: i64,
    ) -> Result<SignedUrlResponse, Error> {
        let url = self
            .storage
            .get_url(&format!("/object/sign/{}/{}", self.bucket_id, path));

        let body = serde_json::json!({
            "expiresIn": expires_in
        });

        let signed_url = Fetch::post(&self.storage.client, &url)
            .api_key(
                &self.storage.credentials.key,
                self.storage.credentials.token.as_deref(),
            )
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute::<SignedUrlResponse>()
            .await?;

        Ok(signed_url)
    }

    /// URL where a public object can be fetched without auth
    pub fn get_public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.storage.url, self.bucket_id, path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StorageClient {
        StorageClient::new(
            "http://localhost:54321",
            Credentials {
                key: "anon-key".to_string(),
                token: None,
                schema: None,
            },
            Client::new(),
        )
    }

    #[test]
    fn student_paths_nest_under_their_id() {
        assert_eq!(student_prefix(204), "students/204");
        assert_eq!(
            student_object(204, "photo.jpg"),
            "students/204/photo.jpg"
        );
    }

    #[test]
    fn public_urls_address_the_object_route() {
        let storage = storage();
        let url = storage
            .from(buckets::PHOTOS)
            .get_public_url("students/204/photo.jpg");
        assert_eq!(
            url,
            "http://localhost:54321/storage/v1/object/public/photos/students/204/photo.jpg"
        );
    }
}
