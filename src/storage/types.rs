//! Wire types for the object storage API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One object as reported by a bucket listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileObject {
    /// The file name
    pub name: String,

    /// The bucket ID
    #[serde(rename = "bucket_id")]
    pub bucket_id: Option<String>,

    /// Owner user ID
    pub owner: Option<String>,

    /// The file ID
    pub id: Option<String>,

    /// The file size in bytes
    #[serde(rename = "size")]
    pub size: Option<i64>,

    /// Creation timestamp
    #[serde(rename = "created_at")]
    pub created_at: Option<String>,

    /// Update timestamp
    #[serde(rename = "updated_at")]
    pub updated_at: Option<String>,

    /// Last accessed timestamp
    #[serde(rename = "last_accessed_at")]
    pub last_accessed_at: Option<String>,

    /// File metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// MIME type
    #[serde(rename = "mime_type")]
    pub mime_type: Option<String>,
}

/// Response returned after an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Object key, `bucket/path`
    #[serde(rename = "Key")]
    pub key: String,

    /// Object id, when the service reports one
    #[serde(rename = "Id")]
    pub id: Option<String>,
}

/// Knobs for an upload
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Cache control header
    pub cache_control: Option<String>,

    /// Content type of the uploaded bytes
    pub content_type: Option<String>,

    /// Whether to overwrite an existing object at the same path
    pub upsert: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            cache_control: None,
            content_type: None,
            upsert: false,
        }
    }
}

/// Paging and ordering for a bucket listing
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Cap on the number of entries returned
    pub limit: Option<i32>,

    /// Offset for pagination
    pub offset: Option<i32>,

    /// Field to sort by
    pub sort_by: Option<String>,

    /// Sort direction
    pub sort_order: Option<SortOrder>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            sort_by: None,
            sort_order: None,
        }
    }
}

/// Direction of a listing sort
#[derive(Debug, Clone)]
pub enum SortOrder {
    /// Ascending order
    Asc,

    /// Descending order
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// Body returned when signing a URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    /// The signed URL, relative to the storage endpoint
    #[serde(rename = "signedURL")]
    pub signed_url: String,

    /// The path to the file
    pub path: Option<String>,

    /// Any error that occurred
    pub error: Option<String>,
}
