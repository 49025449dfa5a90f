//! Error handling for the portal core

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Unified error type for the portal core
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failures surfaced by the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request or response bodies that fail to encode or decode
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Database query errors
    #[error("Database error: {0}")]
    Database(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Change feed errors
    #[error("Change feed error: {0}")]
    Changes(String),

    /// Spreadsheet intake errors
    #[error("Sheet error: {0}")]
    Sheet(String),

    /// Report generation errors
    #[error("Report error: {0}")]
    Report(String),

    /// Form validation failures, keyed by field
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Lost a compare-and-swap against persisted state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// General errors
    #[error("{0}")]
    General(String),
}

/// Message-wrapping constructors used at call sites.
impl Error {
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    pub fn database<T: fmt::Display>(msg: T) -> Self {
        Error::Database(msg.to_string())
    }

    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    pub fn changes<T: fmt::Display>(msg: T) -> Self {
        Error::Changes(msg.to_string())
    }

    pub fn sheet<T: fmt::Display>(msg: T) -> Self {
        Error::Sheet(msg.to_string())
    }

    pub fn report<T: fmt::Display>(msg: T) -> Self {
        Error::Report(msg.to_string())
    }

    pub fn conflict<T: fmt::Display>(msg: T) -> Self {
        Error::Conflict(msg.to_string())
    }

    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}

/// Per-field validation messages collected while checking a form.
///
/// Fields are kept in a sorted map so error output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Messages recorded for one field, if any
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.fields.iter()
    }

    /// Convert into an error if any message was recorded
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}
