//! Persisted review cursor for the intake queue.
//!
//! The cursor marks the first spreadsheet row nobody has reviewed
//! yet. Advancing is a compare-and-swap against the stored position:
//! when two reviewers race on the same row, exactly one advance wins
//! and the loser gets a conflict instead of a double decision.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Error;
use crate::Portal;

/// First data row of the responses tab; row 1 is the header
pub const FIRST_DATA_ROW: u32 = 2;

/// Backend table persisting review cursors
pub const CURSOR_TABLE: &str = "intake_cursor";

/// Name of the cursor row for student applications
pub const STUDENT_CURSOR: &str = "student_applications";

/// Storage for the intake review position
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The first unreviewed row
    async fn position(&self) -> Result<u32, Error>;

    /// Move the cursor from `from` to `to`.
    ///
    /// Fails with [`Error::Conflict`] when the stored position is no
    /// longer `from`.
    async fn advance(&self, from: u32, to: u32) -> Result<(), Error>;
}

#[derive(Debug, Deserialize)]
struct CursorRow {
    position: u32,
}

/// Cursor persisted in a backend table, shared by every reviewer
pub struct TableCursorStore {
    portal: Portal,
    name: String,
}

impl TableCursorStore {
    /// Store for the student application cursor
    pub fn new(portal: Portal) -> Self {
        Self::named(portal, STUDENT_CURSOR)
    }

    /// Store for a differently named cursor row
    pub fn named(portal: Portal, name: &str) -> Self {
        Self {
            portal,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl CursorStore for TableCursorStore {
    async fn position(&self) -> Result<u32, Error> {
        let client = self.portal.entity(CURSOR_TABLE);
        let mut select = client.select("position");
        select.eq("name", &self.name);
        let row = select.execute_one::<CursorRow>().await?;

        match row {
            Some(row) => Ok(row.position),
            None => {
                // First run against a fresh backend: seed the cursor
                // at the top of the data. A concurrent seeder hits a
                // unique key and is harmless, both saw the same start.
                let seed = json!({"name": self.name, "position": FIRST_DATA_ROW});
                if let Err(e) = client.insert(&seed).execute_no_return().await {
                    log::debug!("intake cursor seed skipped: {}", e);
                }
                Ok(FIRST_DATA_ROW)
            }
        }
    }

    async fn advance(&self, from: u32, to: u32) -> Result<(), Error> {
        let client = self.portal.entity(CURSOR_TABLE);
        let body = json!({"position": to});
        let mut update = client.update(&body);
        update.eq("name", &self.name).eq("position", from);
        let moved: Vec<CursorRow> = update.execute().await?;

        if moved.is_empty() {
            return Err(Error::conflict(format!(
                "intake cursor already moved past row {}",
                from
            )));
        }
        Ok(())
    }
}

/// In-memory cursor for tests and single-operator tools
pub struct MemoryCursorStore {
    position: AtomicU32,
}

impl Default for MemoryCursorStore {
    fn default() -> Self {
        Self::starting_at(FIRST_DATA_ROW)
    }
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: u32) -> Self {
        Self {
            position: AtomicU32::new(position),
        }
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn position(&self) -> Result<u32, Error> {
        Ok(self.position.load(Ordering::SeqCst))
    }

    async fn advance(&self, from: u32, to: u32) -> Result<(), Error> {
        self.position
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| {
                Error::conflict(format!("intake cursor is at row {}, not {}", actual, from))
            })
    }
}
