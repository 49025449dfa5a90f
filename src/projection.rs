//! Cross-entity projection updates.
//!
//! Saving an employee flagged as an educator must also refresh that
//! person's row in the educators table. Grids publish a [`WriteEvent`]
//! after every successful write; a single [`ProjectionUpdater`]
//! consumes the queue and applies the derived write, so no view code
//! carries the rule and no view can forget it.

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::grid::Row;
use crate::schema::EntitySchema;
use crate::Portal;

/// A successful write observed on a grid
#[derive(Debug, Clone)]
pub struct WriteEvent {
    /// The entity that was written
    pub entity: String,

    /// The row as the server returned it
    pub row: Row,
}

/// Create the channel grids publish write events into
pub fn write_channel() -> (
    mpsc::UnboundedSender<WriteEvent>,
    mpsc::UnboundedReceiver<WriteEvent>,
) {
    mpsc::unbounded_channel()
}

/// Whether an employee row asks for an educator record
pub fn educator_flagged(row: &Row) -> bool {
    row.get("is_educator")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Project a source row onto a target schema.
///
/// Keeps the fields the target knows, minus server-owned timestamps;
/// fields the source does not carry are left for the target's
/// defaults.
pub fn shared_fields(source: &Row, target: &EntitySchema) -> Row {
    let mut out = Map::new();
    for field in &target.fields {
        if field.name == "created_at" || field.name == "updated_at" {
            continue;
        }
        if let Some(value) = source.get(&field.name) {
            out.insert(field.name.clone(), value.clone());
        }
    }
    out
}

/// Applies derived writes for observed write events.
///
/// Spawn [`ProjectionUpdater::run`] next to the portal; it drains the
/// queue in order and stops once every grid handle is gone. A failed
/// derived write is logged and the queue moves on; the next flagged
/// save of the same employee heals the projection.
pub struct ProjectionUpdater {
    portal: Portal,
    receiver: mpsc::UnboundedReceiver<WriteEvent>,
}

impl ProjectionUpdater {
    pub(crate) fn new(portal: Portal, receiver: mpsc::UnboundedReceiver<WriteEvent>) -> Self {
        Self { portal, receiver }
    }

    /// Consume events until every sender is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.apply(&event).await {
                log::warn!("projection update for {} failed: {}", event.entity, e);
            }
        }
    }

    /// Apply the derived writes for one event
    pub async fn apply(&self, event: &WriteEvent) -> Result<(), Error> {
        if event.entity == "employees" && educator_flagged(&event.row) {
            self.sync_educator(&event.row).await?;
        }
        Ok(())
    }

    async fn sync_educator(&self, employee: &Row) -> Result<(), Error> {
        let educators = self.portal.schema("educators").await?;
        let payload = shared_fields(employee, &educators);

        if !payload.contains_key("employee_id") {
            return Err(Error::database(
                "employee row carries no employee_id, cannot sync educator",
            ));
        }

        log::debug!(
            "syncing educator row for employee {}",
            payload["employee_id"]
        );

        let client = self.portal.entity("educators");
        let mut upsert = client.upsert(&payload);
        upsert.on_conflict("employee_id");
        upsert.execute_no_return().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, EntitySchema};
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    fn educators_schema() -> EntitySchema {
        let columns = [
            ("employee_id", "bigint", "NO"),
            ("name", "text", "NO"),
            ("email", "text", "YES"),
            ("qualification", "text", "YES"),
            ("created_at", "timestamp with time zone", "NO"),
        ];
        EntitySchema::from_columns(
            "educators",
            columns
                .iter()
                .map(|(name, data_type, nullable)| ColumnInfo {
                    column_name: name.to_string(),
                    data_type: data_type.to_string(),
                    is_nullable: nullable.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn flag_requires_an_explicit_true() {
        assert!(educator_flagged(&row(json!({"is_educator": true}))));
        assert!(!educator_flagged(&row(json!({"is_educator": false}))));
        assert!(!educator_flagged(&row(json!({"is_educator": null}))));
        assert!(!educator_flagged(&row(json!({"name": "Ravi"}))));
        // a truthy string is not the flag
        assert!(!educator_flagged(&row(json!({"is_educator": "true"}))));
    }

    #[test]
    fn projection_keeps_only_fields_the_target_knows() {
        let employee = row(json!({
            "employee_id": 12,
            "name": "Ravi Kumar",
            "email": "ravi@beacon.org",
            "salary": 42000,
            "is_educator": true,
            "created_at": "2023-01-01T00:00:00Z"
        }));

        let payload = shared_fields(&employee, &educators_schema());

        assert_eq!(payload["employee_id"], 12);
        assert_eq!(payload["name"], "Ravi Kumar");
        assert_eq!(payload["email"], "ravi@beacon.org");
        // salary is employee-only, timestamps are server-owned
        assert!(!payload.contains_key("salary"));
        assert!(!payload.contains_key("is_educator"));
        assert!(!payload.contains_key("created_at"));
        // qualification missing on the source stays missing
        assert!(!payload.contains_key("qualification"));
    }
}
