//! Generic entity table view-model.
//!
//! One [`EntityGrid`] backs each table screen in the portal: it loads
//! the rows matching its scope, answers client-side text search, and
//! applies creates, edits and deletes against the backend while
//! keeping its local rows in step with what the server returned.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::changes::{ChangeEvent, ChangeFeed, ChangeKind, Subscription};
use crate::error::Error;
use crate::projection::WriteEvent;
use crate::schema::{self, stringify_cell, EntitySchema};
use crate::tables::filter_value;
use crate::Portal;

/// A row as the backend returns it
pub type Row = Map<String, Value>;

/// Scope filters applied to every load.
///
/// An educator's portal only sees their center; program views narrow
/// further. Unset filters are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Restrict to one center
    pub center_id: Option<i64>,

    /// Restrict to one program
    pub program_id: Option<i64>,
}

impl Scope {
    pub fn with_center(mut self, center_id: i64) -> Self {
        self.center_id = Some(center_id);
        self
    }

    pub fn with_program(mut self, program_id: i64) -> Self {
        self.program_id = Some(program_id);
        self
    }
}

/// View-model for one entity's table screen
pub struct EntityGrid {
    portal: Portal,
    entity: String,
    scope: Scope,
    schema: Option<Arc<EntitySchema>>,
    rows: Vec<Row>,
    events: Option<mpsc::UnboundedSender<WriteEvent>>,
}

impl EntityGrid {
    pub(crate) fn new(portal: Portal, entity: &str) -> Self {
        let events = portal.write_events();
        Self {
            portal,
            entity: entity.to_string(),
            scope: Scope::default(),
            schema: None,
            rows: Vec::new(),
            events,
        }
    }

    /// Narrow the grid to a scope before loading
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// The entity this grid renders
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The resolved schema, present after the first load
    pub fn schema(&self) -> Option<&Arc<EntitySchema>> {
        self.schema.as_ref()
    }

    /// The loaded rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn pk(&self) -> &'static str {
        schema::primary_key(&self.entity)
    }

    fn emit(&self, row: &Row) {
        if let Some(ref events) = self.events {
            // Fire and forget by design; a missing updater never
            // blocks the write that already succeeded.
            let _ = events.send(WriteEvent {
                entity: self.entity.clone(),
                row: row.clone(),
            });
        }
    }

    /// Resolve the schema and fetch the rows matching the scope
    pub async fn load(&mut self) -> Result<usize, Error> {
        self.schema = Some(self.portal.schema(&self.entity).await?);

        let client = self.portal.entity(&self.entity);
        let mut select = client.select("*");
        if let Some(center_id) = self.scope.center_id {
            select.eq("center_id", center_id);
        }
        if let Some(program_id) = self.scope.program_id {
            select.eq("program_id", program_id);
        }

        self.rows = select.execute::<Row>().await?;
        Ok(self.rows.len())
    }

    /// Filter the loaded rows by a search box value.
    ///
    /// Purely local; the same rows and query always give the same
    /// result. `column` narrows matching to one field, `None` means
    /// all fields.
    pub fn search(&self, query: &str, column: Option<&str>) -> Vec<&Row> {
        search_rows(&self.rows, query, column)
    }

    /// Insert a draft row and append what the server returned
    pub async fn create(&mut self, draft: Row) -> Result<Row, Error> {
        let payload = sanitize_payload(draft, self.pk());
        let client = self.portal.entity(&self.entity);
        let inserted: Vec<Row> = client.insert(&payload).execute().await?;
        let row = inserted
            .into_iter()
            .next()
            .ok_or_else(|| Error::database("insert returned no rows"))?;

        self.rows.push(row.clone());
        self.emit(&row);
        Ok(row)
    }

    /// Update the row with the given key and reconcile it locally
    pub async fn update(&mut self, id: &Value, draft: Row) -> Result<Row, Error> {
        let pk = self.pk();
        let mut payload = sanitize_payload(draft, pk);
        payload.remove(pk);
        let key = filter_value(id)?;

        let client = self.portal.entity(&self.entity);
        let mut update = client.update(&payload);
        update.eq(pk, &key);
        let updated: Vec<Row> = update.execute().await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| Error::database(format!("no {} row with {} = {}", self.entity, pk, key)))?;

        if let Some(local) = self.rows.iter_mut().find(|r| r.get(pk) == Some(id)) {
            *local = row.clone();
        }
        self.emit(&row);
        Ok(row)
    }

    /// Delete the row with the given key
    pub async fn delete(&mut self, id: &Value) -> Result<(), Error> {
        let pk = self.pk();
        let key = filter_value(id)?;

        let client = self.portal.entity(&self.entity);
        let mut delete = client.delete();
        delete.eq(pk, &key);
        delete.execute_no_return().await?;

        self.rows.retain(|r| r.get(pk) != Some(id));
        Ok(())
    }

    /// Subscribe to live changes for this grid's entity
    pub fn watch(&self, feed: &ChangeFeed) -> Subscription {
        feed.subscribe(&self.entity, None)
    }

    /// Fold one observed change into the loaded rows
    pub fn apply_change(&mut self, event: &ChangeEvent) {
        if event.table != self.entity {
            return;
        }
        let pk = self.pk();

        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let row = match event.new.as_ref().and_then(Value::as_object) {
                    Some(row) => row,
                    None => return,
                };
                match row.get(pk) {
                    Some(key) => {
                        if let Some(local) =
                            self.rows.iter_mut().find(|r| r.get(pk) == Some(key))
                        {
                            *local = row.clone();
                        } else {
                            self.rows.push(row.clone());
                        }
                    }
                    None => self.rows.push(row.clone()),
                }
            }
            ChangeKind::Delete => {
                if let Some(key) = event.old.as_ref().and_then(|old| old.get(pk)) {
                    self.rows.retain(|r| r.get(pk) != Some(key));
                }
            }
        }
    }
}

/// Strip fields the backend owns from a draft row.
///
/// `created_at` and `updated_at` are always server-side; the primary
/// key goes only when the draft left it null, so rows that carry
/// their own key (educators) keep it.
pub fn sanitize_payload(mut draft: Row, pk: &str) -> Row {
    draft.remove("created_at");
    draft.remove("updated_at");
    if draft.get(pk).map_or(false, Value::is_null) {
        draft.remove(pk);
    }
    draft
}

/// Case-insensitive substring search over stringified row values.
///
/// Nulls, objects and arrays never match. An empty query keeps every
/// row; a column that rows do not carry matches nothing.
pub fn search_rows<'a>(rows: &'a [Row], query: &str, column: Option<&str>) -> Vec<&'a Row> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.iter().collect();
    }

    rows.iter()
        .filter(|row| match column {
            Some(column) => row
                .get(column)
                .and_then(stringify_cell)
                .map_or(false, |text| text.to_lowercase().contains(&needle)),
            None => row
                .values()
                .any(|value| {
                    stringify_cell(value)
                        .map_or(false, |text| text.to_lowercase().contains(&needle))
                }),
        })
        .collect()
}
