//! Application core of the Beacon admin portal.
//!
//! Beacon is the administrative portal of a special-needs education
//! nonprofit: students, employees, educators, centers, programs,
//! payroll and the paperwork around them. This crate is the headless
//! core a shell builds on. It holds typed clients for the hosted
//! backend (tables, storage, auth, change feed) and the application
//! layer on top of them: schema-driven entity grids, validated forms,
//! the spreadsheet intake queue, dashboards and report generation.
//!
//! Everything hangs off a [`Portal`]:
//!
//! ```
//! use beacon_portal::Portal;
//!
//! let portal = Portal::new("https://project.example.co", "anon-key");
//! let students = portal.grid("students");
//! ```

pub mod auth;
pub mod changes;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod forms;
pub mod grid;
pub mod intake;
pub mod prefs;
pub mod projection;
pub mod reports;
pub mod schema;
pub mod storage;
pub mod tables;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::auth::{Auth, Role, Session, SessionStore};
use crate::changes::ChangeFeed;
use crate::config::PortalOptions;
use crate::dashboard::Dashboard;
use crate::error::Error;
use crate::grid::{EntityGrid, Row};
use crate::intake::{CursorStore, IntakeQueue, SheetClient, TableCursorStore};
use crate::projection::{ProjectionUpdater, WriteEvent};
use crate::reports::ReportClient;
use crate::schema::{ColumnInfo, EntitySchema, LookupOption, SchemaCache};
use crate::storage::StorageClient;
use crate::tables::{Credentials, RpcBuilder, TableClient};

/// The main entry point for the portal core.
///
/// Cheap to clone; clones share the HTTP connection pool, the signed-in
/// session, the schema cache and the change feed.
#[derive(Clone)]
pub struct Portal {
    /// The base URL for the backend project
    pub url: String,

    /// The anonymous API key for the backend project
    pub key: String,

    /// Connection pool shared by every sub-client
    pub http_client: Client,

    /// Auth client holding the signed-in session
    pub auth: Auth,

    /// Client options
    pub options: PortalOptions,

    /// Resolved entity schemas, shared across views
    schemas: SchemaCache,

    /// Change feed shared by every subscriber
    feed: ChangeFeed,

    /// Store the session is persisted to, when configured
    session_store: Option<Arc<dyn SessionStore>>,

    /// Write event channel, present once a projection updater is attached
    write_events: Option<mpsc::UnboundedSender<WriteEvent>>,
}

impl Portal {
    /// Create a new portal client
    ///
    /// # Example
    ///
    /// ```
    /// use beacon_portal::Portal;
    ///
    /// let portal = Portal::new("https://project.example.co", "anon-key");
    /// ```
    pub fn new(backend_url: &str, backend_key: &str) -> Self {
        Self::new_with_options(backend_url, backend_key, PortalOptions::default())
    }

    /// Create a new portal client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use beacon_portal::{config::PortalOptions, Portal};
    ///
    /// let options = PortalOptions::default().with_sheet("sheet-id", "sheet-key");
    /// let portal = Portal::new_with_options("https://project.example.co", "anon-key", options);
    /// ```
    pub fn new_with_options(backend_url: &str, backend_key: &str, options: PortalOptions) -> Self {
        let url = backend_url.trim_end_matches('/').to_string();

        let http_client = match options.request_timeout {
            Some(timeout) => Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            None => Client::new(),
        };

        let auth = Auth::new(&url, backend_key, http_client.clone());
        let feed = ChangeFeed::new(&url, backend_key).with_schema(&options.db_schema);

        Self {
            url,
            key: backend_key.to_string(),
            http_client,
            auth,
            options,
            schemas: SchemaCache::new(),
            feed,
            session_store: None,
            write_events: None,
        }
    }

    /// Create a portal client from the environment.
    ///
    /// Reads `PORTAL_BACKEND_URL` and `PORTAL_BACKEND_KEY`, plus the
    /// optional service settings [`PortalOptions::from_env`] knows.
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var("PORTAL_BACKEND_URL")
            .map_err(|_| Error::general("PORTAL_BACKEND_URL is not set"))?;
        let key = std::env::var("PORTAL_BACKEND_KEY")
            .map_err(|_| Error::general("PORTAL_BACKEND_KEY is not set"))?;

        Ok(Self::new_with_options(&url, &key, PortalOptions::from_env()))
    }

    /// Persist the session to the given store at login and clear it at
    /// logout
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Pair this portal with the updater that applies derived writes.
    ///
    /// Spawn [`ProjectionUpdater::run`] on the runtime; grids created
    /// from the returned portal publish their writes to it.
    pub fn with_projection(mut self) -> (Self, ProjectionUpdater) {
        let (sender, receiver) = projection::write_channel();
        // The updater's own portal handle must not hold a sender, or
        // run() would never see the channel close.
        let updater = ProjectionUpdater::new(self.clone(), receiver);
        self.write_events = Some(sender);
        (self, updater)
    }

    /// Authentication material for requests, carrying the signed-in
    /// user's token when there is one.
    fn credentials(&self) -> Credentials {
        let token = self.auth.get_session().map(|s| s.access_token);
        let schema = match self.options.db_schema.as_str() {
            "public" => None,
            other => Some(other.to_string()),
        };
        Credentials {
            key: self.key.clone(),
            token,
            schema,
        }
    }

    pub(crate) fn write_events(&self) -> Option<mpsc::UnboundedSender<WriteEvent>> {
        self.write_events.clone()
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Create a client for operations on one table or view
    ///
    /// # Example
    ///
    /// ```
    /// use beacon_portal::Portal;
    ///
    /// let portal = Portal::new("https://project.example.co", "anon-key");
    /// let query = portal.entity("students").select("*");
    /// ```
    pub fn entity(&self, table: &str) -> TableClient {
        TableClient::new(&self.url, self.credentials(), table, self.http_client.clone())
    }

    /// Call a backend function by name
    pub fn rpc<T: Serialize>(&self, function: &str, params: T) -> RpcBuilder<T> {
        let url = format!("{}/rest/v1/rpc/{}", self.url, function);
        RpcBuilder::new(url, self.credentials(), params, self.http_client.clone())
    }

    /// Get the storage client for file operations
    pub fn storage(&self) -> StorageClient {
        StorageClient::new(&self.url, self.credentials(), self.http_client.clone())
    }

    /// Get the change feed for live table subscriptions
    pub fn changes(&self) -> ChangeFeed {
        self.feed.clone()
    }

    /// Create the table view-model for an entity
    pub fn grid(&self, entity: &str) -> EntityGrid {
        EntityGrid::new(self.clone(), entity)
    }

    /// Create the aggregate view client for the overview screens
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.clone())
    }

    /// Create the report generation client.
    ///
    /// Requires a report endpoint in the options.
    pub fn reports(&self) -> Result<ReportClient, Error> {
        let url = self
            .options
            .report_url
            .as_deref()
            .ok_or_else(|| Error::report("no report endpoint configured"))?;
        Ok(ReportClient::new(url, self.http_client.clone()))
    }

    /// Create the spreadsheet client for the intake sheet.
    ///
    /// Requires a sheet id and API key in the options.
    pub fn sheet(&self) -> Result<SheetClient, Error> {
        let sheet_id = self
            .options
            .sheet_id
            .as_deref()
            .ok_or_else(|| Error::sheet("no intake spreadsheet configured"))?;
        let sheet_key = self
            .options
            .sheet_key
            .as_deref()
            .ok_or_else(|| Error::sheet("no spreadsheet API key configured"))?;

        Ok(SheetClient::new(
            &self.options.sheet_endpoint,
            sheet_id,
            sheet_key,
            self.http_client.clone(),
        ))
    }

    /// Create the intake review queue, with the cursor persisted in
    /// the backend cursor table
    pub fn intake(&self) -> Result<IntakeQueue, Error> {
        self.intake_with_cursor(Arc::new(TableCursorStore::new(self.clone())))
    }

    /// Create the intake review queue over a caller-provided cursor
    /// store
    pub fn intake_with_cursor(&self, cursor: Arc<dyn CursorStore>) -> Result<IntakeQueue, Error> {
        let sheet = self.sheet()?;
        Ok(IntakeQueue::new(self.clone(), sheet, cursor))
    }

    /// Resolve the schema descriptor for an entity.
    ///
    /// The column listing is fetched once per entity per run and
    /// served from the cache afterwards.
    pub async fn schema(&self, entity: &str) -> Result<Arc<EntitySchema>, Error> {
        if let Some(schema) = self.schemas.get(entity) {
            return Ok(schema);
        }

        let columns: Vec<ColumnInfo> = self
            .rpc(schema::COLUMNS_FUNCTION, json!({ "table_name": entity }))
            .execute()
            .await?;

        if columns.is_empty() {
            return Err(Error::database(format!(
                "backend reports no columns for {}",
                entity
            )));
        }

        Ok(self.schemas.insert(EntitySchema::from_columns(entity, columns)))
    }

    /// Choices for a lookup widget referencing the given entity.
    ///
    /// Fetches the entity's key and label columns, ordered by label so
    /// dropdowns read alphabetically.
    pub async fn lookup_options(&self, entity: &str) -> Result<Vec<LookupOption>, Error> {
        let key = schema::primary_key(entity);
        let label = schema::label_column(entity);

        let mut select = self.entity(entity).select(&format!("{},{}", key, label));
        select.order(label, true);
        let rows: Vec<Row> = select.execute().await?;

        Ok(rows
            .into_iter()
            .map(|row| LookupOption {
                key: row.get(key).cloned().unwrap_or(Value::Null),
                label: row
                    .get(label)
                    .and_then(schema::stringify_cell)
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Sign in and resolve the portal session.
    ///
    /// Exchanges the password for tokens, then looks the email up in
    /// the employees table to resolve the portal role; an account
    /// without an employee record signs in as a parent. The session is
    /// held for subsequent requests and persisted when a session store
    /// is configured.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, Error> {
        let grant = self.auth.sign_in(email, password).await?;

        if let Some(message) = grant.error_description.or(grant.error) {
            return Err(Error::auth(message));
        }

        let access_token = grant
            .access_token
            .ok_or_else(|| Error::auth("token grant carried no access token"))?;
        let refresh_token = grant.refresh_token.unwrap_or_default();
        let user_id = grant.user.map(|user| user.id).unwrap_or_default();
        let expires_in = grant.expires_in.unwrap_or(3600);

        let role = self.staff_role(email, &access_token).await?;

        let session = Session::new(
            access_token,
            refresh_token,
            user_id,
            email.to_string(),
            role,
            expires_in,
        );
        self.auth.set_session(session.clone());

        if self.options.persist_session {
            if let Some(ref store) = self.session_store {
                if let Err(e) = store.save(&session).await {
                    log::warn!("persisting session failed: {}", e);
                }
            }
        }

        Ok(session)
    }

    /// Portal role for a login email, from the employees table
    async fn staff_role(&self, email: &str, token: &str) -> Result<Role, Error> {
        let client = self.entity("employees").with_auth(token);
        let mut select = client.select("role");
        select.eq("email", email);
        let employee: Option<Row> = select.execute_one().await?;

        Ok(employee
            .as_ref()
            .and_then(|row| row.get("role"))
            .and_then(Value::as_str)
            .map(Role::from_label)
            .unwrap_or(Role::Parent))
    }

    /// Load a persisted session back into the portal, skipping expired
    /// ones
    pub async fn restore_session(&self) -> Result<Option<Session>, Error> {
        let store = match self.session_store {
            Some(ref store) => store,
            None => return Ok(None),
        };

        match store.load().await? {
            Some(session) if !session.is_expired() => {
                self.auth.set_session(session.clone());
                Ok(Some(session))
            }
            _ => Ok(None),
        }
    }

    /// Sign out and drop the persisted session
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self.auth.sign_out().await;

        if let Some(ref store) = self.session_store {
            if let Err(e) = store.clear().await {
                log::warn!("clearing stored session failed: {}", e);
            }
        }

        result
    }
}

/// One-line import for code built on the portal
pub mod prelude {
    pub use crate::auth::{Role, Session};
    pub use crate::config::PortalOptions;
    pub use crate::error::Error;
    pub use crate::forms::{EmployeeForm, PayrollForm, StudentForm};
    pub use crate::grid::{EntityGrid, Row, Scope};
    pub use crate::Portal;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed_from_the_url() {
        let portal = Portal::new("https://project.example.co/", "anon-key");
        assert_eq!(portal.url, "https://project.example.co");
    }

    #[test]
    fn unconfigured_services_refuse_their_clients() {
        let portal = Portal::new("https://project.example.co", "anon-key");
        assert!(portal.reports().is_err());
        assert!(portal.sheet().is_err());
        assert!(portal.intake().is_err());
    }

    #[test]
    fn configured_services_hand_out_clients() {
        let options = PortalOptions::default()
            .with_sheet("sheet-123", "key-abc")
            .with_report_url("http://localhost:9001/report");
        let portal = Portal::new_with_options("https://project.example.co", "anon-key", options);

        assert!(portal.reports().is_ok());
        assert!(portal.sheet().is_ok());
        assert!(portal.intake().is_ok());
    }

    #[test]
    fn projection_pairing_wires_grids_to_the_updater() {
        let portal = Portal::new("https://project.example.co", "anon-key");
        assert!(portal.write_events().is_none());

        let (portal, _updater) = portal.with_projection();
        assert!(portal.write_events().is_some());
    }
}
