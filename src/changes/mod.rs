//! Change feed for row writes observed by the portal.
//!
//! Views subscribe to the tables they render and receive insert,
//! update and delete notifications. Events are dispatched in process
//! through broadcast channels; a websocket transport or a test can
//! push events in with [`ChangeFeed::publish`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::error::Error;

/// Buffered events per topic before slow subscribers start losing them
const CHANNEL_CAPACITY: usize = 64;

/// Topic segment matching every table
pub const ALL_TABLES: &str = "*";

/// Kinds of row change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Insert operation
    #[serde(rename = "INSERT")]
    Insert,

    /// Update operation
    #[serde(rename = "UPDATE")]
    Update,

    /// Delete operation
    #[serde(rename = "DELETE")]
    Delete,
}

/// A row change on one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The schema
    pub schema: String,

    /// The table
    pub table: String,

    /// Commit timestamp
    pub commit_timestamp: String,

    /// Event kind
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,

    /// Row contents after the write
    pub new: Option<serde_json::Value>,

    /// Row contents before the write, when the server sends them
    pub old: Option<serde_json::Value>,
}

impl ChangeEvent {
    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// An insert event carrying the new row
    pub fn insert(table: &str, row: serde_json::Value) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            commit_timestamp: Self::now(),
            kind: ChangeKind::Insert,
            new: Some(row),
            old: None,
        }
    }

    /// An update event carrying the row before and after
    pub fn update(table: &str, old: serde_json::Value, new: serde_json::Value) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            commit_timestamp: Self::now(),
            kind: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
        }
    }

    /// A delete event carrying the removed row
    pub fn delete(table: &str, old: serde_json::Value) -> Self {
        Self {
            schema: "public".to_string(),
            table: table.to_string(),
            commit_timestamp: Self::now(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Rehome the event in a schema other than `public`
    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }
}

/// Dispatcher for row change events.
///
/// Cloning shares the underlying channel registry, so a transport and
/// any number of views can hold their own handle.
#[derive(Clone)]
pub struct ChangeFeed {
    /// The base URL for the backend project
    url: String,

    /// The anonymous API key for the backend project
    key: String,

    /// Database schema the feed's topics address
    schema: String,

    /// Broadcast channel per topic
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
}

/// A live subscription to one table's changes
pub struct Subscription {
    topic: String,
    kind: Option<ChangeKind>,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    pub(crate) fn new(url: &str, key: &str) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            schema: "public".to_string(),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Point the feed's topics at a schema other than `public`
    pub(crate) fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    /// Get the WebSocket URL for the change feed transport
    pub fn socket_url(&self) -> String {
        let url = self
            .url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        format!("{}/realtime/v1/websocket?apikey={}", url, self.key)
    }

    /// Format the channel topic for a table: `realtime:{schema}:{table}`
    pub fn topic(schema: &str, table: &str) -> String {
        format!("realtime:{}:{}", schema, table)
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<ChangeEvent> {
        let mut channels = match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to changes on a table in the feed's schema.
    ///
    /// Pass [`ALL_TABLES`] to watch everything, and a kind to receive
    /// only one kind of change.
    pub fn subscribe(&self, table: &str, kind: Option<ChangeKind>) -> Subscription {
        let topic = Self::topic(&self.schema, table);
        let receiver = self.sender_for(&topic).subscribe();
        Subscription {
            topic,
            kind,
            receiver,
        }
    }

    /// Publish an event to its table topic and the wildcard topic.
    ///
    /// Returns how many subscribers were notified. Tests and the
    /// transport layer feed events in through here.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut notified = 0;

        let channels = match self.channels.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for topic in [
            Self::topic(&event.schema, &event.table),
            Self::topic(&event.schema, ALL_TABLES),
        ] {
            if let Some(sender) = channels.get(&topic) {
                notified += sender.send(event.clone()).unwrap_or(0);
            }
        }

        notified
    }
}

impl Subscription {
    /// The topic this subscription listens on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn wants(&self, event: &ChangeEvent) -> bool {
        self.kind.map_or(true, |kind| kind == event.kind)
    }

    /// Wait for the next matching event
    pub async fn recv(&mut self) -> Result<ChangeEvent, Error> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("change feed subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::changes("change feed closed"))
                }
            }
        }
    }

    /// Pull a matching event without waiting, if one is buffered
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
