//! # Document store
//!
//! Redis holds the marketplace documents: one hash per collection, document
//! id as the field, JSON text as the value. Listings come back in
//! store-defined order; anything needing a stable order sorts after
//! canonicalization.
//!
//! Documents are schema-drifted (written under different field names across
//! time), so everything read here is a raw [`serde_json::Value`] until it
//! passes through [`crate::normalize`]. A value that fails to parse as JSON
//! is logged and skipped, never surfaced as an error.

use std::time::Duration;

use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;

pub const CARS: &str = "cars";
pub const BRANDS: &str = "brands";
pub const CATEGORIES: &str = "categories";

/// A raw stored document and its identifier.
pub type Doc = (String, Value);

#[derive(Clone)]
pub struct Store {
    connection: ConnectionManager,
}

impl Store {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Doc>, AppError> {
        let mut connection = self.connection.clone();
        // BTreeMap keeps the scan order stable across requests.
        let entries: std::collections::BTreeMap<String, String> =
            connection.hgetall(collection).await?;

        Ok(entries
            .into_iter()
            .filter_map(|(id, body)| parse_doc(collection, id, &body))
            .collect())
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, AppError> {
        let mut connection = self.connection.clone();
        let body: Option<String> = connection.hget(collection, id).await?;

        Ok(body
            .and_then(|body| parse_doc(collection, id.to_string(), &body))
            .map(|(_, doc)| doc))
    }

    pub async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), AppError> {
        let mut connection = self.connection.clone();
        let _: () = connection.hset(collection, id, doc.to_string()).await?;
        Ok(())
    }

    /// Stores a new document under a generated id and returns that id.
    pub async fn insert(&self, collection: &str, doc: &Value) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        self.put(collection, &id, doc).await?;
        Ok(id)
    }

    /// Returns whether a document was actually removed.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.hdel(collection, id).await?;
        Ok(removed > 0)
    }

    /// Filtered query: documents whose `field` is literally `true`. Used for
    /// the dual-named featured lookups, once per flag spelling.
    pub async fn find_flagged(
        &self,
        collection: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<Doc>, AppError> {
        let docs = self.list(collection).await?;

        Ok(docs
            .into_iter()
            .filter(|(_, doc)| doc.get(field).and_then(Value::as_bool) == Some(true))
            .take(limit)
            .collect())
    }
}

fn parse_doc(collection: &str, id: String, body: &str) -> Option<Doc> {
    match serde_json::from_str(body) {
        Ok(doc) => Some((id, doc)),
        Err(e) => {
            warn!("Unparsable document {id} in {collection}: {e}");
            None
        }
    }
}
