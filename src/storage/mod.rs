pub mod memory;
pub mod repository;
pub mod sqlite;

pub use memory::*;
pub use repository::*;
pub use sqlite::*;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::RETENTION_SECONDS;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Retryable: throttling, lock contention, connection blips.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("operation failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("item not found: {pk}/{sk}")]
    ItemNotFound { pk: String, sk: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One row in the key/value store. The port abstracts a partition/sort-key
/// table (DynamoDB, Firestore, SQLite), so entities serialize into `body`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreItem {
    pub pk: String,
    pub sk: String,
    pub body: Value,
    /// Unix seconds after which the backend may expire the row.
    pub expires_at: i64,
}

/// Storage port. Backends signal retryable conditions with
/// `StorageError::Transient`; the retry discipline lives in
/// [`RetryingStore`], not in the backends.
pub trait Storage {
    fn put(&self, item: StoreItem) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get(
        &self,
        pk: &str,
        sk: &str,
    ) -> impl Future<Output = Result<Option<StoreItem>, StorageError>> + Send;

    /// All items under `pk` whose sort key starts with `sk_prefix`
    /// (all items under `pk` when `None`), ordered by sort key.
    fn query(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
    ) -> impl Future<Output = Result<Vec<StoreItem>, StorageError>> + Send;

    /// Shallow-merge the fields of `patch` (a JSON object) into the item's
    /// body. Fails with `ItemNotFound` when the row does not exist.
    fn update(
        &self,
        pk: &str,
        sk: &str,
        patch: Value,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Retention marker: creation time truncated to whole seconds plus 90 days.
pub fn expiry_timestamp(created: DateTime<Utc>) -> i64 {
    created.timestamp() + RETENTION_SECONDS
}

const MAX_ATTEMPTS: u32 = 3;

/// Run `op` up to three total attempts, sleeping `base * 2^attempt_index`
/// between attempts. Only `Transient` failures are retried; anything else
/// surfaces immediately.
pub async fn with_retries<T, F, Fut>(
    op_name: &str,
    base: Duration,
    mut op: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt_index = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(StorageError::Transient(message)) => {
                if attempt_index + 1 >= MAX_ATTEMPTS {
                    tracing::error!(op = op_name, attempts = MAX_ATTEMPTS, %message, "storage retries exhausted");
                    return Err(StorageError::RetriesExhausted {
                        attempts: MAX_ATTEMPTS,
                        message,
                    });
                }
                let delay = base * 2u32.pow(attempt_index);
                tracing::warn!(op = op_name, attempt = attempt_index, delay_ms = delay.as_millis() as u64, %message, "transient storage failure, retrying");
                tokio::time::sleep(delay).await;
                attempt_index += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Storage wrapper applying the bounded-retry discipline to every
/// operation of an inner backend.
pub struct RetryingStore<S: Storage> {
    inner: S,
    base: Duration,
}

impl<S: Storage> RetryingStore<S> {
    pub fn new(inner: S, base: Duration) -> Self {
        Self { inner, base }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Storage + Sync> Storage for RetryingStore<S> {
    async fn put(&self, item: StoreItem) -> Result<(), StorageError> {
        with_retries("put", self.base, || self.inner.put(item.clone())).await
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>, StorageError> {
        with_retries("get", self.base, || self.inner.get(pk, sk)).await
    }

    async fn query(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
    ) -> Result<Vec<StoreItem>, StorageError> {
        with_retries("query", self.base, || self.inner.query(pk, sk_prefix)).await
    }

    async fn update(&self, pk: &str, sk: &str, patch: Value) -> Result<(), StorageError> {
        with_retries("update", self.base, || {
            self.inner.update(pk, sk, patch.clone())
        })
        .await
    }
}
