use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use super::{Storage, StorageError, StoreItem};

/// In-memory backend for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<(String, String), StoreItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStore {
    async fn put(&self, item: StoreItem) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap()
            .insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&(pk.to_string(), sk.to_string()))
            .cloned())
    }

    async fn query(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
    ) -> Result<Vec<StoreItem>, StorageError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .values()
            .filter(|item| {
                item.pk == pk
                    && sk_prefix.map_or(true, |prefix| item.sk.starts_with(prefix))
            })
            .cloned()
            .collect())
    }

    async fn update(&self, pk: &str, sk: &str, patch: Value) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(&(pk.to_string(), sk.to_string()))
            .ok_or_else(|| StorageError::ItemNotFound {
                pk: pk.into(),
                sk: sk.into(),
            })?;
        merge_patch(&mut item.body, patch);
        Ok(())
    }
}

/// Shallow-merge the fields of a JSON object patch into a body.
pub(crate) fn merge_patch(body: &mut Value, patch: Value) {
    if let (Value::Object(target), Value::Object(source)) = (body, patch) {
        for (key, value) in source {
            target.insert(key, value);
        }
    }
}

/// Backend wrapper that fails its first `failures` calls with a transient
/// error and counts every call. Drives the retry-discipline tests.
pub struct FlakyStore<S: Storage> {
    inner: S,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
}

impl<S: Storage> FlakyStore<S> {
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Transient("injected failure".into()));
        }
        Ok(())
    }
}

impl<S: Storage + Sync> Storage for FlakyStore<S> {
    async fn put(&self, item: StoreItem) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.put(item).await
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<StoreItem>, StorageError> {
        self.maybe_fail()?;
        self.inner.get(pk, sk).await
    }

    async fn query(
        &self,
        pk: &str,
        sk_prefix: Option<&str>,
    ) -> Result<Vec<StoreItem>, StorageError> {
        self.maybe_fail()?;
        self.inner.query(pk, sk_prefix).await
    }

    async fn update(&self, pk: &str, sk: &str, patch: Value) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.update(pk, sk, patch).await
    }
}
