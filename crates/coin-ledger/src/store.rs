//! Entitlement Store
//!
//! Key-value store of user entitlement records with atomic, idempotent
//! per-key updates. All mutation goes through `atomic_update`; nothing else
//! may read-modify-write the backing persistence.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::entitlement::UserEntitlement;
use crate::error::{LedgerError, Result};

/// Pure state transition run under the store's per-key lock
pub type UpdateFn = Box<dyn FnOnce(UserEntitlement) -> UserEntitlement + Send>;

/// Entitlement storage trait
///
/// `atomic_update` guarantees:
///
/// - concurrent calls for the same `user_key` are linearized, never
///   interleaved; distinct keys proceed independently
/// - if the stored record already carries `event_id` as its
///   `last_event_id`, the update function is not invoked and the existing
///   record is returned unchanged (provider retry-delivery protection)
/// - once the call returns `Ok`, the new state survives process restart
/// - an unknown `user_key` is materialized as a zero-value record before
///   the update function runs
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Fetch a record, if one exists
    async fn get(&self, user_key: &str) -> Result<Option<UserEntitlement>>;

    /// Apply `apply` to the record under the key's lock, skipping
    /// already-applied events
    async fn atomic_update(
        &self,
        user_key: &str,
        event_id: &str,
        apply: UpdateFn,
    ) -> Result<UserEntitlement>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory entitlement store (for development and tests)
///
/// A single map lock linearizes every update; good enough where nothing
/// survives restart anyway.
pub struct MemoryEntitlementStore {
    records: Mutex<HashMap<String, UserEntitlement>>,
}

impl Default for MemoryEntitlementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn get(&self, user_key: &str) -> Result<Option<UserEntitlement>> {
        let records = self.records.lock().await;
        Ok(records.get(user_key).cloned())
    }

    async fn atomic_update(
        &self,
        user_key: &str,
        event_id: &str,
        apply: UpdateFn,
    ) -> Result<UserEntitlement> {
        let mut records = self.records.lock().await;

        let record = records
            .get(user_key)
            .cloned()
            .unwrap_or_else(|| UserEntitlement::new(user_key));

        if !event_id.is_empty() && record.last_event_id == event_id {
            tracing::debug!(user_key, event_id, "event already applied, skipping");
            return Ok(record);
        }

        let updated = apply(record);
        records.insert(user_key.to_string(), updated.clone());
        Ok(updated)
    }
}

// ============================================================================
// Durable JSON file store
// ============================================================================

/// Durable entitlement store over a single JSON file
///
/// The file maps `user_key` to its record. Records are held as raw JSON
/// values and decoded per key, so one corrupt record fails only its own
/// key. Each key gets its own update lock; the file itself is rewritten to
/// a temp path and renamed into place, serialized by a separate write lock.
#[derive(Debug)]
pub struct JsonEntitlementStore {
    path: PathBuf,
    records: RwLock<HashMap<String, Value>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    write_lock: Mutex<()>,
}

impl JsonEntitlementStore {
    /// Open (or create) the store at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<HashMap<String, Value>>(&bytes)
                .map_err(|e| LedgerError::CorruptStore(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(LedgerError::StoreUnavailable(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            "opened entitlement store"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
            key_locks: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        })
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(user_key: &str, value: &Value) -> Result<UserEntitlement> {
        serde_json::from_value(value.clone()).map_err(|e| LedgerError::CorruptRecord {
            user_key: user_key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn key_lock(&self, user_key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(user_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Rewrite the backing file from the current map
    ///
    /// The snapshot is taken under the write lock, so any in-memory update
    /// that happened-before this call is included in the written file.
    async fn persist(&self) -> Result<()> {
        let _write = self.write_lock.lock().await;

        let snapshot = {
            let records = self.records.read().await;
            serde_json::to_vec_pretty(&*records)
                .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &snapshot)
            .await
            .map_err(|e| LedgerError::StoreUnavailable(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| LedgerError::StoreUnavailable(format!("{}: {e}", self.path.display())))?;

        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for JsonEntitlementStore {
    async fn get(&self, user_key: &str) -> Result<Option<UserEntitlement>> {
        let records = self.records.read().await;
        records
            .get(user_key)
            .map(|value| Self::decode(user_key, value))
            .transpose()
    }

    async fn atomic_update(
        &self,
        user_key: &str,
        event_id: &str,
        apply: UpdateFn,
    ) -> Result<UserEntitlement> {
        let lock = self.key_lock(user_key).await;
        let _guard = lock.lock().await;

        let previous = {
            let records = self.records.read().await;
            records.get(user_key).cloned()
        };

        let record = match &previous {
            Some(value) => Self::decode(user_key, value)?,
            None => UserEntitlement::new(user_key),
        };

        if !event_id.is_empty() && record.last_event_id == event_id {
            tracing::debug!(user_key, event_id, "event already applied, skipping");
            return Ok(record);
        }

        let updated = apply(record);
        let encoded = serde_json::to_value(&updated)
            .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;

        {
            let mut records = self.records.write().await;
            records.insert(user_key.to_string(), encoded);
        }

        // Success must imply durability; roll the map back if the file
        // write fails so a redelivered event is not skipped as applied.
        if let Err(e) = self.persist().await {
            let mut records = self.records.write().await;
            match previous {
                Some(value) => records.insert(user_key.to_string(), value),
                None => records.remove(user_key),
            };
            return Err(e);
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::Plan;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir().join(format!("coin-ledger-test-{}.json", uuid::Uuid::new_v4()))
    }

    fn credit(delta: u64, event_id: &str) -> UpdateFn {
        let event_id = event_id.to_string();
        Box::new(move |mut record| {
            record.coins += delta;
            record.paid = true;
            record.last_event_id = event_id;
            record
        })
    }

    #[tokio::test]
    async fn test_memory_bootstrap_unknown_key() {
        let store = MemoryEntitlementStore::new();
        let record = store
            .atomic_update("u1", "evt_1", credit(150, "evt_1"))
            .await
            .unwrap();

        assert_eq!(record.coins, 150);
        assert!(record.paid);
        assert_eq!(record.last_event_id, "evt_1");
    }

    #[tokio::test]
    async fn test_memory_idempotent_replay() {
        let store = MemoryEntitlementStore::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let counter = invocations.clone();
            store
                .atomic_update(
                    "u1",
                    "evt_1",
                    Box::new(move |mut record| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        record.coins += 150;
                        record.last_event_id = "evt_1".into();
                        record
                    }),
                )
                .await
                .unwrap();
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("u1").await.unwrap().unwrap().coins, 150);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_concurrent_distinct_events() {
        let store = Arc::new(MemoryEntitlementStore::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let event_id = format!("evt_{i}");
                store
                    .atomic_update("u1", &event_id, credit(5, &event_id))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("u1").await.unwrap().unwrap().coins, 40);
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let path = temp_store_path();

        {
            let store = JsonEntitlementStore::open(&path).await.unwrap();
            store
                .atomic_update("u1", "evt_1", credit(150, "evt_1"))
                .await
                .unwrap();
        }

        let store = JsonEntitlementStore::open(&path).await.unwrap();
        let record = store.get("u1").await.unwrap().unwrap();
        assert_eq!(record.coins, 150);
        assert_eq!(record.last_event_id, "evt_1");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_json_store_idempotent_replay() {
        let path = temp_store_path();
        let store = JsonEntitlementStore::open(&path).await.unwrap();

        store
            .atomic_update("u1", "evt_1", credit(150, "evt_1"))
            .await
            .unwrap();
        let replayed = store
            .atomic_update("u1", "evt_1", credit(150, "evt_1"))
            .await
            .unwrap();

        assert_eq!(replayed.coins, 150);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_json_store_concurrent_distinct_events() {
        let path = temp_store_path();
        let store = Arc::new(JsonEntitlementStore::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let event_id = format!("evt_{i}");
                store
                    .atomic_update("u1", &event_id, credit(5, &event_id))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("u1").await.unwrap().unwrap().coins, 40);

        // Reopen and confirm the final balance hit the disk too.
        drop(store);
        let reopened = JsonEntitlementStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("u1").await.unwrap().unwrap().coins, 40);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_corrupt_record_fails_only_its_key() {
        let path = temp_store_path();

        let mut good = UserEntitlement::new("good");
        good.coins = 10;
        good.plan = Plan::Pro;
        let file = serde_json::json!({
            "good": serde_json::to_value(&good).unwrap(),
            "bad": 42,
        });
        std::fs::write(&path, serde_json::to_vec_pretty(&file).unwrap()).unwrap();

        let store = JsonEntitlementStore::open(&path).await.unwrap();

        let record = store.get("good").await.unwrap().unwrap();
        assert_eq!(record.coins, 10);

        match store.get("bad").await {
            Err(LedgerError::CorruptRecord { user_key, .. }) => assert_eq!(user_key, "bad"),
            other => panic!("expected CorruptRecord, got {other:?}"),
        }

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unparseable_store_file_fails_open() {
        let path = temp_store_path();
        std::fs::write(&path, b"not json at all").unwrap();

        match JsonEntitlementStore::open(&path).await {
            Err(LedgerError::CorruptStore(_)) => {}
            other => panic!("expected CorruptStore, got {other:?}"),
        }

        let _ = std::fs::remove_file(&path);
    }
}
