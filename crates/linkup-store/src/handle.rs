//! Async access to a data store.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::sqlite::SqliteDataStore;
use crate::store::DataStore;

/// Shared, thread-safe handle to a boxed `DataStore`.
///
/// Store calls are synchronous; `run` moves them onto the blocking pool so
/// the async state layer never blocks the runtime.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Mutex<Box<dyn DataStore>>>,
}

impl StoreHandle {
    pub fn new(store: impl DataStore + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// Open the SQLite store at `path`.
    pub fn sqlite(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let store = SqliteDataStore::open(path)?;
        Ok(Self::new(store))
    }

    /// Run `f` against the store on a blocking thread.
    pub async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn DataStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let store = inner.lock();
            f(&**store)
        })
        .await
        .map_err(|e| StoreError::storage(format!("store task failed: {}", e)))?
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use linkup_calendar::User;

    fn create_handle() -> StoreHandle {
        let store = SqliteDataStore::in_memory().expect("Failed to create in-memory store");
        StoreHandle::new(store)
    }

    #[tokio::test]
    async fn test_run_reads_and_writes() {
        let handle = create_handle();

        let user = User {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            username: None,
            avatar_url: None,
            created_at: None,
        };
        handle.run(move |s| s.insert_profile(&user)).await.unwrap();

        let found = handle.run(|s| s.get_profile("u1")).await.unwrap();
        assert_eq!(found.unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_run_propagates_store_errors() {
        let handle = create_handle();
        let result = handle.run(|s| s.delete_event("missing")).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let handle = create_handle();
        let clone = handle.clone();

        clone
            .run(|s| s.insert_friend_request("u1", "u2"))
            .await
            .unwrap();
        let friends = handle.run(|s| s.list_friendships("u2")).await.unwrap();
        assert_eq!(friends.len(), 1);
    }
}
