use std::sync::Arc;

use ik_core::{CoreError, CoreResult, InventoryItem, InventoryStore};
use ik_store::SharedStore;

/// Uniform async contract over whichever backend is wired in.
///
/// Backend failures never cross this boundary: they are logged and collapsed
/// into `false`, an empty list, or `None`.
#[derive(Clone)]
pub struct InventoryRepository {
    store: SharedStore,
}

impl InventoryRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Name of the active backend.
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    async fn run<T, F>(&self, op: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&(dyn InventoryStore + Send + Sync)) -> CoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| CoreError::Storage(err.to_string()))?
    }

    /// Insert an item. False when the code already exists or the backend fails.
    pub async fn save(&self, item: &InventoryItem) -> bool {
        let item = item.clone();
        let code = item.code;
        match self.run(move |store| store.insert(&item)).await {
            Ok(saved) => {
                tracing::debug!(code, id = ?saved.id, "item saved");
                true
            }
            Err(CoreError::Duplicate(what)) => {
                tracing::warn!(code, %what, "item code already exists");
                false
            }
            Err(err) => {
                tracing::warn!(code, error = %err, "save failed");
                false
            }
        }
    }

    /// Full collection; empty on error.
    pub async fn list(&self) -> Vec<InventoryItem> {
        self.run(|store| store.list()).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "list failed");
            Vec::new()
        })
    }

    /// Best-effort rewrite of an item.
    pub async fn update(&self, item: &InventoryItem) -> bool {
        let item = item.clone();
        let code = item.code;
        match self.run(move |store| store.update(&item)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(code, error = %err, "update failed");
                false
            }
        }
    }

    /// Best-effort removal of an item.
    pub async fn delete(&self, item: &InventoryItem) -> bool {
        let item = item.clone();
        let code = item.code;
        match self.run(move |store| store.delete(&item)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(code, error = %err, "delete failed");
                false
            }
        }
    }

    /// Lookup by key; `None` both when missing and on error.
    pub async fn get_by_id(&self, key: i64) -> Option<InventoryItem> {
        self.run(move |store| store.get(key)).await.unwrap_or_else(|err| {
            tracing::warn!(key, error = %err, "lookup failed");
            None
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ik_store::SqliteStore;

    /// Backend that fails every call.
    pub(crate) struct BrokenStore;

    impl InventoryStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn list(&self) -> CoreResult<Vec<InventoryItem>> {
            Err(CoreError::Storage("offline".into()))
        }
        fn get(&self, _key: i64) -> CoreResult<Option<InventoryItem>> {
            Err(CoreError::Storage("offline".into()))
        }
        fn insert(&self, _item: &InventoryItem) -> CoreResult<InventoryItem> {
            Err(CoreError::Storage("offline".into()))
        }
        fn update(&self, _item: &InventoryItem) -> CoreResult<()> {
            Err(CoreError::Storage("offline".into()))
        }
        fn delete(&self, _item: &InventoryItem) -> CoreResult<()> {
            Err(CoreError::Storage("offline".into()))
        }
    }

    pub(crate) fn sqlite_repository() -> InventoryRepository {
        InventoryRepository::new(Arc::new(SqliteStore::open_in_memory().expect("store")))
    }

    fn new_item() -> InventoryItem {
        InventoryItem::new(200, "New Item", 20, 5).unwrap()
    }

    #[tokio::test]
    async fn save_on_empty_store_lists_one_item() {
        let repo = sqlite_repository();
        assert!(repo.save(&new_item()).await);
        let items = repo.list().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code, 200);
        assert_eq!(items[0].name, "New Item");
    }

    #[tokio::test]
    async fn second_save_of_same_code_fails() {
        let repo = sqlite_repository();
        assert!(repo.save(&new_item()).await);
        assert!(!repo.save(&new_item()).await);
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_from_list_and_lookup() {
        let repo = sqlite_repository();
        repo.save(&new_item()).await;
        let saved = repo.list().await.remove(0);
        assert!(repo.get_by_id(saved.key()).await.is_some());
        assert!(repo.delete(&saved).await);
        assert!(repo.list().await.is_empty());
        assert!(repo.get_by_id(saved.key()).await.is_none());
    }

    #[tokio::test]
    async fn backend_failures_are_collapsed() {
        let repo = InventoryRepository::new(Arc::new(BrokenStore));
        assert!(!repo.save(&new_item()).await);
        assert!(repo.list().await.is_empty());
        assert!(!repo.update(&new_item()).await);
        assert!(!repo.delete(&new_item()).await);
        assert!(repo.get_by_id(1).await.is_none());
    }
}
