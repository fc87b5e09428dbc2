use tokio::sync::watch;

use ik_core::InventoryItem;

use crate::InventoryRepository;

/// Observable inventory state for the list, add, details, and edit screens.
///
/// Every mutation refetches the whole collection; nothing is applied optimistically.
pub struct InventoryViewModel {
    repository: InventoryRepository,
    items: watch::Sender<Vec<InventoryItem>>,
    loading: watch::Sender<bool>,
}

/// Clears the loading flag when dropped, including on panic.
struct LoadingGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

impl InventoryViewModel {
    pub fn new(repository: InventoryRepository) -> Self {
        let (items, _) = watch::channel(Vec::new());
        let (loading, _) = watch::channel(false);
        Self {
            repository,
            items,
            loading,
        }
    }

    /// Subscribe to the published item list.
    pub fn items(&self) -> watch::Receiver<Vec<InventoryItem>> {
        self.items.subscribe()
    }

    /// Subscribe to the loading flag.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Snapshot of the last published list.
    pub fn current_items(&self) -> Vec<InventoryItem> {
        self.items.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn backend(&self) -> &'static str {
        self.repository.backend()
    }

    fn begin(&self) -> LoadingGuard<'_> {
        self.loading.send_replace(true);
        LoadingGuard {
            flag: &self.loading,
        }
    }

    async fn publish(&self) {
        let items = self.repository.list().await;
        self.items.send_replace(items);
    }

    /// Save a new item; the list is republished only on success.
    pub async fn save(&self, item: InventoryItem) -> bool {
        let _guard = self.begin();
        let saved = self.repository.save(&item).await;
        if saved {
            self.publish().await;
        }
        saved
    }

    /// Fetch and publish the full list.
    pub async fn load(&self) {
        let _guard = self.begin();
        self.publish().await;
    }

    pub async fn update(&self, item: InventoryItem) -> bool {
        let _guard = self.begin();
        let updated = self.repository.update(&item).await;
        self.publish().await;
        updated
    }

    pub async fn delete(&self, item: InventoryItem) -> bool {
        let _guard = self.begin();
        let deleted = self.repository.delete(&item).await;
        self.publish().await;
        deleted
    }

    /// Fetch one item without touching the published list.
    pub async fn get_by_id(&self, key: i64) -> Option<InventoryItem> {
        let _guard = self.begin();
        self.repository.get_by_id(key).await
    }

    /// Value of one product line.
    pub fn product_total(price: u64, quantity: u32) -> u128 {
        u128::from(price) * u128::from(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::repository::tests::{sqlite_repository, BrokenStore};

    fn item(code: u32, name: &str) -> InventoryItem {
        InventoryItem::new(code, name, 20, 5).unwrap()
    }

    #[tokio::test]
    async fn save_publishes_refetched_list() {
        let vm = InventoryViewModel::new(sqlite_repository());
        let mut items = vm.items();
        assert!(vm.save(item(200, "New Item")).await);
        assert!(items.has_changed().unwrap());
        let published = items.borrow_and_update().clone();
        assert_eq!(published.len(), 1);
        assert!(published[0].id.is_some());
        assert!(!vm.is_loading());
    }

    #[tokio::test]
    async fn duplicate_save_keeps_published_list() {
        let vm = InventoryViewModel::new(sqlite_repository());
        assert!(vm.save(item(200, "New Item")).await);
        assert!(!vm.save(item(200, "Again")).await);
        let current = vm.current_items();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "New Item");
    }

    #[tokio::test]
    async fn update_and_delete_refetch() {
        let vm = InventoryViewModel::new(sqlite_repository());
        vm.save(item(1, "Bolt")).await;
        let mut saved = vm.current_items().remove(0);
        saved.name = "Nut".into();
        assert!(vm.update(saved.clone()).await);
        assert_eq!(vm.current_items()[0].name, "Nut");
        assert_eq!(vm.get_by_id(saved.key()).await.unwrap().name, "Nut");

        assert!(vm.delete(saved.clone()).await);
        assert!(vm.current_items().is_empty());
        assert!(vm.get_by_id(saved.key()).await.is_none());
    }

    #[tokio::test]
    async fn loading_is_cleared_after_failures() {
        let vm = InventoryViewModel::new(InventoryRepository::new(Arc::new(BrokenStore)));
        assert!(!vm.save(item(1, "x")).await);
        assert!(!vm.is_loading());
        vm.load().await;
        assert!(!vm.is_loading());
        assert!(vm.current_items().is_empty());
        assert!(!vm.update(item(1, "x")).await);
        assert!(!vm.is_loading());
        assert!(!vm.delete(item(1, "x")).await);
        assert!(!vm.is_loading());
        assert_eq!(vm.get_by_id(1).await, None);
        assert!(!vm.is_loading());
    }

    #[test]
    fn product_total_multiplies() {
        assert_eq!(InventoryViewModel::product_total(20, 5), 100);
        assert_eq!(
            InventoryViewModel::product_total(u64::MAX, 2),
            u128::from(u64::MAX) * 2
        );
    }
}
