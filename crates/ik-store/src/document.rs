//! Document-collection inventory store: one document per item, keyed by code.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use ik_core::{CoreError, CoreResult, InventoryItem, InventoryStore};

/// Name of the inventory collection.
pub const COLLECTION: &str = "inventory";

/// Stored document shape. Identifiers are not persisted; the code is the key.
#[derive(Debug, Deserialize, Serialize)]
struct ItemDocument {
    code: u32,
    name: String,
    price: u64,
    quantity: u32,
}

impl From<&InventoryItem> for ItemDocument {
    fn from(item: &InventoryItem) -> Self {
        Self {
            code: item.code,
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
        }
    }
}

impl From<ItemDocument> for InventoryItem {
    fn from(doc: ItemDocument) -> Self {
        Self {
            id: None,
            code: doc.code,
            name: doc.name,
            price: doc.price,
            quantity: doc.quantity,
        }
    }
}

/// Document collection rooted at `<collections>/inventory`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a store over the collections directory.
    pub fn new(collections_root: PathBuf) -> Self {
        Self {
            root: collections_root.join(COLLECTION),
        }
    }

    fn document_path(&self, code: u32) -> PathBuf {
        self.root.join(format!("{code}.yaml"))
    }

    fn read_document(&self, code: u32) -> CoreResult<Option<InventoryItem>> {
        let doc: Option<ItemDocument> = ik_utils::read_yaml(&self.document_path(code))
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(doc.map(InventoryItem::from))
    }
}

impl InventoryStore for DocumentStore {
    fn name(&self) -> &'static str {
        "document"
    }

    fn list(&self) -> CoreResult<Vec<InventoryItem>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for entry in WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            let doc: Option<ItemDocument> = ik_utils::read_yaml(entry.path())
                .map_err(|err| CoreError::Storage(err.to_string()))?;
            if let Some(doc) = doc {
                items.push(InventoryItem::from(doc));
            }
        }
        items.sort_by_key(|item| item.code);
        Ok(items)
    }

    fn get(&self, key: i64) -> CoreResult<Option<InventoryItem>> {
        let Ok(code) = u32::try_from(key) else {
            return Ok(None);
        };
        self.read_document(code)
    }

    fn insert(&self, item: &InventoryItem) -> CoreResult<InventoryItem> {
        fs::create_dir_all(&self.root).map_err(|err| CoreError::Storage(err.to_string()))?;
        let content = serde_yaml::to_string(&ItemDocument::from(item))
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        let mut staged =
            NamedTempFile::new_in(&self.root).map_err(|err| CoreError::Storage(err.to_string()))?;
        staged
            .write_all(content.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|err| CoreError::Storage(err.to_string()))?;

        let path = self.document_path(item.code);
        let staged = match staged.persist_noclobber(&path) {
            Ok(_) => None,
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Some(err.file),
            Err(err) => return Err(CoreError::Storage(err.error.to_string())),
        };
        if let Some(staged) = staged {
            if self.read_document(item.code)?.is_some() {
                return Err(CoreError::Duplicate(format!("item code {}", item.code)));
            }
            tracing::warn!(code = item.code, "replacing empty document");
            fs::remove_file(&path).map_err(|err| CoreError::Storage(err.to_string()))?;
            staged.persist_noclobber(&path).map_err(|err| match err.error.kind() {
                ErrorKind::AlreadyExists => CoreError::Duplicate(format!("item code {}", item.code)),
                _ => CoreError::Storage(err.error.to_string()),
            })?;
        }
        tracing::debug!(code = item.code, "created document");
        Ok(InventoryItem {
            id: None,
            ..item.clone()
        })
    }

    fn update(&self, item: &InventoryItem) -> CoreResult<()> {
        let path = self.document_path(item.code);
        if !path.exists() {
            return Err(CoreError::NotFound(format!("item code {}", item.code)));
        }
        ik_utils::write_yaml(&path, &ItemDocument::from(item))
            .map_err(|err| CoreError::Storage(err.to_string()))
    }

    fn delete(&self, item: &InventoryItem) -> CoreResult<()> {
        let path = self.document_path(item.code);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(path).map_err(|err| CoreError::Storage(err.to_string()))?;
        tracing::debug!(code = item.code, "removed document");
        Ok(())
    }
}
