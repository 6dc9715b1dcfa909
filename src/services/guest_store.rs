//! Guest-mode storage.
//!
//! Free/guest users have no backend session; their folders and links live
//! only in local persistent storage as JSON arrays. Nothing here is ever
//! cleared by a mode transition — signing in deactivates guest mode but the
//! data stays addressable for when the user returns to it.

use std::sync::Arc;

use crate::backend::local::LocalStore;
use crate::types::errors::StorageError;
use crate::types::folder::Folder;
use crate::types::link::Link;

const GUEST_FOLDERS_KEY: &str = "guest.folders";
const GUEST_LINKS_KEY: &str = "guest.links";

/// Trait defining guest-mode storage operations.
pub trait GuestStoreTrait {
    fn folders(&self) -> Result<Vec<Folder>, StorageError>;
    fn links(&self) -> Result<Vec<Link>, StorageError>;
    fn link(&self, link_id: &str) -> Result<Option<Link>, StorageError>;
    fn upsert_folder(&self, folder: &Folder) -> Result<(), StorageError>;
    fn remove_folder(&self, folder_id: &str) -> Result<(), StorageError>;
    fn upsert_link(&self, link: &Link) -> Result<(), StorageError>;
    fn remove_link(&self, link_id: &str) -> Result<(), StorageError>;
}

/// Guest store over the local key-value boundary.
pub struct GuestStore {
    store: Arc<dyn LocalStore>,
}

impl GuestStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    fn load<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
        match self.store.get(key)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| StorageError::Serialization(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    fn save<T: serde::Serialize>(&self, key: &str, items: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(key, &raw)
    }
}

impl GuestStoreTrait for GuestStore {
    fn folders(&self) -> Result<Vec<Folder>, StorageError> {
        self.load(GUEST_FOLDERS_KEY)
    }

    fn links(&self) -> Result<Vec<Link>, StorageError> {
        self.load(GUEST_LINKS_KEY)
    }

    fn link(&self, link_id: &str) -> Result<Option<Link>, StorageError> {
        Ok(self.links()?.into_iter().find(|link| link.id == link_id))
    }

    /// Inserts or replaces a folder by id.
    fn upsert_folder(&self, folder: &Folder) -> Result<(), StorageError> {
        let mut folders = self.folders()?;
        match folders.iter_mut().find(|f| f.id == folder.id) {
            Some(existing) => *existing = folder.clone(),
            None => folders.push(folder.clone()),
        }
        self.save(GUEST_FOLDERS_KEY, &folders)
    }

    /// Removes a folder. Its sub-folders and links move to the root rather
    /// than being deleted with it.
    fn remove_folder(&self, folder_id: &str) -> Result<(), StorageError> {
        let mut folders = self.folders()?;
        folders.retain(|folder| folder.id != folder_id);
        for folder in folders.iter_mut() {
            if folder.parent_id.as_deref() == Some(folder_id) {
                folder.parent_id = None;
            }
        }
        self.save(GUEST_FOLDERS_KEY, &folders)?;

        let mut links = self.links()?;
        let mut orphaned = false;
        for link in links.iter_mut() {
            if link.folder_id.as_deref() == Some(folder_id) {
                link.folder_id = None;
                orphaned = true;
            }
        }
        if orphaned {
            self.save(GUEST_LINKS_KEY, &links)?;
        }
        Ok(())
    }

    /// Inserts or replaces a link by id.
    fn upsert_link(&self, link: &Link) -> Result<(), StorageError> {
        let mut links = self.links()?;
        match links.iter_mut().find(|l| l.id == link.id) {
            Some(existing) => *existing = link.clone(),
            None => links.push(link.clone()),
        }
        self.save(GUEST_LINKS_KEY, &links)
    }

    fn remove_link(&self, link_id: &str) -> Result<(), StorageError> {
        let mut links = self.links()?;
        links.retain(|link| link.id != link_id);
        self.save(GUEST_LINKS_KEY, &links)
    }
}
