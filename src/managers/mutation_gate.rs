//! Validated mutation boundary.
//!
//! The consuming store sends every create/update/delete/reparent request
//! through here with its current folder snapshot. Hierarchy invariants are
//! checked synchronously first — a violating mutation is rejected and never
//! forwarded — then the mutation is routed to whichever storage backend the
//! mode reconciler says is authoritative.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::backend::rest::RemoteStore;
use crate::managers::mode_reconciler::{ModeReconciler, ModeReconcilerTrait, StorageMode};
use crate::services::guest_store::{GuestStore, GuestStoreTrait};
use crate::services::hierarchy_engine::FolderSet;
use crate::types::errors::MutationError;
use crate::types::folder::Folder;
use crate::types::link::{Link, Platform};

/// Fields for a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub folder_id: Option<String>,
}

/// Fields for a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
}

/// The validated mutation gateway.
pub struct MutationGate {
    reconciler: Arc<ModeReconciler>,
    guest: Arc<GuestStore>,
    remote: Arc<dyn RemoteStore>,
}

impl MutationGate {
    pub fn new(
        reconciler: Arc<ModeReconciler>,
        guest: Arc<GuestStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        Self {
            reconciler,
            guest,
            remote,
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    async fn forward_folder(&self, folder: &Folder) -> Result<(), MutationError> {
        match self.reconciler.active_mode() {
            StorageMode::Guest => self
                .guest
                .upsert_folder(folder)
                .map_err(|e| MutationError::Storage(e.to_string())),
            StorageMode::Authenticated => self
                .remote
                .upsert_folder(folder)
                .await
                .map_err(|e| MutationError::Remote(e.to_string())),
        }
    }

    async fn forward_link(&self, link: &Link) -> Result<(), MutationError> {
        match self.reconciler.active_mode() {
            StorageMode::Guest => self
                .guest
                .upsert_link(link)
                .map_err(|e| MutationError::Storage(e.to_string())),
            StorageMode::Authenticated => self
                .remote
                .upsert_link(link)
                .await
                .map_err(|e| MutationError::Remote(e.to_string())),
        }
    }

    /// Creates a folder after validating nesting and quota invariants.
    pub async fn create_folder(
        &self,
        new_folder: NewFolder,
        folders: &[Folder],
    ) -> Result<Folder, MutationError> {
        FolderSet::new(folders)
            .validate_new_folder(new_folder.parent_id.as_deref())
            .map_err(MutationError::Invariant)?;

        let now = Self::now();
        let folder = Folder {
            id: Uuid::new_v4().to_string(),
            parent_id: new_folder.parent_id,
            name: new_folder.name,
            color: new_folder.color,
            icon: new_folder.icon,
            is_platform_folder: false,
            created_at: now,
            updated_at: now,
        };
        self.forward_folder(&folder).await?;
        Ok(folder)
    }

    /// Renames or restyles a folder.
    pub async fn update_folder(
        &self,
        folder: &Folder,
        name: Option<&str>,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Folder, MutationError> {
        let mut updated = folder.clone();
        if let Some(name) = name {
            updated.name = name.to_string();
        }
        if let Some(color) = color {
            updated.color = Some(color.to_string());
        }
        if let Some(icon) = icon {
            updated.icon = Some(icon.to_string());
        }
        updated.updated_at = Self::now();
        self.forward_folder(&updated).await?;
        Ok(updated)
    }

    /// Moves a folder under a new parent (`None` = to root), rejecting any
    /// move that would create a cycle, exceed the nesting cap, or overflow
    /// the sub-folder quota.
    pub async fn reparent_folder(
        &self,
        folder: &Folder,
        new_parent_id: Option<&str>,
        folders: &[Folder],
    ) -> Result<Folder, MutationError> {
        FolderSet::new(folders)
            .validate_reparent(&folder.id, new_parent_id)
            .map_err(MutationError::Invariant)?;

        let mut updated = folder.clone();
        updated.parent_id = new_parent_id.map(str::to_string);
        updated.updated_at = Self::now();
        self.forward_folder(&updated).await?;
        Ok(updated)
    }

    /// Deletes a folder. Contents are re-rooted by the storage backend, not
    /// deleted with it.
    pub async fn delete_folder(&self, folder_id: &str) -> Result<(), MutationError> {
        match self.reconciler.active_mode() {
            StorageMode::Guest => self
                .guest
                .remove_folder(folder_id)
                .map_err(|e| MutationError::Storage(e.to_string())),
            StorageMode::Authenticated => self
                .remote
                .delete_folder(folder_id)
                .await
                .map_err(|e| MutationError::Remote(e.to_string())),
        }
    }

    /// Creates a link. The target folder must exist in the caller's snapshot.
    pub async fn create_link(
        &self,
        new_link: NewLink,
        folders: &[Folder],
    ) -> Result<Link, MutationError> {
        if let Some(folder_id) = &new_link.folder_id {
            if FolderSet::new(folders).get(folder_id).is_none() {
                return Err(MutationError::FolderNotFound(folder_id.clone()));
            }
        }

        let now = Self::now();
        let link = Link {
            id: Uuid::new_v4().to_string(),
            platform: Platform::from_url(&new_link.url),
            url: new_link.url,
            title: new_link.title,
            description: new_link.description,
            thumbnail: new_link.thumbnail,
            folder_id: new_link.folder_id,
            is_favorite: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.forward_link(&link).await?;
        Ok(link)
    }

    /// Moves a link into a folder (`None` = out of any folder).
    pub async fn move_link(
        &self,
        link: &Link,
        folder_id: Option<&str>,
        folders: &[Folder],
    ) -> Result<Link, MutationError> {
        if let Some(folder_id) = folder_id {
            if FolderSet::new(folders).get(folder_id).is_none() {
                return Err(MutationError::FolderNotFound(folder_id.to_string()));
            }
        }
        let mut updated = link.clone();
        updated.folder_id = folder_id.map(str::to_string);
        updated.updated_at = Self::now();
        self.forward_link(&updated).await?;
        Ok(updated)
    }

    pub async fn set_favorite(&self, link: &Link, favorite: bool) -> Result<Link, MutationError> {
        let mut updated = link.clone();
        updated.is_favorite = favorite;
        updated.updated_at = Self::now();
        self.forward_link(&updated).await?;
        Ok(updated)
    }

    /// Soft-deletes a link into the trash.
    pub async fn trash_link(&self, link: &Link) -> Result<Link, MutationError> {
        let mut updated = link.clone();
        updated.deleted_at = Some(Self::now());
        updated.updated_at = Self::now();
        self.forward_link(&updated).await?;
        Ok(updated)
    }

    /// Restores a link from the trash.
    pub async fn restore_link(&self, link: &Link) -> Result<Link, MutationError> {
        let mut updated = link.clone();
        updated.deleted_at = None;
        updated.updated_at = Self::now();
        self.forward_link(&updated).await?;
        Ok(updated)
    }

    /// Permanently deletes a link. Explicit — the core never does this on
    /// its own.
    pub async fn delete_link(&self, link_id: &str) -> Result<(), MutationError> {
        match self.reconciler.active_mode() {
            StorageMode::Guest => self
                .guest
                .remove_link(link_id)
                .map_err(|e| MutationError::Storage(e.to_string())),
            StorageMode::Authenticated => self
                .remote
                .delete_link(link_id)
                .await
                .map_err(|e| MutationError::Remote(e.to_string())),
        }
    }
}
