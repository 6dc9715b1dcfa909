//! Local mirror of remote data.
//!
//! Subscription callbacks feed normalized change events in here; the mirror
//! applies them idempotently (upsert/remove keyed by row id), so a replayed
//! or duplicated event can never corrupt or duplicate local state. Malformed
//! payloads are reported to the caller, never fatal.

use std::collections::HashMap;

use crate::types::events::{ChangeEvent, ChangeEventType};
use crate::types::folder::Folder;
use crate::types::link::Link;

/// In-memory mirror of the authenticated user's folders and links.
#[derive(Default)]
pub struct Mirror {
    folders: HashMap<String, Folder>,
    links: HashMap<String, Link>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the folder set wholesale, e.g. from an initial fetch.
    pub fn replace_folders(&mut self, folders: Vec<Folder>) {
        self.folders = folders
            .into_iter()
            .map(|folder| (folder.id.clone(), folder))
            .collect();
    }

    /// Replaces the link set wholesale, e.g. from an initial fetch.
    pub fn replace_links(&mut self, links: Vec<Link>) {
        self.links = links.into_iter().map(|link| (link.id.clone(), link)).collect();
    }

    /// Applies a folder change event. Returns `false` when the payload is
    /// malformed and the event was skipped.
    pub fn apply_folder_event(&mut self, event: &ChangeEvent) -> bool {
        match event.event_type {
            ChangeEventType::Insert | ChangeEventType::Update => {
                let row = match &event.after {
                    Some(row) => row.clone(),
                    None => return false,
                };
                match serde_json::from_value::<Folder>(row) {
                    Ok(folder) => {
                        self.folders.insert(folder.id.clone(), folder);
                        true
                    }
                    Err(_) => false,
                }
            }
            ChangeEventType::Delete => match row_id(event) {
                Some(id) => {
                    self.folders.remove(&id);
                    true
                }
                None => false,
            },
        }
    }

    /// Applies a link change event. Returns `false` when the payload is
    /// malformed and the event was skipped.
    pub fn apply_link_event(&mut self, event: &ChangeEvent) -> bool {
        match event.event_type {
            ChangeEventType::Insert | ChangeEventType::Update => {
                let row = match &event.after {
                    Some(row) => row.clone(),
                    None => return false,
                };
                match serde_json::from_value::<Link>(row) {
                    Ok(link) => {
                        self.links.insert(link.id.clone(), link);
                        true
                    }
                    Err(_) => false,
                }
            }
            ChangeEventType::Delete => match row_id(event) {
                Some(id) => {
                    self.links.remove(&id);
                    true
                }
                None => false,
            },
        }
    }

    pub fn folder(&self, folder_id: &str) -> Option<&Folder> {
        self.folders.get(folder_id)
    }

    pub fn link(&self, link_id: &str) -> Option<&Link> {
        self.links.get(link_id)
    }

    /// All folders, ordered by creation time for stable presentation.
    pub fn folders(&self) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self.folders.values().cloned().collect();
        folders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        folders
    }

    /// All links, ordered by creation time.
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self.links.values().cloned().collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        links
    }

    /// Links not in the trash.
    pub fn active_links(&self) -> Vec<Link> {
        self.links().into_iter().filter(|l| !l.is_trashed()).collect()
    }

    /// Soft-deleted links.
    pub fn trashed_links(&self) -> Vec<Link> {
        self.links().into_iter().filter(|l| l.is_trashed()).collect()
    }

    /// Favorite links not in the trash.
    pub fn favorite_links(&self) -> Vec<Link> {
        self.active_links()
            .into_iter()
            .filter(|l| l.is_favorite)
            .collect()
    }

    pub fn clear(&mut self) {
        self.folders.clear();
        self.links.clear();
    }
}

/// Extracts the row id from whichever image the event carries.
fn row_id(event: &ChangeEvent) -> Option<String> {
    event
        .before
        .as_ref()
        .or(event.after.as_ref())
        .and_then(|row| row.get("id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
}
