//! Hierarchy invariant engine.
//!
//! Pure, synchronous functions over an in-memory folder set. The backend
//! does not enforce the one-level-nesting or cycle-free invariants, so every
//! mutation touching folder parentage is validated here before it is applied
//! or forwarded anywhere.
//!
//! Nothing in this module panics on a malformed tree: cycles and dangling
//! parents terminate traversal early and surface as flags on the result, so
//! a corrupted local mirror degrades instead of wedging the client.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::errors::HierarchyViolation;
use crate::types::folder::Folder;

/// Hard cap on sub-folders per root folder.
pub const MAX_CHILD_FOLDERS: usize = 10;

/// Result of a descendant traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct DescendantSet {
    /// The folder itself plus every transitive child.
    pub ids: HashSet<String>,
    /// True if the walk revisited a node (corrupted, cyclic graph).
    pub cycle_detected: bool,
}

/// Result of a depth computation. 0 for a root folder, 1 for a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth {
    pub levels: usize,
    pub cycle_detected: bool,
}

/// Result of a root-to-folder path walk.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderPath {
    /// Folder ids from the root down to (and including) the folder.
    pub ids: Vec<String>,
    /// True if the walk stopped early on a cycle or a dangling parent.
    pub truncated: bool,
}

/// An indexed, read-only view over a folder snapshot.
pub struct FolderSet<'a> {
    by_id: HashMap<&'a str, &'a Folder>,
    child_index: HashMap<&'a str, Vec<&'a Folder>>,
}

impl<'a> FolderSet<'a> {
    pub fn new(folders: &'a [Folder]) -> Self {
        let mut by_id = HashMap::with_capacity(folders.len());
        let mut child_index: HashMap<&str, Vec<&Folder>> = HashMap::new();
        for folder in folders {
            by_id.insert(folder.id.as_str(), folder);
        }
        for folder in folders {
            if let Some(parent_id) = folder.parent_id.as_deref() {
                child_index.entry(parent_id).or_default().push(folder);
            }
        }
        Self { by_id, child_index }
    }

    pub fn get(&self, folder_id: &str) -> Option<&'a Folder> {
        self.by_id.get(folder_id).copied()
    }

    /// Folders without a parent, ordered by creation time.
    pub fn root_folders(&self) -> Vec<&'a Folder> {
        let mut roots: Vec<&Folder> = self
            .by_id
            .values()
            .copied()
            .filter(|folder| folder.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        roots
    }

    /// Immediate children of a folder, ordered by creation time.
    pub fn children(&self, parent_id: &str) -> Vec<&'a Folder> {
        let mut kids: Vec<&Folder> = self
            .child_index
            .get(parent_id)
            .map(|kids| kids.to_vec())
            .unwrap_or_default();
        kids.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        kids
    }

    /// The folder itself plus every transitive child.
    ///
    /// Terminates on any input: a revisited node stops the walk down that
    /// branch and sets `cycle_detected` instead of looping forever.
    pub fn descendant_ids(&self, folder_id: &str) -> DescendantSet {
        let mut ids = HashSet::new();
        let mut cycle_detected = false;
        let mut queue: VecDeque<&str> = VecDeque::new();
        ids.insert(folder_id.to_string());
        queue.push_back(folder_id);
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = self.child_index.get(current) {
                for kid in kids {
                    if ids.insert(kid.id.clone()) {
                        queue.push_back(kid.id.as_str());
                    } else {
                        cycle_detected = true;
                    }
                }
            }
        }
        DescendantSet { ids, cycle_detected }
    }

    /// Levels between the folder and its root. A missing folder counts as a
    /// root; a dangling parent reference still counts as one level.
    pub fn depth(&self, folder_id: &str) -> Depth {
        let mut visited = HashSet::new();
        visited.insert(folder_id);
        let mut levels = 0;
        let mut current = self.get(folder_id);
        while let Some(folder) = current {
            let parent_id = match folder.parent_id.as_deref() {
                Some(parent_id) => parent_id,
                None => break,
            };
            if !visited.insert(parent_id) {
                return Depth {
                    levels,
                    cycle_detected: true,
                };
            }
            levels += 1;
            current = self.get(parent_id);
        }
        Depth {
            levels,
            cycle_detected: false,
        }
    }

    /// True only for folders without a parent: nesting is capped at exactly
    /// one level by design.
    pub fn can_have_children(&self, folder_id: &str) -> bool {
        match self.get(folder_id) {
            Some(folder) => folder.parent_id.is_none(),
            // A folder the snapshot doesn't hold is treated as "no parent".
            None => true,
        }
    }

    /// True iff the folder may be a parent and has room under the quota.
    pub fn can_add_child(&self, parent_id: &str) -> bool {
        self.can_have_children(parent_id)
            && self.child_index.get(parent_id).map_or(0, |kids| kids.len()) < MAX_CHILD_FOLDERS
    }

    /// True iff making `proposed_parent_id` the parent of `folder_id` would
    /// make the tree cyclic.
    pub fn would_create_cycle(&self, folder_id: &str, proposed_parent_id: &str) -> bool {
        folder_id == proposed_parent_id
            || self
                .descendant_ids(folder_id)
                .ids
                .contains(proposed_parent_id)
    }

    /// Path from the root down to the folder. Stops and returns a partial
    /// path on a cycle or a dangling parent rather than looping forever.
    pub fn path_from_root(&self, folder_id: &str) -> FolderPath {
        let mut upward = Vec::new();
        let mut visited = HashSet::new();
        let mut truncated = false;
        let mut current_id = folder_id;
        loop {
            if !visited.insert(current_id) {
                truncated = true;
                break;
            }
            upward.push(current_id.to_string());
            match self.get(current_id).and_then(|folder| folder.parent_id.as_deref()) {
                Some(parent_id) => {
                    if self.get(parent_id).is_none() {
                        truncated = true;
                        break;
                    }
                    current_id = parent_id;
                }
                None => break,
            }
        }
        upward.reverse();
        FolderPath {
            ids: upward,
            truncated,
        }
    }

    /// Validates creating a folder under `parent_id`.
    pub fn validate_new_folder(&self, parent_id: Option<&str>) -> Result<(), HierarchyViolation> {
        let parent_id = match parent_id {
            Some(parent_id) => parent_id,
            None => return Ok(()),
        };
        if !self.can_have_children(parent_id) {
            return Err(HierarchyViolation::NestingTooDeep(parent_id.to_string()));
        }
        if !self.can_add_child(parent_id) {
            return Err(HierarchyViolation::ChildQuotaExceeded(parent_id.to_string()));
        }
        Ok(())
    }

    /// Validates moving `folder_id` under `new_parent_id` (`None` = to root).
    pub fn validate_reparent(
        &self,
        folder_id: &str,
        new_parent_id: Option<&str>,
    ) -> Result<(), HierarchyViolation> {
        let new_parent_id = match new_parent_id {
            Some(parent_id) => parent_id,
            // Moving to root is always structurally sound.
            None => return Ok(()),
        };
        let current_parent = self.get(folder_id).and_then(|f| f.parent_id.as_deref());
        if current_parent == Some(new_parent_id) {
            // No-op move; nothing to validate.
            return Ok(());
        }
        if self.would_create_cycle(folder_id, new_parent_id) {
            return Err(HierarchyViolation::CycleDetected(folder_id.to_string()));
        }
        if !self.can_have_children(new_parent_id) {
            return Err(HierarchyViolation::NestingTooDeep(new_parent_id.to_string()));
        }
        if !self.can_add_child(new_parent_id) {
            return Err(HierarchyViolation::ChildQuotaExceeded(
                new_parent_id.to_string(),
            ));
        }
        // The moved folder must be a leaf, or its own children would land
        // two levels deep.
        if self.descendant_ids(folder_id).ids.len() > 1 {
            return Err(HierarchyViolation::NestingTooDeep(folder_id.to_string()));
        }
        Ok(())
    }
}
