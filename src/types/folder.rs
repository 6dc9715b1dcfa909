use serde::{Deserialize, Serialize};

/// A folder links are organized into.
///
/// Nesting is capped at one level: a folder with a non-null `parent_id`
/// may never itself become a parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// System-seeded folders (e.g. the default per-platform folders) as
    /// opposed to user-created ones.
    pub is_platform_folder: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Folder {
    /// True for folders without a parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
