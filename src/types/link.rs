use serde::{Deserialize, Serialize};

/// The platform a saved link points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Twitter,
    Reddit,
    Pinterest,
    Linkedin,
    Facebook,
    #[default]
    Web,
}

impl Platform {
    /// Classifies a URL by its host. Anything unrecognized is `Web`.
    pub fn from_url(url: &str) -> Self {
        let rest = url.split("://").nth(1).unwrap_or(url);
        let host = rest.split('/').next().unwrap_or(rest).to_ascii_lowercase();
        if host.contains("youtube.") || host.contains("youtu.be") {
            Platform::Youtube
        } else if host.contains("instagram.") {
            Platform::Instagram
        } else if host.contains("tiktok.") {
            Platform::Tiktok
        } else if host.contains("twitter.") || host == "x.com" || host.ends_with(".x.com") {
            Platform::Twitter
        } else if host.contains("reddit.") {
            Platform::Reddit
        } else if host.contains("pinterest.") {
            Platform::Pinterest
        } else if host.contains("linkedin.") {
            Platform::Linkedin
        } else if host.contains("facebook.") || host.contains("fb.watch") {
            Platform::Facebook
        } else {
            Platform::Web
        }
    }
}

/// A saved link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub platform: Platform,
    pub folder_id: Option<String>,
    pub is_favorite: bool,
    /// Soft-delete timestamp; a non-null value means the link is in the trash.
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Link {
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}
