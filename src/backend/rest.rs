//! Remote row store boundary.
//!
//! Mutations that the gate validates in authenticated mode are forwarded
//! here. [`HttpRemoteStore`] speaks PostgREST conventions: rows live under
//! `/rest/v1/<table>`, filters use `col=eq.val` query pairs, and upserts
//! are POSTs with a merge-duplicates preference.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::auth::ACCESS_TOKEN_KEY;
use super::local::LocalStore;
use super::BoxFuture;
use crate::types::errors::RemoteError;
use crate::types::folder::Folder;
use crate::types::link::Link;

pub const FOLDERS_TABLE: &str = "folders";
pub const LINKS_TABLE: &str = "links";

/// Async remote row store for folders and links.
pub trait RemoteStore: Send + Sync {
    fn fetch_folders(&self) -> BoxFuture<'_, Result<Vec<Folder>, RemoteError>>;
    fn fetch_links(&self) -> BoxFuture<'_, Result<Vec<Link>, RemoteError>>;
    fn upsert_folder<'a>(&'a self, folder: &'a Folder) -> BoxFuture<'a, Result<(), RemoteError>>;
    fn delete_folder<'a>(&'a self, folder_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>>;
    fn upsert_link<'a>(&'a self, link: &'a Link) -> BoxFuture<'a, Result<(), RemoteError>>;
    fn delete_link<'a>(&'a self, link_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>>;
}

// === HttpRemoteStore ===

/// Remote row store over HTTP.
pub struct HttpRemoteStore {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
    store: Arc<dyn LocalStore>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, anon_key: &str, store: Arc<dyn LocalStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: reqwest::Client::new(),
            store,
        }
    }

    fn rest_base(&self) -> String {
        format!("{}/rest/v1", self.base_url)
    }

    fn access_token(&self) -> Result<String, RemoteError> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(RemoteError::Unauthorized),
            Err(err) => Err(RemoteError::Api(err.to_string())),
        }
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), RemoteError> {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !status.is_success() {
            return Err(RemoteError::Api(format!("HTTP {}", status)));
        }
        Ok(())
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, RemoteError> {
        let token = self.access_token()?;
        let res = self
            .client
            .get(format!("{}/{}", self.rest_base(), table))
            .query(&[("select", "*")])
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Self::check_status(res.status())?;
        res.json()
            .await
            .map_err(|e| RemoteError::Api(e.to_string()))
    }

    async fn upsert_row<T: Serialize>(&self, table: &str, row: &T) -> Result<(), RemoteError> {
        let token = self.access_token()?;
        let res = self
            .client
            .post(format!("{}/{}", self.rest_base(), table))
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(token)
            // PostgREST takes upserts as single-element arrays
            .json(&[row])
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Self::check_status(res.status())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        let token = self.access_token()?;
        let res = self
            .client
            .delete(format!("{}/{}", self.rest_base(), table))
            .query(&[("id", format!("eq.{}", id))])
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Self::check_status(res.status())
    }
}

impl RemoteStore for HttpRemoteStore {
    fn fetch_folders(&self) -> BoxFuture<'_, Result<Vec<Folder>, RemoteError>> {
        Box::pin(self.fetch_rows(FOLDERS_TABLE))
    }

    fn fetch_links(&self) -> BoxFuture<'_, Result<Vec<Link>, RemoteError>> {
        Box::pin(self.fetch_rows(LINKS_TABLE))
    }

    fn upsert_folder<'a>(&'a self, folder: &'a Folder) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.upsert_row(FOLDERS_TABLE, folder))
    }

    fn delete_folder<'a>(&'a self, folder_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.delete_row(FOLDERS_TABLE, folder_id))
    }

    fn upsert_link<'a>(&'a self, link: &'a Link) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.upsert_row(LINKS_TABLE, link))
    }

    fn delete_link<'a>(&'a self, link_id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(self.delete_row(LINKS_TABLE, link_id))
    }
}
