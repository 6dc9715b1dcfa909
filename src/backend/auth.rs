//! Credential/session backend boundary.
//!
//! [`AuthBackend`] is the async seam the session recovery state machine
//! talks to. [`HttpAuthBackend`] implements it against GoTrue-style
//! endpoints (`/auth/v1/token`, `/auth/v1/user`, ...), persisting tokens in
//! local storage and refreshing once when an access token goes stale.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use super::local::LocalStore;
use super::BoxFuture;
use crate::types::errors::{AuthError, StorageError};
use crate::types::session::{AuthSession, AuthUser, Credentials};

pub(crate) const ACCESS_TOKEN_KEY: &str = "auth.access_token";
const REFRESH_TOKEN_KEY: &str = "auth.refresh_token";
const EXPIRES_AT_KEY: &str = "auth.expires_at";

/// Async credential backend. Every operation is fallible and possibly slow.
pub trait AuthBackend: Send + Sync {
    /// Primary recovery strategy: resolve an existing credential set into a
    /// live session, refreshing stale credentials if the backend supports it.
    fn get_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>>;

    /// Fallback recovery strategy and expiry probe: ask the backend who the
    /// current credentials belong to, without attempting a refresh.
    fn get_user(&self) -> BoxFuture<'_, Result<Option<AuthUser>, AuthError>>;

    /// Force a credential refresh.
    fn refresh_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>>;

    fn sign_in<'a>(&'a self, credentials: &'a Credentials)
        -> BoxFuture<'a, Result<AuthSession, AuthError>>;

    fn sign_up<'a>(&'a self, credentials: &'a Credentials)
        -> BoxFuture<'a, Result<AuthSession, AuthError>>;

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>>;
}

// === HttpAuthBackend ===

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<UserPayload>,
}

/// Credential backend over HTTP.
pub struct HttpAuthBackend {
    base_url: String,
    anon_key: String,
    client: reqwest::Client,
    store: Arc<dyn LocalStore>,
}

impl HttpAuthBackend {
    pub fn new(base_url: &str, anon_key: &str, store: Arc<dyn LocalStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: reqwest::Client::new(),
            store,
        }
    }

    fn auth_base(&self) -> String {
        format!("{}/auth/v1", self.base_url)
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn storage(err: StorageError) -> AuthError {
        AuthError::Backend(err.to_string())
    }

    fn stored_access_token(&self) -> Result<Option<String>, AuthError> {
        self.store.get(ACCESS_TOKEN_KEY).map_err(Self::storage)
    }

    fn stored_expires_at(&self) -> Result<Option<i64>, AuthError> {
        let raw = self.store.get(EXPIRES_AT_KEY).map_err(Self::storage)?;
        Ok(raw.and_then(|v| v.parse().ok()))
    }

    fn persist_tokens(&self, token: &TokenResponse) -> Result<i64, AuthError> {
        self.store
            .set(ACCESS_TOKEN_KEY, &token.access_token)
            .map_err(Self::storage)?;
        if let Some(refresh) = &token.refresh_token {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh)
                .map_err(Self::storage)?;
        }
        let expires_at = Self::now() + token.expires_in.unwrap_or(0);
        self.store
            .set(EXPIRES_AT_KEY, &expires_at.to_string())
            .map_err(Self::storage)?;
        Ok(expires_at)
    }

    fn clear_tokens(&self) {
        let _ = self.store.remove(ACCESS_TOKEN_KEY);
        let _ = self.store.remove(REFRESH_TOKEN_KEY);
        let _ = self.store.remove(EXPIRES_AT_KEY);
    }

    async fn fetch_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let res = self
            .client
            .get(format!("{}/user", self.auth_base()))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if res.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        if !res.status().is_success() {
            return Err(AuthError::Backend(format!("HTTP {}", res.status())));
        }

        let user: UserPayload = res
            .json()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;
        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }

    async fn exchange_token(&self, url: String, body: serde_json::Value) -> Result<AuthSession, AuthError> {
        let res = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if res.status() == reqwest::StatusCode::UNAUTHORIZED
            || res.status() == reqwest::StatusCode::BAD_REQUEST
        {
            return Err(AuthError::Unauthorized);
        }
        if !res.status().is_success() {
            return Err(AuthError::Backend(format!("HTTP {}", res.status())));
        }

        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;
        let expires_at = self.persist_tokens(&token)?;

        let user = match token.user {
            Some(payload) => AuthUser {
                id: payload.id,
                email: payload.email,
            },
            None => self.fetch_user(&token.access_token).await?,
        };
        Ok(AuthSession { user, expires_at })
    }

    async fn refresh(&self) -> Result<Option<AuthSession>, AuthError> {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY).map_err(Self::storage)? {
            Some(token) => token,
            None => return Ok(None),
        };
        let url = format!("{}/token?grant_type=refresh_token", self.auth_base());
        let body = serde_json::json!({ "refresh_token": refresh_token });
        match self.exchange_token(url, body).await {
            Ok(session) => Ok(Some(session)),
            Err(AuthError::Unauthorized) => {
                // The refresh token is dead; stored credentials are useless now.
                self.clear_tokens();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn get_session_inner(&self) -> Result<Option<AuthSession>, AuthError> {
        let access_token = match self.stored_access_token()? {
            Some(token) => token,
            None => return Ok(None),
        };
        let expires_at = self.stored_expires_at()?;
        if expires_at.map_or(true, |at| at <= Self::now()) {
            return self.refresh().await;
        }
        match self.fetch_user(&access_token).await {
            Ok(user) => Ok(Some(AuthSession {
                user,
                expires_at: expires_at.unwrap_or(0),
            })),
            // Stale access token with time left on the clock: refresh once.
            Err(AuthError::Unauthorized) => self.refresh().await,
            Err(err) => Err(err),
        }
    }

    async fn get_user_inner(&self) -> Result<Option<AuthUser>, AuthError> {
        let access_token = match self.stored_access_token()? {
            Some(token) => token,
            None => return Ok(None),
        };
        match self.fetch_user(&access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::Unauthorized) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn sign_out_inner(&self) -> Result<(), AuthError> {
        let access_token = self.stored_access_token()?;
        // Local credentials are cleared regardless of whether the network
        // sign-out succeeds.
        self.clear_tokens();
        let access_token = match access_token {
            Some(token) => token,
            None => return Ok(()),
        };
        let res = self
            .client
            .post(format!("{}/logout", self.auth_base()))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !res.status().is_success() && res.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Backend(format!("HTTP {}", res.status())));
        }
        Ok(())
    }
}

impl AuthBackend for HttpAuthBackend {
    fn get_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>> {
        Box::pin(self.get_session_inner())
    }

    fn get_user(&self) -> BoxFuture<'_, Result<Option<AuthUser>, AuthError>> {
        Box::pin(self.get_user_inner())
    }

    fn refresh_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>> {
        Box::pin(self.refresh())
    }

    fn sign_in<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthSession, AuthError>> {
        Box::pin(async move {
            let url = format!("{}/token?grant_type=password", self.auth_base());
            let body = serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            });
            self.exchange_token(url, body).await
        })
    }

    fn sign_up<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthSession, AuthError>> {
        Box::pin(async move {
            let url = format!("{}/signup", self.auth_base());
            let body = serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            });
            self.exchange_token(url, body).await
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        Box::pin(self.sign_out_inner())
    }
}
