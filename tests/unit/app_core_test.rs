use std::sync::Arc;
use std::time::Duration;

use linkstash::app::{Backends, SyncCore, SyncCoreConfig};
use linkstash::backend::auth::AuthBackend;
use linkstash::backend::feed::InMemoryTransport;
use linkstash::backend::local::{LocalStore, MemoryStore};
use linkstash::backend::rest::{RemoteStore, FOLDERS_TABLE, LINKS_TABLE};
use linkstash::backend::BoxFuture;
use linkstash::types::errors::{AuthError, RemoteError, SubscriptionError};
use linkstash::types::events::ChangeEvent;
use linkstash::types::folder::Folder;
use linkstash::types::link::{Link, Platform};
use linkstash::types::session::{AuthSession, AuthUser, Credentials};
use linkstash::types::subscription::SubscriptionConfig;

struct StubAuth {
    /// Whether recovery should find a signed-in user.
    signed_in: bool,
}

fn test_user() -> AuthUser {
    AuthUser {
        id: "user-1".to_string(),
        email: None,
    }
}

impl AuthBackend for StubAuth {
    fn get_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>> {
        Box::pin(async move {
            if self.signed_in {
                Ok(Some(AuthSession {
                    user: test_user(),
                    expires_at: i64::MAX,
                }))
            } else {
                Ok(None)
            }
        })
    }

    fn get_user(&self) -> BoxFuture<'_, Result<Option<AuthUser>, AuthError>> {
        Box::pin(async move {
            if self.signed_in {
                Ok(Some(test_user()))
            } else {
                Ok(None)
            }
        })
    }

    fn refresh_session(&self) -> BoxFuture<'_, Result<Option<AuthSession>, AuthError>> {
        Box::pin(async { Ok(None) })
    }

    fn sign_in<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthSession, AuthError>> {
        Box::pin(async {
            Ok(AuthSession {
                user: test_user(),
                expires_at: i64::MAX,
            })
        })
    }

    fn sign_up<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthSession, AuthError>> {
        Box::pin(async {
            Ok(AuthSession {
                user: test_user(),
                expires_at: i64::MAX,
            })
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        Box::pin(async { Ok(()) })
    }
}

fn folder(id: &str, name: &str) -> Folder {
    Folder {
        id: id.to_string(),
        parent_id: None,
        name: name.to_string(),
        color: None,
        icon: None,
        is_platform_folder: false,
        created_at: 1,
        updated_at: 1,
    }
}

fn link(id: &str) -> Link {
    Link {
        id: id.to_string(),
        url: format!("https://example.com/{}", id),
        title: format!("Link {}", id),
        description: None,
        thumbnail: None,
        platform: Platform::Web,
        folder_id: None,
        is_favorite: false,
        deleted_at: None,
        created_at: 1,
        updated_at: 1,
    }
}

/// Remote store pre-seeded with one folder and one link.
struct SeededRemote;

impl RemoteStore for SeededRemote {
    fn fetch_folders(&self) -> BoxFuture<'_, Result<Vec<Folder>, RemoteError>> {
        Box::pin(async { Ok(vec![folder("f1", "Seeded")]) })
    }

    fn fetch_links(&self) -> BoxFuture<'_, Result<Vec<Link>, RemoteError>> {
        Box::pin(async { Ok(vec![link("l1")]) })
    }

    fn upsert_folder<'a>(&'a self, _folder: &'a Folder) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async { Ok(()) })
    }

    fn delete_folder<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async { Ok(()) })
    }

    fn upsert_link<'a>(&'a self, _link: &'a Link) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async { Ok(()) })
    }

    fn delete_link<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async { Ok(()) })
    }
}

fn make_core(signed_in: bool, transport: Arc<InMemoryTransport>) -> SyncCore {
    let local: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
    SyncCore::new(
        Backends {
            auth: Arc::new(StubAuth { signed_in }),
            transport,
            local,
            remote: Arc::new(SeededRemote),
            channel: None,
        },
        SyncCoreConfig::default(),
        Arc::new(|| {}),
    )
}

#[tokio::test]
async fn test_subscriptions_are_gated_on_an_authenticated_session() {
    let transport = Arc::new(InMemoryTransport::new());
    let core = make_core(false, transport.clone());

    assert!(core.initialize().await.is_ready());
    let result = core.subscribe(SubscriptionConfig::all(LINKS_TABLE), Arc::new(|_| {}), None);
    assert_eq!(result, Err(SubscriptionError::SessionNotReady));
    assert_eq!(core.start_mirror_feeds(), Err(SubscriptionError::SessionNotReady));
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test]
async fn test_mirror_feeds_apply_change_events() {
    let transport = Arc::new(InMemoryTransport::new());
    let core = make_core(true, transport.clone());

    assert!(core.initialize().await.is_authenticated());
    let feeds = core.start_mirror_feeds().expect("feeds should start");
    assert_eq!(feeds.len(), 2);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let new_folder = serde_json::to_value(folder("f2", "Pushed")).expect("serialize failed");
    transport.emit(FOLDERS_TABLE, ChangeEvent::insert(new_folder));
    let new_link = serde_json::to_value(link("l2")).expect("serialize failed");
    transport.emit(LINKS_TABLE, ChangeEvent::insert(new_link));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mirror = core.mirror().lock().expect("mirror poisoned");
    assert!(mirror.folder("f2").is_some());
    assert!(mirror.link("l2").is_some());
}

#[tokio::test]
async fn test_refresh_mirror_loads_the_remote_snapshot() {
    let transport = Arc::new(InMemoryTransport::new());
    let core = make_core(true, transport);

    core.initialize().await;
    core.refresh_mirror().await.expect("refresh failed");

    let mirror = core.mirror().lock().expect("mirror poisoned");
    assert_eq!(mirror.folders().len(), 1);
    assert_eq!(mirror.folder("f1").expect("folder missing").name, "Seeded");
    assert_eq!(mirror.links().len(), 1);
}
