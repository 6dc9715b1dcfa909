//! Property-based tests for guest-mode persistence.
//!
//! Whatever a guest saves must survive a reload of the store and a full
//! guest → authenticated → guest mode cycle: mode transitions never touch
//! guest data, and no implicit merge or deletion happens on sign-in.

use std::sync::Arc;

use linkstash::backend::local::MemoryStore;
use linkstash::managers::mode_reconciler::{ModeReconciler, ModeReconcilerTrait};
use linkstash::services::guest_store::{GuestStore, GuestStoreTrait};
use linkstash::types::link::{Link, Platform};
use linkstash::types::session::{AuthUser, SessionState};
use proptest::prelude::*;

/// Strategy for link titles: printable, non-empty.
fn arb_title() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{0,24}"
}

/// Strategy for URL paths.
fn arb_path() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}"
}

fn link(index: usize, title: String, path: String, favorite: bool) -> Link {
    Link {
        id: format!("guest-link-{}", index),
        url: format!("https://example.com/{}", path),
        title,
        description: None,
        thumbnail: None,
        platform: Platform::Web,
        folder_id: None,
        is_favorite: favorite,
        deleted_at: None,
        created_at: index as i64,
        updated_at: index as i64,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // **Guest links survive reload**
    //
    // *For any* batch of links saved by a guest, a fresh store over the same
    // backing storage SHALL return every one of them unchanged.
    #[test]
    fn saved_links_survive_a_store_reload(
        entries in proptest::collection::vec((arb_title(), arb_path(), any::<bool>()), 1..8),
    ) {
        let backing = Arc::new(MemoryStore::new());
        let guest = GuestStore::new(backing.clone());

        let links: Vec<Link> = entries
            .into_iter()
            .enumerate()
            .map(|(i, (title, path, favorite))| link(i, title, path, favorite))
            .collect();
        for l in &links {
            guest.upsert_link(l).expect("upsert should succeed");
        }

        let reloaded = GuestStore::new(backing);
        let stored = reloaded.links().expect("links should load");
        prop_assert_eq!(stored.len(), links.len());
        for l in &links {
            let found = stored.iter().find(|s| s.id == l.id);
            prop_assert_eq!(found, Some(l));
        }
    }

    // **Mode transitions never delete guest data**
    //
    // *For any* batch of guest links, signing in and returning to guest mode
    // SHALL leave all of them retrievable.
    #[test]
    fn sign_in_cycle_preserves_guest_links(
        entries in proptest::collection::vec((arb_title(), arb_path(), any::<bool>()), 1..8),
    ) {
        let guest = GuestStore::new(Arc::new(MemoryStore::new()));
        let reconciler = ModeReconciler::new();

        let count = entries.len();
        for (i, (title, path, favorite)) in entries.into_iter().enumerate() {
            guest
                .upsert_link(&link(i, title, path, favorite))
                .expect("upsert should succeed");
        }

        reconciler.apply_session_state(&SessionState::Ready(Some(AuthUser {
            id: "user-1".to_string(),
            email: None,
        })));
        prop_assert_eq!(guest.links().expect("links should load").len(), count);

        reconciler.enter_guest_mode();
        prop_assert_eq!(guest.links().expect("links should load").len(), count);
    }
}
