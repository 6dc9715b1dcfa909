// LinkStash services
// Pure engines and lifecycle-light helpers: hierarchy invariants, retry
// policy, guest storage, cross-context broadcast.

pub mod broadcast_sync;
pub mod guest_store;
pub mod hierarchy_engine;
pub mod retry;
