// External-interface boundaries of the sync core.
// Each submodule defines one boundary as a trait plus the concrete adapters
// shipped with the crate (HTTP, SQLite, in-memory).

use std::future::Future;
use std::pin::Pin;

pub mod auth;
pub mod channel;
pub mod feed;
pub mod local;
pub mod rest;

/// Object-safe future alias used by the boundary traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
