//! Application state for the read-only control surface.

use crate::store::Store;
use std::sync::Arc;

/// Shared state accessible to every route handler. Cheap to clone (wraps
/// an `Arc`/a pool-backed `Store`), per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub worker_id: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, worker_id: Arc<str>) -> Self {
        Self { store, worker_id }
    }
}
