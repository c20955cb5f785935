//! Load ticket implementation
//!
//! A pending asset load is represented by a strong [`LoadTicket`] kept by the
//! scene and a weak [`LoadToken`] handed to the loader. Dropping the ticket
//! (because its node was deleted) cancels the load: the loader sees a dead
//! token and discards its result.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::path::AssetPath;

/// Global counter for generating unique load IDs
static NEXT_LOAD_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique load ID
fn next_id() -> u64 {
    NEXT_LOAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// What is being loaded, and for which node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Node that owns the load
    pub node_id: String,
    /// Asset being loaded
    pub path: AssetPath,
}

/// Strong side of a pending load, owned by the scene.
#[derive(Debug)]
pub struct LoadTicket {
    /// Unique identifier for this load
    id: u64,
    /// Reference-counted request
    inner: Arc<LoadRequest>,
}

impl LoadTicket {
    /// Create a new ticket for a request
    #[must_use]
    pub fn new(request: LoadRequest) -> Self {
        Self {
            id: next_id(),
            inner: Arc::new(request),
        }
    }

    /// Get the unique ID of this load
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Get the request
    #[must_use]
    pub fn request(&self) -> &LoadRequest {
        &self.inner
    }

    /// Create a token for the loader that does not keep the load alive
    #[must_use]
    pub fn token(&self) -> LoadToken {
        LoadToken {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for LoadTicket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LoadTicket {}

impl Hash for LoadTicket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Weak side of a pending load, held by whoever performs the decode.
#[derive(Debug, Clone)]
pub struct LoadToken {
    /// Unique identifier for this load
    id: u64,
    /// Weak reference to the request
    inner: Weak<LoadRequest>,
}

impl LoadToken {
    /// Get the unique ID of this load
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Get the request if the load is still wanted
    #[must_use]
    pub fn request(&self) -> Option<Arc<LoadRequest>> {
        self.inner.upgrade()
    }

    /// Check if the owning node was deleted or the load was completed
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl PartialEq for LoadToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LoadToken {}
