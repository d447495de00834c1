//! Per-collection write serialization
//!
//! Collection mutations take the collection's write lock so operations on the
//! same collection never interleave. Reads take the read lock. Different
//! collections never block each other.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-collection lock manager
pub struct CollectionLockManager {
    /// Map from collection name to its read-write lock
    locks: Arc<RwLock<HashMap<String, Arc<RwLock<()>>>>>,
}

impl CollectionLockManager {
    /// Create a new collection lock manager
    pub fn new() -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get or create the lock for a collection
    pub fn get_lock(&self, collection: &str) -> Arc<RwLock<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(collection) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Double-check after acquiring write lock (another thread might have created it)
        map.entry(collection.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drop the lock entry for a deleted collection.
    ///
    /// Holders of the old `Arc` keep a valid lock; a later writer gets a fresh one.
    pub fn forget(&self, collection: &str) {
        self.locks.write().remove(collection);
    }
}

impl Default for CollectionLockManager {
    fn default() -> Self {
        Self::new()
    }
}
