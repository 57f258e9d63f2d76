use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

/// A fixed set of async locks selected by hashing a (kind, id) key.
///
/// Two keys share a lock only when they land on the same shard, so
/// unrelated entries rarely wait on each other.
pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyedLocks {
    pub const DEFAULT_SHARDS: usize = 64;

    /// Creates the lock set. A shard count of zero is raised to one.
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard index for a key.
    pub fn shard_of(&self, kind: &str, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Waits for and holds the lock of the key's shard.
    pub async fn lock(&self, kind: &str, id: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_of(kind, id)].lock().await
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHARDS)
    }
}
