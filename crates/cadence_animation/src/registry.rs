//! Reuse registry
//!
//! Maps `(owner, key)` to a live playback so a host can re-request "the fade
//! on this widget" every frame and get the same object back. Entries are
//! added on the first miss and removed when the playback is disposed.

use crate::playback::PlaybackId;
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Identity of a host object that owns registered playbacks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a fresh process-unique owner
    pub fn next() -> Self {
        Self(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    /// Derive an owner from any hashable host key (widget path, entity id, ...)
    pub fn from_key<K: Hash + ?Sized>(key: &K) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

/// Keyed playback storage, grouped by owner
#[derive(Debug, Default)]
pub struct Registry {
    owners: FxHashMap<OwnerId, FxHashMap<String, PlaybackId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: OwnerId, key: &str) -> Option<PlaybackId> {
        self.owners.get(&owner)?.get(key).copied()
    }

    pub fn contains(&self, owner: OwnerId, key: &str) -> bool {
        self.get(owner, key).is_some()
    }

    /// Store `id` under `(owner, key)`, returning whatever was there before
    pub(crate) fn insert(&mut self, owner: OwnerId, key: &str, id: PlaybackId) -> Option<PlaybackId> {
        self.owners
            .entry(owner)
            .or_default()
            .insert(key.to_owned(), id)
    }

    pub(crate) fn remove(&mut self, owner: OwnerId, key: &str) -> Option<PlaybackId> {
        let keys = self.owners.get_mut(&owner)?;
        let removed = keys.remove(key);
        if keys.is_empty() {
            self.owners.remove(&owner);
        }
        removed
    }

    /// Snapshot of one owner's playbacks
    pub fn owned_by(&self, owner: OwnerId) -> Vec<PlaybackId> {
        self.owners
            .get(&owner)
            .map(|keys| keys.values().copied().collect())
            .unwrap_or_default()
    }

    /// Keys registered for `owner`, sorted
    pub fn keys(&self, owner: OwnerId) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .owners
            .get(&owner)
            .map(|keys| keys.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Total number of registered playbacks
    pub fn len(&self) -> usize {
        self.owners.values().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
