//! Expiration Tracker
//!
//! Weak set of the resources that must be rebuilt after surface loss.
//! Owners never unregister: an entry expires on its own once the last strong
//! reference is gone, and the periodic sweep drops the bookkeeping.
//!
//! Entries are keyed by the address of the resource's `Arc` allocation. The
//! stored `Weak` keeps that allocation reserved until the entry is pruned, so
//! an address cannot be handed to a different resource while still tracked.

use std::fmt;
use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

use crate::resource::{Resource, ResourceKind};

/// One tracked resource.
pub struct ExpirableEntry {
    weak: Weak<dyn Resource>,
    kind: ResourceKind,
    label: String,
}

impl ExpirableEntry {
    fn new(resource: &Arc<dyn Resource>) -> Self {
        Self {
            weak: Arc::downgrade(resource),
            kind: resource.kind(),
            label: resource.label().to_string(),
        }
    }

    /// No owner holds the resource any more.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.weak.strong_count() == 0
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<dyn Resource>> {
        self.weak.upgrade()
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ExpirableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirableEntry")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[inline]
fn identity(resource: &Arc<dyn Resource>) -> usize {
    Arc::as_ptr(resource).cast::<()>() as usize
}

#[derive(Default)]
pub struct ExpirationTracker {
    entries: FxHashMap<usize, ExpirableEntry>,
}

impl ExpirationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `resource`. Returns `false` if it already was.
    pub fn insert(&mut self, resource: &Arc<dyn Resource>) -> bool {
        let key = identity(resource);
        if self.entries.get(&key).is_some_and(|entry| !entry.is_expired()) {
            return false;
        }
        self.entries.insert(key, ExpirableEntry::new(resource));
        true
    }

    #[must_use]
    pub fn contains(&self, resource: &Arc<dyn Resource>) -> bool {
        self.entries
            .get(&identity(resource))
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Number of entries, expired ones included until the next prune.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired();
            if expired {
                log::debug!("Tracked {} '{}' expired", entry.kind, entry.label);
            }
            !expired
        });
        before - self.entries.len()
    }

    /// Strong references to every live entry.
    #[must_use]
    pub fn live(&self) -> Vec<Arc<dyn Resource>> {
        self.entries.values().filter_map(ExpirableEntry::upgrade).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpirableEntry> {
        self.entries.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for ExpirationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationTracker")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recycler::RecycleQueue;
    use crate::resource::{Buffer, Texture};

    fn buffer(label: &str) -> Arc<dyn Resource> {
        Arc::new(Buffer::new(RecycleQueue::new(), label, wgpu::BufferUsages::VERTEX, None))
    }

    #[test]
    fn insert_has_set_semantics() {
        let mut tracker = ExpirationTracker::new();
        let a = buffer("a");
        assert!(tracker.insert(&a));
        assert!(!tracker.insert(&a));
        assert!(!tracker.insert(&Arc::clone(&a)));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn dropped_resources_expire_and_are_pruned() {
        let mut tracker = ExpirationTracker::new();
        let a = buffer("a");
        let b: Arc<dyn Resource> = Arc::new(Texture::new(
            RecycleQueue::new(),
            "b",
            4,
            4,
            wgpu::TextureFormat::Rgba8Unorm,
        ));
        tracker.insert(&a);
        tracker.insert(&b);

        drop(a);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.live().len(), 1);
        assert_eq!(tracker.sweep_expired(), 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(&b));
    }
}
