//! Reference caches for repeated data structures.
//!
//! The marshal side maps values to small indices; the unmarshal side maps
//! indices back to values. Each direction of a connection owns one of each
//! kind and both persist across frames, so a value announced in one frame can
//! be referenced by index in any later frame. A null reference is cached
//! like any other value.

use std::collections::HashMap;

use crate::{codec::ProtocolError, commands::DataStructure};

/// Upper bound on cache slots addressable by a signed 16-bit index.
pub const MAX_CACHE_SIZE: usize = (i16::MAX / 2) as usize;

/// Slots kept free by the eviction sweep run before each frame.
const FREE_SPACE: usize = 100;

/// Index written when a value could not be cached.
pub const NOT_CACHED: i16 = -1;

/// Cached value; `None` is the null reference.
pub type CacheKey = Option<DataStructure>;

/// Outbound cache mapping values to indices.
#[derive(Debug)]
pub struct MarshalCache {
    slots: Vec<Option<CacheKey>>,
    index: HashMap<CacheKey, i16>,
    next_index: usize,
    next_eviction: usize,
    journal: Option<Journal>,
}

/// Inserts made since [`MarshalCache::begin_frame`], with the slot contents
/// they replaced.
#[derive(Debug)]
struct Journal {
    next_index: usize,
    replaced: Vec<(usize, Option<CacheKey>)>,
}

impl MarshalCache {
    /// Creates a cache with `size` slots, clamped to `1..=MAX_CACHE_SIZE`.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, MAX_CACHE_SIZE);
        Self {
            slots: vec![None; size],
            index: HashMap::new(),
            next_index: 0,
            next_eviction: 0,
            journal: None,
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize { self.slots.len() }

    /// Number of cached values.
    #[must_use]
    pub fn len(&self) -> usize { self.index.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Returns the index of a previously cached value.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<i16> { self.index.get(key).copied() }

    /// Caches `key` in the next slot and returns its index, or
    /// [`NOT_CACHED`] when every slot is taken.
    pub fn insert(&mut self, key: CacheKey) -> i16 {
        if self.index.len() >= self.slots.len() {
            return NOT_CACHED;
        }
        let slot = self.next_index;
        self.next_index = (self.next_index + 1) % self.slots.len();
        let previous = self.slots[slot].replace(key.clone());
        if let Some(evicted) = &previous {
            self.index.remove(evicted);
        }
        if let Some(journal) = &mut self.journal {
            journal.replaced.push((slot, previous));
        }
        let index = i16::try_from(slot).unwrap_or(NOT_CACHED);
        self.index.insert(key, index);
        index
    }

    /// Evicts the oldest entries until enough slots are free for a frame.
    pub fn evict(&mut self) {
        let limit = self
            .slots
            .len()
            .saturating_sub(FREE_SPACE.min(self.slots.len() / 2));
        while self.index.len() > limit {
            if let Some(evicted) = self.slots[self.next_eviction].take() {
                self.index.remove(&evicted);
            }
            self.next_eviction = (self.next_eviction + 1) % self.slots.len();
        }
    }

    /// Starts recording inserts so a frame that fails to encode can be
    /// undone with [`rollback_frame`](Self::rollback_frame).
    pub fn begin_frame(&mut self) {
        self.journal = Some(Journal {
            next_index: self.next_index,
            replaced: Vec::new(),
        });
    }

    /// Keeps the inserts of the current frame.
    pub fn commit_frame(&mut self) { self.journal = None; }

    /// Undoes every insert since [`begin_frame`](Self::begin_frame). The
    /// peer never saw the frame, so it must not be referenced by index.
    pub fn rollback_frame(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (slot, previous) in journal.replaced.into_iter().rev() {
            if let Some(inserted) = self.slots[slot].take() {
                self.index.remove(&inserted);
            }
            if let Some(restored) = &previous
                && let Ok(index) = i16::try_from(slot)
            {
                self.index.insert(restored.clone(), index);
            }
            self.slots[slot] = previous;
        }
        self.next_index = journal.next_index;
    }

    /// Forgets every cached value.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.index.clear();
        self.next_index = 0;
        self.next_eviction = 0;
        self.journal = None;
    }
}

/// Inbound cache resolving indices announced by the peer.
#[derive(Debug, Default)]
pub struct UnmarshalCache {
    slots: Vec<Option<CacheKey>>,
}

impl UnmarshalCache {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Records the value announced at `index`. [`NOT_CACHED`] is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CacheMiss`] for other negative or
    /// out-of-range indices.
    pub fn set(&mut self, index: i16, value: CacheKey) -> Result<(), ProtocolError> {
        if index == NOT_CACHED {
            return Ok(());
        }
        let slot = usize::try_from(index)
            .ok()
            .filter(|slot| *slot < MAX_CACHE_SIZE)
            .ok_or(ProtocolError::CacheMiss { index })?;
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(value);
        Ok(())
    }

    /// Resolves a reference to a previously announced value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CacheMiss`] if nothing was announced at
    /// `index`.
    pub fn get(&self, index: i16) -> Result<CacheKey, ProtocolError> {
        usize::try_from(index)
            .ok()
            .and_then(|slot| self.slots.get(slot))
            .and_then(Clone::clone)
            .ok_or(ProtocolError::CacheMiss { index })
    }

    /// Forgets every announced value.
    pub fn clear(&mut self) { self.slots.clear(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ConnectionId, Destination};

    fn queue(name: &str) -> CacheKey { Some(Destination::queue(name).into()) }

    #[test]
    fn assigns_sequential_indices() {
        let mut cache = MarshalCache::new(8);
        assert_eq!(cache.insert(queue("a")), 0);
        assert_eq!(cache.insert(None), 1);
        assert_eq!(cache.insert(Some(ConnectionId::new("c").into())), 2);
        assert_eq!(cache.lookup(&queue("a")), Some(0));
        assert_eq!(cache.lookup(&None), Some(1));
        assert_eq!(cache.lookup(&queue("b")), None);
    }

    #[test]
    fn full_cache_refuses_new_values() {
        let mut cache = MarshalCache::new(2);
        cache.insert(queue("a"));
        cache.insert(queue("b"));
        assert_eq!(cache.insert(queue("c")), NOT_CACHED);
        assert_eq!(cache.lookup(&queue("c")), None);
    }

    #[test]
    fn eviction_sweep_frees_oldest_slots() {
        let mut cache = MarshalCache::new(4);
        for name in ["a", "b", "c", "d"] {
            cache.insert(queue(name));
        }
        cache.evict();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&queue("a")), None);
        assert_eq!(cache.lookup(&queue("b")), None);
        assert_eq!(cache.lookup(&queue("c")), Some(2));
        assert_eq!(cache.insert(queue("e")), 0);
    }

    #[test]
    fn rolled_back_frames_leave_no_entries() {
        let mut cache = MarshalCache::new(2);
        cache.insert(queue("kept"));
        cache.begin_frame();
        assert_eq!(cache.insert(queue("a")), 1);
        assert_eq!(cache.insert(queue("b")), NOT_CACHED);
        cache.rollback_frame();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&queue("kept")), Some(0));
        assert_eq!(cache.lookup(&queue("a")), None);
        assert_eq!(cache.insert(queue("c")), 1);
    }

    #[test]
    fn rollback_keeps_entries_that_survived_eviction() {
        let mut cache = MarshalCache::new(2);
        cache.insert(queue("a"));
        cache.insert(queue("b"));
        cache.evict();
        cache.begin_frame();
        assert_eq!(cache.insert(queue("c")), 0);
        cache.rollback_frame();
        assert_eq!(cache.lookup(&queue("c")), None);
        assert_eq!(cache.lookup(&queue("b")), Some(1));
    }

    #[test]
    fn committed_frames_keep_their_entries() {
        let mut cache = MarshalCache::new(4);
        cache.begin_frame();
        cache.insert(queue("a"));
        cache.commit_frame();
        cache.rollback_frame();
        assert_eq!(cache.lookup(&queue("a")), Some(0));
    }

    #[test]
    fn unmarshal_cache_resolves_announced_values() {
        let mut cache = UnmarshalCache::new();
        cache.set(5, queue("a")).expect("set");
        cache.set(NOT_CACHED, queue("ignored")).expect("ignored");
        assert_eq!(cache.get(5).expect("hit"), queue("a"));
        assert_eq!(cache.get(4), Err(ProtocolError::CacheMiss { index: 4 }));
        assert_eq!(cache.get(-3), Err(ProtocolError::CacheMiss { index: -3 }));
    }
}
