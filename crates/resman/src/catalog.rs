//! The catalog of known resources, their locations, and the cache of their
//! decoded bytes.
//!
//! Unlocked resources that have been handed out sit in a recency list and
//! are evicted oldest first once their total size exceeds the ceiling.
//! Locked resources are never evicted.

use std::{
    collections::{HashMap, hash_map},
    num::NonZeroU32,
};

use bytes::Bytes;
use lru::LruCache;

use crate::{
    ids::ResourceId,
    sources::{Placement, SourceId},
};

pub mod residency;

pub use residency::{Residency, ResidencyState};

/// Where a resource's bytes are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    source: SourceId,
    offset: u32,
    size: u32,
    placement: Placement,
}

impl Location {
    #[must_use]
    pub fn new(source: SourceId, offset: u32, size: u32, placement: Placement) -> Self {
        Location {
            source,
            offset,
            size,
            placement,
        }
    }

    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The decoded size, or zero if it is not known until first decode.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    id: ResourceId,
    location: Location,
    residency: Residency,
}

impl CatalogEntry {
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn residency(&self) -> &Residency {
        &self.residency
    }

    #[must_use]
    pub fn state(&self) -> ResidencyState {
        self.residency.state()
    }

    #[must_use]
    pub fn lockers(&self) -> u32 {
        self.residency.lockers()
    }
}

#[derive(Debug)]
pub struct Catalog {
    entries: HashMap<ResourceId, CatalogEntry>,
    recency: LruCache<ResourceId, ()>,
    ceiling: usize,
    enqueued_bytes: usize,
    locked_bytes: usize,
}

impl Catalog {
    pub(crate) fn new(ceiling: usize) -> Self {
        Catalog {
            entries: HashMap::new(),
            recency: LruCache::unbounded(),
            ceiling,
            enqueued_bytes: 0,
            locked_bytes: 0,
        }
    }

    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Total size of unlocked resources eligible for eviction.
    #[must_use]
    pub fn enqueued_bytes(&self) -> usize {
        self.enqueued_bytes
    }

    #[must_use]
    pub fn locked_bytes(&self) -> usize {
        self.locked_bytes
    }

    /// Records a location for `id`. An existing entry is replaced unless it
    /// is an overlay and the new location is not. Returns whether the
    /// location was recorded.
    pub(crate) fn insert(&mut self, id: ResourceId, location: Location) -> bool {
        match self.entries.entry(id) {
            hash_map::Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                if location.placement == Placement::Volume
                    && existing.location.placement == Placement::Overlay
                {
                    return false;
                }
                existing.location = location;
                let previous = std::mem::take(&mut existing.residency);
                self.forget(id, &previous);
            }
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(CatalogEntry {
                    id,
                    location,
                    residency: Residency::Unloaded,
                });
            }
        }
        true
    }

    /// Drops the accounting for a residency that has been discarded.
    fn forget(&mut self, id: ResourceId, residency: &Residency) {
        match residency {
            Residency::Enqueued(data) => {
                self.recency.pop(&id);
                self.enqueued_bytes -= data.len();
            }
            Residency::Locked { data, .. } => self.locked_bytes -= data.len(),
            Residency::Unloaded | Residency::Allocated(_) => {}
        }
    }

    /// Stores freshly decoded bytes for an unloaded entry.
    pub(crate) fn store(&mut self, id: ResourceId, data: Bytes) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.residency.state() != ResidencyState::Unloaded {
            log::debug!("Ignoring decoded bytes for {id}, which is already resident");
            return;
        }
        entry.location.size = u32::try_from(data.len()).unwrap_or(u32::MAX);
        entry.residency = Residency::Allocated(data);
    }

    /// Hands out a resident entry's bytes, locking it or moving it to the
    /// front of the recency list. Returns `None` for unloaded entries.
    pub(crate) fn acquire(&mut self, id: ResourceId, lock: bool) -> Option<Bytes> {
        let entry = self.entries.get_mut(&id)?;
        let data = entry.residency.data()?.clone();
        if let Residency::Enqueued(_) = entry.residency {
            self.recency.pop(&id);
            self.enqueued_bytes -= data.len();
            entry.residency = Residency::Allocated(data.clone());
        }

        let residency = std::mem::take(&mut entry.residency);
        entry.residency = match (residency, lock) {
            (Residency::Allocated(data), true) => {
                self.locked_bytes += data.len();
                Residency::Locked {
                    data,
                    lockers: NonZeroU32::MIN,
                }
            }
            (Residency::Locked { data, lockers }, true) => Residency::Locked {
                data,
                lockers: lockers.saturating_add(1),
            },
            (Residency::Allocated(data), false) => {
                self.recency.push(id, ());
                self.enqueued_bytes += data.len();
                Residency::Enqueued(data)
            }
            (other, _) => other,
        };
        self.evict();
        Some(data)
    }

    /// Drops one lock on `id`. The last release makes the entry evictable.
    /// Returns whether the entry was locked.
    pub(crate) fn release(&mut self, id: ResourceId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            log::debug!("Attempt to release {id}, which is not cataloged");
            return false;
        };
        let residency = std::mem::take(&mut entry.residency);
        entry.residency = match residency {
            Residency::Locked { data, lockers } => match NonZeroU32::new(lockers.get() - 1) {
                Some(lockers) => Residency::Locked { data, lockers },
                None => {
                    self.locked_bytes -= data.len();
                    self.enqueued_bytes += data.len();
                    self.recency.push(id, ());
                    Residency::Enqueued(data)
                }
            },
            other => {
                log::debug!("Attempt to release {id}, which is not locked");
                entry.residency = other;
                return false;
            }
        };
        self.evict();
        true
    }

    /// Unloads the least recently used unlocked entries until the enqueued
    /// total fits under the ceiling.
    fn evict(&mut self) {
        while self.enqueued_bytes > self.ceiling {
            let Some((id, ())) = self.recency.pop_lru() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            match std::mem::take(&mut entry.residency) {
                Residency::Enqueued(data) => {
                    self.enqueued_bytes -= data.len();
                    log::trace!("Evicted {id} ({} bytes)", data.len());
                }
                other => entry.residency = other,
            }
        }
    }

    #[cfg(test)]
    fn recency_order(&self) -> Vec<ResourceId> {
        self.recency.iter().map(|(id, ())| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        ids::ResourceType,
        sources::{SourceKind, SourceRegistry},
    };

    fn view(number: u16) -> ResourceId {
        ResourceId::new(ResourceType::View, number)
    }

    fn source() -> SourceId {
        let mut registry = SourceRegistry::default();
        registry.add("resource.000", SourceKind::Patch)
    }

    fn location(placement: Placement) -> Location {
        Location::new(source(), 0, 0, placement)
    }

    fn loaded(catalog: &mut Catalog, id: ResourceId, len: usize) {
        catalog.insert(id, location(Placement::Volume));
        catalog.store(id, Bytes::from(vec![0; len]));
    }

    #[test]
    fn overlays_win_over_volumes() {
        let mut catalog = Catalog::new(100);
        let volume = Location::new(source(), 10, 0, Placement::Volume);
        let overlay = Location::new(source(), 20, 0, Placement::Overlay);
        let later_volume = Location::new(source(), 30, 0, Placement::Volume);

        assert!(catalog.insert(view(1), volume));
        assert!(catalog.insert(view(1), overlay));
        assert!(!catalog.insert(view(1), later_volume));
        assert_eq!(catalog.get(&view(1)).unwrap().location().offset(), 20);

        assert!(catalog.insert(view(2), volume));
        assert!(catalog.insert(view(2), later_volume));
        assert_eq!(catalog.get(&view(2)).unwrap().location().offset(), 30);
    }

    #[test]
    fn relocating_discards_resident_bytes() {
        let mut catalog = Catalog::new(100);
        loaded(&mut catalog, view(1), 10);
        catalog.acquire(view(1), false).unwrap();
        assert_eq!(catalog.enqueued_bytes(), 10);

        catalog.insert(view(1), location(Placement::Overlay));
        assert_eq!(catalog.get(&view(1)).unwrap().state(), ResidencyState::Unloaded);
        assert_eq!(catalog.enqueued_bytes(), 0);
        assert!(catalog.recency_order().is_empty());
    }

    #[test]
    fn store_records_the_decoded_size() {
        let mut catalog = Catalog::new(100);
        loaded(&mut catalog, view(1), 42);
        let entry = catalog.get(&view(1)).unwrap();
        assert_eq!(entry.location().size(), 42);
        assert_eq!(entry.state(), ResidencyState::Allocated);
    }

    #[test]
    fn locks_nest() {
        let mut catalog = Catalog::new(100);
        loaded(&mut catalog, view(1), 10);
        catalog.acquire(view(1), true).unwrap();
        catalog.acquire(view(1), true).unwrap();
        assert_eq!(catalog.get(&view(1)).unwrap().lockers(), 2);
        assert_eq!(catalog.locked_bytes(), 10);

        assert!(catalog.release(view(1)));
        assert_eq!(catalog.get(&view(1)).unwrap().lockers(), 1);
        assert!(catalog.release(view(1)));
        let entry = catalog.get(&view(1)).unwrap();
        assert_eq!(entry.state(), ResidencyState::Enqueued);
        assert_eq!(catalog.locked_bytes(), 0);
        assert_eq!(catalog.enqueued_bytes(), 10);

        assert!(!catalog.release(view(1)));
        assert!(!catalog.release(view(9)));
    }

    #[test]
    fn unlocked_acquire_refreshes_recency() {
        let mut catalog = Catalog::new(100);
        for number in 1..=3 {
            loaded(&mut catalog, view(number), 10);
            catalog.acquire(view(number), false).unwrap();
        }
        assert_eq!(catalog.recency_order(), vec![view(3), view(2), view(1)]);
        catalog.acquire(view(1), false).unwrap();
        assert_eq!(catalog.recency_order(), vec![view(1), view(3), view(2)]);
        assert_eq!(catalog.enqueued_bytes(), 30);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut catalog = Catalog::new(25);
        for number in 1..=3 {
            loaded(&mut catalog, view(number), 10);
            catalog.acquire(view(number), false).unwrap();
        }
        assert_eq!(catalog.get(&view(1)).unwrap().state(), ResidencyState::Unloaded);
        assert_eq!(catalog.get(&view(2)).unwrap().state(), ResidencyState::Enqueued);
        assert_eq!(catalog.enqueued_bytes(), 20);
    }

    #[test]
    fn locked_entries_are_never_evicted() {
        let mut catalog = Catalog::new(5);
        loaded(&mut catalog, view(1), 10);
        catalog.acquire(view(1), true).unwrap();
        loaded(&mut catalog, view(2), 10);
        let data = catalog.acquire(view(2), false).unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(catalog.get(&view(1)).unwrap().state(), ResidencyState::Locked);
        assert_eq!(catalog.get(&view(2)).unwrap().state(), ResidencyState::Unloaded);
        assert_eq!(catalog.enqueued_bytes(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire { number: u16, lock: bool },
        Release { number: u16 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..6, any::<bool>()).prop_map(|(number, lock)| Op::Acquire { number, lock }),
            (0u16..6).prop_map(|number| Op::Release { number }),
        ]
    }

    proptest! {
        #[test]
        fn accounting_matches_residency(
            ops in prop::collection::vec(op_strategy(), 0..64),
            ceiling in 0usize..64,
        ) {
            let mut catalog = Catalog::new(ceiling);
            for number in 0..6 {
                catalog.insert(view(number), location(Placement::Volume));
            }
            for op in ops {
                match op {
                    Op::Acquire { number, lock } => {
                        let id = view(number);
                        if catalog.get(&id).unwrap().state() == ResidencyState::Unloaded {
                            catalog.store(id, Bytes::from(vec![0; usize::from(number) * 4 + 1]));
                        }
                        prop_assert!(catalog.acquire(id, lock).is_some());
                    }
                    Op::Release { number } => {
                        catalog.release(view(number));
                    }
                }

                let resident = |state| -> usize {
                    catalog
                        .entries
                        .values()
                        .filter(|entry| entry.state() == state)
                        .map(|entry| entry.residency().resident_bytes())
                        .sum()
                };
                let enqueued = resident(ResidencyState::Enqueued);
                let locked = resident(ResidencyState::Locked);
                prop_assert_eq!(catalog.enqueued_bytes(), enqueued);
                prop_assert_eq!(catalog.locked_bytes(), locked);
                prop_assert!(catalog.enqueued_bytes() <= ceiling);
                prop_assert_eq!(catalog.recency.len(), catalog
                    .entries
                    .values()
                    .filter(|entry| entry.state() == ResidencyState::Enqueued)
                    .count());
            }
        }
    }
}
