//! Recency-based deduplication of one record stream.

use std::collections::BTreeMap;

use crate::models::{EntityKey, Keyed, RecencyMarker};

/// What happened to an offered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// First entity seen under its key
    Inserted,
    /// Replaced an entry with an equal or lower marker
    Replaced,
    /// Dropped because the held entry has a higher marker
    Stale,
}

/// Best-known entity per `EntityKey` for a single stream.
///
/// Each concurrent stream owns its own `Deduplicator`; streams are combined
/// with [`Deduplicator::merge`] once they have all completed.
#[derive(Debug)]
pub struct Deduplicator<T: Keyed> {
    season: u16,
    entries: BTreeMap<EntityKey, (RecencyMarker, T)>,
    duplicates: usize,
}

impl<T: Keyed> Deduplicator<T> {
    pub fn new(season: u16) -> Self {
        Self {
            season,
            entries: BTreeMap::new(),
            duplicates: 0,
        }
    }

    /// Offer one entity; ties go to the later offer.
    pub fn offer(&mut self, entity: T, marker: RecencyMarker) -> Offer {
        let key = entity.key(self.season);
        match self.entries.get(&key).map(|(held, _)| *held) {
            None => {
                self.entries.insert(key, (marker, entity));
                Offer::Inserted
            }
            Some(held) if marker >= held => {
                log::debug!("Replacing {} ({:?} -> {:?})", key, held, marker);
                self.duplicates += 1;
                self.entries.insert(key, (marker, entity));
                Offer::Replaced
            }
            Some(held) => {
                log::debug!("Dropping stale {} ({:?} < {:?})", key, marker, held);
                self.duplicates += 1;
                Offer::Stale
            }
        }
    }

    /// Fold another stream's survivors into this one.
    ///
    /// `other` counts as observed after `self`, so it wins marker ties.
    pub fn merge(&mut self, other: Deduplicator<T>) {
        self.duplicates += other.duplicates;
        for (_, (marker, entity)) in other.entries {
            self.offer(entity, marker);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records collapsed into an existing entry so far.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Survivors in the entity's listing order.
    pub fn into_sorted(self) -> Vec<T> {
        let mut items: Vec<T> = self.entries.into_values().map(|(_, e)| e).collect();
        items.sort_by(|a, b| a.listing_cmp(b));
        items
    }
}
