//! # Entity Management
//!
//! Entities are plain 32-bit identifiers. Each live entity owns one row in a
//! dense, unordered table holding its component signature.
//!
//! Freed identifiers go to a FIFO recycle pool and are handed out again, oldest
//! first, before any new identifier is minted. This keeps the id space compact.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// Unique identifier for an entity within a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this ID.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live entity row: identifier plus the set of owned component slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// The entity identifier.
    pub id: EntityId,
    /// Bitmask of owned component slots.
    pub signature: Signature,
}

impl EntityRecord {
    #[inline]
    const fn new(id: EntityId) -> Self {
        Self {
            id,
            signature: Signature::EMPTY,
        }
    }
}

/// Dense table of live entities with id recycling.
///
/// Row order is unspecified and changes on deletion.
#[derive(Debug, Default)]
pub struct EntityTable {
    /// Live rows, unordered.
    rows: Vec<EntityRecord>,
    /// Freed ids, oldest at the front.
    recycled: VecDeque<EntityId>,
    /// Next never-used id.
    next_id: u32,
    /// id -> row index.
    id_to_row: HashMap<EntityId, usize>,
}

impl EntityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            recycled: VecDeque::new(),
            next_id: 0,
            id_to_row: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no entity is alive.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows that fit without reallocating.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Returns the number of ids waiting to be reused.
    #[inline]
    #[must_use]
    pub fn recycled_len(&self) -> usize {
        self.recycled.len()
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_to_row.contains_key(&id)
    }

    /// Allocates an entity id and appends its row with an empty signature.
    ///
    /// Recycled ids are reused oldest first; new ids are only minted when the
    /// pool is empty.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailure`] if the table cannot grow or the
    /// 32-bit id space is exhausted.
    pub fn create(&mut self) -> EcsResult<EntityId> {
        self.rows.try_reserve(1)?;
        self.id_to_row.try_reserve(1)?;

        let id = match self.recycled.pop_front() {
            Some(id) => id,
            None => {
                let raw = self.next_id;
                self.next_id = raw
                    .checked_add(1)
                    .ok_or_else(|| EcsError::AllocationFailure("entity id space exhausted".into()))?;
                EntityId(raw)
            }
        };

        self.id_to_row.insert(id, self.rows.len());
        self.rows.push(EntityRecord::new(id));
        Ok(id)
    }

    /// Removes an entity row and returns its id to the recycle pool.
    ///
    /// The last row is moved into the freed position. Callers are expected to
    /// have detached every component first; the returned record carries the
    /// signature the row had at removal time.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if the entity is not alive.
    pub fn remove(&mut self, id: EntityId) -> EcsResult<EntityRecord> {
        let row = self.id_to_row.remove(&id).ok_or(EcsError::EntityNotFound(id))?;

        let removed = self.rows.swap_remove(row);
        if let Some(moved) = self.rows.get(row) {
            self.id_to_row.insert(moved.id, row);
        }

        self.recycled.push_back(id);
        Ok(removed)
    }

    /// Returns the signature of a live entity.
    #[inline]
    #[must_use]
    pub fn signature(&self, id: EntityId) -> Option<Signature> {
        self.id_to_row.get(&id).map(|&row| self.rows[row].signature)
    }

    /// Gets a mutable reference to a live entity's signature.
    #[inline]
    pub fn signature_mut(&mut self, id: EntityId) -> Option<&mut Signature> {
        let row = *self.id_to_row.get(&id)?;
        Some(&mut self.rows[row].signature)
    }

    /// Iterates over all live entities in row order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.rows.iter()
    }

    /// Clears `slot` from every live signature.
    pub(crate) fn clear_slot(&mut self, slot: u8) {
        for record in &mut self.rows {
            record.signature.remove(slot);
        }
    }

    /// Reserves room for at least `additional` more entities.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailure`] if the memory cannot be reserved.
    pub fn reserve(&mut self, additional: usize) -> EcsResult<()> {
        self.rows.try_reserve(additional)?;
        self.id_to_row.try_reserve(additional)?;
        Ok(())
    }

    /// Releases capacity not used by live rows or recycled ids.
    pub fn shrink(&mut self) {
        self.rows.shrink_to_fit();
        self.recycled.shrink_to_fit();
        self.id_to_row.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mints_sequential_ids() {
        let mut table = EntityTable::new();
        let ids: Vec<_> = (0..4).map(|_| table.create().unwrap()).collect();
        assert_eq!(ids, (0..4).map(EntityId::new).collect::<Vec<_>>());
        assert_eq!(table.len(), 4);
        assert!(ids.iter().all(|&id| table.signature(id) == Some(Signature::EMPTY)));
    }

    #[test]
    fn test_recycled_ids_reused_oldest_first() {
        let mut table = EntityTable::new();
        for _ in 0..10 {
            table.create().unwrap();
        }
        table.remove(EntityId::new(3)).unwrap();
        table.remove(EntityId::new(7)).unwrap();

        assert_eq!(table.create().unwrap(), EntityId::new(3));
        assert_eq!(table.create().unwrap(), EntityId::new(7));
        assert_eq!(table.create().unwrap(), EntityId::new(10));
    }

    #[test]
    fn test_remove_relocates_last_row() {
        let mut table = EntityTable::new();
        let a = table.create().unwrap();
        let b = table.create().unwrap();
        let c = table.create().unwrap();
        table.signature_mut(c).unwrap().insert(4);

        table.remove(a).unwrap();
        assert!(!table.contains(a));
        assert!(table.contains(b));
        assert_eq!(table.signature(c).map(|s| s.contains_slot(4)), Some(true));
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_remove_unknown_entity() {
        let mut table = EntityTable::new();
        let err = table.remove(EntityId::new(42)).unwrap_err();
        assert_eq!(err, EcsError::EntityNotFound(EntityId::new(42)));
    }

    #[test]
    fn test_reserve_and_shrink() {
        let mut table = EntityTable::new();
        table.reserve(128).unwrap();
        assert!(table.capacity() >= 128);

        table.create().unwrap();
        table.shrink();
        assert!(table.capacity() < 128);
        assert_eq!(table.len(), 1);
    }
}
