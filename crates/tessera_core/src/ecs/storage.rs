//! # Component Storage
//!
//! Dense, type-erased storage for a single component slot.
//!
//! The storage uses a sparse-set strategy:
//! - Records are packed back to back in one contiguous byte buffer
//! - `entity_to_index` maps an owner to its record
//! - `index_to_entity` maps a record back to its owner
//! - Removal swaps the last record into the hole, so the buffer never has gaps
//!
//! The buffer is backed by `u64` words, so every record starts on an 8-byte
//! boundary whenever the record size is a multiple of its alignment. Typed
//! access reinterprets the bytes through [`bytemuck`].

use std::collections::HashMap;

use bytemuck::Pod;

use super::entity::EntityId;

/// Largest component alignment the storage can serve.
pub const MAX_COMPONENT_ALIGN: usize = std::mem::align_of::<u64>();

const WORD: usize = std::mem::size_of::<u64>();

/// Dense storage for one component type.
///
/// # Example
///
/// ```rust,ignore
/// let mut storage = ComponentStorage::new(8);
/// storage.push(entity, Some(bytemuck::bytes_of(&Position { x: 1.0, y: 2.0 })));
/// let pos: &Position = storage.get(entity).unwrap();
/// ```
#[derive(Debug)]
pub struct ComponentStorage {
    /// Size of one record in bytes.
    item_size: usize,
    /// Backing words. Only the first `len * item_size` bytes are meaningful.
    words: Vec<u64>,
    /// Owner of each record.
    index_to_entity: Vec<EntityId>,
    /// Record of each owner.
    entity_to_index: HashMap<EntityId, usize>,
}

impl ComponentStorage {
    /// Creates empty storage for records of `item_size` bytes.
    #[must_use]
    pub fn new(item_size: usize) -> Self {
        Self {
            item_size,
            words: Vec::new(),
            index_to_entity: Vec::new(),
            entity_to_index: HashMap::new(),
        }
    }

    /// Returns the record size in bytes.
    #[inline]
    #[must_use]
    pub const fn item_size(&self) -> usize {
        self.item_size
    }

    /// Returns the number of stored records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index_to_entity.len()
    }

    /// Returns `true` if no entity owns this component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_to_entity.is_empty()
    }

    /// Checks if an entity owns a record here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entity_to_index.contains_key(&entity)
    }

    /// Returns the dense index of an entity's record.
    #[inline]
    #[must_use]
    pub fn index_of(&self, entity: EntityId) -> Option<usize> {
        self.entity_to_index.get(&entity).copied()
    }

    /// Returns the owner of the record at `index`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, index: usize) -> Option<EntityId> {
        self.index_to_entity.get(index).copied()
    }

    /// Returns the owners in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.index_to_entity
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    #[inline]
    fn range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.item_size;
        start..start + self.item_size
    }

    /// Appends a record for `entity`.
    ///
    /// The record is a copy of `data`, or zero-filled when `data` is `None`.
    /// The caller guarantees that `entity` does not own a record yet and that
    /// `data` is exactly `item_size` bytes long.
    ///
    /// # Errors
    ///
    /// Returns the reservation error if the buffer or index maps cannot grow.
    pub fn push(
        &mut self,
        entity: EntityId,
        data: Option<&[u8]>,
    ) -> Result<usize, std::collections::TryReserveError> {
        debug_assert!(!self.contains(entity), "entity already owns a record");

        let index = self.len();
        let needed_words = ((index + 1) * self.item_size).div_ceil(WORD);
        if needed_words > self.words.len() {
            self.words.try_reserve(needed_words - self.words.len())?;
        }
        self.index_to_entity.try_reserve(1)?;
        self.entity_to_index.try_reserve(1)?;

        self.words.resize(needed_words.max(self.words.len()), 0);
        let range = self.range(index);
        let slot = &mut self.bytes_mut()[range];
        match data {
            Some(bytes) => slot.copy_from_slice(bytes),
            None => slot.fill(0),
        }

        self.index_to_entity.push(entity);
        self.entity_to_index.insert(entity, index);
        Ok(index)
    }

    /// Removes an entity's record by moving the last record into its place.
    ///
    /// Returns `false` if the entity owns no record here.
    pub fn swap_remove(&mut self, entity: EntityId) -> bool {
        let Some(index) = self.entity_to_index.remove(&entity) else {
            return false;
        };
        let last = self.len() - 1;

        if index != last {
            let src = self.range(last);
            let dst = self.range(index).start;
            self.bytes_mut().copy_within(src, dst);

            let moved = self.index_to_entity[last];
            self.index_to_entity[index] = moved;
            self.entity_to_index.insert(moved, index);
        }
        self.index_to_entity.pop();

        let used_words = (self.len() * self.item_size).div_ceil(WORD);
        self.words.truncate(used_words);
        true
    }

    /// Gets the raw bytes of an entity's record.
    #[inline]
    #[must_use]
    pub fn get_bytes(&self, entity: EntityId) -> Option<&[u8]> {
        let index = self.index_of(entity)?;
        Some(&self.bytes()[self.range(index)])
    }

    /// Gets the raw bytes of an entity's record mutably.
    #[inline]
    pub fn get_bytes_mut(&mut self, entity: EntityId) -> Option<&mut [u8]> {
        let index = self.index_of(entity)?;
        let range = self.range(index);
        Some(&mut self.bytes_mut()[range])
    }

    /// Gets an entity's record as `C`.
    ///
    /// The caller guarantees that `C` has the registered size and an alignment
    /// of at most [`MAX_COMPONENT_ALIGN`].
    #[inline]
    #[must_use]
    pub fn get<C: Pod>(&self, entity: EntityId) -> Option<&C> {
        self.get_bytes(entity).map(bytemuck::from_bytes)
    }

    /// Gets an entity's record as `C` mutably.
    #[inline]
    pub fn get_mut<C: Pod>(&mut self, entity: EntityId) -> Option<&mut C> {
        self.get_bytes_mut(entity).map(bytemuck::from_bytes_mut)
    }

    /// Releases buffer capacity beyond the stored records.
    pub fn shrink(&mut self) {
        self.words.shrink_to_fit();
        self.index_to_entity.shrink_to_fit();
        self.entity_to_index.shrink_to_fit();
    }
}
