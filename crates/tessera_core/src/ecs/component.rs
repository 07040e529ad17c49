//! # Component System
//!
//! Components are fixed-size plain data records identified by name. Each scene
//! can register up to [`MAX_COMPONENTS`] types at once; the limit is structural
//! because signatures are 32-bit masks.
//!
//! The registry is type-erased: it only knows names, slot numbers and record
//! sizes. Typed access goes through the [`Component`] trait, which checks the
//! registered size before reinterpreting bytes.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use super::entity::EntityId;
use super::signature::Signature;
use super::storage::{ComponentStorage, MAX_COMPONENT_ALIGN};
use crate::error::{EcsError, EcsResult};

/// Maximum number of component types registered at once per scene.
pub const MAX_COMPONENTS: usize = 32;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Pod`: Plain old data, safe to view as bytes
/// - `Zeroable`: A zero-filled record is a valid default
/// - at most [`MAX_COMPONENT_ALIGN`]-aligned
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// tessera_core::component!(Position);
/// ```
pub trait Component: Pod + Zeroable + 'static {
    /// Name the type is registered under.
    const NAME: &'static str;
}

/// Implements [`Component`] for one or more types, named after the type.
#[macro_export]
macro_rules! component {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::Component for $ty {
                const NAME: &'static str = stringify!($ty);
            }
        )+
    };
}

/// One registered component type.
#[derive(Debug)]
struct ComponentSlot {
    name: String,
    storage: ComponentStorage,
}

/// Name-addressed registry of component slots.
#[derive(Debug)]
pub struct ComponentRegistry {
    slots: [Option<ComponentSlot>; MAX_COMPONENTS],
    name_to_slot: HashMap<String, u8>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Creates a registry with every slot free.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            name_to_slot: HashMap::new(),
        }
    }

    /// Returns the number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_to_slot.len()
    }

    /// Returns `true` if no component type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_to_slot.is_empty()
    }

    /// Returns the slot of a registered type.
    #[inline]
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<u8> {
        self.name_to_slot.get(name).copied()
    }

    /// Returns the name registered in `slot`.
    #[must_use]
    pub fn name_of(&self, slot: u8) -> Option<&str> {
        self.slots
            .get(usize::from(slot))?
            .as_ref()
            .map(|s| s.name.as_str())
    }

    /// Gets the dense storage of a registered type.
    #[must_use]
    pub fn storage(&self, name: &str) -> Option<&ComponentStorage> {
        let slot = self.slot_of(name)?;
        self.slots[usize::from(slot)].as_ref().map(|s| &s.storage)
    }

    fn storage_mut(&mut self, name: &str) -> Option<&mut ComponentStorage> {
        let slot = self.slot_of(name)?;
        self.slots[usize::from(slot)].as_mut().map(|s| &mut s.storage)
    }

    /// Registers a component type of `size` bytes in the first free slot.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentAlreadyRegistered`] if the name is taken
    /// - [`EcsError::CapacityExceeded`] if all slots are in use
    pub fn register(&mut self, name: &str, size: usize) -> EcsResult<u8> {
        self.register_reserving(name, size, Signature::EMPTY)
    }

    /// Registers a component type in the first free slot not set in
    /// `reserved`.
    ///
    /// A slot freed by [`unregister`](Self::unregister) can still be named by
    /// system signatures; passing those as `reserved` keeps it out of use
    /// until no signature refers to it.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentAlreadyRegistered`] if the name is taken
    /// - [`EcsError::CapacityExceeded`] if every unreserved slot is in use
    pub fn register_reserving(
        &mut self,
        name: &str,
        size: usize,
        reserved: Signature,
    ) -> EcsResult<u8> {
        if self.name_to_slot.contains_key(name) {
            return Err(EcsError::ComponentAlreadyRegistered(name.to_owned()));
        }

        let slot = (0..MAX_COMPONENTS)
            .filter_map(|free| u8::try_from(free).ok())
            .find(|&slot| self.slots[usize::from(slot)].is_none() && !reserved.contains_slot(slot))
            .ok_or(EcsError::CapacityExceeded { max: MAX_COMPONENTS })?;

        self.name_to_slot.try_reserve(1)?;
        self.slots[usize::from(slot)] = Some(ComponentSlot {
            name: name.to_owned(),
            storage: ComponentStorage::new(size),
        });
        self.name_to_slot.insert(name.to_owned(), slot);
        Ok(slot)
    }

    /// Registers a typed component.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register), plus
    /// [`EcsError::UnsupportedAlignment`] for over-aligned types.
    pub fn register_typed<C: Component>(&mut self) -> EcsResult<u8> {
        self.register_typed_reserving::<C>(Signature::EMPTY)
    }

    /// Registers a typed component outside the `reserved` slots.
    ///
    /// # Errors
    ///
    /// Same as [`register_reserving`](Self::register_reserving), plus
    /// [`EcsError::UnsupportedAlignment`] for over-aligned types.
    pub fn register_typed_reserving<C: Component>(&mut self, reserved: Signature) -> EcsResult<u8> {
        let align = std::mem::align_of::<C>();
        if align > MAX_COMPONENT_ALIGN {
            return Err(EcsError::UnsupportedAlignment {
                component: C::NAME.to_owned(),
                align,
                max: MAX_COMPONENT_ALIGN,
            });
        }
        self.register_reserving(C::NAME, std::mem::size_of::<C>(), reserved)
    }

    /// Frees a slot and drops all of its records.
    ///
    /// Returns the freed slot so the caller can clear it from signatures.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] if the name is unknown.
    pub fn unregister(&mut self, name: &str) -> EcsResult<u8> {
        let slot = self
            .name_to_slot
            .remove(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?;
        self.slots[usize::from(slot)] = None;
        Ok(slot)
    }

    /// Validates an insertion without mutating anything.
    ///
    /// Returns the slot the record would go to.
    pub(crate) fn check_insert(
        &self,
        entity: EntityId,
        name: &str,
        data: Option<&[u8]>,
    ) -> EcsResult<u8> {
        let slot = self
            .slot_of(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?;
        let storage = &self.slots[usize::from(slot)]
            .as_ref()
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?
            .storage;

        if storage.contains(entity) {
            return Err(EcsError::ComponentAlreadyPresent {
                entity,
                component: name.to_owned(),
            });
        }
        if let Some(bytes) = data {
            if bytes.len() != storage.item_size() {
                return Err(EcsError::SizeMismatch {
                    component: name.to_owned(),
                    expected: storage.item_size(),
                    actual: bytes.len(),
                });
            }
        }
        Ok(slot)
    }

    /// Appends a record for `entity`.
    ///
    /// The record copies `data`, or is zero-filled when `data` is `None`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentNotRegistered`] if the type is unknown
    /// - [`EcsError::ComponentAlreadyPresent`] if the entity owns it already
    /// - [`EcsError::SizeMismatch`] if `data` has the wrong length
    /// - [`EcsError::AllocationFailure`] if the storage cannot grow
    pub fn insert(&mut self, entity: EntityId, name: &str, data: Option<&[u8]>) -> EcsResult<u8> {
        let slot = self.check_insert(entity, name, data)?;
        if let Some(storage) = self.storage_mut(name) {
            storage.push(entity, data)?;
        }
        Ok(slot)
    }

    /// Removes an entity's record with a swap-remove.
    ///
    /// Returns the slot the record was in.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] or
    /// [`EcsError::ComponentNotFound`].
    pub fn remove(&mut self, entity: EntityId, name: &str) -> EcsResult<u8> {
        let slot = self
            .slot_of(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?;
        let removed = self
            .storage_mut(name)
            .is_some_and(|storage| storage.swap_remove(entity));
        if removed {
            Ok(slot)
        } else {
            Err(EcsError::ComponentNotFound {
                entity,
                component: name.to_owned(),
            })
        }
    }

    /// Removes whatever record `entity` has in `slot`, if any.
    pub(crate) fn remove_slot(&mut self, entity: EntityId, slot: u8) -> bool {
        self.slots
            .get_mut(usize::from(slot))
            .and_then(Option::as_mut)
            .is_some_and(|s| s.storage.swap_remove(entity))
    }

    /// Checks if an entity owns a named component. Never fails.
    #[must_use]
    pub fn has(&self, entity: EntityId, name: &str) -> bool {
        self.storage(name).is_some_and(|s| s.contains(entity))
    }

    /// Gets the raw bytes of an entity's component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] or
    /// [`EcsError::ComponentNotFound`].
    pub fn get_bytes(&self, entity: EntityId, name: &str) -> EcsResult<&[u8]> {
        self.storage(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?
            .get_bytes(entity)
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: name.to_owned(),
            })
    }

    /// Gets the raw bytes of an entity's component mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] or
    /// [`EcsError::ComponentNotFound`].
    pub fn get_bytes_mut(&mut self, entity: EntityId, name: &str) -> EcsResult<&mut [u8]> {
        self.storage_mut(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?
            .get_bytes_mut(entity)
            .ok_or_else(|| EcsError::ComponentNotFound {
                entity,
                component: name.to_owned(),
            })
    }

    fn check_layout<C: Component>(&self) -> EcsResult<()> {
        let storage = self
            .storage(C::NAME)
            .ok_or_else(|| EcsError::ComponentNotRegistered(C::NAME.to_owned()))?;
        let actual = std::mem::size_of::<C>();
        if storage.item_size() != actual || std::mem::align_of::<C>() > MAX_COMPONENT_ALIGN {
            return Err(EcsError::SizeMismatch {
                component: C::NAME.to_owned(),
                expected: storage.item_size(),
                actual,
            });
        }
        Ok(())
    }

    /// Gets an entity's component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`],
    /// [`EcsError::SizeMismatch`] or [`EcsError::ComponentNotFound`].
    pub fn get<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        self.check_layout::<C>()?;
        self.get_bytes(entity, C::NAME).map(bytemuck::from_bytes)
    }

    /// Gets an entity's component mutably.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        self.check_layout::<C>()?;
        self.get_bytes_mut(entity, C::NAME).map(bytemuck::from_bytes_mut)
    }

    /// Releases unused capacity of every registered type.
    pub fn shrink(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.storage.shrink();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health {
        value: u32,
    }

    crate::component!(Position, Health);

    #[test]
    fn test_register_assigns_first_free_slot() {
        let mut registry = ComponentRegistry::new();
        assert_eq!(registry.register_typed::<Position>().unwrap(), 0);
        assert_eq!(registry.register_typed::<Health>().unwrap(), 1);

        registry.unregister("Position").unwrap();
        assert_eq!(registry.register("Mass", 4).unwrap(), 0);
        assert_eq!(registry.name_of(0), Some("Mass"));
    }

    #[test]
    fn test_register_skips_reserved_slots() {
        let mut registry = ComponentRegistry::new();
        registry.register("Armor", 4).unwrap();
        registry.register("Mass", 4).unwrap();
        registry.unregister("Armor").unwrap();

        let reserved = Signature::from_slot(0);
        assert_eq!(registry.register_reserving("Poison", 4, reserved).unwrap(), 2);
        assert_eq!(registry.name_of(0), None);

        assert_eq!(
            registry.register_reserving("Shield", 4, Signature::from_bits(u32::MAX)),
            Err(EcsError::CapacityExceeded { max: MAX_COMPONENTS })
        );
        assert_eq!(registry.register("Shield", 4).unwrap(), 0);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = ComponentRegistry::new();
        registry.register_typed::<Position>().unwrap();
        assert_eq!(
            registry.register("Position", 8),
            Err(EcsError::ComponentAlreadyRegistered("Position".into()))
        );
    }

    #[test]
    fn test_register_out_of_slots() {
        let mut registry = ComponentRegistry::new();
        for i in 0..MAX_COMPONENTS {
            registry.register(&format!("C{i}"), 4).unwrap();
        }
        assert_eq!(
            registry.register("One too many", 4),
            Err(EcsError::CapacityExceeded { max: MAX_COMPONENTS })
        );
    }

    #[test]
    fn test_typed_round_trip() {
        let mut registry = ComponentRegistry::new();
        registry.register_typed::<Position>().unwrap();
        let entity = EntityId::new(9);

        let pos = Position { x: 3.0, y: -1.0 };
        registry.insert(entity, Position::NAME, Some(bytemuck::bytes_of(&pos))).unwrap();
        assert_eq!(registry.get::<Position>(entity), Ok(&pos));

        registry.get_mut::<Position>(entity).unwrap().x = 5.0;
        assert_eq!(registry.get::<Position>(entity).unwrap().x, 5.0);

        registry.remove(entity, "Position").unwrap();
        assert!(!registry.has(entity, "Position"));
        assert!(registry.get::<Position>(entity).unwrap_err().is_not_found());
    }

    #[test]
    fn test_insert_rejects_duplicates_and_bad_sizes() {
        let mut registry = ComponentRegistry::new();
        registry.register_typed::<Health>().unwrap();
        let entity = EntityId::new(0);

        assert!(matches!(
            registry.insert(entity, "Health", Some(&[0u8; 2])),
            Err(EcsError::SizeMismatch { expected: 4, actual: 2, .. })
        ));
        registry.insert(entity, "Health", None).unwrap();
        assert_eq!(registry.get::<Health>(entity), Ok(&Health::default()));
        assert!(matches!(
            registry.insert(entity, "Health", None),
            Err(EcsError::ComponentAlreadyPresent { .. })
        ));
    }

    #[test]
    fn test_typed_access_checks_size() {
        let mut registry = ComponentRegistry::new();
        registry.register("Position", 12).unwrap();
        let entity = EntityId::new(0);
        registry.insert(entity, "Position", None).unwrap();

        assert!(matches!(
            registry.get::<Position>(entity),
            Err(EcsError::SizeMismatch { expected: 12, actual: 8, .. })
        ));
    }

    #[test]
    fn test_has_never_fails() {
        let registry = ComponentRegistry::new();
        assert!(!registry.has(EntityId::new(0), "Unknown"));
    }
}
