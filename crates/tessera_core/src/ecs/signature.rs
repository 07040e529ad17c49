//! # Signatures
//!
//! A signature is a 32-bit mask over component slots. Bit `i` means "has"
//! (for an entity) or "requires" (for a system) the component in slot `i`.
//!
//! A system signature is a subset requirement: an entity matches when it owns
//! at least every required component. Extra components are allowed.

use std::fmt;

use super::component::{Component, ComponentRegistry};
use crate::error::{EcsError, EcsResult};

/// Bit for `slot`, or 0 when the slot is outside the mask.
#[inline]
const fn bit(slot: u8) -> u32 {
    match 1u32.checked_shl(slot as u32) {
        Some(bit) => bit,
        None => 0,
    }
}

/// Bitmask of component slots.
///
/// Slots are `0..32`. Out-of-range slots are never set: they build an empty
/// signature, read as absent and are ignored by `insert` and `remove`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature(u32);

impl Signature {
    /// The empty signature. As a requirement it matches every entity.
    pub const EMPTY: Self = Self(0);

    /// Creates a signature from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Creates a signature with a single slot set.
    #[inline]
    #[must_use]
    pub const fn from_slot(slot: u8) -> Self {
        Self(bit(slot))
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no slot is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Checks if a specific slot is set.
    #[inline]
    #[must_use]
    pub const fn contains_slot(self, slot: u8) -> bool {
        self.0 & bit(slot) != 0
    }

    /// Checks if every slot in `required` is also set here.
    #[inline]
    #[must_use]
    pub const fn matches(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Sets a slot.
    #[inline]
    pub fn insert(&mut self, slot: u8) {
        self.0 |= bit(slot);
    }

    /// Clears a slot.
    #[inline]
    pub fn remove(&mut self, slot: u8) {
        self.0 &= !bit(slot);
    }

    /// Iterates over the set slots in ascending order.
    pub fn slots(self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0..32u8).filter(move |&slot| bits & (1 << slot) != 0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#034b}", self.0)
    }
}

/// Default separator for component name lists.
pub const DEFAULT_DELIMITER: char = ',';

/// Compiles component names into a [`Signature`].
///
/// # Example
///
/// ```rust,ignore
/// let signature = SignatureBuilder::new(scene.components())
///     .with::<Position>()?
///     .with_name("Velocity")?
///     .build();
/// ```
pub struct SignatureBuilder<'a> {
    registry: &'a ComponentRegistry,
    signature: Signature,
}

impl<'a> SignatureBuilder<'a> {
    /// Starts an empty signature resolved against `registry`.
    #[must_use]
    pub fn new(registry: &'a ComponentRegistry) -> Self {
        Self {
            registry,
            signature: Signature::EMPTY,
        }
    }

    /// Adds the slot of a named component type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] if the name is unknown.
    pub fn with_name(mut self, name: &str) -> EcsResult<Self> {
        let slot = self
            .registry
            .slot_of(name)
            .ok_or_else(|| EcsError::ComponentNotRegistered(name.to_owned()))?;
        self.signature.insert(slot);
        Ok(self)
    }

    /// Adds the slot of a typed component.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] if `C` is not registered.
    pub fn with<C: Component>(self) -> EcsResult<Self> {
        self.with_name(C::NAME)
    }

    /// Adds every name of a delimiter-separated list.
    ///
    /// Tokens are trimmed and empty tokens are skipped. The first unknown name
    /// aborts the whole list.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] for the first unknown name.
    pub fn with_list(self, names: &str, delimiter: char) -> EcsResult<Self> {
        names
            .split(delimiter)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .try_fold(self, Self::with_name)
    }

    /// Finishes the build.
    #[must_use]
    pub const fn build(self) -> Signature {
        self.signature
    }
}
