//! # Systems
//!
//! A system is a named callback bound to one lifecycle event. It declares the
//! components it requires through a [`Signature`] and runs over exactly the
//! entities whose signature satisfies that requirement.
//!
//! ## Membership
//!
//! Each system keeps its matched entities both as a dense list (iteration
//! order) and as an entity -> position map (O(1) membership and removal). The
//! scene keeps the lists current on every component add, remove and entity
//! deletion, which costs O(systems) per mutation. With at most 32 component
//! types per scene this is a deliberate scale bound.
//!
//! ## Invocation
//!
//! The callback receives a [`SystemContext`]. It can read and write component
//! records in place, but structural changes go through the context's
//! [`CommandQueue`] and are applied once the callback returns.

use std::any::Any;
use std::collections::HashMap;

use super::commands::CommandQueue;
use super::component::{Component, ComponentRegistry};
use super::entity::{EntityId, EntityTable};
use super::signature::Signature;
use crate::error::{EcsError, EcsResult};

/// Lifecycle event a system is dispatched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleEvent {
    /// Runs once when the host initializes the scene.
    OnInit = 0,
    /// Runs every frame.
    OnUpdate = 1,
    /// Runs once when the host shuts the scene down.
    OnEnd = 2,
}

impl LifecycleEvent {
    /// Number of lifecycle events.
    pub const COUNT: usize = 3;

    /// All events in dispatch-table order.
    pub const ALL: [Self; Self::COUNT] = [Self::OnInit, Self::OnUpdate, Self::OnEnd];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for LifecycleEvent {
    type Error = EcsError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(EcsError::UnknownEvent(tag))
    }
}

/// Signature of a system callback.
pub type SystemFn = fn(&mut SystemContext<'_>) -> EcsResult<()>;

/// Outcome of a system's most recent invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SystemStatus {
    /// The system has not run yet.
    #[default]
    Pending,
    /// The last invocation succeeded.
    Succeeded,
    /// The last invocation failed.
    Failed(EcsError),
}

impl SystemStatus {
    /// Returns `true` if the last invocation succeeded.
    #[inline]
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl From<EcsResult<()>> for SystemStatus {
    fn from(result: EcsResult<()>) -> Self {
        match result {
            Ok(()) => Self::Succeeded,
            Err(err) => Self::Failed(err),
        }
    }
}

/// View of the scene handed to a running system.
///
/// Component records can be read and written in place. Adding or removing
/// components and deleting entities is recorded in a command queue and
/// applied after the system returns.
pub struct SystemContext<'a> {
    entities: &'a [EntityId],
    args: Option<&'a (dyn Any + 'static)>,
    table: &'a EntityTable,
    components: &'a mut ComponentRegistry,
    commands: &'a mut CommandQueue,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        entities: &'a [EntityId],
        args: Option<&'a (dyn Any + 'static)>,
        table: &'a EntityTable,
        components: &'a mut ComponentRegistry,
        commands: &'a mut CommandQueue,
    ) -> Self {
        Self {
            entities,
            args,
            table,
            components,
            commands,
        }
    }

    /// Returns the entities matched by this system.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &'a [EntityId] {
        self.entities
    }

    /// Returns the number of matched entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is matched.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the parameters set for this system, if they are a `T`.
    #[inline]
    #[must_use]
    pub fn args<T: Any>(&self) -> Option<&'a T> {
        self.args?.downcast_ref()
    }

    /// Returns an entity's current signature.
    #[must_use]
    pub fn signature(&self, entity: EntityId) -> Option<Signature> {
        self.table.signature(entity)
    }

    /// Gets an entity's component.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get`].
    pub fn get<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        self.components.get(entity)
    }

    /// Gets an entity's component mutably.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_mut`].
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        self.components.get_mut(entity)
    }

    /// Gets the raw bytes of a named component.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_bytes`].
    pub fn get_bytes(&self, entity: EntityId, name: &str) -> EcsResult<&[u8]> {
        self.components.get_bytes(entity, name)
    }

    /// Gets the raw bytes of a named component mutably.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_bytes_mut`].
    pub fn get_bytes_mut(&mut self, entity: EntityId, name: &str) -> EcsResult<&mut [u8]> {
        self.components.get_bytes_mut(entity, name)
    }

    /// Checks if an entity owns a typed component.
    #[must_use]
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        self.components.has(entity, C::NAME)
    }

    /// Returns the queue for structural changes.
    #[inline]
    pub fn commands(&mut self) -> &mut CommandQueue {
        &mut *self.commands
    }
}

struct SystemRecord {
    name: String,
    callback: SystemFn,
    signature: Signature,
    event: LifecycleEvent,
    args: Option<Box<dyn Any>>,
    matched: Vec<EntityId>,
    positions: HashMap<EntityId, usize>,
    status: SystemStatus,
}

impl SystemRecord {
    fn insert(&mut self, entity: EntityId) -> bool {
        if self.positions.contains_key(&entity) {
            return false;
        }
        self.positions.insert(entity, self.matched.len());
        self.matched.push(entity);
        true
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        let Some(position) = self.positions.remove(&entity) else {
            return false;
        };
        self.matched.swap_remove(position);
        if let Some(&moved) = self.matched.get(position) {
            self.positions.insert(moved, position);
        }
        true
    }
}

/// Borrowed pieces of a system needed to invoke it.
pub(crate) struct Invocation<'a> {
    pub callback: SystemFn,
    pub entities: &'a [EntityId],
    pub args: Option<&'a (dyn Any + 'static)>,
}

/// Registered systems of one scene, in registration order.
#[derive(Default)]
pub struct SystemRegistry {
    records: Vec<SystemRecord>,
    name_to_index: HashMap<String, usize>,
    dispatch: [Vec<usize>; LifecycleEvent::COUNT],
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Checks if a system is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Iterates over system names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    /// Iterates over the names bound to `event` in dispatch order.
    pub fn names_for(&self, event: LifecycleEvent) -> impl Iterator<Item = &str> {
        self.dispatch[event.index()]
            .iter()
            .map(|&index| self.records[index].name.as_str())
    }

    pub(crate) fn index_of(&self, name: &str) -> EcsResult<usize> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| EcsError::SystemNotFound(name.to_owned()))
    }

    fn record(&self, name: &str) -> EcsResult<&SystemRecord> {
        Ok(&self.records[self.index_of(name)?])
    }

    fn record_mut(&mut self, name: &str) -> EcsResult<&mut SystemRecord> {
        let index = self.index_of(name)?;
        Ok(&mut self.records[index])
    }

    /// Registers a system with an empty matched list.
    ///
    /// Returns the system's index.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`] if the name is taken.
    pub fn register(
        &mut self,
        name: &str,
        callback: SystemFn,
        signature: Signature,
        event: LifecycleEvent,
    ) -> EcsResult<usize> {
        if self.contains(name) {
            return Err(EcsError::SystemAlreadyRegistered(name.to_owned()));
        }
        self.records.try_reserve(1)?;
        self.dispatch[event.index()].try_reserve(1)?;

        let index = self.records.len();
        self.records.push(SystemRecord {
            name: name.to_owned(),
            callback,
            signature,
            event,
            args: None,
            matched: Vec::new(),
            positions: HashMap::new(),
            status: SystemStatus::Pending,
        });
        self.name_to_index.insert(name.to_owned(), index);
        self.dispatch[event.index()].push(index);
        Ok(index)
    }

    /// Removes a system and its matched list.
    ///
    /// Later systems shift down by one; every stored index is fixed up so
    /// dispatch order is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn unregister(&mut self, name: &str) -> EcsResult<()> {
        let index = self.index_of(name)?;
        self.records.remove(index);
        self.name_to_index.remove(name);

        for stored in self.name_to_index.values_mut() {
            if *stored > index {
                *stored -= 1;
            }
        }
        for list in &mut self.dispatch {
            list.retain(|&i| i != index);
            for stored in list.iter_mut() {
                if *stored > index {
                    *stored -= 1;
                }
            }
        }
        Ok(())
    }

    /// Stores the parameters handed to the system on its next invocations.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn set_parameters<T: Any>(&mut self, name: &str, args: T) -> EcsResult<()> {
        self.record_mut(name)?.args = Some(Box::new(args));
        Ok(())
    }

    /// Drops the parameters of a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn clear_parameters(&mut self, name: &str) -> EcsResult<()> {
        self.record_mut(name)?.args = None;
        Ok(())
    }

    /// Returns the status of a system's last invocation.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn status(&self, name: &str) -> EcsResult<&SystemStatus> {
        Ok(&self.record(name)?.status)
    }

    /// Returns the entities currently matched by a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn matched(&self, name: &str) -> EcsResult<&[EntityId]> {
        Ok(&self.record(name)?.matched)
    }

    /// Returns the required signature of a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn signature(&self, name: &str) -> EcsResult<Signature> {
        Ok(self.record(name)?.signature)
    }

    /// Returns the union of every system's required signature.
    #[must_use]
    pub fn required_slots(&self) -> Signature {
        let bits = self
            .records
            .iter()
            .fold(0, |bits, record| bits | record.signature.bits());
        Signature::from_bits(bits)
    }

    /// Returns the lifecycle event a system is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn event(&self, name: &str) -> EcsResult<LifecycleEvent> {
        Ok(self.record(name)?.event)
    }

    pub(crate) fn dispatch_list(&self, event: LifecycleEvent) -> &[usize] {
        &self.dispatch[event.index()]
    }

    pub(crate) fn name_at(&self, index: usize) -> &str {
        &self.records[index].name
    }

    pub(crate) fn invocation(&self, index: usize) -> Invocation<'_> {
        let record = &self.records[index];
        Invocation {
            callback: record.callback,
            entities: &record.matched,
            args: record.args.as_deref(),
        }
    }

    pub(crate) fn set_status(&mut self, index: usize, status: SystemStatus) {
        self.records[index].status = status;
    }

    /// Adds `entity` to every system whose requirement `signature` now meets.
    pub(crate) fn on_component_added(&mut self, entity: EntityId, signature: Signature) {
        for record in &mut self.records {
            if signature.matches(record.signature) && record.insert(entity) {
                tracing::trace!(system = %record.name, %entity, "entity matched");
            }
        }
    }

    /// Drops `entity` from every system whose requirement it no longer meets.
    pub(crate) fn on_component_removed(&mut self, entity: EntityId, signature: Signature) {
        for record in &mut self.records {
            if !signature.matches(record.signature) && record.remove(entity) {
                tracing::trace!(system = %record.name, %entity, "entity unmatched");
            }
        }
    }

    /// Drops `entity` from every system.
    pub(crate) fn forget(&mut self, entity: EntityId) {
        for record in &mut self.records {
            record.remove(entity);
        }
    }

    /// Matches every live entity against one system.
    pub(crate) fn populate(&mut self, index: usize, table: &EntityTable) {
        let record = &mut self.records[index];
        for entity in table.iter() {
            if entity.signature.matches(record.signature) {
                record.insert(entity.id);
            }
        }
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRegistry")
            .field("systems", &self.records.iter().map(|r| &r.name).collect::<Vec<_>>())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}
