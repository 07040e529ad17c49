//! # Scenes
//!
//! A scene is one isolated world: an entity table, a component registry and a
//! system registry. All structural operations go through the scene so the
//! three stay consistent:
//!
//! - every live entity's signature mirrors the records it owns
//! - every system's matched list mirrors the signatures (under the eager
//!   membership policy)

use std::any::Any;

use bytemuck::bytes_of;

use super::commands::{Command, CommandQueue};
use super::component::{Component, ComponentRegistry};
use super::entity::{EntityId, EntityTable};
use super::manager::SceneId;
use super::signature::{Signature, SignatureBuilder};
use super::system::{LifecycleEvent, SystemContext, SystemFn, SystemRegistry, SystemStatus};
use crate::config::{EcsConfig, MembershipPolicy};
use crate::error::{EcsError, EcsResult};

/// One isolated ECS world.
#[derive(Debug)]
pub struct Scene {
    id: SceneId,
    entities: EntityTable,
    components: ComponentRegistry,
    systems: SystemRegistry,
    membership: MembershipPolicy,
    delimiter: char,
}

impl Scene {
    /// Creates an empty scene configured by `config`.
    #[must_use]
    pub fn new(id: SceneId, config: &EcsConfig) -> Self {
        Self {
            id,
            entities: EntityTable::with_capacity(config.initial_entity_capacity),
            components: ComponentRegistry::new(),
            systems: SystemRegistry::new(),
            membership: config.membership,
            delimiter: config.signature_delimiter,
        }
    }

    /// Returns this scene's id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SceneId {
        self.id
    }

    /// Returns the entity table.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &EntityTable {
        &self.entities
    }

    /// Returns the component registry.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Returns the system registry.
    #[inline]
    #[must_use]
    pub const fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with no components.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailure`] if the table cannot grow.
    pub fn create_entity(&mut self) -> EcsResult<EntityId> {
        let entity = self.entities.create()?;
        if self.membership == MembershipPolicy::Eager {
            self.systems.on_component_added(entity, Signature::EMPTY);
        }
        tracing::trace!(scene = %self.id, %entity, "entity created");
        Ok(entity)
    }

    /// Deletes an entity, its components and its system memberships.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] if the entity is not alive.
    pub fn delete_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        let signature = self
            .entities
            .signature(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;

        for slot in signature.slots() {
            self.detach(entity, slot);
        }
        self.systems.forget(entity);
        self.entities.remove(entity)?;

        tracing::trace!(scene = %self.id, %entity, "entity deleted");
        Ok(())
    }

    /// Drops the record in `slot` and updates signature and memberships.
    fn detach(&mut self, entity: EntityId, slot: u8) {
        self.components.remove_slot(entity, slot);
        if let Some(signature) = self.entities.signature_mut(entity) {
            signature.remove(slot);
            let updated = *signature;
            self.systems.on_component_removed(entity, updated);
        }
    }

    /// Reserves room for at least `additional` more entities.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailure`] if the memory cannot be reserved.
    pub fn reserve_entities(&mut self, additional: usize) -> EcsResult<()> {
        self.entities.reserve(additional)
    }

    /// Releases entity capacity that is not in use.
    pub fn shrink_entities(&mut self) {
        self.entities.shrink();
    }

    /// Releases component capacity that is not in use.
    pub fn shrink_components(&mut self) {
        self.components.shrink();
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a typed component.
    ///
    /// Slots still required by a registered system are skipped, so a system
    /// never starts matching a component type it was not built against.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register_typed_reserving`].
    pub fn register_component<C: Component>(&mut self) -> EcsResult<u8> {
        let reserved = self.systems.required_slots();
        let slot = self.components.register_typed_reserving::<C>(reserved)?;
        tracing::debug!(scene = %self.id, component = C::NAME, slot, "component registered");
        Ok(slot)
    }

    /// Registers a component type of `size` bytes by name.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register_reserving`].
    pub fn register_component_by_name(&mut self, name: &str, size: usize) -> EcsResult<u8> {
        let reserved = self.systems.required_slots();
        let slot = self.components.register_reserving(name, size, reserved)?;
        tracing::debug!(scene = %self.id, component = name, slot, size, "component registered");
        Ok(slot)
    }

    /// Unregisters a component type, detaching it from every entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] if the name is unknown.
    pub fn unregister_component(&mut self, name: &str) -> EcsResult<()> {
        let slot = self.components.unregister(name)?;

        let owners: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|record| record.signature.contains_slot(slot))
            .map(|record| record.id)
            .collect();
        self.entities.clear_slot(slot);
        for entity in owners {
            if let Some(signature) = self.entities.signature(entity) {
                self.systems.on_component_removed(entity, signature);
            }
        }

        let dependents: Vec<&str> = self
            .systems
            .names()
            .filter(|system| {
                self.systems
                    .signature(system)
                    .is_ok_and(|signature| signature.contains_slot(slot))
            })
            .collect();
        if !dependents.is_empty() {
            tracing::warn!(
                scene = %self.id,
                component = name,
                systems = ?dependents,
                "unregistered component is still required by systems; its slot stays reserved"
            );
        }

        tracing::debug!(scene = %self.id, component = name, slot, "component unregistered");
        Ok(())
    }

    /// Attaches a typed component to an entity.
    ///
    /// # Errors
    ///
    /// See [`add_component_by_name`](Self::add_component_by_name).
    pub fn add_component<C: Component>(&mut self, entity: EntityId, value: C) -> EcsResult<()> {
        self.add_component_by_name(entity, C::NAME, Some(bytes_of(&value)))
    }

    /// Attaches a named component to an entity.
    ///
    /// The record copies `data`, or is zero-filled when `data` is `None`.
    /// Systems whose requirement the entity now meets pick it up before this
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if the entity is not alive
    /// - [`EcsError::ComponentNotRegistered`] if the type is unknown
    /// - [`EcsError::ComponentAlreadyPresent`] if the entity owns it already
    /// - [`EcsError::SizeMismatch`] if `data` has the wrong length
    pub fn add_component_by_name(
        &mut self,
        entity: EntityId,
        name: &str,
        data: Option<&[u8]>,
    ) -> EcsResult<()> {
        if !self.entities.contains(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }
        let slot = self.components.insert(entity, name, data)?;

        if let Some(signature) = self.entities.signature_mut(entity) {
            signature.insert(slot);
            let updated = *signature;
            self.systems.on_component_added(entity, updated);
        }
        tracing::trace!(scene = %self.id, %entity, component = name, "component added");
        Ok(())
    }

    /// Detaches a typed component from an entity.
    ///
    /// # Errors
    ///
    /// See [`remove_component_by_name`](Self::remove_component_by_name).
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> EcsResult<()> {
        self.remove_component_by_name(entity, C::NAME)
    }

    /// Detaches a named component from an entity.
    ///
    /// The last record of the type moves into the freed position. Systems
    /// whose requirement the entity no longer meets drop it before this
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] if the entity is not alive
    /// - [`EcsError::ComponentNotRegistered`] if the type is unknown
    /// - [`EcsError::ComponentNotFound`] if the entity does not own it
    pub fn remove_component_by_name(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        if !self.entities.contains(entity) {
            return Err(EcsError::EntityNotFound(entity));
        }
        let slot = self.components.remove(entity, name)?;

        if let Some(signature) = self.entities.signature_mut(entity) {
            signature.remove(slot);
            let updated = *signature;
            self.systems.on_component_removed(entity, updated);
        }
        tracing::trace!(scene = %self.id, %entity, component = name, "component removed");
        Ok(())
    }

    /// Gets an entity's component.
    ///
    /// The borrow ends before the next structural change of the scene.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get`].
    pub fn get_component<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        self.components.get(entity)
    }

    /// Gets an entity's component mutably.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_mut`].
    pub fn get_component_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        self.components.get_mut(entity)
    }

    /// Gets the raw bytes of a named component.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_bytes`].
    pub fn get_component_bytes(&self, entity: EntityId, name: &str) -> EcsResult<&[u8]> {
        self.components.get_bytes(entity, name)
    }

    /// Gets the raw bytes of a named component mutably.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::get_bytes_mut`].
    pub fn get_component_bytes_mut(&mut self, entity: EntityId, name: &str) -> EcsResult<&mut [u8]> {
        self.components.get_bytes_mut(entity, name)
    }

    /// Checks if an entity owns a typed component.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        self.components.has(entity, C::NAME)
    }

    /// Checks if an entity owns a named component. Never fails.
    #[must_use]
    pub fn has_component_by_name(&self, entity: EntityId, name: &str) -> bool {
        self.components.has(entity, name)
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    /// Builds a signature from a delimiter-separated list of component names.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`] for the first unknown name.
    pub fn build_signature(&self, names: &str) -> EcsResult<Signature> {
        Ok(self.signature_builder().with_list(names, self.delimiter)?.build())
    }

    /// Starts a signature resolved against this scene's components.
    #[must_use]
    pub fn signature_builder(&self) -> SignatureBuilder<'_> {
        SignatureBuilder::new(&self.components)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a system on a lifecycle event.
    ///
    /// Under [`MembershipPolicy::Eager`] every live entity is matched right
    /// away; under [`MembershipPolicy::Lazy`] the matched list starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`] if the name is taken.
    pub fn register_system(
        &mut self,
        name: &str,
        callback: SystemFn,
        signature: Signature,
        event: LifecycleEvent,
    ) -> EcsResult<()> {
        let index = self.systems.register(name, callback, signature, event)?;
        if self.membership == MembershipPolicy::Eager {
            self.systems.populate(index, &self.entities);
        }
        tracing::debug!(scene = %self.id, system = name, %signature, ?event, "system registered");
        Ok(())
    }

    /// Unregisters a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn unregister_system(&mut self, name: &str) -> EcsResult<()> {
        self.systems.unregister(name)?;
        tracing::debug!(scene = %self.id, system = name, "system unregistered");
        Ok(())
    }

    /// Sets the parameters handed to a system on its next invocations.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn set_system_parameters<T: Any>(&mut self, name: &str, args: T) -> EcsResult<()> {
        self.systems.set_parameters(name, args)
    }

    /// Drops the parameters of a system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn clear_system_parameters(&mut self, name: &str) -> EcsResult<()> {
        self.systems.clear_parameters(name)
    }

    /// Runs one system over its matched entities.
    ///
    /// The callback's outcome is recorded, not returned; read it back with
    /// [`system_status`](Self::system_status).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn invoke_system(&mut self, name: &str) -> EcsResult<()> {
        let index = self.systems.index_of(name)?;
        self.run_system(index);
        Ok(())
    }

    /// Runs every system bound to `event`, in registration order.
    ///
    /// A failing system does not stop the ones after it.
    pub fn dispatch(&mut self, event: LifecycleEvent) {
        let count = self.systems.dispatch_list(event).len();
        tracing::trace!(scene = %self.id, ?event, systems = count, "dispatching");
        for position in 0..count {
            let index = self.systems.dispatch_list(event)[position];
            self.run_system(index);
        }
    }

    /// Runs every system bound to the event with the given raw tag.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEvent`] if the tag is not an event.
    pub fn dispatch_tag(&mut self, tag: u8) -> EcsResult<()> {
        self.dispatch(LifecycleEvent::try_from(tag)?);
        Ok(())
    }

    /// Returns the status of a system's last invocation.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if the name is unknown.
    pub fn system_status(&self, name: &str) -> EcsResult<&SystemStatus> {
        self.systems.status(name)
    }

    fn run_system(&mut self, index: usize) {
        let mut queue = CommandQueue::new();
        let result = {
            let invocation = self.systems.invocation(index);
            let mut context = SystemContext::new(
                invocation.entities,
                invocation.args,
                &self.entities,
                &mut self.components,
                &mut queue,
            );
            (invocation.callback)(&mut context)
        };

        let mut status = SystemStatus::from(result);
        if let Err(err) = self.apply_commands(&mut queue) {
            if status.is_succeeded() {
                status = SystemStatus::Failed(err);
            }
        }

        if let SystemStatus::Failed(err) = &status {
            tracing::warn!(
                scene = %self.id,
                system = self.systems.name_at(index),
                error = %err,
                "system failed"
            );
        }
        self.systems.set_status(index, status);
    }

    /// Applies queued commands in order. Every command is attempted; the first
    /// error is returned.
    fn apply_commands(&mut self, queue: &mut CommandQueue) -> EcsResult<()> {
        let mut first_error = None;
        for command in queue.drain() {
            let result = match command {
                Command::Add {
                    entity,
                    component,
                    data,
                } => self.add_component_by_name(entity, &component, data.as_deref()),
                Command::Remove { entity, component } => {
                    self.remove_component_by_name(entity, &component)
                }
                Command::Delete { entity } => self.delete_entity(entity),
            };
            if let Err(err) = result {
                tracing::warn!(scene = %self.id, error = %err, "deferred command failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
