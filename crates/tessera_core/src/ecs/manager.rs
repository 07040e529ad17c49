//! # Scene Manager
//!
//! Owns every scene and tracks which one is bound. Entity, component, signature
//! and system operations are forwarded to the bound scene and fail with
//! [`EcsError::NoSceneBound`] when nothing is bound.
//!
//! Scene ids are recycled oldest-first, like entity ids.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::component::Component;
use super::entity::EntityId;
use super::scene::Scene;
use super::signature::Signature;
use super::system::{LifecycleEvent, SystemFn, SystemStatus};
use crate::config::EcsConfig;
use crate::error::{EcsError, EcsResult};

/// Identifier of a scene owned by a [`SceneManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SceneId(u32);

impl SceneId {
    /// "No scene" sentinel. Binding it unbinds the current scene.
    pub const NONE: Self = Self(u32::MAX);

    /// Creates a scene ID from its raw value.
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

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::NONE {
            f.write_str("none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Owner of all scenes.
#[derive(Debug)]
pub struct SceneManager {
    scenes: HashMap<SceneId, Scene>,
    recycled: VecDeque<SceneId>,
    next_id: u32,
    bound: Option<SceneId>,
    config: EcsConfig,
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new(EcsConfig::default())
    }
}

impl SceneManager {
    /// Creates a manager with no scenes.
    #[must_use]
    pub fn new(config: EcsConfig) -> Self {
        tracing::debug!(membership = ?config.membership, "scene manager initialized");
        Self {
            scenes: HashMap::new(),
            recycled: VecDeque::new(),
            next_id: 0,
            bound: None,
            config,
        }
    }

    /// Returns the configuration applied to new scenes.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EcsConfig {
        &self.config
    }

    /// Returns the number of live scenes.
    #[inline]
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Returns the bound scene's id, or [`SceneId::NONE`].
    #[inline]
    #[must_use]
    pub fn bound_id(&self) -> SceneId {
        self.bound.unwrap_or(SceneId::NONE)
    }

    /// Creates an empty scene. The new scene is not bound.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailure`] if the id space or memory is
    /// exhausted.
    pub fn create_scene(&mut self) -> EcsResult<SceneId> {
        self.scenes.try_reserve(1)?;
        let id = match self.recycled.pop_front() {
            Some(id) => id,
            None => {
                let id = SceneId(self.next_id);
                if id == SceneId::NONE {
                    return Err(EcsError::AllocationFailure("scene id space exhausted".into()));
                }
                self.next_id += 1;
                id
            }
        };

        self.scenes.insert(id, Scene::new(id, &self.config));
        tracing::info!(scene = %id, "scene created");
        Ok(id)
    }

    /// Binds a scene. [`SceneId::NONE`] unbinds.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SceneNotFound`] if the id is not a live scene.
    pub fn bind_scene(&mut self, id: SceneId) -> EcsResult<()> {
        if id == SceneId::NONE {
            self.bound = None;
            return Ok(());
        }
        if !self.scenes.contains_key(&id) {
            return Err(EcsError::SceneNotFound(id));
        }
        self.bound = Some(id);
        tracing::debug!(scene = %id, "scene bound");
        Ok(())
    }

    /// Tears down the bound scene, recycles its id and unbinds.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn free_scene(&mut self) -> EcsResult<()> {
        let id = self.bound.take().ok_or(EcsError::NoSceneBound)?;
        if self.scenes.remove(&id).is_some() {
            self.recycled.push_back(id);
        }
        tracing::info!(scene = %id, "scene freed");
        Ok(())
    }

    /// Frees every scene.
    pub fn terminate(&mut self) {
        if !self.scenes.is_empty() {
            tracing::info!(scenes = self.scenes.len(), "terminating scene manager");
        }
        self.bound = None;
        self.scenes.clear();
        self.recycled.clear();
        self.next_id = 0;
    }

    /// Gets a scene by id.
    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    /// Gets a scene by id mutably.
    #[must_use]
    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.get_mut(&id)
    }

    /// Gets the bound scene.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn bound_scene(&self) -> EcsResult<&Scene> {
        self.bound
            .and_then(|id| self.scenes.get(&id))
            .ok_or(EcsError::NoSceneBound)
    }

    /// Gets the bound scene mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn bound_scene_mut(&mut self) -> EcsResult<&mut Scene> {
        self.bound
            .and_then(|id| self.scenes.get_mut(&id))
            .ok_or(EcsError::NoSceneBound)
    }

    // =========================================================================
    // Bound-scene operations
    //
    // Each fails with `NoSceneBound` first, then as the `Scene` method does.
    // =========================================================================

    /// Creates an entity in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::create_entity`].
    pub fn create_entity(&mut self) -> EcsResult<EntityId> {
        self.bound_scene_mut()?.create_entity()
    }

    /// Deletes an entity from the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::delete_entity`].
    pub fn delete_entity(&mut self, entity: EntityId) -> EcsResult<()> {
        self.bound_scene_mut()?.delete_entity(entity)
    }

    /// Reserves entity capacity in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::reserve_entities`].
    pub fn reserve_entities(&mut self, additional: usize) -> EcsResult<()> {
        self.bound_scene_mut()?.reserve_entities(additional)
    }

    /// Releases unused entity capacity of the bound scene.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn shrink_entities(&mut self) -> EcsResult<()> {
        self.bound_scene_mut()?.shrink_entities();
        Ok(())
    }

    /// Releases unused component capacity of the bound scene.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn shrink_components(&mut self) -> EcsResult<()> {
        self.bound_scene_mut()?.shrink_components();
        Ok(())
    }

    /// Registers a typed component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::register_component`].
    pub fn register_component<C: Component>(&mut self) -> EcsResult<u8> {
        self.bound_scene_mut()?.register_component::<C>()
    }

    /// Registers a named component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::register_component_by_name`].
    pub fn register_component_by_name(&mut self, name: &str, size: usize) -> EcsResult<u8> {
        self.bound_scene_mut()?.register_component_by_name(name, size)
    }

    /// Unregisters a component type from the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::unregister_component`].
    pub fn unregister_component(&mut self, name: &str) -> EcsResult<()> {
        self.bound_scene_mut()?.unregister_component(name)
    }

    /// Attaches a typed component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::add_component`].
    pub fn add_component<C: Component>(&mut self, entity: EntityId, value: C) -> EcsResult<()> {
        self.bound_scene_mut()?.add_component(entity, value)
    }

    /// Attaches a named component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::add_component_by_name`].
    pub fn add_component_by_name(
        &mut self,
        entity: EntityId,
        name: &str,
        data: Option<&[u8]>,
    ) -> EcsResult<()> {
        self.bound_scene_mut()?.add_component_by_name(entity, name, data)
    }

    /// Detaches a typed component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::remove_component`].
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> EcsResult<()> {
        self.bound_scene_mut()?.remove_component::<C>(entity)
    }

    /// Detaches a named component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::remove_component_by_name`].
    pub fn remove_component_by_name(&mut self, entity: EntityId, name: &str) -> EcsResult<()> {
        self.bound_scene_mut()?.remove_component_by_name(entity, name)
    }

    /// Gets a typed component from the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::get_component`].
    pub fn get_component<C: Component>(&self, entity: EntityId) -> EcsResult<&C> {
        self.bound_scene()?.get_component(entity)
    }

    /// Gets a typed component from the bound scene mutably.
    ///
    /// # Errors
    ///
    /// See [`Scene::get_component_mut`].
    pub fn get_component_mut<C: Component>(&mut self, entity: EntityId) -> EcsResult<&mut C> {
        self.bound_scene_mut()?.get_component_mut(entity)
    }

    /// Gets the raw bytes of a named component in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::get_component_bytes`].
    pub fn get_component_bytes(&self, entity: EntityId, name: &str) -> EcsResult<&[u8]> {
        self.bound_scene()?.get_component_bytes(entity, name)
    }

    /// Gets the raw bytes of a named component in the bound scene mutably.
    ///
    /// # Errors
    ///
    /// See [`Scene::get_component_bytes_mut`].
    pub fn get_component_bytes_mut(&mut self, entity: EntityId, name: &str) -> EcsResult<&mut [u8]> {
        self.bound_scene_mut()?.get_component_bytes_mut(entity, name)
    }

    /// Checks if an entity of the bound scene owns a named component.
    ///
    /// Returns `false` when no scene is bound.
    #[must_use]
    pub fn has_component_by_name(&self, entity: EntityId, name: &str) -> bool {
        self.bound_scene()
            .is_ok_and(|scene| scene.has_component_by_name(entity, name))
    }

    /// Checks if an entity of the bound scene owns a typed component.
    ///
    /// Returns `false` when no scene is bound.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: EntityId) -> bool {
        self.has_component_by_name(entity, C::NAME)
    }

    /// Builds a signature against the bound scene's components.
    ///
    /// # Errors
    ///
    /// See [`Scene::build_signature`].
    pub fn build_signature(&self, names: &str) -> EcsResult<Signature> {
        self.bound_scene()?.build_signature(names)
    }

    /// Registers a system in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::register_system`].
    pub fn register_system(
        &mut self,
        name: &str,
        callback: SystemFn,
        signature: Signature,
        event: LifecycleEvent,
    ) -> EcsResult<()> {
        self.bound_scene_mut()?
            .register_system(name, callback, signature, event)
    }

    /// Unregisters a system from the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::unregister_system`].
    pub fn unregister_system(&mut self, name: &str) -> EcsResult<()> {
        self.bound_scene_mut()?.unregister_system(name)
    }

    /// Sets a system's parameters in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::set_system_parameters`].
    pub fn set_system_parameters<T: Any>(&mut self, name: &str, args: T) -> EcsResult<()> {
        self.bound_scene_mut()?.set_system_parameters(name, args)
    }

    /// Drops a system's parameters in the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::clear_system_parameters`].
    pub fn clear_system_parameters(&mut self, name: &str) -> EcsResult<()> {
        self.bound_scene_mut()?.clear_system_parameters(name)
    }

    /// Runs one system of the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::invoke_system`].
    pub fn invoke_system(&mut self, name: &str) -> EcsResult<()> {
        self.bound_scene_mut()?.invoke_system(name)
    }

    /// Runs every system of the bound scene bound to `event`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound.
    pub fn dispatch(&mut self, event: LifecycleEvent) -> EcsResult<()> {
        self.bound_scene_mut()?.dispatch(event);
        Ok(())
    }

    /// Runs every system of the bound scene bound to the event with the given
    /// raw tag.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NoSceneBound`] if nothing is bound, then see
    /// [`Scene::dispatch_tag`].
    pub fn dispatch_tag(&mut self, tag: u8) -> EcsResult<()> {
        self.bound_scene_mut()?.dispatch_tag(tag)
    }

    /// Returns the status of a system of the bound scene.
    ///
    /// # Errors
    ///
    /// See [`Scene::system_status`].
    pub fn system_status(&self, name: &str) -> EcsResult<&SystemStatus> {
        self.bound_scene()?.system_status(name)
    }
}

impl Drop for SceneManager {
    fn drop(&mut self) {
        self.terminate();
    }
}
