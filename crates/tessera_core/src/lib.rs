//! # TESSERA Core Engine
//!
//! Scene-scoped Entity Component System (ECS) kernel:
//! - Up to 32 plain-data component types per scene
//! - Systems matched by component signature, dispatched on lifecycle events
//! - Any number of isolated scenes, one bound at a time
//!
//! ## Architecture Rules
//!
//! 1. **No global state** - All scenes live in an explicit [`SceneManager`]
//! 2. **Data-oriented design** - Components are stored in contiguous arrays
//! 3. **No aliasing** - Systems never mutate structure while iterating; they
//!    queue [`Command`]s instead
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{EcsConfig, LifecycleEvent, SceneManager};
//!
//! let mut ecs = SceneManager::new(EcsConfig::default());
//! let scene = ecs.create_scene()?;
//! ecs.bind_scene(scene)?;
//! ecs.register_component::<Position>()?;
//! let moving = ecs.build_signature("Position")?;
//! ecs.register_system("move", movement, moving, LifecycleEvent::OnUpdate)?;
//! ecs.dispatch(LifecycleEvent::OnUpdate)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::{ConfigError, EcsConfig, MembershipPolicy};
pub use ecs::{
    Command, CommandQueue, Component, ComponentRegistry, ComponentStorage, EntityId,
    EntityRecord, EntityTable, LifecycleEvent, Scene, SceneId, SceneManager, Signature,
    SignatureBuilder, SystemContext, SystemFn, SystemRegistry, SystemStatus, MAX_COMPONENTS,
};
pub use error::{EcsError, EcsResult, ErrorKind};
