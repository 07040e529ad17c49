//! # Entity Component System
//!
//! A scene-scoped sparse-set ECS.
//!
//! ## Design Philosophy
//!
//! - Every scene is isolated; the [`SceneManager`] owns them all
//! - Components are stored in dense arrays with an entity -> index map
//! - Entity IDs are plain 32-bit values recycled oldest-first
//! - Systems keep their matched entities current on every structural change

mod commands;
mod component;
mod entity;
mod manager;
mod scene;
mod signature;
mod storage;
mod system;

pub use commands::{Command, CommandQueue};
pub use component::{Component, ComponentRegistry, MAX_COMPONENTS};
pub use entity::{EntityId, EntityRecord, EntityTable};
pub use manager::{SceneId, SceneManager};
pub use scene::Scene;
pub use signature::{Signature, SignatureBuilder, DEFAULT_DELIMITER};
pub use storage::{ComponentStorage, MAX_COMPONENT_ALIGN};
pub use system::{LifecycleEvent, SystemContext, SystemFn, SystemRegistry, SystemStatus};
