//! # ECS Error Types
//!
//! All errors that can occur while operating on a scene.
//!
//! Every variant carries enough context to be logged on its own and maps onto
//! one of the coarse [`ErrorKind`] categories through [`EcsError::kind`].

use thiserror::Error;

use crate::ecs::{EntityId, SceneId};

/// Coarse classification of an [`EcsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced entity, component type, system, scene or event is not alive.
    NotFound,
    /// A duplicate registration or insertion was attempted.
    AlreadyExists,
    /// A required allocation could not be satisfied.
    AllocationFailure,
    /// The fixed component slot limit was reached.
    CapacityExceeded,
    /// A payload or type layout does not match the registered component.
    InvalidArgument,
    /// A system callback reported a failure.
    SystemFailure,
}

/// Errors that can occur in the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity is not alive in the bound scene.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Component type name is not registered in the bound scene.
    #[error("component type not registered: {0}")]
    ComponentNotRegistered(String),

    /// Entity does not own the requested component.
    #[error("entity {entity} has no component {component}")]
    ComponentNotFound {
        /// The entity that was queried.
        entity: EntityId,
        /// The component type name.
        component: String,
    },

    /// System name is not registered in the bound scene.
    #[error("system not registered: {0}")]
    SystemNotFound(String),

    /// Scene id does not refer to a live scene.
    #[error("scene not found: {0}")]
    SceneNotFound(SceneId),

    /// An operation targeted the bound scene while none was bound.
    #[error("no scene is bound")]
    NoSceneBound,

    /// Lifecycle event tag is out of range.
    #[error("unknown lifecycle event tag: {0}")]
    UnknownEvent(u8),

    /// Component type name is already registered.
    #[error("component type already registered: {0}")]
    ComponentAlreadyRegistered(String),

    /// Entity already owns the component.
    #[error("entity {entity} already has component {component}")]
    ComponentAlreadyPresent {
        /// The entity that already owns the component.
        entity: EntityId,
        /// The component type name.
        component: String,
    },

    /// System name is already registered.
    #[error("system already registered: {0}")]
    SystemAlreadyRegistered(String),

    /// A required allocation could not be satisfied.
    #[error("allocation failed: {0}")]
    AllocationFailure(String),

    /// All component slots are in use.
    #[error("component capacity exceeded: at most {max} component types per scene")]
    CapacityExceeded {
        /// The fixed slot limit.
        max: usize,
    },

    /// Payload or type size differs from the registered component size.
    #[error("component {component} is {expected} bytes, got {actual}")]
    SizeMismatch {
        /// The component type name.
        component: String,
        /// Registered size in bytes.
        expected: usize,
        /// Size that was supplied.
        actual: usize,
    },

    /// Component type requires a stricter alignment than storage provides.
    #[error("component {component} requires {align}-byte alignment, storage provides {max}")]
    UnsupportedAlignment {
        /// The component type name.
        component: String,
        /// Alignment of the type.
        align: usize,
        /// Maximum supported alignment.
        max: usize,
    },

    /// A system callback returned a failure.
    #[error("system failed: {0}")]
    SystemFailed(String),
}

impl EcsError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EntityNotFound(_)
            | Self::ComponentNotRegistered(_)
            | Self::ComponentNotFound { .. }
            | Self::SystemNotFound(_)
            | Self::SceneNotFound(_)
            | Self::NoSceneBound
            | Self::UnknownEvent(_) => ErrorKind::NotFound,
            Self::ComponentAlreadyRegistered(_)
            | Self::ComponentAlreadyPresent { .. }
            | Self::SystemAlreadyRegistered(_) => ErrorKind::AlreadyExists,
            Self::AllocationFailure(_) => ErrorKind::AllocationFailure,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::SizeMismatch { .. } | Self::UnsupportedAlignment { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::SystemFailed(_) => ErrorKind::SystemFailure,
        }
    }

    /// Shorthand for `self.kind() == ErrorKind::NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::collections::TryReserveError> for EcsError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::AllocationFailure(err.to_string())
    }
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
