//! # Commands
//!
//! Deferred structural mutations recorded by running systems.
//!
//! A system iterates over its matched list while it runs, so it must not add
//! or remove components, or delete entities, in place. It records a
//! [`Command`] instead. The scene applies the queue in recording order right
//! after the system returns, before the next system runs.

use super::component::Component;
use super::entity::EntityId;

/// A deferred structural mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Attaches a component to an entity.
    Add {
        /// Target entity.
        entity: EntityId,
        /// Registered component name.
        component: String,
        /// Initial record, or `None` for a zero-filled one.
        data: Option<Vec<u8>>,
    },
    /// Detaches a component from an entity.
    Remove {
        /// Target entity.
        entity: EntityId,
        /// Registered component name.
        component: String,
    },
    /// Deletes an entity and all of its components.
    Delete {
        /// Entity to delete.
        entity: EntityId,
    },
}

/// Ordered list of commands recorded during one system invocation.
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Records a typed component insertion.
    pub fn add<C: Component>(&mut self, entity: EntityId, value: C) {
        self.commands.push(Command::Add {
            entity,
            component: C::NAME.to_owned(),
            data: Some(bytemuck::bytes_of(&value).to_vec()),
        });
    }

    /// Records a component insertion by name.
    pub fn add_by_name(&mut self, entity: EntityId, name: &str, data: Option<&[u8]>) {
        self.commands.push(Command::Add {
            entity,
            component: name.to_owned(),
            data: data.map(<[u8]>::to_vec),
        });
    }

    /// Records a typed component removal.
    pub fn remove<C: Component>(&mut self, entity: EntityId) {
        self.remove_by_name(entity, C::NAME);
    }

    /// Records a component removal by name.
    pub fn remove_by_name(&mut self, entity: EntityId, name: &str) {
        self.commands.push(Command::Remove {
            entity,
            component: name.to_owned(),
        });
    }

    /// Records an entity deletion.
    pub fn delete(&mut self, entity: EntityId) {
        self.commands.push(Command::Delete { entity });
    }

    /// Takes every recorded command, leaving the queue empty.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.commands.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_keep_recording_order() {
        let mut queue = CommandQueue::new();
        let entity = EntityId::new(1);
        queue.add_by_name(entity, "Tag", None);
        queue.remove_by_name(entity, "Tag");
        queue.delete(entity);
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = queue.drain().collect();
        assert!(matches!(drained[0], Command::Add { data: None, .. }));
        assert!(matches!(drained[1], Command::Remove { .. }));
        assert_eq!(drained[2], Command::Delete { entity });
        assert!(queue.is_empty());
    }
}
