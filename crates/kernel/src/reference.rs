use worldkit_common::{ObjectId, WorldId};

use crate::object::WorldObject;
use crate::world::World;

/// A re-resolvable handle to an object.
///
/// Holds only the `(world, id)` pair and looks the object up again on every
/// call, so it never needs invalidating. It resolves to `None` as soon as the
/// object is removed, because removal clears the object's back-reference
/// before the object physically leaves the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    world: WorldId,
    id: ObjectId,
}

impl ObjectRef {
    pub(crate) fn new(world: WorldId, id: ObjectId) -> Self {
        Self { world, id }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn world_id(&self) -> WorldId {
        self.world
    }

    pub fn target<'w>(&self, world: &'w World) -> Option<&'w WorldObject> {
        if world.id() != self.world {
            return None;
        }
        world
            .lookup(self.id)
            .filter(|object| object.is_owned_by(self.world))
    }

    pub fn target_mut<'w>(&self, world: &'w mut World) -> Option<&'w mut WorldObject> {
        if world.id() != self.world {
            return None;
        }
        world
            .lookup_mut(self.id)
            .filter(|object| object.is_owned_by(self.world))
    }

    pub fn is_alive(&self, world: &World) -> bool {
        self.target(world).is_some()
    }
}
