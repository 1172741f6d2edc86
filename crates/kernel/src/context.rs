use std::time::Duration;

use glam::Vec2;
use worldkit_common::{ObjectId, WorldId};

use crate::error::{Owner, WorldError};
use crate::object::WorldObject;
use crate::query::Query;
use crate::reference::ObjectRef;
use crate::world::World;

/// What a running hook may do to its world.
///
/// Hooks can admit and remove objects, look things up, take references and
/// run queries. They cannot purge or step: those only run from the top of the
/// kernel, after iteration has finished.
///
/// While a hook runs, the piece of its owner that is executing is checked out
/// of the world. During a behavior hook the owner's behavior is absent; during
/// a component `step` the owner's whole component table is absent. Anything
/// mounted on the owner in the meantime is folded back in afterwards.
pub struct HookContext<'w> {
    world: &'w mut World,
    owner: Owner,
}

impl<'w> HookContext<'w> {
    pub(crate) fn new(world: &'w mut World, owner: Owner) -> Self {
        Self { world, owner }
    }

    /// Who this hook runs for.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Current id of the object this hook runs for.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self.owner {
            Owner::World => None,
            Owner::Object(id) => Some(self.world.relocated(id)),
        }
    }

    /// The object this hook runs for, even if it is already pending removal.
    /// `None` for world-level components and during `on_purge`.
    pub fn object(&self) -> Option<&WorldObject> {
        self.world.lookup(self.object_id()?)
    }

    /// Mutable access to the object this hook runs for.
    pub fn object_mut(&mut self) -> Option<&mut WorldObject> {
        let id = self.object_id()?;
        self.world.lookup_mut(id)
    }

    /// Identity of the world running the hook.
    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    /// Tick of the step in progress, or the last completed one outside `step`.
    pub fn tick(&self) -> u64 {
        self.world.tick()
    }

    /// Time since the previous step. Zero outside of `step`.
    pub fn delta(&self) -> Duration {
        self.world.current_delta()
    }

    /// An object the world owns, see [`World::get`].
    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.world.get(id)
    }

    /// Mutable access to an owned object.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.world.get_mut(id)
    }

    /// Admit an object. During a step it is first stepped on the next pass.
    pub fn add(&mut self, object: WorldObject) -> ObjectId {
        self.world.add(object)
    }

    /// Admit an object at `position`.
    pub fn add_at(&mut self, object: WorldObject, position: Vec2) -> ObjectId {
        self.world.add_at(object, position)
    }

    /// Re-admit an object, see [`World::readmit`].
    pub fn readmit(&mut self, id: ObjectId) -> Result<ObjectId, WorldError> {
        self.world.readmit(id)
    }

    /// Mark an owned object for removal; it is purged after the step.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.world.remove(id)
    }

    /// Remove the object this hook runs for.
    pub fn remove_self(&mut self) -> bool {
        match self.object_id() {
            Some(id) => self.world.remove(id),
            None => false,
        }
    }

    /// Take a reference to an owned object.
    pub fn create_ref(&self, id: ObjectId) -> Result<ObjectRef, WorldError> {
        self.world.create_ref(id)
    }

    /// Resolve a reference against the running world.
    pub fn resolve(&self, reference: &ObjectRef) -> Option<&WorldObject> {
        reference.target(&*self.world)
    }

    /// Start a query over the queryable objects.
    pub fn query(&self) -> Query<'_> {
        self.world.query()
    }
}
