use std::any::TypeId;
use std::collections::BTreeSet;

use glam::Vec2;
use worldkit_common::{ObjectId, ObjectSnapshot, WorldId};

use crate::behavior::{Behavior, BehaviorSlot};
use crate::component::{Component, ComponentBox, ComponentTable};
use crate::error::WorldError;

/// Metadata an object inherits from the template it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateMeta {
    pub key: String,
    /// Whether the query engine may see this object at all.
    pub queryable: bool,
    pub tags: BTreeSet<String>,
}

impl TemplateMeta {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn queryable(mut self, queryable: bool) -> Self {
        self.queryable = queryable;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A unit of simulation state: identity, position, components and an
/// optional behavior.
///
/// Objects are built outside any world and handed to [`World::add`] by value,
/// so one object can never be owned by two worlds. The world assigns `id` and
/// the `world` back-reference on admission and clears the back-reference the
/// moment the object is removed.
///
/// [`World::add`]: crate::World::add
#[derive(Debug)]
pub struct WorldObject {
    pub(crate) id: Option<ObjectId>,
    pub(crate) world: Option<WorldId>,
    position: Vec2,
    template: TemplateMeta,
    pub(crate) components: ComponentTable,
    pub(crate) behavior: Option<BehaviorSlot>,
    finalized: bool,
}

impl WorldObject {
    pub fn new(template: TemplateMeta) -> Self {
        Self {
            id: None,
            world: None,
            position: Vec2::ZERO,
            template,
            components: ComponentTable::new(),
            behavior: None,
            finalized: false,
        }
    }

    /// Build an object with an initial component set. A duplicate type in
    /// the set fails exactly like a later [`ComponentTable::add`].
    pub fn with_components(
        template: TemplateMeta,
        components: impl IntoIterator<Item = ComponentBox>,
    ) -> Result<Self, WorldError> {
        let mut object = Self::new(template);
        for component in components {
            object.components.add_boxed(component)?;
        }
        Ok(object)
    }

    pub fn with_component<C: Component>(mut self, component: C) -> Result<Self, WorldError> {
        self.components.add(component)?;
        Ok(self)
    }

    pub fn with_behavior<B: Behavior>(mut self, behavior: B) -> Self {
        self.behavior = Some(BehaviorSlot::new(behavior));
        self
    }

    pub(crate) fn with_behavior_slot(mut self, slot: BehaviorSlot) -> Self {
        self.behavior = Some(slot);
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Assigned on admission; kept after removal for diagnostics.
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// The owning world, or `None` before admission and after removal.
    pub fn world(&self) -> Option<WorldId> {
        self.world
    }

    pub fn is_owned_by(&self, world: WorldId) -> bool {
        self.world == Some(world)
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn position_mut(&mut self) -> &mut Vec2 {
        &mut self.position
    }

    pub fn template(&self) -> &TemplateMeta {
        &self.template
    }

    pub fn is_queryable(&self) -> bool {
        self.template.queryable
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.template.tags.contains(tag)
    }

    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentTable {
        &mut self.components
    }

    pub fn component<C: Component>(&self) -> Option<&C> {
        self.components.get::<C>()
    }

    pub fn component_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components.get_mut::<C>()
    }

    /// Borrow the behavior as its concrete type. `None` while the behavior
    /// is running one of its own hooks.
    pub fn behavior<B: Behavior>(&self) -> Option<&B> {
        self.behavior.as_ref()?.get::<B>()
    }

    pub fn behavior_mut<B: Behavior>(&mut self) -> Option<&mut B> {
        self.behavior.as_mut()?.get_mut::<B>()
    }

    /// Whether the behavior is concretely `B`. Works while checked out.
    pub fn behavior_is<B: Behavior>(&self) -> bool {
        self.behavior
            .as_ref()
            .is_some_and(|slot| slot.kind() == TypeId::of::<B>())
    }

    pub fn behavior_name(&self) -> Option<&'static str> {
        self.behavior.as_ref().map(BehaviorSlot::type_name)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Structural snapshot. Pure read.
    pub fn save(&self) -> ObjectSnapshot {
        let mut snapshot = ObjectSnapshot::new(self.template.key.clone(), self.position);
        for (name, component) in self.components.iter() {
            if let Some(payload) = component.save_payload() {
                snapshot.components.insert(name.to_string(), payload);
            }
        }
        snapshot
    }

    /// Apply a snapshot: each payload whose key names a mounted component,
    /// in key order, then the position. Payloads for components this object
    /// doesn't carry are ignored.
    ///
    /// Components cannot be rolled back. If one rejects its payload the
    /// position is left alone, but components loaded before it keep their new
    /// state. Use [`World::load`](crate::World::load) for all-or-nothing
    /// loading, which discards the half-loaded object.
    pub fn load(&mut self, snapshot: &ObjectSnapshot) -> Result<(), WorldError> {
        for (name, payload) in &snapshot.components {
            let Some(component) = self.components.get_by_name_mut(name) else {
                tracing::trace!(component = %name, "no mounted component for payload, skipping");
                continue;
            };
            component
                .load_payload(payload)
                .map_err(|err| WorldError::ComponentLoad {
                    name: name.clone(),
                    reason: format!("{err:#}"),
                })?;
        }
        self.position = snapshot.position;
        Ok(())
    }

    /// Tear down every component once. Later calls do nothing.
    ///
    /// Returns the components whose `destroy` failed.
    pub fn destroy(&mut self) -> Vec<(&'static str, anyhow::Error)> {
        if self.finalized {
            return Vec::new();
        }
        self.finalized = true;
        self.components
            .iter_mut()
            .filter_map(|(name, component)| component.run_destroy().err().map(|err| (name, err)))
            .collect()
    }
}
