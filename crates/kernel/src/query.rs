//! Constraint-based object queries.
//!
//! A query is a conjunction of predicates over [`WorldObject`]s. It only ever
//! scans the world's queryable subset, in admission order, and hands back
//! [`ObjectRef`]s rather than borrowed objects.

use worldkit_common::ObjectId;

use crate::behavior::Behavior;
use crate::component::Component;
use crate::object::WorldObject;
use crate::reference::ObjectRef;
use crate::world::World;

type Constraint<'w> = Box<dyn Fn(&WorldObject) -> bool + 'w>;

/// Builder-style query over one world.
///
/// Constraints are ANDed and checked in the order they were added, stopping
/// at the first one a candidate fails.
pub struct Query<'w> {
    world: &'w World,
    constraints: Vec<Constraint<'w>>,
}

impl<'w> Query<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            constraints: Vec::new(),
        }
    }

    /// Add an arbitrary predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&WorldObject) -> bool + 'w,
    {
        self.constraints.push(Box::new(predicate));
        self
    }

    /// Match objects whose behavior is concretely `B`.
    pub fn by_type<B: Behavior>(self) -> Self {
        self.filter(|object| object.behavior_is::<B>())
    }

    /// Match objects whose template tagged them with `tag`.
    pub fn by_tag(self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.filter(move |object| object.has_tag(&tag))
    }

    /// One constraint per tag: all of them must be present.
    pub fn by_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter().fold(self, |query, tag| query.by_tag(tag))
    }

    pub fn with_component<C: Component>(self) -> Self {
        self.filter(|object| object.components().has::<C>())
    }

    pub fn matches(&self, object: &WorldObject) -> bool {
        self.constraints.iter().all(|constraint| constraint(object))
    }

    pub fn first(&self) -> Option<ObjectRef> {
        self.matching().next()
    }

    pub fn all(&self) -> Vec<ObjectRef> {
        self.matching().collect()
    }

    pub fn count(&self) -> usize {
        self.matching().count()
    }

    fn matching(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        let world_id = self.world.id();
        self.candidates()
            .filter(|(_, object)| self.matches(object))
            .map(move |(id, _)| ObjectRef::new(world_id, id))
    }

    fn candidates(&self) -> impl Iterator<Item = (ObjectId, &'w WorldObject)> + 'w {
        let world = self.world;
        world
            .queryable_ids()
            .filter_map(move |id| world.lookup(id).map(|object| (id, object)))
            .filter(move |(_, object)| object.is_owned_by(world.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::TemplateMeta;

    struct Enemy;
    impl Behavior for Enemy {}

    struct Crate;
    impl Behavior for Crate {}

    struct Loot;
    impl Component for Loot {
        const NAME: &'static str = "Loot";
    }

    fn tagged(key: &str, queryable: bool, tags: &[&str]) -> WorldObject {
        let meta = tags
            .iter()
            .fold(TemplateMeta::new(key).queryable(queryable), |meta, tag| {
                meta.tag(*tag)
            });
        WorldObject::new(meta)
    }

    #[test]
    fn only_queryable_objects_are_visible() {
        let mut world = World::new();
        let a = world.add(tagged("grunt", true, &["enemy"]));
        world.add(tagged("decal", false, &["enemy"]));

        let all = world.query().by_tag("enemy").all();
        assert_eq!(all, vec![world.create_ref(a).unwrap()]);
        assert_eq!(
            world.query().by_tag("enemy").first(),
            Some(world.create_ref(a).unwrap())
        );
    }

    #[test]
    fn non_queryable_never_returned_even_unconstrained() {
        let mut world = World::new();
        world.add(tagged("decal", false, &["enemy"]));
        assert!(world.query().first().is_none());
        assert!(world.query().all().is_empty());
    }

    #[test]
    fn removal_hides_object_before_next_step() {
        let mut world = World::new();
        let a = world.add(tagged("grunt", true, &["enemy"]));
        world.add(tagged("decal", false, &["enemy"]));

        world.remove(a);
        assert!(world.query().by_tag("enemy").all().is_empty());
        world.step();
        assert!(world.query().by_tag("enemy").all().is_empty());
    }

    #[test]
    fn constraints_are_anded() {
        let mut world = World::new();
        world.add(tagged("grunt", true, &["enemy"]));
        let boss = world.add(tagged("boss", true, &["enemy", "boss"]));
        world.add(tagged("king", true, &["boss"]));

        let refs = world.query().by_tags(["enemy", "boss"]).all();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id(), boss);
    }

    #[test]
    fn by_type_matches_behavior() {
        let mut world = World::new();
        let enemy = world.add(tagged("grunt", true, &[]).with_behavior(Enemy));
        world.add(tagged("box", true, &[]).with_behavior(Crate));
        world.add(tagged("plain", true, &[]));

        let refs = world.query().by_type::<Enemy>().all();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id(), enemy);
        assert_eq!(world.query().by_type::<Enemy>().by_type::<Crate>().count(), 0);
    }

    #[test]
    fn with_component_and_filter() {
        let mut world = World::new();
        let looted = world.add(tagged("chest", true, &[]).with_component(Loot).unwrap());
        world.add(tagged("chest", true, &[]));

        assert_eq!(
            world.query().with_component::<Loot>().first().map(|r| r.id()),
            Some(looted)
        );
        assert_eq!(
            world
                .query()
                .filter(|object| object.template().key == "chest")
                .count(),
            2
        );
    }

    #[test]
    fn results_follow_admission_order() {
        let mut world = World::new();
        let ids: Vec<_> = (0..5)
            .map(|_| world.add(tagged("grunt", true, &["enemy"])))
            .collect();
        let found: Vec<_> = world.query().by_tag("enemy").all().iter().map(|r| r.id()).collect();
        assert_eq!(found, ids);
    }
}
