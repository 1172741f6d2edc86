//! Components and the per-owner mount table.
//!
//! A component is mounted on exactly one owner (an object or the world
//! itself) and lives inside that owner's [`ComponentTable`] until the owner
//! is finalized. The table enforces one instance per concrete type.

use std::any::{Any, TypeId};
use std::fmt;

use crate::context::HookContext;
use crate::error::WorldError;

/// A pluggable unit of behavior or data mounted on one owner.
///
/// Every hook has a no-op default, so a component only implements the ones it
/// cares about. `save` returning `None` means the component has nothing to
/// persist and is left out of snapshots.
pub trait Component: 'static {
    /// Stable name used as the snapshot payload key.
    const NAME: &'static str;

    fn step(&mut self, _ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Teardown, run once when the owner is finalized.
    fn destroy(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn save(&self) -> Option<serde_json::Value> {
        None
    }

    fn load(&mut self, _payload: &serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Object-safe view of a mounted [`Component`].
///
/// Implemented for every component; this is what the table stores and what
/// iteration hands out.
pub trait DynComponent {
    fn name(&self) -> &'static str;
    fn kind(&self) -> TypeId;
    fn run_step(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()>;
    fn run_destroy(&mut self) -> anyhow::Result<()>;
    fn save_payload(&self) -> Option<serde_json::Value>;
    fn load_payload(&mut self, payload: &serde_json::Value) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> DynComponent for C {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn kind(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn run_step(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Component::step(self, ctx)
    }

    fn run_destroy(&mut self) -> anyhow::Result<()> {
        Component::destroy(self)
    }

    fn save_payload(&self) -> Option<serde_json::Value> {
        Component::save(self)
    }

    fn load_payload(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
        Component::load(self, payload)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A type-erased component, for heterogeneous initial component sets.
pub struct ComponentBox(Box<dyn DynComponent>);

impl ComponentBox {
    pub fn new<C: Component>(component: C) -> Self {
        Self(Box::new(component))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

impl<C: Component> From<C> for ComponentBox {
    fn from(component: C) -> Self {
        Self::new(component)
    }
}

impl fmt::Debug for ComponentBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentBox").field(&self.name()).finish()
    }
}

struct Entry {
    kind: TypeId,
    component: Box<dyn DynComponent>,
}

/// Mount table: at most one component per concrete type, in mount order.
///
/// The table never fires hooks on its own. Adding and removing only
/// registers and unregisters; teardown is the owner's job.
#[derive(Default)]
pub struct ComponentTable {
    entries: Vec<Entry>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mount a component. Fails without touching the table if the same
    /// concrete type is already mounted.
    pub fn add<C: Component>(&mut self, component: C) -> Result<(), WorldError> {
        self.add_boxed(ComponentBox::new(component))
    }

    pub fn add_boxed(&mut self, component: ComponentBox) -> Result<(), WorldError> {
        let component = component.0;
        let kind = component.kind();
        if self.position(kind).is_some() {
            return Err(WorldError::DuplicateComponent {
                name: component.name(),
            });
        }
        self.entries.push(Entry { kind, component });
        Ok(())
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        let index = self.position(TypeId::of::<C>())?;
        self.entries[index].component.as_any().downcast_ref::<C>()
    }

    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        let index = self.position(TypeId::of::<C>())?;
        self.entries[index].component.as_any_mut().downcast_mut::<C>()
    }

    pub fn has<C: Component>(&self) -> bool {
        self.position(TypeId::of::<C>()).is_some()
    }

    /// Unmount and drop a component. No hook runs.
    pub fn remove<C: Component>(&mut self) -> bool {
        match self.position(TypeId::of::<C>()) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&dyn DynComponent> {
        self.entries
            .iter()
            .find(|entry| entry.component.name() == name)
            .map(|entry| entry.component.as_ref())
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut (dyn DynComponent + 'static)> {
        self.entries
            .iter_mut()
            .find(|entry| entry.component.name() == name)
            .map(|entry| entry.component.as_mut())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.component.name())
    }

    /// Mounted components in mount order. Lazy; call again to restart.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn DynComponent)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.component.name(), entry.component.as_ref()))
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&'static str, &mut (dyn DynComponent + 'static))> + '_ {
        self.entries
            .iter_mut()
            .map(|entry| (entry.component.name(), entry.component.as_mut()))
    }

    /// Fold components mounted on a stand-in table back into this one.
    ///
    /// Used when the real table was checked out while hooks ran. Returns the
    /// names of components rejected as duplicates.
    pub(crate) fn absorb(&mut self, other: ComponentTable) -> Vec<&'static str> {
        let mut rejected = Vec::new();
        for entry in other.entries {
            if self.position(entry.kind).is_some() {
                rejected.push(entry.component.name());
            } else {
                self.entries.push(entry);
            }
        }
        rejected
    }

    fn position(&self, kind: TypeId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.kind == kind)
    }
}

impl fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Health(i32);

    impl Component for Health {
        const NAME: &'static str = "Health";

        fn save(&self) -> Option<serde_json::Value> {
            Some(json!(self.0))
        }

        fn load(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
            self.0 = payload
                .as_i64()
                .ok_or_else(|| anyhow::anyhow!("expected an integer"))? as i32;
            Ok(())
        }
    }

    struct Tagged;

    impl Component for Tagged {
        const NAME: &'static str = "Tagged";
    }

    #[test]
    fn add_get_has_remove() {
        let mut table = ComponentTable::new();
        table.add(Health(10)).unwrap();
        assert!(table.has::<Health>());
        assert!(!table.has::<Tagged>());
        assert_eq!(table.get::<Health>(), Some(&Health(10)));

        table.get_mut::<Health>().unwrap().0 = 3;
        assert_eq!(table.get::<Health>().unwrap().0, 3);

        assert!(table.remove::<Health>());
        assert!(!table.remove::<Health>());
        assert!(table.get::<Health>().is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_type_is_rejected_and_table_unchanged() {
        let mut table = ComponentTable::new();
        table.add(Health(10)).unwrap();

        let err = table.add(Health(99)).unwrap_err();
        assert!(matches!(
            err,
            WorldError::DuplicateComponent { name: "Health" }
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get::<Health>(), Some(&Health(10)));
    }

    #[test]
    fn iteration_follows_mount_order_and_restarts() {
        let mut table = ComponentTable::new();
        table.add(Tagged).unwrap();
        table.add(Health(1)).unwrap();

        let first: Vec<_> = table.iter().map(|(name, _)| name).collect();
        let second: Vec<_> = table.names().collect();
        assert_eq!(first, vec!["Tagged", "Health"]);
        assert_eq!(first, second);
    }

    #[test]
    fn payloads_by_name() {
        let mut table = ComponentTable::new();
        table.add(Health(7)).unwrap();
        table.add(Tagged).unwrap();

        assert_eq!(
            table.get_by_name("Health").and_then(|c| c.save_payload()),
            Some(json!(7))
        );
        assert!(table.get_by_name("Tagged").unwrap().save_payload().is_none());

        table
            .get_by_name_mut("Health")
            .unwrap()
            .load_payload(&json!(42))
            .unwrap();
        assert_eq!(table.get::<Health>().unwrap().0, 42);
        assert!(table.get_by_name("Missing").is_none());
    }

    #[test]
    fn absorb_keeps_existing_and_reports_duplicates() {
        let mut table = ComponentTable::new();
        table.add(Health(1)).unwrap();

        let mut stand_in = ComponentTable::new();
        stand_in.add(Health(2)).unwrap();
        stand_in.add(Tagged).unwrap();

        let rejected = table.absorb(stand_in);
        assert_eq!(rejected, vec!["Health"]);
        assert_eq!(table.get::<Health>().unwrap().0, 1);
        assert!(table.has::<Tagged>());
    }
}
