use std::any::{Any, TypeId};
use std::fmt;

use crate::context::HookContext;

/// Upcast helper so behaviors can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An object's own lifecycle hooks.
///
/// All hooks default to no-ops. Returning `Err` never aborts the caller: the
/// world reports the failure through its handler for that hook kind and moves
/// on to the next object.
pub trait Behavior: AsAny {
    fn on_add(&mut self, _ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_remove(&mut self, _ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the object has left the live table.
    fn on_purge(&mut self, _ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn step(&mut self, _ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Holder for an object's behavior.
///
/// The concrete type is recorded up front so type queries keep working while
/// the behavior itself is checked out to run a hook.
pub(crate) struct BehaviorSlot {
    kind: TypeId,
    type_name: &'static str,
    inner: Option<Box<dyn Behavior>>,
}

impl BehaviorSlot {
    pub(crate) fn new<B: Behavior>(behavior: B) -> Self {
        Self {
            kind: TypeId::of::<B>(),
            type_name: std::any::type_name::<B>(),
            inner: Some(Box::new(behavior)),
        }
    }

    pub(crate) fn kind(&self) -> TypeId {
        self.kind
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn is_checked_out(&self) -> bool {
        self.inner.is_none()
    }

    pub(crate) fn check_out(&mut self) -> Option<Box<dyn Behavior>> {
        self.inner.take()
    }

    pub(crate) fn restore(&mut self, behavior: Box<dyn Behavior>) {
        self.inner = Some(behavior);
    }

    pub(crate) fn get<B: Behavior>(&self) -> Option<&B> {
        self.inner.as_deref()?.as_any().downcast_ref::<B>()
    }

    pub(crate) fn get_mut<B: Behavior>(&mut self) -> Option<&mut B> {
        self.inner.as_deref_mut()?.as_any_mut().downcast_mut::<B>()
    }
}

impl fmt::Debug for BehaviorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorSlot")
            .field("type", &self.type_name)
            .field("checked_out", &self.is_checked_out())
            .finish()
    }
}
