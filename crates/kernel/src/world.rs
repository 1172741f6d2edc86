use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use worldkit_common::{ObjectId, WorldId, WorldSnapshot};

use crate::behavior::Behavior;
use crate::component::{Component, ComponentTable};
use crate::config::WorldConfig;
use crate::context::HookContext;
use crate::error::{HookFailure, HookKind, Owner, WorldError};
use crate::object::WorldObject;
use crate::query::Query;
use crate::reference::ObjectRef;
use crate::template::TemplateRegistry;

/// Receives hook failures of one [`HookKind`].
pub type HookHandler = Box<dyn FnMut(&HookFailure)>;

/// A record produced by every lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    Admitted { id: ObjectId },
    /// A pending-removal object was admitted again under a new id.
    Readmitted { from: ObjectId, to: ObjectId },
    Removed { id: ObjectId },
    Purged { id: ObjectId },
    Stepped { tick: u64, delta: Duration },
}

/// Timing and bookkeeping for one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub tick: u64,
    /// Time since the previous step; zero on the first.
    pub delta: Duration,
    /// Objects whose hooks ran this pass.
    pub stepped: usize,
    pub purged: usize,
    pub hook_failures: usize,
}

/// Outcome of [`World::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub admitted: Vec<ObjectId>,
    /// Template keys with no registration; their entries were skipped.
    pub skipped: Vec<String>,
}

/// The world kernel: owns the live objects and drives their lifecycle.
///
/// Per object id the lifecycle is `live -> pending removal -> purged`.
/// `remove` clears the object's back-reference immediately but leaves it in
/// the live table; `purge` is what finally drops it. That split is what lets
/// hooks remove objects (themselves included) in the middle of a step without
/// disturbing the iteration, and what makes every [`ObjectRef`] to a removed
/// object resolve to `None` straight away.
///
/// Ids come from a counter that only goes up, so the `BTreeMap` iterates in
/// admission order.
pub struct World {
    id: WorldId,
    config: WorldConfig,
    objects: BTreeMap<ObjectId, WorldObject>,
    removed: BTreeSet<ObjectId>,
    queryable: BTreeSet<ObjectId>,
    last_id: u64,
    tick: u64,
    last_step: Option<Instant>,
    /// Delta of the step in progress, exposed to hooks.
    delta: Duration,
    components: ComponentTable,
    handlers: BTreeMap<HookKind, HookHandler>,
    /// Hooks requested while the target behavior was checked out.
    deferred: Vec<(ObjectId, HookKind)>,
    /// Old id -> new id for objects readmitted while something was checked out.
    relocations: BTreeMap<ObjectId, ObjectId>,
    checkouts: usize,
    hook_failures: usize,
    events: Vec<WorldEvent>,
}

impl World {
    /// Create an empty world at tick 0 with the default config.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create an empty world with `config` and a fresh [`WorldId`].
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            id: WorldId::new(),
            config,
            objects: BTreeMap::new(),
            removed: BTreeSet::new(),
            queryable: BTreeSet::new(),
            last_id: 0,
            tick: 0,
            last_step: None,
            delta: Duration::ZERO,
            components: ComponentTable::new(),
            handlers: BTreeMap::new(),
            deferred: Vec::new(),
            relocations: BTreeMap::new(),
            checkouts: 0,
            hook_failures: 0,
            events: Vec::new(),
        }
    }

    /// Identity stamped on every object this world owns.
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// The config this world was created with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of completed steps.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Objects this world currently owns (pending removals excluded).
    pub fn len(&self) -> usize {
        self.objects.len() - self.pending_count()
    }

    /// Whether no object is currently owned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removed objects still waiting for `purge`.
    pub fn pending_count(&self) -> usize {
        self.removed
            .iter()
            .filter(|id| self.objects.contains_key(*id))
            .count()
    }

    /// Total hook failures reported over the world's lifetime.
    pub fn hook_failures(&self) -> usize {
        self.hook_failures
    }

    /// Journal of lifecycle transitions since the last drain.
    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Take the journal, leaving it empty.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// An owned object. Objects pending removal are not returned.
    pub fn get(&self, id: ObjectId) -> Option<&WorldObject> {
        self.lookup(id).filter(|object| object.is_owned_by(self.id))
    }

    /// Mutable access to an owned object.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        let world = self.id;
        self.lookup_mut(id)
            .filter(|object| object.is_owned_by(world))
    }

    /// Owned objects in admission order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &WorldObject)> + '_ {
        self.objects
            .iter()
            .filter(|(_, object)| object.is_owned_by(self.id))
            .map(|(id, object)| (*id, object))
    }

    /// World-level components, stepped before any object.
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    /// Mutable access to the world-level components.
    pub fn components_mut(&mut self) -> &mut ComponentTable {
        &mut self.components
    }

    /// Mount a world-level component. Fails on a second instance of `C`.
    pub fn add_component<C: Component>(&mut self, component: C) -> Result<(), WorldError> {
        self.components.add(component)
    }

    /// Route failures of `kind` to `handler` instead of the default log line.
    pub fn set_handler<F>(&mut self, kind: HookKind, handler: F)
    where
        F: FnMut(&HookFailure) + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Drop the handler for `kind`, going back to the default log line.
    pub fn clear_handler(&mut self, kind: HookKind) {
        self.handlers.remove(&kind);
    }

    /// Admit an object, assigning it the next id. `on_add` runs after the
    /// object is already in the live table; its failure does not undo
    /// admission.
    pub fn add(&mut self, object: WorldObject) -> ObjectId {
        self.admit(object, None)
    }

    pub fn add_at(&mut self, object: WorldObject, position: Vec2) -> ObjectId {
        self.admit(object, Some(position))
    }

    /// Re-admit an object by id.
    ///
    /// A live object is left alone and keeps its id. An object pending
    /// removal moves to a fresh id, is owned again and gets `on_add`; the old
    /// id stays dead and is skipped by `purge`.
    pub fn readmit(&mut self, id: ObjectId) -> Result<ObjectId, WorldError> {
        let object = self.lookup(id).ok_or(WorldError::UnknownObject(id))?;
        if object.is_owned_by(self.id) {
            return Ok(id);
        }
        let object = self
            .objects
            .remove(&id)
            .ok_or(WorldError::UnknownObject(id))?;
        let new_id = self.allocate_id();
        if self.checkouts > 0 {
            self.relocations.insert(id, new_id);
        }
        self.record(WorldEvent::Readmitted {
            from: id,
            to: new_id,
        });
        self.install(new_id, object, None);
        Ok(new_id)
    }

    /// Mark an owned object for removal.
    ///
    /// The back-reference is cleared and the object leaves the queryable set
    /// right away; the live-table entry survives until the next `purge`.
    /// Returns `false` for ids this world does not own.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let world = self.id;
        let Some(object) = self.lookup_mut(id).filter(|object| object.is_owned_by(world)) else {
            return false;
        };
        object.world = None;
        self.removed.insert(id);
        self.queryable.remove(&id);
        self.record(WorldEvent::Removed { id });
        tracing::debug!(world = %self.config.name, object = %id, "object marked for removal");
        self.run_behavior_hook(id, HookKind::Remove);
        true
    }

    /// Drop every pending object from the live table, run `on_purge`, then
    /// finalize its components. Safe to call with nothing pending.
    pub fn purge(&mut self) -> usize {
        if self.removed.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.removed);
        let mut purged = 0;
        for id in pending {
            let Some(mut object) = self.objects.remove(&id) else {
                continue;
            };
            self.queryable.remove(&id);
            if let Some(mut behavior) = object.behavior.as_mut().and_then(|slot| slot.check_out())
            {
                self.call_behavior(id, HookKind::Purge, &mut *behavior);
            }
            for (name, error) in object.destroy() {
                self.report(HookFailure {
                    kind: HookKind::Destroy,
                    owner: Owner::Object(id),
                    component: Some(name),
                    error,
                });
            }
            self.record(WorldEvent::Purged { id });
            purged += 1;
        }
        if purged > 0 {
            tracing::debug!(world = %self.config.name, purged, "purged removed objects");
        }
        purged
    }

    /// Advance one tick using the wall clock.
    pub fn step(&mut self) -> StepReport {
        self.step_at(Instant::now())
    }

    /// Advance one tick as if the current time were `now`.
    ///
    /// Runs world-level component steps, then each owned object's behavior
    /// step followed by its component steps, in admission order, then purges.
    /// Objects admitted during the pass wait for the next one; objects
    /// removed before their turn are skipped.
    pub fn step_at(&mut self, now: Instant) -> StepReport {
        let delta = self
            .last_step
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.tick += 1;
        self.delta = delta;
        let failures_before = self.hook_failures;

        self.step_components(Owner::World);

        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        let mut stepped = 0;
        for id in ids {
            if !self.owns(id) {
                continue;
            }
            // Relocations from the behavior step stay live until the
            // component pass has found the object's current id.
            self.checkouts += 1;
            self.run_behavior_hook(id, HookKind::Step);
            let home = self.relocated(id);
            self.checkouts -= 1;
            self.step_components(Owner::Object(home));
            self.relocations.clear();
            stepped += 1;
        }

        let purged = self.purge();
        self.last_step = Some(now);
        self.delta = Duration::ZERO;
        self.record(WorldEvent::Stepped {
            tick: self.tick,
            delta,
        });

        let report = StepReport {
            tick: self.tick,
            delta,
            stepped,
            purged,
            hook_failures: self.hook_failures - failures_before,
        };
        tracing::debug!(
            world = %self.config.name,
            tick = report.tick,
            delta_us = report.delta.as_micros() as u64,
            stepped = report.stepped,
            purged = report.purged,
            failures = report.hook_failures,
            "world stepped"
        );
        report
    }

    /// Take a reference to an object this world owns.
    pub fn create_ref(&self, id: ObjectId) -> Result<ObjectRef, WorldError> {
        match self.lookup(id) {
            Some(object) if object.is_owned_by(self.id) => Ok(ObjectRef::new(self.id, id)),
            _ => Err(WorldError::NotOwned(id)),
        }
    }

    /// Resolve a reference against this world; `None` once the object is removed.
    pub fn resolve(&self, reference: &ObjectRef) -> Option<&WorldObject> {
        reference.target(self)
    }

    /// Start a query over the queryable objects.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Snapshot every owned object in admission order.
    pub fn save(&self) -> WorldSnapshot {
        WorldSnapshot {
            objects: self.objects().map(|(_, object)| object.save()).collect(),
        }
    }

    /// Rebuild objects from a snapshot and admit them.
    ///
    /// Every entry is instantiated and loaded before any is admitted, so a
    /// component rejecting its payload leaves the world untouched. Entries
    /// whose template key is not registered are skipped.
    pub fn load(
        &mut self,
        snapshot: &WorldSnapshot,
        registry: &TemplateRegistry,
    ) -> Result<LoadReport, WorldError> {
        let mut staged = Vec::with_capacity(snapshot.len());
        let mut report = LoadReport::default();
        for entry in &snapshot.objects {
            let mut object = match registry.instantiate(&entry.template_key) {
                Ok(object) => object,
                Err(WorldError::UnknownTemplate(key)) => {
                    tracing::warn!(world = %self.config.name, template = %key, "skipping snapshot entry with unregistered template");
                    report.skipped.push(key);
                    continue;
                }
                Err(err) => return Err(err),
            };
            object.load(entry)?;
            staged.push(object);
        }
        report.admitted = staged.into_iter().map(|object| self.add(object)).collect();
        Ok(report)
    }

    // --- kernel internals ---

    /// Raw live-table lookup, ignoring ownership.
    pub(crate) fn lookup(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(&id)
    }

    pub(crate) fn lookup_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.objects.get_mut(&id)
    }

    pub(crate) fn queryable_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.queryable.iter().copied()
    }

    pub(crate) fn current_delta(&self) -> Duration {
        self.delta
    }

    /// Where an object readmitted mid-hook lives now.
    pub(crate) fn relocated(&self, mut id: ObjectId) -> ObjectId {
        while let Some(next) = self.relocations.get(&id) {
            id = *next;
        }
        id
    }

    fn owns(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    fn allocate_id(&mut self) -> ObjectId {
        self.last_id += 1;
        ObjectId(self.last_id)
    }

    fn admit(&mut self, object: WorldObject, position: Option<Vec2>) -> ObjectId {
        let id = self.allocate_id();
        self.record(WorldEvent::Admitted { id });
        self.install(id, object, position);
        id
    }

    fn install(&mut self, id: ObjectId, mut object: WorldObject, position: Option<Vec2>) {
        if let Some(position) = position {
            object.set_position(position);
        }
        object.id = Some(id);
        object.world = Some(self.id);
        if object.is_queryable() {
            self.queryable.insert(id);
        }
        tracing::debug!(
            world = %self.config.name,
            object = %id,
            template = %object.template().key,
            "object admitted"
        );
        self.objects.insert(id, object);
        self.run_behavior_hook(id, HookKind::Add);
    }

    fn record(&mut self, event: WorldEvent) {
        if self.config.record_events {
            self.events.push(event);
        }
    }

    fn report(&mut self, failure: HookFailure) {
        self.hook_failures += 1;
        match self.handlers.get_mut(&failure.kind) {
            Some(handler) => handler(&failure),
            None if self.config.log_hook_failures => {
                tracing::warn!(world = %self.config.name, kind = %failure.kind, "{failure}");
            }
            None => {}
        }
    }

    /// Run one behavior hook for the object currently at `id`.
    ///
    /// The behavior is checked out for the duration of the call. If it is
    /// already checked out (a hook asking for another hook on its own object)
    /// the request is queued and replayed once the behavior is back.
    fn run_behavior_hook(&mut self, id: ObjectId, kind: HookKind) {
        let Some(slot) = self
            .objects
            .get_mut(&id)
            .and_then(|object| object.behavior.as_mut())
        else {
            return;
        };
        let Some(mut behavior) = slot.check_out() else {
            self.deferred.push((id, kind));
            return;
        };

        self.checkouts += 1;
        self.call_behavior(id, kind, &mut *behavior);
        self.checkouts -= 1;

        let chain = self.relocation_chain(id);
        let home = chain.last().copied().unwrap_or(id);
        if let Some(slot) = self
            .objects
            .get_mut(&home)
            .and_then(|object| object.behavior.as_mut())
        {
            slot.restore(behavior);
        }
        if self.checkouts == 0 {
            self.relocations.clear();
        }

        while let Some(index) = self
            .deferred
            .iter()
            .position(|(pending, _)| chain.contains(pending))
        {
            let (_, kind) = self.deferred.remove(index);
            self.run_behavior_hook(home, kind);
        }
    }

    fn call_behavior(&mut self, id: ObjectId, kind: HookKind, behavior: &mut dyn Behavior) {
        let result = {
            let mut ctx = HookContext::new(self, Owner::Object(id));
            match kind {
                HookKind::Add => behavior.on_add(&mut ctx),
                HookKind::Remove => behavior.on_remove(&mut ctx),
                HookKind::Purge => behavior.on_purge(&mut ctx),
                HookKind::Step => behavior.step(&mut ctx),
                HookKind::Destroy => Ok(()),
            }
        };
        if let Err(error) = result {
            self.report(HookFailure {
                kind,
                owner: Owner::Object(id),
                component: None,
                error,
            });
        }
    }

    /// Step every component mounted on `owner`, in mount order.
    fn step_components(&mut self, owner: Owner) {
        let mut table = match owner {
            Owner::World => std::mem::take(&mut self.components),
            Owner::Object(id) => match self.objects.get_mut(&id) {
                Some(object) => std::mem::take(&mut object.components),
                None => return,
            },
        };
        if table.is_empty() {
            self.restore_components(owner, table);
            return;
        }

        self.checkouts += 1;
        for (name, component) in table.iter_mut() {
            let result = {
                let mut ctx = HookContext::new(self, owner);
                component.run_step(&mut ctx)
            };
            if let Err(error) = result {
                self.report(HookFailure {
                    kind: HookKind::Step,
                    owner,
                    component: Some(name),
                    error,
                });
            }
        }
        self.checkouts -= 1;
        self.restore_components(owner, table);
    }

    fn restore_components(&mut self, owner: Owner, table: ComponentTable) {
        let slot = match owner {
            Owner::World => &mut self.components,
            Owner::Object(id) => {
                let home = self.relocated(id);
                match self.objects.get_mut(&home) {
                    Some(object) => &mut object.components,
                    None => return,
                }
            }
        };
        let stand_in = std::mem::replace(slot, table);
        for name in slot.absorb(stand_in) {
            tracing::warn!(%owner, component = name, "dropping duplicate component mounted during step");
        }
        if self.checkouts == 0 {
            self.relocations.clear();
        }
    }

    fn relocation_chain(&self, mut id: ObjectId) -> Vec<ObjectId> {
        let mut chain = vec![id];
        while let Some(next) = self.relocations.get(&id) {
            id = *next;
            chain.push(id);
        }
        chain
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("tick", &self.tick)
            .field("objects", &self.objects.len())
            .field("pending", &self.removed.len())
            .field("queryable", &self.queryable.len())
            .field("last_id", &self.last_id)
            .finish()
    }
}
