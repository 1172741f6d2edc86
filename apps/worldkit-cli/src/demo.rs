//! Demo world used by the `simulate` and `snapshot` commands.

use std::time::{Duration, Instant};

use anyhow::Context;
use serde_json::json;
use worldkit_kernel::{
    Behavior, Component, HookContext, Template, TemplateRegistry, Vec2, World, WorldConfig,
};

/// Fixed simulation step, so runs are reproducible.
pub const FRAME: Duration = Duration::from_millis(16);

const ARENA_HALF_EXTENT: f32 = 100.0;
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Drifts in a straight line, bouncing off the arena edges.
///
/// The heading is derived from the object's id on admission.
#[derive(Debug, Default)]
pub struct Wander {
    velocity: Vec2,
}

impl Wander {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Behavior for Wander {
    fn on_add(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        let id = ctx.object_id().context("wanderer has no id")?;
        let speed = 10.0 + (id.0 % 5) as f32 * 4.0;
        self.velocity = Vec2::from_angle(id.0 as f32 * GOLDEN_ANGLE) * speed;
        Ok(())
    }

    fn step(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        let dt = ctx.delta().as_secs_f32();
        let object = ctx.object_mut().context("wanderer left the live table")?;
        let mut next = object.position() + self.velocity * dt;
        for axis in 0..2 {
            if next[axis].abs() > ARENA_HALF_EXTENT {
                next[axis] = next[axis].clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT);
                self.velocity[axis] = -self.velocity[axis];
            }
        }
        object.set_position(next);
        Ok(())
    }
}

/// Removes its owner after a number of steps.
#[derive(Debug)]
pub struct Lifetime {
    pub remaining: u32,
}

impl Component for Lifetime {
    const NAME: &'static str = "Lifetime";

    fn step(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            ctx.remove_self();
        }
        Ok(())
    }

    fn save(&self) -> Option<serde_json::Value> {
        Some(json!({ "remaining": self.remaining }))
    }

    fn load(&mut self, payload: &serde_json::Value) -> anyhow::Result<()> {
        let remaining = payload["remaining"]
            .as_u64()
            .context("`remaining` must be an unsigned integer")?;
        self.remaining = u32::try_from(remaining)?;
        Ok(())
    }
}

/// World-level head count of queryable wanderers, refreshed every step.
#[derive(Debug, Default)]
pub struct Census {
    pub wanderers: usize,
}

impl Component for Census {
    const NAME: &'static str = "Census";

    fn step(&mut self, ctx: &mut HookContext<'_>) -> anyhow::Result<()> {
        self.wanderers = ctx.query().by_tag("wanderer").count();
        tracing::trace!(tick = ctx.tick(), wanderers = self.wanderers, "census");
        Ok(())
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub stepped: usize,
    pub purged: usize,
    pub hook_failures: usize,
}

pub fn registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.register(
        Template::new("wanderer")
            .queryable(true)
            .tag("wanderer")
            .behavior(Wander::new),
    );
    registry.register(
        Template::new("mayfly")
            .queryable(true)
            .tag("wanderer")
            .tag("mayfly")
            .components(|| vec![Lifetime { remaining: 30 }.into()])
            .behavior(Wander::new),
    );
    registry
}

/// Populate a world: every third object is a short-lived mayfly.
pub fn build_world(
    config: WorldConfig,
    registry: &TemplateRegistry,
    objects: usize,
) -> anyhow::Result<World> {
    let mut world = World::with_config(config);
    world.add_component(Census::default())?;
    for i in 0..objects {
        let key = if i % 3 == 2 { "mayfly" } else { "wanderer" };
        let mut object = registry.instantiate(key)?;
        if let Some(lifetime) = object.component_mut::<Lifetime>() {
            lifetime.remaining += i as u32;
        }
        let column = (i % 10) as f32;
        let row = (i / 10) as f32;
        world.add_at(object, Vec2::new(column * 8.0 - 40.0, row * 8.0 - 40.0));
    }
    Ok(world)
}

/// Step `ticks` times on a fixed clock starting at `start`.
pub fn run(world: &mut World, start: Instant, ticks: u64) -> RunSummary {
    let mut summary = RunSummary::default();
    let first_tick = world.tick();
    for n in 0..ticks {
        let now = start + FRAME * u32::try_from(first_tick + n).unwrap_or(u32::MAX);
        let report = world.step_at(now);
        summary.ticks += 1;
        summary.stepped += report.stepped;
        summary.purged += report.purged;
        summary.hook_failures += report.hook_failures;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldkit_kernel::WorldEvent;

    fn quiet() -> WorldConfig {
        WorldConfig {
            name: "test".into(),
            log_hook_failures: false,
            record_events: true,
        }
    }

    #[test]
    fn mayflies_expire_and_wanderers_stay() {
        let registry = registry();
        let mut world = build_world(quiet(), &registry, 6).unwrap();
        let summary = run(&mut world, Instant::now(), 60);

        // Mayflies at indices 2 and 5 live 32 and 35 steps.
        assert_eq!(summary.purged, 2);
        assert_eq!(summary.hook_failures, 0);
        assert_eq!(world.len(), 4);
        assert_eq!(world.query().by_tag("mayfly").count(), 0);
        assert_eq!(world.components().get::<Census>().unwrap().wanderers, 4);
        assert_eq!(
            world
                .events()
                .iter()
                .filter(|e| matches!(e, WorldEvent::Purged { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn wanderers_move_and_stay_in_bounds() {
        let registry = registry();
        let mut world = build_world(quiet(), &registry, 3).unwrap();
        let before: Vec<Vec2> = world.objects().map(|(_, o)| o.position()).collect();
        run(&mut world, Instant::now(), 500);
        let after: Vec<Vec2> = world.objects().map(|(_, o)| o.position()).collect();

        assert_ne!(before[0], after[0]);
        for position in after {
            assert!(position.x.abs() <= ARENA_HALF_EXTENT);
            assert!(position.y.abs() <= ARENA_HALF_EXTENT);
        }
    }

    #[test]
    fn fixed_clock_runs_are_reproducible() {
        let registry = registry();
        let mut a = build_world(quiet(), &registry, 12).unwrap();
        let mut b = build_world(quiet(), &registry, 12).unwrap();
        run(&mut a, Instant::now(), 40);
        std::thread::sleep(Duration::from_millis(2));
        run(&mut b, Instant::now(), 40);
        assert_eq!(a.save(), b.save());
    }

    #[test]
    fn lifetime_survives_save_and_load() {
        let registry = registry();
        let mut world = build_world(quiet(), &registry, 3).unwrap();
        run(&mut world, Instant::now(), 10);
        let snapshot = world.save();

        let mut restored = World::with_config(quiet());
        restored.load(&snapshot, &registry).unwrap();
        let remaining: Vec<u32> = restored
            .objects()
            .filter_map(|(_, o)| o.component::<Lifetime>().map(|l| l.remaining))
            .collect();
        assert_eq!(remaining, vec![22]);
    }
}
