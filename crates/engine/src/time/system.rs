use tracing::{debug, info};

use crate::ecs::{ComponentMask, EcsError, Entity, NullComponent, System, World};

use super::clock::SimulationClock;

/// Advances the [`SimulationClock`] singleton once per tick.
#[derive(Debug, Default)]
pub struct TimeSystem;

impl System for TimeSystem {
    fn name(&self) -> &'static str {
        "time"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<NullComponent>()
    }

    fn update(&mut self, world: &mut World, _entities: &[Entity], dt: f32) -> Result<(), EcsError> {
        let clock = world.get_singleton_mut::<SimulationClock>()?;
        clock.advance(dt);
        if clock.year_change() {
            info!(year_bc = clock.year_bc(), "year_changed");
        } else if clock.day_change() {
            debug!(year_bc = clock.year_bc(), day = clock.day(), "day_changed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{ContextId, SystemMode};

    #[test]
    fn time_system_runs_in_any_context() {
        let mut world = World::new();
        world
            .set_singleton(SimulationClock::new(450, 1, 10.0))
            .expect("clock");
        world
            .add_system(TimeSystem, ContextId::UNIVERSAL, SystemMode::SingleThreaded)
            .expect("add system");
        world.change_context(ContextId(3));

        let report = world.update(10.0);

        assert!(report.is_clean());
        let clock = world.get_singleton::<SimulationClock>().expect("clock");
        assert_eq!(clock.day(), 2);
        assert!(clock.day_change());
    }

    #[test]
    fn missing_clock_fails_only_this_system() {
        let mut world = World::new();
        world
            .add_system(TimeSystem, ContextId::UNIVERSAL, SystemMode::SingleThreaded)
            .expect("add system");
        let report = world.update(1.0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].system, "time");
    }
}
