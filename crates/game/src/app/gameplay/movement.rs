use std::f32::consts::{PI, TAU};

use glam::Vec2;
use strategos_engine::animation::AnimatedRenderable;
use strategos_engine::ecs::{
    ComponentMask, EcsError, Entity, EntityRow, SharedState, System, World,
};
use strategos_engine::spatial::{spheres_collide, SpeedField, Transform};
use tracing::{debug, trace};

use super::actions::radius_of;
use super::components::{Player, Target, Unit};
use super::interaction::{Interaction, InteractionQueue};

/// Map units per second at speed multiplier 1 on flat ground.
pub(crate) const BASE_SPEED: f32 = 4.0;
pub(crate) const TURN_RATE: f32 = 4.0 * PI;
pub(crate) const CONTACT_THRESHOLD: f32 = 0.5;

enum Step {
    Drop,
    Arrived,
    Move { transform: Transform, arrived: bool },
}

/// Turns each unit toward its target and moves it along its heading. The target
/// is removed on arrival, or when a followed entity is gone. A player arriving
/// at a followed unit queues an interaction with it.
#[derive(Debug, Default)]
pub(crate) struct TargetingSystem;

impl System for TargetingSystem {
    fn name(&self) -> &'static str {
        "targeting"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<Target>()?
            .with::<Transform>()?
            .with::<Unit>()
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) -> Result<(), EcsError> {
        for &entity in entities {
            let arrived = match plan_step(world, entity, dt)? {
                Step::Drop => {
                    trace!(?entity, "target_dropped");
                    world.remove_component::<Target>(entity)?;
                    continue;
                }
                Step::Arrived => true,
                Step::Move { transform, arrived } => {
                    *world.get_component_mut::<Transform>(entity)? = transform;
                    arrived
                }
            };
            if arrived && settle_arrival(world, entity)? {
                world.remove_component::<Target>(entity)?;
            }
        }
        Ok(())
    }
}

/// Returns false when a player's interaction found the queue slot taken; the
/// target then stays and arrival is retried next tick.
fn settle_arrival(world: &mut World, entity: Entity) -> Result<bool, EcsError> {
    let Target::Follow(other) = *world.get_component::<Target>(entity)? else {
        return Ok(true);
    };
    if !world.has_component::<Player>(entity) || !world.has_component::<Unit>(other) {
        return Ok(true);
    }
    let interaction = Interaction::between(world, entity, other);
    let queued = world
        .get_singleton_mut::<InteractionQueue>()?
        .push(interaction)
        .is_ok();
    if queued {
        debug!(?entity, ?other, "player_interaction_queued");
    }
    Ok(queued)
}

fn plan_step(world: &World, entity: Entity, dt: f32) -> Result<Step, EcsError> {
    let target = *world.get_component::<Target>(entity)?;
    let transform = *world.get_component::<Transform>(entity)?;
    let speed = world.get_component::<Unit>(entity)?.speed;
    let own_radius = radius_of(world, entity);

    let (goal, follow_radius) = match target {
        Target::Point(point) => (point, None),
        Target::Follow(other) => match world.get_component::<Transform>(other) {
            Ok(followed) => (followed.position, Some(radius_of(world, other))),
            Err(_) => return Ok(Step::Drop),
        },
    };

    let reached = |position: glam::Vec3| {
        position.truncate().distance(goal.truncate()) < CONTACT_THRESHOLD
            || follow_radius.is_some_and(|radius| spheres_collide(position, own_radius, goal, radius))
    };
    if reached(transform.position) {
        return Ok(Step::Arrived);
    }

    let delta = goal.truncate() - transform.planar();
    let desired_yaw = -delta.x.atan2(delta.y);
    let yaw = turn_toward(transform.yaw(), desired_yaw, TURN_RATE * dt);

    let terrain = world
        .get_singleton::<SpeedField>()
        .map(|field| field.sample(transform.planar()))
        .unwrap_or(1.0);
    let mut step = BASE_SPEED * speed * terrain * dt;
    if follow_radius.is_none() {
        step = step.min(delta.length());
    }

    let heading = Vec2::new(-yaw.sin(), yaw.cos());
    let mut moved = transform;
    moved.rotation.z = yaw;
    moved.position += (heading * step).extend(0.0);
    Ok(Step::Move {
        transform: moved,
        arrived: reached(moved.position),
    })
}

/// Rotates `current` toward `desired` by at most `max_delta`, taking the short
/// way across ±π. The result is wrapped to (-π, π].
pub(crate) fn turn_toward(current: f32, desired: f32, max_delta: f32) -> f32 {
    let diff = wrap_angle(desired - current);
    if diff.abs() <= max_delta {
        wrap_angle(desired)
    } else {
        wrap_angle(current + diff.signum() * max_delta)
    }
}

pub(crate) fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Plays `walk` while a unit has a target and `idle` otherwise. Runs on
/// worker slices; each row only touches its own renderable.
#[derive(Debug, Default)]
pub(crate) struct UnitAnimationSystem;

impl System for UnitAnimationSystem {
    fn name(&self) -> &'static str {
        "unit_animation"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<Unit>()?.with::<AnimatedRenderable>()
    }

    fn update_chunk(
        &self,
        rows: &mut [EntityRow<'_>],
        _shared: &SharedState<'_>,
        _dt: f32,
    ) -> Result<(), EcsError> {
        for row in rows.iter_mut() {
            let clip = if row.has::<Target>() { "walk" } else { "idle" };
            let renderable = row.get_mut::<AnimatedRenderable>()?;
            let already = renderable
                .model()
                .clip(renderable.current_clip())
                .is_some_and(|current| current.name == clip);
            if !already {
                renderable.play_named(clip);
            }
        }
        Ok(())
    }
}
