//! The closed set of AI actions and what each one does.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use strategos_engine::ecs::{Component, EcsError, Entity, Name, World};
use strategos_engine::spatial::{spheres_collide, Collider, SceneGraph, Transform};
use strategos_engine::time::{days_between, SimulationClock, Timestamp};

use super::components::{
    BehaviorState, CityState, EventTimestamps, GameRng, InBattle, Party, Target, Unit,
    EVENT_PATROLLED, EVENT_RESTED,
};
use super::interaction::{Interaction, InteractionQueue};

pub(crate) const REST_HOURS: f32 = 6.0;
pub(crate) const PATROL_WAYPOINTS: usize = 6;
pub(crate) const PATROL_RADIUS: f32 = 12.0;
pub(crate) const PATROL_INTERVAL_DAYS: f32 = 3.0;
pub(crate) const DEFAULT_UNIT_RADIUS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ActionKind {
    Rest,
    PatrolRulingTown,
    VisitRandomCityState,
    SeekUnitFight,
}

impl ActionKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::PatrolRulingTown => "patrol_ruling_town",
            Self::VisitRandomCityState => "visit_random_city_state",
            Self::SeekUnitFight => "seek_unit_fight",
        }
    }

    pub(crate) fn behavior(self) -> BehaviorState {
        match self {
            Self::Rest => BehaviorState::Resting,
            Self::PatrolRulingTown => BehaviorState::Patrolling,
            Self::VisitRandomCityState => BehaviorState::Travelling,
            Self::SeekUnitFight => BehaviorState::Seeking,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Applicability {
    NotApplicable,
    Low,
    Medium,
    High,
}

/// Registered actions. Agents refer to their action by index into this list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActionSet {
    actions: Vec<ActionKind>,
}

impl Default for ActionSet {
    fn default() -> Self {
        Self {
            actions: vec![
                ActionKind::Rest,
                ActionKind::PatrolRulingTown,
                ActionKind::VisitRandomCityState,
                ActionKind::SeekUnitFight,
            ],
        }
    }
}

impl ActionSet {
    pub(crate) fn get(&self, index: usize) -> Option<ActionKind> {
        self.actions.get(index).copied()
    }

    #[cfg(test)]
    pub(crate) fn only(actions: Vec<ActionKind>) -> Self {
        Self { actions }
    }

    #[cfg(test)]
    pub(crate) fn index_of(&self, kind: ActionKind) -> Option<usize> {
        self.actions.iter().position(|candidate| *candidate == kind)
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, ActionKind)> + '_ {
        self.actions.iter().copied().enumerate()
    }
}

impl Component for ActionSet {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionProgress {
    Ongoing,
    Finished,
}

/// Runtime data of the action an agent is executing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ActionState {
    Rest,
    Patrol { waypoints: VecDeque<Vec3> },
    Visit { city: Option<Entity> },
    Seek { opponent: Option<Entity> },
}

pub(crate) fn applicability(
    kind: ActionKind,
    world: &World,
    entity: Entity,
) -> Result<Applicability, EcsError> {
    let now = world.get_singleton::<SimulationClock>()?.now();
    let since = |event: &str| -> Option<f32> {
        world
            .get_component::<EventTimestamps>(entity)
            .ok()
            .and_then(|events| events.get(event))
            .map(|at| days_between(at, now))
    };

    Ok(match kind {
        ActionKind::Rest => {
            if world.get_component::<Unit>(entity)?.resting_duration > 0.0 {
                Applicability::NotApplicable
            } else {
                match since(EVENT_RESTED) {
                    Some(days) if days < 1.0 => Applicability::Low,
                    Some(days) if days < 2.0 => Applicability::Medium,
                    _ => Applicability::High,
                }
            }
        }
        ActionKind::PatrolRulingTown => {
            if ruled_town(world, entity)?.is_none() {
                Applicability::NotApplicable
            } else if since(EVENT_PATROLLED).is_some_and(|days| days < PATROL_INTERVAL_DAYS) {
                Applicability::Low
            } else {
                Applicability::High
            }
        }
        ActionKind::VisitRandomCityState => {
            if world.entities_with::<CityState>()?.is_empty() {
                Applicability::NotApplicable
            } else {
                Applicability::Medium
            }
        }
        ActionKind::SeekUnitFight => Applicability::Low,
    })
}

pub(crate) fn start(kind: ActionKind, world: &mut World, entity: Entity) -> Result<ActionState, EcsError> {
    match kind {
        ActionKind::Rest => {
            let seconds = world
                .get_singleton::<SimulationClock>()?
                .seconds_for_hours(REST_HOURS);
            world.get_component_mut::<Unit>(entity)?.resting_duration = seconds;
            clear_target(world, entity)?;
            Ok(ActionState::Rest)
        }
        ActionKind::PatrolRulingTown => {
            let Some(town) = ruled_town(world, entity)? else {
                return Ok(ActionState::Patrol {
                    waypoints: VecDeque::new(),
                });
            };
            let center = world.get_component::<Transform>(town)?.position;
            let mut waypoints = patrol_waypoints(center);
            let at = now(world)?;
            if let Ok(events) = world.get_component_mut::<EventTimestamps>(entity) {
                events.record(EVENT_PATROLLED, at);
            }
            if let Some(first) = waypoints.pop_front() {
                set_target(world, entity, Target::Point(first))?;
            }
            Ok(ActionState::Patrol { waypoints })
        }
        ActionKind::VisitRandomCityState => {
            let cities = world.entities_with::<CityState>()?;
            if cities.is_empty() {
                return Ok(ActionState::Visit { city: None });
            }
            let pick = world
                .get_singleton_mut::<GameRng>()?
                .0
                .random_range(0..cities.len());
            let city = cities[pick];
            set_target(world, entity, Target::Follow(city))?;
            Ok(ActionState::Visit { city: Some(city) })
        }
        ActionKind::SeekUnitFight => {
            let opponent = nearest_opponent(world, entity)?;
            if let Some(opponent) = opponent {
                set_target(world, entity, Target::Follow(opponent))?;
            }
            Ok(ActionState::Seek { opponent })
        }
    }
}

/// Rebuilds an action restored from a save without starting it again.
pub(crate) fn resume(kind: ActionKind, world: &World, entity: Entity) -> ActionState {
    let followed = match world.get_component::<Target>(entity) {
        Ok(Target::Follow(other)) => Some(*other),
        _ => None,
    };
    match kind {
        ActionKind::Rest => ActionState::Rest,
        ActionKind::PatrolRulingTown => ActionState::Patrol {
            waypoints: remaining_patrol(world, entity),
        },
        ActionKind::VisitRandomCityState => ActionState::Visit { city: followed },
        ActionKind::SeekUnitFight => ActionState::Seek { opponent: followed },
    }
}

pub(crate) fn update(
    state: &mut ActionState,
    world: &mut World,
    entity: Entity,
    dt: f32,
) -> Result<ActionProgress, EcsError> {
    match state {
        ActionState::Rest => {
            let unit = world.get_component_mut::<Unit>(entity)?;
            unit.resting_duration -= dt;
            if unit.resting_duration > 0.0 {
                return Ok(ActionProgress::Ongoing);
            }
            unit.resting_duration = 0.0;
            let at = now(world)?;
            if let Ok(events) = world.get_component_mut::<EventTimestamps>(entity) {
                events.record(EVENT_RESTED, at);
            }
            Ok(ActionProgress::Finished)
        }
        ActionState::Patrol { waypoints } => {
            if world.has_component::<Target>(entity) {
                return Ok(ActionProgress::Ongoing);
            }
            match waypoints.pop_front() {
                Some(next) => {
                    set_target(world, entity, Target::Point(next))?;
                    Ok(ActionProgress::Ongoing)
                }
                None => Ok(ActionProgress::Finished),
            }
        }
        ActionState::Visit { city } => {
            let Some(city) = city.filter(|city| world.has_entity(*city)) else {
                clear_target(world, entity)?;
                return Ok(ActionProgress::Finished);
            };
            if colliding(world, entity, city)? || !world.has_component::<Target>(entity) {
                clear_target(world, entity)?;
                return Ok(ActionProgress::Finished);
            }
            Ok(ActionProgress::Ongoing)
        }
        ActionState::Seek { opponent } => {
            let Some(opponent) = opponent
                .filter(|other| world.has_entity(*other) && !world.has_component::<InBattle>(*other))
            else {
                clear_target(world, entity)?;
                return Ok(ActionProgress::Finished);
            };
            if colliding(world, entity, opponent)? {
                let interaction = Interaction::between(world, entity, opponent);
                if world
                    .get_singleton_mut::<InteractionQueue>()?
                    .push(interaction)
                    .is_err()
                {
                    // slot taken this tick; retry next tick
                    return Ok(ActionProgress::Ongoing);
                }
                clear_target(world, entity)?;
                return Ok(ActionProgress::Finished);
            }
            if !world.has_component::<Target>(entity) {
                return Ok(ActionProgress::Finished);
            }
            Ok(ActionProgress::Ongoing)
        }
    }
}

fn now(world: &World) -> Result<Timestamp, EcsError> {
    Ok(world.get_singleton::<SimulationClock>()?.now())
}

/// The city-state this unit rules, if any.
pub(crate) fn ruled_town(world: &World, entity: Entity) -> Result<Option<Entity>, EcsError> {
    let Ok(name) = world.get_component::<Name>(entity) else {
        return Ok(None);
    };
    for city in world.entities_with::<CityState>()? {
        if world.get_component::<CityState>(city)?.ruler.as_deref() == Some(name.as_str()) {
            return Ok(Some(city));
        }
    }
    Ok(None)
}

pub(crate) fn patrol_waypoints(center: Vec3) -> VecDeque<Vec3> {
    (0..PATROL_WAYPOINTS)
        .map(|index| {
            let angle = TAU * index as f32 / PATROL_WAYPOINTS as f32;
            center + Vec3::new(angle.cos(), angle.sin(), 0.0) * PATROL_RADIUS
        })
        .collect()
}

/// Waypoints still ahead of a restored patrol. The route around the ruled town
/// is rebuilt and picks up after the waypoint being walked to, or after the one
/// nearest the unit when it has no target.
fn remaining_patrol(world: &World, entity: Entity) -> VecDeque<Vec3> {
    let Ok(Some(town)) = ruled_town(world, entity) else {
        return VecDeque::new();
    };
    let Ok(center) = world.get_component::<Transform>(town).map(|town| town.position) else {
        return VecDeque::new();
    };
    let mut route = patrol_waypoints(center);
    let reference = match world.get_component::<Target>(entity) {
        Ok(Target::Point(point)) => *point,
        _ => match world.get_component::<Transform>(entity) {
            Ok(transform) => transform.position,
            Err(_) => return route,
        },
    };
    let reached = route
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.distance_squared(reference)
                .total_cmp(&b.distance_squared(reference))
        })
        .map(|(index, _)| index);
    match reached {
        Some(index) => route.split_off(index + 1),
        None => route,
    }
}

/// Closest unit with a strictly smaller party that is not recovering from a
/// battle.
pub(crate) fn nearest_opponent(world: &World, entity: Entity) -> Result<Option<Entity>, EcsError> {
    let own_size = world
        .get_component::<Party>(entity)
        .map(Party::size)
        .unwrap_or(0);
    let origin = world.get_component::<Transform>(entity)?.planar();

    let mut best: Option<(f32, Entity)> = None;
    for other in world.entities_with::<Party>()? {
        if other == entity
            || world.has_component::<InBattle>(other)
            || !world.has_component::<Unit>(other)
            || world.get_component::<Party>(other)?.size() >= own_size
        {
            continue;
        }
        let Ok(transform) = world.get_component::<Transform>(other) else {
            continue;
        };
        let distance = transform.planar().distance_squared(origin);
        match best {
            Some((closest, _)) if closest <= distance => {}
            _ => best = Some((distance, other)),
        }
    }
    Ok(best.map(|(_, other)| other))
}

pub(crate) fn radius_of(world: &World, entity: Entity) -> f32 {
    world
        .get_component::<Collider>(entity)
        .map(|collider| collider.radius)
        .unwrap_or(DEFAULT_UNIT_RADIUS)
}

/// Broad phase through the scene graph when both entities are in it, then the
/// exact sphere test. Entities missing from the graph go straight to the exact
/// test.
pub(crate) fn colliding(world: &World, a: Entity, b: Entity) -> Result<bool, EcsError> {
    if let Ok(graph) = world.get_singleton::<SceneGraph>() {
        let tree = graph.tree();
        if tree.contains(a) && tree.contains(b) && !graph.candidates(a).contains(&b) {
            return Ok(false);
        }
    }
    let pa = world.get_component::<Transform>(a)?.position;
    let pb = world.get_component::<Transform>(b)?.position;
    Ok(spheres_collide(pa, radius_of(world, a), pb, radius_of(world, b)))
}

pub(crate) fn set_target(world: &mut World, entity: Entity, target: Target) -> Result<(), EcsError> {
    match world.get_component_mut::<Target>(entity) {
        Ok(current) => {
            *current = target;
            Ok(())
        }
        Err(_) => world.add_component(entity, target),
    }
}

pub(crate) fn clear_target(world: &mut World, entity: Entity) -> Result<(), EcsError> {
    if world.has_component::<Target>(entity) {
        world.remove_component::<Target>(entity)?;
    }
    Ok(())
}
