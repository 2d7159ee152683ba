//! Entity construction from content definitions.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::Rng;
use strategos_engine::animation::{AnimatedModel, AnimatedRenderable};
use strategos_engine::ecs::{EcsError, Entity, World};
use strategos_engine::spatial::{Collider, Transform};
use strategos_engine::{AssetError, UnitDef};
use thiserror::Error;
use tracing::debug;

use super::actions::DEFAULT_UNIT_RADIUS;
use super::ai::Agent;
use super::components::{CityState, Content, EventTimestamps, GameRng, Models, Party, Player, Unit};

pub(crate) const CITY_STATE_RADIUS: f32 = 3.0;

#[derive(Debug, Error)]
pub(crate) enum SpawnError {
    #[error(transparent)]
    Ecs(#[from] EcsError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("unknown unit type '{0}'")]
    UnknownUnitType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Controller {
    Player,
    Ai,
}

/// Everything needed to place one unit on the map.
#[derive(Debug, Clone)]
pub(crate) struct UnitSpawn {
    pub(crate) name: String,
    pub(crate) unit_type: String,
    pub(crate) transform: Transform,
    pub(crate) party: Vec<String>,
    pub(crate) controller: Controller,
}

/// Definition and model for a unit type, resolved before any entity exists.
#[derive(Clone)]
pub(crate) struct ResolvedUnit {
    def: UnitDef,
    model: Arc<AnimatedModel>,
}

pub(crate) fn resolve_unit(world: &mut World, unit_type: &str) -> Result<ResolvedUnit, SpawnError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    let def = content
        .unit_def_by_name(unit_type)
        .cloned()
        .ok_or_else(|| SpawnError::UnknownUnitType(unit_type.to_string()))?;
    let model = world.get_singleton_mut::<Models>()?.0.get_or_load(&def.model)?;
    Ok(ResolvedUnit { def, model })
}

pub(crate) fn spawn_unit(world: &mut World, spawn: UnitSpawn) -> Result<Entity, SpawnError> {
    let resolved = resolve_unit(world, &spawn.unit_type)?;
    Ok(spawn_resolved(world, spawn, resolved)?)
}

/// Builds the unit entity. Fails only on ECS errors.
pub(crate) fn spawn_resolved(
    world: &mut World,
    spawn: UnitSpawn,
    resolved: ResolvedUnit,
) -> Result<Entity, EcsError> {
    let ResolvedUnit { def, model } = resolved;
    let idle = model.clip_index("idle").unwrap_or(0);

    let entity = world.create_entity_with_name(spawn.name.as_str())?;
    world.add_component(entity, spawn.transform)?;
    world.add_component(
        entity,
        Collider {
            radius: DEFAULT_UNIT_RADIUS * def.scale.max(0.1),
        },
    )?;
    world.add_component(
        entity,
        Unit {
            unit_type: def.def_name.clone(),
            damage: def.damage,
            health: def.health,
            speed: def.speed,
            ranged: def.ranged,
            attack_range: def.attack_range,
            resting_duration: 0.0,
        },
    )?;
    world.add_component(
        entity,
        Party {
            members: spawn.party,
        },
    )?;
    world.add_component(entity, EventTimestamps::default())?;
    world.add_component(entity, AnimatedRenderable::new(model, idle))?;
    match spawn.controller {
        Controller::Player => world.add_component(entity, Player)?,
        Controller::Ai => world.add_component(entity, Agent::default())?,
    }

    debug!(?entity, name = %spawn.name, unit_type = %def.def_name, "unit_spawned");
    Ok(entity)
}

/// One entity per `CityStateDef`, with no ruler yet.
pub(crate) fn spawn_city_states(world: &mut World) -> Result<Vec<Entity>, EcsError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    let mut cities = Vec::with_capacity(content.city_state_defs().len());
    for def in content.city_state_defs() {
        let entity = world.create_entity_with_name(def.def_name.as_str())?;
        world.add_component(
            entity,
            Transform {
                position: def.position,
                rotation: def.rotation,
            },
        )?;
        world.add_component(
            entity,
            Collider {
                radius: CITY_STATE_RADIUS,
            },
        )?;
        world.add_component(
            entity,
            CityState {
                def_name: def.def_name.clone(),
                renown: def.renown,
                garrison: def.garrison,
                ruler: None,
            },
        )?;
        cities.push(entity);
    }
    Ok(cities)
}

/// A name from the content list no live entity carries yet, else a numbered
/// fallback.
pub(crate) fn pick_name(world: &mut World, fallback: &str) -> Result<String, EcsError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    let free = content
        .names()
        .iter()
        .filter(|name| world.find_entity_with_name(name).is_none())
        .collect::<Vec<_>>();
    if !free.is_empty() {
        let pick = world
            .get_singleton_mut::<GameRng>()?
            .0
            .random_range(0..free.len());
        return Ok(free[pick].clone());
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{fallback} {suffix}");
        if world.find_entity_with_name(&candidate).is_none() {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

pub(crate) fn random_unit_type(world: &mut World) -> Result<String, SpawnError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    let defs = content.unit_defs();
    if defs.is_empty() {
        return Err(SpawnError::UnknownUnitType(String::new()));
    }
    let pick = world
        .get_singleton_mut::<GameRng>()?
        .0
        .random_range(0..defs.len());
    Ok(defs[pick].def_name.clone())
}

/// Random point within `radius` of `center` on the map plane.
pub(crate) fn scatter(world: &mut World, center: Vec3, radius: f32) -> Result<Vec3, EcsError> {
    let rng = &mut world.get_singleton_mut::<GameRng>()?.0;
    let offset = Vec2::new(
        rng.random_range(-radius..=radius),
        rng.random_range(-radius..=radius),
    );
    Ok(center + offset.extend(0.0))
}
