//! Overworld save files.
//!
//! A load is validated in full before the world is touched: unknown unit
//! types, unresolvable targets or out-of-range values abort it with
//! [`SaveError::SaveSchemaMismatch`] and leave the running game as it was.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strategos_engine::ecs::{EcsError, Entity, Name, World};
use strategos_engine::spatial::Transform;
use strategos_engine::time::{SimulationClock, Timestamp, DAYS_PER_YEAR};
use strategos_engine::write_text_atomic;
use thiserror::Error;
use tracing::info;

use super::actions::{set_target, ActionSet};
use super::ai::Agent;
use super::components::{CityState, Content, EventTimestamps, Party, Player, Target, Unit};
use super::spawn::{resolve_unit, spawn_resolved, Controller, ResolvedUnit, SpawnError, UnitSpawn};

pub(crate) const SAVE_FILE_NAME: &str = "overworld.save.json";
const NO_ACTION: i64 = -1;

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error("failed to access save '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("save does not match the expected schema at {path}: {message}")]
    SaveSchemaMismatch { path: String, message: String },
    #[error("world has no player unit to save")]
    NoPlayer,
    #[error(transparent)]
    Ecs(#[from] EcsError),
}

fn mismatch(path: impl Into<String>, message: impl Into<String>) -> SaveError {
    SaveError::SaveSchemaMismatch {
        path: path.into(),
        message: message.into(),
    }
}

fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> SaveError {
    mismatch(path, format!("expected {expected}, got {actual}"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SaveGame {
    pub(crate) overworld_state: SavedOverworldState,
    pub(crate) player: SavedPlayer,
    pub(crate) overworld_units: Vec<SavedUnit>,
    pub(crate) city_states_info: Vec<SavedCityState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedOverworldState {
    /// Intra-day phase in radians.
    pub(crate) time_accumulator: f32,
    pub(crate) current_day: u32,
    pub(crate) current_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedEvent {
    pub(crate) event_name: String,
    pub(crate) year: i32,
    pub(crate) day: u32,
    pub(crate) phase: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedPlayer {
    pub(crate) unit_name: String,
    pub(crate) unit_type: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
    pub(crate) rx: f32,
    pub(crate) ry: f32,
    pub(crate) rz: f32,
    pub(crate) resting_duration: f32,
    #[serde(default)]
    pub(crate) event_timestamps: Vec<SavedEvent>,
    #[serde(default)]
    pub(crate) party: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedUnit {
    pub(crate) name: String,
    pub(crate) unit_type: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
    pub(crate) rx: f32,
    pub(crate) ry: f32,
    pub(crate) rz: f32,
    pub(crate) resting_duration: f32,
    /// Index into the registered actions, `-1` when idle.
    pub(crate) last_action_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) target_position: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) target_unit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) target_city_state_name: Option<String>,
    #[serde(default)]
    pub(crate) event_timestamps: Vec<SavedEvent>,
    #[serde(default)]
    pub(crate) party: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedCityState {
    pub(crate) name: String,
    pub(crate) renown: u32,
    pub(crate) garisson: u32,
    #[serde(default)]
    pub(crate) ruler: Option<String>,
}

pub(crate) fn save_path(saves_dir: &Path) -> PathBuf {
    saves_dir.join(SAVE_FILE_NAME)
}

pub(crate) fn build_save(world: &World) -> Result<SaveGame, SaveError> {
    let clock = world.get_singleton::<SimulationClock>()?;
    let overworld_state = SavedOverworldState {
        time_accumulator: clock.phase(),
        current_day: clock.day(),
        current_year: clock.year_bc(),
    };

    let player_entity = world
        .entities_with::<Player>()?
        .into_iter()
        .next()
        .ok_or(SaveError::NoPlayer)?;
    let core = saved_core(world, player_entity)?;
    let player = SavedPlayer {
        unit_name: core.name,
        unit_type: core.unit_type,
        x: core.position.x,
        y: core.position.y,
        z: core.position.z,
        rx: core.rotation.x,
        ry: core.rotation.y,
        rz: core.rotation.z,
        resting_duration: core.resting_duration,
        event_timestamps: core.events,
        party: core.party,
    };

    let mut overworld_units = Vec::new();
    for entity in world.entities_with::<Agent>()? {
        if !world.has_component::<Unit>(entity) {
            continue;
        }
        let core = saved_core(world, entity)?;
        let last_action_index = world
            .get_component::<Agent>(entity)?
            .persisted_action_index()
            .map_or(NO_ACTION, |index| index as i64);

        let mut saved = SavedUnit {
            name: core.name,
            unit_type: core.unit_type,
            x: core.position.x,
            y: core.position.y,
            z: core.position.z,
            rx: core.rotation.x,
            ry: core.rotation.y,
            rz: core.rotation.z,
            resting_duration: core.resting_duration,
            last_action_index,
            target_position: None,
            target_unit_name: None,
            target_city_state_name: None,
            event_timestamps: core.events,
            party: core.party,
        };
        match world.get_component::<Target>(entity) {
            Ok(Target::Point(point)) => saved.target_position = Some(point.to_array()),
            Ok(Target::Follow(other)) if world.has_component::<CityState>(*other) => {
                saved.target_city_state_name = entity_name(world, *other)
            }
            Ok(Target::Follow(other)) => saved.target_unit_name = entity_name(world, *other),
            Err(_) => {}
        }
        overworld_units.push(saved);
    }

    let mut city_states_info = Vec::new();
    for entity in world.entities_with::<CityState>()? {
        let city = world.get_component::<CityState>(entity)?;
        city_states_info.push(SavedCityState {
            name: entity_name(world, entity).unwrap_or_else(|| city.def_name.clone()),
            renown: city.renown,
            garisson: city.garrison,
            ruler: city.ruler.clone(),
        });
    }

    Ok(SaveGame {
        overworld_state,
        player,
        overworld_units,
        city_states_info,
    })
}

struct SavedCore {
    name: String,
    unit_type: String,
    position: Vec3,
    rotation: Vec3,
    resting_duration: f32,
    events: Vec<SavedEvent>,
    party: Vec<String>,
}

fn saved_core(world: &World, entity: Entity) -> Result<SavedCore, SaveError> {
    let unit = world.get_component::<Unit>(entity)?;
    let transform = world.get_component::<Transform>(entity)?;
    let events = world
        .get_component::<EventTimestamps>(entity)
        .map(|events| {
            events
                .iter()
                .map(|(event_name, at)| SavedEvent {
                    event_name: event_name.to_string(),
                    year: at.year,
                    day: at.day,
                    phase: at.phase,
                })
                .collect()
        })
        .unwrap_or_default();
    let party = world
        .get_component::<Party>(entity)
        .map(|party| party.members.clone())
        .unwrap_or_default();
    Ok(SavedCore {
        name: entity_name(world, entity).unwrap_or_default(),
        unit_type: unit.unit_type.clone(),
        position: transform.position,
        rotation: transform.rotation,
        resting_duration: unit.resting_duration,
        events,
        party,
    })
}

fn entity_name(world: &World, entity: Entity) -> Option<String> {
    world
        .get_component::<Name>(entity)
        .ok()
        .map(|name| name.as_str().to_string())
}

pub(crate) fn write_save(path: &Path, save: &SaveGame) -> Result<(), SaveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SaveError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(save).map_err(SaveError::Encode)?;
    write_text_atomic(path, &json).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        units = save.overworld_units.len(),
        city_states = save.city_states_info.len(),
        "save_written"
    );
    Ok(())
}

pub(crate) fn read_save(path: &Path) -> Result<SaveGame, SaveError> {
    let raw = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_save(&raw)
}

pub(crate) fn parse_save(raw: &str) -> Result<SaveGame, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let message = error.into_inner().to_string();
        mismatch(if path.is_empty() { ".".to_string() } else { path }, message)
    })
}

/// Unit types resolved during validation, so applying cannot fail on content.
pub(crate) struct LoadPlan {
    units: HashMap<String, ResolvedUnit>,
}

/// Checks every reference in `save` against the current content and world.
/// Only the model cache may change.
pub(crate) fn validate(world: &mut World, save: &SaveGame) -> Result<LoadPlan, SaveError> {
    let state = &save.overworld_state;
    if !state.time_accumulator.is_finite() {
        return Err(expected_actual(
            "overworld_state.time_accumulator",
            "finite number",
            state.time_accumulator,
        ));
    }
    if !(1..=DAYS_PER_YEAR).contains(&state.current_day) {
        return Err(expected_actual(
            "overworld_state.current_day",
            format!("1..={DAYS_PER_YEAR}"),
            state.current_day,
        ));
    }

    let mut plan = LoadPlan {
        units: HashMap::new(),
    };
    let player = &save.player;
    check_finite(
        "player",
        &[player.x, player.y, player.z, player.rx, player.ry, player.rz, player.resting_duration],
    )?;
    resolve_into(world, &mut plan, "player.unit_type", &player.unit_type)?;
    check_party(world, "player.party", &player.party)?;

    let mut names = HashSet::new();
    names.insert(player.unit_name.as_str());
    let action_count = world.get_singleton::<ActionSet>()?.len() as i64;
    for (index, unit) in save.overworld_units.iter().enumerate() {
        let at = format!("overworld_units[{index}]");
        check_finite(
            &at,
            &[unit.x, unit.y, unit.z, unit.rx, unit.ry, unit.rz, unit.resting_duration],
        )?;
        if !names.insert(unit.name.as_str()) {
            return Err(mismatch(format!("{at}.name"), format!("duplicate unit name '{}'", unit.name)));
        }
        resolve_into(world, &mut plan, &format!("{at}.unit_type"), &unit.unit_type)?;
        check_party(world, &format!("{at}.party"), &unit.party)?;
        if unit.last_action_index < NO_ACTION || unit.last_action_index >= action_count {
            return Err(expected_actual(
                format!("{at}.last_action_index"),
                format!("-1..{action_count}"),
                unit.last_action_index,
            ));
        }
        let targets = [
            unit.target_position.is_some(),
            unit.target_unit_name.is_some(),
            unit.target_city_state_name.is_some(),
        ];
        if targets.iter().filter(|set| **set).count() > 1 {
            return Err(mismatch(at, "more than one target is set"));
        }
        if let Some(point) = unit.target_position {
            check_finite(&format!("{at}.target_position"), &point)?;
        }
    }

    for (index, unit) in save.overworld_units.iter().enumerate() {
        if let Some(target) = &unit.target_unit_name {
            if !names.contains(target.as_str()) {
                return Err(mismatch(
                    format!("overworld_units[{index}].target_unit_name"),
                    format!("unknown unit '{target}'"),
                ));
            }
        }
        if let Some(city) = &unit.target_city_state_name {
            if city_entity(world, city)?.is_none() {
                return Err(mismatch(
                    format!("overworld_units[{index}].target_city_state_name"),
                    format!("unknown city-state '{city}'"),
                ));
            }
        }
    }

    for (index, city) in save.city_states_info.iter().enumerate() {
        if city_entity(world, &city.name)?.is_none() {
            return Err(mismatch(
                format!("city_states_info[{index}].name"),
                format!("unknown city-state '{}'", city.name),
            ));
        }
        if let Some(ruler) = &city.ruler {
            if !names.contains(ruler.as_str()) {
                return Err(mismatch(
                    format!("city_states_info[{index}].ruler"),
                    format!("unknown unit '{ruler}'"),
                ));
            }
        }
    }

    Ok(plan)
}

fn check_finite(path: &str, values: &[f32]) -> Result<(), SaveError> {
    match values.iter().find(|value| !value.is_finite()) {
        Some(value) => Err(expected_actual(path, "finite numbers", value)),
        None => Ok(()),
    }
}

fn resolve_into(
    world: &mut World,
    plan: &mut LoadPlan,
    path: &str,
    unit_type: &str,
) -> Result<(), SaveError> {
    if plan.units.contains_key(unit_type) {
        return Ok(());
    }
    match resolve_unit(world, unit_type) {
        Ok(resolved) => {
            plan.units.insert(unit_type.to_string(), resolved);
            Ok(())
        }
        Err(SpawnError::Ecs(error)) => Err(SaveError::Ecs(error)),
        Err(error) => Err(mismatch(path, error.to_string())),
    }
}

fn check_party(world: &World, path: &str, party: &[String]) -> Result<(), SaveError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    for (index, member) in party.iter().enumerate() {
        if content.unit_def_by_name(member).is_none() {
            return Err(mismatch(
                format!("{path}[{index}]"),
                format!("unknown unit type '{member}'"),
            ));
        }
    }
    Ok(())
}

fn city_entity(world: &World, name: &str) -> Result<Option<Entity>, EcsError> {
    for entity in world.find_all_entities_with_name(name) {
        if world.has_component::<CityState>(entity) {
            return Ok(Some(entity));
        }
    }
    Ok(None)
}

/// Replaces every unit in the world with the saved ones.
pub(crate) fn apply(world: &mut World, save: SaveGame, mut plan: LoadPlan) -> Result<(), SaveError> {
    for entity in world.entities_with::<Unit>()? {
        world.destroy_entity(entity)?;
    }

    let state = &save.overworld_state;
    world.get_singleton_mut::<SimulationClock>()?.restore(
        state.current_year,
        state.current_day,
        state.time_accumulator,
    );

    let player = save.player;
    let resolved = take_resolved(&mut plan, &player.unit_type)?;
    let player_entity = spawn_resolved(
        world,
        UnitSpawn {
            name: player.unit_name.clone(),
            unit_type: player.unit_type.clone(),
            transform: Transform {
                position: Vec3::new(player.x, player.y, player.z),
                rotation: Vec3::new(player.rx, player.ry, player.rz),
            },
            party: player.party,
            controller: Controller::Player,
        },
        resolved,
    )?;
    restore_unit_state(world, player_entity, player.resting_duration, &player.event_timestamps)?;

    let mut by_name = HashMap::new();
    by_name.insert(player.unit_name, player_entity);
    let mut spawned = Vec::with_capacity(save.overworld_units.len());
    for unit in save.overworld_units {
        let resolved = take_resolved(&mut plan, &unit.unit_type)?;
        let entity = spawn_resolved(
            world,
            UnitSpawn {
                name: unit.name.clone(),
                unit_type: unit.unit_type.clone(),
                transform: Transform {
                    position: Vec3::new(unit.x, unit.y, unit.z),
                    rotation: Vec3::new(unit.rx, unit.ry, unit.rz),
                },
                party: unit.party.clone(),
                controller: Controller::Ai,
            },
            resolved,
        )?;
        restore_unit_state(world, entity, unit.resting_duration, &unit.event_timestamps)?;
        by_name.insert(unit.name.clone(), entity);
        spawned.push((entity, unit));
    }

    for (entity, unit) in &spawned {
        let target = if let Some(point) = unit.target_position {
            Some(Target::Point(Vec3::from_array(point)))
        } else if let Some(name) = &unit.target_unit_name {
            by_name.get(name).map(|other| Target::Follow(*other))
        } else if let Some(name) = &unit.target_city_state_name {
            city_entity(world, name)?.map(Target::Follow)
        } else {
            None
        };
        if let Some(target) = target {
            set_target(world, *entity, target)?;
        }
    }

    for city in save.city_states_info {
        if let Some(entity) = city_entity(world, &city.name)? {
            let state = world.get_component_mut::<CityState>(entity)?;
            state.renown = city.renown;
            state.garrison = city.garisson;
            state.ruler = city.ruler;
        }
    }

    for (entity, unit) in &spawned {
        if let Ok(index) = usize::try_from(unit.last_action_index) {
            world.get_component_mut::<Agent>(*entity)?.last_action_index = Some(index);
        }
    }
    Ok(())
}

fn take_resolved(plan: &mut LoadPlan, unit_type: &str) -> Result<ResolvedUnit, SaveError> {
    plan.units
        .get(unit_type)
        .cloned()
        .ok_or_else(|| mismatch("unit_type", format!("unit type '{unit_type}' was not validated")))
}

fn restore_unit_state(
    world: &mut World,
    entity: Entity,
    resting_duration: f32,
    events: &[SavedEvent],
) -> Result<(), EcsError> {
    world.get_component_mut::<Unit>(entity)?.resting_duration = resting_duration.max(0.0);
    let timestamps = world.get_component_mut::<EventTimestamps>(entity)?;
    for event in events {
        timestamps.record(
            &event.event_name,
            Timestamp::new(event.year, event.day, event.phase),
        );
    }
    Ok(())
}

/// Reads, validates and applies the save at `path`.
pub(crate) fn load_save(world: &mut World, path: &Path) -> Result<(), SaveError> {
    let save = read_save(path)?;
    let plan = validate(world, &save)?;
    let units = save.overworld_units.len();
    apply(world, save, plan)?;
    info!(path = %path.display(), units, "save_loaded");
    Ok(())
}
