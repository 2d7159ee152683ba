mod actions;
mod ai;
mod components;
mod interaction;
mod models;
mod movement;
mod save;
mod spawn;

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::Rng;
use strategos_engine::animation::SkeletalAnimationSystem;
use strategos_engine::ecs::{ContextId, EcsError, Entity, Name, SystemMode, World};
use strategos_engine::spatial::{
    HeightmapParams, QuadTreeConfig, SceneGraph, SceneGraphSystem, SpeedField, Transform,
};
use strategos_engine::time::{
    SimulationClock, TimeSystem, DEFAULT_DAY_DURATION_SECS, DEFAULT_START_YEAR_BC,
};
use strategos_engine::{
    load_def_database, resolve_app_paths, AssetCache, ContentRequest, DefDatabase, GameHost,
    HostControl, HostError,
};
use tracing::{debug, error, info, warn};

use self::actions::ActionSet;
use self::ai::{Agent, AiDispatchSystem};
use self::components::{CityState, Content, GameRng, Models, Unit, MAP_CONTEXT, VIEW_CONTEXT};
use self::interaction::{
    conclude_player_battle, dismiss_view, ActiveBattle, BattleCooldownSystem, HistoryLog,
    InteractionQueue, InteractionSystem, PendingView,
};
use self::models::builtin_model_loader;
use self::movement::{TargetingSystem, UnitAnimationSystem};
use self::spawn::{
    pick_name, random_unit_type, scatter, spawn_city_states, spawn_unit, Controller, SpawnError,
    UnitSpawn,
};

const PLAYER_UNIT_TYPE: &str = "hoplite";
const PLAYER_PARTY_SIZE: usize = 3;
const RULER_SCATTER_RADIUS: f32 = 6.0;
const WANDERER_SCATTER_RADIUS: f32 = 80.0;
const MAX_AI_PARTY: usize = 6;
const TERRAIN_CELLS: usize = 128;
const TERRAIN_CELL_SIZE: f32 = 8.0;

#[derive(Debug, Clone)]
pub(crate) struct GameConfig {
    pub(crate) day_duration_secs: f32,
    pub(crate) seed: u64,
    pub(crate) enabled_mods: Vec<String>,
    /// AI units on a new map, rulers included.
    pub(crate) agent_count: usize,
    pub(crate) load_on_start: bool,
    pub(crate) save_on_shutdown: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            day_duration_secs: DEFAULT_DAY_DURATION_SECS,
            seed: 0x5EED,
            enabled_mods: Vec::new(),
            agent_count: 8,
            load_on_start: true,
            save_on_shutdown: true,
        }
    }
}

/// World singletons every system relies on. Content is installed separately
/// once it is loaded.
pub(crate) fn install_singletons(world: &mut World, config: &GameConfig) -> Result<(), EcsError> {
    world.set_singleton(SimulationClock::new(
        DEFAULT_START_YEAR_BC,
        1,
        config.day_duration_secs,
    ))?;
    world.set_singleton(SceneGraph::new(QuadTreeConfig::default()))?;
    world.set_singleton(terrain_speed_field())?;
    world.set_singleton(ActionSet::default())?;
    world.set_singleton(GameRng::seeded(config.seed))?;
    world.set_singleton(InteractionQueue::default())?;
    world.set_singleton(PendingView::default())?;
    world.set_singleton(HistoryLog::default())?;
    world.set_singleton(Models(AssetCache::new(builtin_model_loader())))?;
    Ok(())
}

pub(crate) fn install_content(world: &mut World, database: DefDatabase) -> Result<(), EcsError> {
    world.set_singleton(Content(Arc::new(database)))?;
    Ok(())
}

/// Rolling hills with a sea basin in the north-east corner.
fn terrain_speed_field() -> SpeedField {
    let heights = (0..TERRAIN_CELLS * TERRAIN_CELLS)
        .map(|index| {
            let x = (index % TERRAIN_CELLS) as f32;
            let y = (index / TERRAIN_CELLS) as f32;
            let hills = (x * 0.15).sin() * (y * 0.15).cos() * 2.0;
            let basin = ((x - 110.0).powi(2) + (y - 110.0).powi(2)).sqrt() < 12.0;
            if basin {
                -5.0
            } else {
                hills
            }
        })
        .collect::<Vec<_>>();
    let half = TERRAIN_CELLS as f32 * TERRAIN_CELL_SIZE / 2.0;
    SpeedField::from_heightmap(
        &heights,
        TERRAIN_CELLS,
        TERRAIN_CELLS,
        HeightmapParams {
            origin: Vec2::splat(-half),
            cell_size: TERRAIN_CELL_SIZE,
            slope_penalty: 2.0,
            sea_level: -3.0,
        },
    )
    .unwrap_or_else(SpeedField::uniform)
}

/// Registers every system in tick order and starts on the map.
pub(crate) fn register_systems(world: &mut World) -> Result<(), EcsError> {
    world.add_system(TimeSystem, ContextId::UNIVERSAL, SystemMode::SingleThreaded)?;
    world.add_system(AiDispatchSystem, MAP_CONTEXT, SystemMode::SingleThreaded)?;
    world.add_system(TargetingSystem, MAP_CONTEXT, SystemMode::SingleThreaded)?;
    world.add_system(SceneGraphSystem, ContextId::UNIVERSAL, SystemMode::SingleThreaded)?;
    world.add_system(BattleCooldownSystem, MAP_CONTEXT, SystemMode::SingleThreaded)?;
    world.add_system(UnitAnimationSystem, MAP_CONTEXT, SystemMode::MultiThreaded)?;
    world.add_system(
        SkeletalAnimationSystem,
        ContextId::UNIVERSAL,
        SystemMode::MultiThreaded,
    )?;
    world.add_system(InteractionSystem, ContextId::UNIVERSAL, SystemMode::SingleThreaded)?;
    world.change_context(MAP_CONTEXT);
    Ok(())
}

/// Places the player, one ruler per city-state and wandering AI units.
/// Returns the player entity.
pub(crate) fn populate_new_map(world: &mut World, agent_count: usize) -> Result<Entity, SpawnError> {
    let content = Arc::clone(&world.get_singleton::<Content>()?.0);
    let player_type = if content.unit_def_by_name(PLAYER_UNIT_TYPE).is_some() {
        PLAYER_UNIT_TYPE.to_string()
    } else {
        random_unit_type(world)?
    };
    let player_name = pick_name(world, "Strategos")?;
    let player = spawn_unit(
        world,
        UnitSpawn {
            name: player_name,
            unit_type: player_type.clone(),
            transform: Transform::at(Vec3::ZERO),
            party: vec![player_type; PLAYER_PARTY_SIZE],
            controller: Controller::Player,
        },
    )?;

    let cities = world.entities_with::<CityState>()?;
    let mut spawned = 0;
    for city in cities {
        if spawned >= agent_count {
            break;
        }
        let center = world.get_component::<Transform>(city)?.position;
        let ruler = spawn_ai_unit(world, center, RULER_SCATTER_RADIUS)?;
        let name = world
            .get_component::<Name>(ruler)?
            .as_str()
            .to_string();
        world.get_component_mut::<CityState>(city)?.ruler = Some(name);
        spawned += 1;
    }
    while spawned < agent_count {
        spawn_ai_unit(world, Vec3::ZERO, WANDERER_SCATTER_RADIUS)?;
        spawned += 1;
    }

    info!(
        agents = spawned,
        city_states = content.city_state_defs().len(),
        "map_populated"
    );
    Ok(player)
}

fn spawn_ai_unit(world: &mut World, center: Vec3, radius: f32) -> Result<Entity, SpawnError> {
    let unit_type = random_unit_type(world)?;
    let name = pick_name(world, &unit_type)?;
    let position = scatter(world, center, radius)?;
    let party_size = world
        .get_singleton_mut::<GameRng>()?
        .0
        .random_range(0..=MAX_AI_PARTY);
    let mut party = Vec::with_capacity(party_size);
    for _ in 0..party_size {
        party.push(random_unit_type(world)?);
    }
    spawn_unit(
        world,
        UnitSpawn {
            name,
            unit_type,
            transform: Transform::at(position),
            party,
            controller: Controller::Ai,
        },
    )
}

/// Headless host: builds the overworld, closes views and player battles as
/// soon as they open, and saves on shutdown.
pub(crate) struct StrategosHost {
    config: GameConfig,
    save_path: Option<PathBuf>,
}

impl StrategosHost {
    pub(crate) fn new(config: GameConfig) -> Self {
        Self {
            config,
            save_path: None,
        }
    }
}

impl GameHost for StrategosHost {
    fn on_systems_init(&mut self, world: &mut World) -> Result<(), HostError> {
        install_singletons(world, &self.config)?;
        register_systems(world)?;
        info!(systems = world.system_count(), "systems_registered");
        Ok(())
    }

    fn on_game_init(&mut self, world: &mut World) -> Result<(), HostError> {
        let paths = resolve_app_paths()?;
        let database = load_def_database(
            &paths,
            &ContentRequest {
                enabled_mods: self.config.enabled_mods.clone(),
            },
        )?;
        install_content(world, database)?;
        spawn_city_states(world)?;
        populate_new_map(world, self.config.agent_count)?;

        let path = save::save_path(&paths.saves_dir);
        if self.config.load_on_start && path.is_file() {
            if let Err(error) = save::load_save(world, &path) {
                warn!(path = %path.display(), error = %error, "save_load_failed");
            }
        }
        self.save_path = Some(path);

        info!(
            entities = world.entity_count(),
            units = world.entities_with::<Unit>()?.len(),
            "game_initialized"
        );
        Ok(())
    }

    fn on_update(&mut self, world: &mut World, _dt: f32) -> Result<HostControl, HostError> {
        if world.has_singleton::<ActiveBattle>() {
            if let Some(winner) = conclude_player_battle(world)? {
                info!(?winner, "player_battle_concluded");
            }
        } else if world.context() == VIEW_CONTEXT {
            if let Some(request) = dismiss_view(world)? {
                info!(other = %request.other_name, "view_dismissed");
            }
        }
        Ok(HostControl::Continue)
    }

    fn on_shutdown(&mut self, world: &mut World) {
        for entity in world.entities_with::<Agent>().unwrap_or_default() {
            if let Ok(agent) = world.get_component::<Agent>(entity) {
                debug!(?entity, behavior = ?agent.behavior, "agent_final_state");
            }
        }
        if !self.config.save_on_shutdown {
            return;
        }
        let Some(path) = self.save_path.as_deref() else {
            return;
        };
        if let Err(error) = save::build_save(world).and_then(|game| save::write_save(path, &game)) {
            error!(path = %path.display(), error = %error, "save_failed");
        }
    }
}

#[cfg(test)]
mod tests;
