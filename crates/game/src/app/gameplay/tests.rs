use glam::{Vec2, Vec3};
use strategos_engine::animation::AnimatedRenderable;
use strategos_engine::ecs::{Entity, World};
use strategos_engine::spatial::{QuadTreeConfig, Rect, SceneGraph, SpeedField, Transform};
use strategos_engine::time::SimulationClock;
use strategos_engine::{CityStateDef, CityStateDefId, DefDatabase, UnitDef, UnitDefId};
use tempfile::TempDir;

use super::actions::{
    self, patrol_waypoints, set_target, ActionKind, ActionSet, ActionState, Applicability,
};
use super::ai::{Agent, CurrentAction};
use super::components::{
    BehaviorState, CityState, EventTimestamps, InBattle, Party, Player, Target, Unit, BATTLE_CONTEXT,
    EVENT_BATTLE, EVENT_PATROLLED, EVENT_RESTED, MAP_CONTEXT, VIEW_CONTEXT,
};
use super::interaction::{
    conclude_player_battle, dismiss_view, ActiveBattle, HistoryLog, Interaction,
    InteractionQueue, Outcome, PendingView,
};
use super::save::{self, SaveError};
use super::spawn::{spawn_city_states, spawn_unit, Controller, SpawnError, UnitSpawn};
use super::{install_content, install_singletons, populate_new_map, register_systems, GameConfig};

const DAY_SECS: f32 = 240.0;

fn unit_def(name: &str, model: &str, damage: u32, health: u32, ranged: bool) -> UnitDef {
    UnitDef {
        id: UnitDefId(0),
        def_name: name.to_string(),
        label: name.to_string(),
        model: model.to_string(),
        scale: 1.0,
        damage,
        health,
        speed: 1.0,
        ranged,
        attack_range: if ranged { 12.0 } else { 1.5 },
        attack_trigger: 0.5,
    }
}

fn database() -> DefDatabase {
    DefDatabase::new(
        vec![
            unit_def("hoplite", "hoplite", 12, 100, false),
            unit_def("archer", "archer", 6, 60, true),
        ],
        vec![CityStateDef {
            id: CityStateDefId(0),
            def_name: "athens".to_string(),
            label: "Athens".to_string(),
            position: Vec3::new(40.0, -20.0, 0.0),
            rotation: Vec3::ZERO,
            renown: 120,
            garrison: 400,
            description: String::new(),
        }],
        vec!["Kleon".to_string(), "Nikias".to_string()],
    )
}

fn bare_world(seed: u64) -> World {
    let mut world = World::new();
    let config = GameConfig {
        day_duration_secs: DAY_SECS,
        seed,
        ..GameConfig::default()
    };
    install_singletons(&mut world, &config).expect("singletons");
    install_content(&mut world, database()).expect("content");
    world.set_singleton(SpeedField::uniform()).expect("flat terrain");
    register_systems(&mut world).expect("systems");
    world
}

fn world_with_cities(seed: u64) -> World {
    let mut world = bare_world(seed);
    spawn_city_states(&mut world).expect("cities");
    world
}

fn spawn(
    world: &mut World,
    name: &str,
    unit_type: &str,
    at: Vec3,
    party: &[&str],
    controller: Controller,
) -> Entity {
    spawn_unit(
        world,
        UnitSpawn {
            name: name.to_string(),
            unit_type: unit_type.to_string(),
            transform: Transform::at(at),
            party: party.iter().map(ToString::to_string).collect(),
            controller,
        },
    )
    .expect("spawn unit")
}

fn rest_index(world: &World) -> usize {
    world
        .get_singleton::<ActionSet>()
        .expect("actions")
        .index_of(ActionKind::Rest)
        .expect("rest registered")
}

fn clip_name(world: &World, entity: Entity) -> String {
    let renderable = world
        .get_component::<AnimatedRenderable>(entity)
        .expect("renderable");
    renderable
        .model()
        .clip(renderable.current_clip())
        .map(|clip| clip.name.clone())
        .expect("clip")
}

#[test]
fn new_map_gives_every_city_state_a_ruler() {
    let mut world = world_with_cities(3);
    let player = populate_new_map(&mut world, 3).expect("populate");

    assert!(world.has_component::<Player>(player));
    assert_eq!(world.entities_with::<Unit>().expect("units").len(), 4);
    assert_eq!(world.entities_with::<Agent>().expect("agents").len(), 3);

    let athens = world.find_entity_with_name("athens").expect("athens");
    let ruler = world
        .get_component::<CityState>(athens)
        .expect("city")
        .ruler
        .clone()
        .expect("ruler assigned");
    let ruler_entity = world.find_entity_with_name(&ruler).expect("ruler exists");
    assert!(world.has_component::<Agent>(ruler_entity));
}

#[test]
fn unknown_unit_type_spawns_nothing() {
    let mut world = world_with_cities(1);
    let before = world.entity_count();
    let result = spawn_unit(
        &mut world,
        UnitSpawn {
            name: "Ghost".to_string(),
            unit_type: "elephant".to_string(),
            transform: Transform::default(),
            party: Vec::new(),
            controller: Controller::Ai,
        },
    );
    assert!(matches!(result, Err(SpawnError::UnknownUnitType(kind)) if kind == "elephant"));
    assert_eq!(world.entity_count(), before);
}

#[test]
fn fresh_agent_starts_its_most_applicable_action() {
    for seed in 0..8 {
        let mut world = world_with_cities(seed);
        let agent = spawn(
            &mut world,
            "Brasidas",
            "hoplite",
            Vec3::new(-60.0, 60.0, 0.0),
            &[],
            Controller::Ai,
        );

        world.update(1.0);

        let state = world.get_component::<Agent>(agent).expect("agent");
        assert_eq!(state.current_kind(), Some(ActionKind::Rest), "seed {seed}");
        assert_eq!(state.actions_started, 1);
        assert_eq!(state.behavior, BehaviorState::Resting);
        let resting = world.get_component::<Unit>(agent).expect("unit").resting_duration;
        assert!((resting - DAY_SECS / 4.0).abs() < 1e-3);
    }
}

#[test]
fn equally_applicable_actions_are_picked_at_random() {
    let mut picked = Vec::new();
    for seed in 0..32 {
        // no city-states: only rest and seek apply, both at low priority
        let mut world = bare_world(seed);
        let agent = spawn(&mut world, "Brasidas", "hoplite", Vec3::ZERO, &[], Controller::Ai);
        let now = world.get_singleton::<SimulationClock>().expect("clock").now();
        world
            .get_component_mut::<EventTimestamps>(agent)
            .expect("events")
            .record(EVENT_RESTED, now);

        world.update(0.1);

        let kind = world
            .get_component::<Agent>(agent)
            .expect("agent")
            .current_kind()
            .expect("an action started");
        picked.push(kind);
    }
    assert!(picked.contains(&ActionKind::Rest));
    assert!(picked.contains(&ActionKind::SeekUnitFight));
    assert!(!picked.contains(&ActionKind::VisitRandomCityState));
}

#[test]
fn unit_walks_to_point_then_idles() {
    let mut world = bare_world(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    set_target(&mut world, player, Target::Point(Vec3::new(3.0, 0.0, 0.0))).expect("target");

    world.update(0.5);
    assert_eq!(clip_name(&world, player), "walk");
    let position = world.get_component::<Transform>(player).expect("transform").position;
    assert!((position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4, "{position}");

    for _ in 0..4 {
        world.update(0.5);
    }
    let position = world.get_component::<Transform>(player).expect("transform").position;
    assert!(!world.has_component::<Target>(player));
    assert!((position - Vec3::new(3.0, 0.0, 0.0)).length() < 0.5);
    assert_eq!(clip_name(&world, player), "idle");
}

#[test]
fn player_instigated_interaction_opens_a_view_next_tick() {
    let mut world = world_with_cities(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    let other = spawn(
        &mut world,
        "Nikias",
        "archer",
        Vec3::new(30.0, 30.0, 0.0),
        &[],
        Controller::Ai,
    );
    let interaction = Interaction::between(&world, player, other);
    world
        .get_singleton_mut::<InteractionQueue>()
        .expect("queue")
        .push(interaction)
        .expect("slot free");

    world.update(0.1);

    assert_eq!(world.context(), VIEW_CONTEXT);
    assert!(world.get_singleton::<InteractionQueue>().expect("queue").is_empty());
    let pending = world.get_singleton::<PendingView>().expect("view");
    assert_eq!(pending.request.as_ref().map(|r| r.other), Some(other));
    let history = world.get_singleton::<HistoryLog>().expect("history");
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].outcome, Outcome::Audience);

    let request = dismiss_view(&mut world).expect("dismiss");
    assert_eq!(request.map(|r| r.other_name), Some("Nikias".to_string()));
    assert_eq!(world.context(), MAP_CONTEXT);
}

#[test]
fn seeking_agent_reaching_the_player_starts_a_battle() {
    let mut world = world_with_cities(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::new(0.5, 0.0, 0.0), &[], Controller::Player);
    let seeker = spawn(
        &mut world,
        "Nikias",
        "hoplite",
        Vec3::ZERO,
        &["hoplite", "archer"],
        Controller::Ai,
    );
    world.get_component_mut::<Agent>(seeker).expect("agent").current = Some(CurrentAction {
        index: 3,
        kind: ActionKind::SeekUnitFight,
        state: ActionState::Seek {
            opponent: Some(player),
        },
    });
    set_target(&mut world, seeker, Target::Follow(player)).expect("target");

    world.update(0.1);

    assert_eq!(world.context(), BATTLE_CONTEXT);
    let battle = *world.get_singleton::<ActiveBattle>().expect("battle");
    assert_eq!(battle.attacker, seeker);
    assert_eq!(battle.defender, player);
    assert!(world.get_singleton::<InteractionQueue>().expect("queue").is_empty());

    let winner = conclude_player_battle(&mut world).expect("conclude");
    assert_eq!(winner, Some(seeker));
    assert_eq!(world.context(), MAP_CONTEXT);
    assert!(!world.has_singleton::<ActiveBattle>());
    assert!(world.has_component::<InBattle>(player));
    assert!(world.has_component::<InBattle>(seeker));
}

#[test]
fn ai_battle_resolves_in_place() {
    let mut world = world_with_cities(0);
    let strong = spawn(
        &mut world,
        "Lysander",
        "hoplite",
        Vec3::new(10.0, 10.0, 0.0),
        &["hoplite", "hoplite", "hoplite", "hoplite"],
        Controller::Ai,
    );
    let weak = spawn(
        &mut world,
        "Kleon",
        "archer",
        Vec3::new(12.0, 10.0, 0.0),
        &["archer"],
        Controller::Ai,
    );
    let interaction = Interaction::between(&world, weak, strong);
    world
        .get_singleton_mut::<InteractionQueue>()
        .expect("queue")
        .push(interaction)
        .expect("slot free");

    world.update(0.1);

    assert_eq!(world.context(), MAP_CONTEXT);
    assert_eq!(world.get_component::<Party>(strong).expect("party").size(), 3);
    assert_eq!(world.get_component::<Party>(weak).expect("party").size(), 0);
    for entity in [strong, weak] {
        assert!(world.has_component::<InBattle>(entity));
        let events = world.get_component::<EventTimestamps>(entity).expect("events");
        assert!(events.get(EVENT_BATTLE).is_some());
    }
    let history = world.get_singleton::<HistoryLog>().expect("history");
    assert_eq!(
        history.entries()[0].outcome,
        Outcome::BattleResolved {
            winner: "Lysander".to_string()
        }
    );
}

#[test]
fn second_interaction_waits_for_a_free_slot() {
    let mut world = world_with_cities(0);
    let a = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Ai);
    let b = spawn(&mut world, "Nikias", "hoplite", Vec3::X, &[], Controller::Ai);
    let queue = world.get_singleton_mut::<InteractionQueue>().expect("queue");
    let first = Interaction {
        instigator: a,
        other: b,
        instigator_name: "Kleon".to_string(),
        other_name: "Nikias".to_string(),
    };
    queue.push(first.clone()).expect("slot free");
    assert_eq!(queue.push(first.clone()), Err(first));
}

#[test]
fn battle_cooldown_clears_after_expiry() {
    let mut world = bare_world(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    world
        .add_component(player, InBattle { cooldown: 1.0 })
        .expect("cooldown");

    world.update(0.6);
    assert!(world.has_component::<InBattle>(player));
    world.update(0.6);
    assert!(!world.has_component::<InBattle>(player));
}

#[test]
fn resting_agent_resumes_after_load_without_restarting() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join(save::SAVE_FILE_NAME);

    let mut world = world_with_cities(0);
    spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &["hoplite"], Controller::Player);
    let sleeper = spawn(
        &mut world,
        "Nikias",
        "archer",
        Vec3::new(-60.0, 60.0, 0.0),
        &[],
        Controller::Ai,
    );
    let rest = rest_index(&world);
    world.get_component_mut::<Agent>(sleeper).expect("agent").current = Some(CurrentAction {
        index: rest,
        kind: ActionKind::Rest,
        state: ActionState::Rest,
    });
    world
        .get_component_mut::<Unit>(sleeper)
        .expect("unit")
        .resting_duration = 5.0;

    let game = save::build_save(&world).expect("build");
    assert_eq!(game.overworld_units[0].last_action_index, rest as i64);
    save::write_save(&path, &game).expect("write");

    let mut restored = world_with_cities(99);
    populate_new_map(&mut restored, 2).expect("populate");
    save::load_save(&mut restored, &path).expect("load");
    assert_eq!(restored.entities_with::<Unit>().expect("units").len(), 2);

    let sleeper = restored.find_entity_with_name("Nikias").expect("sleeper");
    assert_eq!(
        restored.get_component::<Agent>(sleeper).expect("agent").last_action_index,
        Some(rest)
    );

    restored.update(1.0);
    let agent = restored.get_component::<Agent>(sleeper).expect("agent");
    assert_eq!(agent.current_kind(), Some(ActionKind::Rest));
    assert_eq!(agent.actions_started, 0);
    let unit = restored.get_component::<Unit>(sleeper).expect("unit");
    assert_eq!(unit.resting_duration, 5.0);

    restored.update(1.0);
    let unit = restored.get_component::<Unit>(sleeper).expect("unit");
    assert_eq!(unit.resting_duration, 4.0);
    assert_eq!(
        restored.get_component::<Agent>(sleeper).expect("agent").actions_started,
        0
    );
}

#[test]
fn save_round_trip_restores_targets_time_and_city_states() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join(save::SAVE_FILE_NAME);

    let mut world = world_with_cities(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::new(1.0, 2.0, 0.0), &["archer"], Controller::Player);
    let traveller = spawn(&mut world, "Nikias", "hoplite", Vec3::new(-5.0, 0.0, 0.0), &[], Controller::Ai);
    let chaser = spawn(&mut world, "Lysander", "archer", Vec3::new(9.0, 9.0, 0.0), &[], Controller::Ai);
    let athens = world.find_entity_with_name("athens").expect("athens");
    set_target(&mut world, traveller, Target::Follow(athens)).expect("target");
    set_target(&mut world, chaser, Target::Follow(player)).expect("target");
    {
        let city = world.get_component_mut::<CityState>(athens).expect("city");
        city.renown = 150;
        city.ruler = Some("Nikias".to_string());
    }
    world
        .get_singleton_mut::<SimulationClock>()
        .expect("clock")
        .restore(480, 200, 1.0);

    save::write_save(&path, &save::build_save(&world).expect("build")).expect("write");

    let mut restored = world_with_cities(5);
    save::load_save(&mut restored, &path).expect("load");

    let clock = restored.get_singleton::<SimulationClock>().expect("clock");
    assert_eq!((clock.year_bc(), clock.day()), (480, 200));
    assert!((clock.phase() - 1.0).abs() < 1e-4);

    let player = restored.find_entity_with_name("Kleon").expect("player");
    assert!(restored.has_component::<Player>(player));
    assert_eq!(
        restored.get_component::<Party>(player).expect("party").members,
        vec!["archer".to_string()]
    );
    let athens = restored.find_entity_with_name("athens").expect("athens");
    let traveller = restored.find_entity_with_name("Nikias").expect("traveller");
    let chaser = restored.find_entity_with_name("Lysander").expect("chaser");
    assert_eq!(
        restored.get_component::<Target>(traveller).ok(),
        Some(&Target::Follow(athens))
    );
    assert_eq!(
        restored.get_component::<Target>(chaser).ok(),
        Some(&Target::Follow(player))
    );
    let city = restored.get_component::<CityState>(athens).expect("city");
    assert_eq!(city.renown, 150);
    assert_eq!(city.ruler.as_deref(), Some("Nikias"));
}

#[test]
fn invalid_save_leaves_world_untouched() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join(save::SAVE_FILE_NAME);

    let mut world = world_with_cities(0);
    spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    spawn(&mut world, "Nikias", "archer", Vec3::X * 20.0, &[], Controller::Ai);
    let mut game = save::build_save(&world).expect("build");
    game.overworld_units[0].unit_type = "elephant".to_string();
    save::write_save(&path, &game).expect("write");

    let mut target = world_with_cities(1);
    let player = spawn(&mut target, "Pelopidas", "hoplite", Vec3::ZERO, &[], Controller::Player);
    let entities_before = target.entity_count();
    let clock_before = target.get_singleton::<SimulationClock>().expect("clock").now();

    let error = save::load_save(&mut target, &path).expect_err("unknown unit type");
    match error {
        SaveError::SaveSchemaMismatch { path, message } => {
            assert_eq!(path, "overworld_units[0].unit_type");
            assert!(message.contains("elephant"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(target.entity_count(), entities_before);
    assert!(target.has_entity(player));
    assert_eq!(
        target.get_singleton::<SimulationClock>().expect("clock").now(),
        clock_before
    );
}

#[test]
fn malformed_save_reports_json_path() {
    let raw = r#"{
        "overworld_state": { "time_accumulator": 0.0, "current_day": "first", "current_year": 500 },
        "player": {},
        "overworld_units": [],
        "city_states_info": []
    }"#;
    match save::parse_save(raw) {
        Err(SaveError::SaveSchemaMismatch { path, .. }) => {
            assert_eq!(path, "overworld_state.current_day")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn out_of_range_action_index_is_rejected() {
    let mut world = world_with_cities(0);
    spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    spawn(&mut world, "Nikias", "archer", Vec3::X * 20.0, &[], Controller::Ai);
    let mut game = save::build_save(&world).expect("build");
    game.overworld_units[0].last_action_index = 17;

    let error = save::validate(&mut world, &game).err().expect("rejected");
    assert!(matches!(
        error,
        SaveError::SaveSchemaMismatch { ref path, .. } if path == "overworld_units[0].last_action_index"
    ));
}

fn action_index(world: &World, kind: ActionKind) -> usize {
    world
        .get_singleton::<ActionSet>()
        .expect("actions")
        .index_of(kind)
        .expect("action registered")
}

fn make_ruler(world: &mut World, city: &str, ruler: &str) -> Entity {
    let city = world.find_entity_with_name(city).expect("city");
    world.get_component_mut::<CityState>(city).expect("city").ruler = Some(ruler.to_string());
    city
}

fn begin(world: &mut World, agent: Entity, kind: ActionKind) {
    let index = action_index(world, kind);
    let state = actions::start(kind, world, agent).expect("start");
    world.get_component_mut::<Agent>(agent).expect("agent").current = Some(CurrentAction {
        index,
        kind,
        state,
    });
}

fn patrol_left(world: &World, agent: Entity) -> Vec<Vec3> {
    match world.get_component::<Agent>(agent).expect("agent").current.as_ref() {
        Some(CurrentAction {
            state: ActionState::Patrol { waypoints },
            ..
        }) => waypoints.iter().copied().collect(),
        other => panic!("not patrolling: {other:?}"),
    }
}

#[test]
fn patrol_walks_its_waypoints_in_order() {
    let mut world = world_with_cities(0);
    let center = Vec3::new(40.0, -20.0, 0.0);
    let route = patrol_waypoints(center).into_iter().collect::<Vec<_>>();
    let guard = spawn(&mut world, "Nikias", "hoplite", route[0], &[], Controller::Ai);
    make_ruler(&mut world, "athens", "Nikias");

    begin(&mut world, guard, ActionKind::PatrolRulingTown);
    assert_eq!(
        world.get_component::<Target>(guard).ok(),
        Some(&Target::Point(route[0]))
    );
    assert_eq!(patrol_left(&world, guard), route[1..].to_vec());
    let events = world.get_component::<EventTimestamps>(guard).expect("events");
    assert!(events.get(EVENT_PATROLLED).is_some());

    // standing on the first waypoint: arrival clears it, the next tick heads on
    world.update(0.1);
    assert!(!world.has_component::<Target>(guard));
    world.update(0.1);
    assert_eq!(
        world.get_component::<Target>(guard).ok(),
        Some(&Target::Point(route[1]))
    );
    assert_eq!(patrol_left(&world, guard), route[2..].to_vec());
}

#[test]
fn visit_finishes_once_the_city_is_reached() {
    let mut world = world_with_cities(0);
    let athens = world.find_entity_with_name("athens").expect("athens");
    let visitor = spawn(
        &mut world,
        "Nikias",
        "archer",
        Vec3::new(40.0, -30.0, 0.0),
        &[],
        Controller::Ai,
    );
    begin(&mut world, visitor, ActionKind::VisitRandomCityState);
    assert_eq!(
        world.get_component::<Target>(visitor).ok(),
        Some(&Target::Follow(athens))
    );

    let mut ticks = 0;
    while world.get_component::<Agent>(visitor).expect("agent").current_kind()
        == Some(ActionKind::VisitRandomCityState)
    {
        assert!(ticks < 20, "visitor never arrived");
        world.update(0.5);
        ticks += 1;
    }

    assert!(ticks > 1);
    assert!(!world.has_component::<Target>(visitor));
    let agent = world.get_component::<Agent>(visitor).expect("agent");
    assert_eq!(agent.behavior, BehaviorState::Idle);
    let position = world.get_component::<Transform>(visitor).expect("transform").position;
    assert!(position.distance(Vec3::new(40.0, -20.0, 0.0)) <= 3.5 + 1e-3, "{position}");
}

#[test]
fn city_actions_do_not_apply_without_cities_or_a_ruled_town() {
    let mut world = bare_world(0);
    let agent = spawn(&mut world, "Brasidas", "hoplite", Vec3::ZERO, &[], Controller::Ai);
    for kind in [ActionKind::PatrolRulingTown, ActionKind::VisitRandomCityState] {
        assert_eq!(
            actions::applicability(kind, &world, agent).expect("applicability"),
            Applicability::NotApplicable,
            "{kind:?}"
        );
    }

    let mut world = world_with_cities(0);
    let agent = spawn(&mut world, "Brasidas", "hoplite", Vec3::ZERO, &[], Controller::Ai);
    assert_eq!(
        actions::applicability(ActionKind::PatrolRulingTown, &world, agent).expect("patrol"),
        Applicability::NotApplicable
    );
    make_ruler(&mut world, "athens", "Brasidas");
    assert_eq!(
        actions::applicability(ActionKind::PatrolRulingTown, &world, agent).expect("patrol"),
        Applicability::High
    );
}

#[test]
fn agent_idles_when_no_action_applies() {
    let mut world = bare_world(0);
    world
        .set_singleton(ActionSet::only(vec![
            ActionKind::PatrolRulingTown,
            ActionKind::VisitRandomCityState,
        ]))
        .expect("actions");
    let agent = spawn(&mut world, "Brasidas", "hoplite", Vec3::ZERO, &[], Controller::Ai);

    for _ in 0..3 {
        world.update(0.1);
        let state = world.get_component::<Agent>(agent).expect("agent");
        assert_eq!(state.current_kind(), None);
        assert_eq!(state.actions_started, 0);
        assert_eq!(state.behavior, BehaviorState::Idle);
    }
    assert!(!world.has_component::<Target>(agent));
}

#[test]
fn seeker_touching_the_player_across_a_leaf_border_starts_a_battle() {
    let mut world = bare_world(0);
    world
        .set_singleton(SceneGraph::new(QuadTreeConfig {
            bounds: Rect::new(Vec2::ZERO, Vec2::splat(100.0)),
            capacity: 1,
            min_size: 1.0,
        }))
        .expect("graph");
    let player = spawn(
        &mut world,
        "Kleon",
        "hoplite",
        Vec3::new(50.05, 50.0, 0.0),
        &[],
        Controller::Player,
    );
    let seeker = spawn(
        &mut world,
        "Nikias",
        "hoplite",
        Vec3::new(49.45, 50.0, 0.0),
        &["hoplite"],
        Controller::Ai,
    );
    // hold the seeker in place for one tick so the graph is built around both
    world.get_component_mut::<Agent>(seeker).expect("agent").current = Some(CurrentAction {
        index: rest_index(&world),
        kind: ActionKind::Rest,
        state: ActionState::Rest,
    });
    world.get_component_mut::<Unit>(seeker).expect("unit").resting_duration = 100.0;
    world.update(0.1);
    let graph = world.get_singleton::<SceneGraph>().expect("graph");
    assert!(graph.tree().leaf_count() > 1);
    assert!(graph.tree().contains(seeker) && graph.tree().contains(player));

    world.get_component_mut::<Agent>(seeker).expect("agent").current = Some(CurrentAction {
        index: action_index(&world, ActionKind::SeekUnitFight),
        kind: ActionKind::SeekUnitFight,
        state: ActionState::Seek {
            opponent: Some(player),
        },
    });
    set_target(&mut world, seeker, Target::Follow(player)).expect("target");
    world.update(0.1);

    assert_eq!(world.context(), BATTLE_CONTEXT);
    let battle = *world.get_singleton::<ActiveBattle>().expect("battle");
    assert_eq!((battle.attacker, battle.defender), (seeker, player));
}

#[test]
fn player_reaching_a_followed_unit_opens_a_view() {
    let mut world = world_with_cities(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    let other = spawn(
        &mut world,
        "Nikias",
        "archer",
        Vec3::new(0.5, 0.0, 0.0),
        &[],
        Controller::Ai,
    );
    set_target(&mut world, player, Target::Follow(other)).expect("target");

    world.update(0.1);

    assert_eq!(world.context(), VIEW_CONTEXT);
    assert!(!world.has_component::<Target>(player));
    let pending = world.get_singleton::<PendingView>().expect("view");
    let request = pending.request.as_ref().expect("request");
    assert_eq!((request.instigator, request.other), (player, other));
}

#[test]
fn player_arrival_keeps_its_target_while_the_slot_is_taken() {
    let mut world = bare_world(0);
    let player = spawn(&mut world, "Kleon", "hoplite", Vec3::ZERO, &[], Controller::Player);
    let other = spawn(
        &mut world,
        "Nikias",
        "archer",
        Vec3::new(0.5, 0.0, 0.0),
        &[],
        Controller::Ai,
    );
    set_target(&mut world, player, Target::Follow(other)).expect("target");
    let blocker = Interaction::between(&world, other, player);
    world
        .get_singleton_mut::<InteractionQueue>()
        .expect("queue")
        .push(blocker)
        .expect("slot free");

    world.update(0.1);

    // the blocking interaction was drained this tick; the player's waits
    assert_eq!(world.context(), BATTLE_CONTEXT);
    assert!(world.has_component::<Target>(player));
}

#[test]
fn restored_patrol_continues_its_route() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join(save::SAVE_FILE_NAME);
    let center = Vec3::new(40.0, -20.0, 0.0);
    let route = patrol_waypoints(center).into_iter().collect::<Vec<_>>();

    let mut world = world_with_cities(0);
    spawn(&mut world, "Kleon", "hoplite", Vec3::new(-60.0, 60.0, 0.0), &[], Controller::Player);
    let guard = spawn(&mut world, "Nikias", "hoplite", center, &[], Controller::Ai);
    make_ruler(&mut world, "athens", "Nikias");
    begin(&mut world, guard, ActionKind::PatrolRulingTown);
    // two waypoints done, walking to the third
    set_target(&mut world, guard, Target::Point(route[2])).expect("target");

    save::write_save(&path, &save::build_save(&world).expect("build")).expect("write");
    let mut restored = world_with_cities(7);
    save::load_save(&mut restored, &path).expect("load");
    let guard = restored.find_entity_with_name("Nikias").expect("guard");

    restored.update(0.1);

    let agent = restored.get_component::<Agent>(guard).expect("agent");
    assert_eq!(agent.current_kind(), Some(ActionKind::PatrolRulingTown));
    assert_eq!(agent.actions_started, 0);
    assert_eq!(patrol_left(&restored, guard), route[3..].to_vec());
    assert_eq!(
        restored.get_component::<Target>(guard).ok(),
        Some(&Target::Point(route[2]))
    );
}
