use strategos_engine::ecs::{
    Component, ComponentMask, EcsError, Entity, Name, NullComponent, System, World,
};
use strategos_engine::time::{SimulationClock, Timestamp};
use tracing::{debug, info, warn};

use super::components::{
    Content, EventTimestamps, InBattle, Party, Player, Unit, BATTLE_CONTEXT, EVENT_BATTLE,
    MAP_CONTEXT, VIEW_CONTEXT,
};

pub(crate) const BATTLE_COOLDOWN_SECS: f32 = 10.0;

/// Two units that met on the map.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Interaction {
    pub(crate) instigator: Entity,
    pub(crate) other: Entity,
    pub(crate) instigator_name: String,
    pub(crate) other_name: String,
}

impl Interaction {
    pub(crate) fn between(world: &World, instigator: Entity, other: Entity) -> Self {
        Self {
            instigator,
            other,
            instigator_name: name_of(world, instigator),
            other_name: name_of(world, other),
        }
    }
}

fn name_of(world: &World, entity: Entity) -> String {
    world
        .get_component::<Name>(entity)
        .map(|name| name.as_str().to_string())
        .unwrap_or_default()
}

/// Single-slot channel drained once per tick by [`InteractionSystem`].
#[derive(Debug, Default)]
pub(crate) struct InteractionQueue {
    slot: Option<Interaction>,
}

impl InteractionQueue {
    /// Hands the interaction back when the slot is already taken.
    pub(crate) fn push(&mut self, interaction: Interaction) -> Result<(), Interaction> {
        if self.slot.is_some() {
            return Err(interaction);
        }
        self.slot = Some(interaction);
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Option<Interaction> {
        self.slot.take()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

impl Component for InteractionQueue {}

/// A conversation view waiting for the host to show it.
#[derive(Debug, Default)]
pub(crate) struct PendingView {
    pub(crate) request: Option<Interaction>,
}

impl Component for PendingView {}

/// Battle involving the player, fought out in the battle context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ActiveBattle {
    pub(crate) attacker: Entity,
    pub(crate) defender: Entity,
}

impl Component for ActiveBattle {}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Audience,
    BattleStarted,
    BattleResolved { winner: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HistoryEntry {
    pub(crate) at: Timestamp,
    pub(crate) instigator_name: String,
    pub(crate) other_name: String,
    pub(crate) outcome: Outcome,
}

#[derive(Debug, Default)]
pub(crate) struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl Component for HistoryLog {}

/// Drains the interaction queue. A player instigator opens a view, a unit
/// approaching the player starts a battle, and two AI units fight it out in
/// place.
#[derive(Debug, Default)]
pub(crate) struct InteractionSystem;

impl System for InteractionSystem {
    fn name(&self) -> &'static str {
        "interaction"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<NullComponent>()
    }

    fn update(&mut self, world: &mut World, _entities: &[Entity], _dt: f32) -> Result<(), EcsError> {
        let Some(interaction) = world.get_singleton_mut::<InteractionQueue>()?.take() else {
            return Ok(());
        };
        if !world.has_entity(interaction.instigator) || !world.has_entity(interaction.other) {
            warn!(
                instigator = %interaction.instigator_name,
                other = %interaction.other_name,
                "interaction_dropped"
            );
            return Ok(());
        }

        let at = world.get_singleton::<SimulationClock>()?.now();
        let outcome = if world.has_component::<Player>(interaction.instigator) {
            info!(other = %interaction.other_name, "view_requested");
            world.get_singleton_mut::<PendingView>()?.request = Some(interaction.clone());
            world.change_context(VIEW_CONTEXT);
            Outcome::Audience
        } else if world.has_component::<Player>(interaction.other) {
            info!(attacker = %interaction.instigator_name, "battle_started");
            world.set_singleton(ActiveBattle {
                attacker: interaction.instigator,
                defender: interaction.other,
            })?;
            world.change_context(BATTLE_CONTEXT);
            Outcome::BattleStarted
        } else {
            let winner = resolve_battle(world, interaction.instigator, interaction.other)?;
            Outcome::BattleResolved {
                winner: name_of(world, winner),
            }
        };

        world.get_singleton_mut::<HistoryLog>()?.record(HistoryEntry {
            at,
            instigator_name: interaction.instigator_name,
            other_name: interaction.other_name,
            outcome,
        });
        Ok(())
    }
}

/// Auto-resolves a fight between two units. The stronger side (attacker on a
/// tie) loses a quarter of its party, the weaker side half. Both sides go on
/// cooldown. Returns the winner.
pub(crate) fn resolve_battle(
    world: &mut World,
    attacker: Entity,
    defender: Entity,
) -> Result<Entity, EcsError> {
    let attack = strength(world, attacker)?;
    let defence = strength(world, defender)?;
    let (winner, loser) = if attack >= defence {
        (attacker, defender)
    } else {
        (defender, attacker)
    };

    let at = world.get_singleton::<SimulationClock>()?.now();
    for (entity, won) in [(winner, true), (loser, false)] {
        if let Ok(party) = world.get_component_mut::<Party>(entity) {
            let size = party.members.len();
            let losses = if won { size / 4 } else { size.div_ceil(2) };
            party.members.truncate(size - losses);
        }
        if let Ok(events) = world.get_component_mut::<EventTimestamps>(entity) {
            events.record(EVENT_BATTLE, at);
        }
        match world.get_component_mut::<InBattle>(entity) {
            Ok(in_battle) => in_battle.cooldown = BATTLE_COOLDOWN_SECS,
            Err(_) => world.add_component(
                entity,
                InBattle {
                    cooldown: BATTLE_COOLDOWN_SECS,
                },
            )?,
        }
    }

    debug!(?winner, ?loser, attack, defence, "battle_resolved");
    Ok(winner)
}

fn strength(world: &World, entity: Entity) -> Result<u64, EcsError> {
    let unit = world.get_component::<Unit>(entity)?;
    let leader = unit.damage as u64 * unit.health as u64;
    let Ok(party) = world.get_component::<Party>(entity) else {
        return Ok(leader);
    };
    let content = world.get_singleton::<Content>()?;
    let followers = party
        .members
        .iter()
        .filter_map(|unit_type| content.0.unit_def_by_name(unit_type))
        .map(|def| def.damage as u64 * def.health as u64)
        .sum::<u64>();
    Ok(leader + followers)
}

/// Host-side close of a player battle: resolves it and returns to the map.
pub(crate) fn conclude_player_battle(world: &mut World) -> Result<Option<Entity>, EcsError> {
    if !world.has_singleton::<ActiveBattle>() {
        return Ok(None);
    }
    let battle = world.remove_singleton::<ActiveBattle>()?;
    let winner = if world.has_entity(battle.attacker) && world.has_entity(battle.defender) {
        Some(resolve_battle(world, battle.attacker, battle.defender)?)
    } else {
        None
    };
    world.change_context(MAP_CONTEXT);
    Ok(winner)
}

/// Host-side close of a conversation view.
pub(crate) fn dismiss_view(world: &mut World) -> Result<Option<Interaction>, EcsError> {
    let request = world.get_singleton_mut::<PendingView>()?.request.take();
    world.change_context(MAP_CONTEXT);
    Ok(request)
}

/// Counts down battle cooldowns and clears them when they expire.
#[derive(Debug, Default)]
pub(crate) struct BattleCooldownSystem;

impl System for BattleCooldownSystem {
    fn name(&self) -> &'static str {
        "battle_cooldown"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<InBattle>()
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) -> Result<(), EcsError> {
        let mut expired = Vec::new();
        for &entity in entities {
            let in_battle = world.get_component_mut::<InBattle>(entity)?;
            in_battle.cooldown -= dt;
            if in_battle.cooldown <= 0.0 {
                expired.push(entity);
            }
        }
        for entity in expired {
            world.remove_component::<InBattle>(entity)?;
        }
        Ok(())
    }
}
