use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strategos_engine::ecs::{Component, ContextId, Entity};
use strategos_engine::time::Timestamp;
use strategos_engine::{AssetCache, DefDatabase, InMemoryModelLoader};

pub(crate) const MAP_CONTEXT: ContextId = ContextId(1);
pub(crate) const BATTLE_CONTEXT: ContextId = ContextId(2);
pub(crate) const VIEW_CONTEXT: ContextId = ContextId(3);

pub(crate) const EVENT_RESTED: &str = "rested";
pub(crate) const EVENT_PATROLLED: &str = "patrolled";
pub(crate) const EVENT_BATTLE: &str = "battle";

/// Per-unit stats copied from its `UnitDef`, plus mutable rest state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Unit {
    pub(crate) unit_type: String,
    pub(crate) damage: u32,
    pub(crate) health: u32,
    pub(crate) speed: f32,
    pub(crate) ranged: bool,
    pub(crate) attack_range: f32,
    /// Seconds of rest left; zero when not resting.
    pub(crate) resting_duration: f32,
}

impl Component for Unit {}

/// Unit types following this unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Party {
    pub(crate) members: Vec<String>,
}

impl Party {
    pub(crate) fn size(&self) -> usize {
        self.members.len()
    }
}

impl Component for Party {}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Player;

impl Component for Player {}

/// What an agent is doing, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BehaviorState {
    #[default]
    Idle,
    Resting,
    Patrolling,
    Travelling,
    Seeking,
}

/// Where a unit is heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Target {
    Point(Vec3),
    Follow(Entity),
}

impl Component for Target {}

/// Last occurrence of named unit events.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EventTimestamps {
    entries: BTreeMap<String, Timestamp>,
}

impl EventTimestamps {
    pub(crate) fn record(&mut self, event: &str, at: Timestamp) {
        self.entries.insert(event.to_string(), at);
    }

    pub(crate) fn get(&self, event: &str) -> Option<Timestamp> {
        self.entries.get(event).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Timestamp)> {
        self.entries.iter().map(|(name, at)| (name.as_str(), *at))
    }
}

impl Component for EventTimestamps {}

/// Set after a fight; the unit cannot be sought again until it expires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct InBattle {
    pub(crate) cooldown: f32,
}

impl Component for InBattle {}

/// Mutable state of a city-state; static data stays in its `CityStateDef`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CityState {
    pub(crate) def_name: String,
    pub(crate) renown: u32,
    pub(crate) garrison: u32,
    pub(crate) ruler: Option<String>,
}

impl Component for CityState {}

/// Deterministic game RNG shared by AI and spawning.
#[derive(Debug, Clone)]
pub(crate) struct GameRng(pub(crate) ChaCha8Rng);

impl GameRng {
    pub(crate) fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl Component for GameRng {}

#[derive(Debug, Clone)]
pub(crate) struct Content(pub(crate) Arc<DefDatabase>);

impl Component for Content {}

pub(crate) struct Models(pub(crate) AssetCache<InMemoryModelLoader>);

impl Component for Models {}
