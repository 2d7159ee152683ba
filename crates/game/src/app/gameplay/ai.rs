use rand::seq::SliceRandom;
use strategos_engine::ecs::{Component, ComponentMask, EcsError, Entity, System, World};
use strategos_engine::spatial::Transform;
use tracing::debug;

use super::actions::{self, ActionKind, ActionProgress, ActionSet, ActionState, Applicability};
use super::components::{BehaviorState, GameRng, Unit};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CurrentAction {
    pub(crate) index: usize,
    pub(crate) kind: ActionKind,
    pub(crate) state: ActionState,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Agent {
    pub(crate) current: Option<CurrentAction>,
    /// Action restored from a save; resumed on the next tick without `start`.
    pub(crate) last_action_index: Option<usize>,
    pub(crate) behavior: BehaviorState,
    pub(crate) actions_started: u32,
}

impl Agent {
    pub(crate) fn current_kind(&self) -> Option<ActionKind> {
        self.current.as_ref().map(|action| action.kind)
    }

    /// Index to persist: the running action, else a pending restored one.
    pub(crate) fn persisted_action_index(&self) -> Option<usize> {
        self.current
            .as_ref()
            .map(|action| action.index)
            .or(self.last_action_index)
    }
}

impl Component for Agent {}

/// Picks and drives one action per agent. Among equally applicable actions the
/// pick is uniform: candidates are shuffled, then stably sorted by
/// applicability.
#[derive(Debug, Default)]
pub(crate) struct AiDispatchSystem;

impl System for AiDispatchSystem {
    fn name(&self) -> &'static str {
        "ai_dispatch"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<Agent>()?
            .with::<Unit>()?
            .with::<Transform>()
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) -> Result<(), EcsError> {
        let actions = world.get_singleton::<ActionSet>()?.clone();
        for &entity in entities {
            if world.has_entity(entity) {
                step_agent(world, &actions, entity, dt)?;
            }
        }
        Ok(())
    }
}

fn step_agent(world: &mut World, actions: &ActionSet, entity: Entity, dt: f32) -> Result<(), EcsError> {
    let current = world.get_component_mut::<Agent>(entity)?.current.take();
    let Some(mut action) = current else {
        let restored = world.get_component_mut::<Agent>(entity)?.last_action_index.take();
        let next = match restored.and_then(|index| actions.get(index).map(|kind| (index, kind))) {
            Some((index, kind)) => {
                debug!(?entity, action = kind.label(), "ai_action_resumed");
                Some(CurrentAction {
                    index,
                    kind,
                    state: actions::resume(kind, world, entity),
                })
            }
            None => select_and_start(world, actions, entity)?,
        };

        let agent = world.get_component_mut::<Agent>(entity)?;
        agent.behavior = next
            .as_ref()
            .map_or(BehaviorState::Idle, |action| action.kind.behavior());
        agent.current = next;
        return Ok(());
    };

    let progress = match actions::update(&mut action.state, world, entity, dt) {
        Ok(progress) => progress,
        Err(error) => {
            world.get_component_mut::<Agent>(entity)?.current = Some(action);
            return Err(error);
        }
    };

    let agent = world.get_component_mut::<Agent>(entity)?;
    match progress {
        ActionProgress::Ongoing => agent.current = Some(action),
        ActionProgress::Finished => {
            agent.behavior = BehaviorState::Idle;
            debug!(?entity, action = action.kind.label(), "ai_action_finished");
        }
    }
    Ok(())
}

fn select_and_start(
    world: &mut World,
    actions: &ActionSet,
    entity: Entity,
) -> Result<Option<CurrentAction>, EcsError> {
    let mut candidates = actions.iter().collect::<Vec<_>>();
    candidates.shuffle(&mut world.get_singleton_mut::<GameRng>()?.0);

    let mut scored = candidates
        .into_iter()
        .map(|(index, kind)| Ok((index, kind, actions::applicability(kind, world, entity)?)))
        .collect::<Result<Vec<_>, EcsError>>()?;
    scored.sort_by(|a, b| b.2.cmp(&a.2));

    let Some(&(index, kind, score)) = scored.first() else {
        return Ok(None);
    };
    if score == Applicability::NotApplicable {
        return Ok(None);
    }

    let state = actions::start(kind, world, entity)?;
    world.get_component_mut::<Agent>(entity)?.actions_started += 1;
    debug!(?entity, action = kind.label(), applicability = ?score, "ai_action_started");
    Ok(Some(CurrentAction { index, kind, state }))
}
