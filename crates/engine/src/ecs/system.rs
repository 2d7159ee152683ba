use std::fmt;

use super::entity::{Entity, EntityRow};
use super::error::EcsError;
use super::mask::ComponentMask;
use super::registry::Component;
use super::singleton::SingletonStore;
use super::world::World;

/// Tag selecting which systems run this tick. Systems in [`ContextId::UNIVERSAL`]
/// always run; any other context runs only while it is the world's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContextId(pub u32);

impl ContextId {
    pub const UNIVERSAL: Self = Self(0);

    pub fn is_universal(self) -> bool {
        self == Self::UNIVERSAL
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SystemMode {
    #[default]
    SingleThreaded,
    MultiThreaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub(crate) usize);

impl SystemId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Read-only world state visible from worker slices.
pub struct SharedState<'w> {
    singletons: &'w SingletonStore,
    context: ContextId,
}

impl<'w> SharedState<'w> {
    pub(crate) fn new(singletons: &'w SingletonStore, context: ContextId) -> Self {
        Self {
            singletons,
            context,
        }
    }

    pub fn singleton<T: Component>(&self) -> Result<&'w T, EcsError> {
        self.singletons.get::<T>()
    }

    pub fn has_singleton<T: Component>(&self) -> bool {
        self.singletons.has::<T>()
    }

    pub fn context(&self) -> ContextId {
        self.context
    }
}

pub trait System: Send + Sync {
    fn name(&self) -> &'static str;

    /// Components an entity must carry to appear in this system's list.
    fn usage(&self) -> Result<ComponentMask, EcsError>;

    /// Main-thread update over the filtered list. The default runs
    /// [`System::update_chunk`] over the whole list without the worker pool.
    fn update(&mut self, world: &mut World, entities: &[Entity], dt: f32) -> Result<(), EcsError> {
        world.update_rows(&*self, entities, dt)
    }

    /// Per-slice update. Multithreaded systems receive disjoint slices of their
    /// list on worker threads and must only touch the rows they were given.
    fn update_chunk(
        &self,
        rows: &mut [EntityRow<'_>],
        shared: &SharedState<'_>,
        dt: f32,
    ) -> Result<(), EcsError> {
        let _ = (rows, shared, dt);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFailure {
    pub system: &'static str,
    pub error: EcsError,
}

/// Outcome of one [`World::update`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub swept: usize,
    pub systems_run: usize,
    pub parallel_dispatches: usize,
    pub failures: Vec<SystemFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
