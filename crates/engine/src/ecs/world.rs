use std::any::type_name;
use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use super::components::Name;
use super::entity::{Entity, EntityIdAllocator, EntityRecord, EntityRow};
use super::error::EcsError;
use super::mask::ComponentMask;
use super::registry::{component_type_id, Component};
use super::singleton::SingletonStore;
use super::system::{
    ContextId, SharedState, System, SystemFailure, SystemId, SystemMode, TickReport,
};
use super::workers::{partition_sizes, split_by_sizes, WorkerPool};

#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Worker threads for multithreaded systems. Zero keeps every system on the
    /// main thread.
    pub worker_count: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { worker_count: 1 }
    }
}

struct SystemSlot {
    name: &'static str,
    system: Option<Box<dyn System>>,
    usage: ComponentMask,
    context: ContextId,
    mode: SystemMode,
    entities: Vec<Entity>,
}

impl SystemSlot {
    fn should_process(&self, mask: ComponentMask) -> bool {
        !self.usage.is_null() && mask.is_superset_of(self.usage)
    }

    fn runs_in(&self, current: ContextId) -> bool {
        self.context.is_universal() || self.context == current
    }
}

pub struct World {
    ids: EntityIdAllocator,
    entities: BTreeMap<Entity, EntityRecord>,
    singletons: SingletonStore,
    systems: Vec<SystemSlot>,
    context: ContextId,
    workers: Option<WorkerPool>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// A world without a worker pool; multithreaded systems run inline.
    pub fn new() -> Self {
        Self {
            ids: EntityIdAllocator,
            entities: BTreeMap::new(),
            singletons: SingletonStore::new(),
            systems: Vec::new(),
            context: ContextId::UNIVERSAL,
            workers: None,
        }
    }

    pub fn with_config(config: &WorldConfig) -> Result<Self, EcsError> {
        let mut world = Self::new();
        if config.worker_count > 0 {
            world.workers = Some(WorkerPool::new(config.worker_count)?);
        }
        Ok(world)
    }

    pub fn worker_pool(&self) -> Option<&WorkerPool> {
        self.workers.as_ref()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.as_ref().map_or(0, WorkerPool::worker_count)
    }

    pub fn create_entity(&mut self) -> Entity {
        let entity = self.ids.allocate();
        self.entities.insert(entity, EntityRecord::new());
        self.refresh_membership(entity, ComponentMask::EMPTY, true);
        entity
    }

    pub fn create_entity_with_name(&mut self, name: impl Into<String>) -> Result<Entity, EcsError> {
        let entity = self.create_entity();
        self.add_component(entity, Name::new(name))?;
        Ok(entity)
    }

    /// Clears every component. The record itself is erased by the next tick's sweep.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.live_record_mut(entity)?.mark_destroyed();
        self.refresh_membership(entity, ComponentMask::EMPTY, false);
        Ok(())
    }

    pub fn has_entity(&self, entity: Entity) -> bool {
        self.live_record(entity).is_ok()
    }

    pub fn entity_count(&self) -> usize {
        self.entities
            .values()
            .filter(|record| !record.is_destroyed())
            .count()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|(_, record)| !record.is_destroyed())
            .map(|(entity, _)| *entity)
            .collect()
    }

    /// Live entities whose mask carries every bit of `mask`.
    pub fn entities_matching(&self, mask: ComponentMask) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|(_, record)| !record.is_destroyed() && record.mask().is_superset_of(mask))
            .map(|(entity, _)| *entity)
            .collect()
    }

    pub fn entities_with<T: Component>(&self) -> Result<Vec<Entity>, EcsError> {
        Ok(self.entities_matching(ComponentMask::of::<T>()?))
    }

    pub fn component_mask(&self, entity: Entity) -> Result<ComponentMask, EcsError> {
        Ok(self.live_record(entity)?.mask())
    }

    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        let id = component_type_id::<T>()?;
        let record = self.live_record_mut(entity)?;
        if !record.insert(id, Box::new(value)) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<T>(),
            });
        }
        let mask = record.mask();
        self.refresh_membership(entity, mask, true);
        Ok(())
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, EcsError> {
        let id = component_type_id::<T>()?;
        let record = self.live_record_mut(entity)?;
        let missing = EcsError::MissingComponent {
            entity,
            component: type_name::<T>(),
        };
        let boxed = record.take(id).ok_or_else(|| missing.clone())?;
        let mask = record.mask();
        self.refresh_membership(entity, mask, true);
        boxed.downcast::<T>().map(|value| *value).map_err(|_| missing)
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        let id = component_type_id::<T>()?;
        self.live_record(entity)?
            .get::<T>(id)
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        let id = component_type_id::<T>()?;
        self.live_record_mut(entity)?
            .get_mut::<T>(id)
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Ok(id) = component_type_id::<T>() else {
            return false;
        };
        self.live_record(entity)
            .is_ok_and(|record| record.mask().contains(id))
    }

    pub fn find_entity_with_name(&self, name: &str) -> Option<Entity> {
        self.named_entities(name).next()
    }

    pub fn find_all_entities_with_name(&self, name: &str) -> Vec<Entity> {
        self.named_entities(name).collect()
    }

    fn named_entities<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Entity> + 'a {
        let id = component_type_id::<Name>().ok();
        self.entities.iter().filter_map(move |(entity, record)| {
            let found = record.get::<Name>(id?)?;
            (found.as_str() == name).then_some(*entity)
        })
    }

    /// Stores a world-scoped component, returning the one it replaced.
    pub fn set_singleton<T: Component>(&mut self, value: T) -> Result<Option<T>, EcsError> {
        self.singletons.set(value)
    }

    pub fn get_singleton<T: Component>(&self) -> Result<&T, EcsError> {
        self.singletons.get::<T>()
    }

    pub fn get_singleton_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        self.singletons.get_mut::<T>()
    }

    pub fn has_singleton<T: Component>(&self) -> bool {
        self.singletons.has::<T>()
    }

    pub fn remove_singleton<T: Component>(&mut self) -> Result<T, EcsError> {
        self.singletons.remove::<T>()
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    pub fn change_context(&mut self, context: ContextId) {
        if self.context != context {
            info!(from = %self.context, to = %context, "context_changed");
        }
        self.context = context;
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn shared_state(&self) -> SharedState<'_> {
        SharedState::new(&self.singletons, self.context)
    }

    /// Appends `system` to the update order. Its list starts with every live
    /// entity that already matches its usage mask.
    pub fn add_system<S: System + 'static>(
        &mut self,
        system: S,
        context: ContextId,
        mode: SystemMode,
    ) -> Result<SystemId, EcsError> {
        let usage = system.usage()?;
        let mut slot = SystemSlot {
            name: system.name(),
            system: Some(Box::new(system)),
            usage,
            context,
            mode,
            entities: Vec::new(),
        };
        slot.entities = self
            .entities
            .iter()
            .filter(|(_, record)| !record.is_destroyed() && slot.should_process(record.mask()))
            .map(|(entity, _)| *entity)
            .collect();
        debug!(
            system = slot.name,
            context = %context,
            mode = ?mode,
            initial_entities = slot.entities.len(),
            "system_added"
        );
        self.systems.push(slot);
        Ok(SystemId(self.systems.len() - 1))
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn filtered_entities(&self, system: SystemId) -> &[Entity] {
        self.systems
            .get(system.0)
            .map_or(&[], |slot| slot.entities.as_slice())
    }

    /// One tick: sweep empty records, then run every system whose context is
    /// active, in registration order.
    pub fn update(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport {
            swept: self.sweep(),
            ..TickReport::default()
        };

        for index in 0..self.systems.len() {
            if !self.systems[index].runs_in(self.context) {
                continue;
            }
            let Some(mut system) = self.systems[index].system.take() else {
                continue;
            };
            let name = self.systems[index].name;
            let entities = self.systems[index].entities.clone();
            let parallel = self.systems[index].mode == SystemMode::MultiThreaded
                && self.worker_count() >= 1
                && entities.len() >= self.worker_count();

            let result = if parallel {
                report.parallel_dispatches += 1;
                self.dispatch_parallel(system.as_ref(), &entities, dt)
            } else {
                system.update(self, &entities, dt)
            };
            self.systems[index].system = Some(system);
            report.systems_run += 1;

            if let Err(error) = result {
                warn!(system = name, error = %error, "system_update_failed");
                report.failures.push(SystemFailure { system: name, error });
            }
        }

        report
    }

    /// Runs `system.update_chunk` over `entities` on the calling thread.
    pub fn update_rows<S: System + ?Sized>(
        &mut self,
        system: &S,
        entities: &[Entity],
        dt: f32,
    ) -> Result<(), EcsError> {
        let shared = SharedState::new(&self.singletons, self.context);
        let mut rows = collect_rows(&mut self.entities, entities);
        system.update_chunk(&mut rows, &shared, dt)
    }

    fn dispatch_parallel(
        &mut self,
        system: &dyn System,
        entities: &[Entity],
        dt: f32,
    ) -> Result<(), EcsError> {
        let Self {
            entities: records,
            singletons,
            workers,
            context,
            ..
        } = self;
        let Some(pool) = workers.as_ref() else {
            return Err(EcsError::WorkerPool("no worker pool configured".to_string()));
        };
        let shared = SharedState::new(singletons, *context);
        let mut rows = collect_rows(records, entities);
        let sizes = partition_sizes(rows.len(), pool.worker_count());
        let slices = split_by_sizes(&mut rows, &sizes);
        pool.dispatch(slices, |slice| system.update_chunk(slice, &shared, dt))
    }

    fn sweep(&mut self) -> usize {
        let doomed = self
            .entities
            .iter()
            .filter(|(_, record)| record.mask().is_empty())
            .map(|(entity, _)| *entity)
            .collect::<HashSet<_>>();
        if doomed.is_empty() {
            return 0;
        }

        self.entities.retain(|entity, _| !doomed.contains(entity));
        for slot in &mut self.systems {
            slot.entities.retain(|entity| !doomed.contains(entity));
        }
        debug!(
            swept = doomed.len(),
            remaining = self.entities.len(),
            "entities_swept"
        );
        doomed.len()
    }

    fn refresh_membership(&mut self, entity: Entity, mask: ComponentMask, live: bool) {
        for slot in &mut self.systems {
            let wanted = live && slot.should_process(mask);
            let position = slot.entities.iter().position(|listed| *listed == entity);
            match (wanted, position) {
                (true, None) => slot.entities.push(entity),
                (false, Some(index)) => {
                    slot.entities.remove(index);
                }
                _ => {}
            }
        }
    }

    fn live_record(&self, entity: Entity) -> Result<&EntityRecord, EcsError> {
        if entity.is_null() {
            return Err(EcsError::InvalidEntity(entity));
        }
        self.entities
            .get(&entity)
            .filter(|record| !record.is_destroyed())
            .ok_or(EcsError::InvalidEntity(entity))
    }

    fn live_record_mut(&mut self, entity: Entity) -> Result<&mut EntityRecord, EcsError> {
        if entity.is_null() {
            return Err(EcsError::InvalidEntity(entity));
        }
        self.entities
            .get_mut(&entity)
            .filter(|record| !record.is_destroyed())
            .ok_or(EcsError::InvalidEntity(entity))
    }
}

fn collect_rows<'w>(
    records: &'w mut BTreeMap<Entity, EntityRecord>,
    entities: &[Entity],
) -> Vec<EntityRow<'w>> {
    let wanted = entities.iter().copied().collect::<HashSet<_>>();
    records
        .iter_mut()
        .filter(|(entity, record)| wanted.contains(*entity) && !record.is_destroyed())
        .map(|(entity, record)| EntityRow::new(*entity, record))
        .collect()
}
