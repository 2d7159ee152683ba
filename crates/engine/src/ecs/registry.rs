//! Component type ids.
//!
//! Every distinct component type gets a dense id in `[0, MAX_COMPONENT_TYPES)` the
//! first time it is referenced. Ids never change for the life of the process.
//! Lookups scan the published slots without taking a lock; only registering a new
//! type serializes on a mutex.

use std::any::{type_name, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use super::error::EcsError;

pub const MAX_COMPONENT_TYPES: usize = 64;

/// Marker for values that can live in an entity slot or the singleton store.
pub trait Component: std::any::Any + Send + Sync {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(u8);

impl ComponentTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn bit(self) -> u64 {
        1u64 << self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct RegisteredType {
    type_id: TypeId,
    name: &'static str,
}

pub(crate) struct TypeRegistry {
    slots: [OnceLock<RegisteredType>; MAX_COMPONENT_TYPES],
    published: AtomicUsize,
    register_lock: Mutex<()>,
}

impl TypeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
            published: AtomicUsize::new(0),
            register_lock: Mutex::new(()),
        }
    }

    fn lookup(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        let published = self.published.load(Ordering::Acquire);
        self.slots[..published]
            .iter()
            .position(|slot| slot.get().is_some_and(|entry| entry.type_id == type_id))
            .map(|index| ComponentTypeId(index as u8))
    }

    pub(crate) fn id_for(
        &self,
        type_id: TypeId,
        name: &'static str,
    ) -> Result<ComponentTypeId, EcsError> {
        if let Some(id) = self.lookup(type_id) {
            return Ok(id);
        }

        let _guard = self
            .register_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another thread may have registered the type while we waited.
        if let Some(id) = self.lookup(type_id) {
            return Ok(id);
        }

        let next = self.published.load(Ordering::Acquire);
        if next >= MAX_COMPONENT_TYPES {
            return Err(EcsError::TooManyTypes {
                component: name,
                limit: MAX_COMPONENT_TYPES,
            });
        }
        let _ = self.slots[next].set(RegisteredType { type_id, name });
        self.published.store(next + 1, Ordering::Release);
        Ok(ComponentTypeId(next as u8))
    }

    pub(crate) fn name_of(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.slots
            .get(id.index())
            .and_then(OnceLock::get)
            .map(|entry| entry.name)
    }

    pub(crate) fn registered_count(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }
}

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

fn global_registry() -> &'static TypeRegistry {
    REGISTRY.get_or_init(TypeRegistry::new)
}

pub fn component_type_id<T: Component>() -> Result<ComponentTypeId, EcsError> {
    global_registry().id_for(TypeId::of::<T>(), type_name::<T>())
}

pub fn component_type_name(id: ComponentTypeId) -> Option<&'static str> {
    global_registry().name_of(id)
}

pub fn registered_component_types() -> usize {
    global_registry().registered_count()
}
