use std::any::type_name;

use super::entity::ComponentBox;
use super::error::EcsError;
use super::registry::{component_type_id, Component, MAX_COMPONENT_TYPES};

/// World-scoped components, at most one per component type.
pub(crate) struct SingletonStore {
    slots: [Option<ComponentBox>; MAX_COMPONENT_TYPES],
}

impl SingletonStore {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Stores `value`, returning the singleton it replaced.
    pub(crate) fn set<T: Component>(&mut self, value: T) -> Result<Option<T>, EcsError> {
        let id = component_type_id::<T>()?;
        let previous = self.slots[id.index()].replace(Box::new(value));
        Ok(previous
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed))
    }

    pub(crate) fn get<T: Component>(&self) -> Result<&T, EcsError> {
        let id = component_type_id::<T>()?;
        self.slots[id.index()]
            .as_deref()
            .and_then(|value| value.downcast_ref::<T>())
            .ok_or(EcsError::MissingSingleton {
                component: type_name::<T>(),
            })
    }

    pub(crate) fn get_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        let id = component_type_id::<T>()?;
        self.slots[id.index()]
            .as_deref_mut()
            .and_then(|value| value.downcast_mut::<T>())
            .ok_or(EcsError::MissingSingleton {
                component: type_name::<T>(),
            })
    }

    pub(crate) fn has<T: Component>(&self) -> bool {
        component_type_id::<T>().is_ok_and(|id| self.slots[id.index()].is_some())
    }

    pub(crate) fn remove<T: Component>(&mut self) -> Result<T, EcsError> {
        let id = component_type_id::<T>()?;
        self.slots[id.index()]
            .take()
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
            .ok_or(EcsError::MissingSingleton {
                component: type_name::<T>(),
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
