use std::any::{type_name, Any};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::EcsError;
use super::mask::ComponentMask;
use super::registry::{component_type_id, Component, ComponentTypeId, MAX_COMPONENT_TYPES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Entity(pub u64);

impl Entity {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out entity ids from one counter shared by every world in the process,
/// so ids are never reused and never null.
#[derive(Debug, Default)]
pub struct EntityIdAllocator;

impl EntityIdAllocator {
    pub fn allocate(&self) -> Entity {
        Entity(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type ComponentBox = Box<dyn Any + Send + Sync>;

pub(crate) struct EntityRecord {
    slots: [Option<ComponentBox>; MAX_COMPONENT_TYPES],
    mask: ComponentMask,
    destroyed: bool,
}

impl EntityRecord {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            mask: ComponentMask::EMPTY,
            destroyed: false,
        }
    }

    pub(crate) fn mask(&self) -> ComponentMask {
        self.mask
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn insert(&mut self, id: ComponentTypeId, value: ComponentBox) -> bool {
        let slot = &mut self.slots[id.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.mask = self.mask.with_id(id);
        true
    }

    pub(crate) fn take(&mut self, id: ComponentTypeId) -> Option<ComponentBox> {
        let value = self.slots[id.index()].take()?;
        self.mask = self.mask.without_id(id);
        Some(value)
    }

    pub(crate) fn get<T: Component>(&self, id: ComponentTypeId) -> Option<&T> {
        self.slots[id.index()]
            .as_deref()
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub(crate) fn get_mut<T: Component>(&mut self, id: ComponentTypeId) -> Option<&mut T> {
        self.slots[id.index()]
            .as_deref_mut()
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub(crate) fn mark_destroyed(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.mask = ComponentMask::EMPTY;
        self.destroyed = true;
    }

    #[cfg(test)]
    pub(crate) fn occupied_slots(&self) -> ComponentMask {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .fold(ComponentMask::EMPTY, |mask, (index, _)| {
                ComponentMask::from_bits(mask.bits() | (1u64 << index))
            })
    }
}

/// Mutable view of one entity handed to a system slice. Components can be read
/// and written in place; structural changes stay on the main thread.
pub struct EntityRow<'w> {
    entity: Entity,
    record: &'w mut EntityRecord,
}

impl<'w> EntityRow<'w> {
    pub(crate) fn new(entity: Entity, record: &'w mut EntityRecord) -> Self {
        Self { entity, record }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn mask(&self) -> ComponentMask {
        self.record.mask()
    }

    pub fn has<T: Component>(&self) -> bool {
        component_type_id::<T>().is_ok_and(|id| self.record.mask().contains(id))
    }

    pub fn get<T: Component>(&self) -> Result<&T, EcsError> {
        let id = component_type_id::<T>()?;
        self.record
            .get::<T>(id)
            .ok_or(EcsError::MissingComponent {
                entity: self.entity,
                component: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        let id = component_type_id::<T>()?;
        let entity = self.entity;
        self.record
            .get_mut::<T>(id)
            .ok_or(EcsError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })
    }
}
