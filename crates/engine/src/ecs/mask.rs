use std::any::TypeId;
use std::fmt;

use super::error::EcsError;
use super::registry::{component_type_id, Component, ComponentTypeId};

/// Declares that a system does not filter by components. Its mask is
/// [`ComponentMask::ALL`], which no entity is ever matched against.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullComponent;

impl Component for NullComponent {}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(u64::MAX);

    pub fn of<T: Component>() -> Result<Self, EcsError> {
        Self::EMPTY.with::<T>()
    }

    pub fn with<T: Component>(self) -> Result<Self, EcsError> {
        if TypeId::of::<T>() == TypeId::of::<NullComponent>() {
            return Ok(Self::ALL);
        }
        let id = component_type_id::<T>()?;
        Ok(self.with_id(id))
    }

    #[cfg(test)]
    pub(crate) const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn with_id(self, id: ComponentTypeId) -> Self {
        Self(self.0 | id.bit())
    }

    pub fn without_id(self, id: ComponentTypeId) -> Self {
        Self(self.0 & !id.bit())
    }

    pub fn contains(self, id: ComponentTypeId) -> bool {
        self.0 & id.bit() != 0
    }

    pub fn is_superset_of(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_null(self) -> bool {
        self == Self::ALL
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#018x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MaskProbeA;
    impl Component for MaskProbeA {}

    struct MaskProbeB;
    impl Component for MaskProbeB {}

    #[test]
    fn superset_requires_every_usage_bit() {
        let a = component_type_id::<MaskProbeA>().expect("a");
        let b = component_type_id::<MaskProbeB>().expect("b");
        let usage = ComponentMask::EMPTY.with_id(a).with_id(b);

        assert!(ComponentMask::EMPTY
            .with_id(a)
            .with_id(b)
            .is_superset_of(usage));
        assert!(!ComponentMask::EMPTY.with_id(a).is_superset_of(usage));
        assert!(ComponentMask::EMPTY.is_superset_of(ComponentMask::EMPTY));
    }

    #[test]
    fn null_component_maps_to_all_bits() {
        let mask = ComponentMask::of::<NullComponent>().expect("null mask");
        assert!(mask.is_null());
        assert_eq!(mask.count(), 64);
    }

    #[test]
    fn add_then_remove_leaves_mask_unchanged() {
        let a = component_type_id::<MaskProbeA>().expect("a");
        let b = component_type_id::<MaskProbeB>().expect("b");
        let before = ComponentMask::EMPTY.with_id(b);
        let after = before.with_id(a).without_id(a);
        assert_eq!(before, after);
    }
}
