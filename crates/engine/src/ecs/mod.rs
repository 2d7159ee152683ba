//! Entity-component-system kernel.

mod components;
mod entity;
mod error;
mod mask;
mod registry;
mod singleton;
mod system;
mod workers;
mod world;

pub use components::Name;
pub use entity::{Entity, EntityIdAllocator, EntityRow};
pub use error::EcsError;
pub use mask::{ComponentMask, NullComponent};
pub use registry::{
    component_type_id, component_type_name, registered_component_types, Component,
    ComponentTypeId, MAX_COMPONENT_TYPES,
};
pub use system::{
    ContextId, SharedState, System, SystemFailure, SystemId, SystemMode, TickReport,
};
pub use workers::{partition_sizes, WorkerPool};
pub use world::{World, WorldConfig};
