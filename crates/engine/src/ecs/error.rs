use thiserror::Error;

use super::entity::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    #[error("entity {0:?} is null or unknown")]
    InvalidEntity(Entity),
    #[error("entity {entity:?} already has a {component} component")]
    DuplicateComponent {
        entity: Entity,
        component: &'static str,
    },
    #[error("entity {entity:?} has no {component} component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
    #[error("no {component} singleton is set")]
    MissingSingleton { component: &'static str },
    #[error("component type {component} exceeds the {limit} type limit")]
    TooManyTypes {
        component: &'static str,
        limit: usize,
    },
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
    #[error("system {system} failed: {message}")]
    SystemFailed {
        system: &'static str,
        message: String,
    },
}

impl EcsError {
    pub fn system_failed(system: &'static str, message: impl Into<String>) -> Self {
        Self::SystemFailed {
            system,
            message: message.into(),
        }
    }
}
