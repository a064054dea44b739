use crate::ecs::Entity;
use thiserror::Error;

/// Errors raised while building a component domain or a family spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("component type '{name}' is not registered in the domain")]
    UnknownComponentType { name: &'static str },

    #[error("component type '{name}' is registered more than once")]
    DuplicateComponentType { name: &'static str },

    #[error("component '{name}' cannot be both required and excluded")]
    OverlappingFamilyMask { name: &'static str },

    #[error("component index {index} is outside a domain of {len} types")]
    IndexOutOfDomain { index: usize, len: usize },

    #[error("family domain is not a positional subset of the engine domain")]
    DomainMismatch,
}

/// Errors raised by a component mapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("entity {entity} already has a '{component}' component")]
    DuplicateComponent {
        component: &'static str,
        entity: Entity,
    },

    #[error("component '{component}' was registered without a constructor")]
    NoDefaultConstructor { component: &'static str },

    #[error("constructing component '{component}' failed: {reason}")]
    ConstructionFailed {
        component: &'static str,
        reason: String,
    },

    #[error("storage for '{component}' is borrowed elsewhere")]
    StoreBorrowed { component: &'static str },
}

/// Errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error("update or reset called while an update is already running")]
    IllegalNestedUpdate,

    #[error("entity {entity} is not alive")]
    EntityNotAlive { entity: Entity },

    #[error("service '{name}' is already registered")]
    DuplicateService { name: &'static str },

    #[error("service '{name}' is not registered")]
    ServiceNotRegistered { name: &'static str },

    #[error("service '{name}' is borrowed elsewhere")]
    ServiceBusy { name: &'static str },

    #[error("family {family} is being iterated and cannot be refreshed")]
    FamilyBusy { family: usize },

    #[error("service '{service}' failed: {message}")]
    Service {
        service: &'static str,
        message: String,
    },
}

impl EngineError {
    /// Convenience for services reporting their own failures.
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: message.into(),
        }
    }
}
