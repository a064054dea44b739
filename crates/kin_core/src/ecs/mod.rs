//! Entity Component System core types.
//!
//! Entities are integer ids, components live in one [`Mapper`] per type, and
//! [`Family`] queries (required/excluded component sets) are kept up to date
//! incrementally. All structural change is funnelled through
//! [`Engine::flush`], which runs before and after every service during
//! [`Engine::update`].

mod bitset;
mod component;
mod config;
mod domain;
mod engine;
mod entity;
mod entity_set;
mod error;
mod family;
mod family_index;
mod mapper;
mod service;
mod systems;

pub use bitset::{Mask, Ones};
pub use component::Component;
pub use config::EngineConfig;
pub use domain::{ComponentDomain, DomainBuilder};
pub use engine::{Engine, EngineMetrics};
pub use entity::Entity;
pub use entity_set::EntitySet;
pub use error::{ComponentError, DomainError, EngineError};
pub use family::{EntityListener, Family, FamilySpec, ListenerId};
pub use mapper::Mapper;
pub use service::EngineService;
pub use systems::{for_each_entity, EntityProcessor, FamilyWatcher};
