//! Kin Core
//!
//! In-memory entity/component store:
//! - Component domain and per-type component mappers
//! - Entity allocation with delayed id reuse
//! - Families (component queries) maintained incrementally at each flush
//! - Services, processors and watchers driven by `Engine::update`
//! - Engine settings

pub mod ecs;
pub mod settings;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
