// config.rs - Everything needed to construct an Engine

use crate::ecs::service::ServiceSlot;
use crate::ecs::{ComponentDomain, EngineService};
use crate::settings::EngineSettings;
use std::rc::Rc;

/// Builder for [`Engine`](crate::ecs::Engine): the component domain, the
/// ordered service list and the settings.
///
/// ```ignore
/// let engine = Engine::new(
///     EngineConfig::new(domain)
///         .with_service(Movement::default())
///         .with_service(Render::default()),
/// )?;
/// ```
pub struct EngineConfig {
    pub(crate) domain: Rc<ComponentDomain>,
    pub(crate) services: Vec<ServiceSlot>,
    pub(crate) settings: EngineSettings,
}

impl EngineConfig {
    pub fn new(domain: Rc<ComponentDomain>) -> Self {
        Self {
            domain,
            services: Vec::new(),
            settings: EngineSettings::default(),
        }
    }

    /// Append a service. Services run in the order they are added.
    pub fn with_service<S: EngineService>(mut self, service: S) -> Self {
        self.services.push(ServiceSlot::new(service));
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn domain(&self) -> &Rc<ComponentDomain> {
        &self.domain
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}
