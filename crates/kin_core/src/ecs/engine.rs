//! The engine: entity lifecycle, component stores, families and the flush
//!
//! Mutations made between flushes are queued rather than applied:
//! - entity creation and component addition are visible to lookups at once;
//! - entity destruction and component removal take effect at the next flush;
//! - family membership only changes at a flush.
//!
//! All operations take `&self`. A service can therefore iterate a family
//! and add, remove, create or destroy while it does so; what it iterates is
//! the snapshot established by the last flush.

use crate::ecs::config::EngineConfig;
use crate::ecs::entity::{Destroy, EntityAllocator};
use crate::ecs::family_index::FamilyIndex;
use crate::ecs::mapper::{DirtyFlag, ErasedMapper, Mapper};
use crate::ecs::service::ServiceRegistry;
use crate::ecs::{
    Component, ComponentDomain, ComponentError, DomainError, Entity, EngineError, EngineService,
    EntityListener, Family, FamilySpec, ListenerId, Mask,
};
use crate::settings::EngineSettings;
use kin_metrics::{Counter, ServiceProfiler, UpdateTimer};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Instrumentation collected by an engine.
///
/// Empty unless the `metrics` feature is enabled.
#[derive(Debug)]
pub struct EngineMetrics {
    updates: UpdateTimer,
    services: ServiceProfiler,
    counters: Counter,
}

impl EngineMetrics {
    fn new(window: usize) -> Self {
        Self {
            updates: UpdateTimer::new(window),
            services: ServiceProfiler::new(),
            counters: Counter::new(),
        }
    }

    /// Durations of recent `update` calls.
    pub fn updates(&self) -> &UpdateTimer {
        &self.updates
    }

    /// Accumulated wall time per service.
    pub fn services(&self) -> &ServiceProfiler {
        &self.services
    }

    /// Event counts such as `entities.created` or `flush.passes`.
    pub fn counters(&self) -> &Counter {
        &self.counters
    }
}

/// Clears a re-entrancy flag on drop.
struct ActiveFlag<'a>(&'a Cell<bool>);

impl<'a> ActiveFlag<'a> {
    fn enter(flag: &'a Cell<bool>) -> Result<Self, EngineError> {
        if flag.replace(true) {
            return Err(EngineError::IllegalNestedUpdate);
        }
        Ok(Self(flag))
    }
}

impl Drop for ActiveFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// In-memory entity/component store with incrementally maintained families.
pub struct Engine {
    domain: Rc<ComponentDomain>,
    settings: EngineSettings,
    dirty: DirtyFlag,
    updating: Cell<bool>,
    flushing: Cell<bool>,
    allocator: RefCell<EntityAllocator>,
    mappers: Vec<Box<dyn ErasedMapper>>,
    families: RefCell<FamilyIndex>,
    all_entities: Family,
    services: ServiceRegistry,
    metrics: RefCell<EngineMetrics>,
}

impl Engine {
    /// Build an engine, initialize its services in order, then flush once
    /// (unless `flush_on_create` is off).
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let EngineConfig {
            domain,
            services: slots,
            settings,
        } = config;

        let dirty: DirtyFlag = Rc::new(Cell::new(false));
        let mappers = domain.build_mappers(&dirty);
        let allocator = EntityAllocator::with_capacity(settings.initial_entity_capacity);

        let mut families = FamilyIndex::default();
        let (all_entities, _) = families.get_or_create(
            &Mask::new(),
            &Mask::new(),
            &domain,
            allocator.alive(),
            &mappers,
        )?;

        let mut services = ServiceRegistry::default();
        for slot in slots {
            services.register(slot)?;
        }

        let engine = Self {
            metrics: RefCell::new(EngineMetrics::new(settings.update_timing_window)),
            domain,
            settings,
            dirty,
            updating: Cell::new(false),
            flushing: Cell::new(false),
            allocator: RefCell::new(allocator),
            mappers,
            families: RefCell::new(families),
            all_entities,
            services,
        };

        info!(
            components = engine.domain.len(),
            services = engine.services.len(),
            "engine constructed"
        );

        for slot in engine.services.slots() {
            slot.borrow_mut()?.initialize(&engine)?;
        }
        if engine.settings.flush_on_create {
            engine.flush()?;
        }
        Ok(engine)
    }

    #[inline]
    pub fn domain(&self) -> &Rc<ComponentDomain> {
        &self.domain
    }

    #[inline]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// `true` if something changed since the last flush.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    #[inline]
    pub fn is_updating(&self) -> bool {
        self.updating.get()
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Allocate a new entity. It is live at once and joins families at the
    /// next flush.
    pub fn create_entity(&self) -> Entity {
        let entity = self.allocator.borrow_mut().create();
        self.dirty.set(true);
        self.count("entities.created", 1);
        trace!(%entity, "entity created");
        entity
    }

    /// Create an entity with a caller-chosen id.
    ///
    /// Returns `false` without effect if the id is live or still quarantined
    /// after a recent destroy.
    pub fn create_entity_with(&self, entity: Entity) -> bool {
        if !self.allocator.borrow_mut().create_with(entity) {
            return false;
        }
        self.dirty.set(true);
        self.count("entities.created", 1);
        trace!(%entity, "entity created with explicit id");
        true
    }

    /// Schedule an entity and all its components for removal at the next
    /// flush. Destroying an entity that is already pending is a no-op.
    pub fn destroy_entity(&self, entity: Entity) -> Result<(), EngineError> {
        let outcome = self.allocator.borrow_mut().destroy(entity);
        match outcome {
            Destroy::Scheduled => {
                self.dirty.set(true);
                trace!(%entity, "entity destruction scheduled");
                Ok(())
            }
            Destroy::AlreadyPending => Ok(()),
            Destroy::NotAlive => Err(EngineError::EntityNotAlive { entity }),
        }
    }

    /// `true` from creation until the flush that applies its destruction.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.borrow().is_alive(entity)
    }

    pub fn is_pending_destruction(&self, entity: Entity) -> bool {
        self.allocator.borrow().is_pending(entity)
    }

    // ------------------------------------------------------------------
    // Components and families
    // ------------------------------------------------------------------

    /// Store for component type `T`.
    pub fn mapper<T: Component>(&self) -> Result<&Mapper<T>, EngineError> {
        let index = self.domain.index_of::<T>()?;
        self.mappers[index]
            .as_any()
            .downcast_ref::<Mapper<T>>()
            .ok_or_else(|| DomainError::UnknownComponentType { name: T::NAME }.into())
    }

    /// Live family for `spec`. Equal specs share one family.
    pub fn family(&self, spec: &FamilySpec) -> Result<Family, EngineError> {
        if !spec.domain().is_subset_of(&self.domain) {
            return Err(DomainError::DomainMismatch.into());
        }
        self.family_from_masks(spec.required(), spec.excluded())
    }

    /// Live family for raw component-index masks.
    pub fn family_from_masks(&self, required: &Mask, excluded: &Mask) -> Result<Family, EngineError> {
        let allocator = self.allocator.borrow();
        let (family, created) = self.families.borrow_mut().get_or_create(
            required,
            excluded,
            &self.domain,
            allocator.alive(),
            &self.mappers,
        )?;
        if created {
            debug!(
                family = family.id(),
                ?required,
                ?excluded,
                entities = family.entities().len(),
                "family created"
            );
        }
        Ok(family)
    }

    /// The family of every entity.
    pub fn entities(&self) -> Family {
        self.all_entities.clone()
    }

    pub fn family_count(&self) -> usize {
        self.families.borrow().families().len()
    }

    pub fn add_listener<L: EntityListener + 'static>(
        &self,
        family: &Family,
        listener: L,
    ) -> ListenerId {
        family.add_listener(listener)
    }

    pub fn remove_listener(&self, family: &Family, id: ListenerId) -> bool {
        family.remove_listener(id)
    }

    /// Listen to entities being created and destroyed.
    pub fn add_entity_listener<L: EntityListener + 'static>(&self, listener: L) -> ListenerId {
        self.all_entities.add_listener(listener)
    }

    pub fn remove_entity_listener(&self, id: ListenerId) -> bool {
        self.all_entities.remove_listener(id)
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    pub fn service<S: EngineService>(&self) -> Result<Ref<'_, S>, EngineError> {
        self.services.get::<S>()
    }

    pub fn service_mut<S: EngineService>(&self) -> Result<RefMut<'_, S>, EngineError> {
        self.services.get_mut::<S>()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn metrics(&self) -> Ref<'_, EngineMetrics> {
        self.metrics.borrow()
    }

    fn count(&self, name: &'static str, value: usize) {
        if let Ok(mut metrics) = self.metrics.try_borrow_mut() {
            metrics.counters.add(name, value as u64);
        }
    }

    fn with_metrics(&self, f: impl FnOnce(&mut EngineMetrics)) {
        if let Ok(mut metrics) = self.metrics.try_borrow_mut() {
            f(&mut metrics);
        }
    }

    // ------------------------------------------------------------------
    // Flush and update
    // ------------------------------------------------------------------

    /// Apply queued removals and bring every family up to date.
    ///
    /// Each pass recomputes all families against the state as it will be
    /// once pending removals apply, notifies listeners, then applies the
    /// removals. Passes repeat while listeners leave new work behind.
    pub fn flush(&self) -> Result<(), EngineError> {
        if !self.dirty.get() {
            return Ok(());
        }
        let _flushing = ActiveFlag::enter(&self.flushing)?;

        if let Some(family) = self.families.borrow().busy_family() {
            return Err(EngineError::FamilyBusy { family });
        }
        if let Some(mapper) = self.mappers.iter().find(|mapper| mapper.is_busy()) {
            return Err(ComponentError::StoreBorrowed {
                component: mapper.name(),
            }
            .into());
        }

        let mut passes = 0;
        while self.dirty.replace(false) {
            passes += 1;

            let totals = {
                let allocator = self.allocator.borrow();
                self.families.borrow_mut().refresh(
                    allocator.alive(),
                    allocator.pending(),
                    &self.mappers,
                )
            };
            if totals.inserted > 0 || totals.removed > 0 {
                self.notify_listeners();
            }

            let components_removed: usize = {
                let allocator = self.allocator.borrow();
                self.mappers
                    .iter()
                    .map(|mapper| mapper.remove_scheduled(allocator.pending(), allocator.alive()))
                    .sum()
            };
            let entities_removed = self.allocator.borrow_mut().apply_removals();

            debug!(
                pass = passes,
                entities_removed,
                components_removed,
                inserted = totals.inserted,
                removed = totals.removed,
                "flush pass"
            );
            self.with_metrics(|metrics| {
                metrics.counters.add("flush.passes", 1);
                metrics.counters.add("entities.destroyed", entities_removed as u64);
                metrics.counters.add("components.removed", components_removed as u64);
                metrics.counters.add("family.inserted", totals.inserted as u64);
                metrics.counters.add("family.removed", totals.removed as u64);
            });
        }
        Ok(())
    }

    fn notify_listeners(&self) {
        // Listeners may request new families, which needs the index unborrowed.
        let families = self.families.borrow().families().to_vec();
        for family in &families {
            family.notify();
        }
    }

    /// Run one full cycle: flush, then each service in order, each followed
    /// by a flush.
    ///
    /// Ids destroyed two cycles ago become available again once the leading
    /// flush of an update has succeeded.
    pub fn update(&self) -> Result<(), EngineError> {
        let _updating = ActiveFlag::enter(&self.updating)?;
        self.with_metrics(|metrics| metrics.updates.begin());

        self.flush()?;
        self.allocator.borrow_mut().advance_cycle();
        for slot in self.services.slots() {
            let started = kin_metrics::ENABLED.then(Instant::now);
            let result = slot.borrow_mut()?.update(self);
            if let Some(started) = started {
                let elapsed = started.elapsed();
                self.with_metrics(|metrics| metrics.services.record(slot.name(), elapsed));
            }
            if let Err(err) = result {
                warn!(service = slot.name(), error = %err, "service update failed");
                return Err(err);
            }
            self.flush()?;
        }

        self.with_metrics(|metrics| metrics.updates.end());
        Ok(())
    }

    /// Destroy every entity and flush. Not allowed while updating.
    pub fn reset(&self) -> Result<(), EngineError> {
        let _updating = ActiveFlag::enter(&self.updating)?;
        self.flush()?;
        let destroyed = self.allocator.borrow_mut().destroy_all();
        if destroyed > 0 {
            self.dirty.set(true);
        }
        self.flush()?;
        info!(destroyed, "engine reset");
        Ok(())
    }
}
