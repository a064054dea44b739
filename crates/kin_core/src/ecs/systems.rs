//! Ready-made services built from a family spec and callbacks
//!
//! - [`EntityProcessor`] calls a function for every member of a family on
//!   each update.
//! - [`FamilyWatcher`] remembers the membership it saw last update and
//!   reports the difference.

use crate::ecs::{Engine, EngineError, EngineService, Entity, EntitySet, Family, FamilySpec, Mask};

fn resolve(slot: &mut Option<Family>, spec: &FamilySpec, engine: &Engine) -> Result<Family, EngineError> {
    match slot {
        Some(family) => Ok(family.clone()),
        None => {
            let family = engine.family(spec)?;
            *slot = Some(family.clone());
            Ok(family)
        }
    }
}

/// Runs `process` for every member of a family, in ascending id order.
///
/// The callback may add or remove components and create or destroy
/// entities. It must not flush: the family is borrowed for the whole loop
/// and a flush would fail with `FamilyBusy`.
pub struct EntityProcessor<F> {
    name: &'static str,
    spec: FamilySpec,
    family: Option<Family>,
    process: F,
}

impl<F> EntityProcessor<F>
where
    F: FnMut(&Engine, Entity) -> Result<(), EngineError> + 'static,
{
    pub fn new(name: &'static str, spec: FamilySpec, process: F) -> Self {
        Self {
            name,
            spec,
            family: None,
            process,
        }
    }

    /// The processed family, once the engine has initialized this service.
    pub fn family(&self) -> Option<&Family> {
        self.family.as_ref()
    }
}

impl<F> EngineService for EntityProcessor<F>
where
    F: FnMut(&Engine, Entity) -> Result<(), EngineError> + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self, engine: &Engine) -> Result<(), EngineError> {
        resolve(&mut self.family, &self.spec, engine).map(drop)
    }

    fn update(&mut self, engine: &Engine) -> Result<(), EngineError> {
        let family = resolve(&mut self.family, &self.spec, engine)?;
        let members = family.entities();
        for entity in members.iter() {
            (self.process)(engine, entity)?;
        }
        Ok(())
    }
}

/// Reports family membership changes between consecutive updates.
///
/// Unlike an [`EntityListener`](crate::ecs::EntityListener), which sees every
/// flush, a watcher compares against what it saw on its own previous run, so
/// it only reports what its position in the service order lets it observe.
/// Use [`for_each_entity`] to turn a per-entity function into a callback.
pub struct FamilyWatcher<I, R> {
    name: &'static str,
    spec: FamilySpec,
    family: Option<Family>,
    last: Mask,
    inserted: EntitySet,
    removed: EntitySet,
    on_inserted: I,
    on_removed: R,
}

impl<I, R> FamilyWatcher<I, R>
where
    I: FnMut(&Engine, &EntitySet) -> Result<(), EngineError> + 'static,
    R: FnMut(&Engine, &EntitySet) -> Result<(), EngineError> + 'static,
{
    pub fn new(name: &'static str, spec: FamilySpec, on_inserted: I, on_removed: R) -> Self {
        Self {
            name,
            spec,
            family: None,
            last: Mask::new(),
            inserted: EntitySet::new(),
            removed: EntitySet::new(),
            on_inserted,
            on_removed,
        }
    }

    pub fn family(&self) -> Option<&Family> {
        self.family.as_ref()
    }
}

impl<I, R> EngineService for FamilyWatcher<I, R>
where
    I: FnMut(&Engine, &EntitySet) -> Result<(), EngineError> + 'static,
    R: FnMut(&Engine, &EntitySet) -> Result<(), EngineError> + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self, engine: &Engine) -> Result<(), EngineError> {
        resolve(&mut self.family, &self.spec, engine).map(drop)
    }

    fn update(&mut self, engine: &Engine) -> Result<(), EngineError> {
        let family = resolve(&mut self.family, &self.spec, engine)?;
        {
            let current = family.entities();
            self.inserted.set_all(current.mask());
            self.inserted.remove_all(&self.last);
            self.removed.set_all(&self.last);
            self.removed.remove_all(current.mask());
            self.last.copy_from(current.mask());
        }

        if !self.inserted.is_empty() {
            (self.on_inserted)(engine, &self.inserted)?;
        }
        if !self.removed.is_empty() {
            (self.on_removed)(engine, &self.removed)?;
        }
        Ok(())
    }
}

/// Adapt a per-entity function into a [`FamilyWatcher`] callback.
pub fn for_each_entity<F>(mut f: F) -> impl FnMut(&Engine, &EntitySet) -> Result<(), EngineError>
where
    F: FnMut(&Engine, Entity) -> Result<(), EngineError>,
{
    move |engine, entities| {
        for entity in entities {
            f(engine, entity)?;
        }
        Ok(())
    }
}
