//! Per-type component storage
//!
//! A [`Mapper`] owns every instance of one component type, indexed by entity
//! id. Additions are visible at once. Removals are only scheduled and take
//! effect at the next engine flush, so a component stays readable for the
//! rest of the step that removed it.

use crate::ecs::component::Constructor;
use crate::ecs::{Component, ComponentError, Entity, Mask};
use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use tracing::trace;

/// Engine-wide "membership may have changed" flag shared by all mappers.
pub(crate) type DirtyFlag = Rc<Cell<bool>>;

/// Sparse storage for components of type `T`.
///
/// All methods take `&self`, so components can be added and removed while a
/// family of the same engine is being iterated.
pub struct Mapper<T: Component> {
    index: usize,
    constructor: Constructor<T>,
    pooled: bool,
    dirty: DirtyFlag,
    components: RefCell<Vec<Option<T>>>,
    present: RefCell<Mask>,
    scheduled: RefCell<Mask>,
    pool: RefCell<Vec<T>>,
}

impl<T: Component> Mapper<T> {
    pub(crate) fn new(
        index: usize,
        constructor: Constructor<T>,
        pooled: bool,
        dirty: DirtyFlag,
    ) -> Self {
        Self {
            index,
            constructor,
            pooled,
            dirty,
            components: RefCell::new(Vec::new()),
            present: RefCell::new(Mask::new()),
            scheduled: RefCell::new(Mask::new()),
            pool: RefCell::new(Vec::new()),
        }
    }

    /// Component index of `T` in the engine's domain.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        T::NAME
    }

    #[inline]
    pub fn has(&self, entity: Entity) -> bool {
        self.present.borrow().get(entity.index())
    }

    /// `true` if the component is present but will be dropped at the next flush.
    pub fn is_scheduled_for_removal(&self, entity: Entity) -> bool {
        self.scheduled.borrow().get(entity.index())
    }

    /// Number of entities currently holding a `T`.
    pub fn len(&self) -> usize {
        self.present.borrow().cardinality()
    }

    pub fn is_empty(&self) -> bool {
        self.present.borrow().is_empty()
    }

    /// Instances waiting in the free list. Always zero for unpooled types.
    pub fn pooled_len(&self) -> usize {
        self.pool.borrow().len()
    }

    /// Read the entity's component.
    ///
    /// Returns `None` if the entity has no `T`, but also while a
    /// [`get_mut`](Self::get_mut) guard from this mapper is alive. Use
    /// [`try_get`](Self::try_get) to tell the two apart.
    pub fn get(&self, entity: Entity) -> Option<Ref<'_, T>> {
        self.try_get(entity).ok().flatten()
    }

    /// Read the entity's component, failing with
    /// [`ComponentError::StoreBorrowed`] while a mutable guard is alive.
    pub fn try_get(&self, entity: Entity) -> Result<Option<Ref<'_, T>>, ComponentError> {
        let components = self
            .components
            .try_borrow()
            .map_err(|_| ComponentError::StoreBorrowed { component: T::NAME })?;
        Ok(Ref::filter_map(components, |slots| {
            slots.get(entity.index()).and_then(Option::as_ref)
        })
        .ok())
    }

    /// Mutate the entity's component.
    ///
    /// Returns `None` if the entity has no `T`, or while any other guard from
    /// this mapper is alive.
    pub fn get_mut(&self, entity: Entity) -> Option<RefMut<'_, T>> {
        self.try_get_mut(entity).ok().flatten()
    }

    pub fn try_get_mut(&self, entity: Entity) -> Result<Option<RefMut<'_, T>>, ComponentError> {
        let components = self
            .components
            .try_borrow_mut()
            .map_err(|_| ComponentError::StoreBorrowed { component: T::NAME })?;
        Ok(RefMut::filter_map(components, |slots| {
            slots.get_mut(entity.index()).and_then(Option::as_mut)
        })
        .ok())
    }

    /// Attach `component` to `entity`.
    ///
    /// Fails with [`ComponentError::DuplicateComponent`] if the entity already
    /// has a `T`, including one that is scheduled for removal.
    pub fn add(&self, entity: Entity, component: T) -> Result<(), ComponentError> {
        self.insert(entity, component).map(drop)
    }

    /// Construct a `T` (recycling from the pool when pooled), attach it and
    /// return it for initialization.
    ///
    /// Recycled instances keep the field values they had when removed.
    pub fn create(&self, entity: Entity) -> Result<RefMut<'_, T>, ComponentError> {
        if self.has(entity) {
            return Err(ComponentError::DuplicateComponent {
                component: T::NAME,
                entity,
            });
        }
        let component = self.create_component()?;
        self.insert(entity, component)
    }

    /// Produce a detached instance, from the pool when pooled.
    pub fn create_component(&self) -> Result<T, ComponentError> {
        if self.pooled {
            if let Some(component) = self.pool.borrow_mut().pop() {
                return Ok(component);
            }
        }
        self.constructor.construct()
    }

    /// Hand back a detached instance. Pooled types keep it for reuse,
    /// others just drop it.
    pub fn destroy_component(&self, component: T) {
        if self.pooled {
            self.pool.borrow_mut().push(component);
        }
    }

    /// Schedule the entity's `T` for removal at the next flush.
    ///
    /// Returns `false` if there was nothing to remove or it was already scheduled.
    pub fn remove(&self, entity: Entity) -> bool {
        if !self.has(entity) {
            return false;
        }
        let scheduled = self.scheduled.borrow_mut().set_changed(entity.index());
        if scheduled {
            self.dirty.set(true);
            trace!(component = T::NAME, %entity, "component removal scheduled");
        }
        scheduled
    }

    fn insert(&self, entity: Entity, component: T) -> Result<RefMut<'_, T>, ComponentError> {
        let Ok(mut components) = self.components.try_borrow_mut() else {
            return Err(ComponentError::StoreBorrowed { component: T::NAME });
        };
        let index = entity.index();
        if !self.present.borrow_mut().set_changed(index) {
            drop(components);
            self.destroy_component(component);
            return Err(ComponentError::DuplicateComponent {
                component: T::NAME,
                entity,
            });
        }
        if index >= components.len() {
            components.resize_with(index + 1, || None);
        }
        self.dirty.set(true);
        trace!(component = T::NAME, %entity, "component added");
        Ok(RefMut::map(components, |slots| slots[index].insert(component)))
    }
}

/// Type-erased view of a mapper used by the engine's flush.
pub(crate) trait ErasedMapper {
    fn as_any(&self) -> &dyn Any;

    fn name(&self) -> &'static str;

    fn present(&self) -> Ref<'_, Mask>;

    fn scheduled(&self) -> Ref<'_, Mask>;

    /// `true` while a component guard is held, which would block removal.
    fn is_busy(&self) -> bool;

    /// Drop every scheduled component, every component of a `destroyed`
    /// entity and every component held by an id outside `alive`. Returns the
    /// number of components removed.
    fn remove_scheduled(&self, destroyed: &Mask, alive: &Mask) -> usize;
}

impl<T: Component> ErasedMapper for Mapper<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &'static str {
        T::NAME
    }

    fn present(&self) -> Ref<'_, Mask> {
        self.present.borrow()
    }

    fn scheduled(&self) -> Ref<'_, Mask> {
        self.scheduled.borrow()
    }

    fn is_busy(&self) -> bool {
        self.components.try_borrow_mut().is_err()
    }

    fn remove_scheduled(&self, destroyed: &Mask, alive: &Mask) -> usize {
        let mut scheduled = self.scheduled.borrow_mut();
        let mut present = self.present.borrow_mut();
        // Components added to ids that were not alive.
        let mut orphaned = present.clone();
        orphaned.and_not(alive);
        scheduled.or(destroyed).or(&orphaned).and(&present);
        if scheduled.is_empty() {
            return 0;
        }

        let mut components = self.components.borrow_mut();
        let mut pool = self.pool.borrow_mut();
        let mut removed = 0;
        for index in scheduled.ones() {
            if let Some(component) = components.get_mut(index).and_then(Option::take) {
                removed += 1;
                if self.pooled {
                    pool.push(component);
                }
            }
        }
        present.and_not(&scheduled);
        scheduled.clear_all();
        trace!(component = T::NAME, removed, "scheduled components removed");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Debug, Default, PartialEq)]
    struct Counter(u32);
    define_component!(Counter);

    fn mapper(constructor: Constructor<Counter>, pooled: bool) -> (Mapper<Counter>, DirtyFlag) {
        let dirty: DirtyFlag = Rc::new(Cell::new(false));
        (Mapper::new(0, constructor, pooled, Rc::clone(&dirty)), dirty)
    }

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    fn everyone() -> Mask {
        (0..16).collect()
    }

    #[test]
    fn test_add_is_immediate_and_marks_dirty() -> Result<(), ComponentError> {
        let (counters, dirty) = mapper(Constructor::Unavailable, false);
        counters.add(e(3), Counter(7))?;

        assert!(dirty.get());
        assert!(counters.has(e(3)));
        assert!(!counters.has(e(2)));
        assert_eq!(counters.get(e(3)).as_deref(), Some(&Counter(7)));
        assert_eq!(counters.len(), 1);
        Ok(())
    }

    #[test]
    fn test_add_twice_fails() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Unavailable, false);
        counters.add(e(0), Counter(1))?;
        assert_eq!(
            counters.add(e(0), Counter(2)),
            Err(ComponentError::DuplicateComponent {
                component: "Counter",
                entity: e(0)
            })
        );
        assert_eq!(counters.get(e(0)).as_deref(), Some(&Counter(1)));
        Ok(())
    }

    #[test]
    fn test_create_without_constructor_fails() {
        let (counters, _) = mapper(Constructor::Unavailable, false);
        assert!(matches!(
            counters.create(e(0)),
            Err(ComponentError::NoDefaultConstructor { component: "Counter" })
        ));
        assert!(!counters.has(e(0)));
    }

    #[test]
    fn test_create_reports_constructor_failure() {
        let (counters, _) = mapper(Constructor::Fallible(|| Err("boom".to_owned())), false);
        let err = counters.create(e(0)).err();
        assert_eq!(
            err,
            Some(ComponentError::ConstructionFailed {
                component: "Counter",
                reason: "boom".to_owned()
            })
        );
    }

    #[test]
    fn test_create_returns_mutable_instance() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Default(Counter::default), false);
        counters.create(e(1))?.0 = 42;
        assert_eq!(counters.get(e(1)).as_deref(), Some(&Counter(42)));
        Ok(())
    }

    #[test]
    fn test_remove_nothing_is_a_no_op() {
        let (counters, dirty) = mapper(Constructor::Unavailable, false);
        assert!(!counters.remove(e(0)));
        assert!(!dirty.get());
    }

    #[test]
    fn test_remove_is_deferred_until_flush() -> Result<(), ComponentError> {
        let (counters, dirty) = mapper(Constructor::Unavailable, false);
        counters.add(e(2), Counter(5))?;
        dirty.set(false);

        assert!(counters.remove(e(2)));
        assert!(!counters.remove(e(2)));
        assert!(dirty.get());
        assert!(counters.has(e(2)));
        assert!(counters.is_scheduled_for_removal(e(2)));
        assert!(counters.get(e(2)).is_some());

        assert_eq!(counters.remove_scheduled(&Mask::new(), &everyone()), 1);
        assert!(!counters.has(e(2)));
        assert!(counters.get(e(2)).is_none());
        assert!(!counters.is_scheduled_for_removal(e(2)));
        Ok(())
    }

    #[test]
    fn test_destroyed_entities_lose_components() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Unavailable, false);
        counters.add(e(1), Counter(1))?;
        counters.add(e(4), Counter(4))?;

        let destroyed: Mask = [4, 9].into_iter().collect();
        assert_eq!(counters.remove_scheduled(&destroyed, &everyone()), 1);
        assert!(counters.has(e(1)));
        assert!(!counters.has(e(4)));
        Ok(())
    }

    #[test]
    fn test_components_of_dead_ids_are_dropped() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Unavailable, false);
        counters.add(e(1), Counter(1))?;
        counters.add(e(6), Counter(6))?;

        let alive: Mask = [1].into_iter().collect();
        assert_eq!(counters.remove_scheduled(&Mask::new(), &alive), 1);
        assert!(counters.has(e(1)));
        assert!(!counters.has(e(6)));
        Ok(())
    }

    #[test]
    fn test_pooled_instances_are_recycled() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Default(Counter::default), true);
        counters.create(e(0))?.0 = 9;
        counters.remove(e(0));
        counters.remove_scheduled(&Mask::new(), &everyone());
        assert_eq!(counters.pooled_len(), 1);

        let recycled = counters.create(e(1))?;
        assert_eq!(recycled.0, 9);
        drop(recycled);
        assert_eq!(counters.pooled_len(), 0);
        Ok(())
    }

    #[test]
    fn test_detached_instances_return_to_pool() -> Result<(), ComponentError> {
        let (pooled, _) = mapper(Constructor::Default(Counter::default), true);
        let detached = pooled.create_component()?;
        pooled.destroy_component(detached);
        assert_eq!(pooled.pooled_len(), 1);

        let (plain, _) = mapper(Constructor::Default(Counter::default), false);
        plain.destroy_component(Counter(1));
        assert_eq!(plain.pooled_len(), 0);
        Ok(())
    }

    #[test]
    fn test_add_while_guard_held_reports_borrow() -> Result<(), ComponentError> {
        let (counters, _) = mapper(Constructor::Unavailable, false);
        counters.add(e(0), Counter(0))?;
        let guard = counters.get_mut(e(0));
        assert!(guard.is_some());
        assert!(counters.is_busy());
        assert!(counters.get(e(0)).is_none());
        assert_eq!(
            counters.try_get(e(0)).err(),
            Some(ComponentError::StoreBorrowed { component: "Counter" })
        );
        assert_eq!(
            counters.add(e(1), Counter(1)),
            Err(ComponentError::StoreBorrowed { component: "Counter" })
        );
        assert!(!counters.has(e(1)));
        drop(guard);
        counters.add(e(1), Counter(1))?;
        assert!(counters.try_get(e(1))?.is_some());
        assert!(counters.try_get(e(5))?.is_none());
        Ok(())
    }
}
