//! Family specs and live families
//!
//! A [`FamilySpec`] describes a query: component types an entity must have
//! and types it must not have. Handing a spec to the engine yields a
//! [`Family`], whose membership the engine keeps current at every flush.

use crate::ecs::{Component, ComponentDomain, DomainError, EntitySet, Mask};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Required and excluded component types, relative to a domain.
#[derive(Clone)]
pub struct FamilySpec {
    domain: Rc<ComponentDomain>,
    required: Mask,
    excluded: Mask,
}

impl FamilySpec {
    pub(crate) fn new(domain: Rc<ComponentDomain>) -> Self {
        Self {
            domain,
            required: Mask::new(),
            excluded: Mask::new(),
        }
    }

    pub fn domain(&self) -> &Rc<ComponentDomain> {
        &self.domain
    }

    #[inline]
    pub fn required(&self) -> &Mask {
        &self.required
    }

    #[inline]
    pub fn excluded(&self) -> &Mask {
        &self.excluded
    }

    /// Also require `T`.
    pub fn with<T: Component>(mut self) -> Result<Self, DomainError> {
        let index = self.domain.index_of::<T>()?;
        if self.excluded.get(index) {
            return Err(DomainError::OverlappingFamilyMask { name: T::NAME });
        }
        self.required.set(index);
        Ok(self)
    }

    /// Also exclude `T`.
    pub fn without<T: Component>(mut self) -> Result<Self, DomainError> {
        let index = self.domain.index_of::<T>()?;
        if self.required.get(index) {
            return Err(DomainError::OverlappingFamilyMask { name: T::NAME });
        }
        self.excluded.set(index);
        Ok(self)
    }

    pub fn requires<T: Component>(&self) -> Result<bool, DomainError> {
        Ok(self.required.get(self.domain.index_of::<T>()?))
    }

    pub fn excludes<T: Component>(&self) -> Result<bool, DomainError> {
        Ok(self.excluded.get(self.domain.index_of::<T>()?))
    }
}

impl PartialEq for FamilySpec {
    fn eq(&self, other: &Self) -> bool {
        self.required == other.required
            && self.excluded == other.excluded
            && (Rc::ptr_eq(&self.domain, &other.domain)
                || (self.domain.is_subset_of(&other.domain)
                    && other.domain.is_subset_of(&self.domain)))
    }
}

impl Eq for FamilySpec {}

impl Hash for FamilySpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.required.hash(state);
        self.excluded.hash(state);
    }
}

impl fmt::Debug for FamilySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |mask: &Mask| -> Vec<&'static str> {
            mask.ones().filter_map(|index| self.domain.name(index)).collect()
        };
        f.debug_struct("FamilySpec")
            .field("required", &names(&self.required))
            .field("excluded", &names(&self.excluded))
            .finish()
    }
}

/// Receives membership changes of a family, once per flush pass.
///
/// Listeners see only the delta sets. Engine mutations they would trigger
/// belong in a service.
pub trait EntityListener {
    fn inserted(&mut self, entities: &EntitySet);

    fn removed(&mut self, entities: &EntitySet);
}

impl<L: EntityListener + ?Sized> EntityListener for Rc<RefCell<L>> {
    fn inserted(&mut self, entities: &EntitySet) {
        self.borrow_mut().inserted(entities);
    }

    fn removed(&mut self, entities: &EntitySet) {
        self.borrow_mut().removed(entities);
    }
}

/// Handle returned when a listener is registered, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    detached: Cell<bool>,
    listener: RefCell<Box<dyn EntityListener>>,
}

pub(crate) struct FamilyState {
    id: usize,
    required: Mask,
    excluded: Mask,
    entities: RefCell<EntitySet>,
    inserted: RefCell<EntitySet>,
    removed: RefCell<EntitySet>,
    next_listener: Cell<u64>,
    listeners: RefCell<Vec<Rc<ListenerEntry>>>,
}

/// Shared handle to a live family.
///
/// Cloning is cheap. Every handle obtained for an equal spec refers to the
/// same family.
#[derive(Clone)]
pub struct Family {
    state: Rc<FamilyState>,
}

impl Family {
    pub(crate) fn new(id: usize, required: Mask, excluded: Mask, members: Mask) -> Self {
        Self {
            state: Rc::new(FamilyState {
                id,
                required,
                excluded,
                entities: RefCell::new(EntitySet::from_mask(members)),
                inserted: RefCell::new(EntitySet::new()),
                removed: RefCell::new(EntitySet::new()),
                next_listener: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Position of this family in the engine's family list.
    #[inline]
    pub fn id(&self) -> usize {
        self.state.id
    }

    #[inline]
    pub fn required(&self) -> &Mask {
        &self.state.required
    }

    #[inline]
    pub fn excluded(&self) -> &Mask {
        &self.state.excluded
    }

    /// Current members.
    ///
    /// While the guard is alive the engine cannot flush; it reports
    /// [`EngineError::FamilyBusy`](crate::ecs::EngineError::FamilyBusy) instead.
    pub fn entities(&self) -> Ref<'_, EntitySet> {
        self.state.entities.borrow()
    }

    /// Entities that joined during the most recent flush pass.
    pub fn inserted(&self) -> Ref<'_, EntitySet> {
        self.state.inserted.borrow()
    }

    /// Entities that left during the most recent flush pass.
    pub fn removed(&self) -> Ref<'_, EntitySet> {
        self.state.removed.borrow()
    }

    /// Register a listener. Listeners run in registration order.
    ///
    /// A listener added from inside a callback first hears about the next
    /// flush pass.
    pub fn add_listener<L: EntityListener + 'static>(&self, listener: L) -> ListenerId {
        let id = ListenerId(self.state.next_listener.get());
        self.state.next_listener.set(id.0 + 1);
        self.state.listeners.borrow_mut().push(Rc::new(ListenerEntry {
            id,
            detached: Cell::new(false),
            listener: RefCell::new(Box::new(listener)),
        }));
        id
    }

    /// Unregister a listener. Safe to call from a callback of this family;
    /// the removed listener receives nothing further, even later in the
    /// same dispatch. Returns `false` for an unknown id.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let entry = {
            let mut listeners = self.state.listeners.borrow_mut();
            let Some(position) = listeners.iter().position(|entry| entry.id == id) else {
                return false;
            };
            listeners.remove(position)
        };
        entry.detached.set(true);
        true
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Family) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// `false` while anyone holds a membership guard.
    pub(crate) fn is_refreshable(&self) -> bool {
        self.state.entities.try_borrow_mut().is_ok()
            && self.state.inserted.try_borrow_mut().is_ok()
            && self.state.removed.try_borrow_mut().is_ok()
    }

    /// Install `matched` as the new membership and record the delta.
    /// Returns `(inserted, removed)` counts.
    pub(crate) fn refresh(&self, matched: &Mask) -> (usize, usize) {
        let mut entities = self.state.entities.borrow_mut();
        let mut inserted = self.state.inserted.borrow_mut();
        let mut removed = self.state.removed.borrow_mut();

        inserted.mask_mut().copy_from(matched).and_not(entities.mask());
        removed.mask_mut().copy_from(entities.mask()).and_not(matched);
        if !inserted.is_empty() || !removed.is_empty() {
            entities.mask_mut().copy_from(matched);
        }
        (inserted.len(), removed.len())
    }

    /// Deliver the last refresh's deltas to every listener.
    pub(crate) fn notify(&self) {
        let inserted = self.state.inserted.borrow();
        let removed = self.state.removed.borrow();
        if inserted.is_empty() && removed.is_empty() {
            return;
        }

        // Callbacks may add or remove listeners, so dispatch from a snapshot.
        let active = self.state.listeners.borrow().clone();
        if !inserted.is_empty() {
            for entry in active.iter().filter(|entry| !entry.detached.get()) {
                entry.listener.borrow_mut().inserted(&inserted);
            }
        }
        if !removed.is_empty() {
            for entry in active.iter().filter(|entry| !entry.detached.get()) {
                entry.listener.borrow_mut().removed(&removed);
            }
        }
    }
}

impl PartialEq for Family {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Family {}

impl fmt::Debug for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("id", &self.state.id)
            .field("required", &self.state.required)
            .field("excluded", &self.state.excluded)
            .field("entities", &*self.state.entities.borrow())
            .finish()
    }
}
