//! Engine services
//!
//! A service is user logic run once per [`Engine::update`], in registration
//! order, with a flush after each one. Services are stored behind
//! `Rc<RefCell<_>>` so one service can look up another by type while the
//! engine is running.

use crate::ecs::{Engine, EngineError};
use std::any::{type_name, Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

/// Unit of per-update logic.
pub trait EngineService: 'static {
    /// Name used in logs, errors and metrics.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once, in registration order, while the engine is being built.
    fn initialize(&mut self, _engine: &Engine) -> Result<(), EngineError> {
        Ok(())
    }

    fn update(&mut self, engine: &Engine) -> Result<(), EngineError>;
}

pub(crate) struct ServiceSlot {
    name: &'static str,
    type_id: TypeId,
    service: Rc<RefCell<dyn EngineService>>,
    any: Rc<dyn Any>,
}

impl ServiceSlot {
    pub fn new<S: EngineService>(service: S) -> Self {
        let name = service.name();
        let cell = Rc::new(RefCell::new(service));
        Self {
            name,
            type_id: TypeId::of::<S>(),
            service: Rc::clone(&cell) as Rc<RefCell<dyn EngineService>>,
            any: cell,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn borrow_mut(&self) -> Result<RefMut<'_, dyn EngineService>, EngineError> {
        self.service
            .try_borrow_mut()
            .map_err(|_| EngineError::ServiceBusy { name: self.name })
    }
}

/// Services of one engine, in registration order.
#[derive(Default)]
pub(crate) struct ServiceRegistry {
    slots: Vec<ServiceSlot>,
    by_type: HashMap<TypeId, usize>,
}

impl ServiceRegistry {
    pub fn register(&mut self, slot: ServiceSlot) -> Result<(), EngineError> {
        if self.by_type.contains_key(&slot.type_id) {
            return Err(EngineError::DuplicateService { name: slot.name });
        }
        self.by_type.insert(slot.type_id, self.slots.len());
        self.slots.push(slot);
        Ok(())
    }

    pub fn slots(&self) -> &[ServiceSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    fn cell<S: EngineService>(&self) -> Result<(&ServiceSlot, &RefCell<S>), EngineError> {
        let missing = EngineError::ServiceNotRegistered {
            name: type_name::<S>(),
        };
        let Some(&index) = self.by_type.get(&TypeId::of::<S>()) else {
            return Err(missing);
        };
        let slot = &self.slots[index];
        match (*slot.any).downcast_ref::<RefCell<S>>() {
            Some(cell) => Ok((slot, cell)),
            None => Err(missing),
        }
    }

    pub fn get<S: EngineService>(&self) -> Result<Ref<'_, S>, EngineError> {
        let (slot, cell) = self.cell::<S>()?;
        cell.try_borrow()
            .map_err(|_| EngineError::ServiceBusy { name: slot.name })
    }

    pub fn get_mut<S: EngineService>(&self) -> Result<RefMut<'_, S>, EngineError> {
        let (slot, cell) = self.cell::<S>()?;
        cell.try_borrow_mut()
            .map_err(|_| EngineError::ServiceBusy { name: slot.name })
    }
}
