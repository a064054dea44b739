//! Entity handles and id allocation
//!
//! Entities are plain integer ids. Liveness lives in the allocator, not in
//! the handle, so a stale handle simply reads as "not alive".
//!
//! Ids freed by a destroy are quarantined: they stay unavailable for the rest
//! of the update cycle they were freed in and the whole following cycle.
//! A consumer that snapshots a family membership once per update will
//! therefore never see a destroyed id come back as a "new" entity before it
//! has observed the removal.

use super::bitset::Mask;
use std::fmt;

/// Entity handle.
///
/// Only meaningful together with the engine that issued it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u32);

impl Entity {
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of scheduling an entity for destruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Destroy {
    Scheduled,
    AlreadyPending,
    NotAlive,
}

/// Tracks live ids, pending destroys and the reuse quarantine.
#[derive(Debug, Default)]
pub(crate) struct EntityAllocator {
    alive: Mask,
    /// Ids that may not be handed out: every live id plus quarantined ones.
    reserved: Mask,
    pending: Mask,
    destroyed_this_cycle: Mask,
    destroyed_last_cycle: Mask,
}

impl EntityAllocator {
    pub fn with_capacity(entities: usize) -> Self {
        Self {
            alive: Mask::with_capacity(entities),
            reserved: Mask::with_capacity(entities),
            pending: Mask::with_capacity(entities),
            destroyed_this_cycle: Mask::new(),
            destroyed_last_cycle: Mask::new(),
        }
    }

    /// Allocate the lowest id that is neither live nor quarantined.
    pub fn create(&mut self) -> Entity {
        let index = self.reserved.next_clear_bit(0);
        self.alive.set(index);
        self.reserved.set(index);
        Entity::from_index(index)
    }

    /// Claim a specific id. Fails if it is live or quarantined.
    pub fn create_with(&mut self, entity: Entity) -> bool {
        if !self.reserved.set_changed(entity.index()) {
            return false;
        }
        self.alive.set(entity.index());
        true
    }

    pub fn destroy(&mut self, entity: Entity) -> Destroy {
        if !self.alive.get(entity.index()) {
            return Destroy::NotAlive;
        }
        if !self.pending.set_changed(entity.index()) {
            return Destroy::AlreadyPending;
        }
        self.destroyed_this_cycle.set(entity.index());
        Destroy::Scheduled
    }

    /// Schedule every live entity that is not already pending.
    pub fn destroy_all(&mut self) -> usize {
        let mut fresh = self.alive.clone();
        fresh.and_not(&self.pending);
        self.pending.or(&fresh);
        self.destroyed_this_cycle.or(&fresh);
        fresh.cardinality()
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index())
    }

    #[inline]
    pub fn is_pending(&self, entity: Entity) -> bool {
        self.pending.get(entity.index())
    }

    #[inline]
    pub fn alive(&self) -> &Mask {
        &self.alive
    }

    #[inline]
    pub fn pending(&self) -> &Mask {
        &self.pending
    }

    /// Drop pending entities from the live set. Returns how many went.
    pub fn apply_removals(&mut self) -> usize {
        let removed = self.pending.cardinality();
        self.alive.and_not(&self.pending);
        self.pending.clear_all();
        removed
    }

    /// Start a new update cycle, releasing ids freed two cycles ago.
    pub fn advance_cycle(&mut self) {
        self.reserved.and_not(&self.destroyed_last_cycle);
        std::mem::swap(&mut self.destroyed_this_cycle, &mut self.destroyed_last_cycle);
        self.destroyed_this_cycle.clear_all();
    }
}
