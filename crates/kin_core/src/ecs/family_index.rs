// family_index.rs - Deduplicated family registry and membership refresh

use crate::ecs::mapper::ErasedMapper;
use crate::ecs::{ComponentDomain, DomainError, Family, Mask};
use std::collections::HashMap;

#[derive(Clone, Default, PartialEq, Eq, Hash)]
struct FamilyKey {
    required: Mask,
    excluded: Mask,
}

/// Membership changes summed over every family in one refresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshTotals {
    pub inserted: usize,
    pub removed: usize,
}

/// Every family of an engine, keyed by its masks.
#[derive(Default)]
pub(crate) struct FamilyIndex {
    families: Vec<Family>,
    lookup: HashMap<FamilyKey, usize>,
    // Reused buffers: lookup key, per-family result, per-mapper overlay.
    scratch_key: FamilyKey,
    matched: Mask,
    overlay: Mask,
}

impl FamilyIndex {
    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Return the family for these masks, creating it on first request.
    ///
    /// A new family is filled by one pass over the current live entities and
    /// component presence. The bool is `true` when the family is new.
    pub fn get_or_create(
        &mut self,
        required: &Mask,
        excluded: &Mask,
        domain: &ComponentDomain,
        alive: &Mask,
        mappers: &[Box<dyn ErasedMapper>],
    ) -> Result<(Family, bool), DomainError> {
        for mask in [required, excluded] {
            if let Some(index) = mask.highest_bit().filter(|&index| index >= domain.len()) {
                return Err(DomainError::IndexOutOfDomain {
                    index,
                    len: domain.len(),
                });
            }
        }
        if let Some(index) = required.first_common(excluded) {
            return Err(DomainError::OverlappingFamilyMask {
                name: domain.name(index).unwrap_or("<unknown>"),
            });
        }

        self.scratch_key.required.copy_from(required);
        self.scratch_key.excluded.copy_from(excluded);
        if let Some(&id) = self.lookup.get(&self.scratch_key) {
            return Ok((self.families[id].clone(), false));
        }

        let mut members = alive.clone();
        for index in required.ones() {
            members.and(&mappers[index].present());
        }
        for index in excluded.ones() {
            members.and_not(&mappers[index].present());
        }

        let id = self.families.len();
        let family = Family::new(id, required.clone(), excluded.clone(), members);
        self.lookup.insert(self.scratch_key.clone(), id);
        self.families.push(family.clone());
        Ok((family, true))
    }

    /// First family whose membership is currently borrowed.
    pub fn busy_family(&self) -> Option<usize> {
        self.families
            .iter()
            .find(|family| !family.is_refreshable())
            .map(Family::id)
    }

    /// Recompute every family as it will look once pending removals apply.
    ///
    /// Entities pending destruction and components scheduled for removal are
    /// masked out through a per-mapper overlay, so no mapper is mutated here.
    pub fn refresh(
        &mut self,
        alive: &Mask,
        pending: &Mask,
        mappers: &[Box<dyn ErasedMapper>],
    ) -> RefreshTotals {
        let Self {
            families,
            matched,
            overlay,
            ..
        } = self;

        let mut totals = RefreshTotals::default();
        for family in families.iter() {
            matched.copy_from(alive).and_not(pending);
            for index in family.required().ones() {
                let mapper = &mappers[index];
                overlay.copy_from(&mapper.present()).and_not(&mapper.scheduled());
                matched.and(overlay);
            }
            for index in family.excluded().ones() {
                let mapper = &mappers[index];
                overlay.copy_from(&mapper.present()).and_not(&mapper.scheduled());
                matched.and_not(overlay);
            }

            let (inserted, removed) = family.refresh(matched);
            totals.inserted += inserted;
            totals.removed += removed;
        }
        totals
    }
}
