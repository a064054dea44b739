// entity_set.rs - Bitset of entities with a lazily rebuilt dense id list

use super::{Entity, Mask};
use once_cell::unsync::OnceCell;
use std::fmt;

/// Set of entities.
///
/// Membership is a [`Mask`]. Iteration goes through a dense, ascending list
/// of ids that is rebuilt on first use after any mutation and then reused.
#[derive(Clone, Default)]
pub struct EntitySet {
    mask: Mask,
    indices: OnceCell<Vec<Entity>>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mask(mask: Mask) -> Self {
        Self {
            mask,
            indices: OnceCell::new(),
        }
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.mask.get(entity.index())
    }

    /// Returns `true` if the entity was not already a member.
    pub fn insert(&mut self, entity: Entity) -> bool {
        let changed = self.mask.set_changed(entity.index());
        if changed {
            self.indices.take();
        }
        changed
    }

    /// Returns `true` if the entity was a member.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let changed = self.mask.clear_changed(entity.index());
        if changed {
            self.indices.take();
        }
        changed
    }

    /// Add every entity set in `entities`.
    pub fn add_all(&mut self, entities: &Mask) {
        self.mask_mut().or(entities);
    }

    /// Remove every entity set in `entities`.
    pub fn remove_all(&mut self, entities: &Mask) {
        self.mask_mut().and_not(entities);
    }

    /// Replace the membership with `entities`.
    pub fn set_all(&mut self, entities: &Mask) {
        self.mask_mut().copy_from(entities);
    }

    pub fn clear(&mut self) {
        self.mask.clear_all();
        self.indices.take();
    }

    #[inline]
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Mutable access to the membership bits. Invalidates the id list.
    pub fn mask_mut(&mut self) -> &mut Mask {
        self.indices.take();
        &mut self.mask
    }

    /// Members in ascending id order.
    pub fn indices(&self) -> &[Entity] {
        self.indices
            .get_or_init(|| self.mask.ones().map(Entity::from_index).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.indices().iter().copied()
    }

    pub fn len(&self) -> usize {
        match self.indices.get() {
            Some(indices) => indices.len(),
            None => self.mask.cardinality(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }
}

impl PartialEq for EntitySet {
    fn eq(&self, other: &Self) -> bool {
        self.mask == other.mask
    }
}

impl Eq for EntitySet {}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.mask.ones()).finish()
    }
}

impl FromIterator<Entity> for EntitySet {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::from_mask(iter.into_iter().map(Entity::index).collect())
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = Entity;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Entity>>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices().iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &EntitySet) -> Vec<u32> {
        set.iter().map(Entity::id).collect()
    }

    #[test]
    fn test_indices_follow_mutations() {
        let mut set = EntitySet::new();
        assert!(set.insert(Entity::from_raw(5)));
        assert!(set.insert(Entity::from_raw(1)));
        assert!(!set.insert(Entity::from_raw(5)));
        assert_eq!(ids(&set), vec![1, 5]);

        assert!(set.remove(Entity::from_raw(1)));
        assert!(!set.remove(Entity::from_raw(1)));
        assert_eq!(ids(&set), vec![5]);
        assert_eq!(set.len(), 1);

        set.mask_mut().set(130);
        assert_eq!(ids(&set), vec![5, 130]);

        set.add_all(&[7, 8].into_iter().collect());
        set.remove_all(&[5, 8].into_iter().collect());
        assert_eq!(ids(&set), vec![7, 130]);
        set.set_all(&[1].into_iter().collect());
        assert_eq!(ids(&set), vec![1]);

        set.clear();
        assert!(set.is_empty());
        assert!(set.indices().is_empty());
    }

    #[test]
    fn test_equality_ignores_cached_indices() {
        let a: EntitySet = [Entity::from_raw(2), Entity::from_raw(9)].into_iter().collect();
        let b = EntitySet::from_mask([9, 2].into_iter().collect());
        let _ = a.indices();
        assert_eq!(a, b);
        assert!(a.contains(Entity::from_raw(9)));
        assert!(!a.contains(Entity::from_raw(3)));
    }
}
