//! Component domain: the ordered set of component types an engine knows
//!
//! A component type's position in the domain is its component index. Masks
//! over component indices (family specs) only make sense relative to the
//! domain that produced them.

use crate::ecs::component::Constructor;
use crate::ecs::mapper::{DirtyFlag, ErasedMapper, Mapper};
use crate::ecs::{Component, DomainError, FamilySpec};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type MapperFactory = Box<dyn Fn(usize, DirtyFlag) -> Box<dyn ErasedMapper>>;

struct ComponentEntry {
    type_id: TypeId,
    name: &'static str,
    pooled: bool,
    make_mapper: MapperFactory,
}

/// Immutable, ordered registry of component types.
///
/// Built once with [`ComponentDomain::builder`] and shared through `Rc`.
pub struct ComponentDomain {
    entries: Vec<ComponentEntry>,
    by_type: HashMap<TypeId, usize>,
}

impl ComponentDomain {
    pub fn builder() -> DomainBuilder {
        DomainBuilder::default()
    }

    /// A domain with no component types. Its families match every entity.
    pub fn empty() -> Rc<Self> {
        Rc::new(Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Component index of `T`.
    pub fn index_of<T: Component>(&self) -> Result<usize, DomainError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(DomainError::UnknownComponentType { name: T::NAME })
    }

    pub fn contains<T: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Name of the component type at `index`.
    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|entry| entry.name)
    }

    pub fn is_pooled(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|entry| entry.pooled)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    /// `true` if every type of `self` sits at the same position in `other`.
    pub fn is_subset_of(&self, other: &ComponentDomain) -> bool {
        self.entries.len() <= other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(mine, theirs)| mine.type_id == theirs.type_id)
    }

    /// Spec with no constraints, matching every entity.
    pub fn family(self: &Rc<Self>) -> FamilySpec {
        FamilySpec::new(Rc::clone(self))
    }

    /// Spec requiring `T`.
    pub fn family_with<T: Component>(self: &Rc<Self>) -> Result<FamilySpec, DomainError> {
        self.family().with::<T>()
    }

    /// Spec excluding `T`.
    pub fn family_without<T: Component>(self: &Rc<Self>) -> Result<FamilySpec, DomainError> {
        self.family().without::<T>()
    }

    pub(crate) fn build_mappers(&self, dirty: &DirtyFlag) -> Vec<Box<dyn ErasedMapper>> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.make_mapper)(index, Rc::clone(dirty)))
            .collect()
    }
}

impl fmt::Debug for ComponentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Collects component registrations in index order.
#[derive(Default)]
pub struct DomainBuilder {
    entries: Vec<ComponentEntry>,
    by_type: HashMap<TypeId, usize>,
    duplicate: Option<&'static str>,
}

impl DomainBuilder {
    /// Register `T` without a constructor. `Mapper::create` will fail for it.
    pub fn register<T: Component>(self) -> Self {
        self.push::<T>(Constructor::Unavailable, false)
    }

    /// Register `T`, constructing fresh instances with `Default`.
    pub fn register_default<T: Component + Default>(self) -> Self {
        self.push::<T>(Constructor::Default(T::default), false)
    }

    /// Register `T` with a constructor that may fail.
    pub fn register_with<T: Component>(self, make: fn() -> Result<T, String>) -> Self {
        self.push::<T>(Constructor::Fallible(make), false)
    }

    /// Register `T` with a free list: removed instances are recycled by `create`.
    pub fn register_pooled<T: Component + Default>(self) -> Self {
        self.push::<T>(Constructor::Default(T::default), true)
    }

    fn push<T: Component>(mut self, constructor: Constructor<T>, pooled: bool) -> Self {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            self.duplicate.get_or_insert(T::NAME);
            return self;
        }
        self.by_type.insert(type_id, self.entries.len());
        self.entries.push(ComponentEntry {
            type_id,
            name: T::NAME,
            pooled,
            make_mapper: Box::new(
                move |index: usize, dirty: DirtyFlag| -> Box<dyn ErasedMapper> {
                    Box::new(Mapper::<T>::new(index, constructor, pooled, dirty))
                },
            ),
        });
        self
    }

    pub fn build(self) -> Result<Rc<ComponentDomain>, DomainError> {
        if let Some(name) = self.duplicate {
            return Err(DomainError::DuplicateComponentType { name });
        }
        Ok(Rc::new(ComponentDomain {
            entries: self.entries,
            by_type: self.by_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Default)]
    struct Position;
    define_component!(Position);

    #[derive(Default)]
    struct Velocity;
    define_component!(Velocity);

    struct Tag;
    define_component!(Tag);

    #[test]
    fn test_indices_follow_registration_order() -> Result<(), DomainError> {
        let domain = ComponentDomain::builder()
            .register_default::<Position>()
            .register_pooled::<Velocity>()
            .register::<Tag>()
            .build()?;

        assert_eq!(domain.len(), 3);
        assert_eq!(domain.index_of::<Position>()?, 0);
        assert_eq!(domain.index_of::<Velocity>()?, 1);
        assert_eq!(domain.index_of::<Tag>()?, 2);
        assert_eq!(domain.name(1), Some("Velocity"));
        assert!(domain.is_pooled(1));
        assert!(!domain.is_pooled(0));
        Ok(())
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = ComponentDomain::builder()
            .register::<Tag>()
            .register_default::<Position>()
            .register::<Tag>()
            .build();
        assert_eq!(
            result.err(),
            Some(DomainError::DuplicateComponentType { name: "Tag" })
        );
    }

    #[test]
    fn test_unknown_type_lookup() -> Result<(), DomainError> {
        let domain = ComponentDomain::builder().register::<Tag>().build()?;
        assert!(!domain.contains::<Position>());
        assert_eq!(
            domain.index_of::<Position>(),
            Err(DomainError::UnknownComponentType { name: "Position" })
        );
        Ok(())
    }

    #[test]
    fn test_subset_is_positional() -> Result<(), DomainError> {
        let small = ComponentDomain::builder().register_default::<Position>().build()?;
        let large = ComponentDomain::builder()
            .register_default::<Position>()
            .register_default::<Velocity>()
            .build()?;
        let shuffled = ComponentDomain::builder()
            .register_default::<Velocity>()
            .register_default::<Position>()
            .build()?;

        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
        assert!(!small.is_subset_of(&shuffled));
        assert!(ComponentDomain::empty().is_subset_of(&small));
        Ok(())
    }
}
