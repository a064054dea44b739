//! Component trait and constructors
//!
//! Any `'static` type can be a component. Implement [`Component`] by hand or
//! with [`define_component!`](crate::define_component).

use crate::ecs::ComponentError;

/// Marker for types stored in a component mapper.
pub trait Component: 'static {
    /// Display name used in logs and errors.
    const NAME: &'static str;
}

/// Implement [`Component`] for a type.
///
/// ```ignore
/// struct Position { x: f32, y: f32 }
/// define_component!(Position);
/// define_component!(Velocity, "velocity");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty) => {
        $crate::define_component!($ty, stringify!($ty));
    };
    ($ty:ty, $name:expr) => {
        impl $crate::ecs::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
}

/// How a mapper produces fresh instances for `create`.
pub(crate) enum Constructor<T> {
    Unavailable,
    Default(fn() -> T),
    Fallible(fn() -> Result<T, String>),
}

impl<T> Clone for Constructor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Constructor<T> {}

impl<T: Component> Constructor<T> {
    pub fn construct(&self) -> Result<T, ComponentError> {
        match self {
            Self::Unavailable => Err(ComponentError::NoDefaultConstructor { component: T::NAME }),
            Self::Default(make) => Ok(make()),
            Self::Fallible(make) => make().map_err(|reason| ComponentError::ConstructionFailed {
                component: T::NAME,
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Health(u32);
    define_component!(Health);

    struct Named;
    define_component!(Named, "named");

    #[test]
    fn test_macro_names() {
        assert_eq!(Health::NAME, "Health");
        assert_eq!(Named::NAME, "named");
    }

    #[test]
    fn test_constructor_variants() {
        assert_eq!(Constructor::<Health>::Default(Health::default).construct(), Ok(Health(0)));
        assert_eq!(
            Constructor::<Health>::Unavailable.construct(),
            Err(ComponentError::NoDefaultConstructor { component: "Health" })
        );
        let failing = Constructor::<Health>::Fallible(|| Err("out of slots".to_owned()));
        assert!(matches!(
            failing.construct(),
            Err(ComponentError::ConstructionFailed { component: "Health", .. })
        ));
    }
}
