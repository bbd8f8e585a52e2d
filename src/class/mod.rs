//! Type descriptors used as registry keys.
//!
//! A [`Class`] names a concrete model, view, view model or pop-up kind and
//! knows how to construct it. Registries key on [`ClassId`], which is cheap
//! to copy, hash and compare. Descriptors built with [`Class::abstract_of`]
//! carry no constructor; lookups through them always come back empty.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

/// Stable identity of a concrete type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId {
    type_id: TypeId,
    name: &'static str,
}

impl ClassId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(type_name::<T>()),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Unqualified type name, used for widget names and log fields.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.name)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    // Keep generic arguments intact; only strip the leading module path.
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// A freshly constructed object in both of the forms registries need: the
/// trait object used to drive lifecycle hooks and a type-erased handle used
/// for typed downcasts.
pub struct Instance<B: ?Sized + 'static> {
    pub object: Arc<B>,
    pub any: Arc<dyn Any + Send + Sync>,
}

impl<B: ?Sized + 'static> Clone for Instance<B> {
    fn clone(&self) -> Self {
        Self {
            object: Arc::clone(&self.object),
            any: Arc::clone(&self.any),
        }
    }
}

impl<B: ?Sized + 'static> Instance<B> {
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        Arc::clone(&self.any).downcast::<T>().ok()
    }
}

pub type Factory<B> = fn() -> Instance<B>;

/// Descriptor for a concrete kind of `B` (a trait object type such as
/// `dyn SessionModel`).
pub struct Class<B: ?Sized + 'static> {
    id: ClassId,
    factory: Option<Factory<B>>,
}

impl<B: ?Sized + 'static> Class<B> {
    /// Descriptor backed by an explicit constructor. The `of::<T>()`
    /// helpers on each class alias are the usual way in.
    pub fn with_factory<T: 'static>(factory: Factory<B>) -> Self {
        Self {
            id: ClassId::of::<T>(),
            factory: Some(factory),
        }
    }

    /// Descriptor without a constructor, the equivalent of an unset or
    /// abstract type reference.
    pub fn abstract_of<T: 'static>() -> Self {
        Self {
            id: ClassId::of::<T>(),
            factory: None,
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.id.type_id
    }

    pub fn name(&self) -> &'static str {
        self.id.name
    }

    pub fn is_valid(&self) -> bool {
        self.factory.is_some()
    }

    pub fn instantiate(&self) -> Option<Instance<B>> {
        self.factory.map(|factory| factory())
    }
}

impl<B: ?Sized + 'static> Clone for Class<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized + 'static> Copy for Class<B> {}

impl<B: ?Sized + 'static> PartialEq for Class<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<B: ?Sized + 'static> Eq for Class<B> {}

impl<B: ?Sized + 'static> fmt::Debug for Class<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.id.name)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    #[derive(Default)]
    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    fn square_class() -> Class<dyn Shape> {
        Class::<dyn Shape>::with_factory::<Square>(|| {
            let square = Arc::new(Square);
            Instance {
                object: square.clone(),
                any: square,
            }
        })
    }

    #[test]
    fn instantiate_builds_both_handles() {
        let class = square_class();
        assert!(class.is_valid());
        assert_eq!(class.name(), "Square");
        let instance = class.instantiate().expect("instance");
        assert_eq!(instance.object.sides(), 4);
        assert!(instance.downcast::<Square>().is_some());
        assert!(instance.downcast::<String>().is_none());
    }

    #[test]
    fn abstract_class_has_no_instances() {
        let class = Class::<dyn Shape>::abstract_of::<Square>();
        assert!(!class.is_valid());
        assert!(class.instantiate().is_none());
        assert_eq!(class, square_class());
    }

    #[test]
    fn short_names_strip_module_path() {
        assert_eq!(short_type_name("a::b::Login"), "Login");
        assert_eq!(short_type_name("Login"), "Login");
        assert_eq!(
            short_type_name("a::Wrapper<b::Inner>"),
            "Wrapper<b::Inner>"
        );
    }
}
