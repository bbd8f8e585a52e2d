use std::any::TypeId;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::class::{ClassId, Instance};
use crate::error::{MvvmError, Result};

struct RegistryEntry<B: ?Sized + 'static> {
    class: ClassId,
    instance: Instance<B>,
}

/// Type-keyed map holding at most one instance per class.
///
/// Lookups clone the stored handles out of the lock so callers are free to
/// run lifecycle hooks (which may re-enter the registry) without holding it.
pub struct ClassRegistry<B: ?Sized + 'static> {
    entries: RwLock<HashMap<TypeId, RegistryEntry<B>>>,
}

impl<B: ?Sized + 'static> Default for ClassRegistry<B> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<B: ?Sized + 'static> ClassRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: ClassId) -> Result<Option<Instance<B>>> {
        let guard = self.entries.read().map_err(|_| MvvmError::Poisoned)?;
        Ok(guard
            .get(&class.type_id())
            .map(|entry| entry.instance.clone()))
    }

    /// Registers `instance` unless the class is already present, in which
    /// case the existing instance is returned and `instance` is discarded.
    /// The boolean reports whether the insert happened.
    pub fn insert(&self, class: ClassId, instance: Instance<B>) -> Result<(Instance<B>, bool)> {
        use std::collections::hash_map::Entry;

        let mut guard = self.entries.write().map_err(|_| MvvmError::Poisoned)?;
        match guard.entry(class.type_id()) {
            Entry::Occupied(existing) => Ok((existing.get().instance.clone(), false)),
            Entry::Vacant(vacant) => {
                vacant.insert(RegistryEntry {
                    class,
                    instance: instance.clone(),
                });
                Ok((instance, true))
            }
        }
    }

    pub fn remove(&self, class: ClassId) -> Result<Option<Instance<B>>> {
        let mut guard = self.entries.write().map_err(|_| MvvmError::Poisoned)?;
        Ok(guard.remove(&class.type_id()).map(|entry| entry.instance))
    }

    /// Empties the registry, handing every entry back to the caller.
    pub fn drain(&self) -> Result<Vec<(ClassId, Instance<B>)>> {
        let mut guard = self.entries.write().map_err(|_| MvvmError::Poisoned)?;
        Ok(guard
            .drain()
            .map(|(_, entry)| (entry.class, entry.instance))
            .collect())
    }

    /// Snapshot of every stored instance.
    pub fn instances(&self) -> Result<Vec<Instance<B>>> {
        let guard = self.entries.read().map_err(|_| MvvmError::Poisoned)?;
        Ok(guard.values().map(|entry| entry.instance.clone()).collect())
    }

    pub fn contains(&self, class: ClassId) -> bool {
        self.entries
            .read()
            .map(|guard| guard.contains_key(&class.type_id()))
            .unwrap_or(false)
    }

    pub fn classes(&self) -> Vec<ClassId> {
        self.entries
            .read()
            .map(|guard| guard.values().map(|entry| entry.class).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
