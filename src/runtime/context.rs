use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::World;

/// Anything that sits in the ownership chain between a framework object
/// and the scene it lives in.
pub trait ContextObject: Send + Sync {
    /// The next object outward, if it is still alive.
    fn outer(&self) -> Option<Arc<dyn ContextObject>>;

    /// The scene this object exposes directly. Only the [`World`] itself and
    /// objects pinned to one answer here; everything else defers to `outer`.
    fn world(&self) -> Option<Arc<World>> {
        None
    }
}

/// Resolves the ambient [`World`] by walking `outer` links.
///
/// The first hit is cached as a weak handle and validated on every read, so
/// a scene that has gone away is looked up again rather than handed out.
pub struct WorldContextAccessor {
    outer: Weak<dyn ContextObject>,
    cached: Mutex<Weak<World>>,
}

impl WorldContextAccessor {
    pub fn new(outer: Weak<dyn ContextObject>) -> Self {
        Self {
            outer,
            cached: Mutex::new(Weak::new()),
        }
    }

    /// An accessor with no chain at all; it never resolves.
    pub fn detached() -> Self {
        let outer: Weak<dyn ContextObject> = Weak::<World>::new();
        Self::new(outer)
    }

    pub fn outer(&self) -> Option<Arc<dyn ContextObject>> {
        self.outer.upgrade()
    }

    pub fn resolve(&self) -> Option<Arc<World>> {
        if let Some(world) = self.cached.lock().ok().and_then(|cache| cache.upgrade()) {
            return Some(world);
        }

        let mut node = self.outer.upgrade();
        while let Some(current) = node {
            if let Some(world) = current.world() {
                if let Ok(mut cache) = self.cached.lock() {
                    *cache = Arc::downgrade(&world);
                }
                return Some(world);
            }
            node = current.outer();
        }
        None
    }

    pub fn is_cached(&self) -> bool {
        self.cached
            .lock()
            .map(|cache| cache.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl fmt::Debug for WorldContextAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldContextAccessor")
            .field("cached", &self.is_cached())
            .finish()
    }
}
