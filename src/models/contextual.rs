use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::json;

use super::{ModelRepository, RepositoryLinks};
use crate::class::{Class, ClassId, Instance};
use crate::error::{MvvmError, Result};
use crate::logging::{LogLevel, json_kv};
use crate::registry::ClassRegistry;
use crate::runtime::FrameworkConfig;
use crate::runtime::audit::LifecycleAuditStage;
use crate::runtime::context::{ContextObject, WorldContextAccessor};
use crate::runtime::diagnostics::Diagnostics;

const CONTEXTUAL_TARGET: &str = "room_mvvm::models.contextual";

/// Scene-lifetime data holder. One instance per type per world.
pub trait ContextualModel: Any + Send + Sync {
    /// Runs once after registration. Both repositories are reachable.
    fn on_init_model(&self, links: &RepositoryLinks) {
        let _ = links;
    }

    /// Runs once when the world unloads.
    fn on_destroy_model(&self) {}
}

pub type ContextualModelClass = Class<dyn ContextualModel>;

impl Class<dyn ContextualModel> {
    pub fn of<T: ContextualModel + Default>() -> Self {
        Self::with_factory::<T>(|| {
            let model = Arc::new(T::default());
            Instance {
                object: model.clone(),
                any: model,
            }
        })
    }
}

/// Registry of contextual models for one world.
///
/// The paired [`ModelRepository`] is looked up through the world the first
/// time a model is created and kept as a weak handle afterwards.
pub struct WorldModelRepository {
    self_ref: Weak<WorldModelRepository>,
    context: WorldContextAccessor,
    model_repository: Mutex<Weak<ModelRepository>>,
    models: ClassRegistry<dyn ContextualModel>,
    tearing_down: AtomicBool,
    diagnostics: Diagnostics,
}

impl WorldModelRepository {
    pub fn new(outer: Weak<dyn ContextObject>, config: &FrameworkConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            context: WorldContextAccessor::new(outer),
            model_repository: Mutex::new(Weak::new()),
            models: ClassRegistry::new(),
            tearing_down: AtomicBool::new(false),
            diagnostics: Diagnostics::new(config, CONTEXTUAL_TARGET),
        })
    }

    pub fn get_contextual_model<T: ContextualModel + Default>(&self) -> Result<Arc<T>> {
        let class = ContextualModelClass::of::<T>();
        let instance = self
            .resolve(&class)?
            .ok_or(MvvmError::AbstractClass(class.name()))?;
        instance
            .downcast::<T>()
            .ok_or(MvvmError::TypeMismatch(class.name()))
    }

    pub fn get_contextual_model_by_class(
        &self,
        class: &ContextualModelClass,
    ) -> Result<Option<Arc<dyn ContextualModel>>> {
        Ok(self.resolve(class)?.map(|instance| instance.object))
    }

    pub fn find_contextual_model<T: ContextualModel>(&self) -> Result<Option<Arc<T>>> {
        Ok(self
            .models
            .get(ClassId::of::<T>())?
            .and_then(|instance| instance.downcast::<T>()))
    }

    pub fn contains<T: ContextualModel>(&self) -> bool {
        self.models.contains(ClassId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The session repository reachable from this world, cached weakly.
    pub fn model_repository(&self) -> Option<Arc<ModelRepository>> {
        if let Some(cached) = self
            .model_repository
            .lock()
            .ok()
            .and_then(|cache| cache.upgrade())
        {
            return Some(cached);
        }
        let resolved = self.context.resolve()?.model_repository()?;
        if let Ok(mut cache) = self.model_repository.lock() {
            *cache = Arc::downgrade(&resolved);
        }
        Some(resolved)
    }

    /// Scene unload: destroys every contextual model and empties the
    /// registry. Returns how many models were destroyed.
    pub fn teardown(&self) -> Result<usize> {
        if self.tearing_down.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        let live = match self.models.instances() {
            Ok(live) => live,
            Err(err) => {
                self.tearing_down.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        // Hooks run while the registry is still populated so models can
        // reach their siblings; only new types are rejected meanwhile.
        for instance in &live {
            instance.object.on_destroy_model();
        }
        let destroyed = live.len();
        drop(live);
        let emptied = self.models.drain();
        self.tearing_down.store(false, Ordering::SeqCst);
        emptied?;

        self.diagnostics
            .record_metrics(|metrics| metrics.record_contextual_models_destroyed(destroyed));
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WorldModelsTornDown,
            "contextual_models_torn_down",
            [json_kv("destroyed", json!(destroyed))],
        );
        Ok(destroyed)
    }

    fn resolve(
        &self,
        class: &ContextualModelClass,
    ) -> Result<Option<Instance<dyn ContextualModel>>> {
        if !class.is_valid() {
            self.diagnostics.log(
                LogLevel::Debug,
                "contextual_model_class_abstract",
                [json_kv("class", json!(class.name()))],
            );
            return Ok(None);
        }
        if let Some(existing) = self.models.get(class.id())? {
            return Ok(Some(existing));
        }
        if self.tearing_down.load(Ordering::SeqCst) {
            self.diagnostics.log(
                LogLevel::Error,
                "contextual_model_created_during_teardown",
                [json_kv("class", json!(class.name()))],
            );
            return Err(MvvmError::RepositoryClosing {
                repository: "WorldModelRepository",
                class: class.name(),
            });
        }
        let Some(model_repository) = self.model_repository() else {
            self.diagnostics.log(
                LogLevel::Error,
                "session_repository_unreachable",
                [json_kv("class", json!(class.name()))],
            );
            return Err(MvvmError::SessionRepositoryUnavailable {
                model: class.name(),
            });
        };
        let Some(created) = class.instantiate() else {
            return Ok(None);
        };

        let (instance, inserted) = self.models.insert(class.id(), created)?;
        if inserted {
            let links = RepositoryLinks::from_weak(
                Arc::downgrade(&model_repository),
                self.self_ref.clone(),
            );
            instance.object.on_init_model(&links);
            self.diagnostics
                .record_metrics(|metrics| metrics.record_contextual_model_created());
            self.diagnostics.lifecycle(
                LifecycleAuditStage::ContextualModelCreated,
                "contextual_model_created",
                [json_kv("class", json!(class.name()))],
            );
        }
        Ok(Some(instance))
    }
}

impl fmt::Debug for WorldModelRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldModelRepository")
            .field("models", &self.models.classes())
            .field("context", &self.context)
            .finish()
    }
}
