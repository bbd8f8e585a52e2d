use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::json;

use super::RepositoryLinks;
use crate::class::{Class, ClassId, Instance};
use crate::error::{MvvmError, Result};
use crate::logging::{LogLevel, json_kv};
use crate::registry::ClassRegistry;
use crate::runtime::FrameworkConfig;
use crate::runtime::audit::LifecycleAuditStage;
use crate::runtime::diagnostics::Diagnostics;

const SESSION_TARGET: &str = "room_mvvm::models.session";

/// Application-lifetime data holder. One instance per type per session.
pub trait SessionModel: Any + Send + Sync {
    /// Runs once, right after the model is registered.
    fn start_session(&self, links: &RepositoryLinks) {
        let _ = links;
    }

    /// Runs once when the session closes, before the model is dropped.
    fn end_session(&self) {}
}

pub type SessionModelClass = Class<dyn SessionModel>;

impl Class<dyn SessionModel> {
    pub fn of<T: SessionModel + Default>() -> Self {
        Self::with_factory::<T>(|| {
            let model = Arc::new(T::default());
            Instance {
                object: model.clone(),
                any: model,
            }
        })
    }
}

/// Registry of session models, created lazily on first request.
pub struct ModelRepository {
    self_ref: Weak<ModelRepository>,
    models: ClassRegistry<dyn SessionModel>,
    closing: AtomicBool,
    diagnostics: Diagnostics,
}

impl ModelRepository {
    pub fn new(config: &FrameworkConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            models: ClassRegistry::new(),
            closing: AtomicBool::new(false),
            diagnostics: Diagnostics::new(config, SESSION_TARGET),
        })
    }

    /// Returns the model of type `T`, creating and starting it on first use.
    pub fn get_session_model<T: SessionModel + Default>(&self) -> Result<Arc<T>> {
        let class = SessionModelClass::of::<T>();
        let instance = self
            .resolve(&class)?
            .ok_or(MvvmError::AbstractClass(class.name()))?;
        instance
            .downcast::<T>()
            .ok_or(MvvmError::TypeMismatch(class.name()))
    }

    /// Class-descriptor form. An abstract descriptor yields `Ok(None)`.
    pub fn get_session_model_by_class(
        &self,
        class: &SessionModelClass,
    ) -> Result<Option<Arc<dyn SessionModel>>> {
        Ok(self.resolve(class)?.map(|instance| instance.object))
    }

    /// Lookup without creation.
    pub fn find_session_model<T: SessionModel>(&self) -> Result<Option<Arc<T>>> {
        Ok(self
            .models
            .get(ClassId::of::<T>())?
            .and_then(|instance| instance.downcast::<T>()))
    }

    pub fn contains<T: SessionModel>(&self) -> bool {
        self.models.contains(ClassId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Ends every registered model and empties the repository. Returns how
    /// many models were ended; a second call ends none.
    pub fn close_session(&self) -> Result<usize> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        let live = match self.models.instances() {
            Ok(live) => live,
            Err(err) => {
                self.closing.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        // Hooks run while the registry is still populated so models can
        // reach their siblings; only new types are rejected meanwhile.
        for instance in &live {
            instance.object.end_session();
        }
        let ended = live.len();
        drop(live);
        let emptied = self.models.drain();
        self.closing.store(false, Ordering::SeqCst);
        emptied?;

        self.diagnostics
            .record_metrics(|metrics| metrics.record_session_models_ended(ended));
        self.diagnostics.lifecycle(
            LifecycleAuditStage::SessionClosed,
            "session_closed",
            [json_kv("ended", json!(ended))],
        );
        Ok(ended)
    }

    fn links(&self) -> RepositoryLinks {
        RepositoryLinks::from_weak(self.self_ref.clone(), Weak::new())
    }

    fn resolve(&self, class: &SessionModelClass) -> Result<Option<Instance<dyn SessionModel>>> {
        if !class.is_valid() {
            self.diagnostics.log(
                LogLevel::Debug,
                "session_model_class_abstract",
                [json_kv("class", json!(class.name()))],
            );
            return Ok(None);
        }
        if let Some(existing) = self.models.get(class.id())? {
            return Ok(Some(existing));
        }
        if self.closing.load(Ordering::SeqCst) {
            self.diagnostics.log(
                LogLevel::Error,
                "session_model_created_while_closing",
                [json_kv("class", json!(class.name()))],
            );
            return Err(MvvmError::RepositoryClosing {
                repository: "ModelRepository",
                class: class.name(),
            });
        }
        let Some(created) = class.instantiate() else {
            return Ok(None);
        };

        // Registered before `start_session`, so a model that asks for itself
        // while starting gets this same instance back.
        let (instance, inserted) = self.models.insert(class.id(), created)?;
        if inserted {
            instance.object.start_session(&self.links());
            self.diagnostics
                .record_metrics(|metrics| metrics.record_session_model_created());
            self.diagnostics.lifecycle(
                LifecycleAuditStage::SessionModelCreated,
                "session_model_created",
                [json_kv("class", json!(class.name()))],
            );
        }
        Ok(Some(instance))
    }
}

impl fmt::Debug for ModelRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRepository")
            .field("models", &self.models.classes())
            .field("closing", &self.closing.load(Ordering::SeqCst))
            .finish()
    }
}
