use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use super::UiView;
use crate::class::{Class, ClassId, Instance};
use crate::error::{MvvmError, Result};
use crate::host::ControllerHandle;
use crate::models::{ModelRepository, RepositoryLinks, WorldModelRepository};
use crate::runtime::World;
use crate::runtime::context::{ContextObject, WorldContextAccessor};
use crate::runtime::notify::SubscriptionId;
use crate::windows::WindowSubsystem;

/// Mediator between a view and the model repositories.
///
/// Hooks receive the [`ViewModelBinding`] that owns the model, which is
/// where repositories, the owner view and the scene are reached from.
pub trait ViewModel: Any + Send + Sync {
    /// Runs once, right after the binding subscribed to its owner.
    fn on_initialize(&self, binding: &ViewModelBinding) {
        let _ = binding;
    }

    /// Runs once, when the owner view is torn down.
    fn on_destroy(&self, binding: &ViewModelBinding) {
        let _ = binding;
    }
}

pub type ViewModelClass = Class<dyn ViewModel>;

impl Class<dyn ViewModel> {
    pub fn of<T: ViewModel + Default>() -> Self {
        Self::with_factory::<T>(|| {
            let view_model = Arc::new(T::default());
            Instance {
                object: view_model.clone(),
                any: view_model,
            }
        })
    }
}

/// A view model instance bound to at most one owner view.
///
/// The owner is held weakly. The binding subscribes to the owner's destroy
/// notification and unsubscribes before running `on_destroy`.
pub struct ViewModelBinding {
    class: ClassId,
    model: Instance<dyn ViewModel>,
    links: RepositoryLinks,
    owner: OnceLock<Weak<UiView>>,
    context: OnceLock<WorldContextAccessor>,
    subscription: Mutex<Option<SubscriptionId>>,
    destroyed: AtomicBool,
}

impl ViewModelBinding {
    pub(crate) fn new(class: ClassId, model: Instance<dyn ViewModel>, links: RepositoryLinks) -> Arc<Self> {
        Arc::new(Self {
            class,
            model,
            links,
            owner: OnceLock::new(),
            context: OnceLock::new(),
            subscription: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        })
    }

    pub(crate) fn bind(self: &Arc<Self>, owner: &Arc<UiView>) -> Result<()> {
        if self.owner.set(Arc::downgrade(owner)).is_err() {
            return Err(MvvmError::ViewModelAlreadyBound {
                view_model: self.class.name(),
            });
        }
        let owner_weak: Weak<UiView> = Arc::downgrade(owner);
        let outer: Weak<dyn ContextObject> = owner_weak;
        let _ = self.context.set(WorldContextAccessor::new(outer));

        let binding = Arc::downgrade(self);
        let id = owner.on_destroy().subscribe(move || {
            if let Some(binding) = binding.upgrade() {
                binding.destroy();
            }
        });
        if let Ok(mut slot) = self.subscription.lock() {
            *slot = Some(id);
        }

        self.model.object.on_initialize(self);
        Ok(())
    }

    /// Unsubscribes from the owner (if still subscribed) and runs the
    /// model's `on_destroy` hook. Later calls do nothing.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscription = self.subscription.lock().ok().and_then(|mut slot| slot.take());
        if let (Some(id), Some(owner)) = (subscription, self.owner_view()) {
            owner.on_destroy().unsubscribe(id);
        }
        self.model.object.on_destroy(self);
    }

    pub fn class_id(&self) -> ClassId {
        self.class
    }

    pub fn view_model(&self) -> &Arc<dyn ViewModel> {
        &self.model.object
    }

    pub fn model<T: ViewModel>(&self) -> Option<Arc<T>> {
        self.model.downcast::<T>()
    }

    pub fn is_bound(&self) -> bool {
        self.owner.get().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn links(&self) -> &RepositoryLinks {
        &self.links
    }

    pub fn model_repository(&self) -> Option<Arc<ModelRepository>> {
        self.links.model_repository()
    }

    pub fn world_model_repository(&self) -> Option<Arc<WorldModelRepository>> {
        self.links.world_model_repository()
    }

    pub fn owner_view(&self) -> Option<Arc<UiView>> {
        self.owner.get().and_then(Weak::upgrade)
    }

    /// The scene the owner view lives in.
    pub fn world(&self) -> Option<Arc<World>> {
        self.context.get().and_then(WorldContextAccessor::resolve)
    }

    pub fn window_subsystem(&self) -> Option<Arc<WindowSubsystem>> {
        self.world()
            .map(|world| Arc::clone(world.window_subsystem()))
    }

    /// The owner view's controller, else the scene's default controller.
    pub fn owning_controller(&self) -> Option<ControllerHandle> {
        self.owner_view()
            .and_then(|owner| owner.owning_controller())
            .or_else(|| self.world().and_then(|world| world.default_controller()))
    }
}

impl fmt::Debug for ViewModelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModelBinding")
            .field("class", &self.class)
            .field("bound", &self.is_bound())
            .field("subscribed", &self.is_subscribed())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
