//! Views, their view models and pop-ups.
//!
//! A [`View`] is the application-defined part of a display surface. The
//! framework wraps it in a [`UiView`], which owns the host widget, the
//! view model binding and the destroy notification.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::json;

use crate::class::{Class, ClassId, Instance};
use crate::error::{MvvmError, Result};
use crate::host::{ControllerHandle, UiLayer, Visibility, Widget, WidgetHandle};
use crate::logging::{LogLevel, json_kv};
use crate::models::{ModelRepository, RepositoryLinks, WorldModelRepository};
use crate::runtime::World;
use crate::runtime::audit::LifecycleAuditStage;
use crate::runtime::context::{ContextObject, WorldContextAccessor};
use crate::runtime::diagnostics::Diagnostics;
use crate::runtime::notify::DestroyNotifier;

mod pop_up;
mod view_model;

pub use pop_up::{DEFAULT_POP_UP_LIFESPAN, PopUp, PopUpClass, UiPopUp};
pub use view_model::{ViewModel, ViewModelBinding, ViewModelClass};

pub trait View: Any + Send + Sync {
    /// The view model created for this view on initialization. `None` is a
    /// wiring error.
    fn view_model_class(&self) -> Option<ViewModelClass>;

    fn layer(&self) -> UiLayer {
        UiLayer::GameplayView
    }

    /// Override for transition effects.
    fn show(&self, widget: &Widget) {
        widget.set_visibility(Visibility::Visible);
    }

    fn hide(&self, widget: &Widget) {
        widget.set_visibility(Visibility::Collapsed);
    }
}

pub type ViewClass = Class<dyn View>;

impl Class<dyn View> {
    pub fn of<T: View + Default>() -> Self {
        Self::with_factory::<T>(|| {
            let view = Arc::new(T::default());
            Instance {
                object: view.clone(),
                any: view,
            }
        })
    }
}

pub struct UiView {
    class: ClassId,
    view: Instance<dyn View>,
    widget: Widget,
    outer: Weak<dyn ContextObject>,
    context: WorldContextAccessor,
    initialized: AtomicBool,
    removed: AtomicBool,
    view_model: Mutex<Option<Arc<ViewModelBinding>>>,
    on_destroy: DestroyNotifier,
    diagnostics: Diagnostics,
}

impl UiView {
    pub(crate) fn new(
        class: ClassId,
        view: Instance<dyn View>,
        widget: Widget,
        outer: Weak<dyn ContextObject>,
        diagnostics: Diagnostics,
    ) -> Arc<Self> {
        Arc::new(Self {
            class,
            view,
            widget,
            context: WorldContextAccessor::new(outer.clone()),
            outer,
            initialized: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            view_model: Mutex::new(None),
            on_destroy: DestroyNotifier::new(),
            diagnostics,
        })
    }

    /// Creates the configured view model, injects both repositories and
    /// binds it to this view. A second call is a no-op.
    pub fn initialize(
        self: &Arc<Self>,
        model_repository: &Arc<ModelRepository>,
        world_model_repository: &Arc<WorldModelRepository>,
    ) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.bind_view_model(model_repository, world_model_repository);
        if let Err(err) = &result {
            self.initialized.store(false, Ordering::SeqCst);
            self.diagnostics.log(
                LogLevel::Error,
                "view_initialize_failed",
                [
                    json_kv("view", json!(self.class.name())),
                    json_kv("error", json!(err.to_string())),
                ],
            );
        }
        result
    }

    fn bind_view_model(
        self: &Arc<Self>,
        model_repository: &Arc<ModelRepository>,
        world_model_repository: &Arc<WorldModelRepository>,
    ) -> Result<()> {
        let class = self
            .view
            .object
            .view_model_class()
            .ok_or(MvvmError::MissingViewModelClass {
                view: self.class.name(),
            })?;
        let instance = class
            .instantiate()
            .ok_or(MvvmError::AbstractClass(class.name()))?;

        let links = RepositoryLinks::new(model_repository, Some(world_model_repository));
        let binding = ViewModelBinding::new(class.id(), instance, links);
        if let Ok(mut slot) = self.view_model.lock() {
            *slot = Some(Arc::clone(&binding));
        }
        binding.bind(self)?;

        self.diagnostics
            .record_metrics(|metrics| metrics.record_view_initialized());
        self.diagnostics.lifecycle(
            LifecycleAuditStage::ViewInitialized,
            "view_initialized",
            [
                json_kv("view", json!(self.class.name())),
                json_kv("view_model", json!(class.name())),
            ],
        );
        Ok(())
    }

    /// Detaches the widget and fires the destroy notification, then
    /// releases the view model. Returns `false` if already removed.
    pub fn remove_from_parent(&self) -> bool {
        if self.removed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.widget.detach();
        self.on_destroy.broadcast();
        let released = self.view_model.lock().ok().and_then(|mut slot| slot.take());
        drop(released);
        true
    }

    pub fn show(&self) {
        self.view.object.show(&self.widget);
    }

    pub fn hide(&self) {
        self.view.object.hide(&self.widget);
    }

    pub(crate) fn attach_to_display(&self) {
        self.widget.attach_to_display(self.layer());
    }

    pub fn class_id(&self) -> ClassId {
        self.class
    }

    pub fn widget(&self) -> &Widget {
        &self.widget
    }

    pub fn handle(&self) -> WidgetHandle {
        self.widget.handle()
    }

    pub fn layer(&self) -> UiLayer {
        self.view.object.layer()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn on_destroy(&self) -> &DestroyNotifier {
        &self.on_destroy
    }

    pub fn world(&self) -> Option<Arc<World>> {
        self.context.resolve()
    }

    /// The widget's owner, else the scene's default controller.
    pub fn owning_controller(&self) -> Option<ControllerHandle> {
        self.widget
            .owner()
            .or_else(|| self.world().and_then(|world| world.default_controller()))
    }

    pub fn view<T: View>(&self) -> Option<Arc<T>> {
        self.view.downcast::<T>()
    }

    pub fn view_model_binding(&self) -> Option<Arc<ViewModelBinding>> {
        self.view_model.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn view_model<T: ViewModel>(&self) -> Option<Arc<T>> {
        self.view_model_binding()
            .and_then(|binding| binding.model::<T>())
    }
}

impl ContextObject for UiView {
    fn outer(&self) -> Option<Arc<dyn ContextObject>> {
        self.outer.upgrade()
    }
}

impl fmt::Debug for UiView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiView")
            .field("class", &self.class)
            .field("widget", &self.widget)
            .field("initialized", &self.is_initialized())
            .field("removed", &self.is_removed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostServices;
    use crate::host::simulated::SimulatedHost;
    use crate::models::SessionModel;
    use crate::runtime::{Application, FrameworkConfig};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Score {
        points: AtomicUsize,
    }

    impl SessionModel for Score {}

    #[derive(Default)]
    struct ScoreViewModel {
        inits: AtomicUsize,
        destroys: AtomicUsize,
        saw_owner: AtomicBool,
        rebroadcast: AtomicBool,
    }

    impl ViewModel for ScoreViewModel {
        fn on_initialize(&self, binding: &ViewModelBinding) {
            self.inits.fetch_add(1, Ordering::SeqCst);
            self.saw_owner
                .store(binding.owner_view().is_some(), Ordering::SeqCst);
            let repository = binding.model_repository().expect("session repository");
            repository
                .get_session_model::<Score>()
                .expect("score")
                .points
                .fetch_add(10, Ordering::SeqCst);
        }

        fn on_destroy(&self, binding: &ViewModelBinding) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            if self.rebroadcast.load(Ordering::SeqCst) {
                if let Some(owner) = binding.owner_view() {
                    owner.on_destroy().broadcast();
                }
            }
        }
    }

    #[derive(Default)]
    struct ScoreView;

    impl View for ScoreView {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            Some(ViewModelClass::of::<ScoreViewModel>())
        }

        fn layer(&self) -> UiLayer {
            UiLayer::Hud
        }
    }

    #[derive(Default)]
    struct Unwired;

    impl View for Unwired {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            None
        }
    }

    struct Fixture {
        _app: Arc<Application>,
        world: Arc<World>,
        host: Arc<SimulatedHost>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(SimulatedHost::new());
        let app = Application::new(FrameworkConfig::default());
        let world = app.create_world("hud", HostServices::from_host(host.clone()));
        Fixture {
            _app: app,
            world,
            host,
        }
    }

    fn initialized<T: View + Default>(fixture: &Fixture) -> Arc<UiView> {
        let subsystem = fixture.world.window_subsystem();
        let view = subsystem
            .create_view::<T>(None)
            .expect("create")
            .expect("view");
        assert!(subsystem.initialize_exists_view(&view).expect("initialize"));
        view
    }

    #[test]
    fn initialize_binds_view_model_once() {
        let fixture = fixture();
        let view = initialized::<ScoreView>(&fixture);
        assert!(view.is_initialized());

        let subsystem = fixture.world.window_subsystem();
        assert!(!subsystem.initialize_exists_view(&view).expect("again"));

        let view_model = view.view_model::<ScoreViewModel>().expect("view model");
        assert_eq!(view_model.inits.load(Ordering::SeqCst), 1);
        assert!(view_model.saw_owner.load(Ordering::SeqCst));
        let score = fixture
            .world
            .model_repository()
            .expect("repository")
            .get_session_model::<Score>()
            .expect("score");
        assert_eq!(score.points.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn missing_view_model_class_is_an_error() {
        let fixture = fixture();
        let subsystem = fixture.world.window_subsystem();
        let view = subsystem
            .create_view::<Unwired>(None)
            .expect("create")
            .expect("view");
        let err = subsystem.initialize_exists_view(&view).err().expect("error");
        assert!(matches!(err, MvvmError::MissingViewModelClass { view: "Unwired" }));
        assert!(!view.is_initialized());
    }

    #[test]
    fn removal_destroys_view_model_after_unsubscribing() {
        let fixture = fixture();
        let view = initialized::<ScoreView>(&fixture);
        let binding = view.view_model_binding().expect("binding");
        let view_model = binding.model::<ScoreViewModel>().expect("model");
        view_model.rebroadcast.store(true, Ordering::SeqCst);
        assert!(binding.is_subscribed());

        assert!(view.remove_from_parent());
        assert!(!view.remove_from_parent());
        assert_eq!(view_model.destroys.load(Ordering::SeqCst), 1);
        assert!(!binding.is_subscribed());
        assert!(binding.is_destroyed());
        assert!(view.view_model_binding().is_none());
        assert_eq!(view.on_destroy().subscriber_count(), 0);
    }

    #[test]
    fn binding_twice_is_rejected() {
        let fixture = fixture();
        let view = initialized::<ScoreView>(&fixture);
        let binding = view.view_model_binding().expect("binding");
        let err = binding.bind(&view).err().expect("error");
        assert!(matches!(err, MvvmError::ViewModelAlreadyBound { .. }));
    }

    #[test]
    fn binding_does_not_keep_view_alive() {
        let fixture = fixture();
        let view = initialized::<ScoreView>(&fixture);
        let binding = view.view_model_binding().expect("binding");
        view.remove_from_parent();
        drop(view);
        assert!(binding.owner_view().is_none());
    }

    #[test]
    fn show_and_hide_drive_widget_visibility() {
        let fixture = fixture();
        let view = initialized::<ScoreView>(&fixture);
        view.hide();
        assert_eq!(fixture.host.visibility(view.handle()), Some(Visibility::Collapsed));
        view.show();
        assert_eq!(fixture.host.visibility(view.handle()), Some(Visibility::Visible));
        assert_eq!(view.layer(), UiLayer::Hud);
    }

    #[test]
    fn binding_reaches_scene_services() {
        let fixture = fixture();
        fixture
            .host
            .set_default_controller(Some(ControllerHandle(42)));
        let view = initialized::<ScoreView>(&fixture);
        let binding = view.view_model_binding().expect("binding");

        let world = binding.world().expect("world");
        assert!(Arc::ptr_eq(&world, &fixture.world));
        let subsystem = binding.window_subsystem().expect("subsystem");
        assert!(Arc::ptr_eq(&subsystem, fixture.world.window_subsystem()));
        assert_eq!(binding.owning_controller(), Some(ControllerHandle(42)));
        assert!(binding.world_model_repository().is_some());
        assert!(view.view::<ScoreView>().is_some());
    }
}
