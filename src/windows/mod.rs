//! Scene-scoped window management.
//!
//! Windows are views registered by type: at most one per type is open at a
//! time. Pop-ups and free views are created here too but never registered.
//! Every entry point is a no-op in headless contexts and when no world can
//! be resolved.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::json;

use crate::class::{ClassId, Instance};
use crate::error::{MvvmError, Result};
use crate::host::{ControllerHandle, Widget, WidgetHandle};
use crate::logging::{LogLevel, json_kv};
use crate::models::{ModelRepository, WorldModelRepository};
use crate::registry::ClassRegistry;
use crate::runtime::audit::LifecycleAuditStage;
use crate::runtime::context::{ContextObject, WorldContextAccessor};
use crate::runtime::diagnostics::Diagnostics;
use crate::runtime::{FrameworkConfig, World};
use crate::view::{PopUp, PopUpClass, UiPopUp, UiView, View, ViewClass};

const WINDOWS_TARGET: &str = "room_mvvm::windows";

pub struct WindowSubsystem {
    self_ref: Weak<WindowSubsystem>,
    outer: Weak<dyn ContextObject>,
    context: WorldContextAccessor,
    windows: ClassRegistry<UiView>,
    hidden: AtomicBool,
    diagnostics: Diagnostics,
}

impl WindowSubsystem {
    pub fn new(outer: Weak<dyn ContextObject>, config: &FrameworkConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            context: WorldContextAccessor::new(outer.clone()),
            outer,
            windows: ClassRegistry::new(),
            hidden: AtomicBool::new(false),
            diagnostics: Diagnostics::new(config, WINDOWS_TARGET),
        })
    }

    pub fn open_window<T: View + Default>(
        &self,
        owner: Option<ControllerHandle>,
    ) -> Result<Option<Arc<UiView>>> {
        self.open_window_by_class(&ViewClass::of::<T>(), owner)
    }

    /// Returns the open window of `class`, creating, attaching and
    /// initializing it if needed. New windows start hidden while
    /// [`hide_all_windows`](Self::hide_all_windows) is in effect.
    pub fn open_window_by_class(
        &self,
        class: &ViewClass,
        owner: Option<ControllerHandle>,
    ) -> Result<Option<Arc<UiView>>> {
        if !class.is_valid() {
            self.diagnostics.log(
                LogLevel::Debug,
                "window_class_abstract",
                [json_kv("class", json!(class.name()))],
            );
            return Ok(None);
        }
        let Some(world) = self.active_world() else {
            return Ok(None);
        };
        if let Some(existing) = self.windows.get(class.id())? {
            return Ok(Some(existing.object));
        }
        let Some(view) = class.instantiate() else {
            return Ok(None);
        };
        let (model_repository, world_model_repository) =
            self.repositories(&world, class.name())?;

        let widget = Widget::create(&world.hosts().display, class.name(), owner);
        let window = UiView::new(
            class.id(),
            view,
            widget,
            self.outer_ref(),
            self.diagnostics.clone(),
        );
        let any: Arc<dyn Any + Send + Sync> = window.clone();
        let entry = Instance {
            object: Arc::clone(&window),
            any,
        };
        let (stored, inserted) = self.windows.insert(class.id(), entry)?;
        if !inserted {
            window.widget().release();
            return Ok(Some(stored.object));
        }

        let hidden = self.hidden.load(Ordering::SeqCst);
        if hidden {
            window.hide();
        }
        window.attach_to_display();

        if let Err(err) = window.initialize(&model_repository, &world_model_repository) {
            let _ = self.windows.remove(class.id());
            window.remove_from_parent();
            self.diagnostics.log(
                LogLevel::Error,
                "window_open_failed",
                [
                    json_kv("class", json!(class.name())),
                    json_kv("error", json!(err.to_string())),
                ],
            );
            return Err(err);
        }

        self.diagnostics
            .record_metrics(|metrics| metrics.record_window_opened());
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WindowOpened,
            "window_opened",
            [
                json_kv("class", json!(class.name())),
                json_kv("layer", json!(window.layer())),
                json_kv("hidden", json!(hidden)),
            ],
        );
        Ok(Some(window))
    }

    pub fn close_window<T: View>(&self) -> bool {
        self.close_window_by_id(ClassId::of::<T>())
    }

    pub fn close_window_by_class(&self, class: &ViewClass) -> bool {
        if !class.is_valid() {
            return false;
        }
        self.close_window_by_id(class.id())
    }

    fn close_window_by_id(&self, class: ClassId) -> bool {
        let Ok(Some(window)) = self.windows.remove(class) else {
            return false;
        };
        window.object.remove_from_parent();
        self.diagnostics
            .record_metrics(|metrics| metrics.record_windows_closed(1));
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WindowClosed,
            "window_closed",
            [json_kv("class", json!(class.name()))],
        );
        true
    }

    /// Removes every open window. Returns how many were closed.
    pub fn close_all_windows(&self) -> usize {
        let drained = match self.windows.drain() {
            Ok(drained) => drained,
            Err(_) => return 0,
        };
        for (class, window) in &drained {
            window.object.remove_from_parent();
            self.diagnostics.lifecycle(
                LifecycleAuditStage::WindowClosed,
                "window_closed",
                [json_kv("class", json!(class.name()))],
            );
        }
        let closed = drained.len();
        self.diagnostics
            .record_metrics(|metrics| metrics.record_windows_closed(closed));
        closed
    }

    pub fn is_open<T: View>(&self) -> bool {
        self.windows.contains(ClassId::of::<T>())
    }

    pub fn is_open_by_class(&self, class: &ViewClass) -> bool {
        class.is_valid() && self.windows.contains(class.id())
    }

    pub fn find_window<T: View>(&self) -> Option<Arc<UiView>> {
        self.windows
            .get(ClassId::of::<T>())
            .ok()
            .flatten()
            .map(|entry| entry.object)
    }

    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    pub fn hide_all_windows(&self) {
        if self.hidden.swap(true, Ordering::SeqCst) {
            return;
        }
        let windows = self.windows.instances().unwrap_or_default();
        for window in &windows {
            window.object.hide();
        }
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WindowsHidden,
            "windows_hidden",
            [json_kv("count", json!(windows.len()))],
        );
    }

    pub fn show_all_windows(&self) {
        if !self.hidden.swap(false, Ordering::SeqCst) {
            return;
        }
        let windows = self.windows.instances().unwrap_or_default();
        for window in &windows {
            window.object.show();
        }
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WindowsShown,
            "windows_shown",
            [json_kv("count", json!(windows.len()))],
        );
    }

    pub fn create_pop_up<T: PopUp + Default>(
        &self,
        owner: Option<ControllerHandle>,
        parent: Option<WidgetHandle>,
    ) -> Result<Option<Arc<UiPopUp>>> {
        self.create_pop_up_by_class(&PopUpClass::of::<T>(), owner, parent)
    }

    /// Always builds a new pop-up. It is attached under `parent` when given,
    /// else on the display at its own layer, and is not tracked here.
    pub fn create_pop_up_by_class(
        &self,
        class: &PopUpClass,
        owner: Option<ControllerHandle>,
        parent: Option<WidgetHandle>,
    ) -> Result<Option<Arc<UiPopUp>>> {
        let Some(world) = self.active_world() else {
            return Ok(None);
        };
        let Some(instance) = class.instantiate() else {
            return Ok(None);
        };
        let (model_repository, world_model_repository) =
            self.repositories(&world, class.name())?;

        let hosts = world.hosts();
        let widget = Widget::create(&hosts.display, class.name(), owner);
        let pop_up = UiPopUp::new(
            class.id(),
            instance,
            widget,
            self.outer_ref(),
            Arc::clone(&hosts.timers),
            self.diagnostics.clone(),
        );
        match parent {
            Some(container) => pop_up.widget().attach_to_container(container),
            None => pop_up.widget().attach_to_display(pop_up.layer()),
        }
        pop_up.initialize(&model_repository, &world_model_repository);

        self.diagnostics
            .record_metrics(|metrics| metrics.record_pop_up_created());
        self.diagnostics.lifecycle(
            LifecycleAuditStage::PopUpCreated,
            "pop_up_created",
            [
                json_kv("class", json!(class.name())),
                json_kv("parent", json!(parent.map(|handle| handle.0))),
            ],
        );
        Ok(Some(pop_up))
    }

    pub fn create_view<T: View + Default>(
        &self,
        owner: Option<ControllerHandle>,
    ) -> Result<Option<Arc<UiView>>> {
        self.create_view_by_class(&ViewClass::of::<T>(), owner)
    }

    /// Builds an unregistered, unattached view for the caller to place in
    /// its own layout. Pair with
    /// [`initialize_exists_view`](Self::initialize_exists_view).
    pub fn create_view_by_class(
        &self,
        class: &ViewClass,
        owner: Option<ControllerHandle>,
    ) -> Result<Option<Arc<UiView>>> {
        let Some(world) = self.active_world() else {
            return Ok(None);
        };
        let Some(instance) = class.instantiate() else {
            return Ok(None);
        };
        let widget = Widget::create(&world.hosts().display, class.name(), owner);
        Ok(Some(UiView::new(
            class.id(),
            instance,
            widget,
            self.outer_ref(),
            self.diagnostics.clone(),
        )))
    }

    /// Initializes a view created outside the window registry. Returns
    /// whether initialization ran.
    pub fn initialize_exists_view(&self, view: &Arc<UiView>) -> Result<bool> {
        if view.is_initialized() {
            return Ok(false);
        }
        let Some(world) = self.active_world() else {
            return Ok(false);
        };
        let (model_repository, world_model_repository) =
            self.repositories(&world, view.class_id().name())?;
        view.initialize(&model_repository, &world_model_repository)?;
        Ok(true)
    }

    pub fn world(&self) -> Option<Arc<World>> {
        self.context.resolve()
    }

    fn active_world(&self) -> Option<Arc<World>> {
        let world = self.world()?;
        if world.is_headless() {
            self.diagnostics.log(
                LogLevel::Trace,
                "headless_skip",
                [json_kv("world", json!(world.name()))],
            );
            return None;
        }
        Some(world)
    }

    fn repositories(
        &self,
        world: &World,
        requester: &'static str,
    ) -> Result<(Arc<ModelRepository>, Arc<WorldModelRepository>)> {
        let Some(model_repository) = world.model_repository() else {
            self.diagnostics.log(
                LogLevel::Error,
                "session_repository_unreachable",
                [json_kv("class", json!(requester))],
            );
            return Err(MvvmError::SessionRepositoryUnavailable { model: requester });
        };
        Ok((model_repository, Arc::clone(world.world_model_repository())))
    }

    fn outer_ref(&self) -> Weak<dyn ContextObject> {
        self.self_ref.clone()
    }
}

impl ContextObject for WindowSubsystem {
    fn outer(&self) -> Option<Arc<dyn ContextObject>> {
        self.outer.upgrade()
    }
}

impl fmt::Debug for WindowSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowSubsystem")
            .field("windows", &self.windows.classes())
            .field("hidden", &self.is_hidden())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::{Attachment, SimulatedHost};
    use crate::host::{HostServices, UiLayer, Visibility};
    use crate::logging::{Logger, MemorySink};
    use crate::runtime::Application;
    use crate::runtime::audit::BufferedLifecycleAudit;
    use crate::view::{ViewModel, ViewModelBinding, ViewModelClass};
    use std::sync::atomic::AtomicUsize;

    static LOGIN_INITS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct LoginViewModel;

    impl ViewModel for LoginViewModel {
        fn on_initialize(&self, _binding: &ViewModelBinding) {
            LOGIN_INITS.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct LoginWindow;

    impl View for LoginWindow {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            Some(ViewModelClass::of::<LoginViewModel>())
        }
    }

    #[derive(Default)]
    struct PlainViewModel {
        destroys: AtomicUsize,
    }

    impl ViewModel for PlainViewModel {
        fn on_destroy(&self, _binding: &ViewModelBinding) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Inventory;

    impl View for Inventory {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            Some(ViewModelClass::of::<PlainViewModel>())
        }

        fn layer(&self) -> UiLayer {
            UiLayer::Hud
        }
    }

    #[derive(Default)]
    struct Map;

    impl View for Map {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            Some(ViewModelClass::of::<PlainViewModel>())
        }
    }

    #[derive(Default)]
    struct Broken;

    impl View for Broken {
        fn view_model_class(&self) -> Option<ViewModelClass> {
            None
        }
    }

    #[derive(Default)]
    struct Toast;

    impl PopUp for Toast {}

    struct Fixture {
        app: Arc<Application>,
        world: Arc<World>,
        host: Arc<SimulatedHost>,
    }

    fn fixture_with(config: FrameworkConfig, host: SimulatedHost) -> Fixture {
        let host = Arc::new(host);
        let app = Application::new(config);
        let world = app.create_world("scene", HostServices::from_host(host.clone()));
        Fixture { app, world, host }
    }

    fn fixture() -> Fixture {
        fixture_with(FrameworkConfig::default(), SimulatedHost::new())
    }

    #[test]
    fn login_window_scenario() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();

        let before = LOGIN_INITS.load(Ordering::SeqCst);
        let first = windows
            .open_window::<LoginWindow>(None)
            .expect("open")
            .expect("window");
        assert!(first.is_initialized());
        assert!(windows.is_open::<LoginWindow>());
        assert!(fixture.host.is_on_display(first.handle()));

        let second = windows
            .open_window::<LoginWindow>(None)
            .expect("reopen")
            .expect("window");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(LOGIN_INITS.load(Ordering::SeqCst) - before, 1);

        assert_eq!(windows.close_all_windows(), 1);
        assert!(!windows.is_open::<LoginWindow>());
        assert!(!fixture.host.is_on_display(first.handle()));
        assert!(first.is_removed());
    }

    #[test]
    fn close_window_reports_presence() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        assert!(!windows.close_window::<Inventory>());
        assert_eq!(windows.open_window_count(), 0);

        let inventory = windows
            .open_window::<Inventory>(None)
            .expect("open")
            .expect("window");
        assert_eq!(
            fixture.host.attachment(inventory.handle()),
            Some(Attachment::Display(UiLayer::Hud))
        );
        let view_model = inventory.view_model::<PlainViewModel>().expect("view model");

        assert!(windows.close_window::<Inventory>());
        assert!(!windows.is_open::<Inventory>());
        assert!(!fixture.host.is_on_display(inventory.handle()));
        assert_eq!(view_model.destroys.load(Ordering::SeqCst), 1);
        assert!(!windows.close_window::<Inventory>());
    }

    #[test]
    fn hidden_state_is_inherited_and_restored() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let inventory = windows
            .open_window::<Inventory>(None)
            .expect("open")
            .expect("window");

        windows.hide_all_windows();
        windows.hide_all_windows();
        assert!(windows.is_hidden());
        assert_eq!(
            fixture.host.visibility(inventory.handle()),
            Some(Visibility::Collapsed)
        );

        let map = windows.open_window::<Map>(None).expect("open").expect("window");
        assert_eq!(fixture.host.visibility(map.handle()), Some(Visibility::Collapsed));

        windows.show_all_windows();
        assert_eq!(fixture.host.visibility(map.handle()), Some(Visibility::Visible));
        assert_eq!(
            fixture.host.visibility(inventory.handle()),
            Some(Visibility::Visible)
        );
    }

    #[test]
    fn pop_ups_are_never_deduplicated() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let first = windows
            .create_pop_up::<Toast>(None, None)
            .expect("create")
            .expect("pop-up");
        let second = windows
            .create_pop_up::<Toast>(None, None)
            .expect("create")
            .expect("pop-up");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.handle(), second.handle());
        assert_eq!(windows.open_window_count(), 0);
        assert!(first.is_initialized() && second.is_initialized());
    }

    #[test]
    fn pop_up_attaches_to_parent_container() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let map = windows.open_window::<Map>(None).expect("open").expect("window");
        let toast = windows
            .create_pop_up::<Toast>(None, Some(map.handle()))
            .expect("create")
            .expect("pop-up");
        assert_eq!(fixture.host.children_of(map.handle()), vec![toast.handle()]);
        assert!(!fixture.host.is_on_display(toast.handle()));
    }

    #[test]
    fn headless_context_disables_everything() {
        let fixture = fixture_with(FrameworkConfig::default(), SimulatedHost::headless());
        let windows = fixture.world.window_subsystem();
        assert!(windows.open_window::<LoginWindow>(None).expect("open").is_none());
        assert!(windows.create_pop_up::<Toast>(None, None).expect("pop-up").is_none());
        assert!(windows.create_view::<Map>(None).expect("view").is_none());
        assert!(!windows.is_open::<LoginWindow>());
        assert_eq!(fixture.host.widget_count(), 0);
    }

    #[test]
    fn abstract_class_is_never_open() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let map = windows
            .open_window::<Map>(None)
            .expect("open")
            .expect("window");

        let class = ViewClass::abstract_of::<Map>();
        assert!(windows.open_window_by_class(&class, None).expect("open").is_none());
        assert!(!windows.is_open_by_class(&class));
        assert!(!windows.close_window_by_class(&class));

        assert!(windows.is_open::<Map>());
        assert!(!map.is_removed());
        assert_eq!(fixture.host.attached_count(), 1);
    }

    #[test]
    fn initialize_exists_view_is_skipped_when_headless() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let view = windows
            .create_view::<Map>(None)
            .expect("create")
            .expect("view");

        fixture.host.set_headless(true);
        assert!(!windows.initialize_exists_view(&view).expect("initialize"));
        assert!(!view.is_initialized());
        assert!(view.view_model_binding().is_none());

        fixture.host.set_headless(false);
        assert!(windows.initialize_exists_view(&view).expect("initialize"));
        assert!(view.is_initialized());
    }

    #[test]
    fn failed_initialization_rolls_back() {
        let fixture = fixture();
        let windows = fixture.world.window_subsystem();
        let err = windows.open_window::<Broken>(None).err().expect("error");
        assert!(matches!(err, MvvmError::MissingViewModelClass { .. }));
        assert!(!windows.is_open::<Broken>());
        assert_eq!(fixture.host.attached_count(), 0);
    }

    #[test]
    fn windows_need_a_live_application() {
        let fixture = fixture();
        let world = Arc::clone(&fixture.world);
        drop(fixture.app);
        let err = world
            .window_subsystem()
            .open_window::<Map>(None)
            .err()
            .expect("error");
        assert!(matches!(err, MvvmError::SessionRepositoryUnavailable { .. }));
        assert_eq!(fixture.host.widget_count(), 0);
    }

    #[test]
    fn world_teardown_closes_windows() {
        let fixture = fixture();
        let windows = Arc::clone(fixture.world.window_subsystem());
        windows.open_window::<Map>(None).expect("open");
        windows.open_window::<Inventory>(None).expect("open");
        fixture.world.teardown().expect("teardown");
        assert_eq!(windows.open_window_count(), 0);
        assert_eq!(fixture.host.attached_count(), 0);
    }

    #[test]
    fn window_lifecycle_is_audited() {
        let audit = Arc::new(BufferedLifecycleAudit::new());
        let sink = MemorySink::new();
        let mut config = FrameworkConfig::default()
            .with_audit(audit.clone())
            .with_logger(Logger::new(sink.clone()));
        config.enable_metrics();
        let fixture = fixture_with(config, SimulatedHost::new());
        let windows = fixture.world.window_subsystem();

        windows.open_window::<Map>(None).expect("open");
        windows.hide_all_windows();
        windows.show_all_windows();
        windows.close_window::<Map>();

        assert_eq!(
            audit.stages(),
            vec![
                LifecycleAuditStage::ViewInitialized,
                LifecycleAuditStage::WindowOpened,
                LifecycleAuditStage::WindowsHidden,
                LifecycleAuditStage::WindowsShown,
                LifecycleAuditStage::WindowClosed,
            ]
        );
        let opened = sink
            .events()
            .into_iter()
            .find(|event| event.message == "window_opened")
            .expect("opened event");
        assert_eq!(opened.target, WINDOWS_TARGET);
        assert_eq!(opened.field("layer"), Some(&json!("gameplay_view")));

        let snapshot = fixture.app.metrics_snapshot().expect("metrics");
        assert_eq!(snapshot.windows_opened, 1);
        assert_eq!(snapshot.windows_closed, 1);
        assert_eq!(snapshot.views_initialized, 1);
    }
}
