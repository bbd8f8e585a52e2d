use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use serde_json::json;

use crate::class::{Class, ClassId, Instance};
use crate::host::{TimerHandle, TimerHost, UiLayer, Widget, WidgetHandle};
use crate::logging::{LogLevel, json_kv};
use crate::models::{ModelRepository, RepositoryLinks, WorldModelRepository};
use crate::runtime::World;
use crate::runtime::context::{ContextObject, WorldContextAccessor};
use crate::runtime::diagnostics::Diagnostics;
use crate::runtime::notify::DestroyNotifier;

/// Conventional lifespan for toast-style pop-ups.
pub const DEFAULT_POP_UP_LIFESPAN: Duration = Duration::from_secs(3);

/// Transient view that is never deduplicated by type.
pub trait PopUp: Any + Send + Sync {
    fn layer(&self) -> UiLayer {
        UiLayer::PopUp
    }

    /// When set, the pop-up removes itself this long after initialization.
    fn self_destroy_after(&self) -> Option<Duration> {
        None
    }

    fn on_initialize(&self, pop_up: &UiPopUp) {
        let _ = pop_up;
    }

    fn on_destroy(&self, pop_up: &UiPopUp) {
        let _ = pop_up;
    }
}

pub type PopUpClass = Class<dyn PopUp>;

impl Class<dyn PopUp> {
    pub fn of<T: PopUp + Default>() -> Self {
        Self::with_factory::<T>(|| {
            let pop_up = Arc::new(T::default());
            Instance {
                object: pop_up.clone(),
                any: pop_up,
            }
        })
    }
}

pub struct UiPopUp {
    class: ClassId,
    pop_up: Instance<dyn PopUp>,
    widget: Widget,
    outer: Weak<dyn ContextObject>,
    context: WorldContextAccessor,
    links: OnceLock<RepositoryLinks>,
    initialized: AtomicBool,
    removed: AtomicBool,
    timer: Mutex<Option<TimerHandle>>,
    timers: Arc<dyn TimerHost>,
    on_destroy: DestroyNotifier,
    diagnostics: Diagnostics,
}

impl UiPopUp {
    pub(crate) fn new(
        class: ClassId,
        pop_up: Instance<dyn PopUp>,
        widget: Widget,
        outer: Weak<dyn ContextObject>,
        timers: Arc<dyn TimerHost>,
        diagnostics: Diagnostics,
    ) -> Arc<Self> {
        Arc::new(Self {
            class,
            pop_up,
            widget,
            context: WorldContextAccessor::new(outer.clone()),
            outer,
            links: OnceLock::new(),
            initialized: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            timer: Mutex::new(None),
            timers,
            on_destroy: DestroyNotifier::new(),
            diagnostics,
        })
    }

    /// Injects both repositories, runs `on_initialize` and arms the
    /// self-destroy timer. Idempotent.
    pub fn initialize(
        self: &Arc<Self>,
        model_repository: &Arc<ModelRepository>,
        world_model_repository: &Arc<WorldModelRepository>,
    ) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.links.set(RepositoryLinks::new(
            model_repository,
            Some(world_model_repository),
        ));
        self.pop_up.object.on_initialize(self);

        let Some(lifespan) = self.pop_up.object.self_destroy_after() else {
            return;
        };
        if self.is_removed() {
            return;
        }
        // The pending callback keeps the pop-up alive until it fires or is
        // cancelled by an explicit removal.
        let pop_up = Arc::clone(self);
        let handle = self.timers.schedule_once(
            lifespan,
            Box::new(move || {
                pop_up.expire();
            }),
        );
        if let Ok(mut slot) = self.timer.lock() {
            *slot = Some(handle);
        }
    }

    fn expire(&self) {
        if let Ok(mut slot) = self.timer.lock() {
            slot.take();
        }
        if self.remove_from_parent() {
            self.diagnostics.log(
                LogLevel::Debug,
                "pop_up_expired",
                [json_kv("class", json!(self.class.name()))],
            );
        }
    }

    /// Cancels any pending timer, detaches the widget and fires the destroy
    /// notification. Returns `false` if already removed.
    pub fn remove_from_parent(&self) -> bool {
        if self.removed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let pending = self.timer.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = pending {
            self.timers.cancel(handle);
        }
        self.widget.detach();
        self.on_destroy.broadcast();
        self.pop_up.object.on_destroy(self);
        self.diagnostics
            .record_metrics(|metrics| metrics.record_pop_up_removed());
        true
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
        self.pop_up.object.layer()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn on_destroy(&self) -> &DestroyNotifier {
        &self.on_destroy
    }

    pub fn model_repository(&self) -> Option<Arc<ModelRepository>> {
        self.links.get().and_then(RepositoryLinks::model_repository)
    }

    pub fn world_model_repository(&self) -> Option<Arc<WorldModelRepository>> {
        self.links
            .get()
            .and_then(RepositoryLinks::world_model_repository)
    }

    pub fn world(&self) -> Option<Arc<World>> {
        self.context.resolve()
    }

    pub fn pop_up<T: PopUp>(&self) -> Option<Arc<T>> {
        self.pop_up.downcast::<T>()
    }
}

impl ContextObject for UiPopUp {
    fn outer(&self) -> Option<Arc<dyn ContextObject>> {
        self.outer.upgrade()
    }
}

impl fmt::Debug for UiPopUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiPopUp")
            .field("class", &self.class)
            .field("widget", &self.widget)
            .field("initialized", &self.is_initialized())
            .field("removed", &self.is_removed())
            .field("pending_timer", &self.has_pending_timer())
            .finish()
    }
}
