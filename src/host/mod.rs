//! Contracts for the engine/UI host the framework sits on.
//!
//! The framework never renders anything itself. It asks the host to create
//! widgets, attach them to the screen or to a parent container, flip their
//! visibility and schedule one-shot timers. [`simulated::SimulatedHost`]
//! implements all three host traits in memory.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub mod simulated;

/// Opaque widget handle minted by the display host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WidgetHandle(pub u64);

/// Opaque handle for a pending one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerHandle(pub u64);

/// Opaque handle for a local player/controller that can own widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ControllerHandle(pub u64);

/// Screen layer a view is attached to. Later variants draw on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UiLayer {
    BehindHud,
    Hud,
    #[default]
    GameplayView,
    PopUp,
}

impl UiLayer {
    pub fn z_order(self) -> i32 {
        match self {
            UiLayer::BehindHud => 0,
            UiLayer::Hud => 1,
            UiLayer::GameplayView => 2,
            UiLayer::PopUp => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Drawn and hit-testable.
    #[default]
    Visible,
    /// Drawn but ignores input.
    HitTestInvisible,
    /// Not drawn, takes no space, ignores input.
    Collapsed,
}

pub trait DisplayHost: Send + Sync {
    fn create_widget(&self, class_name: &str, owner: Option<ControllerHandle>) -> WidgetHandle;
    fn attach_to_display(&self, widget: WidgetHandle, layer: UiLayer);
    fn attach_to_container(&self, container: WidgetHandle, child: WidgetHandle);
    /// Removes the widget from whatever it is attached to.
    fn detach(&self, widget: WidgetHandle);
    fn set_visibility(&self, widget: WidgetHandle, visibility: Visibility);
    /// Destroys a widget that will never be shown again.
    fn release_widget(&self, widget: WidgetHandle) {
        self.detach(widget);
    }
}

pub type TimerCallback = Box<dyn FnOnce() + Send>;

pub trait TimerHost: Send + Sync {
    /// Runs `callback` once on the UI thread after `delay`.
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
    /// Drops a pending callback. Unknown or already-fired handles are ignored.
    fn cancel(&self, timer: TimerHandle);
}

pub trait ContextHost: Send + Sync {
    /// True on dedicated servers and other contexts without a screen.
    fn is_headless(&self) -> bool;
    fn default_controller(&self) -> Option<ControllerHandle>;
}

/// The three host collaborators a scene needs, bundled for injection.
#[derive(Clone)]
pub struct HostServices {
    pub display: Arc<dyn DisplayHost>,
    pub timers: Arc<dyn TimerHost>,
    pub context: Arc<dyn ContextHost>,
}

impl HostServices {
    pub fn new(
        display: Arc<dyn DisplayHost>,
        timers: Arc<dyn TimerHost>,
        context: Arc<dyn ContextHost>,
    ) -> Self {
        Self {
            display,
            timers,
            context,
        }
    }

    /// Uses one object for every host role.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: DisplayHost + TimerHost + ContextHost + 'static,
    {
        Self {
            display: host.clone(),
            timers: host.clone(),
            context: host,
        }
    }

    pub fn is_headless(&self) -> bool {
        self.context.is_headless()
    }
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices")
            .field("headless", &self.is_headless())
            .finish_non_exhaustive()
    }
}

/// A widget the framework created through the display host.
#[derive(Clone)]
pub struct Widget {
    handle: WidgetHandle,
    owner: Option<ControllerHandle>,
    display: Arc<dyn DisplayHost>,
}

impl Widget {
    pub fn create(
        display: &Arc<dyn DisplayHost>,
        class_name: &str,
        owner: Option<ControllerHandle>,
    ) -> Self {
        let handle = display.create_widget(class_name, owner);
        Self {
            handle,
            owner,
            display: Arc::clone(display),
        }
    }

    pub fn handle(&self) -> WidgetHandle {
        self.handle
    }

    pub fn owner(&self) -> Option<ControllerHandle> {
        self.owner
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.display.set_visibility(self.handle, visibility);
    }

    pub fn attach_to_display(&self, layer: UiLayer) {
        self.display.attach_to_display(self.handle, layer);
    }

    pub fn attach_to_container(&self, container: WidgetHandle) {
        self.display.attach_to_container(container, self.handle);
    }

    pub fn detach(&self) {
        self.display.detach(self.handle);
    }

    pub fn release(&self) {
        self.display.release_widget(self.handle);
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("handle", &self.handle)
            .field("owner", &self.owner)
            .finish()
    }
}
