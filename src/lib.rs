//! Model-View-ViewModel lifecycle framework for engine-hosted UIs.
//!
//! The crate owns object lifetimes only: session and contextual model
//! registries, the view/view model binding protocol and a window subsystem
//! for windows and pop-ups. Rendering, timers and player context are
//! delegated to the host through the traits in [`host`].
//!
//! An [`Application`] spans the session and owns the [`ModelRepository`].
//! Each loaded scene is a [`World`] holding a [`WorldModelRepository`] and a
//! [`WindowSubsystem`]. Views, view models and contextual models reach their
//! world through a [`WorldContextAccessor`].

pub mod class;
pub mod error;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod view;
pub mod windows;

pub use class::{Class, ClassId, Instance};
pub use error::{MvvmError, Result};
pub use host::simulated::SimulatedHost;
pub use host::{
    ContextHost, ControllerHandle, DisplayHost, HostServices, TimerHandle, TimerHost, UiLayer,
    Visibility, Widget, WidgetHandle,
};
pub use logging::{LogEvent, LogFields, LogLevel, Logger, LoggingError, LoggingResult};
pub use metrics::{LifecycleMetrics, MetricSnapshot};
pub use models::{
    ContextualModel, ContextualModelClass, ModelRepository, RepositoryLinks, SessionModel,
    SessionModelClass, WorldModelRepository,
};
pub use registry::ClassRegistry;
pub use runtime::audit::{
    BufferedLifecycleAudit, LifecycleAudit, LifecycleAuditEvent, LifecycleAuditEventBuilder,
    LifecycleAuditStage, NullLifecycleAudit,
};
pub use runtime::context::{ContextObject, WorldContextAccessor};
pub use runtime::notify::{DestroyNotifier, SubscriptionId};
pub use runtime::{Application, FrameworkConfig, World};
pub use view::{
    DEFAULT_POP_UP_LIFESPAN, PopUp, PopUpClass, UiPopUp, UiView, View, ViewClass, ViewModel,
    ViewModelBinding, ViewModelClass,
};
pub use windows::WindowSubsystem;
