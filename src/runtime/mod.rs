use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use serde_json::json;

use crate::host::{ControllerHandle, HostServices};
use crate::logging::{LogLevel, Logger, json_kv};
use crate::metrics::{LifecycleMetrics, MetricSnapshot};
use crate::models::{ModelRepository, WorldModelRepository};
use crate::windows::WindowSubsystem;
use crate::Result;

pub mod audit;
pub mod context;
pub mod diagnostics;
pub mod notify;

use self::audit::{LifecycleAudit, LifecycleAuditStage, NullLifecycleAudit};
use self::context::ContextObject;
use self::diagnostics::Diagnostics;

const RUNTIME_TARGET: &str = "room_mvvm::runtime";

/// Configuration shared by every scope the framework creates.
#[derive(Clone)]
pub struct FrameworkConfig {
    /// Optional structured logger used by repositories and subsystems.
    pub logger: Option<Logger>,
    /// Metrics accumulator updated on every lifecycle transition.
    pub metrics: Option<Arc<Mutex<LifecycleMetrics>>>,
    /// Sink for lifecycle audit records.
    pub audit: Arc<dyn LifecycleAudit>,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            audit: Arc::new(NullLifecycleAudit),
            metrics_target: "room_mvvm::metrics".to_string(),
        }
    }
}

impl FrameworkConfig {
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn LifecycleAudit>) -> Self {
        self.audit = audit;
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(LifecycleMetrics::new())));
        }
    }

    /// Disable metrics collection and prevent further snapshots.
    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<LifecycleMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Application-lifetime scope. Owns the session model repository and
/// spawns one [`World`] per loaded scene.
pub struct Application {
    config: FrameworkConfig,
    model_repository: Arc<ModelRepository>,
    started_at: Instant,
    diagnostics: Diagnostics,
}

impl Application {
    pub fn new(config: FrameworkConfig) -> Arc<Self> {
        let model_repository = ModelRepository::new(&config);
        let diagnostics = Diagnostics::new(&config, RUNTIME_TARGET);
        diagnostics.log(LogLevel::Info, "application_started", std::iter::empty());
        Arc::new(Self {
            config,
            model_repository,
            started_at: Instant::now(),
            diagnostics,
        })
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn model_repository(&self) -> &Arc<ModelRepository> {
        &self.model_repository
    }

    /// Loads a scene bound to this application.
    pub fn create_world(self: &Arc<Self>, name: impl Into<String>, hosts: HostServices) -> Arc<World> {
        let world = World::new(name.into(), Arc::downgrade(self), hosts, &self.config);
        self.diagnostics.log(
            LogLevel::Info,
            "world_created",
            [
                json_kv("world", json!(world.name())),
                json_kv("headless", json!(world.is_headless())),
            ],
        );
        world
    }

    /// Ends the session: every session model gets `end_session` and the
    /// repository is emptied.
    pub fn shutdown(&self) -> Result<usize> {
        let ended = self.model_repository.close_session()?;
        self.diagnostics.log(
            LogLevel::Info,
            "application_stopped",
            [
                json_kv("uptime_ms", json!(self.started_at.elapsed().as_millis() as u64)),
                json_kv("session_models_ended", json!(ended)),
            ],
        );
        Ok(ended)
    }

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(self.started_at.elapsed()))
    }

    /// Logs the current metrics snapshot through the configured logger.
    pub fn emit_metrics_snapshot(&self) {
        if let (Some(logger), Some(snapshot)) =
            (self.config.logger.as_ref(), self.metrics_snapshot())
        {
            let event = snapshot.to_log_event(&self.config.metrics_target);
            let _ = logger.log_event(event);
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("session_models", &self.model_repository.len())
            .finish_non_exhaustive()
    }
}

/// Scene-lifetime scope: the ambient context every view, view model and
/// contextual model resolves through.
pub struct World {
    name: String,
    self_ref: Weak<World>,
    application: Weak<Application>,
    hosts: HostServices,
    world_model_repository: Arc<WorldModelRepository>,
    window_subsystem: Arc<WindowSubsystem>,
    torn_down: AtomicBool,
    diagnostics: Diagnostics,
}

impl World {
    fn new(
        name: String,
        application: Weak<Application>,
        hosts: HostServices,
        config: &FrameworkConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<World>| {
            let outer: Weak<dyn ContextObject> = weak.clone();
            Self {
                name,
                self_ref: weak.clone(),
                application,
                hosts,
                world_model_repository: WorldModelRepository::new(outer.clone(), config),
                window_subsystem: WindowSubsystem::new(outer, config),
                torn_down: AtomicBool::new(false),
                diagnostics: Diagnostics::new(config, RUNTIME_TARGET),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &HostServices {
        &self.hosts
    }

    pub fn is_headless(&self) -> bool {
        self.hosts.is_headless()
    }

    pub fn default_controller(&self) -> Option<ControllerHandle> {
        self.hosts.context.default_controller()
    }

    pub fn application(&self) -> Option<Arc<Application>> {
        self.application.upgrade()
    }

    /// The session repository of the owning application, if it is alive.
    pub fn model_repository(&self) -> Option<Arc<ModelRepository>> {
        self.application
            .upgrade()
            .map(|application| Arc::clone(application.model_repository()))
    }

    pub fn world_model_repository(&self) -> &Arc<WorldModelRepository> {
        &self.world_model_repository
    }

    pub fn window_subsystem(&self) -> &Arc<WindowSubsystem> {
        &self.window_subsystem
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Scene unload: closes every window, then destroys every contextual
    /// model. Running it twice is a no-op.
    pub fn teardown(&self) -> Result<()> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let windows = self.window_subsystem.close_all_windows();
        let models = self.world_model_repository.teardown()?;
        self.diagnostics.lifecycle(
            LifecycleAuditStage::WorldTornDown,
            "world_torn_down",
            [
                json_kv("world", json!(self.name)),
                json_kv("windows_closed", json!(windows)),
                json_kv("models_destroyed", json!(models)),
            ],
        );
        Ok(())
    }
}

impl ContextObject for World {
    fn outer(&self) -> Option<Arc<dyn ContextObject>> {
        None
    }

    fn world(&self) -> Option<Arc<World>> {
        self.self_ref.upgrade()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("hosts", &self.hosts)
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}
