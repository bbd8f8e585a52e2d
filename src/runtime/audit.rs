//! Lifecycle audit hooks.
//!
//! Every registry and subsystem reports its major transitions here so hosts
//! can log, buffer or visualize object lifetimes without patching the core.
//! Records carry a stage plus structured details.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAuditStage {
    /// A session model was constructed and started.
    SessionModelCreated,
    /// The session repository ended every model and emptied itself.
    SessionClosed,
    /// A contextual model was constructed and initialized.
    ContextualModelCreated,
    /// The scene repository destroyed every contextual model.
    WorldModelsTornDown,
    /// A window was created, registered and attached.
    WindowOpened,
    /// A registered window was removed from the display.
    WindowClosed,
    /// Global hide flag switched on.
    WindowsHidden,
    /// Global hide flag switched off.
    WindowsShown,
    /// A pop-up was created and attached.
    PopUpCreated,
    /// A view created its view model and bound it.
    ViewInitialized,
    /// A scene finished unloading.
    WorldTornDown,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct LifecycleAuditEvent {
    pub timestamp: SystemTime,
    pub stage: LifecycleAuditStage,
    pub details: Vec<(String, Value)>,
}

impl LifecycleAuditEvent {
    fn new(stage: LifecycleAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Builder helper to append fields ergonomically.
pub struct LifecycleAuditEventBuilder {
    event: LifecycleAuditEvent,
}

impl LifecycleAuditEventBuilder {
    pub fn new(stage: LifecycleAuditStage) -> Self {
        Self {
            event: LifecycleAuditEvent::new(stage),
        }
    }

    pub fn detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> LifecycleAuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait LifecycleAudit: Send + Sync {
    fn record(&self, event: LifecycleAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullLifecycleAudit;

impl LifecycleAudit for NullLifecycleAudit {
    fn record(&self, _event: LifecycleAuditEvent) {}
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct BufferedLifecycleAudit {
    events: Mutex<Vec<LifecycleAuditEvent>>,
}

impl BufferedLifecycleAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleAuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<LifecycleAuditStage> {
        self.events().into_iter().map(|event| event.stage).collect()
    }

    pub fn count(&self, stage: LifecycleAuditStage) -> usize {
        self.events
            .lock()
            .map(|guard| guard.iter().filter(|event| event.stage == stage).count())
            .unwrap_or(0)
    }
}

impl LifecycleAudit for BufferedLifecycleAudit {
    fn record(&self, event: LifecycleAuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_details() {
        let event = LifecycleAuditEventBuilder::new(LifecycleAuditStage::WindowOpened)
            .detail("class", json!("LoginWindow"))
            .detail("layer", json!("gameplay_view"))
            .finish();
        assert_eq!(event.stage, LifecycleAuditStage::WindowOpened);
        assert_eq!(event.detail("class"), Some(&json!("LoginWindow")));
        assert!(event.detail("missing").is_none());
    }

    #[test]
    fn buffered_audit_counts_by_stage() {
        let audit = BufferedLifecycleAudit::new();
        audit.record(LifecycleAuditEventBuilder::new(LifecycleAuditStage::WindowOpened).finish());
        audit.record(LifecycleAuditEventBuilder::new(LifecycleAuditStage::WindowClosed).finish());
        audit.record(LifecycleAuditEventBuilder::new(LifecycleAuditStage::WindowOpened).finish());
        assert_eq!(audit.count(LifecycleAuditStage::WindowOpened), 2);
        assert_eq!(
            audit.stages(),
            vec![
                LifecycleAuditStage::WindowOpened,
                LifecycleAuditStage::WindowClosed,
                LifecycleAuditStage::WindowOpened,
            ]
        );
    }
}
