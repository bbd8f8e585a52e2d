use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Saturating counters for every lifecycle transition the framework drives.
#[derive(Debug, Default, Clone)]
pub struct LifecycleMetrics {
    session_models_created: u64,
    session_models_ended: u64,
    contextual_models_created: u64,
    contextual_models_destroyed: u64,
    windows_opened: u64,
    windows_closed: u64,
    pop_ups_created: u64,
    pop_ups_removed: u64,
    views_initialized: u64,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_model_created(&mut self) {
        self.session_models_created = self.session_models_created.saturating_add(1);
    }

    pub fn record_session_models_ended(&mut self, count: usize) {
        self.session_models_ended = self.session_models_ended.saturating_add(count as u64);
    }

    pub fn record_contextual_model_created(&mut self) {
        self.contextual_models_created = self.contextual_models_created.saturating_add(1);
    }

    pub fn record_contextual_models_destroyed(&mut self, count: usize) {
        self.contextual_models_destroyed = self
            .contextual_models_destroyed
            .saturating_add(count as u64);
    }

    pub fn record_window_opened(&mut self) {
        self.windows_opened = self.windows_opened.saturating_add(1);
    }

    pub fn record_windows_closed(&mut self, count: usize) {
        if count > 0 {
            self.windows_closed = self.windows_closed.saturating_add(count as u64);
        }
    }

    pub fn record_pop_up_created(&mut self) {
        self.pop_ups_created = self.pop_ups_created.saturating_add(1);
    }

    pub fn record_pop_up_removed(&mut self) {
        self.pop_ups_removed = self.pop_ups_removed.saturating_add(1);
    }

    pub fn record_view_initialized(&mut self) {
        self.views_initialized = self.views_initialized.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            session_models_created: self.session_models_created,
            session_models_ended: self.session_models_ended,
            contextual_models_created: self.contextual_models_created,
            contextual_models_destroyed: self.contextual_models_destroyed,
            windows_opened: self.windows_opened,
            windows_closed: self.windows_closed,
            pop_ups_created: self.pop_ups_created,
            pop_ups_removed: self.pop_ups_removed,
            views_initialized: self.views_initialized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub session_models_created: u64,
    pub session_models_ended: u64,
    pub contextual_models_created: u64,
    pub contextual_models_destroyed: u64,
    pub windows_opened: u64,
    pub windows_closed: u64,
    pub pop_ups_created: u64,
    pub pop_ups_removed: u64,
    pub views_initialized: u64,
}

impl MetricSnapshot {
    /// Windows opened and not yet closed through the subsystem.
    pub fn windows_live(&self) -> u64 {
        self.windows_opened.saturating_sub(self.windows_closed)
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "lifecycle_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert(
            "session_models_created".to_string(),
            json!(self.session_models_created),
        );
        map.insert(
            "session_models_ended".to_string(),
            json!(self.session_models_ended),
        );
        map.insert(
            "contextual_models_created".to_string(),
            json!(self.contextual_models_created),
        );
        map.insert(
            "contextual_models_destroyed".to_string(),
            json!(self.contextual_models_destroyed),
        );
        map.insert("windows_opened".to_string(), json!(self.windows_opened));
        map.insert("windows_closed".to_string(), json!(self.windows_closed));
        map.insert("pop_ups_created".to_string(), json!(self.pop_ups_created));
        map.insert("pop_ups_removed".to_string(), json!(self.pop_ups_removed));
        map.insert(
            "views_initialized".to_string(),
            json!(self.views_initialized),
        );
        map
    }
}
